//! In-memory storage and event sink fakes for transfer tests.

use super::cancel::CancelFlag;
use super::storage::{RemoteStorage, StoreSession};
use crate::error::TransferError;
use crate::events::EventSink;
use crate::types::{Event, SessionId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Event sink that remembers everything it was given
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<(SessionId, Event)>>,
}

impl RecordingSink {
    pub(crate) fn events_for(&self, session: &SessionId) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| target == session)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, session: &SessionId, event: Event) {
        self.events.lock().unwrap().push((session.clone(), event));
    }
}

#[derive(Default)]
struct Shared {
    connects: AtomicUsize,
    chunks: AtomicUsize,
    aborted: AtomicBool,
    stored_path: Mutex<Option<String>>,
    stored: Mutex<Vec<u8>>,
    deleted: Mutex<Vec<String>>,
    cancel_after: Mutex<Option<(usize, CancelFlag)>>,
    fail_chunk: Mutex<Option<(usize, TransferError)>>,
}

/// Remote storage that keeps the stored bytes in memory
#[derive(Default)]
pub(crate) struct MockStorage {
    shared: Arc<Shared>,
    hang_on_connect: bool,
}

impl MockStorage {
    /// Storage whose `connect` never completes
    pub(crate) fn hanging_connect() -> Self {
        Self {
            hang_on_connect: true,
            ..Self::default()
        }
    }

    /// Storage whose `n`th `send_chunk` (1-based) fails with `error`
    pub(crate) fn failing_chunk(n: usize, error: TransferError) -> Self {
        let storage = Self::default();
        *storage.shared.fail_chunk.lock().unwrap() = Some((n, error));
        storage
    }

    /// Raise `flag` while the `n`th chunk (1-based) is being sent
    pub(crate) fn cancel_after_chunk(&self, n: usize, flag: CancelFlag) {
        *self.shared.cancel_after.lock().unwrap() = Some((n, flag));
    }

    pub(crate) fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn chunks_sent(&self) -> usize {
        self.shared.chunks.load(Ordering::SeqCst)
    }

    pub(crate) fn aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn stored_path(&self) -> Option<String> {
        self.shared.stored_path.lock().unwrap().clone()
    }

    pub(crate) fn stored_bytes(&self) -> Vec<u8> {
        self.shared.stored.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.shared.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStorage for MockStorage {
    async fn connect(&self) -> Result<Box<dyn StoreSession>, TransferError> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_connect {
            std::future::pending::<()>().await;
        }
        Ok(Box::new(MockSession {
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn delete(&self, remote_path: &str) -> Result<(), TransferError> {
        self.shared
            .deleted
            .lock()
            .unwrap()
            .push(remote_path.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockSession {
    shared: Arc<Shared>,
}

#[async_trait]
impl StoreSession for MockSession {
    async fn begin(&mut self, remote_path: &str) -> Result<(), TransferError> {
        *self.shared.stored_path.lock().unwrap() = Some(remote_path.to_string());
        self.shared.stored.lock().unwrap().clear();
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), TransferError> {
        let n = self.shared.chunks.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut fail = self.shared.fail_chunk.lock().unwrap();
            if fail.as_ref().is_some_and(|(at, _)| *at == n)
                && let Some((_, error)) = fail.take()
            {
                return Err(error);
            }
        }

        self.shared.stored.lock().unwrap().extend_from_slice(chunk);

        if let Some((at, flag)) = self.shared.cancel_after.lock().unwrap().as_ref()
            && *at == n
        {
            flag.cancel();
        }
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<(), TransferError> {
        Ok(())
    }

    async fn abort(self: Box<Self>) {
        self.shared.aborted.store(true, Ordering::SeqCst);
    }
}
