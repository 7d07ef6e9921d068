//! Background upload state machine
//!
//! One [`TransferPipeline`] exists per client session. An upload runs in its
//! own tokio task:
//!
//! ```text
//! Idle -> Connecting -> Transferring -> Completed
//!              |              |------> Cancelled (partial file deleted)
//!              |------------------------> Failed
//! ```
//!
//! Progress and the final outcome are reported to the session through an
//! [`EventSink`]. Cancellation is cooperative: the task checks the session's
//! [`CancelFlag`] after every chunk.

use super::cancel::CancelFlag;
use super::storage::RemoteStorage;
use crate::config::TransferConfig;
use crate::error::{self, TransferError};
use crate::events::EventSink;
use crate::staging::StagedFile;
use crate::types::{Event, SessionId, TransferState};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Title of the dialog shown when an upload fails
pub const UPLOAD_ERROR_TITLE: &str = "FTP server connection error";

/// Message sent with [`Event::Success`]
pub const UPLOAD_SUCCESS_MESSAGE: &str = "File sent successfully.";

/// Upload pipeline of one session
pub struct TransferPipeline {
    session: SessionId,
    storage: Arc<dyn RemoteStorage>,
    sink: Arc<dyn EventSink>,
    config: TransferConfig,
    remote_dir: String,
    cancel: CancelFlag,
    state: Arc<Mutex<TransferState>>,
}

impl std::fmt::Debug for TransferPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferPipeline")
            .field("session", &self.session)
            .field("storage", &self.storage.name())
            .field("remote_dir", &self.remote_dir)
            .field("state", &self.state())
            .finish()
    }
}

impl TransferPipeline {
    /// Create an idle pipeline
    ///
    /// `remote_dir` is prepended verbatim to every staged file name.
    pub fn new(
        session: SessionId,
        storage: Arc<dyn RemoteStorage>,
        sink: Arc<dyn EventSink>,
        config: TransferConfig,
        remote_dir: impl Into<String>,
    ) -> Self {
        Self {
            session,
            storage,
            sink,
            config,
            remote_dir: remote_dir.into(),
            cancel: CancelFlag::new(),
            state: Arc::new(Mutex::new(TransferState::Idle)),
        }
    }

    /// Session this pipeline reports to
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Current state
    pub fn state(&self) -> TransferState {
        *lock_state(&self.state)
    }

    /// Request cancellation of the running upload
    ///
    /// Takes effect after the chunk in flight. A request made while no upload
    /// is running stays pending and stops the next one after its first chunk.
    /// Every upload clears the flag when it reaches a terminal state.
    pub fn cancel(&self) {
        tracing::info!(session = %self.session, "upload cancellation requested");
        self.cancel.cancel();
    }

    /// Handle on the session's cancellation flag
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Start uploading `file` in the background
    ///
    /// The staged bytes are read before anything else happens, so a missing
    /// or unreadable file never reaches the remote side. The task is then
    /// spawned and the handle returned at once; it resolves to the terminal
    /// state. `payload` is echoed in the success event.
    ///
    /// A cancellation requested before the start is kept: the upload stops
    /// after its first chunk.
    ///
    /// # Errors
    ///
    /// - [`Error::Staging`](crate::Error::Staging) if the staged file cannot be read
    /// - [`TransferError::UploadInProgress`] if an earlier upload of this
    ///   session has not finished yet
    pub async fn start_upload(
        &self,
        file: StagedFile,
        payload: serde_json::Value,
    ) -> error::Result<JoinHandle<TransferState>> {
        let bytes = file.read().await?;

        {
            let mut state = lock_state(&self.state);
            if !state.accepts_upload() {
                return Err(TransferError::UploadInProgress {
                    session: self.session.to_string(),
                }
                .into());
            }
            *state = TransferState::Connecting;
        }

        let remote_path = format!("{}{}", self.remote_dir, file.file_name);
        tracing::info!(
            session = %self.session,
            storage = self.storage.name(),
            remote_path = %remote_path,
            bytes = bytes.len(),
            "starting upload"
        );

        let task = UploadTask {
            session: self.session.clone(),
            storage: Arc::clone(&self.storage),
            sink: Arc::clone(&self.sink),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
            state: Arc::clone(&self.state),
            remote_path,
        };
        Ok(tokio::spawn(task.run(bytes, payload)))
    }
}

fn lock_state(state: &Mutex<TransferState>) -> MutexGuard<'_, TransferState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Outcome {
    Completed,
    Cancelled,
}

/// Everything the spawned upload needs, detached from the pipeline
struct UploadTask {
    session: SessionId,
    storage: Arc<dyn RemoteStorage>,
    sink: Arc<dyn EventSink>,
    config: TransferConfig,
    cancel: CancelFlag,
    state: Arc<Mutex<TransferState>>,
    remote_path: String,
}

impl UploadTask {
    async fn run(self, bytes: Vec<u8>, payload: serde_json::Value) -> TransferState {
        let final_state = match self.transfer(&bytes).await {
            Ok(Outcome::Completed) => {
                tokio::time::sleep(self.config.settle_delay).await;
                tracing::info!(
                    session = %self.session,
                    remote_path = %self.remote_path,
                    "upload completed"
                );
                self.sink.emit(
                    &self.session,
                    Event::Success {
                        payload,
                        message: UPLOAD_SUCCESS_MESSAGE.to_string(),
                    },
                );
                TransferState::Completed
            }
            Ok(Outcome::Cancelled) => {
                self.remove_partial().await;
                tracing::info!(
                    session = %self.session,
                    remote_path = %self.remote_path,
                    "upload cancelled"
                );
                TransferState::Cancelled
            }
            Err(e) => {
                tracing::error!(
                    session = %self.session,
                    remote_path = %self.remote_path,
                    error = %e,
                    "upload failed"
                );
                self.sink.emit(
                    &self.session,
                    Event::UploadError {
                        title: UPLOAD_ERROR_TITLE.to_string(),
                        message: e.to_string(),
                    },
                );
                TransferState::Failed
            }
        };

        // A request that arrived after the last chunk was aimed at this upload
        self.cancel.reset();
        self.set_state(final_state);
        final_state
    }

    async fn transfer(&self, bytes: &[u8]) -> Result<Outcome, TransferError> {
        let total = bytes.len();

        let mut store = self.bounded("connect", self.storage.connect()).await?;
        if let Err(e) = self.bounded("begin", store.begin(&self.remote_path)).await {
            store.abort().await;
            return Err(e);
        }
        self.set_state(TransferState::Transferring);

        let mut uploaded = 0usize;
        for chunk in bytes.chunks(self.config.chunk_size.max(1)) {
            self.bounded("send", store.send_chunk(chunk)).await?;
            uploaded += chunk.len();

            let progress = progress_percent(uploaded, total);
            tracing::debug!(session = %self.session, uploaded, total, progress, "chunk sent");
            self.sink.emit(&self.session, Event::Progress { progress });

            if self.cancel.is_cancelled() {
                store.abort().await;
                return Ok(Outcome::Cancelled);
            }
        }

        self.bounded("finish", store.finish()).await?;
        Ok(Outcome::Completed)
    }

    /// Best-effort removal of the partially stored file
    async fn remove_partial(&self) {
        match self
            .bounded("delete", self.storage.delete(&self.remote_path))
            .await
        {
            Ok(()) => tracing::debug!(
                session = %self.session,
                remote_path = %self.remote_path,
                "removed partial remote file"
            ),
            Err(e) => tracing::warn!(
                session = %self.session,
                remote_path = %self.remote_path,
                error = %e,
                "failed to remove partial remote file"
            ),
        }
    }

    async fn bounded<T, F>(&self, operation: &str, future: F) -> Result<T, TransferError>
    where
        F: Future<Output = Result<T, TransferError>>,
    {
        let after: Duration = self.config.timeout;
        tokio::time::timeout(after, future)
            .await
            .map_err(|_| TransferError::Timeout {
                operation: operation.to_string(),
                after,
            })?
    }

    fn set_state(&self, state: TransferState) {
        *lock_state(&self.state) = state;
    }
}

/// Whole-percent progress, 100 only once every byte is sent
pub(crate) fn progress_percent(uploaded: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((uploaded.min(total) as u128 * 100) / total as u128) as u8
}
