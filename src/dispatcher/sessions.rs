//! Session connect/disconnect handling.

use super::Dispatcher;
use crate::transfer::TransferPipeline;
use crate::types::SessionId;
use std::sync::Arc;

impl Dispatcher {
    /// Register a session and give it a fresh, idle pipeline
    ///
    /// Reconnecting with a known id replaces its pipeline. An upload still
    /// running under the old one is cancelled, since nothing can reach it
    /// afterwards.
    pub async fn connect(&self, session: SessionId) -> Arc<TransferPipeline> {
        let pipeline = Arc::new(self.new_pipeline(session.clone()));
        let previous = self
            .sessions
            .lock()
            .await
            .insert(session.clone(), Arc::clone(&pipeline));

        if let Some(previous) = &previous
            && !previous.state().accepts_upload()
        {
            previous.cancel();
            tracing::info!(
                session = %session,
                state = ?previous.state(),
                "cancelled upload of replaced pipeline"
            );
        }

        tracing::info!(session = %session, replaced = previous.is_some(), "session connected");
        pipeline
    }

    /// Forget a session and cancel its upload, if one is running
    pub async fn disconnect(&self, session: &SessionId) {
        let removed = self.sessions.lock().await.remove(session);
        match removed {
            Some(pipeline) => {
                pipeline.cancel();
                tracing::info!(session = %session, state = ?pipeline.state(), "session disconnected");
            }
            None => tracing::debug!(session = %session, "disconnect for unknown session"),
        }
    }

    /// Pipeline of a connected session
    pub async fn pipeline(&self, session: &SessionId) -> Option<Arc<TransferPipeline>> {
        self.sessions.lock().await.get(session).cloned()
    }

    /// Number of connected sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Pipeline of `session`, connecting it first if needed
    pub(crate) async fn pipeline_or_connect(&self, session: &SessionId) -> Arc<TransferPipeline> {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(
            sessions
                .entry(session.clone())
                .or_insert_with(|| Arc::new(self.new_pipeline(session.clone()))),
        )
    }

    fn new_pipeline(&self, session: SessionId) -> TransferPipeline {
        TransferPipeline::new(
            session,
            Arc::clone(&self.storage),
            Arc::clone(&self.sink),
            self.config.transfer.clone(),
            self.config.storage.directory.clone(),
        )
    }
}
