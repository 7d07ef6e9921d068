//! Per-session orchestration of the AR workflow.
//!
//! The `Dispatcher` ties the pieces together for an interactive client:
//! - [`sessions`] - session connect/disconnect and pipeline bookkeeping
//! - [`submit`] - validation, registration, encoding, staging and upload

mod sessions;
mod submit;

use crate::config::Config;
use crate::events::EventSink;
use crate::registration::{HttpRegistrar, Registrar};
use crate::transfer::{FtpStorage, RemoteStorage, TransferPipeline};
use crate::types::SessionId;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

pub use submit::{
    AR_ERROR_MESSAGE, AR_ERROR_TITLE, GENERATING_MESSAGE, PREPARING_MESSAGE,
    REGISTRATION_ERROR_TITLE, SENDING_MESSAGE,
};

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Session-aware front of the library (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Dispatcher {
    /// Configuration (wrapped in Arc for sharing across sessions)
    pub(crate) config: Arc<Config>,
    /// Upstream registration client
    pub(crate) registrar: Arc<dyn Registrar>,
    /// Remote storage the batches are uploaded to
    pub(crate) storage: Arc<dyn RemoteStorage>,
    /// Where session events go
    pub(crate) sink: Arc<dyn EventSink>,
    /// One pipeline per connected session
    pub(crate) sessions: Arc<tokio::sync::Mutex<HashMap<SessionId, Arc<TransferPipeline>>>>,
    /// Date stamped on new batches
    pub(crate) today: fn() -> NaiveDate,
}

impl Dispatcher {
    /// Create a dispatcher from explicit collaborators
    pub fn new(
        config: Config,
        registrar: Arc<dyn Registrar>,
        storage: Arc<dyn RemoteStorage>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registrar,
            storage,
            sink,
            sessions: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            today: local_today,
        }
    }

    /// Create a dispatcher using the HTTP registration API and FTP storage
    pub fn from_config(config: Config, sink: Arc<dyn EventSink>) -> Self {
        let timeout = config.transfer.timeout;
        let registrar = Arc::new(HttpRegistrar::new(config.registration.clone(), timeout));
        let storage = Arc::new(FtpStorage::new(&config.storage, timeout));
        Self::new(config, registrar, storage, sink)
    }

    /// Override the date used for new batches
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }
}
