//! # ar-courier
//!
//! Backend library for producing postal AR (proof of delivery) batch files
//! and delivering them to the postal operator's FTP drop.
//!
//! ## Design Philosophy
//!
//! ar-courier is designed to be:
//! - **Exact** - every batch line is 270 columns, byte for byte
//! - **Library-first** - no UI or HTTP routes, purely a Rust crate for embedding
//! - **Event-driven** - sessions receive progress and outcomes as [`Event`]s
//! - **Cancellable** - a disconnecting session aborts its upload between chunks
//!
//! ## Quick Start
//!
//! ```no_run
//! use ar_courier::{BroadcastSink, Config, Dispatcher, SessionId};
//! use ar_courier::registration::RecipientForm;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let sink = Arc::new(BroadcastSink::default());
//!     let dispatcher = Dispatcher::from_config(config, sink.clone());
//!
//!     // Subscribe to events
//!     let mut events = sink.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}: {:?}", event.session, event.event);
//!         }
//!     });
//!
//!     let session = SessionId::from("client-1");
//!     dispatcher.connect(session.clone()).await;
//!
//!     let form = RecipientForm {
//!         document: "529.982.247-25".into(),
//!         name: "Maria".into(),
//!         surname: "da Conceição".into(),
//!         number: "120".into(),
//!         street: "Rua das Flores".into(),
//!         neighborhood: "Centro".into(),
//!         city: "São Paulo".into(),
//!         state: "SP".into(),
//!         zip_code: "01310-100".into(),
//!         complement: None,
//!     };
//!     let upload = dispatcher.submit(&session, form).await?;
//!     println!("upload finished: {:?}", upload.await?);
//!
//!     Ok(())
//! }
//! ```
//!
//! The codec and the checksum can be used on their own:
//!
//! ```
//! use ar_courier::document::validate_document;
//! use ar_courier::record::verification_digit;
//!
//! assert!(validate_document("11.222.333/0001-81"));
//! assert_eq!(verification_digit("00000042").ok(), Some(5));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Session orchestration (validation, registration, encoding, upload)
pub mod dispatcher;
/// CPF / CNPJ validation
pub mod document;
/// Error types
pub mod error;
/// Session event delivery
pub mod events;
/// AR batch record codec
pub mod record;
/// Upstream registration API client
pub mod registration;
/// Local staging of batch files
pub mod staging;
/// Cancellable background upload
pub mod transfer;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use document::{DocumentKind, validate_document};
pub use error::{
    EncodingError, Error, RegistrationError, Result, StagingError, ToHttpStatus, TransferError,
};
pub use events::{BroadcastSink, EventSink};
pub use record::{
    BatchContext, BatchContract, BatchEncoder, DecodedBatch, RecipientEntry, Record, TrailerMode,
};
pub use registration::{HttpRegistrar, Registrar};
pub use staging::StagedFile;
pub use transfer::{CancelFlag, FtpStorage, RemoteStorage, TransferPipeline};
pub use types::{Event, SessionEvent, SessionId, TransferState};
