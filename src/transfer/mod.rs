//! Cancellable background upload of staged batch files.
//!
//! - [`pipeline`] - per-session upload state machine
//! - [`cancel`] - per-session cancellation flag
//! - [`storage`] - remote storage traits
//! - [`ftp`] - FTP implementation of the storage traits

pub mod cancel;
pub mod ftp;
pub mod pipeline;
pub mod storage;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use cancel::CancelFlag;
pub use ftp::FtpStorage;
pub use pipeline::{TransferPipeline, UPLOAD_ERROR_TITLE, UPLOAD_SUCCESS_MESSAGE};
pub use storage::{RemoteStorage, StoreSession};
