//! Remote storage seam used by the transfer pipeline

use crate::error::TransferError;
use async_trait::async_trait;

/// A remote file store reachable over a stateful protocol
///
/// Implementations bound every network call by their own timeout.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Open an authenticated session for storing one file
    async fn connect(&self) -> Result<Box<dyn StoreSession>, TransferError>;

    /// Delete a remote file in a session of its own
    async fn delete(&self, remote_path: &str) -> Result<(), TransferError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// One open store operation
///
/// Call order is `begin`, any number of `send_chunk`, then exactly one of
/// `finish` or `abort`.
#[async_trait]
pub trait StoreSession: Send {
    /// Start storing `remote_path` (overwriting it)
    async fn begin(&mut self, remote_path: &str) -> Result<(), TransferError>;

    /// Send the next chunk of file content
    async fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), TransferError>;

    /// Complete the store and close the session
    async fn finish(self: Box<Self>) -> Result<(), TransferError>;

    /// Drop the store without completing it
    ///
    /// Best effort: the remote side may keep a partial file.
    async fn abort(self: Box<Self>);
}
