//! Per-session cancellation flag

use std::sync::{Arc, Mutex, MutexGuard};

/// Cancellation request shared between a session and its upload task
///
/// The flag is read and written only under its lock, and the lock is never
/// held across an `.await`. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    inner: Arc<Mutex<bool>>,
}

impl CancelFlag {
    /// Create a cleared flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        *self.lock() = true;
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.lock()
    }

    /// Clear the flag
    pub fn reset(&self) {
        *self.lock() = false;
    }

    /// Clear the flag and report whether it was set
    pub fn take(&self) -> bool {
        std::mem::replace(&mut *self.lock(), false)
    }

    // A panic while holding the lock cannot leave a bool half-written
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
