//! engine::cancel
//!
//! Cooperative cancellation for long runs.
//!
//! The engine checks the token before each branch, before each file, and
//! before the write phase of apply. Once the write phase has started the
//! token is no longer consulted, so a cancelled run never leaves a partial
//! set of registered references behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::EngineError;

/// A shared cancellation flag.
///
/// Clones observe the same flag, so a signal handler can hold one clone
/// while the engine holds another.
///
/// # Example
///
/// ```
/// use qyt::engine::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// assert!(token.check().is_ok());
///
/// handle.cancel();
/// assert!(token.is_cancelled());
/// assert!(token.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return [`EngineError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
