//! Cooperative cancellation for long-running jobs.
//!
//! Download, extraction, and conversion loops all accept a [`CancelToken`]
//! and check it between work units (one block or one record). A canceled
//! job stops at the next check, cleans up its partial output, and reports
//! a canceled outcome distinct from failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag.
///
/// Clones share the same underlying flag, so a token handed to worker
/// threads observes a cancellation requested from a signal handler or
/// another thread.
///
/// # Example
///
/// ```
/// use dumpmill::cancel::CancelToken;
///
/// let token = CancelToken::new();
/// let worker_view = token.clone();
///
/// assert!(!worker_view.is_canceled());
/// token.cancel();
/// assert!(worker_view.is_canceled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-canceled state.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Visible to all clones of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_token_is_not_canceled() {
        let token = CancelToken::new();
        assert!(!token.is_canceled());
    }

    #[test]
    fn test_cancel_is_observed_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();

        token.cancel();

        assert!(token.is_canceled());
        assert!(clone.is_canceled());
    }

    #[test]
    fn test_cancel_crosses_threads() {
        let token = CancelToken::new();
        let worker_token = token.clone();

        let handle = thread::spawn(move || {
            while !worker_token.is_canceled() {
                thread::yield_now();
            }
            true
        });

        token.cancel();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_default_matches_new() {
        assert!(!CancelToken::default().is_canceled());
    }
}
