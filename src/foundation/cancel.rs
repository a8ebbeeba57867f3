use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared cooperative cancellation flag.
///
/// Clones observe the same flag. Cancellation is sticky: once set it stays set for the lifetime
/// of every clone, so a fresh token is needed for each run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
