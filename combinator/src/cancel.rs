use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, derive_more::Display)]
pub enum CancelCause {
    #[display(fmt = "cancelled")]
    Cancelled,
    #[display(fmt = "deadline exceeded")]
    DeadlineExceeded,
}

impl std::error::Error for CancelCause {}

/// Cooperative cancellation signal shared between a reduction and whoever
/// started it.
///
/// Clones share the same flag, so `cancel` on any clone (from any thread) is
/// seen by all of them. The reducer polls the token at each frame it enters.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A token sharing this one's flag that also expires at `deadline`, or at
    /// the current deadline if that comes first.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    pub fn check(&self) -> Result<(), CancelCause> {
        if self.flag.load(Ordering::Relaxed) {
            return Err(CancelCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(CancelCause::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
