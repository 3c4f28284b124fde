//! Re-entrancy window between locally-issued commands and their session
//! echoes.
//!
//! The guard is raised right before issuing a command that will echo back
//! through the event feed (publishing or unpublishing a local track) and
//! stays raised for a fixed window, because the echo arrives
//! asynchronously. Reconciliation passes skip intent corrections while it
//! is raised. Deliberately time-based rather than correlated per request,
//! a round-trip slower than the window can still cause a brief flicker.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct SyncGuard {
    hold: Duration,
    raised_until: Option<Instant>,
}

impl SyncGuard {
    pub const DEFAULT_HOLD: Duration = Duration::from_millis(150);

    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            raised_until: None,
        }
    }

    pub fn raise(&mut self) {
        self.raised_until = Some(Instant::now() + self.hold);
    }

    pub fn is_raised(&self) -> bool {
        self.raised_until.is_some_and(|until| Instant::now() < until)
    }
}

impl Default for SyncGuard {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HOLD)
    }
}

#[cfg(test)]
mod test {
    use super::SyncGuard;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn lowers_after_the_hold_window() {
        let mut guard = SyncGuard::new(Duration::from_millis(150));
        assert!(!guard.is_raised());

        guard.raise();
        assert!(guard.is_raised());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(guard.is_raised());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!guard.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn re_raising_extends_the_window() {
        let mut guard = SyncGuard::new(Duration::from_millis(150));
        guard.raise();
        tokio::time::advance(Duration::from_millis(100)).await;
        guard.raise();
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(guard.is_raised());
    }
}
