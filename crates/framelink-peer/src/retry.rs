use std::time::Duration;

use crate::shutdown::ShutdownSignal;

/// Waits out the pause between connection attempts.
pub trait Sleeper {
    /// Pause for `delay`. Returns `false` if the wait was cut short by
    /// shutdown.
    fn sleep(&mut self, delay: Duration, shutdown: &ShutdownSignal) -> bool;
}

/// Real-time sleeper that parks on the shutdown signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, delay: Duration, shutdown: &ShutdownSignal) -> bool {
        !shutdown.wait_timeout(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_sleeper_returns_early_on_shutdown() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        assert!(!ThreadSleeper.sleep(Duration::from_secs(60), &signal));
    }

    #[test]
    fn thread_sleeper_completes_without_shutdown() {
        let signal = ShutdownSignal::new();
        assert!(ThreadSleeper.sleep(Duration::from_millis(1), &signal));
    }
}
