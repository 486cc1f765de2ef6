use std::time::Duration;

use tokio::time::Instant;

/// Single re-armable deadline: each `rearm` replaces the previous deadline,
/// so a burst of requests ends exactly one window after the last of them.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use lesson_engine::debounce::QuietWindow;
/// use tokio::time::Instant;
///
/// let start = Instant::now();
/// let mut window = QuietWindow::new(Duration::from_millis(600));
/// window.rearm(start);
/// window.rearm(start + Duration::from_millis(200));
///
/// assert!(!window.take_if_due(start + Duration::from_millis(600)));
/// assert!(window.take_if_due(start + Duration::from_millis(800)));
/// assert!(!window.is_armed());
/// ```
#[derive(Debug, Clone)]
pub struct QuietWindow {
    window: Duration,
    deadline: Option<Instant>,
}

impl QuietWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn rearm(&mut self, now: Instant) -> Instant {
        let deadline = now + self.window;
        self.deadline = Some(deadline);
        deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarms and returns true when the deadline has passed.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Sleeps until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{QuietWindow, sleep_until_deadline};

    #[test]
    fn burst_collapses_to_one_deadline_after_last_request() {
        let start = Instant::now();
        let mut window = QuietWindow::new(Duration::from_millis(600));

        for offset in [0, 100, 250, 400] {
            window.rearm(start + Duration::from_millis(offset));
        }

        let last_deadline = start + Duration::from_millis(1_000);
        assert_eq!(window.deadline(), Some(last_deadline));
        assert!(!window.take_if_due(start + Duration::from_millis(600)));
        assert!(!window.take_if_due(start + Duration::from_millis(999)));
        assert!(window.take_if_due(last_deadline));
        assert!(!window.take_if_due(last_deadline + Duration::from_secs(5)));
    }

    #[test]
    fn cancel_disarms_the_window() {
        let mut window = QuietWindow::new(Duration::from_millis(600));
        window.rearm(Instant::now());

        window.cancel();

        assert!(!window.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_until_deadline_wakes_at_the_deadline() {
        let start = Instant::now();
        sleep_until_deadline(Some(start + Duration::from_millis(600))).await;

        assert_eq!(start.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_deadline_never_wakes() {
        let outcome = tokio::time::timeout(Duration::from_secs(60), sleep_until_deadline(None)).await;

        assert!(outcome.is_err());
    }
}
