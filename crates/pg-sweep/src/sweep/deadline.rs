//! Absolute wall-clock deadline for a run.

use std::time::Duration;

use tokio::time::Instant;

/// A single absolute instant computed once at run start.
///
/// All budget checks compare against it; the budget is never recomputed.
/// Built on the tokio clock so tests can drive it with a paused runtime.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// True once the deadline has been reached.
    pub fn passed(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left before the deadline; zero once passed.
    pub fn remaining(&self) -> Duration {
        self.at.duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_passes_after_budget() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.passed());
        assert_eq!(deadline.remaining(), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!deadline.passed());
        assert_eq!(deadline.remaining(), Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(41)).await;
        assert!(deadline.passed());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_is_immediately_passed() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.passed());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }
}
