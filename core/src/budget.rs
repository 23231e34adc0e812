use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// The clock is only read once every this many checks.
const CLOCK_CHECK_INTERVAL: u32 = 1024;

/// Limits the work done by a table construction or a join.
///
/// When the budget is exhausted, the operation stops early and returns what it produced so far,
/// flagged as incomplete. Clones share the same cancellation flag, so a clone can be used to
/// cancel an operation from another thread.
#[derive(Clone, Debug, Default)]
pub struct Budget {
    cancelled: Arc<AtomicBool>,
    checks: Arc<AtomicU32>,
    deadline: Option<Instant>,
    max_entries: Option<usize>,
}

impl Budget {
    /// Creates a budget without any limit.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Stops the work once `timeout` has elapsed, starting from now.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    /// Stops the work once `deadline` is reached.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);

        self
    }

    /// Stops an operation once it produced `max_entries` entries (table candidates or matches).
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);

        self
    }

    /// Cancels every operation using this budget or one of its clones.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns true if the budget was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns true if the budget is unlimited.
    pub fn is_unlimited(&self) -> bool {
        self.deadline.is_none() && self.max_entries.is_none() && !self.is_cancelled()
    }

    /// Returns true if an operation that already produced `produced` entries may produce
    /// another one.
    #[inline]
    pub fn allows(&self, produced: usize) -> bool {
        if self.is_cancelled() {
            return false;
        }

        if self.max_entries.is_some_and(|max| produced >= max) {
            return false;
        }

        if let Some(deadline) = self.deadline {
            let checks = self.checks.fetch_add(1, Ordering::Relaxed);
            if checks % CLOCK_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                // remember it so the next checks don't have to wait for the clock
                self.cancel();
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited() {
        let budget = Budget::unlimited();
        assert!(budget.is_unlimited());
        assert!(budget.allows(usize::MAX - 1));
    }

    #[test]
    fn test_max_entries() {
        let budget = Budget::unlimited().max_entries(3);
        assert!(budget.allows(2));
        assert!(!budget.allows(3));
    }

    #[test]
    fn test_cancel_from_clone() {
        let budget = Budget::unlimited();
        let handle = budget.clone();
        handle.cancel();

        assert!(budget.is_cancelled());
        assert!(!budget.allows(0));
    }

    #[test]
    fn test_deadline_in_the_past() {
        let budget = Budget::unlimited().deadline(Instant::now());
        assert!(!budget.allows(0));
        assert!(budget.is_cancelled());
    }
}
