use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

/// Estimated LLM cost per operation, in cents. Rounded up; the point is a
/// hard ceiling on a runaway batch, not accounting-grade precision.
pub struct OperationCost;

impl OperationCost {
    pub const SEMANTIC_SCAN: u64 = 1;
    pub const FULL_REWRITE: u64 = 2;
    pub const BRIEF_SYNTHESIS: u64 = 1;
    pub const FEED_OUTPUT: u64 = 1;
    /// One pipeline pass: semantic scan plus three generators.
    pub const PIPELINE: u64 = Self::SEMANTIC_SCAN
        + Self::FULL_REWRITE
        + Self::BRIEF_SYNTHESIS
        + Self::FEED_OUTPUT;
}

/// Caps cumulative LLM spend for a run. Shared across concurrent batch items,
/// so the counter is atomic; a limit of 0 disables tracking.
pub struct BudgetTracker {
    limit_cents: u64,
    spent_cents: AtomicU64,
}

impl BudgetTracker {
    pub fn new(limit_cents: u64) -> Self {
        Self {
            limit_cents,
            spent_cents: AtomicU64::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn is_active(&self) -> bool {
        self.limit_cents > 0
    }

    /// Whether an operation of this cost still fits under the limit.
    pub fn can_afford(&self, cost_cents: u64) -> bool {
        !self.is_active() || self.spent_cents.load(Ordering::Relaxed) + cost_cents <= self.limit_cents
    }

    /// Record spend. Returns false when this charge crossed the limit;
    /// the spend is still recorded either way.
    pub fn charge(&self, cost_cents: u64) -> bool {
        let spent = self.spent_cents.fetch_add(cost_cents, Ordering::Relaxed) + cost_cents;
        if self.is_active() && spent > self.limit_cents {
            warn!(spent, limit = self.limit_cents, "LLM budget exceeded");
            return false;
        }
        true
    }

    pub fn total_spent(&self) -> u64 {
        self.spent_cents.load(Ordering::Relaxed)
    }

    pub fn remaining(&self) -> u64 {
        if !self.is_active() {
            return u64::MAX;
        }
        self.limit_cents.saturating_sub(self.total_spent())
    }

    pub fn log_status(&self) {
        if self.is_active() {
            info!(
                spent_cents = self.total_spent(),
                remaining_cents = self.remaining(),
                limit_cents = self.limit_cents,
                "Budget status"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_budget_never_blocks() {
        let tracker = BudgetTracker::unlimited();
        assert!(!tracker.is_active());
        assert!(tracker.can_afford(10_000));
        assert!(tracker.charge(10_000));
        assert_eq!(tracker.remaining(), u64::MAX);
    }

    #[test]
    fn charges_accumulate() {
        let tracker = BudgetTracker::new(100);
        assert!(tracker.can_afford(OperationCost::PIPELINE));
        assert!(tracker.charge(60));
        assert_eq!(tracker.total_spent(), 60);
        assert_eq!(tracker.remaining(), 40);
    }

    #[test]
    fn crossing_the_limit_still_records() {
        let tracker = BudgetTracker::new(100);
        assert!(tracker.charge(80));
        assert!(!tracker.can_afford(30));
        assert!(!tracker.charge(30));
        assert_eq!(tracker.total_spent(), 110);
        assert_eq!(tracker.remaining(), 0);
    }
}
