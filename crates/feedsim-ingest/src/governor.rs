//! Randomized pacing
//!
//! Instead of loading an object in one burst, rows can be trickled in blocks
//! whose size and trailing pause are drawn fresh at every block boundary.

use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;

/// Draws block sizes and delays within fixed bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateGovernor {
    min_block: usize,
    max_block: usize,
    min_delay: Duration,
    max_delay: Duration,
}

impl RateGovernor {
    /// Bounds are clamped so that `1 <= min_block <= max_block` and
    /// `min_delay <= max_delay`.
    pub fn new(min_block: usize, max_block: usize, min_delay: Duration, max_delay: Duration) -> Self {
        let min_block = min_block.max(1);
        Self {
            min_block,
            max_block: max_block.max(min_block),
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn from_config(pacing: &PacingConfig) -> Self {
        Self::new(
            pacing.min_block,
            pacing.max_block,
            Duration::from_millis(pacing.min_delay_ms),
            Duration::from_millis(pacing.max_delay_ms),
        )
    }

    /// A block size in `min_block..=max_block`
    pub fn block_size(&self) -> usize {
        rand::rng().random_range(self.min_block..=self.max_block)
    }

    /// A delay in `min_delay..=max_delay`, millisecond resolution
    pub fn delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Start a block, never sized beyond the `remaining` row budget
    pub fn next_block(&self, consumed: usize, remaining: usize) -> BatchState {
        BatchState {
            consumed,
            block_size: self.block_size().min(remaining),
            delay: self.delay(),
        }
    }
}

/// Pacing state for the block currently being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchState {
    /// Records consumed when this block started
    pub consumed: usize,
    pub block_size: usize,
    /// Pause taken once the block is full
    pub delay: Duration,
}

impl BatchState {
    /// Whether `consumed` records in total complete this block
    pub fn is_complete(&self, consumed: usize) -> bool {
        consumed >= self.consumed + self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draws_stay_within_bounds() {
        let governor = RateGovernor::new(3, 7, Duration::from_millis(10), Duration::from_millis(40));
        for _ in 0..500 {
            let size = governor.block_size();
            assert!((3..=7).contains(&size));
            let delay = governor.delay();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(40));
        }
    }

    #[test]
    fn test_fixed_bounds_are_deterministic() {
        let governor = RateGovernor::new(5, 5, Duration::from_millis(20), Duration::from_millis(20));
        assert_eq!(governor.block_size(), 5);
        assert_eq!(governor.delay(), Duration::from_millis(20));
    }

    #[test]
    fn test_block_never_exceeds_remaining_budget() {
        let governor = RateGovernor::new(10, 20, Duration::ZERO, Duration::ZERO);
        for remaining in 0..15 {
            let block = governor.next_block(0, remaining);
            assert!(block.block_size <= remaining);
        }
        assert_eq!(governor.next_block(4, 3).block_size, 3);
    }

    #[test]
    fn test_block_boundary() {
        let block = BatchState {
            consumed: 6,
            block_size: 4,
            delay: Duration::ZERO,
        };
        assert!(!block.is_complete(9));
        assert!(block.is_complete(10));
    }

    #[test]
    fn test_inverted_bounds_are_clamped() {
        let governor = RateGovernor::new(0, 0, Duration::from_millis(50), Duration::from_millis(10));
        assert_eq!(governor.block_size(), 1);
        assert_eq!(governor.delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_from_config() {
        let governor = RateGovernor::from_config(&PacingConfig {
            min_block: 2,
            max_block: 4,
            min_delay_ms: 100,
            max_delay_ms: 300,
        });
        assert_eq!(
            governor,
            RateGovernor::new(2, 4, Duration::from_millis(100), Duration::from_millis(300))
        );
    }
}
