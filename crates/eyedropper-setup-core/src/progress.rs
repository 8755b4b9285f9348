//! Combines cache and execute progress into one overall percentage.

use tracing::warn;

/// Progress inputs fed by separate callback families during apply.
///
/// The overall value is `(cache + execute) / phase_count` with integer
/// division. Inputs are taken as reported: no clamping, no smoothing, and a
/// later report may be lower than an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressAggregator {
    cache: u32,
    execute: u32,
    phase_count: u32,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        // One phase until ApplyBegin says otherwise, so early reports cannot divide by zero.
        Self {
            cache: 0,
            execute: 0,
            phase_count: 1,
        }
    }
}

impl ProgressAggregator {
    pub fn set_phase_count(&mut self, phase_count: u32) {
        if phase_count == 0 {
            warn!("apply reported zero progress phases; treating as one");
        }
        self.phase_count = phase_count.max(1);
    }

    pub fn set_cache(&mut self, percentage: u32) {
        self.cache = percentage;
    }

    pub fn set_execute(&mut self, percentage: u32) {
        self.execute = percentage;
    }

    pub fn complete_cache(&mut self) {
        self.cache = 100;
    }

    pub fn phase_count(&self) -> u32 {
        self.phase_count
    }

    pub fn overall(&self) -> u32 {
        (self.cache + self.execute) / self.phase_count
    }
}
