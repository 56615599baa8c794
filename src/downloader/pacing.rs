//! Pacing controller
//!
//! Tracks whether requests must be spaced out and how long to cool down
//! after a pacing violation. The cooldown grows by a fixed increment with
//! every violation and never resets within a run.

use crate::downloader::config::{BASE_COOLDOWN, COOLDOWN_INCREMENT, PACING_INTERVAL};
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of a pacing violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingDecision {
    /// Re-issue the same batch after `wait`
    Retry {
        /// Cooldown before the retry
        wait: Duration,
    },
    /// The configured ceiling was reached
    Exhausted {
        /// Violations seen so far
        violations: u32,
    },
}

/// Request spacing and cooldown state
#[derive(Debug, Clone)]
pub struct PacingController {
    active: bool,
    cooldown: Duration,
    violations: u32,
    max_retries: Option<u32>,
}

impl PacingController {
    /// New controller; `active` turns the inter-batch delay on from the start
    pub fn new(active: bool) -> Self {
        Self {
            active,
            cooldown: BASE_COOLDOWN,
            violations: 0,
            max_retries: None,
        }
    }

    /// Give up after `max` violations
    pub fn with_max_retries(mut self, max: Option<u32>) -> Self {
        self.max_retries = max;
        self
    }

    /// Register a violation and decide how to proceed
    pub fn on_violation(&mut self) -> PacingDecision {
        self.violations += 1;
        self.active = true;

        if let Some(max) = self.max_retries {
            if self.violations > max {
                warn!(
                    violations = self.violations,
                    max_retries = max,
                    "Pacing violation ceiling reached"
                );
                return PacingDecision::Exhausted {
                    violations: self.violations,
                };
            }
        }

        let wait = self.cooldown;
        self.cooldown += COOLDOWN_INCREMENT;
        info!(
            "Historical data pacing violation: retrying last batch and using {} sec interval between data requests",
            PACING_INTERVAL.as_secs()
        );
        info!("Cooling down for {} seconds...", wait.as_secs());
        PacingDecision::Retry { wait }
    }

    /// Delay before the next regular batch request
    pub fn inter_batch_delay(&self) -> Duration {
        if self.active {
            PACING_INTERVAL
        } else {
            Duration::ZERO
        }
    }

    /// Whether pacing mode is on
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Cooldown the next violation will wait
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Violations seen so far
    pub fn violations(&self) -> u32 {
        self.violations
    }
}
