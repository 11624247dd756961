//! Provider quota configuration.

use serde::{Deserialize, Serialize};

use crate::ports::RateLimitWindow;

/// Published ceilings of the subscription provider, per campaign credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRateLimits {
    pub requests_per_second: u32,
    pub requests_per_month: u32,
}

impl ProviderRateLimits {
    pub fn limit_for(&self, window: RateLimitWindow) -> u32 {
        match window {
            RateLimitWindow::Second => self.requests_per_second,
            RateLimitWindow::Month => self.requests_per_month,
        }
    }
}

impl Default for ProviderRateLimits {
    fn default() -> Self {
        Self {
            requests_per_second: 5,
            requests_per_month: 5000,
        }
    }
}
