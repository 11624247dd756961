//! HTTP client for the crowdfunding platform's supporter API.

mod http_provider;

pub use http_provider::{HttpSubscriptionConfig, HttpSubscriptionProvider};
