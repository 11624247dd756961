//! reqwest implementation of SubscriptionProvider.
//!
//! One endpoint: `GET {base}/backers/charges/{email}`, authenticated per
//! campaign with `x-api-key` and a bearer token.
//!
//! | Status | Result |
//! |--------|--------|
//! | 200 | `Some(ChargeStatus)` |
//! | 404 | `None` (e-mail unknown to the campaign) |
//! | 401 | `Unauthorized` |
//! | 429 | `RateLimited` |
//! | other | `Unavailable` |

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::integration::ProviderCredentials;
use crate::domain::membership::Email;
use crate::ports::{ChargeStatus, ProviderError, SubscriptionProvider};

#[derive(Debug, Clone)]
pub struct HttpSubscriptionConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl HttpSubscriptionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Response body of the charges endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChargesResponse {
    is_backer: bool,
    is_paid_this_month: bool,
    /// Currency units; may carry centavos as a fraction.
    #[serde(default)]
    this_month_paid_value: Option<f64>,
}

impl From<ChargesResponse> for ChargeStatus {
    fn from(body: ChargesResponse) -> Self {
        let paid_value_cents = body
            .this_month_paid_value
            .map(|value| (value * 100.0).round() as i64)
            .unwrap_or(0);
        Self {
            is_backer: body.is_backer,
            is_paid_this_month: body.is_paid_this_month,
            paid_value_cents,
        }
    }
}

pub struct HttpSubscriptionProvider {
    config: HttpSubscriptionConfig,
    client: Client,
}

impl HttpSubscriptionProvider {
    pub fn new(config: HttpSubscriptionConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// `{base}/backers/charges/{email}` with the e-mail percent-encoded as a
    /// single path segment.
    fn charges_url(&self, email: &Email) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ProviderError::InvalidResponse(format!("bad provider base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidResponse("provider base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["backers", "charges", email.as_str()]);
        Ok(url)
    }
}

/// Short form of an e-mail for logs.
fn redact(email: &Email) -> String {
    let prefix: String = email.as_str().chars().take(3).collect();
    format!("{}***", prefix)
}

fn map_error_status(status: StatusCode, body: &str) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited("provider returned 429".into()),
        _ => ProviderError::Unavailable(format!("status {}: {}", status, body)),
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Unavailable("request timed out".into())
    } else if e.is_connect() {
        ProviderError::Unavailable(format!("connection failed: {}", e))
    } else {
        ProviderError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl SubscriptionProvider for HttpSubscriptionProvider {
    async fn fetch_charges(
        &self,
        credentials: &ProviderCredentials,
        email: &Email,
    ) -> Result<Option<ChargeStatus>, ProviderError> {
        let url = self.charges_url(email)?;

        let response = self
            .client
            .get(url)
            .header("accept", "*/*")
            .header("x-api-key", &credentials.api_key)
            .bearer_auth(credentials.bearer_token.expose_secret())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::info!(email = %redact(email), "Supporter e-mail unknown to provider");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = map_error_status(status, &body);
            match &err {
                ProviderError::RateLimited(_) => {
                    tracing::warn!("Provider rate limit hit");
                }
                ProviderError::Unauthorized => {
                    tracing::error!("Provider rejected campaign credentials");
                }
                _ => {
                    tracing::error!(status = status.as_u16(), "Provider request failed");
                }
            }
            return Err(err);
        }

        let body: ChargesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            email = %redact(email),
            is_backer = body.is_backer,
            is_paid_this_month = body.is_paid_this_month,
            "Supporter charges fetched"
        );
        Ok(Some(body.into()))
    }
}
