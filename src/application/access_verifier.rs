//! AccessVerifier - resolves a supporter's entitlement and judges it.
//!
//! Live verification (webhooks, bot) and scheduled reconciliation both go
//! through [`AccessVerifier::check_integration`], which in turn calls the
//! pure [`evaluate`] predicate.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::access::{evaluate, AccessDecision, AccessGrant, Entitlement};
use crate::domain::foundation::{DomainError, ErrorCode, ErrorKind, IntegrationId, Timestamp};
use crate::domain::integration::Integration;
use crate::domain::membership::Email;
use crate::ports::{CampaignCatalog, IntegrationRepository, ProviderError, SubscriptionProvider};

/// Errors raised while verifying access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Integration {0} not found")]
    IntegrationNotFound(IntegrationId),

    #[error("Integration {0} is not active")]
    IntegrationInactive(IntegrationId),

    /// The provider refused the integration's credentials.
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    #[error("Subscription provider failed: {0}")]
    External(String),

    #[error("Internal error: {0}")]
    Infrastructure(String),
}

impl AccessError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AccessError::IntegrationNotFound(_) => ErrorCode::IntegrationNotFound,
            AccessError::IntegrationInactive(_) => ErrorCode::IntegrationInactive,
            AccessError::Configuration(_) => ErrorCode::ConfigurationError,
            AccessError::External(_) => ErrorCode::ExternalServiceError,
            AccessError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

impl From<ProviderError> for AccessError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unauthorized => AccessError::Configuration(err.to_string()),
            other => AccessError::External(other.to_string()),
        }
    }
}

impl From<DomainError> for AccessError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ConfigurationError => AccessError::Configuration(err.message),
            ErrorCode::ExternalServiceError | ErrorCode::RateLimited => {
                AccessError::External(err.message)
            }
            _ => AccessError::Infrastructure(err.to_string()),
        }
    }
}

impl From<AccessError> for DomainError {
    fn from(err: AccessError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}

/// Resolves entitlements from the subscription provider and evaluates them
/// against an integration's policy.
pub struct AccessVerifier {
    integrations: Arc<dyn IntegrationRepository>,
    catalog: Arc<dyn CampaignCatalog>,
    provider: Arc<dyn SubscriptionProvider>,
}

impl AccessVerifier {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        catalog: Arc<dyn CampaignCatalog>,
        provider: Arc<dyn SubscriptionProvider>,
    ) -> Self {
        Self {
            integrations,
            catalog,
            provider,
        }
    }

    /// Asks the provider about `email` using the integration's campaign
    /// credentials and maps the paid amount onto the campaign's tiers.
    ///
    /// # Errors
    ///
    /// - `Configuration` - the provider rejected the credentials
    /// - `External` - the provider failed or its quota is exhausted
    pub async fn resolve_entitlement(
        &self,
        email: &Email,
        integration: &Integration,
    ) -> Result<Entitlement, AccessError> {
        let charges = self
            .provider
            .fetch_charges(integration.credentials(), email)
            .await?;

        let Some(charges) = charges.filter(|c| c.is_backer) else {
            return Ok(Entitlement::not_subscribed());
        };

        let tiers = self.catalog.tiers(integration.campaign_id()).await?;
        let tier = tiers.tier_for_amount(charges.paid_value_cents).cloned();

        Ok(Entitlement {
            subscribed: true,
            payment_current: charges.is_paid_this_month,
            paid_value_cents: charges.paid_value_cents,
            tier,
        })
    }

    /// Loads the integration and checks access for `email`.
    ///
    /// # Errors
    ///
    /// - `IntegrationNotFound` / `IntegrationInactive`
    /// - provider errors as in [`Self::resolve_entitlement`]
    pub async fn check_access(
        &self,
        email: &Email,
        integration_id: IntegrationId,
    ) -> Result<AccessDecision, AccessError> {
        let integration = self
            .integrations
            .find_by_id(integration_id)
            .await?
            .ok_or(AccessError::IntegrationNotFound(integration_id))?;
        self.check_integration(&integration, email).await
    }

    /// Checks access against an already loaded integration.
    pub async fn check_integration(
        &self,
        integration: &Integration,
        email: &Email,
    ) -> Result<AccessDecision, AccessError> {
        if !integration.is_active() {
            return Err(AccessError::IntegrationInactive(integration.id()));
        }

        let entitlement = self.resolve_entitlement(email, integration).await?;

        let decision = match evaluate(&entitlement, integration.policy()) {
            Ok(()) => AccessDecision::Granted(AccessGrant::new(
                integration.id(),
                integration.chat_id(),
                email.clone(),
                entitlement,
                Timestamp::now(),
            )),
            Err(reason) => AccessDecision::Denied(reason),
        };

        tracing::debug!(
            integration_id = %integration.id(),
            granted = decision.is_granted(),
            denial = ?decision.denial(),
            "Access checked"
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryCampaignCatalog, InMemoryIntegrationRepository, InMemorySubscriptionProvider,
    };
    use crate::domain::access::DenialReason;
    use crate::domain::campaign::{Campaign, Tier};
    use crate::domain::foundation::ChatId;
    use crate::domain::groups::GroupKind;
    use crate::domain::integration::{AccessPolicy, GroupBinding, ProviderCredentials};
    use secrecy::SecretString;

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn tier(id: &str, amount: i64) -> Tier {
        Tier {
            id: id.into(),
            title: id.to_uppercase(),
            amount_cents: amount,
        }
    }

    fn integration(policy: AccessPolicy) -> Integration {
        Integration::new(
            "c-1",
            "podcast-x",
            "maker-1",
            GroupBinding {
                chat_id: ChatId::new(-100),
                title: "Backers".into(),
                kind: GroupKind::Supergroup,
            },
            policy,
            ProviderCredentials {
                api_key: "key".into(),
                bearer_token: SecretString::new("bearer".into()),
            },
            Timestamp::now(),
        )
    }

    struct Fixture {
        verifier: AccessVerifier,
        integrations: Arc<InMemoryIntegrationRepository>,
        provider: Arc<InMemorySubscriptionProvider>,
    }

    async fn fixture() -> Fixture {
        let integrations = Arc::new(InMemoryIntegrationRepository::new());
        let catalog = Arc::new(InMemoryCampaignCatalog::new());
        catalog
            .add(
                Campaign {
                    id: "c-1".into(),
                    slug: "podcast-x".into(),
                    title: "Podcast X".into(),
                    owner_id: "maker-1".into(),
                },
                vec![tier("bronze", 500), tier("silver", 1500), tier("gold", 3000)],
            )
            .await;
        let provider = Arc::new(InMemorySubscriptionProvider::new());
        Fixture {
            verifier: AccessVerifier::new(integrations.clone(), catalog, provider.clone()),
            integrations,
            provider,
        }
    }

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Entitlement Resolution
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_email_is_not_subscribed() {
        let f = fixture().await;
        let entitlement = f
            .verifier
            .resolve_entitlement(&email("ghost@b.io"), &integration(AccessPolicy::Open))
            .await
            .unwrap();
        assert_eq!(entitlement, Entitlement::not_subscribed());
    }

    #[tokio::test]
    async fn paid_amount_maps_to_highest_covered_tier() {
        let f = fixture().await;
        f.provider.set_paid("ana@b.io", 2000).await;

        let entitlement = f
            .verifier
            .resolve_entitlement(&email("ana@b.io"), &integration(AccessPolicy::Open))
            .await
            .unwrap();

        assert!(entitlement.subscribed);
        assert!(entitlement.payment_current);
        assert_eq!(entitlement.tier.map(|t| t.id), Some("silver".to_string()));
    }

    #[tokio::test]
    async fn provider_auth_failure_is_configuration_error() {
        let f = fixture().await;
        f.provider
            .set_failure("ana@b.io", ProviderError::Unauthorized)
            .await;

        let err = f
            .verifier
            .resolve_entitlement(&email("ana@b.io"), &integration(AccessPolicy::Open))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn provider_outage_is_external() {
        let f = fixture().await;
        f.provider
            .set_failure("ana@b.io", ProviderError::Unavailable("503".into()))
            .await;

        let err = f
            .verifier
            .resolve_entitlement(&email("ana@b.io"), &integration(AccessPolicy::Open))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::External);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Access Checks
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn grant_carries_integration_and_group() {
        let f = fixture().await;
        let i = integration(AccessPolicy::minimum(&tier("silver", 1500)));
        f.integrations.create(&i).await.unwrap();
        f.provider.set_paid("ana@b.io", 1500).await;

        let decision = f.verifier.check_access(&email("ana@b.io"), i.id()).await.unwrap();

        match decision {
            AccessDecision::Granted(grant) => {
                assert_eq!(grant.integration_id(), i.id());
                assert_eq!(grant.chat_id(), ChatId::new(-100));
            }
            AccessDecision::Denied(reason) => panic!("unexpected denial {}", reason),
        }
    }

    #[tokio::test]
    async fn denials_follow_the_predicate_order() {
        let f = fixture().await;
        let i = integration(AccessPolicy::minimum(&tier("silver", 1500)));
        f.integrations.create(&i).await.unwrap();
        f.provider.set_unpaid("late@b.io").await;
        f.provider.set_paid("cheap@b.io", 500).await;

        let check = |e: &'static str| {
            let verifier = &f.verifier;
            let id = i.id();
            async move { verifier.check_access(&email(e), id).await.unwrap().denial() }
        };

        assert_eq!(check("ghost@b.io").await, Some(DenialReason::NotSubscriber));
        assert_eq!(check("late@b.io").await, Some(DenialReason::PaymentPending));
        assert_eq!(check("cheap@b.io").await, Some(DenialReason::TierTooLow));
    }

    #[tokio::test]
    async fn inactive_integration_is_rejected_before_calling_provider() {
        let f = fixture().await;
        let mut i = integration(AccessPolicy::Open);
        i.deactivate(Timestamp::now());
        f.integrations.create(&i).await.unwrap();

        let err = f
            .verifier
            .check_access(&email("ana@b.io"), i.id())
            .await
            .unwrap_err();

        assert_eq!(err, AccessError::IntegrationInactive(i.id()));
        assert_eq!(f.provider.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_integration_is_not_found() {
        let f = fixture().await;
        let err = f
            .verifier
            .check_access(&email("ana@b.io"), IntegrationId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
