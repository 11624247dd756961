//! Platform webhook events.

use serde::{Deserialize, Deserializer};

use super::WebhookError;

/// Supporter fields shared by every event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupporterPayload {
    #[serde(default, deserialize_with = "id_as_string")]
    pub supporter_id: Option<String>,
    pub supporter_email: String,
    #[serde(deserialize_with = "required_id_as_string")]
    pub campaign_id: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A verified, parsed platform event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// `supporter.created` / `supporter.updated`
    SupporterUpserted(SupporterPayload),
    /// `supporter.deleted` / `supporter.cancelled`
    SupporterCancelled(SupporterPayload),
    PaymentSucceeded(SupporterPayload),
    PaymentFailed(SupporterPayload),
    /// Acknowledged and ignored.
    Unknown(String),
}

impl PlatformEvent {
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        let envelope: Envelope =
            serde_json::from_slice(body).map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let payload = || -> Result<SupporterPayload, WebhookError> {
            serde_json::from_value(envelope.data.clone())
                .map_err(|e| WebhookError::ParseError(e.to_string()))
        };

        let event = match envelope.event.as_str() {
            "supporter.created" | "supporter.updated" => {
                PlatformEvent::SupporterUpserted(payload()?)
            }
            "supporter.deleted" | "supporter.cancelled" => {
                PlatformEvent::SupporterCancelled(payload()?)
            }
            "payment.succeeded" => PlatformEvent::PaymentSucceeded(payload()?),
            "payment.failed" => PlatformEvent::PaymentFailed(payload()?),
            _ => PlatformEvent::Unknown(envelope.event.clone()),
        };
        Ok(event)
    }

    pub fn name(&self) -> &str {
        match self {
            PlatformEvent::SupporterUpserted(_) => "supporter.upserted",
            PlatformEvent::SupporterCancelled(_) => "supporter.cancelled",
            PlatformEvent::PaymentSucceeded(_) => "payment.succeeded",
            PlatformEvent::PaymentFailed(_) => "payment.failed",
            PlatformEvent::Unknown(name) => name,
        }
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn required_id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    id_as_string(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supporter_created() {
        let body = br#"{"event":"supporter.created","data":{"supporterId":"s-1","supporterEmail":"a@b.io","campaignId":"c-1","rewardLevel":"gold"}}"#;
        let event = PlatformEvent::parse(body).unwrap();
        assert_eq!(
            event,
            PlatformEvent::SupporterUpserted(SupporterPayload {
                supporter_id: Some("s-1".into()),
                supporter_email: "a@b.io".into(),
                campaign_id: "c-1".into(),
            })
        );
    }

    #[test]
    fn numeric_ids_become_strings() {
        let body = br#"{"event":"payment.failed","data":{"supporterId":99,"supporterEmail":"a@b.io","campaignId":12}}"#;
        match PlatformEvent::parse(body).unwrap() {
            PlatformEvent::PaymentFailed(p) => {
                assert_eq!(p.supporter_id.as_deref(), Some("99"));
                assert_eq!(p.campaign_id, "12");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn deleted_and_cancelled_share_variant() {
        for name in ["supporter.deleted", "supporter.cancelled"] {
            let body = format!(
                r#"{{"event":"{}","data":{{"supporterEmail":"a@b.io","campaignId":"c"}}}}"#,
                name
            );
            assert!(matches!(
                PlatformEvent::parse(body.as_bytes()).unwrap(),
                PlatformEvent::SupporterCancelled(_)
            ));
        }
    }

    #[test]
    fn unknown_event_is_kept_by_name() {
        let body = br#"{"event":"campaign.updated","data":{}}"#;
        assert_eq!(
            PlatformEvent::parse(body).unwrap(),
            PlatformEvent::Unknown("campaign.updated".into())
        );
    }

    #[test]
    fn malformed_body_is_parse_error() {
        assert!(matches!(
            PlatformEvent::parse(b"not json"),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn missing_campaign_is_parse_error() {
        let body = br#"{"event":"payment.failed","data":{"supporterEmail":"a@b.io"}}"#;
        assert!(PlatformEvent::parse(body).is_err());
    }
}
