//! Telegram login proof verification.
//!
//! The login widget hands the browser a set of fields plus a `hash`. The hash
//! is HMAC-SHA256 over the remaining fields as sorted `key=value` lines joined
//! by `\n`, keyed with SHA-256 of the bot token. A proof older than the
//! freshness window is rejected even when the signature matches.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::domain::foundation::{ChatUserId, Timestamp};

use super::ChatIdentity;

/// Default freshness window for `auth_date` (5 minutes).
pub const DEFAULT_MAX_PROOF_AGE_SECS: i64 = 300;

/// Clock drift tolerated for an `auth_date` ahead of our clock.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

const REQUIRED_FIELDS: [&str; 3] = ["id", "first_name", "auth_date"];

/// Why a proof was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("login proof is missing field '{0}'")]
    MissingField(&'static str),

    #[error("login proof field '{field}' is malformed")]
    Malformed { field: &'static str },

    #[error("login proof signature does not match")]
    InvalidSignature,

    #[error("login proof is {age_secs}s old")]
    Stale { age_secs: i64 },

    #[error("login proof is dated {ahead_secs}s in the future")]
    FromTheFuture { ahead_secs: i64 },
}

/// Fields posted back by the login widget.
///
/// Values arrive as a mix of JSON strings and numbers; they are kept in their
/// textual form because that is what was signed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, serde_json::Value>")]
pub struct IdentityProof {
    fields: BTreeMap<String, String>,
    hash: String,
}

impl IdentityProof {
    pub fn from_fields(mut fields: BTreeMap<String, String>) -> Result<Self, ProofError> {
        let hash = fields.remove("hash").ok_or(ProofError::MissingField("hash"))?;
        for required in REQUIRED_FIELDS {
            if !fields.contains_key(required) {
                return Err(ProofError::MissingField(required));
            }
        }
        Ok(Self { fields, hash })
    }

    /// Sorted `key=value` lines, excluding the hash.
    pub fn data_check_string(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn auth_date(&self) -> Result<i64, ProofError> {
        self.field("auth_date")
            .and_then(|v| v.parse().ok())
            .ok_or(ProofError::Malformed { field: "auth_date" })
    }

    fn user_id(&self) -> Result<ChatUserId, ProofError> {
        self.field("id")
            .and_then(|v| v.parse().ok())
            .map(ChatUserId::new)
            .ok_or(ProofError::Malformed { field: "id" })
    }
}

impl TryFrom<BTreeMap<String, serde_json::Value>> for IdentityProof {
    type Error = ProofError;

    fn try_from(raw: BTreeMap<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let fields = raw
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => return None,
                    other => other.to_string(),
                };
                Some((key, text))
            })
            .collect();
        IdentityProof::from_fields(fields)
    }
}

/// Verifies login proofs against the bot token.
#[derive(Clone)]
pub struct IdentityVerifier {
    secret_key: [u8; 32],
    max_age_secs: i64,
}

impl IdentityVerifier {
    pub fn new(bot_token: &SecretString, max_age_secs: i64) -> Self {
        let digest = Sha256::digest(bot_token.expose_secret().as_bytes());
        Self {
            secret_key: digest.into(),
            max_age_secs,
        }
    }

    /// Checks signature, then freshness, and extracts the chat identity.
    pub fn verify(&self, proof: &IdentityProof, now: Timestamp) -> Result<ChatIdentity, ProofError> {
        let provided =
            hex::decode(&proof.hash).map_err(|_| ProofError::Malformed { field: "hash" })?;
        let expected = self.compute(&proof.data_check_string());
        if !constant_time_compare(&expected, &provided) {
            return Err(ProofError::InvalidSignature);
        }

        let age_secs = now.as_unix_secs() - proof.auth_date()?;
        if age_secs < -MAX_CLOCK_SKEW_SECS {
            return Err(ProofError::FromTheFuture {
                ahead_secs: -age_secs,
            });
        }
        if age_secs > self.max_age_secs {
            return Err(ProofError::Stale { age_secs });
        }

        Ok(ChatIdentity {
            user_id: proof.user_id()?,
            first_name: proof.field("first_name").unwrap_or_default().to_string(),
            username: proof.field("username").map(str::to_string),
        })
    }

    /// Produces a signed proof for the given fields.
    ///
    /// Used to build fixtures and by local tooling that simulates the widget.
    pub fn sign(&self, mut fields: BTreeMap<String, String>) -> Result<IdentityProof, ProofError> {
        fields.remove("hash");
        let check = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n");
        fields.insert("hash".to_string(), hex::encode(self.compute(&check)));
        IdentityProof::from_fields(fields)
    }

    fn compute(&self, data_check_string: &str) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret_key).expect("HMAC accepts any key");
        mac.update(data_check_string.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for IdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier")
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT_TOKEN: &str = "123456:test-bot-token";
    const NOW: i64 = 1_700_000_000;

    fn verifier() -> IdentityVerifier {
        IdentityVerifier::new(&SecretString::new(BOT_TOKEN.to_string()), DEFAULT_MAX_PROOF_AGE_SECS)
    }

    fn fields(auth_date: i64) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("id".to_string(), "4242".to_string()),
            ("first_name".to_string(), "Ana".to_string()),
            ("username".to_string(), "ana_p".to_string()),
            ("auth_date".to_string(), auth_date.to_string()),
        ])
    }

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(NOW).unwrap()
    }

    #[test]
    fn data_check_string_is_sorted_without_hash() {
        let proof = verifier().sign(fields(NOW)).unwrap();
        assert_eq!(
            proof.data_check_string(),
            format!("auth_date={}\nfirst_name=Ana\nid=4242\nusername=ana_p", NOW)
        );
    }

    #[test]
    fn fresh_signed_proof_yields_identity() {
        let proof = verifier().sign(fields(NOW - 120)).unwrap();
        let identity = verifier().verify(&proof, now()).unwrap();
        assert_eq!(identity.user_id, ChatUserId::new(4242));
        assert_eq!(identity.first_name, "Ana");
        assert_eq!(identity.username.as_deref(), Some("ana_p"));
    }

    #[test]
    fn stale_proof_is_rejected() {
        let proof = verifier().sign(fields(NOW - 400)).unwrap();
        assert_eq!(
            verifier().verify(&proof, now()),
            Err(ProofError::Stale { age_secs: 400 })
        );
    }

    #[test]
    fn future_dated_proof_is_rejected() {
        let proof = verifier().sign(fields(NOW + 3600)).unwrap();
        assert_eq!(
            verifier().verify(&proof, now()),
            Err(ProofError::FromTheFuture { ahead_secs: 3600 })
        );
    }

    #[test]
    fn small_clock_skew_is_tolerated() {
        let proof = verifier().sign(fields(NOW + 30)).unwrap();
        assert!(verifier().verify(&proof, now()).is_ok());
    }

    #[test]
    fn tampered_field_breaks_signature() {
        let proof = verifier().sign(fields(NOW)).unwrap();
        let mut tampered = proof.fields.clone();
        tampered.insert("id".into(), "1".into());
        tampered.insert("hash".into(), proof.hash.clone());
        let tampered = IdentityProof::from_fields(tampered).unwrap();
        assert_eq!(verifier().verify(&tampered, now()), Err(ProofError::InvalidSignature));
    }

    #[test]
    fn proof_signed_with_other_token_is_rejected() {
        let other = IdentityVerifier::new(&SecretString::new("999:other".into()), 300);
        let proof = other.sign(fields(NOW)).unwrap();
        assert_eq!(verifier().verify(&proof, now()), Err(ProofError::InvalidSignature));
    }

    #[test]
    fn missing_hash_is_reported() {
        assert_eq!(
            IdentityProof::from_fields(fields(NOW)),
            Err(ProofError::MissingField("hash"))
        );
    }

    #[test]
    fn deserializes_numeric_json_fields() {
        let signed = verifier().sign(fields(NOW)).unwrap();
        let json = serde_json::json!({
            "id": 4242,
            "first_name": "Ana",
            "username": "ana_p",
            "auth_date": NOW,
            "hash": signed.hash,
        });
        let proof: IdentityProof = serde_json::from_value(json).unwrap();
        assert!(verifier().verify(&proof, now()).is_ok());
    }
}
