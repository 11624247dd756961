//! Platform webhook signature verification.
//!
//! The platform signs the raw request body with HMAC-SHA256 and sends the hex
//! digest in a header. Verification happens on the raw bytes, before any JSON
//! parsing.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::WebhookError;

/// Header carrying the hex signature.
pub const SIGNATURE_HEADER: &str = "x-platform-signature";

/// Verifier for platform webhook signatures.
pub struct WebhookSignatureVerifier {
    secret: SecretString,
}

impl WebhookSignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifies `signature` (hex) against `payload`.
    ///
    /// # Errors
    ///
    /// - `MissingSignature` - header absent or empty
    /// - `InvalidSignature` - not hex, or digest mismatch
    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> Result<(), WebhookError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(WebhookError::MissingSignature)?;
        let provided = hex::decode(signature).map_err(|_| WebhookError::InvalidSignature)?;
        let expected = self.compute(payload);

        if !constant_time_compare(&expected, &provided) {
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }

    /// Hex signature for `payload`, as the platform would send it.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.compute(payload))
    }

    fn compute(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
