use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-payment-signature";
pub const TIMESTAMP_HEADER: &str = "x-payment-timestamp";

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("HMAC computation failed: {0}")]
    HmacError(String),

    #[error("signature mismatch")]
    Mismatch,
}

/// HMAC-SHA256 signer for processor webhooks.
///
/// message = `{timestamp}{body}`, signature is standard base64.
#[derive(Clone)]
pub struct WebhookSigner {
    secret: String,
}

impl WebhookSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| SignatureError::HmacError(e.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(body);
        Ok(mac)
    }

    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let result = self.mac(timestamp, body)?.finalize();
        Ok(BASE64.encode(result.into_bytes()))
    }

    /// Constant-time comparison against a received signature.
    pub fn verify(&self, timestamp: &str, body: &[u8], signature: &str) -> Result<(), SignatureError> {
        let expected = BASE64.decode(signature.trim())?;
        self.mac(timestamp, body)?
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}

impl std::fmt::Debug for WebhookSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSigner").finish_non_exhaustive()
    }
}
