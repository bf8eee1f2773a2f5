use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a signed download URL is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("download link has expired")]
    Expired,
    #[error("download link signature is invalid")]
    Mismatch,
    #[error("url signing key is invalid")]
    InvalidKey,
}

/// Issues and verifies time-limited download URLs for backends that cannot
/// presign on their own. The signature is HMAC-SHA256 over the object path
/// and the expiry timestamp.
#[derive(Clone)]
pub struct UrlSigner {
    base_url: String,
    key: HmacSha256,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(
        base_url: impl Into<String>,
        secret: impl AsRef<[u8]>,
    ) -> Result<Self, SignatureError> {
        let key = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key,
        })
    }

    fn mac(&self, path: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.key.clone();
        mac.update(path.as_bytes());
        mac.update(&[0u8]);
        mac.update(expires.to_string().as_bytes());
        mac
    }

    fn signature(&self, path: &str, expires: i64) -> String {
        hex::encode(self.mac(path, expires).finalize().into_bytes())
    }

    pub fn sign(&self, path: &str, ttl: Duration) -> String {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let sig = self.signature(path, expires);
        format!("{}/{path}?expires={expires}&sig={sig}", self.base_url)
    }

    pub fn verify(&self, path: &str, expires: i64, sig: &str) -> Result<(), SignatureError> {
        if expires < Utc::now().timestamp() {
            return Err(SignatureError::Expired);
        }
        let sig = hex::decode(sig).map_err(|_| SignatureError::Mismatch)?;
        self.mac(path, expires)
            .verify_slice(&sig)
            .map_err(|_| SignatureError::Mismatch)
    }
}
