//! HMAC-signed transfer URLs for backends without native presigning.
//!
//! Message: `{method}\n{key}\n{expires}\n{content_type}` where `expires` is a unix
//! timestamp in seconds and `content_type` is empty for GET.
//! Signature: hex(HMAC-SHA256(secret, message)).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignedMethod {
    Get,
    Put,
}

impl SignedMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SignedMethod::Get => "GET",
            SignedMethod::Put => "PUT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GET" => Some(SignedMethod::Get),
            "PUT" => Some(SignedMethod::Put),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(
        &self,
        method: SignedMethod,
        key: &str,
        expires: i64,
        content_type: &str,
    ) -> StorageResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| StorageError::SigningFailed(e.to_string()))?;
        mac.update(method.as_str().as_bytes());
        mac.update(b"\n");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac.update(b"\n");
        mac.update(content_type.as_bytes());
        Ok(mac)
    }

    pub fn sign(
        &self,
        method: SignedMethod,
        key: &str,
        expires: i64,
        content_type: &str,
    ) -> StorageResult<String> {
        let mac = self.mac(method, key, expires, content_type)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time signature check plus expiry check against `now` (unix seconds).
    pub fn verify(
        &self,
        method: SignedMethod,
        key: &str,
        expires: i64,
        content_type: &str,
        signature: &str,
        now: i64,
    ) -> StorageResult<()> {
        if now > expires {
            return Err(StorageError::InvalidSignature);
        }
        let tag = hex::decode(signature).map_err(|_| StorageError::InvalidSignature)?;
        let mac = self.mac(method, key, expires, content_type)?;
        mac.verify_slice(&tag)
            .map_err(|_| StorageError::InvalidSignature)?;
        Ok(())
    }
}
