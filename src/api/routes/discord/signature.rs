//! Ed25519 check Discord requires on every interaction request.

use anyhow::{Context, Result, anyhow};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

#[derive(Debug, Clone)]
pub struct InteractionVerifier {
    key: VerifyingKey,
}

impl InteractionVerifier {
    /// `public_key` is the hex encoded key from the application's settings.
    pub fn from_hex(public_key: &str) -> Result<Self> {
        let bytes: [u8; 32] = hex::decode(public_key.trim())
            .context("Discord public key is not valid hex")?
            .try_into()
            .map_err(|_| anyhow!("Discord public key must be 32 bytes"))?;
        let key = VerifyingKey::from_bytes(&bytes).context("Invalid Discord public key")?;
        Ok(Self { key })
    }

    /// Discord signs the timestamp header followed by the raw body.
    pub fn verify(&self, signature: &str, timestamp: &str, body: &[u8]) -> bool {
        let Ok(bytes) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(bytes) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        let signature = Signature::from_bytes(&bytes);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        self.key.verify(&message, &signature).is_ok()
    }
}
