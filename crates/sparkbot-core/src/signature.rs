//! HMAC-SHA1 payload signatures carried in the `X-Spark-Signature` header.

use hmac::{Hmac, Mac as _};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "x-spark-signature";

/// What happens to an event whose signature does not match the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretCheck {
    /// Drop the event.
    #[default]
    Hard,
    /// Log the mismatch and process the event anyway.
    Soft,
}

impl SecretCheck {
    #[must_use]
    pub const fn from_soft_flag(soft: bool) -> Self {
        if soft { Self::Soft } else { Self::Hard }
    }
}

/// Hex-encoded HMAC-SHA1 of `body` keyed with `secret`.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        unreachable!("HMAC can take key of any size")
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks the signature header sent along with `body`.
#[must_use]
pub fn verify(secret: &str, body: &[u8], provided: Option<&str>) -> bool {
    let Some(provided) = provided else {
        return false;
    };
    let expected = sign(secret, body);
    expected.len() == provided.len()
        && expected
            .as_bytes()
            .iter()
            .zip(provided.as_bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
