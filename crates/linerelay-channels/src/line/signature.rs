//! Webhook signature check.
//!
//! LINE signs every webhook body with HMAC-SHA256 keyed by the channel
//! secret and sends the base64 digest in `X-Line-Signature`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use linerelay_core::error::RelayError;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

fn mac_for(secret: &str, body: &[u8]) -> Result<HmacSha256, RelayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| RelayError::Auth(format!("invalid channel secret: {e}")))?;
    mac.update(body);
    Ok(mac)
}

/// Base64 HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, RelayError> {
    let mac = mac_for(secret, body)?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify `signature` (the raw header value) against `body`.
///
/// The digest comparison runs in constant time.
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), RelayError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RelayError::Auth("missing signature".into()))?;
    let expected = STANDARD
        .decode(signature)
        .map_err(|_| RelayError::Auth("malformed signature".into()))?;
    mac_for(secret, body)?
        .verify_slice(&expected)
        .map_err(|_| RelayError::Auth("signature mismatch".into()))
}
