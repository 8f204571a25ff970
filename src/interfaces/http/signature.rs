use crate::error::{AuthFailure, BookingError, Result};
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-openpix-signature";

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `payload` under `secret`, as the gateway sends it.
pub fn sign(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BookingError::Validation(format!("invalid webhook secret: {e}")))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the webhook signature header against the raw body in constant time.
pub fn verify_signature(payload: &[u8], headers: &HeaderMap, secret: &str) -> Result<()> {
    let invalid = || BookingError::Unauthorized(AuthFailure::InvalidSignature);

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| hex::decode(v.trim()).ok())
        .ok_or_else(invalid)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| invalid())?;
    mac.update(payload);
    mac.verify_slice(&provided).map_err(|_| invalid())
}
