//! Webhook signature validation for provider-initiated HTTP adapters (spec §4.1).
//!
//! Providers that deliver call events over HTTP sign the raw body with a shared
//! secret; the adapter must reject anything that doesn't verify, or that is older
//! than the configured tolerance, before the body is ever parsed.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, TelephonyError};

type HmacSha256 = Hmac<Sha256>;

/// Verify a hex-encoded HMAC-SHA256 signature over `body`, and that `timestamp` is
/// within `tolerance_secs` of `now`. `signature` is compared as lowercase hex.
pub fn verify_webhook(
    secret: &[u8],
    body: &[u8],
    signature_hex: &str,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> Result<()> {
    let age = (now - timestamp).num_seconds();
    if age.abs() > tolerance_secs {
        return Err(TelephonyError::StaleTimestamp);
    }

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    let expected_hex = hex_encode(&expected);

    if !constant_time_eq(expected_hex.as_bytes(), signature_hex.to_lowercase().as_bytes()) {
        return Err(TelephonyError::InvalidSignature);
    }
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
