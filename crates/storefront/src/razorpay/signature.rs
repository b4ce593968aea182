//! HMAC-SHA256 signatures used by Razorpay checkout callbacks and webhooks.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    #[error("signature mismatch")]
    Mismatch,
}

/// Hex-encoded HMAC-SHA256 of `message` keyed with `secret`.
///
/// # Errors
///
/// Returns `SignatureError::InvalidKey` if the key is rejected by the MAC.
pub fn sign(secret: &str, message: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check the signature the checkout widget returns after a payment.
///
/// Razorpay signs `"{order_id}|{payment_id}"` with the account key secret.
///
/// # Errors
///
/// Returns `SignatureError::Mismatch` if the signature does not match.
pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    key_secret: &str,
) -> Result<(), SignatureError> {
    let expected = sign(key_secret, format!("{order_id}|{payment_id}").as_bytes())?;
    check(&expected, signature)
}

/// Check the `x-razorpay-signature` header against the raw webhook body.
///
/// # Errors
///
/// Returns `SignatureError::Mismatch` if the signature does not match.
pub fn verify_webhook_signature(
    body: &[u8],
    signature: &str,
    webhook_secret: &str,
) -> Result<(), SignatureError> {
    let expected = sign(webhook_secret, body)?;
    check(&expected, signature)
}

fn check(expected: &str, given: &str) -> Result<(), SignatureError> {
    if constant_time_compare(expected, given.trim()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "Kx9mQ2vL7pR4tW8zN3bC6dF1";

    #[test]
    fn test_sign_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign("Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_payment_signature_round() {
        let signature = sign(SECRET, b"order_abc|pay_xyz").unwrap();
        assert!(verify_payment_signature("order_abc", "pay_xyz", &signature, SECRET).is_ok());
    }

    #[test]
    fn test_payment_signature_rejects_swapped_ids() {
        let signature = sign(SECRET, b"order_abc|pay_xyz").unwrap();
        assert_eq!(
            verify_payment_signature("pay_xyz", "order_abc", &signature, SECRET),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_payment_signature("order_abc", "pay_xyz", &signature, "another-secret"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let signature = sign(SECRET, body).unwrap();
        assert!(verify_webhook_signature(body, &signature, SECRET).is_ok());
        assert!(verify_webhook_signature(b"{}", &signature, SECRET).is_err());
        assert!(verify_webhook_signature(body, "", SECRET).is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}
