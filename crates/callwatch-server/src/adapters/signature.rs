//! Webhook signatures
//!
//! Bodies are signed with HMAC-SHA256 over the raw bytes and sent as
//! `sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-callwatch-signature";

fn mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Hex-encoded signature with the `sha256=` prefix
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = mac(secret);
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a `sha256=<hex>` signature
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(hex_part) = signature.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_part) else {
        return false;
    };

    let mut mac = mac(secret);
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_payload() {
        let signature = sign_payload("test-secret", b"test payload");

        assert!(signature.starts_with("sha256="));
        assert_eq!(signature.len(), 7 + 64); // "sha256=" + 64 hex chars
    }

    #[test]
    fn test_verify_roundtrip_and_tamper() {
        let body = br#"{"event_type":"call_ended","call_id":"abc123"}"#;
        let signature = sign_payload("shh", body);

        assert!(verify_signature("shh", body, &signature));
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature("shh", b"{}", &signature));
        assert!(!verify_signature("shh", body, "sha256=zz"));
        assert!(!verify_signature("shh", body, &signature[7..]));
    }
}
