//! HMAC verification for inbound payment-provider callbacks.
//!
//! Verification must run over the exact bytes received; re-serializing
//! the payload first would invalidate the signature.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Accepts `sha256=<hex>` or bare hex; anything else is unverifiable.
pub fn parse_signature_header(header: &str) -> Option<&str> {
    let trimmed = header.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.strip_prefix("sha256=").unwrap_or(trimmed))
}

/// Hex-encoded HMAC-SHA256 of the raw body under the tenant secret.
pub fn compute_signature(raw_body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies an inbound signature against the raw body and tenant secret.
/// A malformed hex signature or a length mismatch fails verification
/// before the constant-time comparison runs.
pub fn verify_signature(raw_body: &[u8], incoming: &str, secret: &str) -> bool {
    let incoming = match parse_signature_header(incoming) {
        Some(sig) => sig,
        None => return false,
    };
    let incoming_bytes = match hex::decode(incoming) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw_body);
    let expected = mac.finalize().into_bytes();

    constant_time_eq(&incoming_bytes, &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"type":"billing.paid","data":{"id":"bill_1"}}"#;
        let sig = compute_signature(body, SECRET);
        assert!(verify_signature(body, &sig, SECRET));
    }

    #[test]
    fn accepts_sha256_prefixed_header() {
        let body = br#"{"type":"billing.paid"}"#;
        let sig = format!("sha256={}", compute_signature(body, SECRET));
        assert!(verify_signature(body, &sig, SECRET));
    }

    #[test]
    fn rejects_tampered_body() {
        let body = br#"{"type":"billing.paid","data":{"id":"bill_1"}}"#;
        let sig = compute_signature(body, SECRET);
        let tampered = br#"{"type":"billing.paid","data":{"id":"bill_2"}}"#;
        assert!(!verify_signature(tampered, &sig, SECRET));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = br#"{"type":"billing.paid"}"#;
        let sig = compute_signature(body, "someone_elses_secret");
        assert!(!verify_signature(body, &sig, SECRET));
    }

    #[test]
    fn rejects_truncated_and_malformed_signatures() {
        let body = br#"{"type":"billing.paid"}"#;
        let sig = compute_signature(body, SECRET);
        assert!(!verify_signature(body, &sig[..32], SECRET));
        assert!(!verify_signature(body, "not-hex-at-all", SECRET));
        assert!(!verify_signature(body, "", SECRET));
    }

    #[test]
    fn parse_header_strips_prefix_only() {
        assert_eq!(parse_signature_header("sha256=abc123"), Some("abc123"));
        assert_eq!(parse_signature_header("  abc123  "), Some("abc123"));
        assert_eq!(parse_signature_header(""), None);
    }
}
