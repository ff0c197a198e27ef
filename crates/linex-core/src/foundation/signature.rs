//! Webhook signature verification using HMAC-SHA256.
//!
//! LINE signs each webhook body with the channel secret and sends the
//! base64-encoded digest in the `X-Line-Signature` header. Verification runs
//! before the body is parsed; a request that fails it is never dispatched.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Computes the base64 HMAC-SHA256 signature of `body` keyed by `secret`.
///
/// Mostly useful for tests and for signing synthetic deliveries.
pub fn compute_signature(body: &[u8], secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Verifies a claimed signature against `body` and `secret`.
///
/// Returns `false` for any malformed signature. Never panics. The digest
/// comparison is constant-time.
///
/// # Examples
///
/// ```
/// use linex_core::foundation::signature::{compute_signature, verify_signature};
///
/// let body = br#"{"events":[]}"#;
/// let signature = compute_signature(body, b"secret");
///
/// assert!(verify_signature(body, &signature, b"secret"));
/// assert!(!verify_signature(body, &signature, b"other"));
/// ```
pub fn verify_signature(body: &[u8], signature: &str, secret: &[u8]) -> bool {
    let Ok(claimed) = STANDARD.decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(&claimed).is_ok()
}

/// A verifier bound to one channel secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    /// Creates a verifier for the given channel secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Returns whether `signature` is valid for `body`.
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        verify_signature(body, signature, &self.secret)
    }

    /// Signs `body` with this verifier's secret.
    pub fn sign(&self, body: &[u8]) -> String {
        compute_signature(body, &self.secret)
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ========================================================================
    // Known vectors and edge cases
    // ========================================================================

    /// RFC 4231 test case 2, base64-encoded.
    #[test]
    fn test_rfc4231_vector() {
        let signature = compute_signature(b"what do ya want for nothing?", b"Jefe");
        assert_eq!(signature, "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
    }

    #[test]
    fn test_webhook_body_vector() {
        let body = br#"{"destination":"U0","events":[]}"#;
        assert!(verify_signature(
            body,
            "W3dP9Bhbu4pAfrrGKmS3sZ+m7GXhMWYtP0X+0oJHG4w=",
            b"channel-secret"
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"payload";
        let signature = compute_signature(body, b"right");
        assert!(verify_signature(body, &signature, b"right"));
        assert!(!verify_signature(body, &signature, b"wrong"));
    }

    #[test]
    fn test_malformed_signatures_return_false() {
        let body = b"payload";
        assert!(!verify_signature(body, "", b"secret"));
        assert!(!verify_signature(body, "not base64!!", b"secret"));
        assert!(!verify_signature(body, "c2hvcnQ=", b"secret"));
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let body = b"payload";
        let signature = format!(" {} ", compute_signature(body, b"secret"));
        assert!(verify_signature(body, &signature, b"secret"));
    }

    #[test]
    fn test_verifier_sign_and_verify() {
        let verifier = SignatureVerifier::new("secret");
        let signature = verifier.sign(b"{}");
        assert!(verifier.verify(b"{}", &signature));
        assert!(!verifier.verify(b"{ }", &signature));
    }

    // ========================================================================
    // Property tests
    // ========================================================================

    fn reference_signature(body: &[u8], secret: &[u8]) -> String {
        // Textbook HMAC construction over a plain SHA-256.
        use sha2::Digest;

        let mut key = [0u8; 64];
        if secret.len() > 64 {
            key[..32].copy_from_slice(&Sha256::digest(secret));
        } else {
            key[..secret.len()].copy_from_slice(secret);
        }

        let ipad: Vec<u8> = key.iter().map(|b| b ^ 0x36).collect();
        let opad: Vec<u8> = key.iter().map(|b| b ^ 0x5c).collect();

        let mut inner = Sha256::new();
        inner.update(&ipad);
        inner.update(body);
        let inner = inner.finalize();

        let mut outer = Sha256::new();
        outer.update(&opad);
        outer.update(inner);
        STANDARD.encode(outer.finalize())
    }

    proptest! {
        #[test]
        fn prop_matches_reference(
            body in prop::collection::vec(any::<u8>(), 0..512),
            secret in prop::collection::vec(any::<u8>(), 0..128),
        ) {
            let signature = compute_signature(&body, &secret);
            prop_assert_eq!(&signature, &reference_signature(&body, &secret));
            prop_assert!(verify_signature(&body, &signature, &secret));
        }

        #[test]
        fn prop_body_bit_flip_rejected(
            body in prop::collection::vec(any::<u8>(), 1..256),
            secret in prop::collection::vec(any::<u8>(), 1..64),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let signature = compute_signature(&body, &secret);
            let mut mutated = body.clone();
            let i = index.index(mutated.len());
            mutated[i] ^= 1 << bit;
            prop_assert!(!verify_signature(&mutated, &signature, &secret));
        }

        #[test]
        fn prop_secret_bit_flip_rejected(
            body in prop::collection::vec(any::<u8>(), 0..256),
            secret in prop::collection::vec(any::<u8>(), 1..64),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let signature = compute_signature(&body, &secret);
            let mut mutated = secret.clone();
            let i = index.index(mutated.len());
            mutated[i] ^= 1 << bit;
            prop_assert!(!verify_signature(&body, &signature, &mutated));
        }
    }
}
