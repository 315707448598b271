//! Kraken request signing.
//!
//! Private requests carry two headers:
//!
//! - `API-Key`: the public key, verbatim;
//! - `API-Sign`: `base64(HMAC-SHA512(uri_path ‖ SHA256(nonce ‖ postdata)))`
//!   keyed with the base64-decoded secret.
//!
//! The nonce is part of the post data and must strictly increase for a key.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use ktb_core::time_util::now_us;
use sha2::{Digest, Sha256, Sha512};

use crate::error::TransportError;

type HmacSha512 = Hmac<Sha512>;

/// Compute the `API-Sign` header value.
///
/// `secret_b64` is the secret exactly as issued by Kraken.
pub fn sign(
    uri_path: &str,
    nonce: &str,
    post_data: &str,
    secret_b64: &str,
) -> Result<String, TransportError> {
    let secret = STANDARD
        .decode(secret_b64.trim())
        .map_err(|e| TransportError::InvalidCredentials(format!("secret is not base64: {e}")))?;

    let mut sha = Sha256::new();
    sha.update(nonce.as_bytes());
    sha.update(post_data.as_bytes());
    let digest = sha.finalize();

    let mut mac = HmacSha512::new_from_slice(&secret)
        .map_err(|e| TransportError::InvalidCredentials(e.to_string()))?;
    mac.update(uri_path.as_bytes());
    mac.update(&digest);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// URL-encode parameters as a form body, preserving order.
pub fn encode_form(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Strictly increasing nonce, based on the wall clock in microseconds.
#[derive(Debug, Default)]
pub struct NonceSource {
    last: AtomicU64,
}

impl NonceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = now_us();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|v| v);
        now.max(prev + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_signature_vector() {
        let secret = "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==";
        let nonce = "1616492376594";
        let post = "nonce=1616492376594&ordertype=limit&pair=XBTUSD&price=37500&type=buy&volume=1.25";
        let sig = sign("/0/private/AddOrder", nonce, post, secret).unwrap();
        assert_eq!(
            sig,
            "4/dpxb3iT4tp/ZCVEwSnEsLxx0bqyhLpdfOpc6fn7OR8+UClSV5n9E6aSS8MPtnRfp32bAb0nmbRn6H8ndwLUQ=="
        );
    }

    #[test]
    fn bad_secret_is_a_credentials_error() {
        let err = sign("/0/private/Balance", "1", "nonce=1", "not base64!!").unwrap_err();
        assert!(matches!(err, TransportError::InvalidCredentials(_)));
    }

    #[test]
    fn form_encoding_keeps_order() {
        let params = vec![
            ("nonce".to_string(), "42".to_string()),
            ("pair".to_string(), "XETHZEUR,XXBTZEUR".to_string()),
        ];
        assert_eq!(encode_form(&params), "nonce=42&pair=XETHZEUR%2CXXBTZEUR");
    }

    #[test]
    fn nonce_strictly_increases() {
        let source = NonceSource::new();
        let mut prev = source.next();
        for _ in 0..1000 {
            let n = source.next();
            assert!(n > prev);
            prev = n;
        }
    }
}
