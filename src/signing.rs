//! API key request signing.
//!
//! BitMEX authenticates a WebSocket handshake with three headers:
//! `api-nonce`, `api-signature` and `api-key`. The signature is
//! `hex(HMAC_SHA256(secret, verb + path + nonce + body))`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Path signed for the realtime handshake
pub const REALTIME_PATH: &str = "/realtime";

static LAST_NONCE: AtomicU64 = AtomicU64::new(0);

/// Compute the hex-encoded request signature
pub fn sign(secret: &str, method: &str, path: &str, nonce: u64, body: &str) -> String {
    let message = format!("{}{}{}{}", method, path, nonce, body);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Next nonce for this process.
///
/// Derived from the wall clock in milliseconds and forced strictly above
/// every nonce previously returned, so a clock step backwards or two calls
/// within the same millisecond never repeat a value.
pub fn generate_nonce() -> u64 {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let mut last = LAST_NONCE.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_NONCE.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Single-use credentials for one handshake
#[derive(Clone)]
pub struct AuthToken {
    pub api_key: String,
    pub nonce: u64,
    pub signature: String,
}

impl AuthToken {
    /// Sign a `GET /realtime` handshake with a fresh nonce
    pub fn for_handshake(api_key: &str, api_secret: &str) -> Self {
        let nonce = generate_nonce();
        Self {
            api_key: api_key.to_string(),
            nonce,
            signature: sign(api_secret, "GET", REALTIME_PATH, nonce, ""),
        }
    }

    /// Header pairs attached to the upgrade request
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("api-nonce".to_string(), self.nonce.to_string()),
            ("api-signature".to_string(), self.signature.clone()),
            ("api-key".to_string(), self.api_key.clone()),
        ]
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("api_key", &self.api_key)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "chNOOS4KvNXR_Xq4k4c9qsfoKWvnDecLATCRlcBwyKDYnWgO";

    #[test]
    fn test_sign_known_vector() {
        let signature = sign(SECRET, "GET", "/api/v1/instrument", 1518064236, "");
        assert_eq!(
            signature,
            "c7682d435d0cfe87c16098df34ef2eb5a549d4c5a3c2b1f0f77b8af73423bf00"
        );
    }

    #[test]
    fn test_sign_realtime() {
        assert_eq!(
            sign(SECRET, "GET", REALTIME_PATH, 1429631577690, ""),
            "6e0be2a3fecbb55cc5f9fb744bfdb05bf6bf5cf4f4380006ebb66fa5dd3eab31"
        );
        assert_eq!(
            sign("secret", "GET", REALTIME_PATH, 1, ""),
            "c1a6629018c1f3a6ffa34cc8cbb9077eb5e02b9f3dff303a59e3d754907fa8fb"
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign(SECRET, "POST", "/api/v1/order", 42, r#"{"symbol":"XBTUSD"}"#);
        let b = sign(SECRET, "POST", "/api/v1/order", 42, r#"{"symbol":"XBTUSD"}"#);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_nonce_strictly_increasing() {
        let nonces: Vec<u64> = (0..1000).map(|_| generate_nonce()).collect();
        assert!(nonces.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_nonce_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..250).map(|_| generate_nonce()).collect::<Vec<_>>()))
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let len = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), len);
    }

    #[test]
    fn test_handshake_token_headers() {
        let token = AuthToken::for_handshake("my-key", "secret");
        let headers = token.headers();
        assert_eq!(headers[0], ("api-nonce".to_string(), token.nonce.to_string()));
        assert_eq!(
            headers[1].1,
            sign("secret", "GET", REALTIME_PATH, token.nonce, "")
        );
        assert_eq!(headers[2], ("api-key".to_string(), "my-key".to_string()));
        assert!(!format!("{:?}", token).contains(&token.signature));
    }
}
