//! Session token issue/verify plus the opaque bearer secrets used by the
//! email flows.
//!
//! Session tokens are HS256 JWTs carrying only the user id; there is no
//! revocation list, validity is purely time-bound. The email-flow tokens
//! (verification, magic link, password reset, email change) are not signed
//! at all: they are random values looked up by equality.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use uuid::Uuid;

use keepsake_types::api::Claims;

pub const DEFAULT_SESSION_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_secs: u64,
}

impl TokenKeys {
    pub fn new(secret: &str, expiry_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_secs,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + self.expiry_secs as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Pure decode: bad signature, expiry, and malformation all fail here.
    /// User lookup and account-status checks are the middleware's job.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

/// 32 random bytes, hex-encoded. Pure bearer secret with no structure.
pub fn opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_verify_roundtrip() {
        let keys = TokenKeys::new("test-secret", 3600);
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_rejected() {
        let keys = TokenKeys::new("test-secret", 3600);
        let other = TokenKeys::new("other-secret", 3600);
        let token = keys.issue(Uuid::new_v4()).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let keys = TokenKeys::new("test-secret", 3600);
        // Forge a token that expired well past the default leeway.
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn garbage_rejected() {
        let keys = TokenKeys::new("test-secret", 3600);
        assert!(keys.verify("not-a-token").is_err());
        assert!(keys.verify("").is_err());
    }

    #[test]
    fn opaque_tokens_are_unique_hex() {
        let a = opaque_token();
        let b = opaque_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
