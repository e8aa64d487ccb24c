//! Password hashing and bearer tokens.
//!
//! Tokens are stateless: nothing is stored server side, so logging out is a
//! client-side affair and a token stays valid until it expires.

use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};

use haul_types::api::Claims;

use crate::config::AuthConfig;

/// Hash with Argon2id and a fresh random salt; returns a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// False for a wrong password and for a hash we cannot parse.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("haul-timing-equaliser").ok());

/// Spend the same work as a real verification. Used when the email is
/// unknown so that response timing does not reveal which accounts exist.
pub fn verify_against_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

/// Signing key plus every key whose tokens are still accepted.
pub struct TokenKeys {
    encoding: EncodingKey,
    /// Current key first, then previous keys in configured order.
    decoding: Vec<DecodingKey>,
    validation: Validation,
    ttl: chrono::Duration,
}

impl TokenKeys {
    pub fn new(config: &AuthConfig) -> Self {
        let decoding = std::iter::once(&config.jwt_secret)
            .chain(config.previous_secrets.iter())
            .map(|secret| DecodingKey::from_secret(secret.as_bytes()))
            .collect();

        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding,
            validation: Validation::new(Algorithm::HS256),
            ttl: config.token_ttl,
        }
    }

    /// Issue a token for `subject` (the user's email).
    pub fn issue(&self, subject: &str) -> anyhow::Result<String> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    /// Verify signature and expiry against the current key, then each
    /// previous key.
    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut last_err = None;
        for key in &self.decoding {
            match decode::<Claims>(token, key, &self.validation) {
                Ok(data) => return Ok(data.claims),
                // Wrong key: try the next one.
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ErrorKind::InvalidSignature.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_and_is_salted() {
        let first = hash_password("password123").unwrap();
        let second = hash_password("password123").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("password123", &first));
        assert!(verify_password("password123", &second));
        assert!(!verify_password("password124", &first));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        verify_against_dummy("anything");
    }

    #[test]
    fn token_round_trip() {
        let keys = TokenKeys::new(&AuthConfig::new("secret-a"));
        let token = keys.issue("alice@example.com").unwrap();

        let claims = keys.decode(&token).unwrap();
        assert_eq!(claims.sub, "alice@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let ours = TokenKeys::new(&AuthConfig::new("secret-a"));
        let theirs = TokenKeys::new(&AuthConfig::new("secret-b"));
        let token = theirs.issue("mallory@example.com").unwrap();

        let err = ours.decode(&token).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidSignature));
        assert!(ours.decode("not.a.jwt").is_err());
    }

    #[test]
    fn rotated_secret_still_verifies() {
        let old = TokenKeys::new(&AuthConfig::new("old-secret"));
        let token = old.issue("bob@example.com").unwrap();

        let mut config = AuthConfig::new("new-secret");
        config.previous_secrets = vec!["older-secret".into(), "old-secret".into()];
        let rotated = TokenKeys::new(&config);

        assert_eq!(rotated.decode(&token).unwrap().sub, "bob@example.com");

        // Once the old secret is dropped from the list, its tokens die.
        let retired = TokenKeys::new(&AuthConfig::new("new-secret"));
        assert!(retired.decode(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut config = AuthConfig::new("secret-a");
        config.token_ttl = chrono::Duration::minutes(-10);
        let keys = TokenKeys::new(&config);
        let token = keys.issue("alice@example.com").unwrap();

        let err = keys.decode(&token).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
    }
}
