use crate::application_port::*;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier};
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha512;
use tracing::debug;

/// Salted Argon2id PHC strings.
pub struct Argon2SecretHasher {
    argon2: Argon2<'static>,
}

impl Argon2SecretHasher {
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }
}

impl Default for Argon2SecretHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretHasher for Argon2SecretHasher {
    fn hash_secret(&self, raw_secret: &str) -> Result<String, TokenError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(raw_secret.as_bytes(), &salt)
            .map_err(|e| TokenError::InternalError(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    fn compare_secret(&self, raw_secret: &str, stored_hash: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("stored refresh hash is not a PHC string: {}", e);
                return false;
            }
        };
        self.argon2
            .verify_password(raw_secret.as_bytes(), &parsed)
            .is_ok()
    }
}

const HMAC_PREFIX: &str = "hmac-sha512$";

/// Keyed HMAC-SHA-512 digest, hex encoded. Much cheaper than Argon2 on the
/// refresh path; the key must stay server side.
pub struct HmacSecretHasher {
    key: Vec<u8>,
}

impl HmacSecretHasher {
    pub fn new(key: Vec<u8>) -> Self {
        HmacSecretHasher { key }
    }

    fn mac(&self, raw_secret: &str) -> Result<Hmac<Sha512>, TokenError> {
        let mut mac = Hmac::<Sha512>::new_from_slice(&self.key)
            .map_err(|e| TokenError::InternalError(e.to_string()))?;
        mac.update(raw_secret.as_bytes());
        Ok(mac)
    }
}

impl SecretHasher for HmacSecretHasher {
    fn hash_secret(&self, raw_secret: &str) -> Result<String, TokenError> {
        let out = self.mac(raw_secret)?.finalize().into_bytes();
        Ok(format!("{}{}", HMAC_PREFIX, hex::encode(out)))
    }

    fn compare_secret(&self, raw_secret: &str, stored_hash: &str) -> bool {
        let Some(digest_hex) = stored_hash.strip_prefix(HMAC_PREFIX) else {
            return false;
        };
        let Ok(expected) = hex::decode(digest_hex) else {
            return false;
        };
        match self.mac(raw_secret) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_argon2() -> Argon2SecretHasher {
        Argon2SecretHasher::with_params(Params::new(8, 1, 1, None).unwrap())
    }

    #[test]
    fn argon2_matches_only_its_secret() {
        let hasher = fast_argon2();
        let hash = hasher.hash_secret("s1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.compare_secret("s1", &hash));
        assert!(!hasher.compare_secret("s2", &hash));
    }

    #[test]
    fn argon2_hashes_are_salted() {
        let hasher = fast_argon2();
        let a = hasher.hash_secret("same").unwrap();
        let b = hasher.hash_secret("same").unwrap();
        assert_ne!(a, b);
        assert!(hasher.compare_secret("same", &a));
        assert!(hasher.compare_secret("same", &b));
    }

    #[test]
    fn argon2_malformed_hash_is_a_mismatch() {
        let hasher = fast_argon2();
        assert!(!hasher.compare_secret("s1", ""));
        assert!(!hasher.compare_secret("s1", "not-a-phc-string"));
        assert!(!hasher.compare_secret("s1", "$argon2id$v=19$garbage"));
    }

    #[test]
    fn hmac_matches_only_its_secret() {
        let hasher = HmacSecretHasher::new(b"lookup-key".to_vec());
        let hash = hasher.hash_secret("s1").unwrap();
        assert!(hash.starts_with(HMAC_PREFIX));
        assert!(hasher.compare_secret("s1", &hash));
        assert!(!hasher.compare_secret("s2", &hash));
    }

    #[test]
    fn hmac_depends_on_key() {
        let a = HmacSecretHasher::new(b"key-a".to_vec());
        let b = HmacSecretHasher::new(b"key-b".to_vec());
        let hash = a.hash_secret("s1").unwrap();
        assert!(!b.compare_secret("s1", &hash));
    }

    #[test]
    fn hmac_malformed_hash_is_a_mismatch() {
        let hasher = HmacSecretHasher::new(b"lookup-key".to_vec());
        assert!(!hasher.compare_secret("s1", ""));
        assert!(!hasher.compare_secret("s1", "hmac-sha512$zz"));
        assert!(!hasher.compare_secret("s1", "hmac-sha512$00ff"));
        let argon = fast_argon2().hash_secret("s1").unwrap();
        assert!(!hasher.compare_secret("s1", &argon));
    }
}
