use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// One-way credential hashing used by the account service.
///
/// Implementations are CPU-bound on purpose; callers run them on the
/// blocking pool.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> anyhow::Result<String>;
    fn verify(&self, plain: &str, digest: &str) -> anyhow::Result<bool>;
}

/// Argon2id with a random salt per hash, encoded as a PHC string.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Minimum cost parameters. Hashes still verify against the default
    /// hasher, since the PHC string carries its own parameters.
    #[cfg(test)]
    pub fn insecure_fast() -> Self {
        use argon2::{Algorithm, Params, Version};
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None)
            .expect("minimum argon2 params are valid");
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, digest: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(digest).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = Argon2Hasher::insecure_fast();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = Argon2Hasher::insecure_fast();
        let hash = hasher.hash("correct-horse-battery-staple1").expect("hashing should succeed");
        assert!(!hasher
            .verify("wrong-password1", &hash)
            .expect("verify should not error"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let hasher = Argon2Hasher::insecure_fast();
        let a = hasher.hash("Passw0rd").unwrap();
        let b = hasher.hash("Passw0rd").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn default_hasher_verifies_cheap_hash() {
        let hash = Argon2Hasher::insecure_fast().hash("Passw0rd").unwrap();
        assert!(Argon2Hasher::default().verify("Passw0rd", &hash).unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = Argon2Hasher::default()
            .verify("anything", "not-a-valid-hash")
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
