//! Password hashing and verification with Argon2id.
//!
//! Both operations are CPU and memory heavy, so they run on the blocking pool.
//! A malformed stored hash is a `Hashing` error, never a `false` result.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{self, SaltString},
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::{sync::OnceCell, task};

use crate::api::error::AuthError;

#[derive(Clone, Debug)]
pub struct CredentialVerifier {
    params: Params,
    // Hash verified against when the email is unknown, so both paths cost the same.
    decoy: Arc<OnceCell<SecretString>>,
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier {
    /// Argon2id with the library's default cost.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: Params::default(),
            decoy: Arc::new(OnceCell::new()),
        }
    }

    /// Argon2id with explicit memory (KiB), iteration and parallelism costs.
    ///
    /// # Errors
    /// Returns `AuthError::Hashing` if the parameters are out of range.
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|err| AuthError::Hashing(format!("invalid argon2 params: {err}")))?;
        Ok(Self {
            params,
            decoy: Arc::new(OnceCell::new()),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Produce a salted PHC-format hash.
    ///
    /// # Errors
    /// Returns `AuthError::Hashing` on RNG or algorithm failure.
    pub async fn hash(&self, password: SecretString) -> Result<SecretString, AuthError> {
        let argon2 = self.argon2();
        task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.expose_secret().as_bytes(), &salt)
                .map(|hash| SecretString::from(hash.to_string()))
                .map_err(|err| AuthError::Hashing(err.to_string()))
        })
        .await
        .map_err(|err| AuthError::Hashing(format!("hashing task failed: {err}")))?
    }

    /// Check a password against a stored hash.
    ///
    /// # Errors
    /// Returns `AuthError::Hashing` if the stored hash cannot be parsed or the
    /// algorithm fails for a reason other than a mismatch.
    pub async fn verify(&self, password: SecretString, hash: SecretString) -> Result<bool, AuthError> {
        let argon2 = self.argon2();
        task::spawn_blocking(move || {
            let parsed = PasswordHash::new(hash.expose_secret())
                .map_err(|err| AuthError::Hashing(format!("malformed stored hash: {err}")))?;
            match argon2.verify_password(password.expose_secret().as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => Ok(false),
                Err(err) => Err(AuthError::Hashing(err.to_string())),
            }
        })
        .await
        .map_err(|err| AuthError::Hashing(format!("verification task failed: {err}")))?
    }

    /// Spend one verification on a decoy hash. Used when the account does not
    /// exist, to avoid user enumeration through response timing.
    ///
    /// # Errors
    /// Returns `AuthError::Hashing` if the decoy cannot be produced.
    pub async fn verify_decoy(&self, password: SecretString) -> Result<(), AuthError> {
        let decoy = self
            .decoy
            .get_or_try_init(|| self.hash(SecretString::from("gatehouse-decoy".to_string())))
            .await?
            .clone();
        self.verify(password, decoy).await.map(|_| ())
    }
}
