//! # cb-auth-simple
//!
//! Argon2-based implementation of `AccessGuard`.
//! A single admin secret, stored only as its PHC hash, unlocks the admin console.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use async_trait::async_trait;
use cb_core::traits::AccessGuard;
use secrecy::{ExposeSecret, SecretString};

pub struct SimpleAccessGuard {
    /// PHC string of the admin secret; `None` locks the console entirely.
    admin_hash: Option<SecretString>,
}

impl SimpleAccessGuard {
    pub fn new(admin_hash: Option<SecretString>) -> Self {
        if admin_hash.is_none() {
            log::warn!("no admin password hash configured; admin endpoints will refuse every request");
        }
        Self { admin_hash }
    }
}

#[async_trait]
impl AccessGuard for SimpleAccessGuard {
    /// Verifies if a provided secret matches the stored Argon2 hash.
    async fn is_admin(&self, credential: &str) -> bool {
        let Some(hash) = &self.admin_hash else {
            return false;
        };
        let parsed_hash = match PasswordHash::new(hash.expose_secret()) {
            Ok(p) => p,
            Err(e) => {
                log::error!("configured admin password hash is not a valid PHC string: {e}");
                return false;
            }
        };
        Argon2::default()
            .verify_password(credential.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
