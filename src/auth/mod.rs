pub mod password;
pub mod roles;

use crate::config::types::BootstrapConfig;
use crate::store::InventoryStore;
use anyhow::{Context, Result};
use roles::Role;
use std::sync::Arc;

/// Dummy hash verified for unknown users so lookups take the same time.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Credential checks backed by the user table.
#[derive(Debug, Clone)]
pub struct AuthService {
    store: Arc<InventoryStore>,
}

impl AuthService {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }

    /// Check a username/password pair. Returns the canonical username on a
    /// match. Account state is not considered here, see
    /// [`AuthService::is_account_active`].
    pub fn verify(&self, username: &str, password: &str) -> Option<String> {
        let user = match self.store.get_user(username) {
            Some(u) => u,
            None => {
                tracing::debug!(user = %username, "User not found, performing dummy verification");
                let _ = password::verify_password(password, DUMMY_HASH);
                return None;
            }
        };

        if password::verify_password(password, &user.password_hash) {
            tracing::debug!(user = %username, "Password verification succeeded");
            Some(user.username)
        } else {
            tracing::debug!(user = %username, "Password verification failed");
            None
        }
    }

    pub fn is_account_active(&self, username: &str) -> bool {
        self.store.get_user(username).is_some_and(|u| u.active)
    }

    pub fn get_role(&self, username: &str) -> Option<Role> {
        self.store.get_user(username).map(|u| u.role)
    }

    pub fn must_change_password(&self, username: &str) -> bool {
        self.store
            .get_user(username)
            .is_some_and(|u| u.must_change_password)
    }

    /// Create the configured administrator when no account with that name
    /// exists. Returns whether an account was created.
    pub fn bootstrap_admin(&self, config: &BootstrapConfig) -> Result<bool> {
        if self.store.get_user(&config.admin_username).is_some() {
            return Ok(false);
        }
        let hash = match (&config.admin_password_hash, &config.admin_password) {
            (Some(hash), _) => hash.clone(),
            (None, Some(plain)) => password::hash_password(plain)?,
            (None, None) => anyhow::bail!("bootstrap needs admin_password or admin_password_hash"),
        };
        self.store
            .add_user(
                &config.admin_username,
                &hash,
                Role::Administrator,
                Some("Administrator"),
                true,
            )
            .context("creating bootstrap administrator")?;
        self.store.log_system(
            "Bootstrap",
            &format!("administrator '{}' created", config.admin_username),
            "system",
        );
        self.store.flush().context("saving bootstrap log entry")?;
        tracing::warn!(
            user = %config.admin_username,
            "Bootstrap administrator created; change its password right away"
        );
        Ok(true)
    }
}
