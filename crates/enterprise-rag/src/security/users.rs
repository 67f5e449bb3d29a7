use std::collections::HashMap;

use crate::config::RagConfig;
use crate::error::Result;

use super::{hash_password, verify_password};

const DEMO_USERNAME: &str = "demo";
const DEMO_PASSWORD: &str = "demo123";

/// Users allowed to request access tokens
#[derive(Debug, Clone)]
pub struct UserStore {
    /// username -> bcrypt hash
    users: HashMap<String, String>,
    /// Checked for unknown usernames so every login costs one bcrypt verify
    dummy_hash: String,
}

impl UserStore {
    /// Build the store from configuration
    ///
    /// With no configured users and debug enabled, a `demo`/`demo123`
    /// account is created.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let mut store = Self {
            users: HashMap::new(),
            dummy_hash: hash_password(&uuid::Uuid::new_v4().to_string())?,
        };
        for user in &config.security.users {
            store.users.insert(user.username.clone(), user.password_hash.clone());
        }

        if store.users.is_empty() && config.debug {
            tracing::warn!(
                "No users configured, enabling demo account '{}' (debug mode)",
                DEMO_USERNAME
            );
            store.add_user(DEMO_USERNAME, DEMO_PASSWORD)?;
        }

        Ok(store)
    }

    /// Add a user with a plain-text password
    pub fn add_user(&mut self, username: &str, password: &str) -> Result<()> {
        let hashed = hash_password(password)?;
        self.users.insert(username.to_string(), hashed);
        Ok(())
    }

    /// Check credentials; unknown users are rejected
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        match self.users.get(username) {
            Some(hash) => verify_password(password, hash),
            None => {
                verify_password(password, &self.dummy_hash)?;
                Ok(false)
            }
        }
    }

    /// Number of configured users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True when no user can log in
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
