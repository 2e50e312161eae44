//! Deployment configuration.
//!
//! [`SchoolConfig`] carries the values that change between deployments: token
//! lifetimes, hashing cost, the frontend base URL used in links handed to the
//! notifier, and the provisional registration-code prefix. It can be built
//! fluently or deserialized from JSON, with every field optional.

use crate::error::{SchoolError, SchoolResult};
use serde::{Deserialize, Serialize};

/// Argon2id cost parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashingConfig {
    /// Minimal cost, for tests and local tooling only.
    pub fn fast() -> Self {
        Self {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Configuration for a school server instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolConfig {
    /// Minutes a password-reset token stays usable.
    pub password_reset_ttl_minutes: i64,

    /// Lifetime of access tokens. `None` keeps them until revoked.
    pub access_token_ttl_minutes: Option<i64>,

    /// Base URL of the frontend. Reset and verification links point here.
    pub frontend_url: String,

    pub hashing: HashingConfig,

    /// Prefix of the provisional registration code given to express signups.
    pub provisional_code_prefix: String,

    /// Return the raw reset token in the forgot-password response. Development only.
    pub expose_reset_token: bool,

    /// Secret mixed into e-mail verification hashes.
    pub verification_secret: String,
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            password_reset_ttl_minutes: 60,
            access_token_ttl_minutes: None,
            frontend_url: "http://localhost:3000".to_string(),
            hashing: HashingConfig::default(),
            provisional_code_prefix: "TEMP-".to_string(),
            expose_reset_token: false,
            verification_secret: String::new(),
        }
    }
}

impl SchoolConfig {
    /// Start a fluent builder from the defaults.
    pub fn builder() -> SchoolConfigBuilder {
        SchoolConfigBuilder::default()
    }

    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> SchoolResult<Self> {
        let config: SchoolConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> SchoolResult<()> {
        if self.password_reset_ttl_minutes <= 0 {
            return Err(SchoolError::internal(
                "password_reset_ttl_minutes must be positive",
            ));
        }
        if self.access_token_ttl_minutes.is_some_and(|ttl| ttl <= 0) {
            return Err(SchoolError::internal(
                "access_token_ttl_minutes must be positive when set",
            ));
        }
        if self.provisional_code_prefix.is_empty() {
            return Err(SchoolError::internal(
                "provisional_code_prefix must not be empty",
            ));
        }
        Ok(())
    }

    /// Link the notifier sends for a password reset.
    pub fn reset_link(&self, token: &str, email: &str) -> String {
        format!(
            "{}/reset-password?token={}&email={}",
            self.frontend_url.trim_end_matches('/'),
            token,
            email
        )
    }

    /// Link the notifier sends for e-mail verification.
    pub fn verification_link(&self, email: &str, hash: &str) -> String {
        format!(
            "{}/verify-email?email={}&hash={}",
            self.frontend_url.trim_end_matches('/'),
            email,
            hash
        )
    }
}

/// Builder for [`SchoolConfig`].
#[derive(Debug, Clone, Default)]
pub struct SchoolConfigBuilder {
    config: SchoolConfig,
}

impl SchoolConfigBuilder {
    pub fn password_reset_ttl_minutes(mut self, minutes: i64) -> Self {
        self.config.password_reset_ttl_minutes = minutes;
        self
    }

    pub fn access_token_ttl_minutes(mut self, minutes: Option<i64>) -> Self {
        self.config.access_token_ttl_minutes = minutes;
        self
    }

    pub fn frontend_url(mut self, url: impl Into<String>) -> Self {
        self.config.frontend_url = url.into();
        self
    }

    pub fn hashing(mut self, hashing: HashingConfig) -> Self {
        self.config.hashing = hashing;
        self
    }

    pub fn provisional_code_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.provisional_code_prefix = prefix.into();
        self
    }

    pub fn expose_reset_token(mut self, expose: bool) -> Self {
        self.config.expose_reset_token = expose;
        self
    }

    pub fn verification_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.verification_secret = secret.into();
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> SchoolResult<SchoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
