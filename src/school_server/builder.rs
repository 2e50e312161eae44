//! Builder for configuring school server instances.

use crate::auth::{Argon2Hasher, Clock, CredentialHasher, SystemClock};
use crate::config::SchoolConfig;
use crate::error::SchoolResult;
use crate::notify::{LogNotifier, Notifier};
use crate::school_server::SchoolServer;
use crate::storage::TransactionalStorage;
use std::sync::Arc;
use uuid::Uuid;

/// Builder for [`SchoolServer`]. Every collaborator has a production default.
pub struct SchoolServerBuilder<S> {
    storage: S,
    config: SchoolConfig,
    hasher: Option<Arc<dyn CredentialHasher>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<S: TransactionalStorage> SchoolServerBuilder<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            config: SchoolConfig::default(),
            hasher: None,
            notifier: None,
            clock: None,
        }
    }

    pub fn with_config(mut self, config: SchoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default Argon2id hasher built from the config.
    pub fn with_hasher(mut self, hasher: impl CredentialHasher + 'static) -> Self {
        self.hasher = Some(Arc::new(hasher));
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> SchoolResult<SchoolServer<S>> {
        self.config.validate()?;

        let hasher = match self.hasher {
            Some(hasher) => hasher,
            None => Arc::new(Argon2Hasher::new(&self.config.hashing)?),
        };
        let decoy_hash = hasher.hash(&Uuid::new_v4().to_string())?.into();

        Ok(SchoolServer {
            storage: self.storage,
            config: Arc::new(self.config),
            hasher,
            decoy_hash,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}
