//! Per-shard connection descriptors and the data sources derived from them.

use std::num::NonZeroU32;
use std::str::FromStr;

use modshard_id::{ShardId, ShardOrdinal};
use secrecy::Secret;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Scheme given to shard URLs configured without one.
pub const DEFAULT_URL_SCHEME: &str = "mysql://";

/// Connection details for one physical database, as configured.
///
/// The position of a descriptor in its list decides which shard ordinal it
/// is assigned, and therefore which keys its database holds.
#[derive(Debug, Clone, Deserialize)]
pub struct ShardDescriptor {
    pub url: String,
    pub username: String,
    pub password: Secret<String>,
}

impl ShardDescriptor {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseDescriptorError {
    #[error("expected a shard in the form 'username:password@url'")]
    MissingCredentials,

    #[error("shard credentials must be given as 'username:password'")]
    MissingPassword,

    #[error("shard url must not be empty")]
    EmptyUrl,
}

impl FromStr for ShardDescriptor {
    type Err = ParseDescriptorError;

    /// Parse `username:password@url`. The url follows the last `@` and the
    /// password follows the first `:`, so a password may contain either.
    /// Callers splitting a list of descriptors on `,` must not be handed
    /// passwords containing one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (credentials, url) = s
            .rsplit_once('@')
            .ok_or(ParseDescriptorError::MissingCredentials)?;
        let (username, password) = credentials
            .split_once(':')
            .ok_or(ParseDescriptorError::MissingPassword)?;
        if url.is_empty() {
            return Err(ParseDescriptorError::EmptyUrl);
        }
        Ok(Self::new(url, username, password))
    }
}

/// Connection-pool sizing handed to the pool factory for every shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolOptions {
    pub min_idle: u32,
    pub max_pool_size: u32,
    pub autocommit: bool,
}

impl PoolOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_pool_size == 0 {
            return Err(Error::InvalidPoolOptions(
                "maximum pool size must be at least 1".to_string(),
            ));
        }
        if self.min_idle > self.max_pool_size {
            return Err(Error::InvalidPoolOptions(format!(
                "minimum idle connections ({}) exceeds maximum pool size ({})",
                self.min_idle, self.max_pool_size
            )));
        }
        Ok(())
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_idle: 5,
            max_pool_size: 5,
            autocommit: false,
        }
    }
}

/// Everything the external pool factory needs to open connections to one
/// shard.
#[derive(Debug, Serialize)]
pub struct ShardDataSource {
    shard: ShardId,
    url: String,
    username: String,
    #[serde(skip)]
    password: Secret<String>,
    pool: PoolOptions,
}

impl ShardDataSource {
    pub fn new(shard: ShardId, descriptor: ShardDescriptor, pool: PoolOptions) -> Self {
        let ShardDescriptor {
            url,
            username,
            password,
        } = descriptor;
        let url = if url.contains("://") {
            url
        } else {
            format!("{DEFAULT_URL_SCHEME}{url}")
        };
        Self {
            shard,
            url,
            username,
            password,
            pool,
        }
    }

    /// Assign shard identifiers `prefix1..prefixN` to `descriptors` in the
    /// order they are given.
    pub fn assign(
        prefix: &str,
        descriptors: impl IntoIterator<Item = ShardDescriptor>,
        pool: PoolOptions,
    ) -> Result<Vec<Self>> {
        let mut ordinal = NonZeroU32::MIN;
        let mut data_sources = Vec::new();
        for descriptor in descriptors {
            if !data_sources.is_empty() {
                ordinal = ordinal.checked_add(1).ok_or(Error::TooManyShards)?;
            }
            let shard = ShardId::new(prefix, ShardOrdinal::from(ordinal));
            data_sources.push(Self::new(shard, descriptor, pool));
        }

        if data_sources.is_empty() {
            return Err(Error::NoShardsConfigured);
        }
        pool.validate()?;
        Ok(data_sources)
    }

    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Secret<String> {
        &self.password
    }

    pub fn pool(&self) -> PoolOptions {
        self.pool
    }
}

/// Builds a pooled connection source for a shard.
///
/// Implemented by the connection-pool layer; the rules only describe what
/// to connect to.
pub trait DataSourceFactory {
    type Source;
    type Error: std::error::Error + Send + Sync + 'static;

    fn create(&self, data_source: &ShardDataSource) -> Result<Self::Source, Self::Error>;
}
