//! Config for the shards of the logical database and the rules built over
//! them.

use std::path::{Path, PathBuf};

use modshard_id::DEFAULT_SHARD_PREFIX;
use modshard_rules::{
    DEFAULT_LOGICAL_DATABASE, EngineProperties, ModeConfig, RegistryOptions, ShardDescriptor,
};
use observability_deps::tracing::debug;
use serde::Deserialize;

use crate::pool::PoolConfig;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read shards file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse shards file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// The layout of a shards file:
///
/// ```json
/// { "shards": [ { "url": "db1:3306/app", "username": "app", "password": "..." } ] }
/// ```
#[derive(Debug, Deserialize)]
struct ShardsFile {
    shards: Vec<ShardDescriptor>,
}

/// CLI config for the shards backing the logical database.
#[derive(Debug, Clone, clap::Parser)]
pub struct ShardsConfig {
    /// Path to a JSON file listing the shards, in ordinal order.
    ///
    /// The order of the shards decides which keys each one holds and must
    /// not change once data has been written.
    #[clap(long = "shards-file", env = "MODSHARD_SHARDS_FILE", action)]
    pub shards_file: Option<PathBuf>,

    /// A shard given inline as `username:password@url`.
    ///
    /// May be repeated; inline shards follow the shards from `--shards-file`
    /// and `--shard-list`. The whole value is one shard, so the password may
    /// contain commas.
    #[clap(long = "shard", action = clap::ArgAction::Append)]
    pub shards: Vec<ShardDescriptor>,

    /// Comma separated `username:password@url` shards.
    ///
    /// Passwords containing a comma cannot be given here; use `--shard` or
    /// `--shards-file` for them.
    #[clap(
        long = "shard-list",
        env = "MODSHARD_SHARDS",
        value_delimiter = ',',
        action = clap::ArgAction::Append
    )]
    pub shard_list: Vec<ShardDescriptor>,

    /// Prefix of the shard identifiers, which are numbered from 1.
    #[clap(
        long = "shard-prefix",
        env = "MODSHARD_SHARD_PREFIX",
        default_value = DEFAULT_SHARD_PREFIX,
        action
    )]
    pub shard_prefix: String,

    /// Name the sharded database is presented under.
    #[clap(
        long = "logical-database",
        env = "MODSHARD_LOGICAL_DATABASE",
        default_value = DEFAULT_LOGICAL_DATABASE,
        action
    )]
    pub logical_database: String,

    /// Log every routed statement.
    #[clap(
        long = "sql-show",
        env = "MODSHARD_SQL_SHOW",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub sql_show: bool,

    /// Repository the standalone engine keeps its own metadata in.
    #[clap(
        long = "metadata-repository",
        env = "MODSHARD_METADATA_REPOSITORY",
        default_value = ModeConfig::JDBC_REPOSITORY,
        action
    )]
    pub metadata_repository: String,

    #[clap(flatten)]
    pub pool: PoolConfig,
}

impl ShardsConfig {
    /// All configured shard descriptors: those from the shards file, then
    /// `--shard-list`, then each `--shard`.
    pub fn descriptors(&self) -> Result<Vec<ShardDescriptor>, Error> {
        let mut descriptors = match &self.shards_file {
            Some(path) => read_shards_file(path)?,
            None => vec![],
        };
        descriptors.extend(self.shard_list.iter().cloned());
        descriptors.extend(self.shards.iter().cloned());
        Ok(descriptors)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            shard_prefix: self.shard_prefix.clone(),
            logical_database: self.logical_database.clone(),
            pool: self.pool.options(),
            engine: EngineProperties {
                sql_show: self.sql_show,
            },
            mode: ModeConfig {
                mode: ModeConfig::STANDALONE.to_string(),
                repository: self.metadata_repository.clone(),
            },
        }
    }
}

fn read_shards_file(path: &Path) -> Result<Vec<ShardDescriptor>, Error> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ShardsFile = serde_json::from_str(&contents).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), shards = file.shards.len(), "read shards file");
    Ok(file.shards)
}
