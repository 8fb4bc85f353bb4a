//! Static sharding configuration for a logical database.
//!
//! A [`RuleRegistry`] declares which tables are split across shards (and by
//! which column and algorithm), which tables are broadcast to every shard,
//! and the data source backing each shard. The SQL engine consults it while
//! planning statements; it is built once at startup and read-only after.

use modshard_id::ShardId;
use modshard_sharder::ResolveError;

mod algorithm;
mod data_nodes;
mod data_source;
mod registry;

pub use algorithm::*;
pub use data_nodes::*;
pub use data_source::*;
pub use registry::*;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no shards configured, at least one shard descriptor is required")]
    NoShardsConfigured,

    #[error("too many shards configured, at most {} are supported", u32::MAX)]
    TooManyShards,

    #[error("invalid pool options: {0}")]
    InvalidPoolOptions(String),

    #[error("shard data sources must be numbered from 1 in order under one prefix, expected {expected} but found {found}")]
    DataSourcesNotContiguous { expected: ShardId, found: ShardId },

    #[error("sharding algorithm {0} is registered more than once")]
    DuplicateAlgorithm(String),

    #[error("table {0} has more than one sharding rule")]
    DuplicateShardingRule(String),

    #[error("sharding rule for table {table} references unknown algorithm {algorithm}")]
    UnknownAlgorithm { table: String, algorithm: String },

    #[error("table {0} is declared as both a broadcast table and a sharded table")]
    BroadcastTableIsSharded(String),

    #[error("data nodes {data_nodes} of table {table} include shards that are not configured")]
    DataNodesOutOfRange { table: String, data_nodes: String },

    #[error("table {0} is neither sharded nor broadcast")]
    UnknownTable(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to create data source for {shard}: {source}")]
    DataSource {
        shard: ShardId,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
