//! Config for the per-shard connection pools.

use modshard_rules::PoolOptions;

/// CLI config for the connection pool opened against every shard.
#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct PoolConfig {
    /// Minimum number of idle connections kept open per shard.
    #[clap(
        long = "pool-min-idle",
        env = "MODSHARD_POOL_MIN_IDLE",
        default_value_t = 5,
        action
    )]
    pub min_idle: u32,

    /// Maximum number of connections per shard.
    #[clap(
        long = "pool-max-size",
        env = "MODSHARD_POOL_MAX_SIZE",
        default_value_t = 5,
        action
    )]
    pub max_pool_size: u32,

    /// Whether pooled connections run in autocommit mode.
    #[clap(
        long = "pool-autocommit",
        env = "MODSHARD_POOL_AUTOCOMMIT",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub autocommit: bool,
}

impl PoolConfig {
    pub fn options(&self) -> PoolOptions {
        PoolOptions {
            min_idle: self.min_idle,
            max_pool_size: self.max_pool_size,
            autocommit: self.autocommit,
        }
    }
}
