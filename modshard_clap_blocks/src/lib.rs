//! Building blocks for [`clap`]-driven configuration options.
pub mod pool;
pub mod shards;
