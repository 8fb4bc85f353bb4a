use clap::{Parser, ValueEnum};
use modshard_clap_blocks::shards::ShardsConfig;
use modshard_rules::RuleRegistry;
use trogging::cli::LoggingConfig;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Config(#[from] modshard_clap_blocks::shards::Error),

    #[error(transparent)]
    Rules(#[from] modshard_rules::Error),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// Config shared by every command that builds the sharding rules
#[derive(Debug, Parser)]
pub(crate) struct RegistryConfig {
    #[clap(flatten)]
    pub(crate) shards: ShardsConfig,

    /// logging options
    #[clap(flatten)]
    pub(crate) logging_config: LoggingConfig,
}

impl RegistryConfig {
    pub(crate) fn build_registry(&self) -> Result<RuleRegistry> {
        let descriptors = self.shards.descriptors()?;
        let registry = RuleRegistry::build_with(descriptors, &self.shards.registry_options())?;
        Ok(registry)
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum Format {
    #[default]
    Pretty,
    Json,
}
