use clap::Parser;
use modshard_rules::RuleRegistry;

use super::common::{Format, RegistryConfig, Result};

#[derive(Debug, Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    pub(crate) registry: RegistryConfig,

    /// The format in which to output the rules
    #[clap(value_enum, long = "format", default_value = "pretty")]
    output_format: Format,
}

pub(crate) fn command(config: Config) -> Result<()> {
    let registry = config.registry.build_registry()?;

    match config.output_format {
        Format::Pretty => print!("{}", pretty(&registry)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&registry)?),
    }

    Ok(())
}

fn pretty(registry: &RuleRegistry) -> String {
    let mut out = format!("logical database: {}\n", registry.logical_database());
    out.push_str(&format!(
        "mode: {} (repository {})\n",
        registry.mode().mode,
        registry.mode().repository
    ));

    out.push_str("shards:\n");
    for ds in registry.data_sources() {
        let pool = ds.pool();
        out.push_str(&format!(
            "  {}\t{}\tuser={} min_idle={} max_pool_size={} autocommit={}\n",
            ds.shard(),
            ds.url(),
            ds.username(),
            pool.min_idle,
            pool.max_pool_size,
            pool.autocommit
        ));
    }

    out.push_str("algorithms:\n");
    for (name, algorithm) in registry.algorithms() {
        let props = algorithm
            .props()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "  {name}\t{}\t{props}\n",
            algorithm.type_name()
        ));
    }

    out.push_str("sharding rules:\n");
    for rule in registry.sharding_rules() {
        out.push_str(&format!(
            "  {}\tcolumn={}\talgorithm={}\tdata_nodes={}\n",
            rule.table(),
            rule.sharding_column(),
            rule.algorithm(),
            rule.data_nodes()
        ));
    }

    out.push_str("broadcast tables:\n");
    for table in registry.broadcast_rule().tables() {
        out.push_str(&format!("  {table}\n"));
    }

    out
}
