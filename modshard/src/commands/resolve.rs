use std::ops::Bound;

use clap::Parser;
use modshard_rules::{RouteTarget, RuleRegistry};
use modshard_sharder::KeyRange;
use serde::Serialize;

use super::common::{Format, RegistryConfig, Result};

#[derive(Debug, Parser)]
#[clap(visible_alias = "r")]
pub(crate) struct Config {
    #[clap(flatten)]
    pub(crate) registry: RegistryConfig,

    /// The logical table the statement targets
    #[clap(short = 't', long = "table")]
    table: String,

    /// Sharding column value of a point lookup
    ///
    /// Without `--key` the statement is routed as a range predicate bounded
    /// by `--lower` and `--upper`.
    #[clap(short = 'k', long = "key", conflicts_with_all = ["lower", "upper"])]
    key: Option<String>,

    /// Inclusive lower bound of a range predicate
    #[clap(long = "lower")]
    lower: Option<String>,

    /// Inclusive upper bound of a range predicate
    #[clap(long = "upper")]
    upper: Option<String>,

    /// The format in which to output the routed shards
    #[clap(value_enum, long = "format", default_value = "pretty")]
    output_format: Format,
}

#[derive(Debug, Serialize)]
struct RoutedShard<'a> {
    shard: String,
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct Routed<'a> {
    table: &'a str,
    shards: Vec<RoutedShard<'a>>,
}

pub(crate) fn command(config: Config) -> Result<()> {
    let registry = config.registry.build_registry()?;

    let target = match &config.key {
        Some(key) => registry.route_precise(&config.table, key)?,
        None => {
            let range = KeyRange::new(
                inclusive(config.lower.as_deref()),
                inclusive(config.upper.as_deref()),
            );
            registry.route_range(&config.table, &range)?
        }
    };
    let output = routed(&registry, &config.table, target);

    match config.output_format {
        Format::Pretty => {
            for shard in &output.shards {
                println!("{}\t{}", shard.shard, shard.url);
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }

    Ok(())
}

fn inclusive(bound: Option<&str>) -> Bound<&str> {
    match bound {
        Some(value) => Bound::Included(value),
        None => Bound::Unbounded,
    }
}

fn routed<'a>(
    registry: &'a RuleRegistry,
    table: &'a str,
    target: RouteTarget<'a>,
) -> Routed<'a> {
    let shards = target
        .shards()
        .iter()
        .map(|shard| RoutedShard {
            shard: shard.to_string(),
            url: registry
                .data_source(shard)
                .map(|ds| ds.url())
                .unwrap_or_default(),
        })
        .collect();
    Routed { table, shards }
}
