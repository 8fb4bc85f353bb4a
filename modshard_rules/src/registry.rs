//! The static routing configuration of a logical database.

use std::fmt::Display;
use std::num::NonZeroU32;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use modshard_id::{DEFAULT_SHARD_PREFIX, ShardId, ShardSet};
use modshard_sharder::{KeyRange, ModuloSharder, ShardResolver};
use observability_deps::tracing::{debug, info};
use serde::Serialize;

use crate::{
    AlgorithmConfig, DataNodes, DataSourceFactory, Error, PoolOptions, Result, ShardDataSource,
    ShardDescriptor,
};

/// The name the engine presents the sharded database under.
pub const DEFAULT_LOGICAL_DATABASE: &str = "database";

pub const MEMBER_TABLE: &str = "member";
pub const MEMBER_SHARDING_COLUMN: &str = "id";
pub const MEMBER_ALGORITHM: &str = "member_id_key_sharding_algorithm";
pub const USER_TABLE: &str = "user";

/// Properties passed through to the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineProperties {
    /// Log every routed statement.
    pub sql_show: bool,
}

impl Default for EngineProperties {
    fn default() -> Self {
        Self { sql_show: true }
    }
}

/// How the engine runs and where it persists its own metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeConfig {
    pub mode: String,
    pub repository: String,
}

impl ModeConfig {
    /// A single engine instance, not coordinating with others.
    pub const STANDALONE: &'static str = "Standalone";
    /// Metadata kept in a relational database.
    pub const JDBC_REPOSITORY: &'static str = "JDBC";
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            mode: Self::STANDALONE.to_string(),
            repository: Self::JDBC_REPOSITORY.to_string(),
        }
    }
}

/// Binds a table to the column and algorithm that shard it.
#[derive(Debug, Clone, Serialize)]
pub struct ShardingRule {
    table: String,
    sharding_column: String,
    algorithm: String,
    data_nodes: DataNodes,
    #[serde(skip)]
    shards: Vec<ShardId>,
}

impl ShardingRule {
    pub fn new(
        table: &str,
        sharding_column: impl Into<String>,
        algorithm: impl Into<String>,
        data_nodes: DataNodes,
    ) -> Self {
        let shards = data_nodes.shards().to_vec();
        Self {
            table: table.to_lowercase(),
            sharding_column: sharding_column.into(),
            algorithm: algorithm.into(),
            data_nodes,
            shards,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn sharding_column(&self) -> &str {
        &self.sharding_column
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn data_nodes(&self) -> &DataNodes {
        &self.data_nodes
    }

    /// The shards holding this table, in ordinal order.
    pub fn shards(&self) -> &[ShardId] {
        &self.shards
    }
}

/// Tables replicated in full to every shard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastRule {
    tables: IndexSet<String>,
}

impl BroadcastRule {
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains(table)
    }
}

/// How statements against a table are routed.
#[derive(Debug, Clone, Copy)]
pub enum TableKind<'a> {
    Sharded(&'a ShardingRule),
    Broadcast,
    Unsharded,
}

/// The shards a statement is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget<'a> {
    Single(&'a ShardId),
    Many(&'a [ShardId]),
}

impl<'a> RouteTarget<'a> {
    pub fn shards(&self) -> &'a [ShardId] {
        match *self {
            Self::Single(shard) => std::slice::from_ref(shard),
            Self::Many(shards) => shards,
        }
    }
}

impl Display for RouteTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, shard) in self.shards().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{shard}")?;
        }
        Ok(())
    }
}

/// Settings [`RuleRegistry::build_with`] applies on top of the shard
/// descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    pub shard_prefix: String,
    pub logical_database: String,
    pub pool: PoolOptions,
    pub engine: EngineProperties,
    pub mode: ModeConfig,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            shard_prefix: DEFAULT_SHARD_PREFIX.to_string(),
            logical_database: DEFAULT_LOGICAL_DATABASE.to_string(),
            pool: PoolOptions::default(),
            engine: EngineProperties::default(),
            mode: ModeConfig::default(),
        }
    }
}

/// All sharding and broadcast rules of one logical database, with the
/// shards they route to.
///
/// Built once at startup and never modified; share it behind an [`Arc`].
/// Adding or removing a shard means building a new registry, and because
/// keys are placed by `key mod shard count`, doing so relocates existing
/// rows without migrating them.
#[derive(Debug, Serialize)]
pub struct RuleRegistry {
    logical_database: String,
    data_sources: Vec<ShardDataSource>,
    #[serde(skip)]
    all_shards: Vec<ShardId>,
    algorithms: IndexMap<String, AlgorithmConfig>,
    sharding_rules: IndexMap<String, ShardingRule>,
    broadcast: BroadcastRule,
    engine: EngineProperties,
    mode: ModeConfig,
}

impl RuleRegistry {
    /// Build the registry for `descriptors` with default options.
    ///
    /// See [`Self::build_with`].
    pub fn build(descriptors: impl IntoIterator<Item = ShardDescriptor>) -> Result<Self> {
        Self::build_with(descriptors, &RegistryOptions::default())
    }

    /// Build the registry for `descriptors`: shard `N` is the `N`th
    /// descriptor, the `member` table is sharded by `id` modulo the number
    /// of shards, and the `user` table is broadcast.
    pub fn build_with(
        descriptors: impl IntoIterator<Item = ShardDescriptor>,
        options: &RegistryOptions,
    ) -> Result<Self> {
        let data_sources = ShardDataSource::assign(&options.shard_prefix, descriptors, options.pool)?;
        let count = u32::try_from(data_sources.len())
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(Error::TooManyShards)?;

        let sharder = ModuloSharder::with_shard_count(count);
        let data_nodes = DataNodes::new(
            ShardSet::new(options.shard_prefix.as_str(), count),
            MEMBER_TABLE,
        );

        RuleRegistryBuilder::new(data_sources)
            .with_logical_database(options.logical_database.as_str())
            .with_engine_properties(options.engine)
            .with_mode(options.mode.clone())
            .with_algorithm(
                MEMBER_ALGORITHM,
                AlgorithmConfig::class_based(ModuloSharder::NAME, Arc::new(sharder)),
            )
            .with_sharding_rule(ShardingRule::new(
                MEMBER_TABLE,
                MEMBER_SHARDING_COLUMN,
                MEMBER_ALGORITHM,
                data_nodes,
            ))
            .with_broadcast_table(USER_TABLE)
            .build()
    }

    pub fn logical_database(&self) -> &str {
        &self.logical_database
    }

    /// Data sources in ordinal order.
    pub fn data_sources(&self) -> &[ShardDataSource] {
        &self.data_sources
    }

    pub fn data_source(&self, shard: &ShardId) -> Option<&ShardDataSource> {
        self.data_sources.iter().find(|ds| ds.shard() == shard)
    }

    pub fn shard_ids(&self) -> &[ShardId] {
        &self.all_shards
    }

    pub fn algorithms(&self) -> &IndexMap<String, AlgorithmConfig> {
        &self.algorithms
    }

    pub fn sharding_rules(&self) -> impl Iterator<Item = &ShardingRule> {
        self.sharding_rules.values()
    }

    pub fn broadcast_rule(&self) -> &BroadcastRule {
        &self.broadcast
    }

    pub fn engine_properties(&self) -> EngineProperties {
        self.engine
    }

    pub fn mode(&self) -> &ModeConfig {
        &self.mode
    }

    /// Table names are matched case-insensitively.
    pub fn classify(&self, table: &str) -> TableKind<'_> {
        let table = table.to_lowercase();
        if let Some(rule) = self.sharding_rules.get(&table) {
            TableKind::Sharded(rule)
        } else if self.broadcast.contains(&table) {
            TableKind::Broadcast
        } else {
            TableKind::Unsharded
        }
    }

    /// Route a statement with the point predicate `sharding column = key`
    /// on `table`.
    pub fn route_precise(&self, table: &str, key: &str) -> Result<RouteTarget<'_>> {
        let target = match self.classify(table) {
            TableKind::Sharded(rule) => {
                let shard = self.resolver(rule)?.resolve_precise(rule.shards(), key)?;
                RouteTarget::Single(shard)
            }
            TableKind::Broadcast => RouteTarget::Many(&self.all_shards),
            TableKind::Unsharded => return Err(Error::UnknownTable(table.to_string())),
        };
        self.log_route(table, &target);
        Ok(target)
    }

    /// Route a statement with a range predicate on the sharding column of
    /// `table`.
    pub fn route_range(&self, table: &str, range: &KeyRange<'_>) -> Result<RouteTarget<'_>> {
        let target = match self.classify(table) {
            TableKind::Sharded(rule) => {
                RouteTarget::Many(self.resolver(rule)?.resolve_range(rule.shards(), range))
            }
            TableKind::Broadcast => RouteTarget::Many(&self.all_shards),
            TableKind::Unsharded => return Err(Error::UnknownTable(table.to_string())),
        };
        self.log_route(table, &target);
        Ok(target)
    }

    /// Hand every shard's data source to `factory`, in ordinal order.
    pub fn create_data_sources<F>(&self, factory: &F) -> Result<IndexMap<ShardId, F::Source>>
    where
        F: DataSourceFactory,
    {
        self.data_sources
            .iter()
            .map(|data_source| {
                let source = factory
                    .create(data_source)
                    .map_err(|e| Error::DataSource {
                        shard: data_source.shard().clone(),
                        source: Box::new(e),
                    })?;
                info!(
                    shard = %data_source.shard(),
                    url = data_source.url(),
                    min_idle = data_source.pool().min_idle,
                    max_pool_size = data_source.pool().max_pool_size,
                    "created shard data source"
                );
                Ok((data_source.shard().clone(), source))
            })
            .collect()
    }

    fn resolver(&self, rule: &ShardingRule) -> Result<&dyn ShardResolver> {
        self.algorithms
            .get(rule.algorithm())
            .map(|algorithm| Arc::as_ref(algorithm.resolver()))
            .ok_or_else(|| Error::UnknownAlgorithm {
                table: rule.table().to_string(),
                algorithm: rule.algorithm().to_string(),
            })
    }

    fn log_route(&self, table: &str, target: &RouteTarget<'_>) {
        if self.engine.sql_show {
            info!(table, %target, "routed statement");
        } else {
            debug!(table, %target, "routed statement");
        }
    }
}

/// Assembles and validates a [`RuleRegistry`].
#[derive(Debug)]
pub struct RuleRegistryBuilder {
    logical_database: String,
    data_sources: Vec<ShardDataSource>,
    algorithms: Vec<(String, AlgorithmConfig)>,
    sharding_rules: Vec<ShardingRule>,
    broadcast_tables: Vec<String>,
    engine: EngineProperties,
    mode: ModeConfig,
}

impl RuleRegistryBuilder {
    pub fn new(data_sources: Vec<ShardDataSource>) -> Self {
        Self {
            logical_database: DEFAULT_LOGICAL_DATABASE.to_string(),
            data_sources,
            algorithms: vec![],
            sharding_rules: vec![],
            broadcast_tables: vec![],
            engine: EngineProperties::default(),
            mode: ModeConfig::default(),
        }
    }

    pub fn with_logical_database(mut self, name: impl Into<String>) -> Self {
        self.logical_database = name.into();
        self
    }

    pub fn with_engine_properties(mut self, engine: EngineProperties) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_mode(mut self, mode: ModeConfig) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_algorithm(mut self, name: impl Into<String>, config: AlgorithmConfig) -> Self {
        self.algorithms.push((name.into(), config));
        self
    }

    pub fn with_sharding_rule(mut self, rule: ShardingRule) -> Self {
        self.sharding_rules.push(rule);
        self
    }

    pub fn with_broadcast_table(mut self, table: &str) -> Self {
        self.broadcast_tables.push(table.to_lowercase());
        self
    }

    pub fn build(self) -> Result<RuleRegistry> {
        let Self {
            logical_database,
            data_sources,
            algorithms: algorithm_list,
            sharding_rules: rule_list,
            broadcast_tables,
            engine,
            mode,
        } = self;

        let shard_set = contiguous_shards(&data_sources)?;
        let all_shards = shard_set.to_vec();

        let mut algorithms = IndexMap::with_capacity(algorithm_list.len());
        for (name, config) in algorithm_list {
            if algorithms.contains_key(&name) {
                return Err(Error::DuplicateAlgorithm(name));
            }
            algorithms.insert(name, config);
        }

        let mut sharding_rules = IndexMap::with_capacity(rule_list.len());
        for rule in rule_list {
            if sharding_rules.contains_key(rule.table()) {
                return Err(Error::DuplicateShardingRule(rule.table().to_string()));
            }
            if !algorithms.contains_key(rule.algorithm()) {
                return Err(Error::UnknownAlgorithm {
                    table: rule.table().to_string(),
                    algorithm: rule.algorithm().to_string(),
                });
            }
            if !rule.shards().iter().all(|shard| shard_set.contains(shard)) {
                return Err(Error::DataNodesOutOfRange {
                    table: rule.table().to_string(),
                    data_nodes: rule.data_nodes().to_string(),
                });
            }
            sharding_rules.insert(rule.table().to_string(), rule);
        }

        let mut broadcast = BroadcastRule::default();
        for table in broadcast_tables {
            if sharding_rules.contains_key(&table) {
                return Err(Error::BroadcastTableIsSharded(table));
            }
            broadcast.tables.insert(table);
        }

        let registry = RuleRegistry {
            logical_database,
            data_sources,
            all_shards,
            algorithms,
            sharding_rules,
            broadcast,
            engine,
            mode,
        };

        info!(
            logical_database = registry.logical_database(),
            mode = %registry.mode.mode,
            shards = registry.shard_ids().len(),
            sharded_tables = registry.sharding_rules.len(),
            broadcast_tables = registry.broadcast.tables.len(),
            "built sharding rules"
        );
        for rule in registry.sharding_rules() {
            debug!(
                table = rule.table(),
                column = rule.sharding_column(),
                algorithm = rule.algorithm(),
                data_nodes = %rule.data_nodes(),
                "sharding rule"
            );
        }

        Ok(registry)
    }
}

/// The data sources must be `prefix1..prefixN` in that order, all under one
/// prefix.
fn contiguous_shards(data_sources: &[ShardDataSource]) -> Result<ShardSet> {
    let first = data_sources.first().ok_or(Error::NoShardsConfigured)?;
    let count = u32::try_from(data_sources.len())
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or(Error::TooManyShards)?;

    let shard_set = ShardSet::new(first.shard().prefix(), count);
    for (expected, data_source) in shard_set.iter().zip(data_sources) {
        if *data_source.shard() != expected {
            return Err(Error::DataSourcesNotContiguous {
                expected,
                found: data_source.shard().clone(),
            });
        }
    }
    Ok(shard_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataNodesParseError;
    use modshard_id::ShardOrdinal;
    use modshard_sharder::ResolveError;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn descriptors(urls: &[&str]) -> Vec<ShardDescriptor> {
        urls.iter()
            .map(|url| ShardDescriptor::new(*url, "app", "secret"))
            .collect()
    }

    fn eight_shards() -> RuleRegistry {
        let urls = (1..=8).map(|i| format!("db{i}:3306/app")).collect::<Vec<_>>();
        let urls = urls.iter().map(String::as_str).collect::<Vec<_>>();
        RuleRegistry::build(descriptors(&urls)).unwrap()
    }

    fn shard_urls(registry: &RuleRegistry) -> Vec<(String, String)> {
        registry
            .data_sources()
            .iter()
            .map(|ds| (ds.shard().to_string(), ds.url().to_string()))
            .collect()
    }

    #[test_log::test]
    fn build_assigns_shards_in_descriptor_order() {
        let registry = RuleRegistry::build(descriptors(&["d1", "d2", "d3"])).unwrap();
        assert_eq!(
            shard_urls(&registry),
            [
                ("shard_1".to_string(), "mysql://d1".to_string()),
                ("shard_2".to_string(), "mysql://d2".to_string()),
                ("shard_3".to_string(), "mysql://d3".to_string()),
            ]
        );

        // The same endpoints in another order own other ordinals, and so
        // other keys.
        let reordered = RuleRegistry::build(descriptors(&["d3", "d1", "d2"])).unwrap();
        assert_eq!(
            shard_urls(&reordered),
            [
                ("shard_1".to_string(), "mysql://d3".to_string()),
                ("shard_2".to_string(), "mysql://d1".to_string()),
                ("shard_3".to_string(), "mysql://d2".to_string()),
            ]
        );

        let owner = |registry: &RuleRegistry| {
            let target = registry.route_precise("member", "4").unwrap();
            registry
                .data_source(&target.shards()[0])
                .unwrap()
                .url()
                .to_string()
        };
        assert_eq!(owner(&registry), "mysql://d2");
        assert_eq!(owner(&reordered), "mysql://d1");
    }

    #[test]
    fn build_registers_member_and_user_rules() {
        let registry = eight_shards();

        assert_eq!(registry.logical_database(), "database");
        assert_eq!(registry.shard_ids().len(), 8);

        let rules = registry.sharding_rules().collect::<Vec<_>>();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].table(), "member");
        assert_eq!(rules[0].sharding_column(), "id");
        assert_eq!(rules[0].algorithm(), "member_id_key_sharding_algorithm");
        assert_eq!(rules[0].data_nodes().to_string(), "shard_${1..8}.member");

        let algorithm = &registry.algorithms()["member_id_key_sharding_algorithm"];
        assert_eq!(algorithm.type_name(), "CLASS_BASED");
        assert_eq!(algorithm.props()["algorithmClassName"], "ModuloSharder");

        assert_eq!(
            registry.broadcast_rule().tables().collect::<Vec<_>>(),
            ["user"]
        );
        assert!(registry.engine_properties().sql_show);
        assert_eq!(registry.mode().mode, "Standalone");
        assert_eq!(registry.mode().repository, "JDBC");
    }

    #[test]
    fn build_without_shards_fails() {
        let err = RuleRegistry::build(vec![]).unwrap_err();
        assert!(matches!(err, Error::NoShardsConfigured));

        let err = RuleRegistryBuilder::new(vec![]).build().unwrap_err();
        assert!(matches!(err, Error::NoShardsConfigured));
    }

    #[test]
    fn build_with_options() {
        let options = RegistryOptions {
            shard_prefix: "ds_".to_string(),
            logical_database: "members".to_string(),
            pool: PoolOptions {
                min_idle: 1,
                max_pool_size: 10,
                autocommit: true,
            },
            engine: EngineProperties { sql_show: false },
            mode: ModeConfig {
                mode: ModeConfig::STANDALONE.to_string(),
                repository: "File".to_string(),
            },
        };
        let registry = RuleRegistry::build_with(descriptors(&["a", "b"]), &options).unwrap();

        assert_eq!(registry.logical_database(), "members");
        assert_eq!(registry.shard_ids()[1].to_string(), "ds_2");
        assert_eq!(registry.data_sources()[0].pool(), options.pool);
        assert_eq!(
            registry.sharding_rules().next().unwrap().data_nodes().to_string(),
            "ds_${1..2}.member"
        );
        assert!(!registry.engine_properties().sql_show);
        assert_eq!(registry.mode().repository, "File");
    }

    #[test_log::test]
    fn route_precise() {
        let registry = eight_shards();

        let target = registry.route_precise("member", "17").unwrap();
        assert_eq!(target.to_string(), "shard_2");
        let target = registry.route_precise("MEMBER", "23").unwrap();
        assert_eq!(target.to_string(), "shard_8");

        let target = registry.route_precise("user", "17").unwrap();
        assert_eq!(target.shards(), registry.shard_ids());

        let err = registry.route_precise("member", "abc").unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::InvalidShardingKey { .. })
        ));

        let err = registry.route_precise("orders", "1").unwrap_err();
        assert!(matches!(err, Error::UnknownTable(t) if t == "orders"));
    }

    #[test]
    fn route_range_never_prunes() {
        let registry = eight_shards();

        let target = registry
            .route_range("member", &KeyRange::closed("1", "2"))
            .unwrap();
        assert_eq!(target.shards(), registry.shard_ids());
        assert_eq!(
            target.to_string(),
            "shard_1,shard_2,shard_3,shard_4,shard_5,shard_6,shard_7,shard_8"
        );

        let target = registry
            .route_range("user", &KeyRange::unbounded())
            .unwrap();
        assert_eq!(target.shards().len(), 8);

        assert!(matches!(
            registry.route_range("orders", &KeyRange::unbounded()),
            Err(Error::UnknownTable(_))
        ));
    }

    #[test]
    fn classify_tables() {
        let registry = eight_shards();
        assert!(matches!(registry.classify("Member"), TableKind::Sharded(r) if r.table() == "member"));
        assert!(matches!(registry.classify("USER"), TableKind::Broadcast));
        assert!(matches!(registry.classify("orders"), TableKind::Unsharded));
    }

    fn data_sources(n: usize) -> Vec<ShardDataSource> {
        let urls = (1..=n).map(|i| format!("db{i}")).collect::<Vec<_>>();
        ShardDataSource::assign(
            "shard_",
            urls.iter().map(|url| ShardDescriptor::new(url.as_str(), "app", "pw")),
            PoolOptions::default(),
        )
        .unwrap()
    }

    fn member_rule(table: &str, algorithm: &str, shards: u32) -> ShardingRule {
        ShardingRule::new(
            table,
            "id",
            algorithm,
            DataNodes::new(
                ShardSet::new("shard_", NonZeroU32::new(shards).unwrap()),
                table.to_lowercase(),
            ),
        )
    }

    fn modulo(n: u32) -> AlgorithmConfig {
        AlgorithmConfig::class_based(
            ModuloSharder::NAME,
            Arc::new(ModuloSharder::new(n).unwrap()),
        )
    }

    #[test]
    fn builder_rejects_broadcast_table_that_is_sharded() {
        let err = RuleRegistryBuilder::new(data_sources(2))
            .with_algorithm("mod", modulo(2))
            .with_sharding_rule(member_rule("member", "mod", 2))
            .with_broadcast_table("Member")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::BroadcastTableIsSharded(t) if t == "member"));
    }

    #[test]
    fn builder_rejects_duplicate_rules_and_algorithms() {
        let err = RuleRegistryBuilder::new(data_sources(2))
            .with_algorithm("mod", modulo(2))
            .with_sharding_rule(member_rule("member", "mod", 2))
            .with_sharding_rule(member_rule("MEMBER", "mod", 2))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateShardingRule(t) if t == "member"));

        let err = RuleRegistryBuilder::new(data_sources(2))
            .with_algorithm("mod", modulo(2))
            .with_algorithm("mod", modulo(2))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAlgorithm(n) if n == "mod"));
    }

    #[test]
    fn builder_rejects_unknown_algorithm() {
        let err = RuleRegistryBuilder::new(data_sources(2))
            .with_sharding_rule(member_rule("member", "missing", 2))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownAlgorithm { table, algorithm } if table == "member" && algorithm == "missing"
        ));
    }

    #[test]
    fn builder_rejects_data_nodes_beyond_configured_shards() {
        let err = RuleRegistryBuilder::new(data_sources(2))
            .with_algorithm("mod", modulo(3))
            .with_sharding_rule(member_rule("member", "mod", 3))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DataNodesOutOfRange { data_nodes, .. } if data_nodes == "shard_${1..3}.member"
        ));
    }

    fn data_source(prefix: &str, ordinal: u32, url: &str) -> ShardDataSource {
        ShardDataSource::new(
            ShardId::new(prefix, ShardOrdinal::new(ordinal).unwrap()),
            ShardDescriptor::new(url, "app", "pw"),
            PoolOptions::default(),
        )
    }

    #[test]
    fn builder_requires_contiguous_data_sources() {
        let build = |data_sources: Vec<ShardDataSource>| {
            RuleRegistryBuilder::new(data_sources)
                .with_broadcast_table("user")
                .build()
        };
        let mismatch = |err: Error| match err {
            Error::DataSourcesNotContiguous { expected, found } => {
                (expected.to_string(), found.to_string())
            }
            other => panic!("unexpected error: {other}"),
        };

        // duplicate
        let err = build(vec![
            data_source("shard_", 1, "d1"),
            data_source("shard_", 1, "d2"),
            data_source("shard_", 3, "d3"),
        ])
        .unwrap_err();
        assert_eq!(mismatch(err), ("shard_2".to_string(), "shard_1".to_string()));

        // gap
        let err = build(vec![data_source("shard_", 1, "d1"), data_source("shard_", 3, "d3")])
            .unwrap_err();
        assert_eq!(mismatch(err), ("shard_2".to_string(), "shard_3".to_string()));

        // not starting at 1
        let err = build(vec![data_source("shard_", 2, "d2")]).unwrap_err();
        assert_eq!(mismatch(err), ("shard_1".to_string(), "shard_2".to_string()));

        // mixed prefixes
        let err = build(vec![data_source("shard_", 1, "d1"), data_source("ds_", 2, "d2")])
            .unwrap_err();
        assert_eq!(mismatch(err), ("shard_2".to_string(), "ds_2".to_string()));

        // out of order
        let err = build(vec![data_source("shard_", 2, "d2"), data_source("shard_", 1, "d1")])
            .unwrap_err();
        assert_eq!(mismatch(err), ("shard_1".to_string(), "shard_2".to_string()));

        let registry = build(vec![data_source("ds_", 1, "d1"), data_source("ds_", 2, "d2")])
            .unwrap();
        let target = registry.route_precise("user", "1").unwrap();
        assert_eq!(target.to_string(), "ds_1,ds_2");
    }

    #[test]
    fn builder_accepts_parsed_data_nodes() {
        let data_nodes: DataNodes = "shard_${1..2}.orders".parse().unwrap();
        let registry = RuleRegistryBuilder::new(data_sources(4))
            .with_algorithm("mod", modulo(2))
            .with_sharding_rule(ShardingRule::new("orders", "order_id", "mod", data_nodes))
            .build()
            .unwrap();

        // orders only spans the first two of the four shards
        let target = registry.route_range("orders", &KeyRange::unbounded()).unwrap();
        assert_eq!(target.to_string(), "shard_1,shard_2");
        let target = registry.route_precise("orders", "3").unwrap();
        assert_eq!(target.to_string(), "shard_2");

        assert!(matches!(
            "shard_${0..2}.orders".parse::<DataNodes>(),
            Err(DataNodesParseError::StartNotOne(0))
        ));
    }

    #[derive(Debug, Default)]
    struct RecordingFactory {
        created: RefCell<Vec<(String, String, PoolOptions)>>,
        fail_on: Option<ShardOrdinal>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    impl DataSourceFactory for RecordingFactory {
        type Source = String;
        type Error = Refused;

        fn create(&self, data_source: &ShardDataSource) -> Result<Self::Source, Self::Error> {
            if Some(data_source.shard().ordinal()) == self.fail_on {
                return Err(Refused);
            }
            self.created.borrow_mut().push((
                data_source.shard().to_string(),
                data_source.url().to_string(),
                data_source.pool(),
            ));
            Ok(format!("pool for {}", data_source.url()))
        }
    }

    #[test_log::test]
    fn create_data_sources_in_ordinal_order() {
        let registry = RuleRegistry::build(descriptors(&["d1", "d2"])).unwrap();
        let factory = RecordingFactory::default();

        let sources = registry.create_data_sources(&factory).unwrap();
        assert_eq!(
            sources
                .iter()
                .map(|(k, v)| (k.to_string(), v.as_str()))
                .collect::<Vec<_>>(),
            [
                ("shard_1".to_string(), "pool for mysql://d1"),
                ("shard_2".to_string(), "pool for mysql://d2"),
            ]
        );

        let pool = PoolOptions {
            min_idle: 5,
            max_pool_size: 5,
            autocommit: false,
        };
        assert_eq!(
            factory.created.into_inner(),
            [
                ("shard_1".to_string(), "mysql://d1".to_string(), pool),
                ("shard_2".to_string(), "mysql://d2".to_string(), pool),
            ]
        );
    }

    #[test]
    fn create_data_sources_reports_failing_shard() {
        let registry = RuleRegistry::build(descriptors(&["d1", "d2"])).unwrap();
        let factory = RecordingFactory {
            fail_on: ShardOrdinal::new(2),
            ..Default::default()
        };

        let err = registry.create_data_sources(&factory).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to create data source for shard_2: connection refused"
        );
    }

    #[test]
    fn registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleRegistry>();
    }
}
