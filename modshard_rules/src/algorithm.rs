use std::collections::BTreeMap;
use std::sync::Arc;

use modshard_sharder::ShardResolver;
use serde::Serialize;

/// A named sharding algorithm, as registered with the engine.
///
/// The properties are the engine-facing description of the algorithm; the
/// resolver is the instance that actually answers routing calls.
#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmConfig {
    type_name: String,
    props: BTreeMap<String, String>,
    #[serde(skip)]
    resolver: Arc<dyn ShardResolver>,
}

impl AlgorithmConfig {
    /// Algorithm type for resolvers supplied by the application rather than
    /// built into the engine.
    pub const CLASS_BASED: &'static str = "CLASS_BASED";
    pub const STRATEGY_PROP: &'static str = "strategy";
    pub const CLASS_NAME_PROP: &'static str = "algorithmClassName";

    pub fn new(type_name: impl Into<String>, resolver: Arc<dyn ShardResolver>) -> Self {
        Self {
            type_name: type_name.into(),
            props: BTreeMap::new(),
            resolver,
        }
    }

    /// A single-column, application supplied resolver registered under
    /// `class_name`.
    pub fn class_based(class_name: &str, resolver: Arc<dyn ShardResolver>) -> Self {
        Self::new(Self::CLASS_BASED, resolver)
            .with_property(Self::STRATEGY_PROP, "STANDARD")
            .with_property(Self::CLASS_NAME_PROP, class_name)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn props(&self) -> &BTreeMap<String, String> {
        &self.props
    }

    pub fn resolver(&self) -> &Arc<dyn ShardResolver> {
        &self.resolver
    }
}
