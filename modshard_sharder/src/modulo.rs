use crate::{KeyRange, ResolveError, ShardResolver};
use modshard_id::{ShardId, ShardOrdinal};
use observability_deps::tracing::trace;
use std::num::NonZeroU32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a modulo sharder needs at least one shard")]
pub struct ZeroShardCount;

/// A [`ModuloSharder`] maps an integer sharding key `k` to the shard with
/// ordinal `(k mod N) + 1`, where `N` is the configured shard count.
///
/// # Correctness
///
/// The mapping is a function of `N` only. Changing the shard count, or the
/// order in which physical endpoints are assigned ordinals, moves existing
/// rows to a different shard without any data being migrated.
///
/// Range predicates are never pruned: [`ShardResolver::resolve_range`]
/// answers with every available shard and leaves merging the per-shard
/// results to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuloSharder {
    shard_count: NonZeroU32,
}

impl ModuloSharder {
    /// The name this resolver is registered under in algorithm
    /// configuration.
    pub const NAME: &'static str = "ModuloSharder";

    pub fn new(shard_count: u32) -> Result<Self, ZeroShardCount> {
        NonZeroU32::new(shard_count)
            .map(|shard_count| Self { shard_count })
            .ok_or(ZeroShardCount)
    }

    pub fn with_shard_count(shard_count: NonZeroU32) -> Self {
        Self { shard_count }
    }

    pub fn shard_count(&self) -> NonZeroU32 {
        self.shard_count
    }

    /// Parse a sharding-column value as a non-negative base-10 integer.
    pub fn parse_key(key: &str) -> Result<u64, ResolveError> {
        key.parse::<u64>()
            .map_err(|source| ResolveError::InvalidShardingKey {
                key: key.to_string(),
                source,
            })
    }

    /// The ordinal of the shard owning `key`.
    pub fn ordinal_for(&self, key: u64) -> ShardOrdinal {
        // bucket < shard_count <= u32::MAX, so bucket + 1 never saturates.
        let bucket = (key % u64::from(self.shard_count.get())) as u32;
        NonZeroU32::MIN.saturating_add(bucket).into()
    }
}

impl ShardResolver for ModuloSharder {
    fn resolve_precise<'a>(
        &self,
        available: &'a [ShardId],
        key: &str,
    ) -> Result<&'a ShardId, ResolveError> {
        let ordinal = self.ordinal_for(Self::parse_key(key)?);

        let shard = available
            .iter()
            .find(|shard| shard.ordinal() == ordinal)
            .ok_or(ResolveError::ShardNotFound {
                ordinal,
                available: available.len(),
            })?;

        trace!(key, %shard, "resolved sharding key");
        Ok(shard)
    }

    fn resolve_range<'a>(
        &self,
        available: &'a [ShardId],
        range: &KeyRange<'_>,
    ) -> &'a [ShardId] {
        trace!(
            lower = ?range.lower(),
            upper = ?range.upper(),
            shards = available.len(),
            "range predicates are not pruned"
        );
        available
    }
}
