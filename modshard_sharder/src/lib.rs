//! Routing of sharding-column values to the shard that owns them.
//!
//! A [`ShardResolver`] is consulted by the SQL engine while it plans a
//! statement against a sharded table: point predicates (`id = 17`) are
//! resolved to exactly one shard, range predicates to a set of shards.

use modshard_id::{ShardId, ShardOrdinal};
use std::fmt::Debug;
use std::num::ParseIntError;
use std::ops::Bound;

mod modulo;
pub use modulo::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("sharding key {key:?} is not a non-negative integer: {source}")]
    InvalidShardingKey { key: String, source: ParseIntError },

    #[error("no available shard has ordinal {ordinal} ({available} shards searched)")]
    ShardNotFound {
        ordinal: ShardOrdinal,
        available: usize,
    },
}

/// The sharding-column bounds of a range predicate, as they appear in the
/// statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange<'a> {
    lower: Bound<&'a str>,
    upper: Bound<&'a str>,
}

impl<'a> KeyRange<'a> {
    pub fn new(lower: Bound<&'a str>, upper: Bound<&'a str>) -> Self {
        Self { lower, upper }
    }

    /// `lower <= key <= upper`, the shape of a `BETWEEN` predicate.
    pub fn closed(lower: &'a str, upper: &'a str) -> Self {
        Self::new(Bound::Included(lower), Bound::Included(upper))
    }

    pub fn unbounded() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    pub fn lower(&self) -> Bound<&'a str> {
        self.lower
    }

    pub fn upper(&self) -> Bound<&'a str> {
        self.upper
    }
}

/// Maps sharding-column values onto the shards a table's rows live in.
///
/// Implementations must be pure: the same inputs always produce the same
/// output, so a row written through one process is found again through any
/// other process configured with the same shards in the same order.
pub trait ShardResolver: Debug + Send + Sync {
    /// Select the one shard in `available` owning rows whose sharding column
    /// equals `key`.
    fn resolve_precise<'a>(
        &self,
        available: &'a [ShardId],
        key: &str,
    ) -> Result<&'a ShardId, ResolveError>;

    /// Select the shards in `available` that may hold rows whose sharding
    /// column falls in `range`.
    fn resolve_range<'a>(&self, available: &'a [ShardId], range: &KeyRange<'_>)
    -> &'a [ShardId];
}
