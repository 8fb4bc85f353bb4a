//! Identifiers for the physical shards a logical table is spread across.
//!
//! A shard is addressed by a structured [`ShardId`], a `{prefix, ordinal}`
//! pair. The familiar `shard_3` form is only ever a rendering of that pair:
//! two identifiers are equal when their prefixes and ordinals are equal, and
//! no code in this workspace compares shards by string suffix.
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::num::NonZeroU32;
use std::sync::Arc;

/// The prefix shard identifiers are given when none is configured.
pub const DEFAULT_SHARD_PREFIX: &str = "shard_";

/// The 1-based position of a shard within its [`ShardSet`].
#[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Hash, Serialize)]
pub struct ShardOrdinal(NonZeroU32);

impl ShardOrdinal {
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    pub fn new(ordinal: u32) -> Option<Self> {
        NonZeroU32::new(ordinal).map(Self)
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl From<NonZeroU32> for ShardOrdinal {
    fn from(value: NonZeroU32) -> Self {
        Self(value)
    }
}

impl Display for ShardOrdinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one physical shard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardId {
    prefix: Arc<str>,
    ordinal: ShardOrdinal,
}

impl ShardId {
    pub fn new(prefix: impl Into<Arc<str>>, ordinal: ShardOrdinal) -> Self {
        Self {
            prefix: prefix.into(),
            ordinal,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn ordinal(&self) -> ShardOrdinal {
        self.ordinal
    }
}

impl Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.prefix, self.ordinal)
    }
}

impl Serialize for ShardId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// The contiguous run of shards `prefix1..=prefixN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardSet {
    prefix: Arc<str>,
    count: NonZeroU32,
}

impl ShardSet {
    pub fn new(prefix: impl Into<Arc<str>>, count: NonZeroU32) -> Self {
        Self {
            prefix: prefix.into(),
            count,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of shards in the set, which is also the highest ordinal.
    pub fn count(&self) -> NonZeroU32 {
        self.count
    }

    pub fn contains(&self, id: &ShardId) -> bool {
        *id.prefix == *self.prefix && id.ordinal.get() <= self.count.get()
    }

    /// Iterate the shards of this set in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = ShardId> + '_ {
        (1..=self.count.get())
            .filter_map(ShardOrdinal::new)
            .map(|ordinal| ShardId {
                prefix: Arc::clone(&self.prefix),
                ordinal,
            })
    }

    pub fn to_vec(&self) -> Vec<ShardId> {
        self.iter().collect()
    }
}
