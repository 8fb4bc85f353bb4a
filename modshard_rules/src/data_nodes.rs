//! The inline data-node expression, e.g. `shard_${1..8}.member`, naming
//! every physical location of a sharded table.

use std::fmt::Display;
use std::num::NonZeroU32;
use std::str::FromStr;

use modshard_id::{ShardId, ShardSet};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataNodesParseError {
    #[error("expected '<prefix>${{<start>..<end>}}.<table>', got {0:?}")]
    Syntax(String),

    #[error("shard ordinals start at 1, got range starting at {0}")]
    StartNotOne(u32),

    #[error("shard range {start}..{end} is empty")]
    EmptyRange { start: u32, end: u32 },

    #[error("data nodes {0:?} do not name a table")]
    MissingTable(String),
}

/// One physical table on one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNode<'a> {
    pub shard: ShardId,
    pub table: &'a str,
}

impl Display for DataNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.shard, self.table)
    }
}

/// A table spread over every shard of a [`ShardSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNodes {
    shards: ShardSet,
    table: String,
}

impl DataNodes {
    pub fn new(shards: ShardSet, table: impl Into<String>) -> Self {
        Self {
            shards,
            table: table.into(),
        }
    }

    pub fn shards(&self) -> &ShardSet {
        &self.shards
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn iter(&self) -> impl Iterator<Item = DataNode<'_>> {
        self.shards.iter().map(|shard| DataNode {
            shard,
            table: &self.table,
        })
    }
}

impl Display for DataNodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}${{1..{}}}.{}",
            self.shards.prefix(),
            self.shards.count(),
            self.table
        )
    }
}

impl Serialize for DataNodes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl FromStr for DataNodes {
    type Err = DataNodesParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = || DataNodesParseError::Syntax(s.to_string());

        let (prefix, rest) = s.split_once("${").ok_or_else(syntax)?;
        let (range, rest) = rest.split_once('}').ok_or_else(syntax)?;
        let (start, end) = range.split_once("..").ok_or_else(syntax)?;
        let start = start.trim().parse::<u32>().map_err(|_| syntax())?;
        let end = end.trim().parse::<u32>().map_err(|_| syntax())?;
        let table = rest.strip_prefix('.').ok_or_else(syntax)?;

        if start != 1 {
            return Err(DataNodesParseError::StartNotOne(start));
        }
        let count = NonZeroU32::new(end)
            .filter(|end| end.get() >= start)
            .ok_or(DataNodesParseError::EmptyRange { start, end })?;
        if table.is_empty() {
            return Err(DataNodesParseError::MissingTable(s.to_string()));
        }

        Ok(Self::new(ShardSet::new(prefix, count), table))
    }
}
