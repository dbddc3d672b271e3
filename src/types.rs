#![forbid(unsafe_code)]
//! Shared identifiers, edge tuples, and the crate error type.

use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct NodeId(pub u64);
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct RelType(pub u32);

/// Side of a relationship an adjacency entry was recorded from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    /// The node is the relationship's source.
    Outgoing,
    /// The node is the relationship's target.
    Incoming,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
        }
    }
}

/// One `add_target` call: `target` is appended to `node`'s adjacency list.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EdgeTuple {
    pub node: NodeId,
    pub target: NodeId,
    pub ty: RelType,
    pub direction: Direction,
}

/// A relationship as produced by an edge source. Each one expands into two
/// [`EdgeTuple`]s, one per endpoint.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Relationship {
    pub source: NodeId,
    pub target: NodeId,
    pub ty: RelType,
}

impl Relationship {
    pub fn new(source: NodeId, target: NodeId, ty: RelType) -> Self {
        Self { source, target, ty }
    }

    /// The outgoing tuple for the source followed by the incoming tuple for the target.
    pub fn tuples(&self) -> [EdgeTuple; 2] {
        [
            EdgeTuple {
                node: self.source,
                target: self.target,
                ty: self.ty,
                direction: Direction::Outgoing,
            },
            EdgeTuple {
                node: self.target,
                target: self.source,
                ty: self.ty,
                direction: Direction::Incoming,
            },
        ]
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AdjError {
    #[error("capacity exceeded: {what} (limit {limit}, requested {requested})")]
    CapacityExceeded {
        what: &'static str,
        limit: u64,
        requested: u64,
    },
    #[error("sequencing violation: {0}")]
    SequencingViolation(&'static str),
    #[error("decode inconsistency: {0}")]
    DecodeInconsistency(&'static str),
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, AdjError>;

impl AdjError {
    pub(crate) fn capacity(what: &'static str, limit: u64, requested: u64) -> Self {
        AdjError::CapacityExceeded {
            what,
            limit,
            requested,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for u64 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl From<u32> for RelType {
    fn from(value: u32) -> Self {
        RelType(value)
    }
}

impl From<RelType> for u32 {
    fn from(value: RelType) -> Self {
        value.0
    }
}
