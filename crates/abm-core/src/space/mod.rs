//! Spatial Indices
//!
//! Structures mapping positions to occupant agents and answering neighbor
//! queries: a discrete grid, a continuous plane, and a network graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use abm_snapshot::{PositionRecord, SpaceSummary};

use crate::agent::AgentId;

pub mod continuous;
pub mod grid;
pub mod network;
pub mod selection;

pub use continuous::{ContinuousSpace, Point};
pub use grid::{Coord, Grid};
pub use network::{Network, NodeId};
pub use selection::{AtMost, Selection};

/// Errors raised by placement and space construction
///
/// Placement errors are local: they are returned to the calling agent action,
/// which may react to them. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpaceError {
    #[error("position {0} is out of bounds")]
    OutOfBounds(String),
    #[error("cell {position} is full (capacity {capacity})")]
    CellOccupied { position: String, capacity: usize },
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("invalid coordinate {0}")]
    InvalidCoordinate(String),
    #[error("invalid space dimensions: {0}")]
    InvalidDimensions(String),
    /// Placement of an identity that is not live in the registry
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),
    /// A random draw over cells that cannot be satisfied
    #[error("invalid sample: {0}")]
    InvalidSample(String),
    #[error("model has no spatial index")]
    NoSpace,
}

/// Neighborhood shape for grid queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// All cells within Chebyshev distance `radius` (8 neighbors at radius 1)
    #[default]
    Moore,
    /// All cells within Manhattan distance `radius` (4 neighbors at radius 1)
    VonNeumann,
}

impl Neighborhood {
    /// Whether the offset lies inside the neighborhood of the given radius.
    pub fn contains(&self, dx: i64, dy: i64, radius: i64) -> bool {
        match self {
            Neighborhood::Moore => dx.abs().max(dy.abs()) <= radius,
            Neighborhood::VonNeumann => dx.abs() + dy.abs() <= radius,
        }
    }
}

impl fmt::Display for Neighborhood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Neighborhood::Moore => write!(f, "moore"),
            Neighborhood::VonNeumann => write!(f, "von_neumann"),
        }
    }
}

/// Common behaviour of the spatial indices
///
/// Neighbor queries differ per space and live on the concrete types.
pub trait SpatialIndex {
    type Position: Copy + PartialEq + fmt::Debug;

    /// Place an agent, moving it out of any prior position.
    ///
    /// Returns the position actually stored (wrapped on toroidal spaces).
    fn place(&mut self, id: AgentId, position: Self::Position) -> Result<Self::Position, SpaceError>;

    /// Remove an agent, returning its former position; no-op if absent.
    fn remove(&mut self, id: AgentId) -> Option<Self::Position>;

    fn position_of(&self, id: AgentId) -> Option<Self::Position>;

    /// Number of placed agents
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape description for snapshots
    fn summary(&self) -> SpaceSummary;

    /// Snapshot form of a position
    fn record(position: &Self::Position) -> Option<PositionRecord>;
}

/// Placeholder index for models without space
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpace;

impl SpatialIndex for NoSpace {
    type Position = ();

    fn place(&mut self, _id: AgentId, _position: ()) -> Result<(), SpaceError> {
        Err(SpaceError::NoSpace)
    }

    fn remove(&mut self, _id: AgentId) -> Option<()> {
        None
    }

    fn position_of(&self, _id: AgentId) -> Option<()> {
        None
    }

    fn len(&self) -> usize {
        0
    }

    fn summary(&self) -> SpaceSummary {
        SpaceSummary::default()
    }

    fn record(_position: &()) -> Option<PositionRecord> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighborhood_contains() {
        assert!(Neighborhood::Moore.contains(1, 1, 1));
        assert!(!Neighborhood::VonNeumann.contains(1, 1, 1));
        assert!(Neighborhood::VonNeumann.contains(-2, 0, 2));
        assert!(!Neighborhood::Moore.contains(0, 3, 2));
    }

    #[test]
    fn test_neighborhood_serialization() {
        assert_eq!(
            serde_json::to_string(&Neighborhood::VonNeumann).unwrap(),
            r#""von_neumann""#
        );
        assert_eq!(Neighborhood::default(), Neighborhood::Moore);
    }

    #[test]
    fn test_no_space_rejects_placement() {
        let mut space = NoSpace;
        assert_eq!(space.place(AgentId(1), ()), Err(SpaceError::NoSpace));
        assert_eq!(space.remove(AgentId(1)), None);
        assert!(space.is_empty());
    }
}
