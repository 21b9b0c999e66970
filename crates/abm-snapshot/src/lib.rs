//! Shared snapshot types for the agent-based simulation engine.
//!
//! This crate contains pure data structures with no simulation logic.
//! Drivers that render or export model state between steps depend on it
//! instead of on the engine itself.

pub mod snapshot;

pub use snapshot::{
    generate_snapshot_id, AgentRecord, ModelSnapshot, PositionRecord, SpaceKind, SpaceSummary,
};
