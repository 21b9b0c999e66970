//! Agent-Based Simulation Engine
//!
//! Advances a population of stateful agents through discrete steps. The
//! engine decides in what order agents act within a step and lets them find
//! each other through a spatial index; what agents actually do is supplied by
//! model code through the [`Agent`] trait.

pub mod agent;
pub mod config;
pub mod context;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod space;

pub use agent::{Agent, AgentError, AgentId, Capabilities, Requirement, SimRng};
pub use config::{ConfigError, ContinuousConfig, GridConfig, ModelConfig, PolicyKind, SchedulerConfig};
pub use context::{Context, View};
pub use model::{Model, ModelError};
pub use registry::{AgentRegistry, Pass, RegistryError};
pub use scheduler::{ActivationPolicy, Scheduler, StagedOptions};
pub use space::{
    AtMost, ContinuousSpace, Coord, Grid, Neighborhood, Network, NoSpace, NodeId, Point, Selection,
    SpaceError, SpatialIndex,
};

pub use abm_snapshot::{AgentRecord, ModelSnapshot, PositionRecord, SpaceKind, SpaceSummary};
