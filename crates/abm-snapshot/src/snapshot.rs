//! Snapshot Types
//!
//! Serialization structs for model snapshots.
//!
//! A snapshot captures registry and spatial index state at a step boundary.
//! It is only ever taken between steps, never during one.

use serde::{Deserialize, Serialize};

/// Generates a snapshot ID with the given sequence number.
pub fn generate_snapshot_id(sequence: u64) -> String {
    format!("snap_{:06}", sequence)
}

/// Where an agent sits in the model's spatial index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionRecord {
    /// A discrete grid cell
    Cell { x: usize, y: usize },
    /// A point in continuous space
    Point { x: f64, y: f64 },
    /// A node of a network space
    Node { node: usize },
}

/// Which spatial index the model carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    #[default]
    None,
    Grid,
    Continuous,
    Network,
}

/// Shape of the spatial index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceSummary {
    pub kind: SpaceKind,
    /// Grid width, or continuous x extent (absent when unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Grid height, or continuous y extent (absent when unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Node count for network spaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<usize>,
    #[serde(default)]
    pub torus: bool,
}

/// One live agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionRecord>,
}

impl AgentRecord {
    pub fn new(agent_id: u64, position: Option<PositionRecord>) -> Self {
        Self { agent_id, position }
    }
}

/// Complete model snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub snapshot_id: String,
    /// Completed steps at the time of the snapshot
    pub step: u64,
    /// Scheduler clock (fractional for staged policies between stages)
    pub time: f64,
    pub seed: u64,
    /// Name of the activation policy
    pub policy: String,
    pub running: bool,
    #[serde(default)]
    pub space: SpaceSummary,
    /// Live agents in registry insertion order
    #[serde(default)]
    pub agents: Vec<AgentRecord>,
}

impl ModelSnapshot {
    /// Creates an empty snapshot.
    pub fn new(snapshot_id: impl Into<String>, step: u64, seed: u64, policy: impl Into<String>) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            step,
            time: step as f64,
            seed,
            policy: policy.into(),
            running: true,
            space: SpaceSummary::default(),
            agents: Vec::new(),
        }
    }

    /// Number of live agents.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Finds an agent by ID.
    pub fn find_agent(&self, agent_id: u64) -> Option<&AgentRecord> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    /// Returns the agents recorded at a position.
    pub fn agents_at(&self, position: &PositionRecord) -> Vec<&AgentRecord> {
        self.agents
            .iter()
            .filter(|a| a.position.as_ref() == Some(position))
            .collect()
    }

    /// Agents that are not placed in the spatial index.
    pub fn unplaced(&self) -> impl Iterator<Item = &AgentRecord> {
        self.agents.iter().filter(|a| a.position.is_none())
    }

    /// Serializes the snapshot to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serializes the snapshot to compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
