//! Agents
//!
//! Identity, declared capabilities, and the activation trait model code implements.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::context::{Context, View};
use crate::registry::RegistryError;
use crate::space::{SpaceError, SpatialIndex};

/// Unique identifier for an agent, assigned by the registry in increasing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl AgentId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent_{:06}", self.0)
    }
}

/// Seeded random number generator owned by the model
///
/// Threaded explicitly to the scheduler and to every agent context; there is
/// no process-wide generator.
#[derive(Debug, Clone)]
pub struct SimRng(pub SmallRng);

impl SimRng {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

/// Which activation methods an agent implements
///
/// Declared once and checked against the model's activation policy when the
/// agent is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    step: bool,
    stage_advance: bool,
    stages: &'static [&'static str],
}

impl Capabilities {
    /// Implements [`Agent::step`]
    pub fn step() -> Self {
        Self {
            step: true,
            ..Self::default()
        }
    }

    /// Implements [`Agent::stage`] and [`Agent::advance`]
    pub fn stage_advance() -> Self {
        Self {
            stage_advance: true,
            ..Self::default()
        }
    }

    /// Implements [`Agent::run_stage`] for the given stage names
    pub fn stages(names: &'static [&'static str]) -> Self {
        Self {
            stages: names,
            ..Self::default()
        }
    }

    pub fn with_step(mut self) -> Self {
        self.step = true;
        self
    }

    pub fn with_stage_advance(mut self) -> Self {
        self.stage_advance = true;
        self
    }

    pub fn with_stages(mut self, names: &'static [&'static str]) -> Self {
        self.stages = names;
        self
    }

    pub fn can_step(&self) -> bool {
        self.step
    }

    pub fn can_stage_advance(&self) -> bool {
        self.stage_advance
    }

    pub fn handles_stage(&self, stage: &str) -> bool {
        self.stages.contains(&stage)
    }
}

/// What an activation policy needs from every agent it activates
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Requirement {
    /// No check; used by registries that are not attached to a scheduler
    #[default]
    Any,
    Step,
    StageAdvance,
    Stages(Vec<String>),
}

impl Requirement {
    /// Checks declared capabilities, describing the first gap found.
    pub fn check(&self, capabilities: &Capabilities) -> Result<(), String> {
        match self {
            Requirement::Any => Ok(()),
            Requirement::Step if capabilities.can_step() => Ok(()),
            Requirement::Step => Err("agent does not implement `step`".to_string()),
            Requirement::StageAdvance if capabilities.can_stage_advance() => Ok(()),
            Requirement::StageAdvance => {
                Err("agent does not implement `stage` and `advance`".to_string())
            }
            Requirement::Stages(stages) => match stages
                .iter()
                .find(|stage| !capabilities.handles_stage(stage))
            {
                Some(missing) => Err(format!("agent does not handle stage `{}`", missing)),
                None => Ok(()),
            },
        }
    }
}

/// Errors raised by agent logic during its activation
///
/// Anything returned from an activation method aborts the current step.
/// Spatial and registry errors convert with `?`, so an action that does not
/// handle them itself fails loudly.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A capability was declared but the method was not implemented
    #[error("agent does not implement `{0}`")]
    Unsupported(&'static str),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Space(#[from] SpaceError),
    /// Unrecoverable condition raised by model logic
    #[error("{0}")]
    Failed(String),
}

impl AgentError {
    pub fn failed(message: impl Into<String>) -> Self {
        AgentError::Failed(message.into())
    }
}

/// Model-specific agent logic
///
/// Implement the methods matching the policy the model runs with and declare
/// them in [`Agent::capabilities`]:
///
/// - sequential and random activation call [`Agent::step`]
/// - simultaneous activation calls [`Agent::stage`] on every agent, then
///   [`Agent::advance`] on the same agents
/// - staged activation calls [`Agent::run_stage`] once per named stage
pub trait Agent: Sized + 'static {
    /// Spatial index the model places these agents in
    type Space: SpatialIndex;
    /// Model-level state shared by all agents (parameters, tallies)
    type Shared;

    fn capabilities(&self) -> Capabilities;

    fn step(&mut self, cx: &mut Context<'_, Self>) -> Result<(), AgentError> {
        let _ = cx;
        Err(AgentError::Unsupported("step"))
    }

    /// Computes the next state without applying it. The view is read-only.
    fn stage(&mut self, view: &mut View<'_, Self>) -> Result<(), AgentError> {
        let _ = view;
        Err(AgentError::Unsupported("stage"))
    }

    /// Commits the state computed by [`Agent::stage`].
    fn advance(&mut self, cx: &mut Context<'_, Self>) -> Result<(), AgentError> {
        let _ = cx;
        Err(AgentError::Unsupported("advance"))
    }

    fn run_stage(&mut self, stage: &str, cx: &mut Context<'_, Self>) -> Result<(), AgentError> {
        let _ = (stage, cx);
        Err(AgentError::Unsupported("run_stage"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_agent_id_display() {
        assert_eq!(AgentId(7).to_string(), "agent_000007");
        assert_eq!(AgentId(7).value(), 7);
        assert!(AgentId(1) < AgentId(2));
    }

    #[test]
    fn test_sim_rng_is_reproducible() {
        let mut a = SimRng::seed_from_u64(42);
        let mut b = SimRng::seed_from_u64(42);

        let xs: Vec<u32> = (0..20).map(|_| a.0.gen()).collect();
        let ys: Vec<u32> = (0..20).map(|_| b.0.gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_requirement_step() {
        assert!(Requirement::Step.check(&Capabilities::step()).is_ok());
        assert!(Requirement::Step.check(&Capabilities::stage_advance()).is_err());
        assert!(Requirement::Any.check(&Capabilities::default()).is_ok());
    }

    #[test]
    fn test_requirement_stages() {
        let requirement = Requirement::Stages(vec!["move".to_string(), "eat".to_string()]);

        assert!(requirement
            .check(&Capabilities::stages(&["move", "eat", "reproduce"]))
            .is_ok());

        let err = requirement.check(&Capabilities::stages(&["move"])).unwrap_err();
        assert!(err.contains("`eat`"));
    }

    #[test]
    fn test_combined_capabilities() {
        let caps = Capabilities::step().with_stage_advance().with_stages(&["a"]);
        assert!(caps.can_step());
        assert!(caps.can_stage_advance());
        assert!(caps.handles_stage("a"));
        assert!(!caps.handles_stage("b"));
    }
}
