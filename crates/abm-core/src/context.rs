//! Activation Contexts
//!
//! What an agent can reach during its own turn: the registry with the
//! attached space, the model's random stream and the shared model state.

use crate::agent::{Agent, AgentId, SimRng};
use crate::registry::{AgentRegistry, PositionOf, RegistryError};
use crate::space::SpaceError;

/// Mutable access handed to `step`, `advance` and `run_stage`
///
/// The acting agent is checked out of the registry while the context exists,
/// so `agents.get(cx.id())` returns `None`; its own state is `&mut self`.
pub struct Context<'a, A: Agent> {
    id: AgentId,
    step: u64,
    stage: Option<&'a str>,
    pub agents: &'a mut AgentRegistry<A>,
    pub rng: &'a mut SimRng,
    pub shared: &'a mut A::Shared,
}

impl<'a, A: Agent> Context<'a, A> {
    pub(crate) fn new(
        id: AgentId,
        step: u64,
        stage: Option<&'a str>,
        agents: &'a mut AgentRegistry<A>,
        rng: &'a mut SimRng,
        shared: &'a mut A::Shared,
    ) -> Self {
        Self {
            id,
            step,
            stage,
            agents,
            rng,
            shared,
        }
    }

    /// Identity of the acting agent
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Index of the step in progress (0 during the first step)
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Stage being run under staged activation
    pub fn stage(&self) -> Option<&str> {
        self.stage
    }

    pub fn space(&self) -> &A::Space {
        self.agents.space()
    }

    pub fn add_agent(&mut self, agent: A) -> Result<AgentId, RegistryError> {
        self.agents.add(agent)
    }

    pub fn remove_agent(&mut self, id: AgentId) -> Result<(), RegistryError> {
        self.agents.remove(id)
    }

    /// Remove the acting agent; it is dropped once its turn returns.
    pub fn remove_self(&mut self) -> Result<(), RegistryError> {
        self.agents.remove(self.id)
    }

    /// Whether the acting agent has been removed during this turn
    pub fn is_removed(&self) -> bool {
        !self.agents.contains(self.id)
    }

    /// Move the acting agent
    pub fn place(&mut self, position: PositionOf<A>) -> Result<PositionOf<A>, SpaceError> {
        self.agents.place(self.id, position)
    }

    pub fn place_agent(&mut self, id: AgentId, position: PositionOf<A>) -> Result<PositionOf<A>, SpaceError> {
        self.agents.place(id, position)
    }

    /// Position of the acting agent
    pub fn position(&self) -> Option<PositionOf<A>> {
        self.agents.position_of(self.id)
    }
}

/// Read-only access handed to `stage` under simultaneous activation
///
/// Agents can read each other and draw random numbers, but cannot change
/// the registry, the space or the shared state.
pub struct View<'a, A: Agent> {
    id: AgentId,
    step: u64,
    pub agents: &'a AgentRegistry<A>,
    pub rng: &'a mut SimRng,
    pub shared: &'a A::Shared,
}

impl<'a, A: Agent> View<'a, A> {
    pub(crate) fn new(
        id: AgentId,
        step: u64,
        agents: &'a AgentRegistry<A>,
        rng: &'a mut SimRng,
        shared: &'a A::Shared,
    ) -> Self {
        Self {
            id,
            step,
            agents,
            rng,
            shared,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn space(&self) -> &A::Space {
        self.agents.space()
    }

    pub fn position(&self) -> Option<PositionOf<A>> {
        self.agents.position_of(self.id)
    }
}
