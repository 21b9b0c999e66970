//! Model
//!
//! Owns the registry (with its spatial index), the scheduler, the random
//! stream and the shared model state, and exposes the step loop to drivers.

use thiserror::Error;

use abm_snapshot::{generate_snapshot_id, AgentRecord, ModelSnapshot};

use crate::agent::{Agent, AgentError, AgentId, SimRng};
use crate::config::{ConfigError, ModelConfig};
use crate::registry::{AgentRegistry, PositionOf, RegistryError};
use crate::scheduler::{ActivationPolicy, Scheduler};
use crate::space::{SpaceError, SpatialIndex};

/// Errors surfaced by the step loop
#[derive(Debug, Error)]
pub enum ModelError {
    /// An activation method the policy needs is missing, or the policy was switched
    #[error("policy misuse: {0}")]
    PolicyMisuse(String),
    /// An agent action failed; the step did not complete
    #[error("step {step} aborted by {agent}: {source}")]
    StepAborted {
        step: u64,
        agent: AgentId,
        #[source]
        source: AgentError,
    },
    /// A previous step failed and the model refuses to continue
    #[error("model halted after a failed step")]
    Halted,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Space(#[from] SpaceError),
}

/// A running simulation
pub struct Model<A: Agent> {
    agents: AgentRegistry<A>,
    scheduler: Scheduler,
    rng: SimRng,
    seed: u64,
    shared: A::Shared,
    running: bool,
    halted: bool,
}

impl<A: Agent> Model<A> {
    /// Creates a model. Without a seed, one is drawn from entropy and recorded.
    pub fn new(space: A::Space, policy: ActivationPolicy, seed: Option<u64>, shared: A::Shared) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        let mut agents = AgentRegistry::new(space);
        agents.set_requirement(policy.requirement());
        tracing::info!("Model created: policy={}, seed={}", policy.name(), seed);

        Self {
            agents,
            scheduler: Scheduler::new(policy),
            rng: SimRng::seed_from_u64(seed),
            seed,
            shared,
            running: true,
            halted: false,
        }
    }

    /// Creates a model with the seed and policy from `config`.
    ///
    /// The space is built by the caller, e.g. with [`crate::Grid::from_config`].
    pub fn from_config(config: &ModelConfig, space: A::Space, shared: A::Shared) -> Result<Self, ConfigError> {
        let policy = ActivationPolicy::from_config(&config.scheduler)?;
        Ok(Self::new(space, policy, config.seed, shared))
    }

    pub fn add_agent(&mut self, agent: A) -> Result<AgentId, RegistryError> {
        self.agents.add(agent).map_err(|err| {
            if let RegistryError::PolicyMisuse(reason) = &err {
                tracing::error!("Rejected agent for {} policy: {}", self.scheduler.policy().name(), reason);
            }
            err
        })
    }

    pub fn remove_agent(&mut self, id: AgentId) -> Result<(), RegistryError> {
        self.agents.remove(id)
    }

    pub fn place_agent(&mut self, id: AgentId, position: PositionOf<A>) -> Result<PositionOf<A>, SpaceError> {
        self.agents.place(id, position)
    }

    /// Advance the model by one step
    ///
    /// A failed step leaves the step count unchanged; every later call
    /// returns [`ModelError::Halted`].
    pub fn step(&mut self) -> Result<(), ModelError> {
        if self.halted {
            return Err(ModelError::Halted);
        }
        match self
            .scheduler
            .step(&mut self.agents, &mut self.rng, &mut self.shared)
        {
            Ok(()) => {
                tracing::debug!(
                    "Step {} complete: {} agents",
                    self.scheduler.steps(),
                    self.agents.count()
                );
                Ok(())
            }
            Err(err) => {
                self.halted = true;
                tracing::error!("Step {} failed: {}", self.scheduler.steps(), err);
                Err(err)
            }
        }
    }

    /// Run up to `max_steps` steps, stopping early once `running` is cleared.
    ///
    /// Returns the number of steps executed.
    pub fn run(&mut self, max_steps: u64) -> Result<u64, ModelError> {
        let mut executed = 0;
        while executed < max_steps && self.running {
            self.step()?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Step while the predicate holds and the model is running
    pub fn run_while<F>(&mut self, mut predicate: F) -> Result<u64, ModelError>
    where
        F: FnMut(&Self) -> bool,
    {
        let mut executed = 0;
        while self.running && predicate(self) {
            self.step()?;
            executed += 1;
        }
        Ok(executed)
    }

    pub fn step_count(&self) -> u64 {
        self.scheduler.steps()
    }

    pub fn time(&self) -> f64 {
        self.scheduler.time()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn policy(&self) -> &ActivationPolicy {
        self.scheduler.policy()
    }

    /// Fails unless `policy` is the one the model was built with
    pub fn set_policy(&mut self, policy: ActivationPolicy) -> Result<(), ModelError> {
        self.scheduler.set_policy(policy)
    }

    /// Restart the random stream from `seed`, or from the current seed when none is given
    pub fn reset_randomizer(&mut self, seed: Option<u64>) {
        self.seed = seed.unwrap_or(self.seed);
        self.rng = SimRng::seed_from_u64(self.seed);
        tracing::info!("Random stream reseeded: seed={}", self.seed);
    }

    pub fn rng_mut(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Registry, random stream and shared state at once, for model setup
    pub fn split_mut(&mut self) -> (&mut AgentRegistry<A>, &mut SimRng, &mut A::Shared) {
        (&mut self.agents, &mut self.rng, &mut self.shared)
    }

    pub fn agents(&self) -> &AgentRegistry<A> {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut AgentRegistry<A> {
        &mut self.agents
    }

    pub fn space(&self) -> &A::Space {
        self.agents.space()
    }

    pub fn shared(&self) -> &A::Shared {
        &self.shared
    }

    pub fn shared_mut(&mut self) -> &mut A::Shared {
        &mut self.shared
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Cleared by model code to end [`Model::run`] and [`Model::run_while`]
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Capture registry and space state; only meaningful between steps
    pub fn snapshot(&self) -> ModelSnapshot {
        let mut snapshot = ModelSnapshot::new(
            generate_snapshot_id(self.step_count()),
            self.step_count(),
            self.seed,
            self.policy().name(),
        );
        snapshot.time = self.time();
        snapshot.running = self.running;
        snapshot.space = self.agents.space().summary();
        snapshot.agents = self
            .agents
            .all_identities()
            .into_iter()
            .map(|id| {
                let position = self
                    .agents
                    .position_of(id)
                    .and_then(|p| <A::Space as SpatialIndex>::record(&p));
                AgentRecord::new(id.value(), position)
            })
            .collect();
        snapshot
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        self.snapshot().to_json_pretty()
    }
}
