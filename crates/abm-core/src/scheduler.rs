//! Scheduler
//!
//! Decides in what order agents act within a step. Every pass works on a
//! snapshot of identities taken when the pass starts and resolves each one
//! when its turn comes, so agents may add and remove agents freely while the
//! pass is running.

use indexmap::IndexSet;
use rand::seq::SliceRandom;

use crate::agent::{Agent, AgentError, AgentId, Requirement, SimRng};
use crate::config::{ConfigError, PolicyKind, SchedulerConfig};
use crate::context::{Context, View};
use crate::model::ModelError;
use crate::registry::{AgentRegistry, Pass};

/// Options for staged activation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StagedOptions {
    /// Stage names, run in order every step
    pub stages: Vec<String>,
    /// Shuffle the order at the start of each step
    pub shuffle: bool,
    /// Reshuffle the order before every stage after the first
    pub shuffle_between_stages: bool,
}

impl StagedOptions {
    pub fn new<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stages: stages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_shuffle_between_stages(mut self, shuffle: bool) -> Self {
        self.shuffle_between_stages = shuffle;
        self
    }
}

/// How agents are activated within a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationPolicy {
    /// Registry insertion order
    Sequential,
    /// Uniform shuffle of the current identities each step
    Random,
    /// `stage` on every agent, then `advance` on the same agents
    Simultaneous,
    /// Named stages in order, each a pass over the current identities
    Staged(StagedOptions),
}

impl ActivationPolicy {
    /// Staged activation without shuffling
    pub fn staged<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ActivationPolicy::Staged(StagedOptions::new(stages))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationPolicy::Sequential => "sequential",
            ActivationPolicy::Random => "random",
            ActivationPolicy::Simultaneous => "simultaneous",
            ActivationPolicy::Staged(_) => "staged",
        }
    }

    /// Capabilities every registered agent must declare
    pub fn requirement(&self) -> Requirement {
        match self {
            ActivationPolicy::Sequential | ActivationPolicy::Random => Requirement::Step,
            ActivationPolicy::Simultaneous => Requirement::StageAdvance,
            ActivationPolicy::Staged(options) => Requirement::Stages(options.stages.clone()),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self, ConfigError> {
        Ok(match config.policy {
            PolicyKind::Sequential => ActivationPolicy::Sequential,
            PolicyKind::Random => ActivationPolicy::Random,
            PolicyKind::Simultaneous => ActivationPolicy::Simultaneous,
            PolicyKind::Staged => {
                if config.stages.is_empty() {
                    return Err(ConfigError::Invalid(
                        "staged policy needs at least one stage".to_string(),
                    ));
                }
                ActivationPolicy::Staged(
                    StagedOptions::new(config.stages.iter().cloned())
                        .with_shuffle(config.shuffle)
                        .with_shuffle_between_stages(config.shuffle_between_stages),
                )
            }
        })
    }
}

/// Step counter and activation driver
#[derive(Debug, Clone)]
pub struct Scheduler {
    policy: ActivationPolicy,
    steps: u64,
    time: f64,
}

impl Scheduler {
    pub fn new(policy: ActivationPolicy) -> Self {
        Self {
            policy,
            steps: 0,
            time: 0.0,
        }
    }

    pub fn policy(&self) -> &ActivationPolicy {
        &self.policy
    }

    /// Completed steps
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Fractional clock; advances by one stage fraction under staged activation.
    ///
    /// An aborted step rewinds it to where the step began.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The policy is fixed for the run; only re-selecting the current one succeeds.
    pub fn set_policy(&mut self, policy: ActivationPolicy) -> Result<(), ModelError> {
        if policy == self.policy {
            return Ok(());
        }
        let message = format!(
            "cannot switch activation policy from {} to {} during a run",
            self.policy.name(),
            policy.name()
        );
        tracing::error!("{}", message);
        Err(ModelError::PolicyMisuse(message))
    }

    /// Run one step under the configured policy
    ///
    /// The step counter only moves once every pass has completed.
    pub fn step<A: Agent>(
        &mut self,
        agents: &mut AgentRegistry<A>,
        rng: &mut SimRng,
        shared: &mut A::Shared,
    ) -> Result<(), ModelError> {
        let started_at = self.time;
        if let Err(err) = self.run_passes(agents, rng, shared) {
            self.time = started_at;
            return Err(err);
        }
        self.steps += 1;
        self.time = self.steps as f64;
        Ok(())
    }

    fn run_passes<A: Agent>(
        &mut self,
        agents: &mut AgentRegistry<A>,
        rng: &mut SimRng,
        shared: &mut A::Shared,
    ) -> Result<(), ModelError> {
        let step = self.steps;
        match &self.policy {
            ActivationPolicy::Sequential | ActivationPolicy::Random => {
                let mut order = agents.all_identities();
                if self.policy == ActivationPolicy::Random {
                    order.shuffle(&mut rng.0);
                }
                let mut pass = Pass::new(order);
                while let Some(id) = pass.next_live(agents) {
                    activate(agents, rng, shared, id, step, None, |agent, cx| agent.step(cx))?;
                }
            }
            ActivationPolicy::Simultaneous => {
                let order = agents.all_identities();
                let mut pass = Pass::new(order.iter().copied());
                while let Some(id) = pass.next_live(agents) {
                    stage(agents, rng, shared, id, step)?;
                }
                let mut pass = Pass::new(order);
                while let Some(id) = pass.next_live(agents) {
                    activate(agents, rng, shared, id, step, None, |agent, cx| agent.advance(cx))?;
                }
            }
            ActivationPolicy::Staged(options) => {
                let fraction = 1.0 / options.stages.len().max(1) as f64;
                let mut order = agents.all_identities();
                if options.shuffle {
                    order.shuffle(&mut rng.0);
                }
                for (index, name) in options.stages.iter().enumerate() {
                    if index > 0 {
                        // Survivors keep their order; agents added since join at the end.
                        let mut next: IndexSet<AgentId> =
                            order.into_iter().filter(|id| agents.contains(*id)).collect();
                        next.extend(agents.all_identities());
                        order = next.into_iter().collect();
                        if options.shuffle_between_stages {
                            order.shuffle(&mut rng.0);
                        }
                    }
                    let mut pass = Pass::new(order.iter().copied());
                    while let Some(id) = pass.next_live(agents) {
                        activate(agents, rng, shared, id, step, Some(name.as_str()), |agent, cx| {
                            agent.run_stage(name, cx)
                        })?;
                    }
                    self.time += fraction;
                }
            }
        }
        Ok(())
    }
}

/// Check the agent out, run one activation method, and check it back in
fn activate<A, F>(
    agents: &mut AgentRegistry<A>,
    rng: &mut SimRng,
    shared: &mut A::Shared,
    id: AgentId,
    step: u64,
    stage: Option<&str>,
    call: F,
) -> Result<(), ModelError>
where
    A: Agent,
    F: FnOnce(&mut A, &mut Context<'_, A>) -> Result<(), AgentError>,
{
    let Some(mut agent) = agents.checkout(id) else {
        return Ok(());
    };
    let result = {
        let mut cx = Context::new(id, step, stage, agents, rng, shared);
        call(&mut agent, &mut cx)
    };
    agents.checkin(id, agent);
    tracing::trace!(agent = %id, step, stage = stage.unwrap_or("-"), "activated agent");
    result.map_err(|err| activation_error(step, id, err))
}

/// Simultaneous phase one: read-only staging
fn stage<A: Agent>(
    agents: &mut AgentRegistry<A>,
    rng: &mut SimRng,
    shared: &A::Shared,
    id: AgentId,
    step: u64,
) -> Result<(), ModelError> {
    let Some(mut agent) = agents.checkout(id) else {
        return Ok(());
    };
    let result = {
        let mut view = View::new(id, step, agents, rng, shared);
        agent.stage(&mut view)
    };
    agents.checkin(id, agent);
    tracing::trace!(agent = %id, step, "staged agent");
    result.map_err(|err| activation_error(step, id, err))
}

fn activation_error(step: u64, agent: AgentId, err: AgentError) -> ModelError {
    match err {
        AgentError::Unsupported(method) => ModelError::PolicyMisuse(format!(
            "{} was activated with `{}`, which it does not implement",
            agent, method
        )),
        source => ModelError::StepAborted {
            step,
            agent,
            source,
        },
    }
}
