//! Agent Registry
//!
//! Canonical, insertion-ordered set of live agents keyed by identity. The
//! registry also owns the model's spatial index so that removing an agent
//! vacates its position in the same call.

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::agent::{Agent, AgentId, Requirement};
use crate::space::{SpaceError, SpatialIndex};

/// Position type of the index attached to agents of type `A`
pub type PositionOf<A> = <<A as Agent>::Space as SpatialIndex>::Position;

/// Errors raised by registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Identity is not (or no longer) registered; callers may treat this as benign
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),
    /// Agent capabilities do not match the activation policy
    #[error("policy misuse: {0}")]
    PolicyMisuse(String),
    #[error("agent identity space exhausted")]
    IdentitySpaceExhausted,
}

/// Registry of live agents
///
/// Each slot holds `None` while its agent is being activated; the agent is
/// checked out for the duration of its own turn and checked back in
/// afterwards, unless it was removed in the meantime.
pub struct AgentRegistry<A: Agent> {
    slots: IndexMap<AgentId, Option<A>>,
    next_id: u64,
    requirement: Requirement,
    space: A::Space,
}

impl<A: Agent> AgentRegistry<A> {
    pub fn new(space: A::Space) -> Self {
        Self {
            slots: IndexMap::new(),
            next_id: 1,
            requirement: Requirement::Any,
            space,
        }
    }

    pub(crate) fn set_requirement(&mut self, requirement: Requirement) {
        self.requirement = requirement;
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Register an agent under the next unused identity
    pub fn add(&mut self, agent: A) -> Result<AgentId, RegistryError> {
        self.requirement
            .check(&agent.capabilities())
            .map_err(RegistryError::PolicyMisuse)?;

        let id = AgentId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(RegistryError::IdentitySpaceExhausted)?;
        self.slots.insert(id, Some(agent));
        tracing::trace!(agent = %id, "registered agent");
        Ok(id)
    }

    /// Remove an agent and vacate its spatial position
    ///
    /// Safe to call for the agent that is currently being activated, including
    /// from its own turn; it will not be checked back in.
    ///
    /// Keeping insertion order costs O(n) per removal. Drop many agents at
    /// once with [`AgentRegistry::remove_all`], which is O(n) overall.
    pub fn remove(&mut self, id: AgentId) -> Result<(), RegistryError> {
        if self.slots.shift_remove(&id).is_none() {
            tracing::debug!(agent = %id, "removal of unknown agent ignored");
            return Err(RegistryError::UnknownAgent(id));
        }
        self.space.remove(id);
        tracing::trace!(agent = %id, "removed agent");
        Ok(())
    }

    /// Remove every listed agent in one pass over the registry
    ///
    /// Unknown identities are ignored. Returns how many agents were removed.
    pub fn remove_all<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = AgentId>,
    {
        let doomed: IndexSet<AgentId> = ids
            .into_iter()
            .filter(|id| self.slots.contains_key(id))
            .collect();
        if doomed.is_empty() {
            return 0;
        }
        self.slots.retain(|id, _| !doomed.contains(id));
        for &id in &doomed {
            self.space.remove(id);
        }
        tracing::trace!("removed {} agents", doomed.len());
        doomed.len()
    }

    /// Identity the next call to [`AgentRegistry::add`] will assign
    pub fn next_id(&self) -> AgentId {
        AgentId(self.next_id)
    }

    /// Whether the agent is live (including the agent currently acting)
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Get an agent; `None` for unknown agents and for the agent currently acting
    pub fn get(&self, id: AgentId) -> Option<&A> {
        self.slots.get(&id).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut A> {
        self.slots.get_mut(&id).and_then(|slot| slot.as_mut())
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All live identities in insertion order
    pub fn all_identities(&self) -> Vec<AgentId> {
        self.slots.keys().copied().collect()
    }

    /// Iterate live agents in insertion order, skipping the one currently acting
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &A)> {
        self.slots
            .iter()
            .filter_map(|(id, slot)| slot.as_ref().map(|agent| (*id, agent)))
    }

    /// Resolve identities in the given order, skipping those no longer live
    pub fn iterate<I>(&self, order: I) -> impl Iterator<Item = (AgentId, &A)>
    where
        I: IntoIterator<Item = AgentId>,
    {
        order
            .into_iter()
            .filter_map(move |id| self.get(id).map(|agent| (id, agent)))
    }

    /// Capture an activation pass over the given order
    pub fn pass<I>(&self, order: I) -> Pass
    where
        I: IntoIterator<Item = AgentId>,
    {
        Pass::new(order)
    }

    pub(crate) fn checkout(&mut self, id: AgentId) -> Option<A> {
        self.slots.get_mut(&id).and_then(|slot| slot.take())
    }

    pub(crate) fn checkin(&mut self, id: AgentId, agent: A) {
        match self.slots.get_mut(&id) {
            Some(slot) => *slot = Some(agent),
            None => tracing::trace!(agent = %id, "agent removed during its own turn"),
        }
    }

    pub fn space(&self) -> &A::Space {
        &self.space
    }

    /// Place a live agent in the spatial index
    pub fn place(&mut self, id: AgentId, position: PositionOf<A>) -> Result<PositionOf<A>, SpaceError> {
        if !self.contains(id) {
            return Err(SpaceError::UnknownAgent(id));
        }
        self.space.place(id, position)
    }

    /// Take an agent out of the spatial index without unregistering it
    pub fn vacate(&mut self, id: AgentId) -> Option<PositionOf<A>> {
        self.space.remove(id)
    }

    pub fn position_of(&self, id: AgentId) -> Option<PositionOf<A>> {
        self.space.position_of(id)
    }
}

/// Activation pass over a snapshot of identities
///
/// The order is fixed when the pass is created; each identity is resolved
/// against the registry when its turn comes, so agents removed before their
/// turn are skipped and agents added after the snapshot are never visited.
#[derive(Debug, Clone, Default)]
pub struct Pass {
    order: Vec<AgentId>,
    cursor: usize,
}

impl Pass {
    pub fn new<I>(order: I) -> Self
    where
        I: IntoIterator<Item = AgentId>,
    {
        let order: IndexSet<AgentId> = order.into_iter().collect();
        Self {
            order: order.into_iter().collect(),
            cursor: 0,
        }
    }

    /// Number of identities captured
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[AgentId] {
        &self.order
    }

    /// Advance to the next identity that is still live
    pub fn next_live<A: Agent>(&mut self, agents: &AgentRegistry<A>) -> Option<AgentId> {
        while let Some(&id) = self.order.get(self.cursor) {
            self.cursor += 1;
            if agents.contains(id) {
                return Some(id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Capabilities;
    use crate::space::Grid;

    struct Dot(u32);

    impl Agent for Dot {
        type Space = Grid;
        type Shared = ();

        fn capabilities(&self) -> Capabilities {
            Capabilities::step()
        }
    }

    fn registry() -> AgentRegistry<Dot> {
        AgentRegistry::new(Grid::new(5, 5, false))
    }

    #[test]
    fn test_identities_are_monotonic() {
        let mut agents = registry();
        assert_eq!(agents.next_id(), AgentId(1));

        let a = agents.add(Dot(0)).unwrap();
        let b = agents.add(Dot(1)).unwrap();
        agents.remove(a).unwrap();
        let c = agents.add(Dot(2)).unwrap();

        assert_eq!(a, AgentId(1));
        assert_eq!(b, AgentId(2));
        assert_eq!(c, AgentId(3));
        assert_eq!(agents.all_identities(), vec![b, c]);
        assert_eq!(agents.count(), 2);
    }

    #[test]
    fn test_double_removal_reports_unknown_agent() {
        let mut agents = registry();
        let a = agents.add(Dot(0)).unwrap();

        assert!(agents.remove(a).is_ok());
        assert_eq!(agents.remove(a), Err(RegistryError::UnknownAgent(a)));
        assert!(agents.is_empty());
    }

    #[test]
    fn test_remove_vacates_space() {
        let mut agents = registry();
        let a = agents.add(Dot(0)).unwrap();
        agents.place(a, (2, 3)).unwrap();
        assert_eq!(agents.position_of(a), Some((2, 3)));

        agents.remove(a).unwrap();
        assert_eq!(agents.position_of(a), None);
        assert!(agents.space().is_cell_empty((2, 3)));
    }

    #[test]
    fn test_remove_all_keeps_survivor_order() {
        let mut agents = registry();
        let ids: Vec<_> = (0..10).map(|i| agents.add(Dot(i)).unwrap()).collect();
        for (i, &id) in ids.iter().enumerate() {
            agents.place(id, ((i % 5) as i64, (i / 5) as i64)).unwrap();
        }

        let doomed = [ids[0], ids[3], ids[3], ids[8], AgentId(99)];
        assert_eq!(agents.remove_all(doomed), 3);

        assert_eq!(
            agents.all_identities(),
            vec![ids[1], ids[2], ids[4], ids[5], ids[6], ids[7], ids[9]]
        );
        assert_eq!(agents.space().len(), 7);
        assert_eq!(agents.position_of(ids[3]), None);
        assert!(agents.space().is_cell_empty((3, 0)));
        assert_eq!(agents.remove_all([ids[0]]), 0);
    }

    #[test]
    fn test_place_rejects_unregistered_agent() {
        let mut agents = registry();
        let err = agents.place(AgentId(99), (0, 0)).unwrap_err();
        assert_eq!(err, SpaceError::UnknownAgent(AgentId(99)));
        assert_eq!(agents.space().len(), 0);
    }

    #[test]
    fn test_requirement_checked_on_add() {
        let mut agents = registry();
        agents.set_requirement(Requirement::StageAdvance);

        let err = agents.add(Dot(0)).unwrap_err();
        assert!(matches!(err, RegistryError::PolicyMisuse(_)));
        assert_eq!(agents.count(), 0);
        assert_eq!(agents.next_id(), AgentId(1));
    }

    #[test]
    fn test_pass_skips_removed_and_ignores_added() {
        let mut agents = registry();
        let ids: Vec<_> = (0..4).map(|i| agents.add(Dot(i)).unwrap()).collect();

        let mut pass = agents.pass(agents.all_identities());
        assert_eq!(pass.next_live(&agents), Some(ids[0]));

        agents.remove(ids[1]).unwrap();
        agents.add(Dot(9)).unwrap();

        assert_eq!(pass.next_live(&agents), Some(ids[2]));
        assert_eq!(pass.next_live(&agents), Some(ids[3]));
        assert_eq!(pass.next_live(&agents), None);
    }

    #[test]
    fn test_pass_deduplicates_order() {
        let pass = Pass::new(vec![AgentId(2), AgentId(1), AgentId(2)]);
        assert_eq!(pass.order(), &[AgentId(2), AgentId(1)]);
        assert_eq!(pass.len(), 2);
    }

    #[test]
    fn test_checkout_hides_agent_until_checkin() {
        let mut agents = registry();
        let a = agents.add(Dot(5)).unwrap();

        let dot = agents.checkout(a).unwrap();
        assert!(agents.contains(a));
        assert!(agents.get(a).is_none());
        assert_eq!(agents.iter().count(), 0);

        agents.checkin(a, dot);
        assert_eq!(agents.get(a).map(|d| d.0), Some(5));
    }

    #[test]
    fn test_agent_removed_while_checked_out_is_dropped() {
        let mut agents = registry();
        let a = agents.add(Dot(0)).unwrap();
        let b = agents.add(Dot(1)).unwrap();

        let dot = agents.checkout(a).unwrap();
        agents.remove(a).unwrap();
        agents.checkin(a, dot);

        assert!(!agents.contains(a));
        assert_eq!(agents.all_identities(), vec![b]);
    }

    #[test]
    fn test_iterate_resolves_in_given_order() {
        let mut agents = registry();
        let a = agents.add(Dot(10)).unwrap();
        let b = agents.add(Dot(20)).unwrap();
        let c = agents.add(Dot(30)).unwrap();
        agents.remove(b).unwrap();

        let values: Vec<u32> = agents.iterate(vec![c, b, a]).map(|(_, d)| d.0).collect();
        assert_eq!(values, vec![30, 10]);
    }
}
