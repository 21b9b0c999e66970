//! Network Space
//!
//! Agents sit on the nodes of an undirected graph built up front.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, VecDeque};

use abm_snapshot::{PositionRecord, SpaceKind, SpaceSummary};

use super::{Selection, SpaceError, SpatialIndex};
use crate::agent::AgentId;

/// Index of a node in a [`Network`]
pub type NodeId = usize;

/// Undirected graph with agents placed on nodes
#[derive(Debug, Clone, Default)]
pub struct Network {
    adjacency: Vec<Vec<NodeId>>,
    occupants: Vec<Vec<AgentId>>,
    positions: HashMap<AgentId, NodeId>,
    edge_count: usize,
}

impl Network {
    /// Graph of `nodes` isolated nodes
    pub fn new(nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); nodes],
            occupants: vec![Vec::new(); nodes],
            positions: HashMap::new(),
            edge_count: 0,
        }
    }

    pub fn from_edges<I>(nodes: usize, edges: I) -> Result<Self, SpaceError>
    where
        I: IntoIterator<Item = (NodeId, NodeId)>,
    {
        let mut network = Self::new(nodes);
        for (a, b) in edges {
            network.add_edge(a, b)?;
        }
        Ok(network)
    }

    /// Connect two nodes. Self-loops and repeated edges are ignored.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<(), SpaceError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b || self.adjacency[a].contains(&b) {
            return Ok(());
        }
        self.adjacency[a].push(b);
        self.adjacency[b].push(a);
        self.edge_count += 1;
        Ok(())
    }

    fn check_node(&self, node: NodeId) -> Result<(), SpaceError> {
        if node < self.adjacency.len() {
            Ok(())
        } else {
            Err(SpaceError::UnknownNode(node))
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Directly connected nodes, in edge insertion order
    pub fn adjacent(&self, node: NodeId) -> &[NodeId] {
        self.adjacency.get(node).map_or(&[], |nodes| nodes.as_slice())
    }

    /// Nodes within `radius` hops of `node`, nearest first
    pub fn neighbor_nodes(&self, node: NodeId, radius: usize, include_center: bool) -> Vec<NodeId> {
        if node >= self.node_count() {
            return Vec::new();
        }
        let mut seen = vec![false; self.node_count()];
        let mut queue = VecDeque::from([(node, 0usize)]);
        let mut found = Vec::new();
        seen[node] = true;

        while let Some((current, depth)) = queue.pop_front() {
            if current != node || include_center {
                found.push(current);
            }
            if depth == radius {
                continue;
            }
            for &next in &self.adjacency[current] {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back((next, depth + 1));
                }
            }
        }
        found
    }

    /// Agents on the nodes within `radius` hops of `node`
    pub fn neighbors(&self, node: NodeId, radius: usize, include_center: bool) -> Vec<AgentId> {
        self.neighbor_nodes(node, radius, include_center)
            .into_iter()
            .flat_map(|n| self.occupants[n].iter().copied())
            .collect()
    }

    pub fn agents_at(&self, node: NodeId) -> &[AgentId] {
        self.occupants.get(node).map_or(&[], |agents| agents.as_slice())
    }

    pub fn is_node_empty(&self, node: NodeId) -> bool {
        self.agents_at(node).is_empty()
    }

    pub fn empty_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.node_count()).filter(|&n| self.occupants[n].is_empty())
    }

    pub fn random_empty_node<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<NodeId> {
        let empties: Vec<NodeId> = self.empty_nodes().collect();
        empties.choose(rng).copied()
    }

    /// Every node with its occupants, by node index
    pub fn all_nodes(&self) -> Selection<'_, NodeId> {
        Selection::new(
            self.occupants
                .iter()
                .enumerate()
                .map(|(node, agents)| (node, agents.as_slice()))
                .collect(),
        )
    }

    /// Nodes within `radius` hops of `node` with their occupants, nearest first
    pub fn neighborhood_selection(&self, node: NodeId, radius: usize, include_center: bool) -> Selection<'_, NodeId> {
        Selection::new(
            self.neighbor_nodes(node, radius, include_center)
                .into_iter()
                .map(|n| (n, self.occupants[n].as_slice()))
                .collect(),
        )
    }
}

impl SpatialIndex for Network {
    type Position = NodeId;

    fn place(&mut self, id: AgentId, node: NodeId) -> Result<NodeId, SpaceError> {
        self.check_node(node)?;
        if let Some(previous) = self.positions.insert(id, node) {
            if previous == node {
                return Ok(node);
            }
            self.occupants[previous].retain(|occupant| *occupant != id);
        }
        self.occupants[node].push(id);
        Ok(node)
    }

    fn remove(&mut self, id: AgentId) -> Option<NodeId> {
        let node = self.positions.remove(&id)?;
        self.occupants[node].retain(|occupant| *occupant != id);
        Some(node)
    }

    fn position_of(&self, id: AgentId) -> Option<NodeId> {
        self.positions.get(&id).copied()
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn summary(&self) -> SpaceSummary {
        SpaceSummary {
            kind: SpaceKind::Network,
            width: None,
            height: None,
            nodes: Some(self.node_count()),
            torus: false,
        }
    }

    fn record(node: &NodeId) -> Option<PositionRecord> {
        Some(PositionRecord::Node { node: *node })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::AtMost;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    /// 0 - 1 - 2 - 3 - 4, plus 1 - 5
    fn path() -> Network {
        Network::from_edges(6, [(0, 1), (1, 2), (2, 3), (3, 4), (1, 5)]).unwrap()
    }

    #[test]
    fn test_edges() {
        let mut network = path();
        assert_eq!(network.edge_count(), 5);

        network.add_edge(1, 0).unwrap();
        network.add_edge(2, 2).unwrap();
        assert_eq!(network.edge_count(), 5);
        assert_eq!(network.adjacent(1), &[0, 2, 5]);

        assert_eq!(network.add_edge(0, 6), Err(SpaceError::UnknownNode(6)));
    }

    #[test]
    fn test_neighbor_nodes_by_hops() {
        let network = path();
        assert_eq!(network.neighbor_nodes(2, 1, false), vec![1, 3]);
        assert_eq!(network.neighbor_nodes(2, 2, false), vec![1, 3, 0, 5, 4]);
        assert_eq!(network.neighbor_nodes(2, 1, true), vec![2, 1, 3]);
        assert!(network.neighbor_nodes(2, 0, false).is_empty());
        assert!(network.neighbor_nodes(9, 1, true).is_empty());
    }

    #[test]
    fn test_place_move_remove() {
        let mut network = path();
        network.place(AgentId(1), 0).unwrap();
        network.place(AgentId(1), 4).unwrap();

        assert!(network.is_node_empty(0));
        assert_eq!(network.agents_at(4), &[AgentId(1)]);
        assert_eq!(network.position_of(AgentId(1)), Some(4));

        assert_eq!(network.remove(AgentId(1)), Some(4));
        assert_eq!(network.position_of(AgentId(1)), None);
        assert!(network.is_empty());
    }

    #[test]
    fn test_place_on_unknown_node() {
        let mut network = path();
        assert_eq!(network.place(AgentId(1), 6), Err(SpaceError::UnknownNode(6)));
        assert!(network.is_empty());
    }

    #[test]
    fn test_neighbors_collects_occupants() {
        let mut network = path();
        network.place(AgentId(1), 2).unwrap();
        network.place(AgentId(2), 1).unwrap();
        network.place(AgentId(3), 3).unwrap();
        network.place(AgentId(4), 0).unwrap();

        assert_eq!(network.neighbors(2, 1, false), vec![AgentId(2), AgentId(3)]);
        assert_eq!(network.neighbors(2, 1, true), vec![AgentId(1), AgentId(2), AgentId(3)]);
        assert_eq!(network.neighbors(2, 2, false).len(), 3);
    }

    #[test]
    fn test_empty_nodes() {
        let mut network = Network::new(3);
        network.place(AgentId(1), 0).unwrap();
        network.place(AgentId(2), 2).unwrap();

        assert_eq!(network.empty_nodes().collect::<Vec<_>>(), vec![1]);
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(network.random_empty_node(&mut rng), Some(1));
        assert_eq!(network.summary().nodes, Some(3));
    }

    #[test]
    fn test_node_selections() {
        let mut network = path();
        network.place(AgentId(1), 1).unwrap();
        network.place(AgentId(2), 3).unwrap();
        let mut rng = SmallRng::seed_from_u64(6);

        let around = network.neighborhood_selection(2, 1, false);
        assert_eq!(around.positions().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(around.agents().collect::<Vec<_>>(), vec![AgentId(1), AgentId(2)]);

        let empties = network
            .all_nodes()
            .select(|_, agents| agents.is_empty(), AtMost::All);
        assert_eq!(empties.positions().collect::<Vec<_>>(), vec![0, 2, 4, 5]);
        let pick = empties.select_random_cell(&mut rng).unwrap();
        assert!(network.is_node_empty(pick));

        let sample = network.all_nodes().sample_random_cells(6, &mut rng).unwrap();
        let mut sorted = sample.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5]);
    }
}
