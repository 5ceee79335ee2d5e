use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use wavecore::{ConfiguredNode, EdgeId, EdgeSpec, NodeId, ValidationError};

/// Validated, immutable workflow graph.
///
/// Nodes live in an arena and are addressed by `NodeIndex`; the id map is
/// only consulted at the boundary.
#[derive(Debug, Clone)]
pub struct Graph {
    inner: DiGraph<ConfiguredNode, EdgeId>,
    index: HashMap<NodeId, NodeIndex>,
}

impl Graph {
    /// Build the graph, rejecting duplicate ids and edges whose endpoints
    /// do not exist.
    pub fn build(nodes: Vec<ConfiguredNode>, edges: &[EdgeSpec]) -> Result<Self, ValidationError> {
        if nodes.is_empty() {
            return Err(ValidationError::EmptyWorkflow);
        }

        let mut inner = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if index.contains_key(&node.id) {
                return Err(ValidationError::DuplicateNode(node.id));
            }
            let id = node.id.clone();
            let idx = inner.add_node(node);
            index.insert(id, idx);
        }

        let mut edge_ids = HashSet::with_capacity(edges.len());
        for edge in edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(ValidationError::DuplicateEdge(edge.id.clone()));
            }
            let lookup = |node: &NodeId| {
                index
                    .get(node)
                    .copied()
                    .ok_or_else(|| ValidationError::DanglingEdge {
                        edge: edge.id.clone(),
                        node: node.clone(),
                    })
            };
            let source = lookup(&edge.source)?;
            let target = lookup(&edge.target)?;
            inner.add_edge(source, target, edge.id.clone());
        }

        Ok(Self { inner, index })
    }

    pub fn node(&self, idx: NodeIndex) -> &ConfiguredNode {
        &self.inner[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&ConfiguredNode> {
        self.index_of(id).map(|idx| self.node(idx))
    }

    /// Distinct predecessors, ordered by node id.
    pub fn predecessors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Incoming)
    }

    /// Distinct successors, ordered by node id.
    pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Outgoing)
    }

    pub fn predecessors_of(&self, id: &str) -> Vec<&ConfiguredNode> {
        self.index_of(id)
            .map(|idx| self.predecessors(idx).into_iter().map(|p| self.node(p)).collect())
            .unwrap_or_default()
    }

    pub fn successors_of(&self, id: &str) -> Vec<&ConfiguredNode> {
        self.index_of(id)
            .map(|idx| self.successors(idx).into_iter().map(|s| self.node(s)).collect())
            .unwrap_or_default()
    }

    /// Number of incoming edges, counting parallel edges separately.
    pub fn in_degree(&self, idx: NodeIndex) -> usize {
        self.inner.edges_directed(idx, Direction::Incoming).count()
    }

    /// Outgoing edge targets, one entry per edge.
    pub(crate) fn out_edges(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.inner
            .neighbors_directed(idx, Direction::Outgoing)
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = (NodeIndex, &ConfiguredNode)> {
        self.inner
            .node_indices()
            .map(move |idx| (idx, &self.inner[idx]))
    }

    /// Nodes without incoming edges.
    pub fn entry_nodes(&self) -> Vec<NodeIndex> {
        self.inner
            .node_indices()
            .filter(|&idx| self.in_degree(idx) == 0)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub(crate) fn inner(&self) -> &DiGraph<ConfiguredNode, EdgeId> {
        &self.inner
    }

    fn neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut found: Vec<NodeIndex> = self.inner.neighbors_directed(idx, direction).collect();
        found.sort_by(|a, b| self.inner[*a].id.cmp(&self.inner[*b].id));
        found.dedup();
        found
    }
}
