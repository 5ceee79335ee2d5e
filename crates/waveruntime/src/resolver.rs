use crate::graph::Graph;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use wavecore::ValidationError;

/// Nodes that can run together: every dependency lies in an earlier wave.
pub type Wave = Vec<NodeIndex>;

/// Split the graph into execution waves (Kahn's algorithm).
///
/// Wave 0 holds every node without incoming edges. Fails with
/// `CycleDetected` without returning a partial order when some node never
/// reaches in-degree zero.
pub fn resolve_order(graph: &Graph) -> Result<Vec<Wave>, ValidationError> {
    let mut in_degree: Vec<usize> = vec![0; graph.node_count()];
    for (idx, _) in graph.all_nodes() {
        in_degree[idx.index()] = graph.in_degree(idx);
    }

    let mut current: Wave = graph.entry_nodes();
    let mut waves = Vec::new();
    let mut placed = 0;

    while !current.is_empty() {
        current.sort_by(|a, b| graph.node(*a).id.cmp(&graph.node(*b).id));

        let mut next = Vec::new();
        for &idx in &current {
            for succ in graph.out_edges(idx) {
                let degree = &mut in_degree[succ.index()];
                *degree -= 1;
                if *degree == 0 {
                    next.push(succ);
                }
            }
        }

        placed += current.len();
        waves.push(current);
        current = next;
    }

    if placed < graph.node_count() {
        return Err(ValidationError::CycleDetected {
            node: cycle_member(graph, &in_degree),
        });
    }

    tracing::debug!(
        nodes = graph.node_count(),
        waves = waves.len(),
        "Resolved execution order"
    );
    Ok(waves)
}

/// Name a node that lies on a cycle. Falls back to the lowest id among the
/// nodes that were never released.
fn cycle_member(graph: &Graph, in_degree: &[usize]) -> String {
    if let Err(cycle) = toposort(graph.inner(), None) {
        return graph.node(cycle.node_id()).id.clone();
    }

    graph
        .all_nodes()
        .filter(|(idx, _)| in_degree[idx.index()] > 0)
        .map(|(_, node)| node.id.clone())
        .min()
        .unwrap_or_default()
}
