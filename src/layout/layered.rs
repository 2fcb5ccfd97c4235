use super::{LayoutDirection, LayoutNode, LayoutOptions, LayoutStrategy, center_on};
use crate::graph::Position;
use std::collections::VecDeque;

/// Places nodes in topological layers along the primary axis.
pub struct LayeredLayout;

/// Groups node indices into layers by breadth-first search from the roots.
///
/// Roots are the nodes without incoming edges, or all nodes of minimum
/// in-degree when every node has one. A node belongs to the layer where it
/// is first reached; nodes never reached share one final layer. Every layer
/// after the first is ordered by the barycenter of its predecessors in the
/// layer before it.
pub fn layers(node_count: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    if node_count == 0 {
        return Vec::new();
    }
    let mut successors = vec![Vec::new(); node_count];
    let mut predecessors = vec![Vec::new(); node_count];
    let mut in_degree = vec![0usize; node_count];
    for &(source, target) in edges {
        if source >= node_count || target >= node_count || source == target {
            continue;
        }
        successors[source].push(target);
        predecessors[target].push(source);
        in_degree[target] += 1;
    }

    let min_degree = in_degree.iter().copied().min().unwrap_or(0);
    let roots: Vec<usize> = (0..node_count)
        .filter(|i| in_degree[*i] == min_degree)
        .collect();

    let mut visited = vec![false; node_count];
    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    for root in roots {
        visited[root] = true;
        queue.push_back((root, 0));
    }
    while let Some((node, depth)) = queue.pop_front() {
        if layers.len() <= depth {
            layers.push(Vec::new());
        }
        layers[depth].push(node);
        for &next in &successors[node] {
            if !visited[next] {
                visited[next] = true;
                queue.push_back((next, depth + 1));
            }
        }
    }
    let unreached: Vec<usize> = (0..node_count).filter(|i| !visited[*i]).collect();
    if !unreached.is_empty() {
        layers.push(unreached);
    }

    for k in 1..layers.len() {
        let (before, after) = layers.split_at_mut(k);
        let previous = &before[k - 1];
        let mut order: Vec<(usize, f64)> = after[0]
            .iter()
            .enumerate()
            .map(|(current, node)| {
                let positions: Vec<f64> = predecessors[*node]
                    .iter()
                    .filter_map(|p| previous.iter().position(|q| q == p))
                    .map(|i| i as f64)
                    .collect();
                let barycenter = if positions.is_empty() {
                    current as f64
                } else {
                    positions.iter().sum::<f64>() / positions.len() as f64
                };
                (*node, barycenter)
            })
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));
        after[0] = order.into_iter().map(|(node, _)| node).collect();
    }
    layers
}

impl LayoutStrategy for LayeredLayout {
    fn compute(
        &self,
        nodes: &[LayoutNode],
        edges: &[(usize, usize)],
        options: &LayoutOptions,
    ) -> Vec<Position> {
        let layers = layers(nodes.len(), edges);
        let widest = layers.iter().map(Vec::len).max().unwrap_or(0);
        let span = widest.saturating_sub(1) as f64 * options.node_spacing;

        let mut positions = vec![Position::default(); nodes.len()];
        for (depth, layer) in layers.iter().enumerate() {
            let primary = depth as f64 * options.layer_spacing;
            let offset = (span - layer.len().saturating_sub(1) as f64 * options.node_spacing) / 2.0;
            for (slot, node) in layer.iter().enumerate() {
                let secondary = offset + slot as f64 * options.node_spacing;
                positions[*node] = match options.direction {
                    LayoutDirection::LeftToRight => Position::new(primary, secondary),
                    LayoutDirection::TopToBottom => Position::new(secondary, primary),
                };
            }
        }
        if let Some(viewport) = options.viewport {
            center_on(&mut positions, viewport.center());
        }
        positions
    }
}
