use super::{LayoutNode, LayoutOptions, LayoutStrategy};
use crate::graph::Position;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const MIN_DISTANCE: f64 = 0.01;

/// Tuning of the force simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceOptions {
    pub iterations: usize,
    /// Strength of the inverse-square push between every pair of nodes.
    pub repulsion: f64,
    /// Stiffness of the spring along each edge.
    pub spring: f64,
    /// Edge length at which the spring is relaxed.
    pub rest_length: f64,
    /// Pull of every node toward the center.
    pub centering: f64,
    /// Fraction of velocity kept from one step to the next.
    pub damping: f64,
    /// Upper bound on how far a node may move in one step.
    pub max_step: f64,
    /// Seed for placing nodes that have no usable starting position.
    pub seed: u64,
    /// Area random starting positions are drawn from.
    pub scatter_width: f64,
    pub scatter_height: f64,
}

impl Default for ForceOptions {
    fn default() -> Self {
        Self {
            iterations: 300,
            repulsion: 40_000.0,
            spring: 0.05,
            rest_length: 200.0,
            centering: 0.01,
            damping: 0.85,
            max_step: 50.0,
            seed: 0x6b65_6972_6f00,
            scatter_width: 1000.0,
            scatter_height: 800.0,
        }
    }
}

/// Pairwise spring simulation over a fixed number of steps.
///
/// Nodes keep their current coordinates as the starting point; a node that
/// shares its coordinates with an earlier one is scattered from a seeded
/// generator, so the result is fully determined by the input.
pub struct ForceDirectedLayout;

impl ForceDirectedLayout {
    fn initial_positions(nodes: &[LayoutNode], options: &ForceOptions) -> Vec<Position> {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut placed: Vec<Position> = Vec::with_capacity(nodes.len());
        for node in nodes {
            let p = node.position;
            let taken = placed.iter().any(|q| q.x == p.x && q.y == p.y);
            let valid = p.x.is_finite() && p.y.is_finite();
            if taken || !valid {
                placed.push(Position::new(
                    rng.random_range(0.0..options.scatter_width.max(1.0)),
                    rng.random_range(0.0..options.scatter_height.max(1.0)),
                ));
            } else {
                placed.push(p);
            }
        }
        placed
    }
}

impl LayoutStrategy for ForceDirectedLayout {
    fn compute(
        &self,
        nodes: &[LayoutNode],
        edges: &[(usize, usize)],
        options: &LayoutOptions,
    ) -> Vec<Position> {
        let force = &options.force;
        let n = nodes.len();
        let mut positions = Self::initial_positions(nodes, force);
        if n < 2 {
            return positions;
        }

        let center = match options.viewport {
            Some(viewport) => viewport.center(),
            None => {
                let (sx, sy) = positions
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
                Position::new(sx / n as f64, sy / n as f64)
            }
        };
        let springs: Vec<(usize, usize)> = edges
            .iter()
            .copied()
            .filter(|(a, b)| a != b && *a < n && *b < n)
            .collect();
        let mut velocity = vec![(0.0f64, 0.0f64); n];

        for _ in 0..force.iterations {
            let mut push = vec![(0.0f64, 0.0f64); n];

            for i in 0..n {
                for j in (i + 1)..n {
                    let dx = positions[i].x - positions[j].x;
                    let dy = positions[i].y - positions[j].y;
                    let dist_sq = (dx * dx + dy * dy).max(MIN_DISTANCE);
                    let dist = dist_sq.sqrt();
                    let f = force.repulsion / dist_sq;
                    let (fx, fy) = (dx / dist * f, dy / dist * f);
                    push[i].0 += fx;
                    push[i].1 += fy;
                    push[j].0 -= fx;
                    push[j].1 -= fy;
                }
            }

            for &(a, b) in &springs {
                let dx = positions[b].x - positions[a].x;
                let dy = positions[b].y - positions[a].y;
                let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                let f = force.spring * (dist - force.rest_length);
                let (fx, fy) = (dx / dist * f, dy / dist * f);
                push[a].0 += fx;
                push[a].1 += fy;
                push[b].0 -= fx;
                push[b].1 -= fy;
            }

            for i in 0..n {
                push[i].0 += (center.x - positions[i].x) * force.centering;
                push[i].1 += (center.y - positions[i].y) * force.centering;

                let vx = (velocity[i].0 + push[i].0) * force.damping;
                let vy = (velocity[i].1 + push[i].1) * force.damping;
                let speed = (vx * vx + vy * vy).sqrt();
                let scale = if speed > force.max_step {
                    force.max_step / speed
                } else {
                    1.0
                };
                velocity[i] = (vx * scale, vy * scale);
                positions[i].x += velocity[i].0;
                positions[i].y += velocity[i].1;
            }
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Size;

    fn stacked(n: usize) -> Vec<LayoutNode> {
        vec![
            LayoutNode {
                position: Position::default(),
                size: Size::for_rows(1),
            };
            n
        ]
    }

    #[test]
    fn test_overlapping_nodes_are_scattered() {
        let positions = ForceDirectedLayout::initial_positions(&stacked(3), &ForceOptions::default());
        assert_eq!(positions[0], Position::default());
        assert_ne!(positions[1], positions[0]);
        assert_ne!(positions[2], positions[1]);
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let nodes = stacked(4);
        let edges = [(0, 1), (1, 2), (2, 3)];
        let options = LayoutOptions::default();
        let first = ForceDirectedLayout.compute(&nodes, &edges, &options);
        let second = ForceDirectedLayout.compute(&nodes, &edges, &options);
        assert_eq!(first, second);
        assert!(first.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }
}
