//! Automatic node placement. Strategies only compute positions; applying
//! them to a graph never touches its topology.

mod force;
mod layered;

pub use force::{ForceDirectedLayout, ForceOptions};
pub use layered::{LayeredLayout, layers};

use crate::graph::{Graph, NodeId, Position, Size};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A node as the layout strategies see it, addressed by its dense index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutNode {
    pub position: Position,
    pub size: Size,
}

/// A strategy that places nodes given the graph's shape.
pub trait LayoutStrategy {
    /// Returns one position per node, in the same order as `nodes`.
    /// `edges` are `(source, target)` pairs of indices into `nodes`.
    fn compute(
        &self,
        nodes: &[LayoutNode],
        edges: &[(usize, usize)],
        options: &LayoutOptions,
    ) -> Vec<Position>;
}

/// The available layout strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutChoice {
    /// Topological layers with barycenter ordering.
    Layered,
    /// Spring simulation over a fixed number of iterations.
    ForceDirected,
}

impl LayoutChoice {
    pub fn strategy(&self) -> Box<dyn LayoutStrategy> {
        match self {
            LayoutChoice::Layered => Box::new(LayeredLayout),
            LayoutChoice::ForceDirected => Box::new(ForceDirectedLayout),
        }
    }
}

impl FromStr for LayoutChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "layered" | "hierarchical" | "topological" => Ok(LayoutChoice::Layered),
            "force" | "force_directed" | "force-directed" => Ok(LayoutChoice::ForceDirected),
            other => Err(format!("unknown layout '{}'", other)),
        }
    }
}

impl fmt::Display for LayoutChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutChoice::Layered => write!(f, "layered"),
            LayoutChoice::ForceDirected => write!(f, "force_directed"),
        }
    }
}

/// Primary axis along which layers advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    #[default]
    LeftToRight,
    TopToBottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn center(&self) -> Position {
        Position::new(self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub direction: LayoutDirection,
    /// Distance between consecutive layers.
    pub layer_spacing: f64,
    /// Distance between nodes of the same layer.
    pub node_spacing: f64,
    /// When set, the result is centered on this viewport.
    pub viewport: Option<Viewport>,
    pub force: ForceOptions,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::LeftToRight,
            layer_spacing: 300.0,
            node_spacing: 150.0,
            viewport: None,
            force: ForceOptions::default(),
        }
    }
}

impl LayoutOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Moves `positions` so their bounding-box center sits on `center`.
pub(crate) fn center_on(positions: &mut [Position], center: Position) {
    if positions.is_empty() {
        return;
    }
    let (min_x, max_x, min_y, max_y) = positions.iter().fold(
        (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
        |(min_x, max_x, min_y, max_y), p| (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y)),
    );
    let dx = center.x - (min_x + max_x) / 2.0;
    let dy = center.y - (min_y + max_y) / 2.0;
    for p in positions.iter_mut() {
        p.x += dx;
        p.y += dy;
    }
}

impl Graph {
    /// Dense-index view of the graph for layout strategies.
    pub fn layout_input(&self) -> (Vec<LayoutNode>, Vec<(usize, usize)>) {
        let index: AHashMap<NodeId, usize> = self
            .node_ids()
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        let nodes = self
            .nodes()
            .map(|n| LayoutNode {
                position: n.position,
                size: n.size,
            })
            .collect();
        let edges = self
            .edges()
            .filter_map(|e| Some((*index.get(&e.source)?, *index.get(&e.target)?)))
            .collect();
        (nodes, edges)
    }

    /// Lays out the graph with `choice` and writes the positions back.
    pub fn apply_layout(&mut self, choice: LayoutChoice, options: &LayoutOptions) {
        self.apply_strategy(choice.strategy().as_ref(), options);
        debug!(layout = %choice, nodes = self.node_count(), "applied layout");
    }

    pub fn apply_strategy(&mut self, strategy: &dyn LayoutStrategy, options: &LayoutOptions) {
        let (nodes, edges) = self.layout_input();
        let positions = strategy.compute(&nodes, &edges, options);
        for (node, position) in self.nodes_mut().zip(positions) {
            node.position = position;
        }
    }
}
