use crate::control_flow::EdgeCondition;
use crate::error::{Diagnostic, SnapshotError};
use crate::graph::{
    EdgeId, EdgeRequest, Graph, InputSlot, NativeInput, NodeId, NodeInstance, NodeMeta,
    OutputSlot, Position, Size,
};
use crate::registry::SchemaRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use tracing::{debug, warn};

/// Full editor state of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub pos: [f64; 2],
    pub size: [f64; 2],
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub model: String,
    pub schema: String,
    #[serde(default)]
    pub inputs: Vec<InputSlot>,
    #[serde(default)]
    pub outputs: Vec<OutputSlot>,
    #[serde(default)]
    pub native_inputs: BTreeMap<usize, NativeInput>,
    #[serde(default)]
    pub multi_input_slots: BTreeMap<String, Vec<usize>>,
    #[serde(default)]
    pub multi_output_slots: BTreeMap<String, Vec<usize>>,
    #[serde(default)]
    pub constant_fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unset_constants: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Full editor state of one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub id: EdgeId,
    pub origin_id: NodeId,
    pub origin_slot: usize,
    pub target_id: NodeId,
    pub target_slot: usize,
    #[serde(rename = "type", default)]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EdgeCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Save/restore format for a whole graph, ids and slot layout included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub last_node_id: NodeId,
    pub last_link_id: EdgeId,
    pub nodes: Vec<NodeSnapshot>,
    pub links: Vec<LinkSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Entries dropped while decoding.
    #[serde(skip)]
    pub skipped: Vec<Diagnostic>,
}

/// A graph rebuilt from a snapshot, with everything that had to be left out.
#[derive(Debug, Clone)]
pub struct RestoredGraph {
    pub graph: Graph,
    pub diagnostics: Vec<Diagnostic>,
}

impl GraphSnapshot {
    pub fn capture(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| NodeSnapshot {
                id: node.id,
                node_type: node.workflow_type.clone(),
                pos: [node.position.x, node.position.y],
                size: [node.size.width, node.size.height],
                properties: node.properties.clone(),
                model: node.model_name.clone(),
                schema: node.schema_name.clone(),
                inputs: node.inputs.iter().map(unlinked_input).collect(),
                outputs: node.outputs.iter().map(unlinked_output).collect(),
                native_inputs: node.native_inputs.clone(),
                multi_input_slots: node.multi_input_slots.clone(),
                multi_output_slots: node.multi_output_slots.clone(),
                constant_fields: node.constant_fields.clone(),
                unset_constants: node.unset_constants.clone(),
                title: node.meta.title.clone(),
                color: node.meta.color.clone(),
                extra: node.meta.extra.clone(),
            })
            .collect();
        let links = graph
            .edges()
            .map(|edge| LinkSnapshot {
                id: edge.id,
                origin_id: edge.source,
                origin_slot: edge.source_slot,
                target_id: edge.target,
                target_slot: edge.target_slot,
                type_tag: edge.type_tag.clone(),
                extra: edge.extra.clone(),
                condition: edge.condition.clone(),
                label: edge.label.clone(),
            })
            .collect();
        Self {
            last_node_id: graph.last_node_id(),
            last_link_id: graph.last_edge_id(),
            nodes,
            links,
            info: graph.info.clone(),
            options: graph.options.clone(),
            variables: graph.variables.clone(),
            skipped: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Saves the snapshot to a file as pretty-printed JSON.
    pub fn save(&self, path: &str) -> Result<(), SnapshotError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| SnapshotError::Io {
            path: path.to_string(),
            source,
        })
    }

    /// Loads a snapshot from a file.
    pub fn from_file(path: &str) -> Result<Self, SnapshotError> {
        let text = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Decodes a snapshot entry by entry. Entries that fail to decode are
    /// recorded in `skipped` instead of failing the whole snapshot.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let root: Value = serde_json::from_str(text)?;
        let nodes = root
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or(SnapshotError::MissingArray("nodes"))?;
        let links = root
            .get("links")
            .and_then(Value::as_array)
            .ok_or(SnapshotError::MissingArray("links"))?;

        let mut skipped = Vec::new();
        let nodes = decode_entries::<NodeSnapshot>(nodes, "node", &mut skipped);
        let links = decode_entries::<LinkSnapshot>(links, "link", &mut skipped);
        let counter = |key: &str| root.get(key).and_then(Value::as_u64).unwrap_or(0);

        Ok(Self {
            last_node_id: counter("last_node_id"),
            last_link_id: counter("last_link_id"),
            nodes,
            links,
            info: root.get("info").cloned(),
            options: root.get("options").cloned(),
            variables: root.get("variables").cloned(),
            skipped,
        })
    }

    /// Rebuilds the graph. Nodes whose model is unknown to `registry` are
    /// left out, and so are links that no longer fit their endpoints.
    pub fn restore(&self, registry: &SchemaRegistry) -> RestoredGraph {
        let mut graph = Graph::new();
        let mut diagnostics = self.skipped.clone();
        graph.info = self.info.clone();
        graph.options = self.options.clone();
        graph.variables = self.variables.clone();

        for (index, entry) in self.nodes.iter().enumerate() {
            if registry.model(&entry.schema, &entry.model).is_none() {
                diagnostics.push(Diagnostic::SkippedSnapshotEntry {
                    index,
                    message: format!(
                        "node {} uses model '{}' unknown to schema '{}'",
                        entry.id, entry.model, entry.schema
                    ),
                });
                continue;
            }
            if !graph.restore_node(node_from_snapshot(entry)) {
                diagnostics.push(Diagnostic::SkippedSnapshotEntry {
                    index,
                    message: format!("node id {} is invalid or repeated", entry.id),
                });
            }
        }

        for (index, link) in self.links.iter().enumerate() {
            let request = EdgeRequest {
                source: link.origin_id,
                source_slot: link.origin_slot,
                target: link.target_id,
                target_slot: link.target_slot,
                condition: link.condition.clone(),
                label: link.label.clone(),
                extra: link.extra.clone(),
            };
            if let Err(e) = graph.link(link.id, request) {
                diagnostics.push(Diagnostic::SkippedSnapshotEntry {
                    index,
                    message: format!("link {}: {}", link.id, e),
                });
            }
        }

        graph.bump_counters(self.last_node_id, self.last_link_id);
        for diagnostic in &diagnostics {
            warn!("{}", diagnostic);
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "restored snapshot"
        );
        RestoredGraph { graph, diagnostics }
    }
}

fn decode_entries<T: serde::de::DeserializeOwned>(
    entries: &[Value],
    what: &str,
    skipped: &mut Vec<Diagnostic>,
) -> Vec<T> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| match serde_json::from_value(raw.clone()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                skipped.push(Diagnostic::SkippedSnapshotEntry {
                    index,
                    message: format!("{} does not decode: {}", what, e),
                });
                None
            }
        })
        .collect()
}

/// Slot links are rebuilt from the link list on restore.
fn unlinked_input(slot: &InputSlot) -> InputSlot {
    InputSlot {
        link: None,
        ..slot.clone()
    }
}

fn unlinked_output(slot: &OutputSlot) -> OutputSlot {
    OutputSlot {
        links: Vec::new(),
        ..slot.clone()
    }
}

fn node_from_snapshot(entry: &NodeSnapshot) -> NodeInstance {
    let mut node = NodeInstance::new(&entry.model, &entry.schema, &entry.node_type);
    node.id = entry.id;
    node.position = Position::new(entry.pos[0], entry.pos[1]);
    node.size = Size {
        width: entry.size[0],
        height: entry.size[1],
    };
    node.properties = entry.properties.clone();
    node.inputs = entry.inputs.clone();
    node.outputs = entry.outputs.clone();
    node.native_inputs = entry.native_inputs.clone();
    node.multi_input_slots = entry.multi_input_slots.clone();
    node.multi_output_slots = entry.multi_output_slots.clone();
    node.constant_fields = entry.constant_fields.clone();
    node.unset_constants = entry.unset_constants.clone();
    node.meta = NodeMeta {
        title: entry.title.clone(),
        color: entry.color.clone(),
        extra: entry.extra.clone(),
    };
    node
}
