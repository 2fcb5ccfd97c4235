use crate::graph::{EdgeId, NodeId};
use thiserror::Error;

/// Errors raised by the schema registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("A schema named '{0}' is already registered")]
    DuplicateSchema(String),

    #[error("No schema named '{0}' is registered")]
    UnknownSchema(String),
}

/// Errors raised by direct, caller-driven graph mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node {0} does not exist in the graph")]
    NodeNotFound(NodeId),

    #[error("Edge {0} does not exist in the graph")]
    EdgeNotFound(EdgeId),

    #[error("Node {node_id} has no {direction} slot at index {index}")]
    SlotNotFound {
        node_id: NodeId,
        direction: SlotDirection,
        index: usize,
    },

    #[error("Node {node_id} has no {direction} slot named '{name}'")]
    SlotNameNotFound {
        node_id: NodeId,
        direction: SlotDirection,
        name: String,
    },

    #[error("Node {node_id} has no multi-slot field named '{field}'")]
    NotAMultiSlot { node_id: NodeId, field: String },

    #[error("Slot '{name}' already exists on node {node_id}")]
    DuplicateSlot { node_id: NodeId, name: String },

    #[error("Edge id {0} is already in use")]
    DuplicateEdge(EdgeId),

    #[error("Node {0} cannot be connected to itself")]
    SelfLoop(NodeId),
}

/// Which side of a node a slot lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDirection {
    Input,
    Output,
}

impl std::fmt::Display for SlotDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotDirection::Input => write!(f, "input"),
            SlotDirection::Output => write!(f, "output"),
        }
    }
}

/// Document-level failures surfaced at the codec boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to parse workflow JSON: {0}")]
    JsonParseError(String),

    #[error("Workflow document must be a JSON object")]
    NotAnObject,

    #[error("Workflow document is missing the mandatory '{0}' array")]
    MissingArray(&'static str),

    #[error("Schema '{0}' is not registered")]
    UnknownSchema(String),
}

/// Failures while saving or loading a graph snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Could not access snapshot file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot is missing the mandatory '{0}' array")]
    MissingArray(&'static str),
}

/// A non-fatal problem found while building or mutating a graph.
///
/// Diagnostics never abort the operation that produced them; they are
/// collected and handed back to the caller to surface however it likes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    #[error("Model '{model}' not found in schema '{schema}'")]
    ModelNotFound { schema: String, model: String },

    #[error("Node #{index}: type '{type_name}' does not resolve to any model, skipped")]
    UnresolvedNodeType { index: usize, type_name: String },

    #[error("Node #{index} has no 'type' string, skipped")]
    MissingNodeType { index: usize },

    #[error("Edge #{index} references node #{node_index}, which was not imported")]
    MissingEdgeEndpoint { index: usize, node_index: usize },

    #[error("Edge #{index}: node #{node_index} has no {direction} slot named '{slot}'")]
    MissingSlot {
        index: usize,
        node_index: usize,
        direction: SlotDirection,
        slot: String,
    },

    #[error("Edge #{index} replaces the earlier edge into node #{node_index} input '{slot}'")]
    ReplacedEdge {
        index: usize,
        node_index: usize,
        slot: String,
    },

    #[error("Edge #{index} is malformed: {message}")]
    MalformedEdge { index: usize, message: String },

    #[error("Node {node_id}: no {direction} slot matches '{label}', bound to slot 0")]
    UnmatchedBinding {
        node_id: NodeId,
        direction: SlotDirection,
        label: String,
    },

    #[error("Execution event targets unknown node '{0}'")]
    UnknownEventNode(String),

    #[error("Snapshot entry #{index} skipped: {message}")]
    SkippedSnapshotEntry { index: usize, message: String },
}
