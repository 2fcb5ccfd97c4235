use super::display::EdgeDisplay;
use super::{EdgeId, NodeId};
use crate::control_flow::EdgeCondition;
use serde_json::Value;

/// A directed connection from one node's output slot to another's input slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub source_slot: usize,
    pub target: NodeId,
    pub target_slot: usize,
    /// The source slot's type at connection time.
    pub type_tag: String,
    pub condition: Option<EdgeCondition>,
    pub label: Option<String>,
    pub extra: Option<Value>,
    pub display: EdgeDisplay,
}

impl Edge {
    /// The explicit label, else one derived from the condition.
    pub fn display_label(&self) -> Option<String> {
        self.label
            .clone()
            .or_else(|| self.condition.as_ref().map(EdgeCondition::display_label))
    }
}

/// Everything needed to create an edge, minus its id.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRequest {
    pub source: NodeId,
    pub source_slot: usize,
    pub target: NodeId,
    pub target_slot: usize,
    pub condition: Option<EdgeCondition>,
    pub label: Option<String>,
    pub extra: Option<Value>,
}

impl EdgeRequest {
    pub fn new(source: NodeId, source_slot: usize, target: NodeId, target_slot: usize) -> Self {
        Self {
            source,
            source_slot,
            target,
            target_slot,
            condition: None,
            label: None,
            extra: None,
        }
    }

    pub fn with_condition(mut self, condition: EdgeCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}
