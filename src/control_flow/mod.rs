//! Implicit control-flow ports of workflow node kinds, and the rules that
//! pick a slot when an edge does not name one.

mod condition;
mod kinds;

pub use condition::{ConditionKind, EdgeCondition};
pub use kinds::{
    BODY_SLOT, BindingHint, DEFAULT_BRANCH, DecisionKind, EXIT_SLOT, EndKind, FLOW_SLOT,
    FLOW_TYPE, FlowKind, GenericKind, LoopKind, MERGED_SLOT, MergeKind, ParallelKind,
    SlotTopology, StartKind, WAIT_FOR, config_keys,
};

use crate::error::{Diagnostic, GraphError, SlotDirection};
use crate::graph::{EdgeId, EdgeRequest, Graph, NodeId, NodeInstance};
use ahash::AHashMap;
use kinds::{create_kind_by_name, register_default_kinds};
use serde_json::{Map, Value};
use tracing::warn;

/// An edge created by [`ControlFlowBinder::bind`], with any fallback it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub edge_id: EdgeId,
    pub diagnostics: Vec<Diagnostic>,
}

/// Table of flow kinds keyed by workflow type.
///
/// Types without an entry use the generic kind (one flow input, one flow
/// output).
pub struct ControlFlowBinder {
    kinds: AHashMap<String, Box<dyn FlowKind>>,
    fallback: Box<dyn FlowKind>,
}

impl Default for ControlFlowBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ControlFlowBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.kinds.keys().collect();
        types.sort();
        f.debug_struct("ControlFlowBinder")
            .field("kinds", &types)
            .finish()
    }
}

impl ControlFlowBinder {
    pub fn new() -> Self {
        let mut kinds = AHashMap::new();
        register_default_kinds(&mut kinds);
        Self {
            kinds,
            fallback: Box::new(GenericKind),
        }
    }

    /// Registers a custom kind under its own workflow type, replacing any
    /// existing entry.
    pub fn with_kind(mut self, kind: Box<dyn FlowKind>) -> Self {
        self.kinds.insert(kind.workflow_type().to_string(), kind);
        self
    }

    /// Makes `alias` behave like the built-in kind named `workflow_type`.
    pub fn with_type_alias(mut self, alias: &str, workflow_type: &str) -> Self {
        match create_kind_by_name(workflow_type) {
            Some(kind) => {
                self.kinds.insert(alias.to_string(), kind);
            }
            None => warn!(alias, workflow_type, "no built-in flow kind to alias"),
        }
        self
    }

    pub fn kind(&self, workflow_type: &str) -> &dyn FlowKind {
        self.kinds
            .get(workflow_type)
            .map(|kind| kind.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    pub fn has_kind(&self, workflow_type: &str) -> bool {
        self.kinds.contains_key(workflow_type)
    }

    /// Prepends the control slots of the node's kind ahead of its schema slots.
    pub fn apply_topology(&self, node: &mut NodeInstance, config: &Map<String, Value>) {
        let topology = self.kind(&node.workflow_type).topology(config);
        node.prepend_inputs(topology.inputs, topology.groups);
        node.prepend_outputs(topology.outputs);
        node.refresh_size();
    }

    /// Output slot for an edge leaving `node` without a named slot.
    /// Falls back to slot 0 with a diagnostic when no rule matches.
    pub fn resolve_source_slot(
        &self,
        node: &NodeInstance,
        hint: &BindingHint,
    ) -> (usize, Option<Diagnostic>) {
        match self.kind(&node.workflow_type).bind_source(node, hint) {
            Some(index) => (index, None),
            None => (0, Some(unmatched(node, SlotDirection::Output, hint))),
        }
    }

    /// Input slot for an edge arriving at `node` without a named slot.
    pub fn resolve_target_slot(
        &self,
        node: &NodeInstance,
        hint: &BindingHint,
    ) -> (usize, Option<Diagnostic>) {
        match self.kind(&node.workflow_type).bind_target(node, hint) {
            Some(index) => (index, None),
            None => (0, Some(unmatched(node, SlotDirection::Input, hint))),
        }
    }

    /// Connects two nodes, choosing both slots by the binding rules.
    pub fn bind(
        &self,
        graph: &mut Graph,
        source: NodeId,
        target: NodeId,
        condition: Option<EdgeCondition>,
        label: Option<String>,
    ) -> Result<Binding, GraphError> {
        let hint = BindingHint::new(condition.as_ref(), label.as_deref());
        let (source_slot, source_diag) = self.resolve_source_slot(graph.try_node(source)?, &hint);
        let (target_slot, target_diag) = self.resolve_target_slot(graph.try_node(target)?, &hint);

        let mut request = EdgeRequest::new(source, source_slot, target, target_slot);
        request.condition = condition;
        request.label = label;
        let edge_id = graph.connect(request)?;
        Ok(Binding {
            edge_id,
            diagnostics: source_diag.into_iter().chain(target_diag).collect(),
        })
    }
}

fn unmatched(node: &NodeInstance, direction: SlotDirection, hint: &BindingHint) -> Diagnostic {
    let label = hint.candidates().first().cloned().unwrap_or_default();
    warn!(
        node_id = node.id,
        node_type = %node.workflow_type,
        %direction,
        label = %label,
        "no slot matches edge, binding to slot 0"
    );
    Diagnostic::UnmatchedBinding {
        node_id: node.id,
        direction,
        label,
    }
}
