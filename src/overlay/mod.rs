//! Projects execution events reported by the remote runner onto node and
//! edge display state. Nothing here changes connectivity.

use crate::control_flow::DecisionKind;
use crate::error::Diagnostic;
use crate::graph::{ExecutionStatus, Graph, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use tracing::{debug, warn};

/// One event of the execution feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Document index of the node, as a number or a numeric string.
    #[serde(default)]
    pub node_id: Option<Value>,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub branch: Option<String>,
}

impl ExecutionEvent {
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            node_id: None,
            node_type: None,
            status: None,
            output: None,
            error: None,
            branch: None,
        }
    }

    pub fn for_node(event_type: &str, node_index: usize) -> Self {
        Self {
            node_id: Some(Value::from(node_index)),
            ..Self::new(event_type)
        }
    }

    fn node_index(&self) -> Option<usize> {
        match self.node_id.as_ref()? {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn node_label(&self) -> String {
        match &self.node_id {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    fn parsed_status(&self) -> Option<ExecutionStatus> {
        let text = self.status.as_deref()?;
        let status = ExecutionStatus::parse(text);
        if status.is_none() {
            warn!(status = text, event = %self.event_type, "unknown execution status");
        }
        status
    }
}

/// A recorded execution feed, loadable from a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    pub events: Vec<ExecutionEvent>,
}

impl EventLog {
    /// Load an event log from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let log = serde_json::from_str(&content)?;
        Ok(log)
    }
}

/// Output and error a node reported, plus the branch a decision took.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeReport {
    pub output: Option<Value>,
    pub error: Option<String>,
    pub branch: Option<String>,
}

impl NodeReport {
    /// The matched branch: the explicit one, else `matched_branch` or
    /// `branch` inside the output object.
    fn matched_branch(&self) -> Option<&str> {
        self.branch.as_deref().or_else(|| {
            let output = self.output.as_ref()?.as_object()?;
            ["matched_branch", "branch"]
                .iter()
                .find_map(|key| output.get(*key).and_then(Value::as_str))
        })
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionOverlay {
    decision_types: Vec<String>,
    workflow_status: Option<ExecutionStatus>,
}

impl Default for ExecutionOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionOverlay {
    pub fn new() -> Self {
        Self {
            decision_types: vec![DecisionKind::TYPE.to_string()],
            workflow_status: None,
        }
    }

    /// Treats nodes of `workflow_type` as decisions when highlighting branches.
    pub fn with_decision_type(mut self, workflow_type: &str) -> Self {
        self.decision_types.push(workflow_type.to_string());
        self
    }

    pub fn workflow_status(&self) -> Option<ExecutionStatus> {
        self.workflow_status
    }

    /// Sets the status of the node at document index `node_index`.
    /// Repeating the call with the same arguments changes nothing.
    pub fn set_node_status(
        &self,
        graph: &mut Graph,
        node_index: usize,
        status: ExecutionStatus,
        report: NodeReport,
    ) -> Result<(), Diagnostic> {
        let node_id = graph
            .node_at_index(node_index)
            .ok_or_else(|| Diagnostic::UnknownEventNode(node_index.to_string()))?;
        let branch = report.matched_branch().map(str::to_string);
        let Some(node) = graph.node_mut(node_id) else {
            return Err(Diagnostic::UnknownEventNode(node_index.to_string()));
        };
        node.display.status = Some(status);
        node.display.output = report.output;
        node.display.error = report.error;
        let is_decision = self.decision_types.contains(&node.workflow_type);

        if let (true, Some(branch)) = (is_decision, branch) {
            highlight_branch(graph, node_id, &branch);
        }
        Ok(())
    }

    /// Applies one feed event. Events naming an unknown node yield a
    /// diagnostic and change nothing.
    pub fn apply_event(&mut self, graph: &mut Graph, event: &ExecutionEvent) -> Result<(), Diagnostic> {
        match event.event_type.as_str() {
            "workflow.start" => {
                self.workflow_status = Some(ExecutionStatus::Running);
                Ok(())
            }
            "workflow.end" => {
                self.workflow_status = Some(event.parsed_status().unwrap_or(ExecutionStatus::Completed));
                debug!(status = ?self.workflow_status, "workflow finished");
                Ok(())
            }
            kind if kind.starts_with("node.") => {
                let status = match kind {
                    "node.start" => Some(ExecutionStatus::Running),
                    "node.end" => Some(event.parsed_status().unwrap_or(ExecutionStatus::Completed)),
                    _ => event.parsed_status(),
                };
                let index = event
                    .node_index()
                    .ok_or_else(|| Diagnostic::UnknownEventNode(event.node_label()))?;
                let Some(status) = status else {
                    return Ok(());
                };
                let report = NodeReport {
                    output: event.output.clone(),
                    error: event.error.as_ref().map(|e| match e {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    }),
                    branch: event.branch.clone(),
                };
                self.set_node_status(graph, index, status, report)
                    .map_err(|_| Diagnostic::UnknownEventNode(event.node_label()))
            }
            other => {
                debug!(event = other, "ignored execution event");
                Ok(())
            }
        }
    }

    /// Applies a whole log in order, collecting the diagnostics.
    pub fn apply_log(&mut self, graph: &mut Graph, log: &EventLog) -> Vec<Diagnostic> {
        log.events
            .iter()
            .filter_map(|event| self.apply_event(graph, event).err())
            .inspect(|diagnostic| warn!("{}", diagnostic))
            .collect()
    }

    /// Removes every execution annotation from the graph.
    pub fn clear_all(&mut self, graph: &mut Graph) {
        self.workflow_status = None;
        for node in graph.nodes_mut() {
            node.display = Default::default();
        }
        for edge in graph.edges_mut() {
            edge.display = Default::default();
        }
    }
}

/// Marks the edges leaving `branch` active and their siblings dimmed.
fn highlight_branch(graph: &mut Graph, node_id: NodeId, branch: &str) {
    let Some(slot) = graph.node(node_id).and_then(|n| n.output_index(branch)) else {
        warn!(node_id, branch, "decision reported a branch it does not have");
        return;
    };
    for edge in graph.edges_mut().filter(|e| e.source == node_id) {
        let taken = edge.source_slot == slot;
        edge.display.active = taken;
        edge.display.dimmed = !taken;
    }
}
