use super::condition::EdgeCondition;
use crate::graph::{InputSlot, NodeInstance, OutputSlot, SlotOrigin};
use crate::schema::TypeTree;
use ahash::AHashMap;
use itertools::Itertools;
use serde_json::{Map, Value};

pub const FLOW_SLOT: &str = "flow";
pub const FLOW_TYPE: &str = "flow";

/// Control slots a workflow kind adds on top of a node's schema slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotTopology {
    pub inputs: Vec<InputSlot>,
    pub outputs: Vec<OutputSlot>,
    /// Multi-input groups formed by control inputs, by slot name.
    pub groups: Vec<(String, Vec<String>)>,
}

impl SlotTopology {
    fn new() -> Self {
        Self::default()
    }

    fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(control_input(name));
        self
    }

    fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(control_output(name));
        self
    }
}

fn control_input(name: impl Into<String>) -> InputSlot {
    InputSlot::new(name, TypeTree::basic(FLOW_TYPE), SlotOrigin::Control)
}

fn control_output(name: impl Into<String>) -> OutputSlot {
    OutputSlot::new(name, TypeTree::basic(FLOW_TYPE), SlotOrigin::Control)
}

/// What an edge says about itself when no slot was named explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindingHint<'a> {
    pub condition: Option<&'a EdgeCondition>,
    pub label: Option<&'a str>,
}

impl<'a> BindingHint<'a> {
    pub fn new(condition: Option<&'a EdgeCondition>, label: Option<&'a str>) -> Self {
        Self { condition, label }
    }

    /// Branch names to try, most specific first: condition value, field,
    /// condition label, then the edge label.
    pub fn candidates(&self) -> Vec<String> {
        self.condition
            .map(EdgeCondition::branch_candidates)
            .unwrap_or_default()
            .into_iter()
            .chain(self.label.map(str::to_string))
            .unique()
            .collect()
    }

    /// All label text on the edge, lowercased.
    pub fn text(&self) -> String {
        self.candidates().join(" ").to_lowercase()
    }
}

/// Defines the slot topology and binding rules of one workflow node type.
pub trait FlowKind: Send + Sync {
    fn workflow_type(&self) -> &str;

    fn topology(&self, config: &Map<String, Value>) -> SlotTopology;

    /// Picks the output an unnamed edge leaves from. `None` means no rule matched.
    fn bind_source(&self, node: &NodeInstance, _hint: &BindingHint) -> Option<usize> {
        node.output_index(FLOW_SLOT)
    }

    /// Picks the input an unnamed edge arrives at. `None` means no rule matched.
    fn bind_target(&self, node: &NodeInstance, _hint: &BindingHint) -> Option<usize> {
        node.input_index(FLOW_SLOT)
    }
}

/// Keys named by a config entry: an object's keys, or an array's strings
/// (objects in the array contribute their `name`, `key` or `label`).
pub fn config_keys(value: Option<&Value>) -> Vec<String> {
    let keys: Vec<String> = match value {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => ["name", "key", "label"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    keys.into_iter().filter(|k| !k.is_empty()).unique().collect()
}

/// Master macro to declare the built-in flow kinds, their registration, and
/// their creation by type name.
macro_rules! define_flow_kinds {
    ( $( ($struct_name:ident, $workflow_type:literal) ),* $(,)? ) => {
        $(
            pub struct $struct_name;
            impl $struct_name {
                pub const TYPE: &'static str = $workflow_type;
            }
        )*

        pub(super) fn register_default_kinds(registry: &mut AHashMap<String, Box<dyn FlowKind>>) {
            $( registry.insert($workflow_type.to_string(), Box::new($struct_name)); )*
        }

        pub(super) fn create_kind_by_name(name: &str) -> Option<Box<dyn FlowKind>> {
            match name {
                $( $workflow_type => Some(Box::new($struct_name)), )*
                _ => None,
            }
        }
    };
}

define_flow_kinds! {
    (StartKind, "start"),
    (EndKind, "end"),
    (DecisionKind, "decision"),
    (MergeKind, "merge"),
    (ParallelKind, "parallel"),
    (LoopKind, "loop"),
    (GenericKind, "generic"),
}

impl FlowKind for StartKind {
    fn workflow_type(&self) -> &str {
        Self::TYPE
    }

    fn topology(&self, _config: &Map<String, Value>) -> SlotTopology {
        SlotTopology::new().output(FLOW_SLOT)
    }
}

impl FlowKind for EndKind {
    fn workflow_type(&self) -> &str {
        Self::TYPE
    }

    fn topology(&self, _config: &Map<String, Value>) -> SlotTopology {
        SlotTopology::new().input(FLOW_SLOT)
    }
}

pub const DEFAULT_BRANCH: &str = "default";

impl FlowKind for DecisionKind {
    fn workflow_type(&self) -> &str {
        Self::TYPE
    }

    fn topology(&self, config: &Map<String, Value>) -> SlotTopology {
        let branches = config_keys(config.get("branches"));
        let topology = SlotTopology::new().input(FLOW_SLOT);
        if branches.is_empty() {
            return topology.output(DEFAULT_BRANCH);
        }
        branches
            .into_iter()
            .fold(topology, |t, branch| t.output(branch))
    }

    fn bind_source(&self, node: &NodeInstance, hint: &BindingHint) -> Option<usize> {
        hint.candidates()
            .iter()
            .find_map(|candidate| node.output_index(candidate))
            .or_else(|| node.output_index(DEFAULT_BRANCH))
    }
}

pub const WAIT_FOR: &str = "wait_for";
pub const MERGED_SLOT: &str = "merged";

impl FlowKind for MergeKind {
    fn workflow_type(&self) -> &str {
        Self::TYPE
    }

    fn topology(&self, config: &Map<String, Value>) -> SlotTopology {
        let mut names = config_keys(config.get(WAIT_FOR));
        let mut n = names.len();
        while names.len() < 2 {
            let padded = format!("input_{}", n);
            if !names.contains(&padded) {
                names.push(padded);
            }
            n += 1;
        }
        let mut topology = names
            .iter()
            .fold(SlotTopology::new(), |t, name| t.input(name.as_str()))
            .output(MERGED_SLOT);
        topology.groups.push((WAIT_FOR.to_string(), names));
        topology
    }

    fn bind_source(&self, node: &NodeInstance, _hint: &BindingHint) -> Option<usize> {
        node.output_index(MERGED_SLOT)
    }

    fn bind_target(&self, node: &NodeInstance, _hint: &BindingHint) -> Option<usize> {
        let wait_for = node.multi_input_slots.get(WAIT_FOR).into_iter();
        let others = node
            .multi_input_slots
            .iter()
            .filter(|(field, _)| field.as_str() != WAIT_FOR)
            .map(|(_, indices)| indices);
        wait_for
            .chain(others)
            .flatten()
            .copied()
            .find(|i| node.inputs.get(*i).is_some_and(|s| s.link.is_none()))
            .or_else(|| node.input_index(FLOW_SLOT))
    }
}

pub const MIN_PARALLEL_BRANCHES: usize = 2;

impl FlowKind for ParallelKind {
    fn workflow_type(&self) -> &str {
        Self::TYPE
    }

    fn topology(&self, config: &Map<String, Value>) -> SlotTopology {
        let count = match config.get("branches") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
            other => config_keys(other).len(),
        }
        .max(MIN_PARALLEL_BRANCHES);
        (0..count).fold(SlotTopology::new().input(FLOW_SLOT), |t, n| {
            t.output(format!("branch_{}", n))
        })
    }

    fn bind_source(&self, node: &NodeInstance, _hint: &BindingHint) -> Option<usize> {
        node.outputs
            .iter()
            .position(|s| s.name.starts_with("branch_") && s.links.is_empty())
    }
}

pub const BODY_SLOT: &str = "body";
pub const EXIT_SLOT: &str = "exit";
const EXIT_WORDS: &[&str] = &["exit", "done", "complete"];

impl FlowKind for LoopKind {
    fn workflow_type(&self) -> &str {
        Self::TYPE
    }

    fn topology(&self, _config: &Map<String, Value>) -> SlotTopology {
        SlotTopology::new()
            .input(FLOW_SLOT)
            .output(BODY_SLOT)
            .output(EXIT_SLOT)
    }

    fn bind_source(&self, node: &NodeInstance, hint: &BindingHint) -> Option<usize> {
        let text = hint.text();
        if EXIT_WORDS.iter().any(|w| text.contains(w)) {
            node.output_index(EXIT_SLOT)
        } else {
            node.output_index(BODY_SLOT)
        }
    }
}

impl FlowKind for GenericKind {
    fn workflow_type(&self) -> &str {
        Self::TYPE
    }

    fn topology(&self, _config: &Map<String, Value>) -> SlotTopology {
        SlotTopology::new().input(FLOW_SLOT).output(FLOW_SLOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(topology: &SlotTopology) -> (Vec<&str>, Vec<&str>) {
        (
            topology.inputs.iter().map(|s| s.name.as_str()).collect(),
            topology.outputs.iter().map(|s| s.name.as_str()).collect(),
        )
    }

    #[test]
    fn test_config_keys_shapes() {
        assert_eq!(config_keys(Some(&json!({"a": 1, "b": 2}))), vec!["a", "b"]);
        assert_eq!(
            config_keys(Some(&json!(["x", {"name": "y"}, 3, "x"]))),
            vec!["x", "y"]
        );
        assert!(config_keys(None).is_empty());
    }

    #[test]
    fn test_merge_pads_to_two_inputs() {
        let config = json!({"wait_for": ["a"]});
        let topology = MergeKind.topology(config.as_object().unwrap());
        assert_eq!(names(&topology), (vec!["a", "input_1"], vec!["merged"]));
        assert_eq!(
            topology.groups,
            vec![("wait_for".to_string(), vec!["a".to_string(), "input_1".to_string()])]
        );
    }

    #[test]
    fn test_parallel_accepts_count() {
        let config = json!({"branches": 3});
        let topology = ParallelKind.topology(config.as_object().unwrap());
        assert_eq!(topology.outputs.len(), 3);
        assert_eq!(topology.outputs[2].name, "branch_2");
    }

    #[test]
    fn test_create_kind_by_name() {
        assert_eq!(create_kind_by_name("loop").unwrap().workflow_type(), "loop");
        assert!(create_kind_by_name("llm").is_none());
    }
}
