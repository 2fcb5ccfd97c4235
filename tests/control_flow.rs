mod common;
use common::*;
use keiro::control_flow::{BindingHint, FLOW_TYPE, SlotTopology};
use keiro::graph::{InputSlot, OutputSlot, SlotOrigin};
use keiro::prelude::*;
use serde_json::{Map, Value, json};

/// An approval gate with explicit approve/reject outputs.
struct ApprovalKind;

impl FlowKind for ApprovalKind {
    fn workflow_type(&self) -> &str {
        "approval"
    }

    fn topology(&self, _config: &Map<String, Value>) -> SlotTopology {
        let flow = TypeTree::basic(FLOW_TYPE);
        SlotTopology {
            inputs: vec![InputSlot::new("flow", flow.clone(), SlotOrigin::Control)],
            outputs: vec![
                OutputSlot::new("approved", flow.clone(), SlotOrigin::Control),
                OutputSlot::new("rejected", flow, SlotOrigin::Control),
            ],
            groups: Vec::new(),
        }
    }

    fn bind_source(&self, node: &NodeInstance, hint: &BindingHint) -> Option<usize> {
        if hint.text().contains("reject") {
            node.output_index("rejected")
        } else {
            node.output_index("approved")
        }
    }
}

fn add(graph: &mut Graph, registry: &SchemaRegistry, model: &str, config: Value) -> NodeId {
    graph.add_node(create_node(registry, model, config))
}

#[test]
fn test_topologies_per_kind() {
    let registry = registry();
    let start = create_node(&registry, "StartNode", json!({}));
    assert_eq!((input_names(&start), output_names(&start)), (vec![], vec!["flow"]));

    let end = create_node(&registry, "EndNode", json!({}));
    assert_eq!((input_names(&end), output_names(&end)), (vec!["flow"], vec![]));

    let decision = create_node(&registry, "DecisionNode", json!({"branches": {"gt5": {}, "default": {}}}));
    assert_eq!(input_names(&decision), vec!["flow"]);
    assert_eq!(output_names(&decision), vec!["gt5", "default"]);

    let bare = create_node(&registry, "DecisionNode", json!({}));
    assert_eq!(output_names(&bare), vec!["default"]);

    let merge = create_node(&registry, "MergeNode", json!({"wait_for": ["a", "b", "c"]}));
    assert_eq!(input_names(&merge), vec!["a", "b", "c"]);
    assert_eq!(output_names(&merge), vec!["merged"]);
    assert_eq!(merge.multi_input_slots.get("wait_for"), Some(&vec![0, 1, 2]));

    let padded = create_node(&registry, "MergeNode", json!({}));
    assert_eq!(input_names(&padded), vec!["input_0", "input_1"]);

    let parallel = create_node(&registry, "ParallelNode", json!({"branches": 3}));
    assert_eq!(output_names(&parallel), vec!["branch_0", "branch_1", "branch_2"]);
    let narrow = create_node(&registry, "ParallelNode", json!({"branches": ["only"]}));
    assert_eq!(output_names(&narrow), vec!["branch_0", "branch_1"]);

    let looped = create_node(&registry, "LoopNode", json!({}));
    assert_eq!(input_names(&looped), vec!["flow", "max_iterations"]);
    assert_eq!(output_names(&looped), vec!["body", "exit"]);
}

#[test]
fn test_control_slots_shift_schema_indices() {
    let registry = registry();
    let node = create_node(&registry, "LlmNode", json!({"prompt": "x", "tools": ["a"]}));
    // flow is prepended, so prompt moves from 0 to 1.
    assert!(node.native_inputs.contains_key(&1));
    assert!(!node.native_inputs.contains_key(&0));
    assert_eq!(node.multi_input_slots.get("tools"), Some(&vec![5]));
}

#[test]
fn test_decision_binds_by_condition_value() {
    let registry = registry();
    let binder = ControlFlowBinder::new();
    let mut graph = Graph::new();
    let decision = add(&mut graph, &registry, "DecisionNode", json!({"branches": {"gt5": {}, "default": {}}}));
    let hit = add(&mut graph, &registry, "LlmNode", json!({}));
    let miss = add(&mut graph, &registry, "LlmNode", json!({}));

    let bound = binder
        .bind(&mut graph, decision, hit, Some(EdgeCondition::equals("score", "gt5")), None)
        .unwrap();
    assert!(bound.diagnostics.is_empty());
    let edge = graph.edge(bound.edge_id).unwrap();
    assert_eq!(edge.source_slot, 0);
    assert_eq!(edge.target_slot, 0);

    let fallback = binder
        .bind(&mut graph, decision, miss, Some(EdgeCondition::equals("score", "lt2")), None)
        .unwrap();
    assert!(fallback.diagnostics.is_empty());
    assert_eq!(graph.edge(fallback.edge_id).unwrap().source_slot, 1);
}

#[test]
fn test_decision_binds_by_edge_label() {
    let registry = registry();
    let binder = ControlFlowBinder::new();
    let mut graph = Graph::new();
    let decision = add(&mut graph, &registry, "DecisionNode", json!({"branches": ["yes", "no"]}));
    let target = add(&mut graph, &registry, "EndNode", json!({}));

    let bound = binder
        .bind(&mut graph, decision, target, None, Some("no".to_string()))
        .unwrap();
    assert_eq!(graph.edge(bound.edge_id).unwrap().source_slot, 1);
}

#[test]
fn test_unmatched_decision_falls_back_to_slot_zero() {
    let registry = registry();
    let binder = ControlFlowBinder::new();
    let mut graph = Graph::new();
    let decision = add(&mut graph, &registry, "DecisionNode", json!({"branches": ["yes", "no"]}));
    let target = add(&mut graph, &registry, "EndNode", json!({}));

    let bound = binder
        .bind(&mut graph, decision, target, None, Some("maybe".to_string()))
        .unwrap();
    assert_eq!(graph.edge(bound.edge_id).unwrap().source_slot, 0);
    assert!(matches!(
        bound.diagnostics.as_slice(),
        [Diagnostic::UnmatchedBinding { label, .. }] if label == "maybe"
    ));
}

#[test]
fn test_loop_exit_words() {
    let registry = registry();
    let binder = ControlFlowBinder::new();
    let mut graph = Graph::new();
    let head = add(&mut graph, &registry, "LoopNode", json!({}));
    let body = add(&mut graph, &registry, "LlmNode", json!({}));
    let after = add(&mut graph, &registry, "EndNode", json!({}));

    let b = binder.bind(&mut graph, head, body, None, Some("next item".into())).unwrap();
    let e = binder
        .bind(&mut graph, head, after, None, Some("When DONE".into()))
        .unwrap();
    assert_eq!(graph.edge(b.edge_id).unwrap().source_slot, 0);
    assert_eq!(graph.edge(e.edge_id).unwrap().source_slot, 1);
}

#[test]
fn test_parallel_takes_first_free_branch() {
    let registry = registry();
    let binder = ControlFlowBinder::new();
    let mut graph = Graph::new();
    let fork = add(&mut graph, &registry, "ParallelNode", json!({"branches": 2}));
    let targets: Vec<NodeId> = (0..3)
        .map(|_| add(&mut graph, &registry, "LlmNode", json!({})))
        .collect();

    let slots: Vec<(usize, usize)> = targets
        .iter()
        .map(|t| {
            let bound = binder.bind(&mut graph, fork, *t, None, None).unwrap();
            (graph.edge(bound.edge_id).unwrap().source_slot, bound.diagnostics.len())
        })
        .collect();
    // Once every branch is taken, binding degrades to slot 0 with a warning.
    assert_eq!(slots, vec![(0, 0), (1, 0), (0, 1)]);
}

#[test]
fn test_merge_fills_wait_for_in_order() {
    let registry = registry();
    let binder = ControlFlowBinder::new();
    let mut graph = Graph::new();
    let merge = add(&mut graph, &registry, "MergeNode", json!({"wait_for": ["left", "right"]}));
    let left = add(&mut graph, &registry, "LlmNode", json!({}));
    let right = add(&mut graph, &registry, "LlmNode", json!({}));
    let next = add(&mut graph, &registry, "EndNode", json!({}));

    let a = binder.bind(&mut graph, left, merge, None, None).unwrap();
    let b = binder.bind(&mut graph, right, merge, None, None).unwrap();
    assert_eq!(graph.edge(a.edge_id).unwrap().target_slot, 0);
    assert_eq!(graph.edge(b.edge_id).unwrap().target_slot, 1);

    let out = binder.bind(&mut graph, merge, next, None, None).unwrap();
    assert_eq!(graph.edge(out.edge_id).unwrap().source_slot, 0);
    assert!(out.diagnostics.is_empty());
}

#[test]
fn test_generic_source_without_outputs_falls_back() {
    let registry = registry();
    let binder = ControlFlowBinder::new();
    let mut graph = Graph::new();
    let end = add(&mut graph, &registry, "EndNode", json!({}));
    let other = add(&mut graph, &registry, "LlmNode", json!({}));
    // End has no outputs at all, so even slot 0 does not exist.
    assert!(matches!(
        binder.bind(&mut graph, end, other, None, None),
        Err(GraphError::SlotNotFound { .. })
    ));
}

#[test]
fn test_custom_kind_and_alias() {
    let registry = registry();
    let binder = ControlFlowBinder::new()
        .with_kind(Box::new(ApprovalKind))
        .with_type_alias("switch", "decision");
    assert!(binder.has_kind("approval"));
    assert!(binder.has_kind("switch"));
    assert!(!binder.has_kind("llm"));

    let schema = registry.get(SCHEMA_NAME).unwrap();
    let factory = BlueprintFactory::new(SCHEMA_NAME, schema, &binder);
    let config = |v: Value| v.as_object().cloned().unwrap();

    let gate = factory
        .create_node("WebSearchConfig", &config(json!({"type": "approval"})))
        .unwrap();
    assert_eq!(output_names(&gate), vec!["approved", "rejected"]);

    let switch = factory
        .create_node("DecisionNode", &config(json!({"type": "switch", "branches": ["a"]})))
        .unwrap();
    assert_eq!(output_names(&switch), vec!["a"]);

    let mut graph = Graph::new();
    let gate = graph.add_node(gate);
    let end = graph.add_node(create_node(&registry, "EndNode", json!({})));
    let bound = binder
        .bind(&mut graph, gate, end, None, Some("rejected by reviewer".into()))
        .unwrap();
    assert_eq!(graph.edge(bound.edge_id).unwrap().source_slot, 1);
}

#[test]
fn test_condition_labels() {
    assert_eq!(EdgeCondition::equals("status", "ok").display_label(), "status == \"ok\"");
    assert_eq!(EdgeCondition::contains("text", "refund").display_label(), "text contains \"refund\"");
    assert_eq!(EdgeCondition::greater("score", 5).display_label(), "score > 5");
    assert_eq!(EdgeCondition::less("score", 0.5).display_label(), "score < 0.5");
    assert_eq!(EdgeCondition::custom("len(x) > 3").display_label(), "len(x) > 3");
    assert_eq!(EdgeCondition::always().display_label(), "always");
}

#[test]
fn test_condition_wire_format() {
    let condition: EdgeCondition =
        serde_json::from_value(json!({"type": "gt", "field": "score", "value": 5})).unwrap();
    assert_eq!(condition, EdgeCondition::greater("score", 5));
    assert_eq!(
        serde_json::to_value(&condition).unwrap(),
        json!({"type": "greater", "field": "score", "value": 5})
    );

    let unknown: EdgeCondition = serde_json::from_value(json!({"type": "regex", "value": "^a"})).unwrap();
    assert_eq!(serde_json::to_value(&unknown).unwrap()["type"], json!("regex"));
}
