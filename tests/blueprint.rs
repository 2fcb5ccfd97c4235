mod common;
use common::*;
use keiro::graph::{Position, Size, SlotOrigin};
use keiro::prelude::*;
use keiro::schema::NativeKind;
use serde_json::json;

#[test]
fn test_llm_node_slots_in_declaration_order() {
    let registry = registry();
    let node = create_node(&registry, "LlmNode", json!({"prompt": "Hi"}));

    assert_eq!(node.model_name, "LlmNode");
    assert_eq!(node.schema_name, SCHEMA_NAME);
    assert_eq!(node.workflow_type, "llm");
    assert_eq!(
        input_names(&node),
        vec!["flow", "prompt", "temperature", "retries", "context", "tools"]
    );
    assert_eq!(output_names(&node), vec!["flow", "response"]);
    assert_eq!(node.inputs[0].origin, SlotOrigin::Control);
    assert_eq!(node.inputs[1].origin, SlotOrigin::Schema);
}

#[test]
fn test_native_inputs_seeded_from_config_default_or_zero() {
    let registry = registry();
    let node = create_node(&registry, "LlmNode", json!({"prompt": "Hi"}));

    let native = |i: usize| node.native_inputs.get(&i).map(|n| (n.kind, n.value.clone()));
    assert_eq!(native(1), Some((NativeKind::String, json!("Hi"))));
    assert_eq!(native(2), Some((NativeKind::Float, json!(0.7))));
    assert_eq!(native(3), Some((NativeKind::Int, json!(3))));
    // `context` is a model type and can only be connected.
    assert_eq!(native(4), None);

    let http = create_node(&registry, "HttpNode", json!({}));
    let url = http.input_index("url").unwrap();
    assert_eq!(http.native_inputs[&url].value, json!(""));
    assert!(!http.native_inputs[&url].optional);
    let headers = http.input_index("headers").unwrap();
    assert_eq!(http.native_inputs[&headers].kind, NativeKind::Dict);
}

#[test]
fn test_constants_never_become_slots() {
    let registry = registry();
    let node = create_node(&registry, "LlmNode", json!({"model": "claude"}));
    assert_eq!(node.constant_fields.get("model"), Some(&json!("claude")));
    assert!(node.input_index("model").is_none());

    let defaulted = create_node(&registry, "LlmNode", json!({}));
    assert_eq!(defaulted.constant_fields.get("model"), Some(&json!("gpt-4o")));

    let merge = create_node(&registry, "MergeNode", json!({}));
    assert_eq!(merge.constant_fields.get("strategy"), Some(&json!("strategy")));
    assert!(merge.unset_constants.contains("strategy"));
    assert!(defaulted.unset_constants.is_empty());
}

#[test]
fn test_multi_input_expansion() {
    let registry = registry();
    let node = create_node(&registry, "LlmNode", json!({"tools": ["search", "calc"]}));

    let first = node.input_index("tools.search").unwrap();
    assert_eq!(node.input_index("tools.calc"), Some(first + 1));
    assert_eq!(node.multi_input_slots.get("tools"), Some(&vec![first, first + 1]));
    assert_eq!(node.inputs[first].type_tree, TypeTree::basic("str"));
    assert_eq!(
        node.multi_slot_keys("tools"),
        Some(vec!["search".to_string(), "calc".to_string()])
    );
    assert!(!node.properties.contains_key("tools"));
}

#[test]
fn test_multi_input_fallback_slot() {
    let registry = registry();
    let node = create_node(&registry, "LlmNode", json!({}));
    let index = node.input_index("tools").unwrap();
    assert_eq!(node.multi_input_slots.get("tools"), Some(&vec![index]));
    assert_eq!(node.multi_slot_keys("tools"), Some(vec![]));
}

#[test]
fn test_multi_output_expansion_from_object_keys() {
    let registry = registry();
    let node = create_node(
        &registry,
        "RouterNode",
        json!({"routes": {"billing": {}, "support": {}}}),
    );
    assert_eq!(output_names(&node), vec!["flow", "routes.billing", "routes.support"]);
    assert_eq!(node.multi_output_slots.get("routes"), Some(&vec![1, 2]));
    assert_eq!(input_names(&node), vec!["flow"]);
}

#[test]
fn test_meta_position_and_properties() {
    let registry = registry();
    let node = create_node(
        &registry,
        "LlmNode",
        json!({
            "position": {"x": 10.5, "y": -4},
            "extra": {"title": "Writer", "color": "#ffaa00", "pinned": true},
            "context": {"text": "ignored by slots"},
            "notes": "kept"
        }),
    );
    assert_eq!(node.position, Position::new(10.5, -4.0));
    assert_eq!(node.title(), "Writer");
    assert_eq!(node.meta.color.as_deref(), Some("#ffaa00"));
    assert_eq!(node.meta.extra.get("pinned"), Some(&json!(true)));
    assert_eq!(node.properties.get("notes"), Some(&json!("kept")));
    assert!(node.properties.contains_key("context"));
    assert!(!node.properties.contains_key("extra"));
    assert!(!node.properties.contains_key("position"));
}

#[test]
fn test_position_accepts_pair() {
    let registry = registry();
    let node = create_node(&registry, "StartNode", json!({"position": [3, 4]}));
    assert_eq!(node.position, Position::new(3.0, 4.0));
}

#[test]
fn test_size_follows_row_count() {
    let registry = registry();
    let node = create_node(&registry, "LlmNode", json!({"tools": ["a", "b", "c"]}));
    assert_eq!(node.size, Size::for_rows(8));
    let start = create_node(&registry, "StartNode", json!({}));
    assert_eq!(start.size, Size::for_rows(1));
    assert!(node.size.height > start.size.height);
}

#[test]
fn test_unknown_model_is_a_diagnostic() {
    let registry = registry();
    let binder = ControlFlowBinder::new();
    let factory = BlueprintFactory::new(SCHEMA_NAME, registry.get(SCHEMA_NAME).unwrap(), &binder);
    let result = factory.create_node("NopeNode", &serde_json::Map::new());
    assert_eq!(
        result.err(),
        Some(Diagnostic::ModelNotFound {
            schema: SCHEMA_NAME.to_string(),
            model: "NopeNode".to_string(),
        })
    );
}

#[test]
fn test_config_type_overrides_workflow_type() {
    let registry = registry();
    let node = create_node(&registry, "WebSearchConfig", json!({"type": "web_search"}));
    assert_eq!(node.workflow_type, "web_search");
    assert!(!node.properties.contains_key("type"));

    let untyped = create_node(&registry, "WebSearchConfig", json!({}));
    assert_eq!(untyped.workflow_type, "WebSearchConfig");
}
