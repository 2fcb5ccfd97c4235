//! Integration tests for keiro
//!
//! End-to-end tests that verify the complete functionality works together.
//!
mod common;
use common::*;
use keiro::prelude::*;
use serde_json::json;
use std::fs;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_start_decision_end_document() {
        let registry = registry();
        let document = json!({
            "nodes": [
                {"type": "start"},
                {"type": "decision", "branches": {"yes": {}, "no": {}}},
                {"type": "end"}
            ],
            "edges": [
                {"source": 0, "target": 1, "source_slot": "flow", "target_slot": "flow"},
                {"source": 1, "target": 2, "source_slot": "yes", "target_slot": "flow"}
            ]
        });

        let outcome = import(&registry, &document);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        assert_eq!(outcome.graph.node_count(), 3);

        let decision = node_at(&outcome, 1);
        assert_eq!(output_names(decision), vec!["yes", "no"]);
        assert_eq!(input_names(decision), vec!["flow"]);

        let edge = outcome.graph.edge(2).expect("second edge exists");
        assert_eq!(edge.source, decision.id);
        assert_eq!(edge.source_slot, decision.output_index("yes").unwrap());
        let end = node_at(&outcome, 2);
        assert_eq!(edge.target, end.id);
        assert_eq!(edge.target_slot, end.input_index("flow").unwrap());
        assert_eq!(end.inputs[edge.target_slot].link, Some(2));
        assert_eq!(decision.outputs[edge.source_slot].links, vec![2]);
    }

    #[test]
    fn test_import_layout_overlay_export_pipeline() {
        let registry = registry();
        let text = r#"{
            "info": {"name": "research"},
            "nodes": [
                {"type": "start"},
                {"type": "parallel", "branches": 2},
                {"type": "web_search", "query": "rust graphs"},
                {"type": "llm", "prompt": "Summarize", "tools": ["search"]},
                {"type": "merge", "wait_for": ["left", "right"], "strategy": "concat"},
                {"type": "end"}
            ],
            "edges": [
                {"source": 0, "target": 1},
                {"source": 1, "target": 2},
                {"source": 1, "target": 3},
                {"source": 2, "target": 4},
                {"source": 3, "target": 4},
                {"source": 4, "target": 5}
            ]
        }"#;
        let importer = WorkflowImporter::builder(&registry, SCHEMA_NAME)
            .with_type_mapping("web_search", "WebSearchConfig")
            .build()
            .unwrap();
        let outcome = importer.import_str(text).unwrap();
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        let mut graph = outcome.graph;
        assert_eq!(graph.edge_count(), 6);

        let merge = graph.node_at_index(4).unwrap();
        let merge_targets: Vec<usize> = graph.incoming(merge).map(|e| e.target_slot).collect();
        assert_eq!(merge_targets, vec![0, 1]);

        graph.apply_layout(LayoutChoice::Layered, &LayoutOptions::default());
        let xs: Vec<f64> = graph.nodes().map(|n| n.position.x).collect();
        assert_eq!(xs, vec![0.0, 300.0, 600.0, 600.0, 900.0, 1200.0]);

        let log: EventLog = serde_json::from_value(json!([
            {"type": "workflow.start"},
            {"type": "node.end", "node_id": 0},
            {"type": "node.end", "node_id": 1},
            {"type": "node.start", "node_id": 3},
            {"type": "node.end", "node_id": 2, "status": "failed", "error": "timeout"}
        ]))
        .unwrap();
        let mut overlay = ExecutionOverlay::new();
        assert!(overlay.apply_log(&mut graph, &log).is_empty());
        assert_eq!(overlay.workflow_status(), Some(ExecutionStatus::Running));

        let exported = WorkflowExporter::export_value(&graph).unwrap();
        assert_eq!(exported["info"], json!({"name": "research"}));
        assert_eq!(exported["nodes"][2]["type"], json!("web_search"));
        assert_eq!(exported["nodes"][3]["tools"], json!(["search"]));
        assert_eq!(exported["nodes"][4]["wait_for"], json!(["left", "right"]));
        assert_eq!(exported["nodes"][4]["strategy"], json!("concat"));
        assert_eq!(exported["nodes"][1]["position"], json!({"x": 300.0, "y": 75.0}));
        let slots: Vec<(&str, &str)> = exported["edges"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| (e["source_slot"].as_str().unwrap(), e["target_slot"].as_str().unwrap()))
            .collect();
        assert_eq!(
            slots,
            vec![
                ("flow", "flow"),
                ("branch_0", "flow"),
                ("branch_1", "flow"),
                ("flow", "left"),
                ("flow", "right"),
                ("merged", "flow"),
            ]
        );

        // Execution state never reaches the document.
        assert!(!exported.to_string().contains("timeout"));
    }

    #[test]
    fn test_snapshot_keeps_ids_and_overlay_free_state() {
        let registry = registry();
        let document = json!({
            "nodes": [{"type": "start"}, {"type": "llm"}, {"type": "end"}],
            "edges": [{"source": 0, "target": 1}, {"source": 1, "target": 2}]
        });
        let mut graph = import(&registry, &document).graph;
        let middle = graph.node_at_index(1).unwrap();
        graph.remove_node(middle).unwrap();
        let start = graph.node_at_index(0).unwrap();
        let end = graph.node_at_index(1).unwrap();
        let edge = graph.connect_named(start, "flow", end, "flow").unwrap();
        assert_eq!(edge, 3);

        let path = std::env::temp_dir().join("keiro_integration_snapshot.json");
        let path = path.to_str().unwrap();
        GraphSnapshot::capture(&graph).save(path).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("\"last_node_id\": 3"));

        let restored = GraphSnapshot::from_file(path).unwrap().restore(&registry);
        assert!(restored.diagnostics.is_empty(), "{:?}", restored.diagnostics);
        assert_eq!(restored.graph.node_ids(), vec![1, 3]);
        assert_eq!(restored.graph.edge(3).map(|e| (e.source, e.target)), Some((1, 3)));

        // Counters continue where the saved graph left off.
        let mut graph = restored.graph;
        let next = graph.add_node(create_node(&registry, "EndNode", json!({})));
        assert_eq!(next, 4);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_export_of_import_is_stable_through_json_text() {
        let registry = registry();
        let document = json!({
            "nodes": [
                {"type": "start"},
                {"type": "loop", "max_iterations": 4},
                {"type": "http", "url": "https://example.com", "headers": {"accept": "json"}},
                {"type": "end"}
            ],
            "edges": [
                {"source": 0, "target": 1},
                {"source": 1, "target": 2, "label": "each"},
                {"source": 1, "target": 3, "label": "done"}
            ]
        });
        let first = WorkflowExporter::export_string(&import(&registry, &document).graph).unwrap();
        let importer = WorkflowImporter::new(&registry, SCHEMA_NAME).unwrap();
        let second = WorkflowExporter::export_string(&importer.import_str(&first).unwrap().graph).unwrap();
        assert_eq!(first, second);

        let value: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(value["nodes"][1]["max_iterations"], json!(4));
        assert_eq!(value["nodes"][2]["headers"], json!({"accept": "json"}));
        assert_eq!(value["edges"][1]["source_slot"], json!("body"));
        assert_eq!(value["edges"][2]["source_slot"], json!("exit"));
    }
}
