use super::document::{DocPosition, EdgeDoc, NodeDoc, WorkflowDocument};
use crate::graph::{Graph, NodeId, NodeInstance, SlotOrigin};
use ahash::AHashMap;
use serde_json::{Map, Value};
use tracing::debug;

/// Turns a graph back into a workflow document.
pub struct WorkflowExporter;

impl WorkflowExporter {
    /// Live nodes are written in id order and indexed densely, so removed
    /// nodes simply disappear from the document.
    pub fn export(graph: &Graph) -> WorkflowDocument {
        let index: AHashMap<NodeId, usize> = graph
            .node_ids()
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();

        let nodes: Vec<NodeDoc> = graph.nodes().map(export_node).collect();
        let edges: Vec<EdgeDoc> = graph
            .edges()
            .filter_map(|edge| {
                let source = graph.node(edge.source)?;
                let target = graph.node(edge.target)?;
                Some(EdgeDoc {
                    source: *index.get(&edge.source)?,
                    target: *index.get(&edge.target)?,
                    source_slot: source.outputs.get(edge.source_slot)?.name.clone(),
                    target_slot: target.inputs.get(edge.target_slot)?.name.clone(),
                    condition: edge.condition.clone(),
                    label: edge.label.clone(),
                    extra: edge.extra.clone(),
                })
            })
            .collect();

        debug!(nodes = nodes.len(), edges = edges.len(), "exported workflow");
        WorkflowDocument {
            info: graph.info.clone(),
            options: graph.options.clone(),
            nodes,
            edges,
            variables: graph.variables.clone(),
        }
    }

    pub fn export_value(graph: &Graph) -> Result<Value, serde_json::Error> {
        Self::export(graph).to_value()
    }

    pub fn export_string(graph: &Graph) -> Result<String, serde_json::Error> {
        Self::export(graph).to_json_pretty()
    }
}

fn export_node(node: &NodeInstance) -> NodeDoc {
    let mut fields = Map::new();

    for (name, value) in &node.constant_fields {
        if !node.unset_constants.contains(name) {
            fields.insert(name.clone(), value.clone());
        }
    }

    for (index, native) in &node.native_inputs {
        if let Some(slot) = node.inputs.get(*index) {
            if slot.origin == SlotOrigin::Schema && slot.link.is_none() {
                fields.insert(slot.name.clone(), native.value.clone());
            }
        }
    }

    let groups = node
        .multi_input_slots
        .iter()
        .filter(|(_, indices)| schema_group(indices, |i| node.inputs.get(i).map(|s| s.origin)))
        .chain(
            node.multi_output_slots
                .iter()
                .filter(|(_, indices)| schema_group(indices, |i| node.outputs.get(i).map(|s| s.origin))),
        );
    for (field, _) in groups {
        let keys = node.multi_slot_keys(field).unwrap_or_default();
        if !keys.is_empty() {
            fields.insert(
                field.clone(),
                Value::Array(keys.into_iter().map(Value::String).collect()),
            );
        }
    }

    for (key, value) in &node.properties {
        fields.entry(key.clone()).or_insert_with(|| value.clone());
    }

    NodeDoc {
        node_type: node.workflow_type.clone(),
        position: Some(DocPosition {
            x: round2(node.position.x),
            y: round2(node.position.y),
        }),
        fields,
        extra: export_meta(node),
    }
}

fn schema_group(indices: &[usize], origin: impl Fn(usize) -> Option<SlotOrigin>) -> bool {
    !indices
        .iter()
        .any(|i| origin(*i) == Some(SlotOrigin::Control))
}

fn export_meta(node: &NodeInstance) -> Option<Map<String, Value>> {
    let mut extra = node.meta.extra.clone();
    if let Some(title) = &node.meta.title {
        if *title != node.workflow_type {
            extra.insert("title".to_string(), Value::String(title.clone()));
        }
    }
    if let Some(color) = &node.meta.color {
        extra.insert("color".to_string(), Value::String(color.clone()));
    }
    (!extra.is_empty()).then_some(extra)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(10.0 / 3.0), 3.33);
        assert_eq!(round2(-42.0), -42.0);
    }
}
