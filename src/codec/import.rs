use super::document::EdgeDoc;
use crate::blueprint::{BlueprintFactory, read_position};
use crate::control_flow::{BindingHint, ControlFlowBinder, FlowKind};
use crate::error::{CodecError, Diagnostic, SlotDirection};
use crate::graph::{EdgeRequest, Graph, NodeId, Position};
use crate::registry::SchemaRegistry;
use crate::schema::ParsedSchema;
use ahash::AHashMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const GRID_PITCH_X: f64 = 250.0;
pub const GRID_PITCH_Y: f64 = 150.0;

/// Model-name suffixes tried after case conversion, in order.
const MODEL_SUFFIXES: &[&str] = &["Config", "Node"];

/// A freshly imported graph.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub graph: Graph,
    /// Node id for each document index; `None` where the node was skipped.
    pub node_ids: Vec<Option<NodeId>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// What an in-place import reports once the graph has been swapped in.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub node_ids: Vec<Option<NodeId>>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ImporterBuilder<'a> {
    registry: &'a SchemaRegistry,
    schema_name: String,
    type_mappings: AHashMap<String, String>,
    binder: ControlFlowBinder,
}

impl<'a> ImporterBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry, schema_name: &str) -> Self {
        Self {
            registry,
            schema_name: schema_name.to_string(),
            type_mappings: AHashMap::new(),
            binder: ControlFlowBinder::new(),
        }
    }

    /// Maps a document `type` string straight to a model name, ahead of
    /// any derived mapping.
    pub fn with_type_mapping(mut self, document_type: &str, model_name: &str) -> Self {
        self.type_mappings
            .insert(document_type.to_string(), model_name.to_string());
        self
    }

    pub fn with_flow_kind(mut self, kind: Box<dyn FlowKind>) -> Self {
        self.binder = self.binder.with_kind(kind);
        self
    }

    /// Gives `alias` the slot topology of a built-in workflow type.
    pub fn with_flow_alias(mut self, alias: &str, workflow_type: &str) -> Self {
        self.binder = self.binder.with_type_alias(alias, workflow_type);
        self
    }

    pub fn with_binder(mut self, binder: ControlFlowBinder) -> Self {
        self.binder = binder;
        self
    }

    pub fn build(self) -> Result<WorkflowImporter<'a>, CodecError> {
        let schema = self
            .registry
            .get(&self.schema_name)
            .ok_or_else(|| CodecError::UnknownSchema(self.schema_name.clone()))?;
        let mut type_map = schema.type_map();
        type_map.extend(self.type_mappings);
        Ok(WorkflowImporter {
            schema,
            schema_name: self.schema_name,
            type_map,
            binder: self.binder,
        })
    }
}

/// Turns workflow documents into graphs for one registered schema.
pub struct WorkflowImporter<'a> {
    schema: &'a ParsedSchema,
    schema_name: String,
    type_map: AHashMap<String, String>,
    binder: ControlFlowBinder,
}

impl<'a> WorkflowImporter<'a> {
    pub fn builder(registry: &'a SchemaRegistry, schema_name: &str) -> ImporterBuilder<'a> {
        ImporterBuilder::new(registry, schema_name)
    }

    pub fn new(registry: &'a SchemaRegistry, schema_name: &str) -> Result<Self, CodecError> {
        Self::builder(registry, schema_name).build()
    }

    pub fn binder(&self) -> &ControlFlowBinder {
        &self.binder
    }

    /// Resolves a document `type` to a model name: the explicit type table
    /// first, then the PascalCase form, then that form with each known
    /// suffix, then the type verbatim. The first hit wins.
    pub fn resolve_model(&self, type_name: &str) -> Option<String> {
        if let Some(model) = self.type_map.get(type_name) {
            if self.schema.model(model).is_some() {
                return Some(model.clone());
            }
        }
        let pascal = pascal_case(type_name);
        std::iter::once(pascal.clone())
            .chain(MODEL_SUFFIXES.iter().map(|suffix| format!("{}{}", pascal, suffix)))
            .chain(std::iter::once(type_name.to_string()))
            .find(|candidate| self.schema.model(candidate).is_some())
    }

    pub fn import_str(&self, text: &str) -> Result<ImportOutcome, CodecError> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| CodecError::JsonParseError(e.to_string()))?;
        self.import(&document)
    }

    /// Imports into `graph`, replacing its contents only if the document is
    /// accepted. A rejected document leaves `graph` as it was.
    pub fn import_into(&self, graph: &mut Graph, document: &Value) -> Result<ImportReport, CodecError> {
        let outcome = self.import(document)?;
        *graph = outcome.graph;
        Ok(ImportReport {
            node_ids: outcome.node_ids,
            diagnostics: outcome.diagnostics,
        })
    }

    /// Builds a new graph from `document`: all nodes first, then all edges.
    pub fn import(&self, document: &Value) -> Result<ImportOutcome, CodecError> {
        let root = document.as_object().ok_or(CodecError::NotAnObject)?;
        let nodes = root
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or(CodecError::MissingArray("nodes"))?;
        let edges = root
            .get("edges")
            .and_then(Value::as_array)
            .ok_or(CodecError::MissingArray("edges"))?;

        let mut graph = Graph::new();
        graph.info = root.get("info").cloned();
        graph.options = root.get("options").cloned();
        graph.variables = root.get("variables").cloned();

        let mut diagnostics = Vec::new();
        let factory = BlueprintFactory::new(&self.schema_name, self.schema, &self.binder);
        let columns = grid_columns(nodes.len());
        let empty = Map::new();

        let node_ids: Vec<Option<NodeId>> = nodes
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let config = raw.as_object().unwrap_or(&empty);
                let Some(type_name) = config.get("type").and_then(Value::as_str) else {
                    diagnostics.push(Diagnostic::MissingNodeType { index });
                    return None;
                };
                let Some(model) = self.resolve_model(type_name) else {
                    diagnostics.push(Diagnostic::UnresolvedNodeType {
                        index,
                        type_name: type_name.to_string(),
                    });
                    return None;
                };
                match factory.create_node(&model, config) {
                    Ok(mut node) => {
                        if read_position(config.get("position")).is_none() {
                            node.position = grid_position(index, columns);
                        }
                        Some(graph.add_node(node))
                    }
                    Err(diagnostic) => {
                        diagnostics.push(diagnostic);
                        None
                    }
                }
            })
            .collect();

        for (index, raw) in edges.iter().enumerate() {
            self.import_edge(&mut graph, &node_ids, index, raw, &mut diagnostics);
        }

        for diagnostic in &diagnostics {
            warn!(schema = %self.schema_name, "{}", diagnostic);
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            diagnostics = diagnostics.len(),
            "imported workflow"
        );
        Ok(ImportOutcome {
            graph,
            node_ids,
            diagnostics,
        })
    }

    /// Creates one document edge, recording a diagnostic when it is dropped,
    /// bound by fallback, or displaces an earlier edge.
    fn import_edge(
        &self,
        graph: &mut Graph,
        node_ids: &[Option<NodeId>],
        index: usize,
        raw: &Value,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if let Some(diagnostic) = self.connect_edge(graph, node_ids, index, raw, diagnostics) {
            diagnostics.push(diagnostic);
        }
    }

    /// Returns the diagnostic that ends the edge early or records its
    /// fallback binding; a replaced link is pushed to `diagnostics` directly.
    fn connect_edge(
        &self,
        graph: &mut Graph,
        node_ids: &[Option<NodeId>],
        index: usize,
        raw: &Value,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<Diagnostic> {
        let edge: EdgeDoc = match serde_json::from_value(raw.clone()) {
            Ok(edge) => edge,
            Err(e) => {
                return Some(Diagnostic::MalformedEdge {
                    index,
                    message: e.to_string(),
                });
            }
        };
        let endpoint = |node_index: usize| {
            node_ids
                .get(node_index)
                .copied()
                .flatten()
                .ok_or(Diagnostic::MissingEdgeEndpoint { index, node_index })
        };
        let source = match endpoint(edge.source) {
            Ok(id) => id,
            Err(diagnostic) => return Some(diagnostic),
        };
        let target = match endpoint(edge.target) {
            Ok(id) => id,
            Err(diagnostic) => return Some(diagnostic),
        };

        let hint = BindingHint::new(edge.condition.as_ref(), edge.label.as_deref());
        let mut fallback = None;
        let (Some(source_node), Some(target_node)) = (graph.node(source), graph.node(target))
        else {
            return Some(Diagnostic::MissingEdgeEndpoint {
                index,
                node_index: edge.source,
            });
        };
        let source_slot = if edge.source_slot.is_empty() {
            let (slot, diagnostic) = self.binder.resolve_source_slot(source_node, &hint);
            fallback = fallback.or(diagnostic);
            slot
        } else {
            match source_node.output_index(&edge.source_slot) {
                Some(slot) => slot,
                None => {
                    return Some(Diagnostic::MissingSlot {
                        index,
                        node_index: edge.source,
                        direction: SlotDirection::Output,
                        slot: edge.source_slot,
                    });
                }
            }
        };
        let target_slot = if edge.target_slot.is_empty() {
            let (slot, diagnostic) = self.binder.resolve_target_slot(target_node, &hint);
            fallback = fallback.or(diagnostic);
            slot
        } else {
            match target_node.input_index(&edge.target_slot) {
                Some(slot) => slot,
                None => {
                    return Some(Diagnostic::MissingSlot {
                        index,
                        node_index: edge.target,
                        direction: SlotDirection::Input,
                        slot: edge.target_slot,
                    });
                }
            }
        };

        if let Some(slot) = target_node.inputs.get(target_slot) {
            if slot.link.is_some() && edge.source != edge.target {
                diagnostics.push(Diagnostic::ReplacedEdge {
                    index,
                    node_index: edge.target,
                    slot: slot.name.clone(),
                });
            }
        }

        let request = EdgeRequest {
            source,
            source_slot,
            target,
            target_slot,
            condition: edge.condition,
            label: edge.label,
            extra: edge.extra,
        };
        match graph.connect(request) {
            Ok(_) => fallback,
            Err(e) => Some(Diagnostic::MalformedEdge {
                index,
                message: e.to_string(),
            }),
        }
    }
}

/// `snake_case` or `kebab-case` to `PascalCase`; existing capitals are kept.
pub fn pascal_case(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn grid_columns(count: usize) -> usize {
    ((count as f64).sqrt().ceil() as usize).max(1)
}

fn grid_position(index: usize, columns: usize) -> Position {
    Position::new(
        (index % columns) as f64 * GRID_PITCH_X,
        (index / columns) as f64 * GRID_PITCH_Y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("llm"), "Llm");
        assert_eq!(pascal_case("http_request"), "HttpRequest");
        assert_eq!(pascal_case("web-search"), "WebSearch");
        assert_eq!(pascal_case("AlreadyPascal"), "AlreadyPascal");
    }

    #[test]
    fn test_grid_fallback() {
        assert_eq!(grid_columns(5), 3);
        assert_eq!(grid_columns(0), 1);
        assert_eq!(grid_position(4, 3), Position::new(250.0, 150.0));
    }
}
