//! Expands a schema model and a per-instance config into a concrete node.

use crate::control_flow::{ControlFlowBinder, config_keys};
use crate::error::Diagnostic;
use crate::graph::{InputSlot, NativeInput, NodeInstance, NodeMeta, OutputSlot, Position, SlotOrigin};
use crate::schema::{Field, FieldRole, ParsedSchema, TypeTree};
use ahash::AHashSet;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Config keys that describe the node itself rather than a field.
pub const RESERVED_KEYS: &[&str] = &["type", "position", "extra"];

/// Builds `NodeInstance`s from the models of one parsed schema.
pub struct BlueprintFactory<'a> {
    schema_name: &'a str,
    schema: &'a ParsedSchema,
    binder: &'a ControlFlowBinder,
}

impl<'a> BlueprintFactory<'a> {
    pub fn new(schema_name: &'a str, schema: &'a ParsedSchema, binder: &'a ControlFlowBinder) -> Self {
        Self {
            schema_name,
            schema,
            binder,
        }
    }

    pub fn schema(&self) -> &'a ParsedSchema {
        self.schema
    }

    /// Creates a node of `model_name` configured by `config`.
    ///
    /// An unknown model yields `Diagnostic::ModelNotFound` so bulk creation
    /// can skip it and carry on.
    pub fn create_node(
        &self,
        model_name: &str,
        config: &Map<String, Value>,
    ) -> Result<NodeInstance, Diagnostic> {
        let model = self.schema.model(model_name).ok_or_else(|| {
            warn!(schema = self.schema_name, model = model_name, "model not found");
            Diagnostic::ModelNotFound {
                schema: self.schema_name.to_string(),
                model: model_name.to_string(),
            }
        })?;

        let workflow_type = config
            .get("type")
            .and_then(Value::as_str)
            .or(model.type_default())
            .unwrap_or(&model.name);
        let mut node = NodeInstance::new(&model.name, self.schema_name, workflow_type);
        let mut consumed: AHashSet<&str> = RESERVED_KEYS.iter().copied().collect();

        for field in &model.fields {
            if field.name == "type" {
                consumed.insert("type");
                continue;
            }
            match field.role {
                FieldRole::Constant => {
                    consumed.insert(&field.name);
                    let value = config
                        .get(&field.name)
                        .cloned()
                        .or_else(|| field.default.clone());
                    let value = match value {
                        Some(value) => value,
                        None => {
                            node.unset_constants.insert(field.name.clone());
                            Value::String(field.name.clone())
                        }
                    };
                    node.constant_fields.insert(field.name.clone(), value);
                }
                FieldRole::Input => {
                    if add_input(&mut node, field, config) {
                        consumed.insert(&field.name);
                    }
                }
                FieldRole::Output => {
                    node.outputs.push(OutputSlot::new(
                        &field.name,
                        field.type_tree.clone(),
                        SlotOrigin::Schema,
                    ));
                }
                FieldRole::MultiInput | FieldRole::MultiOutput => {
                    consumed.insert(&field.name);
                    expand_multi(&mut node, field, config);
                }
            }
        }

        node.meta = read_meta(config.get("extra"));
        node.position = read_position(config.get("position")).unwrap_or_default();
        node.properties = config
            .iter()
            .filter(|(key, _)| !consumed.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        self.binder.apply_topology(&mut node, config);
        node.refresh_size();
        debug!(
            model = %node.model_name,
            node_type = %node.workflow_type,
            inputs = node.inputs.len(),
            outputs = node.outputs.len(),
            "created node"
        );
        Ok(node)
    }
}

/// Adds the slot for a single-input field. Returns whether the config value
/// was taken as the slot's native value.
fn add_input(node: &mut NodeInstance, field: &Field, config: &Map<String, Value>) -> bool {
    node.inputs.push(InputSlot::new(
        &field.name,
        field.type_tree.clone(),
        SlotOrigin::Schema,
    ));
    let Some(kind) = field.type_tree.native_kind() else {
        return false;
    };
    let configured = config.get(&field.name).cloned();
    let taken = configured.is_some();
    let value = configured
        .or_else(|| field.default.clone())
        .unwrap_or_else(|| kind.zero_value());
    node.native_inputs.insert(
        node.inputs.len() - 1,
        NativeInput {
            kind,
            value,
            optional: field.type_tree.is_optional(),
        },
    );
    taken
}

/// One slot per configured key, or a single fallback slot named after the
/// field when there are none.
fn expand_multi(node: &mut NodeInstance, field: &Field, config: &Map<String, Value>) {
    let keys = config_keys(config.get(&field.name));
    let names: Vec<String> = if keys.is_empty() {
        vec![field.name.clone()]
    } else {
        keys.iter()
            .map(|key| format!("{}.{}", field.name, key))
            .collect()
    };
    let slot_type = element_type(&field.type_tree);

    if field.role == FieldRole::MultiOutput {
        let start = node.outputs.len();
        node.outputs.extend(
            names
                .into_iter()
                .map(|name| OutputSlot::new(name, slot_type.clone(), SlotOrigin::Schema)),
        );
        node.multi_output_slots
            .insert(field.name.clone(), (start..node.outputs.len()).collect());
    } else {
        let start = node.inputs.len();
        node.inputs.extend(
            names
                .into_iter()
                .map(|name| InputSlot::new(name, slot_type.clone(), SlotOrigin::Schema)),
        );
        node.multi_input_slots
            .insert(field.name.clone(), (start..node.inputs.len()).collect());
    }
}

/// A multi-slot field declared as a list carries one element per slot.
fn element_type(type_tree: &TypeTree) -> TypeTree {
    match type_tree {
        TypeTree::List(inner) => inner.as_ref().clone(),
        TypeTree::Optional(inner) => element_type(inner),
        other => other.clone(),
    }
}

fn read_meta(extra: Option<&Value>) -> NodeMeta {
    let Some(Value::Object(extra)) = extra else {
        return NodeMeta::default();
    };
    let mut meta = NodeMeta::default();
    for (key, value) in extra {
        match (key.as_str(), value) {
            ("title", Value::String(title)) => meta.title = Some(title.clone()),
            ("color", Value::String(color)) => meta.color = Some(color.clone()),
            _ => {
                meta.extra.insert(key.clone(), value.clone());
            }
        }
    }
    meta
}

pub(crate) fn read_position(value: Option<&Value>) -> Option<Position> {
    match value? {
        Value::Object(map) => Some(Position::new(
            map.get("x")?.as_f64()?,
            map.get("y")?.as_f64()?,
        )),
        Value::Array(items) if items.len() == 2 => {
            Some(Position::new(items[0].as_f64()?, items[1].as_f64()?))
        }
        _ => None,
    }
}
