use super::display::NodeDisplay;
use super::{EdgeId, NodeId};
use crate::schema::{NativeKind, TypeTree};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const NODE_WIDTH: f64 = 180.0;
pub const SLOT_PITCH: f64 = 20.0;
pub const HEADER_HEIGHT: f64 = 30.0;
pub const FOOTER_HEIGHT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// Node size for a given number of slot rows.
    pub fn for_rows(rows: usize) -> Self {
        Self {
            width: NODE_WIDTH,
            height: HEADER_HEIGHT + SLOT_PITCH * rows as f64 + FOOTER_HEIGHT,
        }
    }
}

/// Whether a slot comes from a schema field or from the node's control-flow kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotOrigin {
    #[default]
    Schema,
    Control,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    pub name: String,
    pub type_tree: TypeTree,
    #[serde(default)]
    pub origin: SlotOrigin,
    /// At most one incoming edge.
    #[serde(skip)]
    pub link: Option<EdgeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    pub name: String,
    pub type_tree: TypeTree,
    #[serde(default)]
    pub origin: SlotOrigin,
    #[serde(skip)]
    pub links: Vec<EdgeId>,
}

impl InputSlot {
    pub fn new(name: impl Into<String>, type_tree: TypeTree, origin: SlotOrigin) -> Self {
        Self {
            name: name.into(),
            type_tree,
            origin,
            link: None,
        }
    }
}

impl OutputSlot {
    pub fn new(name: impl Into<String>, type_tree: TypeTree, origin: SlotOrigin) -> Self {
        Self {
            name: name.into(),
            type_tree,
            origin,
            links: Vec::new(),
        }
    }
}

/// An input that can be edited in place while nothing is connected to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeInput {
    #[serde(rename = "type")]
    pub kind: NativeKind,
    pub value: Value,
    pub optional: bool,
}

/// Title, color and any other editor metadata carried in a document's `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub title: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

/// One concrete node in a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInstance {
    pub id: NodeId,
    pub model_name: String,
    pub schema_name: String,
    pub workflow_type: String,
    pub constant_fields: Map<String, Value>,
    /// Constants nobody set; their value is the field name and is not exported.
    pub unset_constants: BTreeSet<String>,
    pub inputs: Vec<InputSlot>,
    pub outputs: Vec<OutputSlot>,
    pub native_inputs: BTreeMap<usize, NativeInput>,
    pub multi_input_slots: BTreeMap<String, Vec<usize>>,
    pub multi_output_slots: BTreeMap<String, Vec<usize>>,
    /// Instance configuration no schema field consumed, kept verbatim.
    pub properties: Map<String, Value>,
    pub meta: NodeMeta,
    pub position: Position,
    pub size: Size,
    pub display: NodeDisplay,
}

impl NodeInstance {
    /// An empty node; the id is assigned when it is added to a graph.
    pub fn new(
        model_name: impl Into<String>,
        schema_name: impl Into<String>,
        workflow_type: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            model_name: model_name.into(),
            schema_name: schema_name.into(),
            workflow_type: workflow_type.into(),
            constant_fields: Map::new(),
            unset_constants: BTreeSet::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            native_inputs: BTreeMap::new(),
            multi_input_slots: BTreeMap::new(),
            multi_output_slots: BTreeMap::new(),
            properties: Map::new(),
            meta: NodeMeta::default(),
            position: Position::default(),
            size: Size::for_rows(0),
            display: NodeDisplay::default(),
        }
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.name == name)
    }

    /// The title shown in the editor: the override, else the workflow type.
    pub fn title(&self) -> &str {
        self.meta.title.as_deref().unwrap_or(&self.workflow_type)
    }

    pub fn refresh_size(&mut self) {
        self.size = Size::for_rows(self.inputs.len().max(self.outputs.len()));
    }

    /// Keys of a multi-slot field, recovered from its slot names in
    /// creation order. The ungrouped fallback slot contributes no key.
    pub fn multi_slot_keys(&self, field: &str) -> Option<Vec<String>> {
        let prefix = format!("{}.", field);
        let from_names = |names: Vec<&str>| -> Vec<String> {
            names
                .into_iter()
                .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
                .collect()
        };
        if let Some(indices) = self.multi_input_slots.get(field) {
            return Some(from_names(
                indices
                    .iter()
                    .filter_map(|i| self.inputs.get(*i))
                    .map(|s| s.name.as_str())
                    .collect(),
            ));
        }
        self.multi_output_slots.get(field).map(|indices| {
            from_names(
                indices
                    .iter()
                    .filter_map(|i| self.outputs.get(*i))
                    .map(|s| s.name.as_str())
                    .collect(),
            )
        })
    }

    /// Inserts control slots ahead of the schema slots, shifting every
    /// recorded input index. Names already present are not added again.
    pub fn prepend_inputs(&mut self, slots: Vec<InputSlot>, groups: Vec<(String, Vec<String>)>) {
        let slots: Vec<InputSlot> = slots
            .into_iter()
            .filter(|s| self.input_index(&s.name).is_none())
            .collect();
        let shift = slots.len();
        if shift > 0 {
            self.native_inputs = std::mem::take(&mut self.native_inputs)
                .into_iter()
                .map(|(i, native)| (i + shift, native))
                .collect();
            for indices in self.multi_input_slots.values_mut() {
                indices.iter_mut().for_each(|i| *i += shift);
            }
            self.inputs.splice(0..0, slots);
        }
        for (group, names) in groups {
            let indices = names
                .iter()
                .filter_map(|name| self.input_index(name))
                .collect();
            self.multi_input_slots.insert(group, indices);
        }
    }

    pub fn prepend_outputs(&mut self, slots: Vec<OutputSlot>) {
        let slots: Vec<OutputSlot> = slots
            .into_iter()
            .filter(|s| self.output_index(&s.name).is_none())
            .collect();
        let shift = slots.len();
        if shift > 0 {
            for indices in self.multi_output_slots.values_mut() {
                indices.iter_mut().for_each(|i| *i += shift);
            }
            self.outputs.splice(0..0, slots);
        }
    }
}
