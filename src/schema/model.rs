use super::types::TypeTree;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a schema field surfaces on a node instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Stored on the node, never a slot.
    Constant,
    Input,
    Output,
    /// Expanded into one input slot per configured key.
    MultiInput,
    /// Expanded into one output slot per configured key.
    MultiOutput,
}

impl FieldRole {
    /// Reads a role tag such as `Role.MULTI_INPUT`, `"output"` or `Constant`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().trim_matches(|c| c == '"' || c == '\'');
        let tag = tag.rsplit('.').next().unwrap_or(tag);
        let normalized: String = tag
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "constant" | "const" => Some(FieldRole::Constant),
            "input" => Some(FieldRole::Input),
            "output" => Some(FieldRole::Output),
            "multiinput" => Some(FieldRole::MultiInput),
            "multioutput" => Some(FieldRole::MultiOutput),
            _ => None,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, FieldRole::MultiInput | FieldRole::MultiOutput)
    }
}

/// One declared field of a schema model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub type_tree: TypeTree,
    pub raw_type: String,
    pub role: FieldRole,
    pub default: Option<Value>,
}

/// A class-like declaration after inheritance has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub name: String,
    /// Nearest non-builtin parent, if any.
    pub parent: Option<String>,
    pub fields: Vec<Field>,
}

impl SchemaModel {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The string default of the model's `type` field, used to map
    /// document node types back to models.
    pub fn type_default(&self) -> Option<&str> {
        ["type", "node_type"]
            .iter()
            .filter_map(|name| self.field(name))
            .find_map(|field| field.default.as_ref().and_then(Value::as_str))
    }
}
