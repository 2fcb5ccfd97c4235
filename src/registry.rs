use crate::error::SchemaError;
use crate::schema::{ParsedSchema, SchemaModel, SchemaParser};
use ahash::AHashMap;
use itertools::Itertools;
use tracing::{debug, warn};

/// Named schemas available to the engine.
///
/// The registry is owned by the hosting application and passed by reference
/// to the factory and codec, so independent sessions can hold independent
/// schema sets side by side.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: AHashMap<String, ParsedSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and registers `text` under `name`.
    /// Returns `false` without touching the registry if the name is taken.
    pub fn register(&mut self, name: &str, text: &str) -> bool {
        self.register_parsed(name, SchemaParser::parse(text))
    }

    pub fn register_parsed(&mut self, name: &str, schema: ParsedSchema) -> bool {
        if self.schemas.contains_key(name) {
            warn!(schema = name, "schema already registered");
            return false;
        }
        debug!(schema = name, models = schema.models.len(), "registered schema");
        self.schemas.insert(name.to_string(), schema);
        true
    }

    /// Like `register`, but a duplicate name is an error.
    pub fn register_strict(&mut self, name: &str, text: &str) -> Result<(), SchemaError> {
        if self.schemas.contains_key(name) {
            return Err(SchemaError::DuplicateSchema(name.to_string()));
        }
        self.register(name, text);
        Ok(())
    }

    /// Re-parses `text`, fully replacing any model set stored under `name`.
    pub fn reload(&mut self, name: &str, text: &str) {
        self.schemas
            .insert(name.to_string(), SchemaParser::parse(text));
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.schemas.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ParsedSchema> {
        self.schemas.get(name)
    }

    pub fn try_get(&self, name: &str) -> Result<&ParsedSchema, SchemaError> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownSchema(name.to_string()))
    }

    pub fn model(&self, schema: &str, model: &str) -> Option<&SchemaModel> {
        self.get(schema).and_then(|s| s.model(model))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered schema names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).sorted().collect()
    }
}
