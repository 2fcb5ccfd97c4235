//! Common test utilities: an agent-workflow schema and import helpers.
use keiro::codec::ImportOutcome;
use keiro::prelude::*;
use serde_json::Value;

pub const SCHEMA_NAME: &str = "agents";

/// A schema in the shape a node library would ship: aliases, constants,
/// role-annotated fields, a computed property and a nested config class.
pub const AGENT_SCHEMA: &str = r#"
from typing import Annotated, Dict, List, Literal, Optional
from pydantic import BaseModel, Field

DEFAULT_MODEL = "gpt-4o"
MAX_RETRIES = 3
ToolName = str
Headers: TypeAlias = Dict[str, str]

class Document(BaseModel):
    """A retrieved document."""
    text: str
    score: float = 0.0

class BaseNode(BaseModel):
    type: str

class StartNode(BaseNode):
    type: Literal["start"] = "start"

class EndNode(BaseNode):
    type: Literal["end"] = "end"

class LlmNode(BaseNode):
    """Calls a language model.

    Multi-line docstrings are ignored.
    """
    type: Literal["llm"] = "llm"
    model: Annotated[str, Role.CONSTANT] = DEFAULT_MODEL
    prompt: str = ""
    temperature: float = 0.7
    retries: int = MAX_RETRIES  # attempts before failing
    context: Annotated[Optional[Document], "input"] = None
    tools: Annotated[List[ToolName], Role.MULTI_INPUT] = Field(default_factory=list)

    @property
    def response(self) -> str:
        return self._response

    def reset(self) -> None:
        self._response = ""

    class Config:
        extra = "allow"

class RouterNode(BaseNode):
    type: Literal["router"] = "router"
    routes: Annotated[List[str], Role.MULTI_OUTPUT]

class HttpNode(BaseNode):
    type: Literal["http"] = "http"
    url: str
    headers: Headers = {}

class WebSearchConfig(BaseNode):
    query: str = ""

class DecisionNode(BaseNode):
    type: Literal["decision"] = "decision"

class MergeNode(BaseNode):
    type: Literal["merge"] = "merge"
    strategy: Annotated[str, Role.CONSTANT]

class ParallelNode(BaseNode):
    type: Literal["parallel"] = "parallel"

class LoopNode(BaseNode):
    type: Literal["loop"] = "loop"
    max_iterations: int = 10
"#;

/// `Child` overrides `a` in place and adds `b`.
pub const INHERITANCE_SCHEMA: &str = r#"
class Parent(BaseModel):
    a: int = 1

class Child(Parent):
    a: int = 2
    b: str
"#;

#[allow(dead_code)]
pub fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register_strict(SCHEMA_NAME, AGENT_SCHEMA)
        .expect("fresh registry accepts the schema");
    registry
}

#[allow(dead_code)]
pub fn import(registry: &SchemaRegistry, document: &Value) -> ImportOutcome {
    WorkflowImporter::new(registry, SCHEMA_NAME)
        .expect("schema is registered")
        .import(document)
        .expect("document is well-formed")
}

/// Creates one node of `model` through the factory with the default binder.
#[allow(dead_code)]
pub fn create_node(registry: &SchemaRegistry, model: &str, config: Value) -> NodeInstance {
    let binder = ControlFlowBinder::new();
    let schema = registry.get(SCHEMA_NAME).expect("schema is registered");
    let factory = BlueprintFactory::new(SCHEMA_NAME, schema, &binder);
    let config = config.as_object().cloned().unwrap_or_default();
    factory.create_node(model, &config).expect("model exists")
}

#[allow(dead_code)]
pub fn input_names(node: &NodeInstance) -> Vec<&str> {
    node.inputs.iter().map(|s| s.name.as_str()).collect()
}

#[allow(dead_code)]
pub fn output_names(node: &NodeInstance) -> Vec<&str> {
    node.outputs.iter().map(|s| s.name.as_str()).collect()
}

/// The node created for document index `index`.
#[allow(dead_code)]
pub fn node_at<'a>(outcome: &'a ImportOutcome, index: usize) -> &'a NodeInstance {
    let id = outcome.node_ids[index].expect("node was imported");
    outcome.graph.node(id).expect("node is live")
}
