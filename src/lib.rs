//! # Keiro - Schema-Driven Workflow Graph Engine
//!
//! **Keiro** turns class-like schema declarations into typed node blueprints and
//! builds editable workflow graphs from them. It is the engine behind a visual
//! workflow editor: it parses schemas, expands per-instance slot topologies,
//! binds control-flow edges, round-trips workflow documents as JSON, lays graphs
//! out, and projects execution events onto the graph as display annotations.
//! Executing workflows is left to the runner that emits those events.
//!
//! ## Core Workflow
//!
//! 1.  **Register a Schema**: Parse schema text into a `SchemaRegistry` that your application owns.
//! 2.  **Import**: Use `WorkflowImporter::builder` to turn a workflow document into a `Graph`. Unresolvable nodes and edges are skipped and reported as `Diagnostic`s.
//! 3.  **Edit and Lay Out**: Mutate the graph, or position it with `Graph::apply_layout`.
//! 4.  **Export**: `WorkflowExporter::export` writes the graph back as a document whose edges address slots by name.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//! use serde_json::json;
//!
//! fn main() -> Result<()> {
//!     let mut registry = SchemaRegistry::new();
//!     registry.register_strict("agents", &std::fs::read_to_string("schema/agents.py")?)?;
//!
//!     let document = json!({
//!         "nodes": [{"type": "start"}, {"type": "llm", "prompt": "Hello"}, {"type": "end"}],
//!         "edges": [
//!             {"source": 0, "target": 1, "source_slot": "flow", "target_slot": "flow"},
//!             {"source": 1, "target": 2, "source_slot": "flow", "target_slot": "flow"}
//!         ]
//!     });
//!
//!     let importer = WorkflowImporter::builder(&registry, "agents")
//!         .with_type_mapping("chat", "LlmNode")
//!         .build()?;
//!     let mut outcome = importer.import(&document)?;
//!     for diagnostic in &outcome.diagnostics {
//!         println!("-> {}", diagnostic);
//!     }
//!
//!     outcome.graph.apply_layout(LayoutChoice::Layered, &LayoutOptions::default());
//!     println!("{}", WorkflowExporter::export_string(&outcome.graph)?);
//!     Ok(())
//! }
//! ```

pub mod blueprint;
pub mod codec;
pub mod control_flow;
pub mod error;
pub mod graph;
pub mod layout;
pub mod overlay;
pub mod prelude;
pub mod registry;
pub mod schema;
