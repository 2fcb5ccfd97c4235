//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the keiro crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let mut registry = SchemaRegistry::new();
//! registry.register("agents", &std::fs::read_to_string("path/to/schema.py")?);
//!
//! let importer = WorkflowImporter::new(&registry, "agents")?;
//! let outcome = importer.import_str(&std::fs::read_to_string("path/to/workflow.json")?)?;
//!
//! let mut graph = outcome.graph;
//! let mut overlay = ExecutionOverlay::new();
//! let log = EventLog::from_file("path/to/events.json")?;
//! overlay.apply_log(&mut graph, &log);
//!
//! GraphSnapshot::capture(&graph).save("path/to/editor-state.json")?;
//! # Ok(())
//! # }
//! ```

// Schemas
pub use crate::registry::SchemaRegistry;
pub use crate::schema::{FieldRole, SchemaModel, SchemaParser, TypeTree};

// Graph building
pub use crate::blueprint::BlueprintFactory;
pub use crate::control_flow::{ControlFlowBinder, EdgeCondition, FlowKind};
pub use crate::graph::{Edge, EdgeRequest, ExecutionStatus, Graph, NodeId, NodeInstance};

// Documents and snapshots
pub use crate::codec::{GraphSnapshot, WorkflowDocument, WorkflowExporter, WorkflowImporter};

// Layout and execution display
pub use crate::layout::{LayoutChoice, LayoutOptions, LayoutStrategy};
pub use crate::overlay::{EventLog, ExecutionEvent, ExecutionOverlay, NodeReport};

// Error types
pub use crate::error::{CodecError, Diagnostic, GraphError, SchemaError, SnapshotError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
