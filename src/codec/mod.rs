//! Workflow documents in and out of a [`Graph`](crate::graph::Graph), plus
//! full-fidelity snapshots of editor state.

mod document;
mod export;
mod import;
pub mod snapshot;

pub use document::{DocPosition, EdgeDoc, NodeDoc, WorkflowDocument};
pub use export::WorkflowExporter;
pub use import::{
    GRID_PITCH_X, GRID_PITCH_Y, ImportOutcome, ImportReport, ImporterBuilder, WorkflowImporter,
    pascal_case,
};
pub use snapshot::{GraphSnapshot, LinkSnapshot, NodeSnapshot, RestoredGraph};
