use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Execution state reported for a node by the remote runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
    Waiting,
    Cancelled,
}

impl ExecutionStatus {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "running" | "started" => Some(Self::Running),
            "completed" | "complete" | "success" | "succeeded" => Some(Self::Completed),
            "failed" | "error" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            "waiting" => Some(Self::Waiting),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Waiting => "waiting",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Display-only execution annotations on a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDisplay {
    pub status: Option<ExecutionStatus>,
    pub output: Option<Value>,
    pub error: Option<String>,
}

/// Display-only annotations on an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDisplay {
    /// The branch this edge leaves from was taken.
    pub active: bool,
    /// A sibling branch was taken instead.
    pub dimmed: bool,
}
