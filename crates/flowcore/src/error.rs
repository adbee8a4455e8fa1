use crate::{GraphId, RunId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Graph not found: {0}")]
    GraphNotFound(GraphId),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    /// Display text doubles as the run log line.
    #[error("Node '{0}' not found.")]
    NodeNotFound(String),

    /// Display text doubles as the run log line.
    #[error("Tool '{0}' missing.")]
    ToolNotFound(String),

    #[error("Node '{node}' failed: {source}")]
    Tool {
        node: String,
        #[source]
        source: ToolError,
    },

    #[error("Run exceeded {0} steps.")]
    StepLimit(usize),

    #[error("Execution error: {0}")]
    Execution(String),
}

impl FlowError {
    /// True for errors caused by an unknown graph or run id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FlowError::GraphNotFound(_) | FlowError::RunNotFound(_))
    }
}

#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}
