//! Core abstractions for the flow engine
//!
//! Graph and run data model, condition semantics, the tool calling contract
//! and the log sink interface. Everything here is runtime-agnostic.

mod error;
pub mod events;
mod graph;
mod run;
mod tool;
pub mod value;

pub use error::{FlowError, ToolError};
pub use events::{ChannelSink, LogSink, SinkError};
pub use graph::{
    new_graph_id, new_run_id, Condition, Edge, Graph, GraphDef, GraphId, NextEdge, NodeDef,
    Operator, RunId,
};
pub use run::{Run, RunStatus};
pub use tool::{Arity, FnTool, Tool, ToolInput};
pub use value::{State, Value};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
