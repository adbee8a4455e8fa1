//! Graph execution runtime
//!
//! This crate provides the interpreter loop that runs graphs, the tool
//! registry, the in-memory store with its per-run log fan-out, and the
//! engine that ties them together.

mod executor;
mod registry;
mod runtime;
mod store;
mod validate;

pub use executor::GraphExecutor;
pub use registry::{ToolMetadata, ToolRegistry};
pub use runtime::{GraphEngine, RuntimeConfig};
pub use store::{RunBroadcaster, Store, SubscriptionId};
pub use validate::{validate_graph, GraphIssue};
