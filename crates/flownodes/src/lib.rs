//! Standard tool library
//!
//! Built-in tools for the code review workflow plus `noop`.

mod analysis;
mod noop;

pub use analysis::{
    CheckComplexityTool, DetectIssuesTool, ExtractFunctionsTool, SuggestImprovementsTool,
};
pub use noop::NoopTool;
use flowruntime::ToolRegistry;

use std::sync::Arc;

/// Register all standard tools with a registry
pub fn register_all(registry: &ToolRegistry) {
    registry.register(Arc::new(noop::NoopTool));
    registry.register(Arc::new(analysis::ExtractFunctionsTool));
    registry.register(Arc::new(analysis::CheckComplexityTool));
    registry.register(Arc::new(analysis::DetectIssuesTool));
    registry.register(Arc::new(analysis::SuggestImprovementsTool));
}
