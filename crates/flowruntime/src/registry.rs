use flowcore::{Arity, FlowError, Tool};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Description of a registered tool, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ToolMetadata {
    pub name: String,
    pub arity: Arity,
    pub description: String,
}

/// Registry of available tools, keyed by name.
///
/// Populated at startup and shared behind an `Arc`; registration takes
/// `&self` so it stays safe if it ever races with lookups.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool under its own name, replacing any previous binding.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.register_as(name, tool);
    }

    /// Register a tool under an explicit name, replacing any previous binding.
    pub fn register_as(&self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        let name = name.into();
        tracing::info!("Registering tool: {} ({:?})", name, tool.arity());
        if self.tools.write().insert(name.clone(), tool).is_some() {
            tracing::debug!("Tool {} was already registered, replaced", name);
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, FlowError> {
        self.tools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::ToolNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Get all registered tool names, sorted
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_metadata(&self, name: &str) -> Option<ToolMetadata> {
        self.tools.read().get(name).map(|tool| ToolMetadata {
            name: name.to_string(),
            arity: tool.arity(),
            description: tool.description().to_string(),
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcore::{FnTool, State};
    use serde_json::json;

    fn constant(name: &str, value: i64) -> Arc<dyn Tool> {
        Arc::new(FnTool::new(name, Arity::StateOnly, move |_| {
            let mut out = State::new();
            out.insert("v".to_string(), json!(value));
            Ok(out)
        }))
    }

    #[test]
    fn test_lookup_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.lookup("nope").err().unwrap();
        assert_eq!(err.to_string(), "Tool 'nope' missing.");
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = ToolRegistry::new();
        registry.register(constant("k", 1));
        registry.register(constant("k", 2));

        let tool = registry.lookup("k").unwrap();
        let out = tool
            .call(flowcore::ToolInput::State(&State::new()))
            .await
            .unwrap();
        assert_eq!(out["v"], json!(2));
        assert_eq!(registry.list_tools(), vec!["k".to_string()]);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(ToolRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.register(constant(&format!("t{}", i), i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.list_tools().len(), 8);
    }
}
