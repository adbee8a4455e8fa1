use async_trait::async_trait;
use flowcore::{State, Tool, ToolError, ToolInput};

/// Does nothing; used for start and end nodes.
pub struct NoopTool;

#[async_trait]
impl Tool for NoopTool {
    fn name(&self) -> &str {
        "noop"
    }

    fn description(&self) -> &str {
        "Returns no updates"
    }

    async fn call(&self, _input: ToolInput<'_>) -> Result<State, ToolError> {
        Ok(State::new())
    }
}
