use crate::{State, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Calling shape a tool declares up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    /// Receives only the run state.
    StateOnly,
    /// Receives the `code` string from state alongside the state itself.
    CodeAndState,
}

/// Arguments handed to a tool, shaped by its declared [`Arity`].
#[derive(Debug, Clone, Copy)]
pub enum ToolInput<'a> {
    State(&'a State),
    CodeAndState { code: &'a str, state: &'a State },
}

impl<'a> ToolInput<'a> {
    /// Build the input for `arity`. The code argument is `state["code"]`
    /// when it is a string and the empty string otherwise.
    pub fn for_arity(arity: Arity, state: &'a State) -> Self {
        match arity {
            Arity::StateOnly => ToolInput::State(state),
            Arity::CodeAndState => {
                let code = state.get("code").and_then(|v| v.as_str()).unwrap_or("");
                ToolInput::CodeAndState { code, state }
            }
        }
    }

    pub fn state(&self) -> &'a State {
        match *self {
            ToolInput::State(state) => state,
            ToolInput::CodeAndState { state, .. } => state,
        }
    }

    /// The code argument, `None` for state-only calls.
    pub fn code(&self) -> Option<&'a str> {
        match *self {
            ToolInput::State(_) => None,
            ToolInput::CodeAndState { code, .. } => Some(code),
        }
    }
}

/// A named capability a graph node can invoke.
///
/// Tools read the run state and return the key/value updates to merge into
/// it; they never mutate state themselves.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name nodes refer to this tool by (e.g. "extract_functions")
    fn name(&self) -> &str;

    fn arity(&self) -> Arity {
        Arity::StateOnly
    }

    fn description(&self) -> &str {
        ""
    }

    async fn call(&self, input: ToolInput<'_>) -> Result<State, ToolError>;
}

/// Adapter turning a plain function into a [`Tool`].
pub struct FnTool<F> {
    name: String,
    arity: Arity,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(ToolInput<'_>) -> Result<State, ToolError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, arity: Arity, func: F) -> Self {
        Self {
            name: name.into(),
            arity,
            func,
        }
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(ToolInput<'_>) -> Result<State, ToolError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    async fn call(&self, input: ToolInput<'_>) -> Result<State, ToolError> {
        (self.func)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_defaults_to_empty_string() {
        let state = State::new();
        let input = ToolInput::for_arity(Arity::CodeAndState, &state);
        assert_eq!(input.code(), Some(""));

        let mut state = State::new();
        state.insert("code".to_string(), json!(42));
        let input = ToolInput::for_arity(Arity::CodeAndState, &state);
        assert_eq!(input.code(), Some(""));
    }

    #[test]
    fn test_state_only_has_no_code() {
        let mut state = State::new();
        state.insert("code".to_string(), json!("def f(): pass"));
        let input = ToolInput::for_arity(Arity::StateOnly, &state);
        assert_eq!(input.code(), None);
        assert_eq!(input.state().len(), 1);
    }

    #[tokio::test]
    async fn test_fn_tool_reports_declared_arity() {
        let tool = FnTool::new("echo", Arity::CodeAndState, |input| {
            let mut out = State::new();
            out.insert("echo".to_string(), json!(input.code().unwrap_or_default()));
            Ok(out)
        });
        assert_eq!(tool.arity(), Arity::CodeAndState);

        let mut state = State::new();
        state.insert("code".to_string(), json!("x = 1"));
        let out = tool
            .call(ToolInput::for_arity(tool.arity(), &state))
            .await
            .unwrap();
        assert_eq!(out["echo"], json!("x = 1"));
    }
}
