use async_trait::async_trait;
use flowcore::{Arity, State, Tool, ToolError, ToolInput, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

static FUNCTION_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"def\s+([a-zA-Z_][a-zA-Z_0-9]*)").expect("function pattern is valid")
});

const MAX_LINE_LEN: usize = 120;

fn code_arg<'a>(input: &ToolInput<'a>) -> Result<&'a str, ToolError> {
    input
        .code()
        .ok_or_else(|| ToolError::MissingInput("code".to_string()))
}

fn number(state: &State, key: &str) -> f64 {
    state.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Extract the names of Python function definitions from `code`.
pub struct ExtractFunctionsTool;

#[async_trait]
impl Tool for ExtractFunctionsTool {
    fn name(&self) -> &str {
        "extract_functions"
    }

    fn arity(&self) -> Arity {
        Arity::CodeAndState
    }

    fn description(&self) -> &str {
        "Extract function definitions from source code"
    }

    async fn call(&self, input: ToolInput<'_>) -> Result<State, ToolError> {
        let code = code_arg(&input)?;
        let functions: Vec<&str> = FUNCTION_DEF
            .captures_iter(code)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .collect();

        let mut out = State::new();
        out.insert("num_functions".to_string(), json!(functions.len()));
        out.insert("functions".to_string(), json!(functions));
        Ok(out)
    }
}

/// Score each extracted function and average the scores.
pub struct CheckComplexityTool;

#[async_trait]
impl Tool for CheckComplexityTool {
    fn name(&self) -> &str {
        "check_complexity"
    }

    fn description(&self) -> &str {
        "Assign a complexity score per function"
    }

    async fn call(&self, input: ToolInput<'_>) -> Result<State, ToolError> {
        let functions: Vec<&str> = match input.state().get("functions") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(_) => {
                return Err(ToolError::InvalidInputType {
                    field: "functions".to_string(),
                    expected: "array".to_string(),
                    actual: "other".to_string(),
                })
            }
        };

        let complexities: serde_json::Map<String, Value> = functions
            .iter()
            .map(|f| (f.to_string(), json!(f.len() + 1)))
            .collect();
        let total: usize = functions.iter().map(|f| f.len() + 1).sum();
        let avg = total as f64 / functions.len().max(1) as f64;

        let mut out = State::new();
        out.insert("complexities".to_string(), Value::Object(complexities));
        out.insert("avg_complexity".to_string(), json!(avg));
        Ok(out)
    }
}

/// Flag TODO comments, tab characters and overlong lines.
pub struct DetectIssuesTool;

#[async_trait]
impl Tool for DetectIssuesTool {
    fn name(&self) -> &str {
        "detect_issues"
    }

    fn arity(&self) -> Arity {
        Arity::CodeAndState
    }

    fn description(&self) -> &str {
        "Static checks: TODOs, tabs and long lines"
    }

    async fn call(&self, input: ToolInput<'_>) -> Result<State, ToolError> {
        let code = code_arg(&input)?;
        let mut issues = Vec::new();

        if code.contains("TODO") {
            issues.push("Contains TODO comments".to_string());
        }
        if code.contains('\t') {
            issues.push("Tabs found (use spaces!)".to_string());
        }

        let long_lines: Vec<String> = code
            .lines()
            .enumerate()
            .filter(|(_, line)| line.chars().count() > MAX_LINE_LEN)
            .map(|(i, _)| (i + 1).to_string())
            .collect();
        if !long_lines.is_empty() {
            issues.push(format!("Long lines at: [{}]", long_lines.join(", ")));
        }

        let mut out = State::new();
        out.insert("num_issues".to_string(), json!(issues.len()));
        out.insert("issues".to_string(), json!(issues));
        Ok(out)
    }
}

/// Turn issue counts and complexity into suggestions and a quality score.
pub struct SuggestImprovementsTool;

#[async_trait]
impl Tool for SuggestImprovementsTool {
    fn name(&self) -> &str {
        "suggest_improvements"
    }

    fn description(&self) -> &str {
        "Suggest improvements and compute a quality score"
    }

    async fn call(&self, input: ToolInput<'_>) -> Result<State, ToolError> {
        let state = input.state();
        let num_issues = number(state, "num_issues");
        let avg_complexity = number(state, "avg_complexity");

        let mut suggestions = Vec::new();
        if num_issues > 0.0 {
            suggestions.push("Fix code issues");
        }
        if avg_complexity > 8.0 {
            suggestions.push("Refactor complex functions");
        }

        let score = 100 - 10 * num_issues as i64 - avg_complexity.trunc() as i64;

        let mut out = State::new();
        out.insert("suggestions".to_string(), json!(suggestions));
        out.insert("quality_score".to_string(), json!(score.max(0)));
        Ok(out)
    }
}
