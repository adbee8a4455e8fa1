// crates/flownodes/tests/tools_test.rs

use flowcore::{Arity, GraphDef, RunStatus, State, Tool, ToolInput};
use flownodes::{
    CheckComplexityTool, DetectIssuesTool, ExtractFunctionsTool, NoopTool, SuggestImprovementsTool,
};
use flowruntime::{GraphEngine, RuntimeConfig, ToolRegistry};
use serde_json::json;
use std::sync::Arc;

// Helper function to build a state map from JSON
fn state(value: serde_json::Value) -> State {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("state must be a JSON object"),
    }
}

async fn call(tool: &dyn Tool, s: &State) -> State {
    tool.call(ToolInput::for_arity(tool.arity(), s))
        .await
        .expect("tool should succeed")
}

const SAMPLE: &str = "def load(path):\n    pass\n\ndef transform_records(rows):\n    # TODO: batch\n\treturn rows\n";

#[tokio::test]
async fn test_extract_functions() {
    let out = call(&ExtractFunctionsTool, &state(json!({"code": SAMPLE}))).await;
    assert_eq!(out["functions"], json!(["load", "transform_records"]));
    assert_eq!(out["num_functions"], json!(2));
}

#[tokio::test]
async fn test_extract_functions_without_code() {
    let out = call(&ExtractFunctionsTool, &State::new()).await;
    assert_eq!(out["functions"], json!([]));
    assert_eq!(out["num_functions"], json!(0));
}

#[tokio::test]
async fn test_extract_functions_is_reusable() {
    let tool = ExtractFunctionsTool;
    let first = call(&tool, &state(json!({"code": "def _helper2(x): pass"}))).await;
    let second = call(&tool, &state(json!({"code": SAMPLE}))).await;
    assert_eq!(first["functions"], json!(["_helper2"]));
    assert_eq!(second["num_functions"], json!(2));
}

#[tokio::test]
async fn test_check_complexity() {
    let out = call(
        &CheckComplexityTool,
        &state(json!({"functions": ["load", "transform_records"]})),
    )
    .await;
    assert_eq!(out["complexities"], json!({"load": 5, "transform_records": 18}));
    assert_eq!(out["avg_complexity"], json!(11.5));

    let out = call(&CheckComplexityTool, &State::new()).await;
    assert_eq!(out["avg_complexity"], json!(0.0));
}

#[tokio::test]
async fn test_check_complexity_rejects_non_array() {
    let result = CheckComplexityTool
        .call(ToolInput::State(&state(json!({"functions": "load"}))))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_detect_issues() {
    let long_line = "x".repeat(121);
    let code = format!("{}\nok\n{}\n", SAMPLE, long_line);
    let out = call(&DetectIssuesTool, &state(json!({"code": code}))).await;
    assert_eq!(
        out["issues"],
        json!([
            "Contains TODO comments",
            "Tabs found (use spaces!)",
            "Long lines at: [9]",
        ])
    );
    assert_eq!(out["num_issues"], json!(3));
}

#[tokio::test]
async fn test_suggest_improvements() {
    let out = call(
        &SuggestImprovementsTool,
        &state(json!({"num_issues": 2, "avg_complexity": 11.5})),
    )
    .await;
    assert_eq!(
        out["suggestions"],
        json!(["Fix code issues", "Refactor complex functions"])
    );
    assert_eq!(out["quality_score"], json!(69));

    let out = call(&SuggestImprovementsTool, &state(json!({"num_issues": 20}))).await;
    assert_eq!(out["quality_score"], json!(0));
}

#[test]
fn test_declared_arities() {
    assert_eq!(NoopTool.arity(), Arity::StateOnly);
    assert_eq!(ExtractFunctionsTool.arity(), Arity::CodeAndState);
    assert_eq!(CheckComplexityTool.arity(), Arity::StateOnly);
    assert_eq!(DetectIssuesTool.arity(), Arity::CodeAndState);
    assert_eq!(SuggestImprovementsTool.arity(), Arity::StateOnly);
}

#[tokio::test]
async fn test_code_review_workflow() {
    let registry = ToolRegistry::new();
    flownodes::register_all(&registry);
    assert_eq!(
        registry.list_tools(),
        vec![
            "check_complexity",
            "detect_issues",
            "extract_functions",
            "noop",
            "suggest_improvements",
        ]
    );

    let engine = GraphEngine::with_registry(Arc::new(registry), RuntimeConfig::default());
    let def: GraphDef = serde_json::from_value(json!({
        "nodes": [
            {"name": "extract", "func": "extract_functions"},
            {"name": "complexity", "func": "check_complexity"},
            {"name": "issues", "func": "detect_issues"},
            {"name": "suggest", "func": "suggest_improvements"},
            {"name": "done", "func": "noop"}
        ],
        "edges": {
            "extract": "complexity",
            "complexity": "issues",
            "issues": "suggest",
            "suggest": {"if": {"key": "quality_score", "op": "gte", "value": 50}, "then": "done", "else": "done"},
            "done": null
        }
    }))
    .unwrap();
    let graph = engine.create_graph(def);
    assert!(flowruntime::validate_graph(&graph, Some(engine.registry().as_ref())).is_empty());

    let run_id = engine
        .start_run(&graph.id, state(json!({"code": SAMPLE})))
        .unwrap();
    let run = engine.wait(&run_id).await.unwrap();

    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.state["num_functions"], json!(2));
    assert_eq!(run.state["num_issues"], json!(2));
    assert_eq!(run.state["quality_score"], json!(69));
    assert_eq!(run.log.len(), 11);
}
