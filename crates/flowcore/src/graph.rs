use crate::value::{self, State, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

pub type GraphId = String;
pub type RunId = String;

/// Generate a graph identifier (`g_` followed by 8 hex digits).
pub fn new_graph_id() -> GraphId {
    prefixed_id("g_")
}

/// Generate a run identifier (`r_` followed by 8 hex digits).
pub fn new_run_id() -> RunId {
    prefixed_id("r_")
}

fn prefixed_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &hex[..8])
}

/// Comparison applied by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
}

impl Operator {
    /// Apply the operator to `lhs` and `rhs`.
    ///
    /// Incomparable operands (different kinds, objects under an ordering
    /// operator) always evaluate to `false`.
    pub fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        if self == Operator::Eq {
            return value::equals(lhs, rhs);
        }
        let Some(ordering) = value::compare(lhs, rhs) else {
            tracing::debug!("Incomparable condition operands: {} {:?} {}", lhs, self, rhs);
            return false;
        };
        match self {
            Operator::Lt => ordering == Ordering::Less,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Lte => ordering != Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Eq => ordering == Ordering::Equal,
        }
    }
}

/// `state[key] <op> value`, used for loop continuation and branch selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    #[serde(rename = "op", alias = "operator")]
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(key: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            operator,
            value: value.into(),
        }
    }

    /// Evaluate against `state`. A missing key reads as `null`.
    pub fn evaluate(&self, state: &State) -> bool {
        let lhs = state.get(&self.key).unwrap_or(&Value::Null);
        self.operator.apply(lhs, &self.value)
    }
}

/// A named step bound to one registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    #[serde(rename = "func")]
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_condition: Option<Condition>,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            loop_condition: None,
        }
    }

    pub fn with_loop(mut self, condition: Condition) -> Self {
        self.loop_condition = Some(condition);
        self
    }
}

/// Routing rule leaving a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Edge {
    /// Unconditional jump to the named node.
    Target(String),
    Branch {
        #[serde(rename = "if")]
        condition: Condition,
        #[serde(rename = "then")]
        then_target: String,
        #[serde(rename = "else")]
        else_target: String,
    },
    Next(NextEdge),
}

/// `{"next": ...}` form; a missing or null `next` terminates.
///
/// Unknown keys are refused so a malformed conditional edge fails to parse
/// instead of reading as a terminal edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NextEdge {
    #[serde(default)]
    pub next: Option<String>,
}

impl Edge {
    pub fn branch(
        condition: Condition,
        then_target: impl Into<String>,
        else_target: impl Into<String>,
    ) -> Self {
        Edge::Branch {
            condition,
            then_target: then_target.into(),
            else_target: else_target.into(),
        }
    }

    /// Resolve the next node name against `state`. `None` terminates the run.
    pub fn next(&self, state: &State) -> Option<&str> {
        let target = match self {
            Edge::Target(target) => Some(target.as_str()),
            Edge::Branch {
                condition,
                then_target,
                else_target,
            } => {
                if condition.evaluate(state) {
                    Some(then_target.as_str())
                } else {
                    Some(else_target.as_str())
                }
            }
            Edge::Next(NextEdge { next }) => next.as_deref(),
        };
        target.filter(|name| !name.is_empty())
    }
}

/// Graph as submitted by a client, before an id is assigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDef {
    pub nodes: Vec<NodeDef>,
    /// A `null` entry is the same as no entry: the node is terminal.
    #[serde(default)]
    pub edges: HashMap<String, Option<Edge>>,
    #[serde(default)]
    pub start_node: Option<String>,
}

impl GraphDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node: NodeDef) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, edge: Edge) -> Self {
        self.edges.insert(from.into(), Some(edge));
        self
    }

    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.start_node = Some(name.into());
        self
    }
}

/// A stored, immutable workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub id: GraphId,
    pub nodes: Vec<NodeDef>,
    pub edges: HashMap<String, Option<Edge>>,
    pub start_node: Option<String>,
}

impl Graph {
    /// Bind a definition to `id`, defaulting the start node to the first
    /// declared node.
    pub fn from_def(id: GraphId, def: GraphDef) -> Self {
        let start_node = def
            .start_node
            .filter(|name| !name.is_empty())
            .or_else(|| def.nodes.first().map(|n| n.name.clone()));
        Self {
            id,
            nodes: def.nodes,
            edges: def.edges,
            start_node,
        }
    }

    pub fn find_node(&self, name: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn edge(&self, from: &str) -> Option<&Edge> {
        self.edges.get(from).and_then(Option::as_ref)
    }

    /// Every node name an edge can route to.
    pub fn edge_targets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().flat_map(|(from, edge)| {
            let targets: Vec<&str> = match edge {
                Some(Edge::Target(to)) => vec![to.as_str()],
                Some(Edge::Branch {
                    then_target,
                    else_target,
                    ..
                }) => vec![then_target.as_str(), else_target.as_str()],
                Some(Edge::Next(NextEdge { next: Some(to) })) => vec![to.as_str()],
                _ => Vec::new(),
            };
            targets
                .into_iter()
                .filter(|to| !to.is_empty())
                .map(move |to| (from.as_str(), to))
        })
    }
}
