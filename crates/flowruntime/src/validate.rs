use crate::ToolRegistry;
use flowcore::Graph;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::HashMap;
use std::fmt;

/// Structural problem found by [`validate_graph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    DuplicateNode(String),
    MissingStartNode(String),
    DanglingEdge { from: String, to: String },
    EdgeFromUnknownNode(String),
    UnknownTool { node: String, tool: String },
    Unreachable(String),
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::DuplicateNode(name) => write!(f, "node '{}' is declared more than once", name),
            GraphIssue::MissingStartNode(name) => write!(f, "start node '{}' does not exist", name),
            GraphIssue::DanglingEdge { from, to } => {
                write!(f, "edge '{}' -> '{}' targets an unknown node", from, to)
            }
            GraphIssue::EdgeFromUnknownNode(from) => {
                write!(f, "edge declared for unknown node '{}'", from)
            }
            GraphIssue::UnknownTool { node, tool } => {
                write!(f, "node '{}' uses unregistered tool '{}'", node, tool)
            }
            GraphIssue::Unreachable(name) => {
                write!(f, "node '{}' is unreachable from the start node", name)
            }
        }
    }
}

/// Check a graph ahead of time for the problems a run would otherwise only
/// hit while executing. Runs never require this; it backs `flow validate`.
pub fn validate_graph(graph: &Graph, registry: Option<&ToolRegistry>) -> Vec<GraphIssue> {
    let mut issues = Vec::new();
    let mut digraph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    for node in &graph.nodes {
        if index.contains_key(node.name.as_str()) {
            issues.push(GraphIssue::DuplicateNode(node.name.clone()));
            continue;
        }
        index.insert(node.name.as_str(), digraph.add_node(node.name.as_str()));

        if let Some(registry) = registry {
            if !registry.contains(&node.function) {
                issues.push(GraphIssue::UnknownTool {
                    node: node.name.clone(),
                    tool: node.function.clone(),
                });
            }
        }
    }

    let mut edges: Vec<(&str, &str)> = graph.edge_targets().collect();
    edges.sort_unstable();
    for (from, to) in edges {
        match (index.get(from), index.get(to)) {
            (Some(&a), Some(&b)) => {
                digraph.add_edge(a, b, ());
            }
            (None, _) => {
                let issue = GraphIssue::EdgeFromUnknownNode(from.to_string());
                if !issues.contains(&issue) {
                    issues.push(issue);
                }
            }
            (Some(_), None) => issues.push(GraphIssue::DanglingEdge {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    let Some(start) = graph.start_node.as_deref() else {
        return issues;
    };
    let Some(&start_idx) = index.get(start) else {
        issues.push(GraphIssue::MissingStartNode(start.to_string()));
        return issues;
    };

    let mut reached = vec![false; digraph.node_count()];
    let mut dfs = Dfs::new(&digraph, start_idx);
    while let Some(idx) = dfs.next(&digraph) {
        reached[idx.index()] = true;
    }
    for idx in digraph.node_indices() {
        if !reached[idx.index()] {
            issues.push(GraphIssue::Unreachable(digraph[idx].to_string()));
        }
    }

    issues
}
