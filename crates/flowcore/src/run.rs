use crate::{GraphId, RunId, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One execution of a graph against an initial state.
///
/// Only the interpreter task that owns the run mutates it; everyone else
/// reads snapshots out of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: RunId,
    pub graph_id: GraphId,
    pub state: State,
    pub status: RunStatus,
    pub log: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(run_id: RunId, graph_id: GraphId, initial_state: State) -> Self {
        Self {
            run_id,
            graph_id,
            state: initial_state,
            status: RunStatus::Running,
            log: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to a terminal status and stamp the finish time.
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}
