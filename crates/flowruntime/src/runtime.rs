use crate::store::{Store, SubscriptionId};
use crate::{GraphExecutor, ToolRegistry};
use flowcore::{FlowError, Graph, GraphDef, LogSink, Run, RunId, State};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Owns the shared tool registry and store, and launches runs.
///
/// One Tokio task per run; `start_run` returns as soon as the task is
/// spawned. Task handles are kept so callers can wait on a run.
pub struct GraphEngine {
    registry: Arc<ToolRegistry>,
    store: Arc<Store>,
    executor: Arc<GraphExecutor>,
    tasks: Mutex<HashMap<RunId, JoinHandle<Run>>>,
}

impl GraphEngine {
    /// Create an engine with an empty store
    pub fn with_registry(registry: Arc<ToolRegistry>, config: RuntimeConfig) -> Self {
        let store = Arc::new(Store::new(config.subscriber_timeout));
        Self::with_store(registry, store, config)
    }

    /// Create an engine over an existing store
    pub fn with_store(registry: Arc<ToolRegistry>, store: Arc<Store>, config: RuntimeConfig) -> Self {
        let executor = Arc::new(GraphExecutor::new(config.loop_pause, config.max_steps));
        Self {
            registry,
            store,
            executor,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Store a graph definition and return the stored graph.
    pub fn create_graph(&self, def: GraphDef) -> Arc<Graph> {
        let graph = self.store.create_graph(def);
        tracing::info!("Created graph {} ({} nodes)", graph.id, graph.nodes.len());
        graph
    }

    /// Start executing `graph_id` and return the new run id without waiting.
    ///
    /// Fails with [`FlowError::GraphNotFound`] before any run record is
    /// created. Must be called from within a Tokio runtime.
    pub fn start_run(&self, graph_id: &str, initial_state: State) -> Result<RunId, FlowError> {
        let (graph, run) = self.prepare(graph_id, initial_state)?;
        Ok(self.spawn(graph, run))
    }

    /// Like [`start_run`](Self::start_run), but attaches `sink` to the run's
    /// log before the first line can be produced.
    pub fn start_run_with_subscriber(
        &self,
        graph_id: &str,
        initial_state: State,
        sink: Arc<dyn LogSink>,
    ) -> Result<(RunId, SubscriptionId), FlowError> {
        let (graph, run) = self.prepare(graph_id, initial_state)?;
        let subscription = self.store.subscribe(&run.run_id, sink);
        Ok((self.spawn(graph, run), subscription))
    }

    fn prepare(&self, graph_id: &str, initial_state: State) -> Result<(Arc<Graph>, Run), FlowError> {
        let graph = self
            .store
            .get_graph(graph_id)
            .ok_or_else(|| FlowError::GraphNotFound(graph_id.to_string()))?;
        let run = self.store.create_run(graph_id, initial_state);
        Ok((graph, run))
    }

    fn spawn(&self, graph: Arc<Graph>, run: Run) -> RunId {
        let run_id = run.run_id.clone();
        let executor = Arc::clone(&self.executor);
        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move {
            let broadcaster = store.broadcaster(run.run_id.clone());
            executor
                .execute(&graph, run, &registry, &store, &broadcaster)
                .await
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(run_id.clone(), handle);
        run_id
    }

    /// Snapshot of a run record.
    pub fn get_run(&self, run_id: &str) -> Result<Run, FlowError> {
        self.store
            .get_run(run_id)
            .ok_or_else(|| FlowError::RunNotFound(run_id.to_string()))
    }

    /// Wait for a run started by this engine to end and return its final record.
    pub async fn wait(&self, run_id: &str) -> Result<Run, FlowError> {
        let handle = self.tasks.lock().remove(run_id);
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| FlowError::Execution(format!("Run task {} aborted: {}", run_id, e))),
            // Already reaped: the stored record is final.
            None => self.get_run(run_id),
        }
    }

    /// Number of runs whose task is still executing.
    pub fn active_runs(&self) -> usize {
        self.tasks
            .lock()
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

/// Configuration for the engine
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Pause before a node re-runs because its loop condition held.
    pub loop_pause: Duration,
    /// Upper bound on a single send to one log subscriber.
    pub subscriber_timeout: Duration,
    /// Node executions allowed per run; `None` is unbounded.
    pub max_steps: Option<usize>,
}

impl RuntimeConfig {
    /// Defaults overridden by `FLOW_LOOP_PAUSE_MS`,
    /// `FLOW_SUBSCRIBER_TIMEOUT_MS` and `FLOW_MAX_STEPS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_number("FLOW_LOOP_PAUSE_MS") {
            config.loop_pause = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number("FLOW_SUBSCRIBER_TIMEOUT_MS") {
            config.subscriber_timeout = Duration::from_millis(ms);
        }
        if let Some(steps) = env_number("FLOW_MAX_STEPS") {
            config.max_steps = Some(steps as usize);
        }
        config
    }
}

fn env_number(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a non-negative integer", key, raw);
            None
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loop_pause: Duration::from_millis(100),
            subscriber_timeout: Duration::from_secs(5),
            max_steps: None,
        }
    }
}
