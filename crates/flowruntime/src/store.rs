use async_trait::async_trait;
use flowcore::{
    new_graph_id, new_run_id, Graph, GraphDef, GraphId, LogSink, Run, RunId, SinkError, State,
};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Handle returned by [`Store::subscribe`], used to unsubscribe.
pub type SubscriptionId = u64;

struct Subscriber {
    id: SubscriptionId,
    sink: Arc<dyn LogSink>,
}

/// In-memory storage for graphs, runs and per-run log subscribers.
///
/// Graphs and runs share nothing with the subscriber lists: subscribing
/// never contends with an executor saving its run.
pub struct Store {
    graphs: RwLock<HashMap<GraphId, Arc<Graph>>>,
    runs: RwLock<HashMap<RunId, Run>>,
    subscribers: Mutex<HashMap<RunId, Vec<Subscriber>>>,
    next_subscription: AtomicU64,
    send_timeout: Duration,
}

impl Store {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            graphs: RwLock::new(HashMap::new()),
            runs: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            send_timeout,
        }
    }

    /// Assign a fresh id to `def` and store it. Ids are regenerated on the
    /// rare collision with an existing graph.
    pub fn create_graph(&self, def: GraphDef) -> Arc<Graph> {
        let mut graphs = self.graphs.write();
        let mut id = new_graph_id();
        while graphs.contains_key(&id) {
            id = new_graph_id();
        }
        let graph = Arc::new(Graph::from_def(id.clone(), def));
        graphs.insert(id, Arc::clone(&graph));
        graph
    }

    pub fn get_graph(&self, graph_id: &str) -> Option<Arc<Graph>> {
        self.graphs.read().get(graph_id).cloned()
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.read().len()
    }

    /// Create and store a `running` run for `graph_id`, seeded with
    /// `initial_state`. The caller checks that the graph exists.
    pub fn create_run(&self, graph_id: &str, initial_state: State) -> Run {
        let mut runs = self.runs.write();
        let mut id = new_run_id();
        while runs.contains_key(&id) {
            id = new_run_id();
        }
        let run = Run::new(id.clone(), graph_id.to_string(), initial_state);
        runs.insert(id, run.clone());
        run
    }

    /// Apply `update` to the stored record in place. Returns false for an
    /// unknown run.
    pub fn update_run(&self, run_id: &str, update: impl FnOnce(&mut Run)) -> bool {
        match self.runs.write().get_mut(run_id) {
            Some(run) => {
                update(run);
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of a run record.
    pub fn get_run(&self, run_id: &str) -> Option<Run> {
        self.runs.read().get(run_id).cloned()
    }

    pub fn run_count(&self) -> usize {
        self.runs.read().len()
    }

    pub fn subscribe(&self, run_id: &str, sink: Arc<dyn LogSink>) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .entry(run_id.to_string())
            .or_default()
            .push(Subscriber { id, sink });
        tracing::debug!("Subscriber {} attached to run {}", id, run_id);
        id
    }

    /// Remove a subscriber. The run's list is dropped once it is empty.
    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, run_id: &str, subscription: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(list) = subscribers.get_mut(run_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != subscription);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(run_id);
        }
        if removed {
            tracing::debug!("Subscriber {} detached from run {}", subscription, run_id);
        }
        removed
    }

    /// Snapshot of the sinks currently subscribed to `run_id`.
    pub fn subscribers(&self, run_id: &str) -> Vec<Arc<dyn LogSink>> {
        self.snapshot(run_id)
            .into_iter()
            .map(|(_, sink)| sink)
            .collect()
    }

    fn snapshot(&self, run_id: &str) -> Vec<(SubscriptionId, Arc<dyn LogSink>)> {
        self.subscribers
            .lock()
            .get(run_id)
            .map(|list| list.iter().map(|s| (s.id, Arc::clone(&s.sink))).collect())
            .unwrap_or_default()
    }

    /// Send `line` to every subscriber of `run_id`.
    ///
    /// Each send is bounded by the store's timeout. A subscriber whose send
    /// times out or finds the channel closed is unsubscribed, so it costs at
    /// most one timeout per run.
    pub async fn broadcast(&self, run_id: &str, line: &str) {
        let sinks = self.snapshot(run_id);
        if sinks.is_empty() {
            return;
        }
        let send_timeout = self.send_timeout;
        let sends = sinks.iter().map(|(id, sink)| async move {
            let result = match timeout(send_timeout, sink.send(line)).await {
                Ok(result) => result,
                Err(_) => Err(SinkError::Timeout {
                    millis: send_timeout.as_millis() as u64,
                }),
            };
            (*id, result)
        });
        for (id, result) in join_all(sends).await {
            if let Err(e) = result {
                tracing::warn!(
                    "Dropping subscriber {} of run {} after failed send: {}",
                    id,
                    run_id,
                    e
                );
                self.unsubscribe(run_id, id);
            }
        }
    }

    /// Sink that fans lines for `run_id` out to its current subscribers.
    pub fn broadcaster(self: &Arc<Self>, run_id: impl Into<RunId>) -> RunBroadcaster {
        RunBroadcaster {
            store: Arc::clone(self),
            run_id: run_id.into(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// [`LogSink`] bound to one run that delivers through [`Store::broadcast`].
pub struct RunBroadcaster {
    store: Arc<Store>,
    run_id: RunId,
}

#[async_trait]
impl LogSink for RunBroadcaster {
    async fn send(&self, line: &str) -> Result<(), SinkError> {
        self.store.broadcast(&self.run_id, line).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcore::{ChannelSink, NodeDef, RunStatus};

    struct StalledSink;

    #[async_trait]
    impl LogSink for StalledSink {
        async fn send(&self, _line: &str) -> Result<(), SinkError> {
            futures::future::pending().await
        }
    }

    #[test]
    fn test_create_graph_assigns_prefixed_id() {
        let store = Store::default();
        let graph = store.create_graph(GraphDef::new().node(NodeDef::new("a", "noop")));
        assert!(graph.id.starts_with("g_"));
        assert_eq!(graph.start_node.as_deref(), Some("a"));
        assert!(store.get_graph(&graph.id).is_some());
        assert!(store.get_graph("g_missing").is_none());
    }

    #[test]
    fn test_get_run_returns_snapshot() {
        let store = Store::default();
        let run = store.create_run("g_1", State::new());
        let mut snapshot = store.get_run(&run.run_id).unwrap();
        snapshot.log.push("local edit".to_string());
        snapshot.complete(RunStatus::Failed);

        let stored = store.get_run(&run.run_id).unwrap();
        assert!(stored.log.is_empty());
        assert_eq!(stored.status, RunStatus::Running);
    }

    #[test]
    fn test_unsubscribe_drops_empty_list() {
        let store = Store::default();
        let (a, _rx_a) = ChannelSink::channel(4);
        let (b, _rx_b) = ChannelSink::channel(4);
        let sub_a = store.subscribe("r_1", Arc::new(a));
        let sub_b = store.subscribe("r_1", Arc::new(b));
        assert_eq!(store.subscribers("r_1").len(), 2);

        assert!(store.unsubscribe("r_1", sub_a));
        assert!(!store.unsubscribe("r_1", sub_a));
        assert_eq!(store.subscribers("r_1").len(), 1);

        assert!(store.unsubscribe("r_1", sub_b));
        assert!(store.subscribers.lock().get("r_1").is_none());
    }

    #[tokio::test]
    async fn test_broadcast_skips_stalled_subscriber() {
        let store = Arc::new(Store::new(Duration::from_millis(20)));
        let (sink, mut rx) = ChannelSink::channel(4);
        store.subscribe("r_1", Arc::new(StalledSink));
        store.subscribe("r_1", Arc::new(sink));

        let broadcaster = store.broadcaster("r_1");
        broadcaster.send("first").await.unwrap();
        broadcaster.send("second").await.unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_stalled_subscriber_costs_one_timeout() {
        let send_timeout = Duration::from_millis(300);
        let store = Store::new(send_timeout);
        let (sink, mut rx) = ChannelSink::channel(4);
        store.subscribe("r_1", Arc::new(StalledSink));
        store.subscribe("r_1", Arc::new(sink));

        store.broadcast("r_1", "first").await;
        assert_eq!(store.subscribers("r_1").len(), 1);

        let started = std::time::Instant::now();
        store.broadcast("r_1", "second").await;
        assert!(started.elapsed() < send_timeout);

        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_broadcast_drops_closed_subscriber() {
        let store = Store::default();
        let (closed, rx_closed) = ChannelSink::channel(1);
        drop(rx_closed);
        store.subscribe("r_1", Arc::new(closed));
        let (open, mut rx_open) = ChannelSink::channel(1);
        let open_id = store.subscribe("r_1", Arc::new(open));

        store.broadcast("r_1", "hello").await;
        assert_eq!(rx_open.recv().await.as_deref(), Some("hello"));
        assert_eq!(store.subscribers("r_1").len(), 1);

        assert!(store.unsubscribe("r_1", open_id));
        assert!(store.subscribers.lock().get("r_1").is_none());
    }

    #[test]
    fn test_update_run_appends_in_place() {
        let store = Store::default();
        let run = store.create_run("g_1", State::new());
        assert!(store.update_run(&run.run_id, |r| r.log.push("line".to_string())));
        assert!(!store.update_run("r_missing", |r| r.log.clear()));
        assert_eq!(store.get_run(&run.run_id).unwrap().log, vec!["line"]);
    }
}
