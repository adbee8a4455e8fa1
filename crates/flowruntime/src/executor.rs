use crate::registry::ToolRegistry;
use crate::store::Store;
use flowcore::{value, FlowError, Graph, LogSink, NodeDef, Run, RunStatus, State, ToolInput};
use std::collections::HashMap;
use std::time::Instant;
use tokio::time::{sleep, Duration};

/// Interprets a graph node by node, following edges until the run ends.
pub struct GraphExecutor {
    loop_pause: Duration,
    max_steps: Option<usize>,
}

/// The run being executed plus the places its changes are published to.
///
/// `run` is the executor's working copy; every change is mirrored into the
/// stored record in place.
struct RunContext<'a> {
    run: Run,
    store: &'a Store,
    sink: &'a dyn LogSink,
}

impl RunContext<'_> {
    /// Append a line to both copies, then hand the line to the sink.
    async fn log(&mut self, line: String) {
        self.run.log.push(line.clone());
        self.store
            .update_run(&self.run.run_id, |stored| stored.log.push(line.clone()));
        self.emit(&line).await;
    }

    /// Merge tool output and append its line as one store update.
    async fn merge(&mut self, updates: State, line: String) {
        self.run.state.extend(updates.clone());
        self.run.log.push(line.clone());
        self.store.update_run(&self.run.run_id, |stored| {
            stored.state.extend(updates);
            stored.log.push(line.clone());
        });
        self.emit(&line).await;
    }

    /// Set the terminal status and final line as one store update.
    async fn finish(&mut self, status: RunStatus, line: String) {
        self.run.complete(status);
        self.run.log.push(line.clone());
        let finished_at = self.run.finished_at;
        self.store.update_run(&self.run.run_id, |stored| {
            stored.status = status;
            stored.finished_at = finished_at;
            stored.log.push(line.clone());
        });
        self.emit(&line).await;
    }

    async fn emit(&self, line: &str) {
        if let Err(e) = self.sink.send(line).await {
            tracing::warn!("Log sink rejected line for run {}: {}", self.run.run_id, e);
        }
    }
}

impl GraphExecutor {
    pub fn new(loop_pause: Duration, max_steps: Option<usize>) -> Self {
        Self {
            loop_pause,
            max_steps,
        }
    }

    /// Execute `run` against `graph` to completion and return the final record.
    ///
    /// Structural and tool errors never escape: they end the run with status
    /// `failed` and the diagnostic as the last log line.
    pub async fn execute(
        &self,
        graph: &Graph,
        run: Run,
        registry: &ToolRegistry,
        store: &Store,
        sink: &dyn LogSink,
    ) -> Run {
        let start_time = Instant::now();
        tracing::info!("Starting run {} of graph {}", run.run_id, graph.id);

        let mut ctx = RunContext { run, store, sink };
        let (status, line) = match self.drive(graph, registry, &mut ctx).await {
            Ok(()) => (RunStatus::Finished, "Run finished.".to_string()),
            Err(e) => (RunStatus::Failed, e.to_string()),
        };

        ctx.finish(status, line.clone()).await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        match status {
            RunStatus::Finished => {
                tracing::info!("Run {} finished in {}ms", ctx.run.run_id, duration_ms)
            }
            _ => tracing::warn!("Run {} failed after {}ms: {}", ctx.run.run_id, duration_ms, line),
        }
        ctx.run
    }

    async fn drive(
        &self,
        graph: &Graph,
        registry: &ToolRegistry,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), FlowError> {
        let nodes: HashMap<&str, &NodeDef> =
            graph.nodes.iter().map(|n| (n.name.as_str(), n)).collect();
        let mut current = graph
            .start_node
            .clone()
            .or_else(|| graph.nodes.first().map(|n| n.name.clone()));
        let mut steps = 0usize;

        while let Some(name) = current.take() {
            let node = *nodes
                .get(name.as_str())
                .ok_or_else(|| FlowError::NodeNotFound(name.clone()))?;

            loop {
                steps += 1;
                if let Some(limit) = self.max_steps {
                    if steps > limit {
                        return Err(FlowError::StepLimit(limit));
                    }
                }
                self.run_node(node, registry, ctx).await?;

                // The same node runs again, "Running node" line included.
                match &node.loop_condition {
                    Some(condition) if condition.evaluate(&ctx.run.state) => {
                        sleep(self.loop_pause).await;
                    }
                    _ => break,
                }
            }

            current = graph
                .edge(&name)
                .and_then(|edge| edge.next(&ctx.run.state))
                .map(str::to_string);
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    async fn run_node(
        &self,
        node: &NodeDef,
        registry: &ToolRegistry,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), FlowError> {
        ctx.log(format!("Running node '{}' → {}", node.name, node.function))
            .await;
        let tool = registry.lookup(&node.function)?;

        tracing::debug!(
            "Run {}: node {} calling {} ({:?})",
            ctx.run.run_id,
            node.name,
            node.function,
            tool.arity()
        );
        let input = ToolInput::for_arity(tool.arity(), &ctx.run.state);
        let updates = tool.call(input).await.map_err(|source| FlowError::Tool {
            node: node.name.clone(),
            source,
        })?;

        let line = format!("Node '{}' output: {}", node.name, value::render(&updates));
        ctx.merge(updates, line).await;
        Ok(())
    }
}

impl Default for GraphExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), None)
    }
}
