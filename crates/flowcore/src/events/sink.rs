use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Sink closed")]
    Closed,

    #[error("Send timed out after {millis}ms")]
    Timeout { millis: u64 },
}

/// Destination for run log lines.
///
/// The executor writes every line to one sink; fanning a line out to live
/// subscribers is the sink's business.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn send(&self, line: &str) -> Result<(), SinkError>;
}

/// Sink backed by a bounded channel. The receiving half is typically a
/// WebSocket writer or a terminal printer.
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiver that drains it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl LogSink for ChannelSink {
    async fn send(&self, line: &str) -> Result<(), SinkError> {
        self.sender
            .send(line.to_string())
            .await
            .map_err(|_| SinkError::Closed)
    }
}
