// crates/flowcore/src/events/mod.rs

mod sink;

pub use sink::{ChannelSink, LogSink, SinkError};
