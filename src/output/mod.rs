pub mod sink;

pub use sink::{FrameSink, JsonLinesSink, MemorySink, SinkResult};
