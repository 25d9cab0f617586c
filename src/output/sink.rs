use async_trait::async_trait;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use crate::core::Frame;

/// Result type for frame sink operations
pub type SinkResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Trait for downstream frame consumers
///
/// Sinks own whatever happens to a frame after the engine hands it over
/// (persistence, broadcast, display). Delivery is fire-and-forget from the
/// pipeline's point of view: a slow or failing sink never blocks or fails
/// a tick.
#[async_trait]
pub trait FrameSink: Send {
    /// Name of this sink, for log messages
    fn name(&self) -> &str;

    /// Deliver one frame
    async fn deliver(&mut self, frame: &Frame) -> SinkResult<()>;
}

/// Writes each frame as one JSON line
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameSink for JsonLinesSink<W> {
    fn name(&self) -> &str {
        "json-lines"
    }

    async fn deliver(&mut self, frame: &Frame) -> SinkResult<()> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Collects frames in memory, for tests and inspection
///
/// Clones share the same buffer, so a clone kept by the test sees what the
/// engine delivered.
#[derive(Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&mut self, frame: &Frame) -> SinkResult<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_memory_sink_shares_buffer_across_clones() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        writer.deliver(&Frame::empty(Utc::now())).await.unwrap();
        assert_eq!(sink.frame_count(), 1);
        assert!(sink.frames()[0].is_empty());
    }

    #[tokio::test]
    async fn test_json_lines_sink_writes_one_line_per_frame() {
        let mut buf = Vec::new();
        {
            let mut sink = JsonLinesSink::new(&mut buf);
            sink.deliver(&Frame::empty(Utc::now())).await.unwrap();
            sink.deliver(&Frame::empty(Utc::now())).await.unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.contains("\"entries\":[]")));
    }
}
