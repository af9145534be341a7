use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::job::{JobOutcome, WorkerError};

/// One message taken from the ingress queue, not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub payload: Vec<u8>,
}

/// Broker surface the job processor needs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// `None` once the queue is exhausted.
    async fn next_delivery(&self) -> Result<Option<Delivery>>;

    async fn ack(&self, tag: u64) -> Result<()>;

    /// Negative acknowledgment without requeue.
    async fn reject(&self, tag: u64) -> Result<()>;

    /// Durable publish to the results queue.
    async fn publish(&self, outcome: &JobOutcome) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    pending: VecDeque<Delivery>,
    next_tag: u64,
    acked: Vec<u64>,
    rejected: Vec<u64>,
    published: Vec<serde_json::Value>,
}

/// In-process queue that records every acknowledgment and outcome.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<MemoryState>,
    fail_publish: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a payload; returns its delivery tag.
    pub async fn push(&self, payload: impl Into<Vec<u8>>) -> u64 {
        let mut state = self.state.lock().await;
        state.next_tag += 1;
        let tag = state.next_tag;
        state.pending.push_back(Delivery {
            tag,
            payload: payload.into(),
        });
        tag
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub async fn acked(&self) -> Vec<u64> {
        self.state.lock().await.acked.clone()
    }

    pub async fn rejected(&self) -> Vec<u64> {
        self.state.lock().await.rejected.clone()
    }

    /// Outcomes as they went over the wire.
    pub async fn published(&self) -> Vec<serde_json::Value> {
        self.state.lock().await.published.clone()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn next_delivery(&self) -> Result<Option<Delivery>> {
        Ok(self.state.lock().await.pending.pop_front())
    }

    async fn ack(&self, tag: u64) -> Result<()> {
        self.state.lock().await.acked.push(tag);
        Ok(())
    }

    async fn reject(&self, tag: u64) -> Result<()> {
        self.state.lock().await.rejected.push(tag);
        Ok(())
    }

    async fn publish(&self, outcome: &JobOutcome) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(WorkerError::Publish("results queue unavailable".to_string()).into());
        }
        let value = serde_json::to_value(outcome).context("Failed to serialize outcome")?;
        self.state.lock().await.published.push(value);
        Ok(())
    }
}

/// Line-delimited JSON: one work item per input line, one outcome per output line.
/// Lines are framed as raw bytes; decoding is left to the consumer.
pub struct JsonLinesQueue<R, W> {
    ingress: String,
    egress: String,
    reader: Mutex<R>,
    writer: Mutex<W>,
    next_tag: AtomicU64,
}

impl<R, W> JsonLinesQueue<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(ingress: impl Into<String>, egress: impl Into<String>, reader: R, writer: W) -> Self {
        Self {
            ingress: ingress.into(),
            egress: egress.into(),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            next_tag: AtomicU64::new(0),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<R, W> JobQueue for JsonLinesQueue<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_delivery(&self) -> Result<Option<Delivery>> {
        let mut reader = self.reader.lock().await;
        loop {
            let mut line = Vec::new();
            let read = reader
                .read_until(b'\n', &mut line)
                .await
                .with_context(|| format!("Failed to read from {}", self.ingress))?;
            if read == 0 {
                return Ok(None);
            }

            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }
            // blank lines carry no message
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let tag = self.next_tag.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(Some(Delivery { tag, payload: line }));
        }
    }

    async fn ack(&self, tag: u64) -> Result<()> {
        debug!(queue = %self.ingress, tag, "ack");
        Ok(())
    }

    async fn reject(&self, tag: u64) -> Result<()> {
        warn!(queue = %self.ingress, tag, "reject (no requeue)");
        Ok(())
    }

    async fn publish(&self, outcome: &JobOutcome) -> Result<()> {
        let mut line = serde_json::to_string(outcome).context("Failed to serialize outcome")?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to publish to {}", self.egress))?;
        writer.flush().await.with_context(|| format!("Failed to flush {}", self.egress))?;
        Ok(())
    }
}
