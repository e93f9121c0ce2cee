//! Per-attempt performance records and where they go.
//!
//! Sinks are fire-and-forget: [`PerformanceSink::record`] is synchronous,
//! never fails and never waits.

use std::future::Future;
use std::time::{Duration, Instant};

use log::info;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One provider attempt. Observability only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRecord {
    pub operation: String,
    pub provider: String,
    pub duration: Duration,
    pub success: bool,
    pub item_count: usize,
}

impl std::fmt::Display for PerformanceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PERFORMANCE: {} via {} - {} in {:.3}s ({} items)",
            self.operation,
            self.provider,
            if self.success { "SUCCESS" } else { "FAILED" },
            self.duration.as_secs_f64(),
            self.item_count
        )
    }
}

pub trait PerformanceSink: Send + Sync {
    fn record(&self, record: PerformanceRecord);
}

/// Writes each record as an `info` log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PerformanceSink for LogSink {
    fn record(&self, record: PerformanceRecord) {
        info!("{}", record);
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl PerformanceSink for NoopSink {
    fn record(&self, _record: PerformanceRecord) {}
}

/// Forwards records over an unbounded channel.
///
/// A dropped receiver silently discards further records.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<PerformanceRecord>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<PerformanceRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PerformanceSink for ChannelSink {
    fn record(&self, record: PerformanceRecord) {
        let _ = self.sender.send(record);
    }
}

/// Runs `fut`, returning its output and wall-clock duration.
pub async fn timed<F: Future>(fut: F) -> (F::Output, Duration) {
    let started = Instant::now();
    let output = fut.await;
    (output, started.elapsed())
}
