//! Failover across data sources, with per-attempt telemetry.

mod diagnostics;
mod failover;
mod operation;
mod telemetry;

pub use diagnostics::{AttemptOutcome, FailoverDiagnostics, SkipReason, SourceAttempt};
pub use failover::FailoverOrchestrator;
pub use operation::{Operation, OperationOutput};
pub use telemetry::{timed, ChannelSink, LogSink, NoopSink, PerformanceRecord, PerformanceSink};
