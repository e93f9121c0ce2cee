//! Primary-then-fallback execution of an [`Operation`].

use std::sync::Arc;
use std::time::Duration;

use finsource_core::DataKind;
use log::{debug, warn};

use super::diagnostics::{FailoverDiagnostics, SkipReason};
use super::operation::{Operation, OperationOutput};
use super::telemetry::{timed, PerformanceRecord, PerformanceSink};
use crate::errors::ProviderError;
use crate::registry::SourceRegistry;
use crate::settings::Settings;

/// Runs an operation against the primary source, then walks the fallback
/// chain until a source answers.
///
/// Sources that are unregistered, unavailable or lack the capability are
/// skipped without a call. Every call emits one [`PerformanceRecord`].
pub struct FailoverOrchestrator {
    registry: Arc<SourceRegistry>,
    sink: Arc<dyn PerformanceSink>,
    fallback_order: Vec<String>,
    fallback_enabled: bool,
    treat_empty_as_failure: bool,
}

impl FailoverOrchestrator {
    pub fn new(registry: Arc<SourceRegistry>, sink: Arc<dyn PerformanceSink>) -> Self {
        Self {
            registry,
            sink,
            fallback_order: Vec::new(),
            fallback_enabled: true,
            treat_empty_as_failure: true,
        }
    }

    pub fn from_settings(
        registry: Arc<SourceRegistry>,
        sink: Arc<dyn PerformanceSink>,
        settings: &Settings,
    ) -> Self {
        Self::new(registry, sink)
            .with_fallback_order(settings.fallback_order.clone())
            .with_fallback_enabled(settings.fallback_enabled)
            .with_empty_as_failure(settings.treat_empty_as_failure)
    }

    /// Empty means every registered source in registration order.
    pub fn with_fallback_order(mut self, order: Vec<String>) -> Self {
        self.fallback_order = order;
        self
    }

    pub fn with_fallback_enabled(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    pub fn with_empty_as_failure(mut self, enabled: bool) -> Self {
        self.treat_empty_as_failure = enabled;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback_enabled
    }

    /// Source names in the order they will be tried.
    ///
    /// `primary` defaults to the registry default; unknown names resolve to it.
    pub fn chain(&self, primary: Option<&str>) -> Vec<String> {
        let primary = self
            .registry
            .resolve_name(primary.unwrap_or_else(|| self.registry.default_name()));
        let mut chain = vec![primary];
        if !self.fallback_enabled {
            return chain;
        }

        let candidates: Vec<String> = if self.fallback_order.is_empty() {
            self.registry.names()
        } else {
            self.fallback_order
                .iter()
                .filter_map(|name| match self.registry.canonical_name(name) {
                    Some(canonical) => Some(canonical.to_string()),
                    None => {
                        warn!("Ignoring unknown fallback source '{}'", name);
                        None
                    }
                })
                .collect()
        };

        for name in candidates {
            if !chain.contains(&name) {
                chain.push(name);
            }
        }
        chain
    }

    /// An empty answer for these kinds usually means silent throttling.
    fn empty_is_failure(&self, kind: DataKind) -> bool {
        self.treat_empty_as_failure
            && matches!(
                kind,
                DataKind::Prices
                    | DataKind::FinancialMetrics
                    | DataKind::LineItems
                    | DataKind::MarketCap
            )
    }

    fn emit(&self, op: &Operation, source: &str, duration: Duration, success: bool, items: usize) {
        self.sink.record(PerformanceRecord {
            operation: op.name().to_string(),
            provider: source.to_string(),
            duration,
            success,
            item_count: items,
        });
    }

    /// Degrading entry point: when every source fails the result is an empty
    /// list, or `None` for market cap.
    pub async fn execute(
        &self,
        op: &Operation,
        primary: Option<&str>,
        force_refresh: bool,
    ) -> OperationOutput {
        match self.try_execute(op, primary, force_refresh).await {
            Ok(output) => output,
            Err(e) => {
                debug!("Degrading {} for {} to empty: {}", op.name(), op.ticker(), e);
                OperationOutput::empty_for(op.kind())
            }
        }
    }

    /// Strict entry point.
    ///
    /// Returns `Ok` with an empty output when at least one source answered
    /// without error, and [`ProviderError::AllSourcesExhausted`] when none did.
    pub async fn try_execute(
        &self,
        op: &Operation,
        primary: Option<&str>,
        force_refresh: bool,
    ) -> Result<OperationOutput, ProviderError> {
        self.execute_with_diagnostics(op, primary, force_refresh)
            .await
            .0
    }

    pub async fn execute_with_diagnostics(
        &self,
        op: &Operation,
        primary: Option<&str>,
        force_refresh: bool,
    ) -> (Result<OperationOutput, ProviderError>, FailoverDiagnostics) {
        let kind = op.kind();
        let mut diagnostics = FailoverDiagnostics::new();
        let mut empty_answer: Option<OperationOutput> = None;
        let mut last_error: Option<ProviderError> = None;

        for name in self.chain(primary) {
            let Some(source) = self.registry.get(&name) else {
                diagnostics.record_skip(&name, SkipReason::Unknown);
                continue;
            };
            if !source.is_available() {
                let reason = source
                    .unavailable_reason()
                    .unwrap_or_else(|| "not configured".to_string());
                debug!("Skipping '{}' for {}: {}", name, op.name(), reason);
                diagnostics.record_skip(&name, SkipReason::Unavailable { reason });
                continue;
            }
            if !source.capabilities().supports(kind) {
                debug!("Skipping '{}': {} not supported", name, op.name());
                diagnostics.record_skip(&name, SkipReason::NotSupported);
                continue;
            }

            if !diagnostics.called().is_empty() {
                warn!("Falling back to '{}' for {} {}", name, op.name(), op.ticker());
            }

            let (result, duration) = timed(op.dispatch(source.as_ref(), force_refresh)).await;
            match result {
                Ok(output) if output.is_empty() && self.empty_is_failure(kind) => {
                    self.emit(op, &name, duration, false, 0);
                    warn!(
                        "'{}' returned no data for {} {}, treating as failure",
                        name,
                        op.name(),
                        op.ticker()
                    );
                    diagnostics.record_empty(&name);
                    empty_answer.get_or_insert(output);
                }
                Ok(output) => {
                    self.emit(op, &name, duration, true, output.item_count());
                    diagnostics.record_success(&name);
                    return (Ok(output), diagnostics);
                }
                Err(e) => {
                    self.emit(op, &name, duration, false, 0);
                    warn!("'{}' failed {} for {}: {}", name, op.name(), op.ticker(), e);
                    diagnostics.record_error(&name, e.to_string());
                    last_error = Some(e);
                }
            }
        }

        if diagnostics.any_answered() {
            debug!("{} {}: {}", op.name(), op.ticker(), diagnostics.summary());
            let output = empty_answer.unwrap_or_else(|| OperationOutput::empty_for(kind));
            return (Ok(output), diagnostics);
        }

        warn!(
            "All sources exhausted for {} {}: {}",
            op.name(),
            op.ticker(),
            diagnostics.summary()
        );
        let error = ProviderError::AllSourcesExhausted {
            operation: op.name().to_string(),
            attempted: diagnostics.called(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no source can serve this operation".to_string()),
        };
        (Err(error), diagnostics)
    }
}
