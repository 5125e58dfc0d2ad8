//! Anomaly reporting for the dual-transaction migration toolkit.
//!
//! The coordination layer detects three operationally significant anomalies
//! and reports them here:
//!
//! - **Missing transaction**: a mutating statement ran while no transaction
//!   was open for the calling thread (error level).
//! - **Status divergence**: the two resources disagreed on a read-only
//!   transaction status flag (warn level).
//! - **Partial commit**: the secondary resource committed its nested
//!   transaction but the primary subsequently failed (warn level).
//!
//! All three are observability aids, never correctness gates: callers see
//! unchanged return values and unchanged errors. Events flow through the
//! [`AnomalySink`] trait so tests can assert on emissions without scraping
//! log output; the default [`TracingSink`] forwards each event to `tracing`
//! at its fixed severity.

use parking_lot::Mutex;
use serde::Serialize;

// ---------------------------------------------------------------------------
// AnomalyEvent — the core event type
// ---------------------------------------------------------------------------

/// Severity a sink should report an event at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    /// Operationally significant but expected under known limitations.
    Warn,
    /// Indicates a code path that bypasses transaction management.
    Error,
}

/// A single detection-only anomaly emitted by the coordination layer.
///
/// Each variant carries enough context to act on the report without access
/// to the transaction internals that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnomalyEvent {
    /// A mutating statement executed with no active transaction.
    MissingTransaction {
        /// The offending statement text.
        sql: String,
        /// Call-site backtrace captured when the check fired.
        backtrace: String,
    },

    /// The two resources disagreed on a read-only status flag.
    ///
    /// The aggregated value was still returned to the caller; divergence
    /// signals resource desynchronization worth investigating.
    StatusDivergence {
        /// Name of the status method that observed the disagreement.
        method: &'static str,
        /// The primary resource's raw flag value.
        primary: bool,
        /// The secondary resource's raw flag value.
        secondary: bool,
    },

    /// The secondary resource committed but the primary then failed.
    ///
    /// Inherent to nested (non-atomic) dual commit: the secondary cannot be
    /// rolled back once committed, so the divergence is reported and the
    /// primary-side failure propagates unchanged.
    PartialCommit {
        /// Display form of the primary-side failure.
        error: String,
    },
}

impl AnomalyEvent {
    /// The fixed severity of this event.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingTransaction { .. } => Severity::Error,
            Self::StatusDivergence { .. } | Self::PartialCommit { .. } => Severity::Warn,
        }
    }

    /// Short stable name for log correlation.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingTransaction { .. } => "missing_transaction",
            Self::StatusDivergence { .. } => "status_divergence",
            Self::PartialCommit { .. } => "partial_commit",
        }
    }
}

// ---------------------------------------------------------------------------
// AnomalySink — pluggable event destinations
// ---------------------------------------------------------------------------

/// Destination for anomaly events.
///
/// Sinks MUST NOT block or fail the operation that detected the anomaly;
/// reporting is purely diagnostic.
pub trait AnomalySink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &AnomalyEvent);
}

/// Default sink: forwards every event to `tracing` at its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AnomalySink for TracingSink {
    fn record(&self, event: &AnomalyEvent) {
        match event {
            AnomalyEvent::MissingTransaction { sql, backtrace } => {
                tracing::error!(
                    sql = %sql,
                    backtrace = %backtrace,
                    "no active transaction for mutating statement"
                );
            }
            AnomalyEvent::StatusDivergence {
                method,
                primary,
                secondary,
            } => {
                tracing::warn!(
                    method = *method,
                    primary = *primary,
                    secondary = *secondary,
                    "transaction status flags diverged between resources"
                );
            }
            AnomalyEvent::PartialCommit { error } => {
                tracing::warn!(
                    error = %error,
                    "secondary transaction committed but primary failed"
                );
            }
        }
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSink;

impl AnomalySink for NoOpSink {
    fn record(&self, _event: &AnomalyEvent) {}
}

/// Sink that buffers events for later inspection. Intended for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnomalyEvent>>,
}

impl RecordingSink {
    /// New empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<AnomalyEvent> {
        self.events.lock().clone()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AnomalySink for RecordingSink {
    fn record(&self, event: &AnomalyEvent) {
        self.events.lock().push(event.clone());
    }
}
