//! Transaction-presence guard for statement execution surfaces.
//!
//! [`TransactionCheckExecutor`] wraps any [`StatementExecutor`] and reports a
//! missing-transaction anomaly (error level, statement text plus a captured
//! call-site backtrace) whenever a mutating statement runs while the ambient
//! transaction signal says nothing is open. Detection only: the statement
//! always executes, results and errors pass through untouched, and the guard
//! mutates no state of its own.
//!
//! The guard is an independent, composable concern: apply it to either
//! resource's executor, primary or secondary, to catch code paths that
//! bypass the dual-transaction template.

use std::backtrace::Backtrace;
use std::sync::Arc;

use dualtx_core::TransactionProbe;
use dualtx_error::Result;
use dualtx_observability::{AnomalyEvent, AnomalySink, TracingSink};

// ---------------------------------------------------------------------------
// StatementExecutor
// ---------------------------------------------------------------------------

/// Minimal mutating-statement execution surface the guard wraps.
///
/// The associated types keep binding mechanics out of scope: `Params` may be
/// a positional list or a name→value map — the guard never looks inside it —
/// and `Statement` is whatever prepared-statement handle the resource gives
/// to execute callbacks.
pub trait StatementExecutor {
    /// Parameter bundle for one statement execution.
    type Params;
    /// Prepared-statement handle handed to execute callbacks.
    type Statement;

    /// Run a single mutating statement.
    ///
    /// # Errors
    /// Propagates the underlying executor's failure unchanged.
    fn update(&self, sql: &str) -> Result<u64>;

    /// Run a single parameterized mutating statement.
    ///
    /// # Errors
    /// Propagates the underlying executor's failure unchanged.
    fn update_with(&self, sql: &str, params: &Self::Params) -> Result<u64>;

    /// Run a batch of independent statements.
    ///
    /// # Errors
    /// Propagates the underlying executor's failure unchanged.
    fn batch_update(&self, statements: &[String]) -> Result<Vec<u64>>;

    /// Run one statement once per parameter bundle.
    ///
    /// # Errors
    /// Propagates the underlying executor's failure unchanged.
    fn batch_update_with(&self, sql: &str, batches: &[Self::Params]) -> Result<Vec<u64>>;

    /// Run an arbitrary statement.
    ///
    /// # Errors
    /// Propagates the underlying executor's failure unchanged.
    fn execute(&self, sql: &str) -> Result<()>;

    /// Prepare `sql` and hand the live statement to `action`.
    ///
    /// # Errors
    /// Propagates the underlying executor's or `action`'s failure unchanged.
    fn execute_with<R>(
        &self,
        sql: &str,
        action: impl FnOnce(&mut Self::Statement) -> Result<R>,
    ) -> Result<R>;
}

/// Whether `sql` is exempt from the presence check.
///
/// Prefix test only, after lowercasing: leading whitespace or comments
/// before `select` defeat the exemption. Known limitation kept on purpose —
/// the guard does no SQL parsing.
fn is_select(sql: &str) -> bool {
    sql.to_lowercase().starts_with("select")
}

// ---------------------------------------------------------------------------
// TransactionCheckExecutor
// ---------------------------------------------------------------------------

/// Pass-through decorator adding the presence check in front of every
/// mutating entry point.
///
/// The update and batch families always require an active transaction; the
/// execute family is exempt for statements classified as `select`. Batches
/// are checked once, using the first (or the single shared) statement text.
pub struct TransactionCheckExecutor<E, P> {
    inner: E,
    probe: P,
    sink: Arc<dyn AnomalySink>,
}

impl<E, P> TransactionCheckExecutor<E, P>
where
    E: StatementExecutor,
    P: TransactionProbe,
{
    /// Wrap `inner`, consulting `probe` before each mutating statement.
    /// Anomalies go to `tracing` through the default sink.
    #[must_use]
    pub fn new(inner: E, probe: P) -> Self {
        Self::with_sink(inner, probe, Arc::new(TracingSink))
    }

    /// Wrap `inner` with an explicit anomaly sink.
    #[must_use]
    pub fn with_sink(inner: E, probe: P, sink: Arc<dyn AnomalySink>) -> Self {
        Self { inner, probe, sink }
    }

    /// The wrapped executor.
    #[must_use]
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Unwrap, discarding the guard.
    #[must_use]
    pub fn into_inner(self) -> E {
        self.inner
    }

    fn require_open_transaction(&self, sql: &str) {
        if !self.probe.is_transaction_active() {
            self.sink.record(&AnomalyEvent::MissingTransaction {
                sql: sql.to_owned(),
                backtrace: Backtrace::force_capture().to_string(),
            });
        }
    }
}

impl<E, P> StatementExecutor for TransactionCheckExecutor<E, P>
where
    E: StatementExecutor,
    P: TransactionProbe,
{
    type Params = E::Params;
    type Statement = E::Statement;

    fn update(&self, sql: &str) -> Result<u64> {
        self.require_open_transaction(sql);
        self.inner.update(sql)
    }

    fn update_with(&self, sql: &str, params: &Self::Params) -> Result<u64> {
        self.require_open_transaction(sql);
        self.inner.update_with(sql, params)
    }

    fn batch_update(&self, statements: &[String]) -> Result<Vec<u64>> {
        // Homogeneous batches are classified by their first statement; an
        // empty batch has nothing to classify and delegates unchecked.
        if let Some(first) = statements.first() {
            self.require_open_transaction(first);
        }
        self.inner.batch_update(statements)
    }

    fn batch_update_with(&self, sql: &str, batches: &[Self::Params]) -> Result<Vec<u64>> {
        self.require_open_transaction(sql);
        self.inner.batch_update_with(sql, batches)
    }

    fn execute(&self, sql: &str) -> Result<()> {
        if !is_select(sql) {
            self.require_open_transaction(sql);
        }
        self.inner.execute(sql)
    }

    fn execute_with<R>(
        &self,
        sql: &str,
        action: impl FnOnce(&mut Self::Statement) -> Result<R>,
    ) -> Result<R> {
        if !is_select(sql) {
            self.require_open_transaction(sql);
        }
        self.inner.execute_with(sql, action)
    }
}
