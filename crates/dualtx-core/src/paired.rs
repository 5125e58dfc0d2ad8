//! Aggregated status over the primary/secondary transaction pair.

use dualtx_error::Result;
use dualtx_observability::{AnomalyEvent, AnomalySink};

use crate::status::{Savepoint, TransactionStatus};

// ---------------------------------------------------------------------------
// PairedSavepoint
// ---------------------------------------------------------------------------

/// A savepoint spanning both resources.
///
/// Only [`PairedStatus::create_savepoint`] constructs one, pairing a token
/// created on each side in the same call. It is usable only as a unit
/// through the paired savepoint operations; handing it to a single-resource
/// status is rejected by that status as a foreign token.
pub struct PairedSavepoint {
    primary: Savepoint,
    secondary: Savepoint,
}

// ---------------------------------------------------------------------------
// PairedStatus
// ---------------------------------------------------------------------------

/// Composite transaction status over the fixed (primary, secondary) pair.
///
/// Exactly two handles, in asymmetric roles, immutable once paired. The two
/// handles must come from transactions opened in the same nesting operation;
/// [`crate::DualTemplate::execute`] is the only intended producer.
///
/// Read flags aggregate per named rule, not uniformly:
///
/// - `is_new_transaction`, `has_savepoint`, `is_rollback_only`: **OR** — the
///   pair counts as new/savepointed/rollback-only as soon as either side is.
/// - `is_completed`: **AND** — the pair is only complete once both sides are.
///
/// Any disagreement between the two sides is reported as a status-divergence
/// anomaly naming the method and both raw values; the aggregated value is
/// still returned.
pub struct PairedStatus<'a> {
    primary: &'a dyn TransactionStatus,
    secondary: &'a dyn TransactionStatus,
    sink: &'a dyn AnomalySink,
}

impl<'a> PairedStatus<'a> {
    /// Pair two live statuses.
    #[must_use]
    pub fn new(
        primary: &'a dyn TransactionStatus,
        secondary: &'a dyn TransactionStatus,
        sink: &'a dyn AnomalySink,
    ) -> Self {
        Self {
            primary,
            secondary,
            sink,
        }
    }

    fn aggregate_or(&self, method: &'static str, primary: bool, secondary: bool) -> bool {
        self.report_divergence(method, primary, secondary);
        primary || secondary
    }

    fn aggregate_and(&self, method: &'static str, primary: bool, secondary: bool) -> bool {
        self.report_divergence(method, primary, secondary);
        primary && secondary
    }

    fn report_divergence(&self, method: &'static str, primary: bool, secondary: bool) {
        if primary != secondary {
            self.sink.record(&AnomalyEvent::StatusDivergence {
                method,
                primary,
                secondary,
            });
        }
    }
}

impl TransactionStatus for PairedStatus<'_> {
    fn is_new_transaction(&self) -> bool {
        self.aggregate_or(
            "is_new_transaction",
            self.primary.is_new_transaction(),
            self.secondary.is_new_transaction(),
        )
    }

    fn has_savepoint(&self) -> bool {
        self.aggregate_or(
            "has_savepoint",
            self.primary.has_savepoint(),
            self.secondary.has_savepoint(),
        )
    }

    fn is_rollback_only(&self) -> bool {
        self.aggregate_or(
            "is_rollback_only",
            self.primary.is_rollback_only(),
            self.secondary.is_rollback_only(),
        )
    }

    fn is_completed(&self) -> bool {
        self.aggregate_and(
            "is_completed",
            self.primary.is_completed(),
            self.secondary.is_completed(),
        )
    }

    /// Marks both sides rollback-only, unconditionally. A write has no
    /// aggregation ambiguity, so no divergence check here.
    fn set_rollback_only(&self) {
        self.primary.set_rollback_only();
        self.secondary.set_rollback_only();
    }

    fn flush(&self) -> Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }

    /// Creates a savepoint on each side and pairs them.
    ///
    /// # Errors
    /// Either side's failure propagates and no paired token is constructed.
    /// A savepoint already created on the primary before a secondary failure
    /// stays physically present on that resource; accepted residual, not
    /// remediated.
    fn create_savepoint(&self) -> Result<Savepoint> {
        let primary = self.primary.create_savepoint()?;
        let secondary = self.secondary.create_savepoint()?;
        Ok(Savepoint::new(PairedSavepoint { primary, secondary }))
    }

    /// Paired tokens roll back each side to its own component. A bare token
    /// predates the paired machinery: it belongs to the primary resource and
    /// leaves the secondary untouched.
    fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        match savepoint.downcast_ref::<PairedSavepoint>() {
            Some(pair) => {
                self.primary.rollback_to_savepoint(&pair.primary)?;
                self.secondary.rollback_to_savepoint(&pair.secondary)
            }
            None => self.primary.rollback_to_savepoint(savepoint),
        }
    }

    /// Symmetric to [`rollback_to_savepoint`](Self::rollback_to_savepoint):
    /// paired tokens release both sides, bare tokens release only the
    /// primary.
    fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        match savepoint.downcast_ref::<PairedSavepoint>() {
            Some(pair) => {
                self.primary.release_savepoint(&pair.primary)?;
                self.secondary.release_savepoint(&pair.secondary)
            }
            None => self.primary.release_savepoint(savepoint),
        }
    }
}
