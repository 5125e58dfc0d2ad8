//! Nested execution of one unit of work inside both resources' transactions.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dualtx_error::{DualTxError, Result, Role};
use dualtx_observability::{AnomalyEvent, AnomalySink, TracingSink};

use crate::manager::TransactionManager;
use crate::paired::PairedStatus;

/// Runs caller work inside both resources' transactions, the secondary
/// nested inside the primary.
///
/// Unwind order follows the nesting: the secondary transaction finalizes
/// first (commit on success, rollback on failure), then the primary. This is
/// NOT two-phase commit — the two commits are not atomic. If the secondary
/// has committed and the primary then fails (typically during its own
/// commit), the secondary cannot be undone; the template reports a
/// partial-commit anomaly and returns the primary-side failure unchanged.
///
/// Execution is synchronous: no work is spawned, both transactions run on
/// the calling thread of control for the full invocation.
pub struct DualTemplate<P, S> {
    primary: P,
    secondary: S,
    sink: Arc<dyn AnomalySink>,
}

impl<P, S> fmt::Debug for DualTemplate<P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualTemplate").finish_non_exhaustive()
    }
}

impl<P, S> DualTemplate<P, S>
where
    P: TransactionManager,
    S: TransactionManager,
{
    /// Start building a template. [`DualTemplateBuilder::build`] fails
    /// unless both managers were supplied.
    #[must_use]
    pub fn builder() -> DualTemplateBuilder<P, S> {
        DualTemplateBuilder::new()
    }

    /// Run `work` inside both transactions, handing it the two raw statuses
    /// (primary first, secondary second).
    ///
    /// The partial-success flag is raised the moment the secondary's nested
    /// execution returns cleanly — at that point the secondary has already
    /// finished its portion while the primary has not committed yet. If the
    /// surrounding primary execution then fails, a partial-commit anomaly is
    /// reported before the failure is returned.
    ///
    /// # Errors
    /// Whatever either transaction layer or `work` itself raised, unchanged:
    /// no retry, no suppression, no wrapping.
    pub fn execute_pair<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&P::Status, &S::Status) -> Result<T>,
    {
        let secondary_finished = AtomicBool::new(false);
        let result = self.primary.execute(|primary_status| {
            let value = self
                .secondary
                .execute(|secondary_status| work(primary_status, secondary_status))?;
            secondary_finished.store(true, Ordering::SeqCst);
            Ok(value)
        });
        if let Err(error) = &result {
            if secondary_finished.load(Ordering::SeqCst) {
                self.sink.record(&AnomalyEvent::PartialCommit {
                    error: error.to_string(),
                });
            }
        }
        result
    }

    /// Run `work` inside both transactions behind a single [`PairedStatus`].
    ///
    /// # Errors
    /// Same contract as [`execute_pair`](Self::execute_pair).
    pub fn execute<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&PairedStatus<'_>) -> Result<T>,
    {
        self.execute_pair(|primary_status, secondary_status| {
            let paired = PairedStatus::new(primary_status, secondary_status, self.sink.as_ref());
            work(&paired)
        })
    }
}

/// Builder for [`DualTemplate`].
///
/// Both managers are mandatory; their absence is a configuration error
/// raised by [`build`](Self::build), before any transaction is opened.
pub struct DualTemplateBuilder<P, S> {
    primary: Option<P>,
    secondary: Option<S>,
    sink: Arc<dyn AnomalySink>,
}

impl<P, S> DualTemplateBuilder<P, S> {
    /// New builder with no managers and the default `tracing` sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            primary: None,
            secondary: None,
            sink: Arc::new(TracingSink),
        }
    }

    /// Set the primary (outer) transaction manager.
    #[must_use]
    pub fn primary(mut self, manager: P) -> Self {
        self.primary = Some(manager);
        self
    }

    /// Set the secondary (nested) transaction manager.
    #[must_use]
    pub fn secondary(mut self, manager: S) -> Self {
        self.secondary = Some(manager);
        self
    }

    /// Replace the anomaly sink (defaults to [`TracingSink`]).
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn AnomalySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Finish construction.
    ///
    /// # Errors
    /// [`DualTxError::MissingManager`] naming the absent side. The primary
    /// is checked first when both are missing.
    pub fn build(self) -> Result<DualTemplate<P, S>> {
        let primary = self.primary.ok_or(DualTxError::MissingManager {
            role: Role::Primary,
        })?;
        let secondary = self.secondary.ok_or(DualTxError::MissingManager {
            role: Role::Secondary,
        })?;
        Ok(DualTemplate {
            primary,
            secondary,
            sink: self.sink,
        })
    }
}

impl<P, S> Default for DualTemplateBuilder<P, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use dualtx_observability::RecordingSink;

    use super::*;
    use crate::status::{Savepoint, TransactionStatus};

    /// Status with no observable behavior; template tests only exercise
    /// nesting and failure ordering.
    struct NullStatus;

    impl TransactionStatus for NullStatus {
        fn is_new_transaction(&self) -> bool {
            true
        }

        fn has_savepoint(&self) -> bool {
            false
        }

        fn is_rollback_only(&self) -> bool {
            false
        }

        fn is_completed(&self) -> bool {
            false
        }

        fn set_rollback_only(&self) {}

        fn flush(&self) -> Result<()> {
            Ok(())
        }

        fn create_savepoint(&self) -> Result<Savepoint> {
            Ok(Savepoint::new(()))
        }

        fn rollback_to_savepoint(&self, _savepoint: &Savepoint) -> Result<()> {
            Ok(())
        }

        fn release_savepoint(&self, _savepoint: &Savepoint) -> Result<()> {
            Ok(())
        }
    }

    /// Manager that runs work and then optionally fails its own commit.
    struct ScriptedManager {
        role: Role,
        fail_commit: Option<&'static str>,
    }

    impl ScriptedManager {
        fn new(role: Role) -> Self {
            Self {
                role,
                fail_commit: None,
            }
        }

        fn failing_commit(role: Role, detail: &'static str) -> Self {
            Self {
                fail_commit: Some(detail),
                ..Self::new(role)
            }
        }
    }

    impl TransactionManager for ScriptedManager {
        type Status = NullStatus;

        fn execute<T>(&self, work: impl FnOnce(&Self::Status) -> Result<T>) -> Result<T> {
            let value = work(&NullStatus)?;
            match self.fail_commit {
                Some(detail) => Err(DualTxError::CommitFailed {
                    role: self.role,
                    detail: detail.to_owned(),
                }),
                None => Ok(value),
            }
        }
    }

    fn template_with_sink(
        primary: ScriptedManager,
        secondary: ScriptedManager,
    ) -> (DualTemplate<ScriptedManager, ScriptedManager>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let template = DualTemplate::builder()
            .primary(primary)
            .secondary(secondary)
            .sink(sink.clone())
            .build()
            .expect("both managers supplied");
        (template, sink)
    }

    #[test]
    fn test_build_without_primary_is_a_config_error() {
        let result = DualTemplateBuilder::<ScriptedManager, ScriptedManager>::new()
            .secondary(ScriptedManager::new(Role::Secondary))
            .build();
        assert!(matches!(
            result,
            Err(DualTxError::MissingManager {
                role: Role::Primary
            })
        ));
    }

    #[test]
    fn test_build_without_secondary_is_a_config_error() {
        let result = DualTemplateBuilder::<ScriptedManager, ScriptedManager>::new()
            .primary(ScriptedManager::new(Role::Primary))
            .build();
        assert!(matches!(
            result,
            Err(DualTxError::MissingManager {
                role: Role::Secondary
            })
        ));
    }

    #[test]
    fn test_execute_pair_runs_work_once_in_both_managers() {
        let (template, sink) = template_with_sink(
            ScriptedManager::new(Role::Primary),
            ScriptedManager::new(Role::Secondary),
        );

        let calls = AtomicU32::new(0);
        let result = template.execute_pair(|_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        });

        assert_eq!(result.expect("work should succeed"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly-once execution");
        assert!(sink.is_empty(), "clean run emits no anomalies");
    }

    #[test]
    fn test_work_failure_propagates_without_partial_commit_anomaly() {
        let (template, sink) = template_with_sink(
            ScriptedManager::new(Role::Primary),
            ScriptedManager::new(Role::Secondary),
        );

        let result: Result<()> = template.execute_pair(|_, _| {
            Err(DualTxError::Backend {
                role: Role::Secondary,
                detail: "constraint violation".to_owned(),
            })
        });

        assert!(matches!(
            result,
            Err(DualTxError::Backend {
                role: Role::Secondary,
                ..
            })
        ));
        assert!(
            sink.is_empty(),
            "secondary never finished, so no partial-commit anomaly"
        );
    }

    #[test]
    fn test_primary_commit_failure_after_secondary_success_is_reported() {
        let (template, sink) = template_with_sink(
            ScriptedManager::failing_commit(Role::Primary, "disk full"),
            ScriptedManager::new(Role::Secondary),
        );

        let result = template.execute_pair(|_, _| Ok(1));

        // Original failure returned unchanged.
        match result {
            Err(DualTxError::CommitFailed { role, detail }) => {
                assert_eq!(role, Role::Primary);
                assert_eq!(detail, "disk full");
            }
            other => panic!("expected primary commit failure, got {other:?}"),
        }

        let events = sink.events();
        assert_eq!(events.len(), 1, "exactly one partial-commit anomaly");
        match &events[0] {
            AnomalyEvent::PartialCommit { error } => {
                assert_eq!(error, "primary commit failed: disk full");
            }
            other => panic!("expected partial-commit event, got {other:?}"),
        }
    }

    #[test]
    fn test_secondary_commit_failure_is_not_a_partial_commit() {
        let (template, sink) = template_with_sink(
            ScriptedManager::new(Role::Primary),
            ScriptedManager::failing_commit(Role::Secondary, "wal sync failed"),
        );

        let result = template.execute_pair(|_, _| Ok(1));

        assert!(matches!(
            result,
            Err(DualTxError::CommitFailed {
                role: Role::Secondary,
                ..
            })
        ));
        assert!(
            sink.is_empty(),
            "secondary did not finish, so nothing to report"
        );
    }

    #[test]
    fn test_execute_builds_a_paired_status_over_both_sides() {
        let (template, sink) = template_with_sink(
            ScriptedManager::new(Role::Primary),
            ScriptedManager::new(Role::Secondary),
        );

        let result = template.execute(|paired| {
            assert!(paired.is_new_transaction());
            assert!(!paired.is_completed());
            Ok("done")
        });

        assert_eq!(result.expect("work should succeed"), "done");
        assert!(sink.is_empty(), "agreeing sides emit no divergence");
    }
}
