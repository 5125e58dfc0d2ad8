//! Deterministic in-memory fixtures for dualtx tests.
//!
//! A [`MockManager`] plays one resource's transaction layer: it journals
//! everything it is asked to do, honors rollback-only marks, and can be
//! scripted to fail its own commit — which is exactly the shape of the
//! partial-commit scenario. [`FlagProbe`] stands in for the ambient
//! active-transaction signal, and [`RecordingExecutor`] is a statement
//! executor that records calls and returns canned results.
//!
//! Everything here is synchronous and deterministic so failures reproduce
//! exactly.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use dualtx_core::{Savepoint, TransactionManager, TransactionProbe, TransactionStatus};
use dualtx_error::{DualTxError, Result, Role};
use dualtx_guard::StatementExecutor;

// ---------------------------------------------------------------------------
// Transaction journal
// ---------------------------------------------------------------------------

/// What a mock resource observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    /// A transaction was opened.
    Began,
    /// The transaction committed.
    Committed,
    /// The transaction rolled back.
    RolledBack,
    /// A savepoint with this id was created.
    SavepointCreated(u32),
    /// The transaction rolled back to the savepoint with this id.
    RolledBackTo(u32),
    /// The savepoint with this id was released.
    Released(u32),
    /// Pending changes were flushed.
    Flushed,
}

// ---------------------------------------------------------------------------
// MockManager / MockStatus
// ---------------------------------------------------------------------------

/// In-memory transaction manager for one mock resource.
///
/// `execute` journals `Began`, runs the work against a fresh [`MockStatus`],
/// then finalizes: rollback on error or rollback-only, commit otherwise. A
/// scripted commit failure consumes itself after firing once.
pub struct MockManager {
    role: Role,
    journal: Arc<Mutex<Vec<TxEvent>>>,
    fail_next_commit: Mutex<Option<String>>,
    savepoint_ids: Arc<AtomicU32>,
}

impl MockManager {
    /// New manager for the given side, with an empty journal.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            journal: Arc::new(Mutex::new(Vec::new())),
            fail_next_commit: Mutex::new(None),
            savepoint_ids: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Which side this manager plays.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Script the next commit to fail with `detail`.
    pub fn fail_next_commit(&self, detail: impl Into<String>) {
        *self.fail_next_commit.lock() = Some(detail.into());
    }

    /// Snapshot of everything journaled so far, in order.
    #[must_use]
    pub fn journal(&self) -> Vec<TxEvent> {
        self.journal.lock().clone()
    }

    /// Whether the journal records a commit.
    #[must_use]
    pub fn committed(&self) -> bool {
        self.journal.lock().contains(&TxEvent::Committed)
    }

    /// Whether the journal records a rollback.
    #[must_use]
    pub fn rolled_back(&self) -> bool {
        self.journal.lock().contains(&TxEvent::RolledBack)
    }
}

impl TransactionManager for MockManager {
    type Status = MockStatus;

    fn execute<T>(&self, work: impl FnOnce(&Self::Status) -> Result<T>) -> Result<T> {
        self.journal.lock().push(TxEvent::Began);
        let status = MockStatus {
            role: self.role,
            journal: Arc::clone(&self.journal),
            savepoint_ids: Arc::clone(&self.savepoint_ids),
            rollback_only: AtomicBool::new(false),
            live_savepoints: Mutex::new(Vec::new()),
        };

        match work(&status) {
            Ok(value) => {
                if status.rollback_only.load(Ordering::SeqCst) {
                    self.journal.lock().push(TxEvent::RolledBack);
                    return Err(DualTxError::Backend {
                        role: self.role,
                        detail: "transaction marked rollback-only".to_owned(),
                    });
                }
                if let Some(detail) = self.fail_next_commit.lock().take() {
                    return Err(DualTxError::CommitFailed {
                        role: self.role,
                        detail,
                    });
                }
                self.journal.lock().push(TxEvent::Committed);
                Ok(value)
            }
            Err(error) => {
                self.journal.lock().push(TxEvent::RolledBack);
                Err(error)
            }
        }
    }
}

/// Live handle for one open mock transaction.
pub struct MockStatus {
    role: Role,
    journal: Arc<Mutex<Vec<TxEvent>>>,
    savepoint_ids: Arc<AtomicU32>,
    rollback_only: AtomicBool,
    live_savepoints: Mutex<Vec<u32>>,
}

struct MockSavepointToken {
    role: Role,
    id: u32,
}

impl MockStatus {
    fn own_token<'t>(&self, savepoint: &'t Savepoint) -> Result<&'t MockSavepointToken> {
        match savepoint.downcast_ref::<MockSavepointToken>() {
            Some(token) if token.role == self.role => Ok(token),
            _ => Err(DualTxError::ForeignSavepoint { role: self.role }),
        }
    }
}

impl TransactionStatus for MockStatus {
    fn is_new_transaction(&self) -> bool {
        // Mock resources never join an outer physical transaction.
        true
    }

    fn has_savepoint(&self) -> bool {
        !self.live_savepoints.lock().is_empty()
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }

    fn is_completed(&self) -> bool {
        // The handle only exists while the transaction is open.
        false
    }

    fn set_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::SeqCst);
    }

    fn flush(&self) -> Result<()> {
        self.journal.lock().push(TxEvent::Flushed);
        Ok(())
    }

    fn create_savepoint(&self) -> Result<Savepoint> {
        let id = self.savepoint_ids.fetch_add(1, Ordering::SeqCst) + 1;
        self.live_savepoints.lock().push(id);
        self.journal.lock().push(TxEvent::SavepointCreated(id));
        Ok(Savepoint::new(MockSavepointToken {
            role: self.role,
            id,
        }))
    }

    fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        let token = self.own_token(savepoint)?;
        if !self.live_savepoints.lock().contains(&token.id) {
            return Err(DualTxError::SavepointNotFound {
                name: token.id.to_string(),
            });
        }
        self.journal.lock().push(TxEvent::RolledBackTo(token.id));
        Ok(())
    }

    fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()> {
        let token = self.own_token(savepoint)?;
        let mut live = self.live_savepoints.lock();
        match live.iter().position(|id| *id == token.id) {
            Some(index) => {
                live.remove(index);
            }
            None => {
                return Err(DualTxError::SavepointNotFound {
                    name: token.id.to_string(),
                });
            }
        }
        drop(live);
        self.journal.lock().push(TxEvent::Released(token.id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FlagProbe
// ---------------------------------------------------------------------------

/// Probe backed by a plain flag.
#[derive(Debug, Default)]
pub struct FlagProbe {
    active: AtomicBool,
}

impl FlagProbe {
    /// New probe with the given initial state.
    #[must_use]
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
        }
    }

    /// Flip the signal.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl TransactionProbe for FlagProbe {
    fn is_transaction_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// RecordingExecutor
// ---------------------------------------------------------------------------

/// One delegated statement-executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorCall {
    /// `update` with the statement text.
    Update(String),
    /// `update_with` with the statement text and bundle size.
    UpdateWith(String, usize),
    /// `batch_update` with the statement texts.
    BatchUpdate(Vec<String>),
    /// `batch_update_with` with the shared text and batch count.
    BatchUpdateWith(String, usize),
    /// `execute` with the statement text.
    Execute(String),
    /// `execute_with` with the statement text.
    ExecuteWith(String),
}

/// Prepared-statement stand-in handed to execute callbacks.
pub struct PreparedStub {
    /// The statement text this stub was prepared from.
    pub sql: String,
}

/// Statement executor that records calls and returns canned results.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecutorCall>>,
}

impl RecordingExecutor {
    /// New executor with an empty call log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every delegated call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls.lock().clone()
    }
}

impl StatementExecutor for RecordingExecutor {
    type Params = Vec<String>;
    type Statement = PreparedStub;

    fn update(&self, sql: &str) -> Result<u64> {
        self.calls.lock().push(ExecutorCall::Update(sql.to_owned()));
        Ok(1)
    }

    fn update_with(&self, sql: &str, params: &Self::Params) -> Result<u64> {
        self.calls
            .lock()
            .push(ExecutorCall::UpdateWith(sql.to_owned(), params.len()));
        Ok(1)
    }

    fn batch_update(&self, statements: &[String]) -> Result<Vec<u64>> {
        self.calls
            .lock()
            .push(ExecutorCall::BatchUpdate(statements.to_vec()));
        Ok(vec![1; statements.len()])
    }

    fn batch_update_with(&self, sql: &str, batches: &[Self::Params]) -> Result<Vec<u64>> {
        self.calls
            .lock()
            .push(ExecutorCall::BatchUpdateWith(sql.to_owned(), batches.len()));
        Ok(vec![1; batches.len()])
    }

    fn execute(&self, sql: &str) -> Result<()> {
        self.calls
            .lock()
            .push(ExecutorCall::Execute(sql.to_owned()));
        Ok(())
    }

    fn execute_with<R>(
        &self,
        sql: &str,
        action: impl FnOnce(&mut Self::Statement) -> Result<R>,
    ) -> Result<R> {
        self.calls
            .lock()
            .push(ExecutorCall::ExecuteWith(sql.to_owned()));
        let mut stub = PreparedStub {
            sql: sql.to_owned(),
        };
        action(&mut stub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_manager_commits_on_success() {
        let manager = MockManager::new(Role::Primary);
        let value = manager
            .execute(|_| Ok(5))
            .expect("clean work should commit");

        assert_eq!(value, 5);
        assert_eq!(manager.journal(), vec![TxEvent::Began, TxEvent::Committed]);
    }

    #[test]
    fn test_mock_manager_rolls_back_on_error() {
        let manager = MockManager::new(Role::Secondary);
        let result: Result<()> = manager.execute(|_| {
            Err(DualTxError::Backend {
                role: Role::Secondary,
                detail: "boom".to_owned(),
            })
        });

        assert!(result.is_err());
        assert_eq!(manager.journal(), vec![TxEvent::Began, TxEvent::RolledBack]);
    }

    #[test]
    fn test_mock_manager_honors_rollback_only() {
        let manager = MockManager::new(Role::Primary);
        let result = manager.execute(|status| {
            status.set_rollback_only();
            Ok(())
        });

        assert!(matches!(result, Err(DualTxError::Backend { .. })));
        assert!(manager.rolled_back());
        assert!(!manager.committed());
    }

    #[test]
    fn test_scripted_commit_failure_fires_once() {
        let manager = MockManager::new(Role::Primary);
        manager.fail_next_commit("disk full");

        let first = manager.execute(|_| Ok(()));
        match first {
            Err(DualTxError::CommitFailed { role, detail }) => {
                assert_eq!(role, Role::Primary);
                assert_eq!(detail, "disk full");
            }
            other => panic!("expected scripted commit failure, got {other:?}"),
        }

        manager
            .execute(|_| Ok(()))
            .expect("script is consumed after firing");
    }

    #[test]
    fn test_mock_status_savepoint_lifecycle() {
        let manager = MockManager::new(Role::Primary);
        manager
            .execute(|status| {
                assert!(!status.has_savepoint());
                let savepoint = status.create_savepoint()?;
                assert!(status.has_savepoint());
                status.rollback_to_savepoint(&savepoint)?;
                status.release_savepoint(&savepoint)?;
                assert!(!status.has_savepoint());
                Ok(())
            })
            .expect("savepoint lifecycle should succeed");

        assert_eq!(
            manager.journal(),
            vec![
                TxEvent::Began,
                TxEvent::SavepointCreated(1),
                TxEvent::RolledBackTo(1),
                TxEvent::Released(1),
                TxEvent::Committed,
            ]
        );
    }

    #[test]
    fn test_mock_status_rejects_released_savepoint() {
        let manager = MockManager::new(Role::Primary);
        manager
            .execute(|status| {
                let savepoint = status.create_savepoint()?;
                status.release_savepoint(&savepoint)?;

                let rollback = status.rollback_to_savepoint(&savepoint);
                match rollback {
                    Err(DualTxError::SavepointNotFound { name }) => {
                        assert_eq!(name, "1", "error names the stale savepoint");
                    }
                    other => panic!("expected unknown-savepoint failure, got {other:?}"),
                }
                assert!(matches!(
                    status.release_savepoint(&savepoint),
                    Err(DualTxError::SavepointNotFound { .. })
                ));
                Ok(())
            })
            .expect("outer transaction should commit");
    }

    #[test]
    fn test_mock_status_rejects_foreign_tokens() {
        let primary = MockManager::new(Role::Primary);
        let secondary = MockManager::new(Role::Secondary);

        primary
            .execute(|primary_status| {
                let token = primary_status.create_savepoint()?;
                let result = secondary.execute(|secondary_status| {
                    secondary_status.rollback_to_savepoint(&token)
                });
                assert!(matches!(
                    result,
                    Err(DualTxError::ForeignSavepoint {
                        role: Role::Secondary
                    })
                ));
                Ok(())
            })
            .expect("outer transaction should commit");
    }

    #[test]
    fn test_flag_probe_flips() {
        let probe = FlagProbe::new(false);
        assert!(!probe.is_transaction_active());
        probe.set_active(true);
        assert!(probe.is_transaction_active());
    }

    #[test]
    fn test_recording_executor_journals_calls() {
        let executor = RecordingExecutor::new();
        executor.update("UPDATE t SET x=1").expect("update");
        executor.execute("SELECT 1").expect("execute");

        assert_eq!(
            executor.calls(),
            vec![
                ExecutorCall::Update("UPDATE t SET x=1".to_owned()),
                ExecutorCall::Execute("SELECT 1".to_owned()),
            ]
        );
    }
}
