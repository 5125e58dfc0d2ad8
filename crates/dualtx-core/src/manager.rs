//! Collaborator seams: resource transaction managers and the ambient
//! active-transaction signal.

use dualtx_error::Result;

use crate::status::TransactionStatus;

/// One resource's transaction manager.
///
/// `execute` opens a transaction honoring the platform's propagation and
/// nesting rules, runs `work` against the live status handle, commits on
/// `Ok`, rolls back on `Err`, and propagates transaction-layer failures
/// unchanged. All blocking and retry behavior (lock waits, busy handling)
/// belongs to the implementation; the coordination layer adds none.
pub trait TransactionManager {
    /// Live handle type for one open transaction on this resource.
    type Status: TransactionStatus;

    /// Run `work` inside a transaction on this resource.
    ///
    /// # Errors
    /// Returns `work`'s error after rolling back, or the resource's own
    /// failure (for example a failed commit), unchanged in either case.
    fn execute<T>(&self, work: impl FnOnce(&Self::Status) -> Result<T>) -> Result<T>;
}

impl<M: TransactionManager> TransactionManager for &M {
    type Status = M::Status;

    fn execute<T>(&self, work: impl FnOnce(&Self::Status) -> Result<T>) -> Result<T> {
        (**self).execute(work)
    }
}

impl<M: TransactionManager> TransactionManager for std::sync::Arc<M> {
    type Status = M::Status;

    fn execute<T>(&self, work: impl FnOnce(&Self::Status) -> Result<T>) -> Result<T> {
        (**self).execute(work)
    }
}

/// Thread-scoped "is an actual transaction active" signal.
///
/// Owned and maintained by the transaction-management collaborator across
/// its begin/end calls; the presence guard only reads it. Modeled as an
/// injected value rather than hidden global state so non-thread-local
/// implementations stay possible.
pub trait TransactionProbe: Send + Sync {
    /// Whether an actual transaction is open for the calling thread.
    fn is_transaction_active(&self) -> bool;
}

impl<P: TransactionProbe> TransactionProbe for &P {
    fn is_transaction_active(&self) -> bool {
        (**self).is_transaction_active()
    }
}

impl<P: TransactionProbe> TransactionProbe for std::sync::Arc<P> {
    fn is_transaction_active(&self) -> bool {
        (**self).is_transaction_active()
    }
}
