//! Per-resource transaction handle capabilities and opaque savepoint tokens.

use std::any::Any;
use std::fmt;

use dualtx_error::Result;

/// An opaque savepoint token.
///
/// Resource transaction managers wrap their own token type; the paired
/// status wraps a pair of them. A token is only meaningful to the status
/// that created it, and statuses reject tokens they do not recognize.
pub struct Savepoint(Box<dyn Any + Send>);

impl Savepoint {
    /// Wrap a resource-specific savepoint token.
    #[must_use]
    pub fn new<T: Any + Send>(token: T) -> Self {
        Self(Box::new(token))
    }

    /// Borrow the wrapped token if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Savepoint(..)")
    }
}

/// The capability set of one resource's open transaction.
///
/// One handle exists per resource per unit of work, owned by that resource's
/// transaction manager and finalized (committed or rolled back) by it when
/// the manager's `execute` unwinds.
///
/// Handles use interior mutability: every method takes `&self` so a status
/// can be shared with nested callbacks.
pub trait TransactionStatus {
    /// Whether this handle opened a new physical transaction, as opposed to
    /// joining one already in flight. Fixed at creation.
    fn is_new_transaction(&self) -> bool;

    /// Whether a savepoint has been created on this transaction.
    fn has_savepoint(&self) -> bool;

    /// Whether the transaction has been marked rollback-only.
    fn is_rollback_only(&self) -> bool;

    /// Whether the underlying transaction has been finalized.
    fn is_completed(&self) -> bool;

    /// Mark the transaction rollback-only. Settable, never resettable.
    fn set_rollback_only(&self);

    /// Push pending changes through to the underlying resource.
    ///
    /// # Errors
    /// Propagates the resource's transaction-layer failure unchanged.
    fn flush(&self) -> Result<()>;

    /// Create a savepoint in this transaction.
    ///
    /// # Errors
    /// Propagates the resource's transaction-layer failure unchanged.
    fn create_savepoint(&self) -> Result<Savepoint>;

    /// Roll the transaction back to a previously created savepoint.
    ///
    /// The savepoint stays valid afterwards and may be rolled back to again.
    ///
    /// # Errors
    /// Fails if the token is unknown to this handle or the resource rejects
    /// the rollback.
    fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> Result<()>;

    /// Release a previously created savepoint.
    ///
    /// # Errors
    /// Fails if the token is unknown to this handle or the resource rejects
    /// the release.
    fn release_savepoint(&self, savepoint: &Savepoint) -> Result<()>;
}
