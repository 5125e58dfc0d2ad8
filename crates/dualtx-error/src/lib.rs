//! Error types for the dualtx migration toolkit.
//!
//! One structured error enum shared across the workspace, plus the [`Role`]
//! vocabulary naming which of the two bridged resources a failure (or log
//! field) refers to.
//!
//! Detection-only anomalies — a mutating statement outside any transaction,
//! status flags diverging between the two resources, the secondary resource
//! committing while the primary fails — are deliberately NOT errors. They are
//! reported through the observability layer and never change a return value.

use std::fmt;

use thiserror::Error;

/// Which of the two bridged resources is meant.
///
/// Roles are fixed and asymmetric for the whole life of a template: the
/// secondary resource's transaction always nests inside the primary's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The legacy resource; its transaction is the outermost.
    Primary,
    /// The newly introduced resource; its transaction nests inside the
    /// primary's and therefore commits first.
    Secondary,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Secondary => f.write_str("secondary"),
        }
    }
}

/// Primary error type for dualtx operations.
#[derive(Error, Debug)]
pub enum DualTxError {
    /// A transaction manager was not supplied at construction time.
    ///
    /// Raised by the template builder, before any transaction is opened.
    #[error("no {role} transaction manager configured")]
    MissingManager {
        /// The absent side.
        role: Role,
    },

    /// The underlying resource failed while committing.
    #[error("{role} commit failed: {detail}")]
    CommitFailed {
        /// The failing side.
        role: Role,
        /// Resource-reported failure description.
        detail: String,
    },

    /// The underlying resource failed while rolling back.
    #[error("{role} rollback failed: {detail}")]
    RollbackFailed {
        /// The failing side.
        role: Role,
        /// Resource-reported failure description.
        detail: String,
    },

    /// Any other failure surfaced by a resource's transaction layer.
    #[error("{role} backend error: {detail}")]
    Backend {
        /// The failing side.
        role: Role,
        /// Resource-reported failure description.
        detail: String,
    },

    /// A savepoint operation named a savepoint the handle does not know.
    #[error("no such savepoint: {name}")]
    SavepointNotFound {
        /// The unknown savepoint name or identifier.
        name: String,
    },

    /// A savepoint token was handed to a handle that did not create it.
    #[error("savepoint token does not belong to the {role} transaction")]
    ForeignSavepoint {
        /// The handle that rejected the token.
        role: Role,
    },
}

/// Result type for dualtx operations.
pub type Result<T> = std::result::Result<T, DualTxError>;
