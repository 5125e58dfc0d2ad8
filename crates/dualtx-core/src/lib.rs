//! Dual-transaction coordination for live database migration.
//!
//! Application code keeps writing to a legacy transactional resource (the
//! *primary*) while a newly introduced resource (the *secondary*) is brought
//! into sync. This crate provides:
//!
//! - [`TransactionStatus`]: the per-resource transaction handle capability
//!   set, with opaque [`Savepoint`] tokens.
//! - [`PairedStatus`]: the composite status over the fixed (primary,
//!   secondary) pair, aggregating flags and spanning savepoints across both.
//! - [`DualTemplate`]: runs one unit of work inside both resources'
//!   transactions, the secondary nested inside the primary, and detects
//!   partial-commit anomalies on failure.
//! - [`TransactionManager`] / [`TransactionProbe`]: the seams to the two
//!   resource-specific transaction layers.
//!
//! This is NOT two-phase commit: the two commits are nested, not atomic.
//! The layer guarantees exactly-once execution of the caller's work and
//! detection (never repair) of the case where the secondary committed but
//! the primary did not.

pub mod manager;
pub mod paired;
pub mod status;
pub mod template;

pub use dualtx_error::{DualTxError, Result, Role};
pub use manager::{TransactionManager, TransactionProbe};
pub use paired::{PairedSavepoint, PairedStatus};
pub use status::{Savepoint, TransactionStatus};
pub use template::{DualTemplate, DualTemplateBuilder};
