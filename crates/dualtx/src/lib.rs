//! Public API facade for the dualtx migration toolkit.
//!
//! dualtx keeps application writes flowing into two independently
//! transactional resources during a live migration: every unit of work runs
//! inside both resources' transactions (the secondary nested inside the
//! primary), and statements that bypass transaction management entirely are
//! detected and reported.
//!
//! Typical wiring:
//!
//! 1. Implement [`TransactionManager`] (and [`TransactionStatus`]) over each
//!    resource's native transaction layer.
//! 2. Build a [`DualTemplate`] from the two managers and route every
//!    mutating unit of work through [`DualTemplate::execute`].
//! 3. Wrap each resource's statement executor in a
//!    [`TransactionCheckExecutor`] to catch writes that skip the template.
//!
//! None of this is two-phase commit: the template offers nesting plus
//! partial-commit detection, not cross-resource atomicity.

pub use dualtx_core::{
    DualTemplate, DualTemplateBuilder, PairedSavepoint, PairedStatus, Savepoint,
    TransactionManager, TransactionProbe, TransactionStatus,
};
pub use dualtx_error::{DualTxError, Result, Role};
pub use dualtx_guard::{StatementExecutor, TransactionCheckExecutor};
pub use dualtx_observability::{
    AnomalyEvent, AnomalySink, NoOpSink, RecordingSink, Severity, TracingSink,
};
