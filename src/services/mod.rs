//! Service layer: the engine's computation and orchestration logic.
//!
//! Everything here is synchronous and generic over the
//! [`OutcomeStore`](crate::db::repository::OutcomeStore) seam, so the same
//! code runs inside an in-memory write guard and inside a Postgres
//! transaction.
//!
//! - [`calculator`]: pure rollup math and the LO/PO compute operations
//! - [`dispatcher`]: mutation → minimal recompute fan-out
//! - [`mutations`]: validated write entry points that feed the dispatcher
//! - [`invalidation`]: post-commit cache-invalidation keys and sinks
//! - [`audit`]: read-only invariant scan

pub mod audit;
pub mod calculator;
pub mod dispatcher;
pub mod invalidation;
pub mod mutations;

pub use audit::{audit, GraphAuditReport, ViolationSummary};
pub use calculator::{compute_lo, compute_po};
pub use dispatcher::{dispatch, DispatchSummary, GraphChange};
pub use invalidation::{InvalidationKey, InvalidationSink, MemorySink, NullSink};
