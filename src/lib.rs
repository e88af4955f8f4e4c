//! Outcome Attainment Engine.
//!
//! Derives per-student Learning Outcome and Program Outcome achievement
//! percentages from grades over a three-level weighted DAG
//! (Assessment → LO → PO), recomputing reactively inside the same
//! transaction as each triggering mutation.
//!
//! The crate is an embedded library: collaborators write grades,
//! enrollments and graph edges through the repository traits in [`db`], the
//! engine in [`services`] keeps the two materialized achievement tables
//! consistent, and cache consumers receive invalidation keys after commit.

pub mod db;
pub mod models;
pub mod services;
