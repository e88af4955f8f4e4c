//! Materialized achievement rows.
//!
//! These two tables are a denormalized projection of the grade data through
//! the outcome graph. They are written exclusively by the engine, inside the
//! same transaction as the triggering mutation, and can be rebuilt from
//! scratch at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LearningOutcomeId, ProgramOutcomeId, StudentId};

/// Per-(student, learning outcome) attainment row. Unique per pair.
///
/// Exists only while the student is actively enrolled in the outcome's
/// course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoAchievement {
    pub student_id: StudentId,
    pub learning_outcome_id: LearningOutcomeId,
    /// Clipped to [0, 100], two decimals, half-even.
    pub current_percentage: f64,
    pub total_assessments: i32,
    pub completed_assessments: i32,
    pub last_calculated: DateTime<Utc>,
}

/// Per-(student, program outcome) attainment row. Unique per pair.
///
/// Never deleted by the engine; decays to zero when no contributing
/// learning outcome remains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoAchievement {
    pub student_id: StudentId,
    pub program_outcome_id: ProgramOutcomeId,
    pub current_percentage: f64,
    pub total_assessments: i32,
    pub completed_assessments: i32,
    pub last_calculated: DateTime<Utc>,
}
