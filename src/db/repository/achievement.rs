//! Repository trait for the materialized achievement tables.
//!
//! Dashboard consumers read through this trait; the bulk rebuild operations
//! replay the calculator over a student's whole enrollment scope, taking the
//! same per-student lock as the reactive dispatcher.

use async_trait::async_trait;

use crate::models::{
    LearningOutcomeId, LoAchievement, PoAchievement, ProgramOutcomeId, StudentId,
};
use crate::services::dispatcher::DispatchSummary;

use super::error::RepositoryResult;

/// Repository trait for achievement reads and bulk recomputation.
#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// Fetch the (student, learning outcome) row, if it exists.
    async fn lo_achievement(
        &self,
        student: StudentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Option<LoAchievement>>;

    /// Fetch the (student, program outcome) row, if it exists.
    async fn po_achievement(
        &self,
        student: StudentId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<Option<PoAchievement>>;

    /// All LO rows of a student, ordered by learning outcome id.
    async fn lo_achievements_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<LoAchievement>>;

    /// All PO rows of a student, ordered by program outcome id.
    async fn po_achievements_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<PoAchievement>>;

    /// Recompute every achievement row of one student from scratch. Rows
    /// whose enrollment is gone are deleted; stale PO rows decay to zero.
    /// Intended for use after bulk imports.
    async fn rebuild_student(&self, student: StudentId) -> RepositoryResult<DispatchSummary>;

    /// Run [`Self::rebuild_student`] for every known student.
    async fn rebuild_all(&self) -> RepositoryResult<DispatchSummary>;
}
