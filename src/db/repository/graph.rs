//! Collaborator-facing repository trait for graph mutations.
//!
//! Every mutating operation here is a *triggering transaction*: the write and
//! the reactive recompute it fans out to are applied atomically, and the
//! returned [`DispatchSummary`] reports what was recomputed. Errors abort the
//! whole transaction; no achievement row is left in an intermediate state.

use async_trait::async_trait;

use crate::models::{
    Assessment, AssessmentId, Course, CourseId, LearningOutcome, LearningOutcomeId, ProgramOutcome,
    ProgramOutcomeId, Student, StudentId,
};
use crate::services::dispatcher::DispatchSummary;

use super::error::RepositoryResult;

/// Repository trait for outcome graph writes and their reactive fan-out.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait GraphRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the underlying store is reachable and healthy.
    async fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Catalog ====================

    /// Insert a student and return the assigned id.
    async fn create_student(&self, student: &Student) -> RepositoryResult<StudentId>;

    /// Insert a course and return the assigned id.
    async fn create_course(&self, course: &Course) -> RepositoryResult<CourseId>;

    /// Insert an assessment after range-checking weight and max_score.
    async fn create_assessment(&self, assessment: &Assessment) -> RepositoryResult<AssessmentId>;

    /// Insert a learning outcome after range-checking its target.
    async fn create_learning_outcome(
        &self,
        lo: &LearningOutcome,
    ) -> RepositoryResult<LearningOutcomeId>;

    /// Insert a program outcome after range-checking its target.
    async fn create_program_outcome(
        &self,
        po: &ProgramOutcome,
    ) -> RepositoryResult<ProgramOutcomeId>;

    // ==================== Triggering mutations ====================

    /// Record or replace the score for (student, assessment) and recompute
    /// every learning and program outcome downstream of the assessment.
    ///
    /// # Errors
    /// * `ValidationError` if the score is outside [0, max_score]
    /// * `NotFound` if the student or assessment does not exist
    async fn upsert_grade(
        &self,
        student: StudentId,
        assessment: AssessmentId,
        score: f64,
    ) -> RepositoryResult<DispatchSummary>;

    /// Delete the grade for (student, assessment), if present, and recompute
    /// downstream. Deleting an absent grade is a no-op with an empty summary.
    async fn delete_grade(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> RepositoryResult<DispatchSummary>;

    /// Activate or deactivate the (student, course) enrollment. Deactivation
    /// deletes the student's LO rows for the course before the PO rollups
    /// are recomputed.
    async fn set_enrollment(
        &self,
        student: StudentId,
        course: CourseId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary>;

    /// Flip the assessment's `active` flag and recompute everything its
    /// edges reach, for every student enrolled in its course.
    async fn set_assessment_active(
        &self,
        assessment: AssessmentId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary>;

    /// Flip the learning outcome's `active` flag; treated as an edge-set
    /// change on the assessment side.
    async fn set_learning_outcome_active(
        &self,
        lo: LearningOutcomeId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary>;

    /// Flip the program outcome's `active` flag; recomputes its rollup for
    /// every student reaching it when it becomes active.
    async fn set_program_outcome_active(
        &self,
        po: ProgramOutcomeId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary>;

    /// Create or re-weight an Assessment→LO edge.
    ///
    /// # Errors
    /// * `ConstraintViolation` if the endpoints belong to different courses
    /// * `ValidationError` if the weight is not strictly positive
    async fn link_assessment_lo(
        &self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
        weight: f64,
    ) -> RepositoryResult<DispatchSummary>;

    /// Remove an Assessment→LO edge, if present.
    async fn unlink_assessment_lo(
        &self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<DispatchSummary>;

    /// Create or re-weight an LO→PO edge.
    ///
    /// # Errors
    /// * `ValidationError` if the weight is not strictly positive
    async fn link_lo_po(
        &self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
        weight: f64,
    ) -> RepositoryResult<DispatchSummary>;

    /// Remove an LO→PO edge, if present.
    async fn unlink_lo_po(
        &self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<DispatchSummary>;
}
