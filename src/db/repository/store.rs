//! Synchronous store contract shared by every backend.
//!
//! `OutcomeStore` is the read/write surface the calculator and dispatcher
//! are generic over. Both run inside a single storage transaction, so the
//! contract is deliberately synchronous: the in-memory backend implements it
//! on its guarded data, the Postgres backend on a borrowed connection inside
//! `conn.transaction(..)`. The async repository traits wrap this seam.

use crate::models::{
    Assessment, AssessmentId, Course, CourseId, LearningOutcome, LearningOutcomeId, LoAchievement,
    PoAchievement, ProgramOutcome, ProgramOutcomeId, Student, StudentId,
};

use super::error::RepositoryResult;

/// Transactional read/write contract of the outcome graph store.
///
/// Reads mirror the calculator's query needs; writes cover the raw facts
/// (grades, enrollments, edges, flags) and the two achievement projections.
/// Lookups of a single entity return `RepositoryError::NotFound` when the
/// id does not resolve.
pub trait OutcomeStore {
    // ==================== Entity lookups ====================

    fn student_exists(&self, student: StudentId) -> RepositoryResult<bool>;
    fn student_ids(&self) -> RepositoryResult<Vec<StudentId>>;
    fn course_exists(&self, course: CourseId) -> RepositoryResult<bool>;
    fn assessment(&self, assessment: AssessmentId) -> RepositoryResult<Assessment>;
    fn learning_outcome(&self, lo: LearningOutcomeId) -> RepositoryResult<LearningOutcome>;
    fn program_outcome(&self, po: ProgramOutcomeId) -> RepositoryResult<ProgramOutcome>;

    // ==================== Enrollment scope ====================

    /// Courses the student is actively enrolled in.
    fn enrolled_active_courses(&self, student: StudentId) -> RepositoryResult<Vec<CourseId>>;

    /// Whether an active enrollment exists for the pair.
    fn active_enrollment_exists(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> RepositoryResult<bool>;

    /// Students with an active enrollment in the course.
    fn enrolled_students(&self, course: CourseId) -> RepositoryResult<Vec<StudentId>>;

    // ==================== Graph reads ====================

    /// Active learning outcomes of a course.
    fn active_los_of_course(&self, course: CourseId) -> RepositoryResult<Vec<LearningOutcome>>;

    /// All learning outcome ids of a course, regardless of `active`.
    fn los_of_course(&self, course: CourseId) -> RepositoryResult<Vec<LearningOutcomeId>>;

    /// Active assessments of `course` holding an edge to `lo`.
    fn active_assessments_touching_lo(
        &self,
        course: CourseId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Vec<Assessment>>;

    /// Edge weight for (assessment, lo), if the edge exists.
    fn assessment_lo_weight(
        &self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Option<f64>>;

    /// Recorded score for (student, assessment), if any.
    fn grade_score(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> RepositoryResult<Option<f64>>;

    /// Learning outcomes the assessment points to.
    fn los_linked_to_assessment(
        &self,
        assessment: AssessmentId,
    ) -> RepositoryResult<Vec<LearningOutcomeId>>;

    /// Program outcomes the learning outcome points to.
    fn pos_linked_to_lo(&self, lo: LearningOutcomeId)
        -> RepositoryResult<Vec<ProgramOutcomeId>>;

    /// Learning outcomes with an edge into the program outcome.
    fn los_linked_to_po(&self, po: ProgramOutcomeId)
        -> RepositoryResult<Vec<LearningOutcomeId>>;

    /// Active learning outcomes with an edge to `po` that belong to a course
    /// the student is actively enrolled in.
    fn los_pointing_to_po_for_student(
        &self,
        po: ProgramOutcomeId,
        student: StudentId,
    ) -> RepositoryResult<Vec<LearningOutcome>>;

    /// Edge weight for (lo, po), if the edge exists.
    fn lopo_weight(
        &self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<Option<f64>>;

    // ==================== Achievement projections ====================

    fn lo_achievement(
        &self,
        student: StudentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Option<LoAchievement>>;

    /// Learning outcomes for which the student currently has a row.
    fn lo_achievement_los_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<LearningOutcomeId>>;

    /// Program outcomes for which the student currently has a row.
    fn po_achievement_pos_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<ProgramOutcomeId>>;

    fn upsert_lo_achievement(&mut self, row: &LoAchievement) -> RepositoryResult<()>;
    fn upsert_po_achievement(&mut self, row: &PoAchievement) -> RepositoryResult<()>;

    /// Remove the (student, lo) row. Returns whether a row existed.
    fn delete_lo_achievement(
        &mut self,
        student: StudentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<bool>;

    // ==================== Catalog writes ====================

    fn insert_student(&mut self, student: &Student) -> RepositoryResult<StudentId>;
    fn insert_course(&mut self, course: &Course) -> RepositoryResult<CourseId>;
    fn insert_assessment(&mut self, assessment: &Assessment) -> RepositoryResult<AssessmentId>;
    fn insert_learning_outcome(
        &mut self,
        lo: &LearningOutcome,
    ) -> RepositoryResult<LearningOutcomeId>;
    fn insert_program_outcome(
        &mut self,
        po: &ProgramOutcome,
    ) -> RepositoryResult<ProgramOutcomeId>;

    // ==================== Fact writes ====================

    /// Upsert the score for (student, assessment). Range checks happen in
    /// the mutation layer before this is called.
    fn put_grade(
        &mut self,
        student: StudentId,
        assessment: AssessmentId,
        score: f64,
    ) -> RepositoryResult<()>;

    /// Remove the grade row. Returns whether a row existed.
    fn remove_grade(
        &mut self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> RepositoryResult<bool>;

    /// Upsert the enrollment flag for (student, course).
    fn put_enrollment(
        &mut self,
        student: StudentId,
        course: CourseId,
        active: bool,
    ) -> RepositoryResult<()>;

    fn set_assessment_active_flag(
        &mut self,
        assessment: AssessmentId,
        active: bool,
    ) -> RepositoryResult<()>;

    fn set_learning_outcome_active_flag(
        &mut self,
        lo: LearningOutcomeId,
        active: bool,
    ) -> RepositoryResult<()>;

    fn set_program_outcome_active_flag(
        &mut self,
        po: ProgramOutcomeId,
        active: bool,
    ) -> RepositoryResult<()>;

    /// Upsert an Assessment→LO edge. Same-course and weight checks happen in
    /// the mutation layer; backends may additionally enforce them in schema.
    fn put_assessment_lo_link(
        &mut self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
        weight: f64,
    ) -> RepositoryResult<()>;

    fn remove_assessment_lo_link(
        &mut self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<bool>;

    /// Upsert an LO→PO edge.
    fn put_lo_po_link(
        &mut self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
        weight: f64,
    ) -> RepositoryResult<()>;

    fn remove_lo_po_link(
        &mut self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<bool>;

    // ==================== Audit reads ====================

    /// Active assessments with no Assessment→LO edge.
    fn active_assessments_without_lo_links(&self) -> RepositoryResult<Vec<AssessmentId>>;

    /// Active learning outcomes with no LO→PO edge.
    fn active_los_without_po_links(&self) -> RepositoryResult<Vec<LearningOutcomeId>>;

    /// Assessment→LO edges whose endpoints belong to different courses.
    fn cross_course_assessment_lo_links(
        &self,
    ) -> RepositoryResult<Vec<(AssessmentId, LearningOutcomeId)>>;

    /// Residual direct Assessment→PO links left behind by pre-DAG importers.
    /// Empty on any store created by this crate.
    fn legacy_direct_po_links(
        &self,
    ) -> RepositoryResult<Vec<(AssessmentId, ProgramOutcomeId)>>;
}
