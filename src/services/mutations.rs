//! Mutation entry points.
//!
//! The thin domain layer every collaborator write flows through: validate
//! the input, apply the store write, then hand the change to the dispatcher,
//! all against the same transactional store handle, so the triggering
//! mutation and its derived recomputes commit or roll back together.

use log::info;

use crate::db::repository::{OutcomeStore, RepositoryError, RepositoryResult};
use crate::models::edges::validate_edge_weight;
use crate::models::{AssessmentId, CourseId, LearningOutcomeId, ProgramOutcomeId, StudentId};

use super::dispatcher::{self, DispatchSummary, GraphChange};

/// Record or replace a grade and recompute downstream.
pub fn upsert_grade<S: OutcomeStore + ?Sized>(
    store: &mut S,
    student: StudentId,
    assessment: AssessmentId,
    score: f64,
) -> RepositoryResult<DispatchSummary> {
    if !store.student_exists(student)? {
        return Err(RepositoryError::NotFound(format!("Student {} not found", student)));
    }
    let assessment_row = store.assessment(assessment)?;
    if !score.is_finite() || score < 0.0 || score > assessment_row.max_score {
        return Err(RepositoryError::ValidationError(format!(
            "score {} outside [0, {}] for assessment {}",
            score, assessment_row.max_score, assessment
        )));
    }

    store.put_grade(student, assessment, score)?;
    dispatcher::dispatch(store, &GraphChange::GradeUpserted { student, assessment })
}

/// Delete a grade, if present, and recompute downstream.
pub fn delete_grade<S: OutcomeStore + ?Sized>(
    store: &mut S,
    student: StudentId,
    assessment: AssessmentId,
) -> RepositoryResult<DispatchSummary> {
    if !store.remove_grade(student, assessment)? {
        return Ok(DispatchSummary::default());
    }
    dispatcher::dispatch(store, &GraphChange::GradeDeleted { student, assessment })
}

/// Activate or deactivate an enrollment and recompute its scope.
pub fn set_enrollment<S: OutcomeStore + ?Sized>(
    store: &mut S,
    student: StudentId,
    course: CourseId,
    active: bool,
) -> RepositoryResult<DispatchSummary> {
    if !store.student_exists(student)? {
        return Err(RepositoryError::NotFound(format!("Student {} not found", student)));
    }
    if !store.course_exists(course)? {
        return Err(RepositoryError::NotFound(format!("Course {} not found", course)));
    }

    store.put_enrollment(student, course, active)?;
    let change = if active {
        GraphChange::EnrollmentActivated { student, course }
    } else {
        GraphChange::EnrollmentDeactivated { student, course }
    };
    let summary = dispatcher::dispatch(store, &change)?;
    info!(
        "enrollment student={} course={} active={}: {} lo recomputed, {} lo rows deleted, {} po recomputed",
        student, course, active, summary.lo_recomputed, summary.lo_rows_deleted, summary.po_recomputed
    );
    Ok(summary)
}

/// Flip an assessment's `active` flag and recompute everything it touches.
pub fn set_assessment_active<S: OutcomeStore + ?Sized>(
    store: &mut S,
    assessment: AssessmentId,
    active: bool,
) -> RepositoryResult<DispatchSummary> {
    store.assessment(assessment)?;
    store.set_assessment_active_flag(assessment, active)?;
    dispatcher::dispatch(store, &GraphChange::AssessmentChanged { assessment })
}

/// Flip a learning outcome's `active` flag.
pub fn set_learning_outcome_active<S: OutcomeStore + ?Sized>(
    store: &mut S,
    lo: LearningOutcomeId,
    active: bool,
) -> RepositoryResult<DispatchSummary> {
    store.learning_outcome(lo)?;
    store.set_learning_outcome_active_flag(lo, active)?;
    dispatcher::dispatch(store, &GraphChange::LearningOutcomeChanged { learning_outcome: lo })
}

/// Flip a program outcome's `active` flag.
pub fn set_program_outcome_active<S: OutcomeStore + ?Sized>(
    store: &mut S,
    po: ProgramOutcomeId,
    active: bool,
) -> RepositoryResult<DispatchSummary> {
    store.program_outcome(po)?;
    store.set_program_outcome_active_flag(po, active)?;
    dispatcher::dispatch(store, &GraphChange::ProgramOutcomeChanged { program_outcome: po })
}

/// Create or re-weight an Assessment→LO edge.
///
/// Both endpoints must belong to the same course.
pub fn link_assessment_lo<S: OutcomeStore + ?Sized>(
    store: &mut S,
    assessment: AssessmentId,
    lo: LearningOutcomeId,
    weight: f64,
) -> RepositoryResult<DispatchSummary> {
    validate_edge_weight(weight).map_err(RepositoryError::ValidationError)?;
    let assessment_row = store.assessment(assessment)?;
    let lo_row = store.learning_outcome(lo)?;
    if assessment_row.course_id != lo_row.course_id {
        return Err(RepositoryError::ConstraintViolation(format!(
            "assessment {} belongs to course {} but learning outcome {} to course {}",
            assessment, assessment_row.course_id, lo, lo_row.course_id
        )));
    }

    store.put_assessment_lo_link(assessment, lo, weight)?;
    dispatcher::dispatch(
        store,
        &GraphChange::AssessmentLoLinkChanged { assessment, learning_outcome: lo },
    )
}

/// Remove an Assessment→LO edge, if present.
pub fn unlink_assessment_lo<S: OutcomeStore + ?Sized>(
    store: &mut S,
    assessment: AssessmentId,
    lo: LearningOutcomeId,
) -> RepositoryResult<DispatchSummary> {
    if !store.remove_assessment_lo_link(assessment, lo)? {
        return Ok(DispatchSummary::default());
    }
    dispatcher::dispatch(
        store,
        &GraphChange::AssessmentLoLinkChanged { assessment, learning_outcome: lo },
    )
}

/// Create or re-weight an LO→PO edge.
pub fn link_lo_po<S: OutcomeStore + ?Sized>(
    store: &mut S,
    lo: LearningOutcomeId,
    po: ProgramOutcomeId,
    weight: f64,
) -> RepositoryResult<DispatchSummary> {
    validate_edge_weight(weight).map_err(RepositoryError::ValidationError)?;
    store.learning_outcome(lo)?;
    store.program_outcome(po)?;

    store.put_lo_po_link(lo, po, weight)?;
    dispatcher::dispatch(
        store,
        &GraphChange::LoPoLinkChanged { learning_outcome: lo, program_outcome: po },
    )
}

/// Remove an LO→PO edge, if present.
pub fn unlink_lo_po<S: OutcomeStore + ?Sized>(
    store: &mut S,
    lo: LearningOutcomeId,
    po: ProgramOutcomeId,
) -> RepositoryResult<DispatchSummary> {
    if !store.remove_lo_po_link(lo, po)? {
        return Ok(DispatchSummary::default());
    }
    dispatcher::dispatch(
        store,
        &GraphChange::LoPoLinkChanged { learning_outcome: lo, program_outcome: po },
    )
}
