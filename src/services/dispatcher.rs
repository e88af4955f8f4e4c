//! Reactive dispatcher.
//!
//! Translates a committed-to-be mutation into the minimal set of
//! `compute_lo` / `compute_po` calls and runs them inside the same store
//! transaction. Affected pairs are collected into `BTreeSet`s first, which
//! both de-duplicates the fan-out and fixes a deterministic execution order.
//! Learning outcomes are always recomputed before program outcomes: the PO
//! rollup consumes the LO rows written moments earlier.

use std::collections::BTreeSet;

use log::debug;
use serde::Serialize;

use crate::db::repository::{OutcomeStore, RepositoryResult};
use crate::models::{
    AssessmentId, CourseId, LearningOutcomeId, ProgramOutcomeId, StudentId,
};

use super::calculator::{self, LoComputeResult};
use super::invalidation::InvalidationKey;

/// A mutation the engine reacts to, as observed by the mutation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphChange {
    GradeUpserted { student: StudentId, assessment: AssessmentId },
    GradeDeleted { student: StudentId, assessment: AssessmentId },
    AssessmentChanged { assessment: AssessmentId },
    AssessmentLoLinkChanged { assessment: AssessmentId, learning_outcome: LearningOutcomeId },
    LoPoLinkChanged { learning_outcome: LearningOutcomeId, program_outcome: ProgramOutcomeId },
    EnrollmentActivated { student: StudentId, course: CourseId },
    EnrollmentDeactivated { student: StudentId, course: CourseId },
    LearningOutcomeChanged { learning_outcome: LearningOutcomeId },
    ProgramOutcomeChanged { program_outcome: ProgramOutcomeId },
}

/// What a triggering transaction recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub lo_recomputed: usize,
    pub po_recomputed: usize,
    pub lo_rows_deleted: usize,
    /// Students whose achievement rows were touched, ascending.
    pub students_touched: Vec<StudentId>,
}

impl DispatchSummary {
    pub fn is_empty(&self) -> bool {
        self.lo_recomputed == 0 && self.po_recomputed == 0 && self.lo_rows_deleted == 0
    }

    /// Invalidation keys to publish once the transaction commits: one user
    /// key and one dashboard key per touched student.
    pub fn invalidation_keys(&self) -> Vec<InvalidationKey> {
        let mut keys = Vec::with_capacity(self.students_touched.len() * 2);
        for student in &self.students_touched {
            keys.push(InvalidationKey::User(*student));
            keys.push(InvalidationKey::Dashboard(*student));
        }
        keys
    }

    /// Fold another summary into this one (bulk rebuilds).
    pub fn merge(&mut self, other: DispatchSummary) {
        self.lo_recomputed += other.lo_recomputed;
        self.po_recomputed += other.po_recomputed;
        self.lo_rows_deleted += other.lo_rows_deleted;
        let mut students: BTreeSet<StudentId> =
            self.students_touched.iter().copied().collect();
        students.extend(other.students_touched);
        self.students_touched = students.into_iter().collect();
    }
}

/// Collected recompute plan for one triggering transaction.
#[derive(Debug, Default)]
struct RecomputePlan {
    lo_pairs: BTreeSet<(StudentId, LearningOutcomeId)>,
    po_pairs: BTreeSet<(StudentId, ProgramOutcomeId)>,
    lo_deletions: BTreeSet<(StudentId, LearningOutcomeId)>,
    /// Students whose raw facts changed; invalidated even when nothing
    /// recomputes (a grade on a still-unlinked assessment, say).
    seed_students: BTreeSet<StudentId>,
}

/// Apply the recompute fan-out for `change` against the store, inside the
/// caller's transaction.
pub fn dispatch<S: OutcomeStore + ?Sized>(
    store: &mut S,
    change: &GraphChange,
) -> RepositoryResult<DispatchSummary> {
    let plan = build_plan(store, change)?;
    debug!(
        "dispatch {:?}: {} lo, {} po, {} deletions",
        change,
        plan.lo_pairs.len(),
        plan.po_pairs.len(),
        plan.lo_deletions.len()
    );
    execute_plan(store, plan)
}

/// Recompute one student's whole achievement projection from scratch.
///
/// Covers every active LO of every actively-enrolled course plus every LO
/// the student still has a row for (rows with a gone enrollment are
/// deleted by the calculator), then every PO reachable from either set.
pub fn rebuild_student<S: OutcomeStore + ?Sized>(
    store: &mut S,
    student: StudentId,
) -> RepositoryResult<DispatchSummary> {
    let mut plan = RecomputePlan::default();

    for course in store.enrolled_active_courses(student)? {
        for lo in store.active_los_of_course(course)? {
            if let Some(lo_id) = lo.id {
                plan.lo_pairs.insert((student, lo_id));
            }
        }
    }
    for lo_id in store.lo_achievement_los_for_student(student)? {
        plan.lo_pairs.insert((student, lo_id));
    }

    for (_, lo_id) in plan.lo_pairs.clone() {
        for po in active_downstream_pos(store, lo_id)? {
            plan.po_pairs.insert((student, po));
        }
    }
    // Stale PO rows with no remaining contributors decay to zero.
    for po_id in store.po_achievement_pos_for_student(student)? {
        plan.po_pairs.insert((student, po_id));
    }

    execute_plan(store, plan)
}

fn build_plan<S: OutcomeStore + ?Sized>(
    store: &mut S,
    change: &GraphChange,
) -> RepositoryResult<RecomputePlan> {
    let mut plan = RecomputePlan::default();

    match *change {
        GraphChange::GradeUpserted { student, assessment }
        | GraphChange::GradeDeleted { student, assessment } => {
            plan.seed_students.insert(student);
            for lo_id in store.los_linked_to_assessment(assessment)? {
                add_lo_and_downstream(store, &mut plan, student, lo_id)?;
            }
        }

        GraphChange::AssessmentChanged { assessment } => {
            let assessment_row = store.assessment(assessment)?;
            let students = store.enrolled_students(assessment_row.course_id)?;
            for lo_id in store.los_linked_to_assessment(assessment)? {
                for student in &students {
                    add_lo_and_downstream(store, &mut plan, *student, lo_id)?;
                }
            }
        }

        GraphChange::AssessmentLoLinkChanged { assessment: _, learning_outcome } => {
            let lo = store.learning_outcome(learning_outcome)?;
            for student in store.enrolled_students(lo.course_id)? {
                add_lo_and_downstream(store, &mut plan, student, learning_outcome)?;
            }
        }

        GraphChange::LoPoLinkChanged { learning_outcome, program_outcome } => {
            let lo = store.learning_outcome(learning_outcome)?;
            if store.program_outcome(program_outcome)?.active {
                for student in store.enrolled_students(lo.course_id)? {
                    plan.po_pairs.insert((student, program_outcome));
                }
            }
        }

        GraphChange::EnrollmentActivated { student, course } => {
            plan.seed_students.insert(student);
            for lo in store.active_los_of_course(course)? {
                if let Some(lo_id) = lo.id {
                    add_lo_and_downstream(store, &mut plan, student, lo_id)?;
                }
            }
        }

        GraphChange::EnrollmentDeactivated { student, course } => {
            plan.seed_students.insert(student);
            for lo_id in store.los_of_course(course)? {
                plan.lo_deletions.insert((student, lo_id));
                for po in active_downstream_pos(store, lo_id)? {
                    plan.po_pairs.insert((student, po));
                }
            }
        }

        GraphChange::LearningOutcomeChanged { learning_outcome } => {
            let lo = store.learning_outcome(learning_outcome)?;
            let students = store.enrolled_students(lo.course_id)?;
            let downstream = active_downstream_pos(store, learning_outcome)?;
            for student in students {
                if lo.active {
                    plan.lo_pairs.insert((student, learning_outcome));
                }
                for po in &downstream {
                    plan.po_pairs.insert((student, *po));
                }
            }
        }

        GraphChange::ProgramOutcomeChanged { program_outcome } => {
            if store.program_outcome(program_outcome)?.active {
                for lo_id in store.los_linked_to_po(program_outcome)? {
                    let lo = store.learning_outcome(lo_id)?;
                    for student in store.enrolled_students(lo.course_id)? {
                        plan.po_pairs.insert((student, program_outcome));
                    }
                }
            }
        }
    }

    Ok(plan)
}

fn execute_plan<S: OutcomeStore + ?Sized>(
    store: &mut S,
    plan: RecomputePlan,
) -> RepositoryResult<DispatchSummary> {
    let mut summary = DispatchSummary::default();
    let mut students: BTreeSet<StudentId> = plan.seed_students.clone();

    for (student, lo_id) in &plan.lo_deletions {
        if store.delete_lo_achievement(*student, *lo_id)? {
            summary.lo_rows_deleted += 1;
        }
        students.insert(*student);
    }

    for (student, lo_id) in &plan.lo_pairs {
        if plan.lo_deletions.contains(&(*student, *lo_id)) {
            continue;
        }
        match calculator::compute_lo(store, *student, *lo_id)? {
            LoComputeResult::Upserted => summary.lo_recomputed += 1,
            LoComputeResult::Deleted => summary.lo_rows_deleted += 1,
        }
        students.insert(*student);
    }

    for (student, po_id) in &plan.po_pairs {
        calculator::compute_po(store, *student, *po_id)?;
        summary.po_recomputed += 1;
        students.insert(*student);
    }

    summary.students_touched = students.into_iter().collect();
    Ok(summary)
}

fn add_lo_and_downstream<S: OutcomeStore + ?Sized>(
    store: &mut S,
    plan: &mut RecomputePlan,
    student: StudentId,
    lo_id: LearningOutcomeId,
) -> RepositoryResult<()> {
    if !store.learning_outcome(lo_id)?.active {
        return Ok(());
    }
    plan.lo_pairs.insert((student, lo_id));
    for po in active_downstream_pos(store, lo_id)? {
        plan.po_pairs.insert((student, po));
    }
    Ok(())
}

fn active_downstream_pos<S: OutcomeStore + ?Sized>(
    store: &mut S,
    lo_id: LearningOutcomeId,
) -> RepositoryResult<Vec<ProgramOutcomeId>> {
    let mut pos = Vec::new();
    for po_id in store.pos_linked_to_lo(lo_id)? {
        if store.program_outcome(po_id)?.active {
            pos.push(po_id);
        }
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_keys_cover_user_and_dashboard() {
        let summary = DispatchSummary {
            lo_recomputed: 1,
            po_recomputed: 1,
            lo_rows_deleted: 0,
            students_touched: vec![StudentId(3), StudentId(9)],
        };
        let keys: Vec<String> = summary
            .invalidation_keys()
            .iter()
            .map(|k| k.as_cache_key())
            .collect();
        assert_eq!(
            keys,
            vec!["user:3", "dashboard:user:3", "user:9", "dashboard:user:9"]
        );
    }

    #[test]
    fn merge_deduplicates_students() {
        let mut left = DispatchSummary {
            lo_recomputed: 2,
            po_recomputed: 1,
            lo_rows_deleted: 0,
            students_touched: vec![StudentId(1), StudentId(2)],
        };
        left.merge(DispatchSummary {
            lo_recomputed: 1,
            po_recomputed: 1,
            lo_rows_deleted: 1,
            students_touched: vec![StudentId(2), StudentId(3)],
        });
        assert_eq!(left.lo_recomputed, 3);
        assert_eq!(left.po_recomputed, 2);
        assert_eq!(left.lo_rows_deleted, 1);
        assert_eq!(
            left.students_touched,
            vec![StudentId(1), StudentId(2), StudentId(3)]
        );
    }
}
