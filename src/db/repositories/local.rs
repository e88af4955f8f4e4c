//! In-memory local repository implementation.
//!
//! This module provides a local implementation of all repository traits
//! suitable for unit testing and local development. All data is stored in
//! memory using HashMap structures, providing fast, deterministic, and
//! isolated execution.
//!
//! Triggering transactions are real transactions: the mutation and its
//! recompute fan-out run against a copy of the data, and the copy replaces
//! the live data only on success. The write guard serializes concurrent
//! triggering transactions, which subsumes the per-student advisory lock of
//! the Postgres backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::db::repository::*;
use crate::models::*;
use crate::services::audit::{self, GraphAuditReport};
use crate::services::dispatcher::{self, DispatchSummary};
use crate::services::invalidation::{InvalidationSink, NullSink};
use crate::services::mutations;

/// In-memory local repository.
///
/// # Example
/// ```
/// use oae_rust::db::repositories::LocalRepository;
///
/// let repo = LocalRepository::new();
/// assert_eq!(repo.student_count(), 0);
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
    sink: Arc<dyn InvalidationSink>,
}

#[derive(Clone)]
struct LocalData {
    students: HashMap<StudentId, Student>,
    courses: HashMap<CourseId, Course>,
    assessments: HashMap<AssessmentId, Assessment>,
    learning_outcomes: HashMap<LearningOutcomeId, LearningOutcome>,
    program_outcomes: HashMap<ProgramOutcomeId, ProgramOutcome>,

    enrollments: HashMap<(StudentId, CourseId), bool>,
    grades: HashMap<(StudentId, AssessmentId), f64>,
    assessment_lo_links: HashMap<(AssessmentId, LearningOutcomeId), f64>,
    lo_po_links: HashMap<(LearningOutcomeId, ProgramOutcomeId), f64>,

    lo_achievements: HashMap<(StudentId, LearningOutcomeId), LoAchievement>,
    po_achievements: HashMap<(StudentId, ProgramOutcomeId), PoAchievement>,

    // Residual pre-DAG edges; only populated by test seeding.
    legacy_direct_po_links: Vec<(AssessmentId, ProgramOutcomeId)>,

    // ID counters
    next_student_id: i64,
    next_course_id: i64,
    next_assessment_id: i64,
    next_lo_id: i64,
    next_po_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            students: HashMap::new(),
            courses: HashMap::new(),
            assessments: HashMap::new(),
            learning_outcomes: HashMap::new(),
            program_outcomes: HashMap::new(),
            enrollments: HashMap::new(),
            grades: HashMap::new(),
            assessment_lo_links: HashMap::new(),
            lo_po_links: HashMap::new(),
            lo_achievements: HashMap::new(),
            po_achievements: HashMap::new(),
            legacy_direct_po_links: Vec::new(),
            next_student_id: 1,
            next_course_id: 1,
            next_assessment_id: 1,
            next_lo_id: 1,
            next_po_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository with a no-op invalidation sink.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(NullSink))
    }

    /// Create a repository publishing invalidation keys to `sink`.
    pub fn with_sink(sink: Arc<dyn InvalidationSink>) -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
            sink,
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        let mut data = self.data.write().unwrap();
        data.is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write().unwrap();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    /// Number of students stored.
    pub fn student_count(&self) -> usize {
        self.data.read().unwrap().students.len()
    }

    /// Number of LO achievement rows currently materialized.
    pub fn lo_achievement_count(&self) -> usize {
        self.data.read().unwrap().lo_achievements.len()
    }

    /// Seed a residual direct Assessment→PO link so audit behavior on
    /// pre-DAG data can be exercised.
    pub fn seed_legacy_direct_po_link(&self, assessment: AssessmentId, po: ProgramOutcomeId) {
        let mut data = self.data.write().unwrap();
        data.legacy_direct_po_links.push((assessment, po));
    }

    fn read_txn<T>(
        &self,
        f: impl FnOnce(&LocalData) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let data = self.data.read().unwrap();
        if !data.is_healthy {
            return Err(RepositoryError::ConnectionError(
                "Database is not healthy".to_string(),
            ));
        }
        f(&data)
    }

    /// Run `f` against a copy of the data; swap the copy in only on success.
    fn write_txn<T>(
        &self,
        f: impl FnOnce(&mut LocalData) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let mut data = self.data.write().unwrap();
        if !data.is_healthy {
            return Err(RepositoryError::ConnectionError(
                "Database is not healthy".to_string(),
            ));
        }
        let mut working = data.clone();
        let value = f(&mut working)?;
        *data = working;
        Ok(value)
    }

    /// Publish invalidation keys for a committed triggering transaction.
    fn publish(&self, summary: DispatchSummary) -> DispatchSummary {
        self.sink.publish(&summary.invalidation_keys());
        summary
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort();
    values
}

impl OutcomeStore for LocalData {
    fn student_exists(&self, student: StudentId) -> RepositoryResult<bool> {
        Ok(self.students.contains_key(&student))
    }

    fn student_ids(&self) -> RepositoryResult<Vec<StudentId>> {
        Ok(sorted(self.students.keys().copied().collect()))
    }

    fn course_exists(&self, course: CourseId) -> RepositoryResult<bool> {
        Ok(self.courses.contains_key(&course))
    }

    fn assessment(&self, assessment: AssessmentId) -> RepositoryResult<Assessment> {
        self.assessments
            .get(&assessment)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Assessment {} not found", assessment)))
    }

    fn learning_outcome(&self, lo: LearningOutcomeId) -> RepositoryResult<LearningOutcome> {
        self.learning_outcomes
            .get(&lo)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Learning outcome {} not found", lo)))
    }

    fn program_outcome(&self, po: ProgramOutcomeId) -> RepositoryResult<ProgramOutcome> {
        self.program_outcomes
            .get(&po)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("Program outcome {} not found", po)))
    }

    fn enrolled_active_courses(&self, student: StudentId) -> RepositoryResult<Vec<CourseId>> {
        Ok(sorted(
            self.enrollments
                .iter()
                .filter(|((s, _), active)| *s == student && **active)
                .map(|((_, c), _)| *c)
                .collect(),
        ))
    }

    fn active_enrollment_exists(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> RepositoryResult<bool> {
        Ok(self
            .enrollments
            .get(&(student, course))
            .copied()
            .unwrap_or(false))
    }

    fn enrolled_students(&self, course: CourseId) -> RepositoryResult<Vec<StudentId>> {
        Ok(sorted(
            self.enrollments
                .iter()
                .filter(|((_, c), active)| *c == course && **active)
                .map(|((s, _), _)| *s)
                .collect(),
        ))
    }

    fn active_los_of_course(&self, course: CourseId) -> RepositoryResult<Vec<LearningOutcome>> {
        let mut los: Vec<LearningOutcome> = self
            .learning_outcomes
            .values()
            .filter(|lo| lo.course_id == course && lo.active)
            .cloned()
            .collect();
        los.sort_by_key(|lo| lo.id);
        Ok(los)
    }

    fn los_of_course(&self, course: CourseId) -> RepositoryResult<Vec<LearningOutcomeId>> {
        Ok(sorted(
            self.learning_outcomes
                .values()
                .filter(|lo| lo.course_id == course)
                .filter_map(|lo| lo.id)
                .collect(),
        ))
    }

    fn active_assessments_touching_lo(
        &self,
        course: CourseId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Vec<Assessment>> {
        let mut assessments: Vec<Assessment> = self
            .assessments
            .values()
            .filter(|a| a.course_id == course && a.active)
            .filter(|a| {
                a.id.map(|id| self.assessment_lo_links.contains_key(&(id, lo)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        assessments.sort_by_key(|a| a.id);
        Ok(assessments)
    }

    fn assessment_lo_weight(
        &self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Option<f64>> {
        Ok(self.assessment_lo_links.get(&(assessment, lo)).copied())
    }

    fn grade_score(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> RepositoryResult<Option<f64>> {
        Ok(self.grades.get(&(student, assessment)).copied())
    }

    fn los_linked_to_assessment(
        &self,
        assessment: AssessmentId,
    ) -> RepositoryResult<Vec<LearningOutcomeId>> {
        Ok(sorted(
            self.assessment_lo_links
                .keys()
                .filter(|(a, _)| *a == assessment)
                .map(|(_, l)| *l)
                .collect(),
        ))
    }

    fn pos_linked_to_lo(
        &self,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Vec<ProgramOutcomeId>> {
        Ok(sorted(
            self.lo_po_links
                .keys()
                .filter(|(l, _)| *l == lo)
                .map(|(_, p)| *p)
                .collect(),
        ))
    }

    fn los_linked_to_po(
        &self,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<Vec<LearningOutcomeId>> {
        Ok(sorted(
            self.lo_po_links
                .keys()
                .filter(|(_, p)| *p == po)
                .map(|(l, _)| *l)
                .collect(),
        ))
    }

    fn los_pointing_to_po_for_student(
        &self,
        po: ProgramOutcomeId,
        student: StudentId,
    ) -> RepositoryResult<Vec<LearningOutcome>> {
        let mut los: Vec<LearningOutcome> = self
            .lo_po_links
            .keys()
            .filter(|(_, p)| *p == po)
            .filter_map(|(l, _)| self.learning_outcomes.get(l))
            .filter(|lo| lo.active)
            .filter(|lo| {
                self.enrollments
                    .get(&(student, lo.course_id))
                    .copied()
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        los.sort_by_key(|lo| lo.id);
        Ok(los)
    }

    fn lopo_weight(
        &self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<Option<f64>> {
        Ok(self.lo_po_links.get(&(lo, po)).copied())
    }

    fn lo_achievement(
        &self,
        student: StudentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Option<LoAchievement>> {
        Ok(self.lo_achievements.get(&(student, lo)).cloned())
    }

    fn lo_achievement_los_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<LearningOutcomeId>> {
        Ok(sorted(
            self.lo_achievements
                .keys()
                .filter(|(s, _)| *s == student)
                .map(|(_, l)| *l)
                .collect(),
        ))
    }

    fn po_achievement_pos_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<ProgramOutcomeId>> {
        Ok(sorted(
            self.po_achievements
                .keys()
                .filter(|(s, _)| *s == student)
                .map(|(_, p)| *p)
                .collect(),
        ))
    }

    fn upsert_lo_achievement(&mut self, row: &LoAchievement) -> RepositoryResult<()> {
        self.lo_achievements
            .insert((row.student_id, row.learning_outcome_id), row.clone());
        Ok(())
    }

    fn upsert_po_achievement(&mut self, row: &PoAchievement) -> RepositoryResult<()> {
        self.po_achievements
            .insert((row.student_id, row.program_outcome_id), row.clone());
        Ok(())
    }

    fn delete_lo_achievement(
        &mut self,
        student: StudentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<bool> {
        Ok(self.lo_achievements.remove(&(student, lo)).is_some())
    }

    fn insert_student(&mut self, student: &Student) -> RepositoryResult<StudentId> {
        let id = StudentId(self.next_student_id);
        self.next_student_id += 1;
        let mut stored = student.clone();
        stored.id = Some(id);
        self.students.insert(id, stored);
        Ok(id)
    }

    fn insert_course(&mut self, course: &Course) -> RepositoryResult<CourseId> {
        let id = CourseId(self.next_course_id);
        self.next_course_id += 1;
        let mut stored = course.clone();
        stored.id = Some(id);
        self.courses.insert(id, stored);
        Ok(id)
    }

    fn insert_assessment(&mut self, assessment: &Assessment) -> RepositoryResult<AssessmentId> {
        if !self.courses.contains_key(&assessment.course_id) {
            return Err(RepositoryError::NotFound(format!(
                "Course {} not found",
                assessment.course_id
            )));
        }
        let id = AssessmentId(self.next_assessment_id);
        self.next_assessment_id += 1;
        let mut stored = assessment.clone();
        stored.id = Some(id);
        self.assessments.insert(id, stored);
        Ok(id)
    }

    fn insert_learning_outcome(
        &mut self,
        lo: &LearningOutcome,
    ) -> RepositoryResult<LearningOutcomeId> {
        if !self.courses.contains_key(&lo.course_id) {
            return Err(RepositoryError::NotFound(format!(
                "Course {} not found",
                lo.course_id
            )));
        }
        let id = LearningOutcomeId(self.next_lo_id);
        self.next_lo_id += 1;
        let mut stored = lo.clone();
        stored.id = Some(id);
        self.learning_outcomes.insert(id, stored);
        Ok(id)
    }

    fn insert_program_outcome(
        &mut self,
        po: &ProgramOutcome,
    ) -> RepositoryResult<ProgramOutcomeId> {
        let id = ProgramOutcomeId(self.next_po_id);
        self.next_po_id += 1;
        let mut stored = po.clone();
        stored.id = Some(id);
        self.program_outcomes.insert(id, stored);
        Ok(id)
    }

    fn put_grade(
        &mut self,
        student: StudentId,
        assessment: AssessmentId,
        score: f64,
    ) -> RepositoryResult<()> {
        self.grades.insert((student, assessment), score);
        Ok(())
    }

    fn remove_grade(
        &mut self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> RepositoryResult<bool> {
        Ok(self.grades.remove(&(student, assessment)).is_some())
    }

    fn put_enrollment(
        &mut self,
        student: StudentId,
        course: CourseId,
        active: bool,
    ) -> RepositoryResult<()> {
        self.enrollments.insert((student, course), active);
        Ok(())
    }

    fn set_assessment_active_flag(
        &mut self,
        assessment: AssessmentId,
        active: bool,
    ) -> RepositoryResult<()> {
        let entry = self.assessments.get_mut(&assessment).ok_or_else(|| {
            RepositoryError::NotFound(format!("Assessment {} not found", assessment))
        })?;
        entry.active = active;
        Ok(())
    }

    fn set_learning_outcome_active_flag(
        &mut self,
        lo: LearningOutcomeId,
        active: bool,
    ) -> RepositoryResult<()> {
        let entry = self.learning_outcomes.get_mut(&lo).ok_or_else(|| {
            RepositoryError::NotFound(format!("Learning outcome {} not found", lo))
        })?;
        entry.active = active;
        Ok(())
    }

    fn set_program_outcome_active_flag(
        &mut self,
        po: ProgramOutcomeId,
        active: bool,
    ) -> RepositoryResult<()> {
        let entry = self.program_outcomes.get_mut(&po).ok_or_else(|| {
            RepositoryError::NotFound(format!("Program outcome {} not found", po))
        })?;
        entry.active = active;
        Ok(())
    }

    fn put_assessment_lo_link(
        &mut self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
        weight: f64,
    ) -> RepositoryResult<()> {
        self.assessment_lo_links.insert((assessment, lo), weight);
        Ok(())
    }

    fn remove_assessment_lo_link(
        &mut self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<bool> {
        Ok(self.assessment_lo_links.remove(&(assessment, lo)).is_some())
    }

    fn put_lo_po_link(
        &mut self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
        weight: f64,
    ) -> RepositoryResult<()> {
        self.lo_po_links.insert((lo, po), weight);
        Ok(())
    }

    fn remove_lo_po_link(
        &mut self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<bool> {
        Ok(self.lo_po_links.remove(&(lo, po)).is_some())
    }

    fn active_assessments_without_lo_links(&self) -> RepositoryResult<Vec<AssessmentId>> {
        Ok(sorted(
            self.assessments
                .values()
                .filter(|a| a.active)
                .filter_map(|a| a.id)
                .filter(|id| !self.assessment_lo_links.keys().any(|(a, _)| a == id))
                .collect(),
        ))
    }

    fn active_los_without_po_links(&self) -> RepositoryResult<Vec<LearningOutcomeId>> {
        Ok(sorted(
            self.learning_outcomes
                .values()
                .filter(|lo| lo.active)
                .filter_map(|lo| lo.id)
                .filter(|id| !self.lo_po_links.keys().any(|(l, _)| l == id))
                .collect(),
        ))
    }

    fn cross_course_assessment_lo_links(
        &self,
    ) -> RepositoryResult<Vec<(AssessmentId, LearningOutcomeId)>> {
        let mut links: Vec<(AssessmentId, LearningOutcomeId)> = self
            .assessment_lo_links
            .keys()
            .filter(|(a, l)| {
                match (self.assessments.get(a), self.learning_outcomes.get(l)) {
                    (Some(assessment), Some(lo)) => assessment.course_id != lo.course_id,
                    // dangling endpoints count as structural corruption too
                    _ => true,
                }
            })
            .copied()
            .collect();
        links.sort();
        Ok(links)
    }

    fn legacy_direct_po_links(
        &self,
    ) -> RepositoryResult<Vec<(AssessmentId, ProgramOutcomeId)>> {
        Ok(sorted(self.legacy_direct_po_links.clone()))
    }
}

#[async_trait]
impl GraphRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        let data = self.data.read().unwrap();
        Ok(data.is_healthy)
    }

    async fn create_student(&self, student: &Student) -> RepositoryResult<StudentId> {
        self.write_txn(|data| data.insert_student(student))
    }

    async fn create_course(&self, course: &Course) -> RepositoryResult<CourseId> {
        self.write_txn(|data| data.insert_course(course))
    }

    async fn create_assessment(&self, assessment: &Assessment) -> RepositoryResult<AssessmentId> {
        assessment.validate().map_err(RepositoryError::ValidationError)?;
        self.write_txn(|data| data.insert_assessment(assessment))
    }

    async fn create_learning_outcome(
        &self,
        lo: &LearningOutcome,
    ) -> RepositoryResult<LearningOutcomeId> {
        lo.validate().map_err(RepositoryError::ValidationError)?;
        self.write_txn(|data| data.insert_learning_outcome(lo))
    }

    async fn create_program_outcome(
        &self,
        po: &ProgramOutcome,
    ) -> RepositoryResult<ProgramOutcomeId> {
        po.validate().map_err(RepositoryError::ValidationError)?;
        self.write_txn(|data| data.insert_program_outcome(po))
    }

    async fn upsert_grade(
        &self,
        student: StudentId,
        assessment: AssessmentId,
        score: f64,
    ) -> RepositoryResult<DispatchSummary> {
        let summary =
            self.write_txn(|data| mutations::upsert_grade(data, student, assessment, score))?;
        Ok(self.publish(summary))
    }

    async fn delete_grade(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> RepositoryResult<DispatchSummary> {
        let summary = self.write_txn(|data| mutations::delete_grade(data, student, assessment))?;
        Ok(self.publish(summary))
    }

    async fn set_enrollment(
        &self,
        student: StudentId,
        course: CourseId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary> {
        let summary =
            self.write_txn(|data| mutations::set_enrollment(data, student, course, active))?;
        Ok(self.publish(summary))
    }

    async fn set_assessment_active(
        &self,
        assessment: AssessmentId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary> {
        let summary =
            self.write_txn(|data| mutations::set_assessment_active(data, assessment, active))?;
        Ok(self.publish(summary))
    }

    async fn set_learning_outcome_active(
        &self,
        lo: LearningOutcomeId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary> {
        let summary =
            self.write_txn(|data| mutations::set_learning_outcome_active(data, lo, active))?;
        Ok(self.publish(summary))
    }

    async fn set_program_outcome_active(
        &self,
        po: ProgramOutcomeId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary> {
        let summary =
            self.write_txn(|data| mutations::set_program_outcome_active(data, po, active))?;
        Ok(self.publish(summary))
    }

    async fn link_assessment_lo(
        &self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
        weight: f64,
    ) -> RepositoryResult<DispatchSummary> {
        let summary =
            self.write_txn(|data| mutations::link_assessment_lo(data, assessment, lo, weight))?;
        Ok(self.publish(summary))
    }

    async fn unlink_assessment_lo(
        &self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<DispatchSummary> {
        let summary =
            self.write_txn(|data| mutations::unlink_assessment_lo(data, assessment, lo))?;
        Ok(self.publish(summary))
    }

    async fn link_lo_po(
        &self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
        weight: f64,
    ) -> RepositoryResult<DispatchSummary> {
        let summary = self.write_txn(|data| mutations::link_lo_po(data, lo, po, weight))?;
        Ok(self.publish(summary))
    }

    async fn unlink_lo_po(
        &self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<DispatchSummary> {
        let summary = self.write_txn(|data| mutations::unlink_lo_po(data, lo, po))?;
        Ok(self.publish(summary))
    }
}

#[async_trait]
impl AchievementRepository for LocalRepository {
    async fn lo_achievement(
        &self,
        student: StudentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Option<LoAchievement>> {
        self.read_txn(|data| data.lo_achievement(student, lo))
    }

    async fn po_achievement(
        &self,
        student: StudentId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<Option<PoAchievement>> {
        self.read_txn(|data| Ok(data.po_achievements.get(&(student, po)).cloned()))
    }

    async fn lo_achievements_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<LoAchievement>> {
        self.read_txn(|data| {
            let mut rows: Vec<LoAchievement> = data
                .lo_achievements
                .iter()
                .filter(|((s, _), _)| *s == student)
                .map(|(_, row)| row.clone())
                .collect();
            rows.sort_by_key(|row| row.learning_outcome_id);
            Ok(rows)
        })
    }

    async fn po_achievements_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<PoAchievement>> {
        self.read_txn(|data| {
            let mut rows: Vec<PoAchievement> = data
                .po_achievements
                .iter()
                .filter(|((s, _), _)| *s == student)
                .map(|(_, row)| row.clone())
                .collect();
            rows.sort_by_key(|row| row.program_outcome_id);
            Ok(rows)
        })
    }

    async fn rebuild_student(&self, student: StudentId) -> RepositoryResult<DispatchSummary> {
        let summary = self.write_txn(|data| {
            if !data.student_exists(student)? {
                return Err(RepositoryError::NotFound(format!(
                    "Student {} not found",
                    student
                )));
            }
            dispatcher::rebuild_student(data, student)
        })?;
        Ok(self.publish(summary))
    }

    async fn rebuild_all(&self) -> RepositoryResult<DispatchSummary> {
        let summary = self.write_txn(|data| {
            let mut merged = DispatchSummary::default();
            for student in data.student_ids()? {
                merged.merge(dispatcher::rebuild_student(data, student)?);
            }
            Ok(merged)
        })?;
        Ok(self.publish(summary))
    }
}

#[async_trait]
impl AuditRepository for LocalRepository {
    async fn audit_graph(&self, max_examples: usize) -> RepositoryResult<GraphAuditReport> {
        self.read_txn(|data| audit::audit(data, max_examples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::invalidation::MemorySink;

    fn course() -> Course {
        Course {
            id: None,
            code: "CENG301".to_string(),
            name: "Software Engineering".to_string(),
            department: "CENG".to_string(),
        }
    }

    fn student(name: &str) -> Student {
        Student {
            id: None,
            external_ref: format!("s-{name}"),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let repo = LocalRepository::new();
        assert!(repo.health_check().await.unwrap());

        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_unhealthy_rejects_writes() {
        let repo = LocalRepository::new();
        repo.set_healthy(false);

        let result = repo.create_student(&student("ada")).await;
        assert!(matches!(result, Err(RepositoryError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_create_and_count() {
        let repo = LocalRepository::new();
        let id = repo.create_student(&student("ada")).await.unwrap();
        assert_eq!(id, StudentId(1));
        assert_eq!(repo.student_count(), 1);

        repo.clear();
        assert_eq!(repo.student_count(), 0);
    }

    #[tokio::test]
    async fn test_create_assessment_requires_course() {
        let repo = LocalRepository::new();
        let orphan = Assessment {
            id: None,
            course_id: CourseId(77),
            name: "Quiz".to_string(),
            weight: 1.0,
            max_score: 10.0,
            active: true,
        };
        let result = repo.create_assessment(&orphan).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_trigger_publishes_nothing_and_rolls_back() {
        let sink = Arc::new(MemorySink::new());
        let repo = LocalRepository::with_sink(sink.clone());

        let student_id = repo.create_student(&student("ada")).await.unwrap();
        let course_id = repo.create_course(&course()).await.unwrap();
        let assessment_id = repo
            .create_assessment(&Assessment {
                id: None,
                course_id,
                name: "Final".to_string(),
                weight: 1.0,
                max_score: 100.0,
                active: true,
            })
            .await
            .unwrap();
        repo.set_enrollment(student_id, course_id, true).await.unwrap();
        sink.clear();

        // score above max_score aborts the transaction
        let result = repo.upsert_grade(student_id, assessment_id, 120.0).await;
        assert!(matches!(result, Err(RepositoryError::ValidationError(_))));
        assert!(sink.published().is_empty());

        let data = repo.data.read().unwrap();
        assert!(data.grades.is_empty());
    }

    #[tokio::test]
    async fn test_committed_trigger_publishes_student_keys() {
        let sink = Arc::new(MemorySink::new());
        let repo = LocalRepository::with_sink(sink.clone());

        let student_id = repo.create_student(&student("ada")).await.unwrap();
        let course_id = repo.create_course(&course()).await.unwrap();
        let assessment_id = repo
            .create_assessment(&Assessment {
                id: None,
                course_id,
                name: "Final".to_string(),
                weight: 1.0,
                max_score: 100.0,
                active: true,
            })
            .await
            .unwrap();
        let lo_id = repo
            .create_learning_outcome(&LearningOutcome {
                id: None,
                course_id,
                code: "LO1".to_string(),
                description: "Model software systems".to_string(),
                target_percentage: 60.0,
                active: true,
            })
            .await
            .unwrap();
        repo.link_assessment_lo(assessment_id, lo_id, 1.0).await.unwrap();
        repo.set_enrollment(student_id, course_id, true).await.unwrap();
        sink.clear();

        repo.upsert_grade(student_id, assessment_id, 80.0).await.unwrap();
        assert_eq!(repo.lo_achievement_count(), 1);
        assert_eq!(
            sink.published(),
            vec![format!("user:{student_id}"), format!("dashboard:user:{student_id}")]
        );
    }

    #[tokio::test]
    async fn test_audit_flags_seeded_direct_link() {
        let repo = LocalRepository::new();
        let course_id = repo.create_course(&course()).await.unwrap();
        let assessment_id = repo
            .create_assessment(&Assessment {
                id: None,
                course_id,
                name: "Quiz".to_string(),
                weight: 1.0,
                max_score: 10.0,
                active: true,
            })
            .await
            .unwrap();
        let po_id = repo
            .create_program_outcome(&ProgramOutcome {
                id: None,
                department: "CENG".to_string(),
                code: "PO1".to_string(),
                description: "Engineering design".to_string(),
                target_percentage: 60.0,
                active: true,
            })
            .await
            .unwrap();

        repo.seed_legacy_direct_po_link(assessment_id, po_id);
        let report = repo.audit_graph(5).await.unwrap();
        assert!(report.has_hard_violations());
        assert_eq!(report.direct_po_links.count, 1);
        // the unlinked assessment is a soft finding
        assert_eq!(report.unlinked_assessments.count, 1);
    }
}
