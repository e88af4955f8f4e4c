//! `OutcomeStore` implementation over a borrowed Postgres connection.
//!
//! One `PgStore` lives for exactly one Diesel transaction; the calculator
//! and dispatcher run against it without knowing they are inside Postgres.
//! The connection sits behind a `RefCell` because the store contract takes
//! `&self` for reads while every Diesel call needs `&mut PgConnection`.

use std::cell::RefCell;

use diesel::dsl::{exists, not};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::BigInt;
use diesel::upsert::excluded;

use crate::db::repository::{OutcomeStore, RepositoryError, RepositoryResult};
use crate::models::{
    Assessment, AssessmentId, Course, CourseId, LearningOutcome, LearningOutcomeId, LoAchievement,
    PoAchievement, ProgramOutcome, ProgramOutcomeId, Student, StudentId,
};

use super::map_diesel_error;
use super::models::*;
use super::schema::*;

pub(crate) struct PgStore<'a> {
    conn: RefCell<&'a mut PgConnection>,
}

#[derive(QueryableByName)]
struct LinkPairRow {
    #[diesel(sql_type = BigInt)]
    left_id: i64,
    #[diesel(sql_type = BigInt)]
    right_id: i64,
}

#[derive(QueryableByName)]
struct PresenceRow {
    #[diesel(sql_type = diesel::sql_types::Bool)]
    present: bool,
}

impl<'a> PgStore<'a> {
    pub(crate) fn new(conn: &'a mut PgConnection) -> Self {
        Self {
            conn: RefCell::new(conn),
        }
    }

    /// Take `pg_advisory_xact_lock` for every student, in ascending id order
    /// so concurrent fan-outs cannot deadlock. The locks release at commit
    /// or rollback.
    pub(crate) fn lock_students(&self, students: &[StudentId]) -> RepositoryResult<()> {
        let mut ids: Vec<i64> = students.iter().map(|s| s.0).collect();
        ids.sort_unstable();
        ids.dedup();
        let mut conn = self.conn.borrow_mut();
        for id in ids {
            sql_query("SELECT pg_advisory_xact_lock($1)")
                .bind::<BigInt, _>(id)
                .execute(&mut **conn)
                .map_err(map_diesel_error)?;
        }
        Ok(())
    }
}

impl OutcomeStore for PgStore<'_> {
    fn student_exists(&self, student: StudentId) -> RepositoryResult<bool> {
        let mut conn = self.conn.borrow_mut();
        diesel::select(exists(
            students::table.filter(students::id.eq(student.0)),
        ))
        .get_result(&mut **conn)
        .map_err(map_diesel_error)
    }

    fn student_ids(&self) -> RepositoryResult<Vec<StudentId>> {
        let mut conn = self.conn.borrow_mut();
        let ids: Vec<i64> = students::table
            .select(students::id)
            .order(students::id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(StudentId).collect())
    }

    fn course_exists(&self, course: CourseId) -> RepositoryResult<bool> {
        let mut conn = self.conn.borrow_mut();
        diesel::select(exists(courses::table.filter(courses::id.eq(course.0))))
            .get_result(&mut **conn)
            .map_err(map_diesel_error)
    }

    fn assessment(&self, assessment: AssessmentId) -> RepositoryResult<Assessment> {
        let mut conn = self.conn.borrow_mut();
        assessments::table
            .filter(assessments::id.eq(assessment.0))
            .select(AssessmentRow::as_select())
            .first::<AssessmentRow>(&mut **conn)
            .map(Assessment::from)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    RepositoryError::NotFound(format!("Assessment {} not found", assessment))
                }
                other => map_diesel_error(other),
            })
    }

    fn learning_outcome(&self, lo: LearningOutcomeId) -> RepositoryResult<LearningOutcome> {
        let mut conn = self.conn.borrow_mut();
        learning_outcomes::table
            .filter(learning_outcomes::id.eq(lo.0))
            .select(LearningOutcomeRow::as_select())
            .first::<LearningOutcomeRow>(&mut **conn)
            .map(LearningOutcome::from)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    RepositoryError::NotFound(format!("Learning outcome {} not found", lo))
                }
                other => map_diesel_error(other),
            })
    }

    fn program_outcome(&self, po: ProgramOutcomeId) -> RepositoryResult<ProgramOutcome> {
        let mut conn = self.conn.borrow_mut();
        program_outcomes::table
            .filter(program_outcomes::id.eq(po.0))
            .select(ProgramOutcomeRow::as_select())
            .first::<ProgramOutcomeRow>(&mut **conn)
            .map(ProgramOutcome::from)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    RepositoryError::NotFound(format!("Program outcome {} not found", po))
                }
                other => map_diesel_error(other),
            })
    }

    fn enrolled_active_courses(&self, student: StudentId) -> RepositoryResult<Vec<CourseId>> {
        let mut conn = self.conn.borrow_mut();
        let ids: Vec<i64> = enrollments::table
            .filter(enrollments::student_id.eq(student.0))
            .filter(enrollments::active.eq(true))
            .select(enrollments::course_id)
            .order(enrollments::course_id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(CourseId).collect())
    }

    fn active_enrollment_exists(
        &self,
        student: StudentId,
        course: CourseId,
    ) -> RepositoryResult<bool> {
        let mut conn = self.conn.borrow_mut();
        diesel::select(exists(
            enrollments::table
                .filter(enrollments::student_id.eq(student.0))
                .filter(enrollments::course_id.eq(course.0))
                .filter(enrollments::active.eq(true)),
        ))
        .get_result(&mut **conn)
        .map_err(map_diesel_error)
    }

    fn enrolled_students(&self, course: CourseId) -> RepositoryResult<Vec<StudentId>> {
        let mut conn = self.conn.borrow_mut();
        let ids: Vec<i64> = enrollments::table
            .filter(enrollments::course_id.eq(course.0))
            .filter(enrollments::active.eq(true))
            .select(enrollments::student_id)
            .order(enrollments::student_id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(StudentId).collect())
    }

    fn active_los_of_course(&self, course: CourseId) -> RepositoryResult<Vec<LearningOutcome>> {
        let mut conn = self.conn.borrow_mut();
        let rows: Vec<LearningOutcomeRow> = learning_outcomes::table
            .filter(learning_outcomes::course_id.eq(course.0))
            .filter(learning_outcomes::active.eq(true))
            .select(LearningOutcomeRow::as_select())
            .order(learning_outcomes::id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(LearningOutcome::from).collect())
    }

    fn los_of_course(&self, course: CourseId) -> RepositoryResult<Vec<LearningOutcomeId>> {
        let mut conn = self.conn.borrow_mut();
        let ids: Vec<i64> = learning_outcomes::table
            .filter(learning_outcomes::course_id.eq(course.0))
            .select(learning_outcomes::id)
            .order(learning_outcomes::id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(LearningOutcomeId).collect())
    }

    fn active_assessments_touching_lo(
        &self,
        course: CourseId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Vec<Assessment>> {
        let mut conn = self.conn.borrow_mut();
        let linked = assessment_lo_links::table
            .filter(assessment_lo_links::learning_outcome_id.eq(lo.0))
            .select(assessment_lo_links::assessment_id);
        let rows: Vec<AssessmentRow> = assessments::table
            .filter(assessments::course_id.eq(course.0))
            .filter(assessments::active.eq(true))
            .filter(assessments::id.eq_any(linked))
            .select(AssessmentRow::as_select())
            .order(assessments::id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(Assessment::from).collect())
    }

    fn assessment_lo_weight(
        &self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Option<f64>> {
        let mut conn = self.conn.borrow_mut();
        assessment_lo_links::table
            .filter(assessment_lo_links::assessment_id.eq(assessment.0))
            .filter(assessment_lo_links::learning_outcome_id.eq(lo.0))
            .select(assessment_lo_links::weight)
            .first(&mut **conn)
            .optional()
            .map_err(map_diesel_error)
    }

    fn grade_score(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> RepositoryResult<Option<f64>> {
        let mut conn = self.conn.borrow_mut();
        grades::table
            .filter(grades::student_id.eq(student.0))
            .filter(grades::assessment_id.eq(assessment.0))
            .select(grades::score)
            .first(&mut **conn)
            .optional()
            .map_err(map_diesel_error)
    }

    fn los_linked_to_assessment(
        &self,
        assessment: AssessmentId,
    ) -> RepositoryResult<Vec<LearningOutcomeId>> {
        let mut conn = self.conn.borrow_mut();
        let ids: Vec<i64> = assessment_lo_links::table
            .filter(assessment_lo_links::assessment_id.eq(assessment.0))
            .select(assessment_lo_links::learning_outcome_id)
            .order(assessment_lo_links::learning_outcome_id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(LearningOutcomeId).collect())
    }

    fn pos_linked_to_lo(
        &self,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Vec<ProgramOutcomeId>> {
        let mut conn = self.conn.borrow_mut();
        let ids: Vec<i64> = lo_po_links::table
            .filter(lo_po_links::learning_outcome_id.eq(lo.0))
            .select(lo_po_links::program_outcome_id)
            .order(lo_po_links::program_outcome_id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(ProgramOutcomeId).collect())
    }

    fn los_linked_to_po(
        &self,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<Vec<LearningOutcomeId>> {
        let mut conn = self.conn.borrow_mut();
        let ids: Vec<i64> = lo_po_links::table
            .filter(lo_po_links::program_outcome_id.eq(po.0))
            .select(lo_po_links::learning_outcome_id)
            .order(lo_po_links::learning_outcome_id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(LearningOutcomeId).collect())
    }

    fn los_pointing_to_po_for_student(
        &self,
        po: ProgramOutcomeId,
        student: StudentId,
    ) -> RepositoryResult<Vec<LearningOutcome>> {
        let mut conn = self.conn.borrow_mut();
        let linked = lo_po_links::table
            .filter(lo_po_links::program_outcome_id.eq(po.0))
            .select(lo_po_links::learning_outcome_id);
        let enrolled = enrollments::table
            .filter(enrollments::student_id.eq(student.0))
            .filter(enrollments::active.eq(true))
            .select(enrollments::course_id);
        let rows: Vec<LearningOutcomeRow> = learning_outcomes::table
            .filter(learning_outcomes::id.eq_any(linked))
            .filter(learning_outcomes::active.eq(true))
            .filter(learning_outcomes::course_id.eq_any(enrolled))
            .select(LearningOutcomeRow::as_select())
            .order(learning_outcomes::id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(LearningOutcome::from).collect())
    }

    fn lopo_weight(
        &self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<Option<f64>> {
        let mut conn = self.conn.borrow_mut();
        lo_po_links::table
            .filter(lo_po_links::learning_outcome_id.eq(lo.0))
            .filter(lo_po_links::program_outcome_id.eq(po.0))
            .select(lo_po_links::weight)
            .first(&mut **conn)
            .optional()
            .map_err(map_diesel_error)
    }

    fn lo_achievement(
        &self,
        student: StudentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Option<LoAchievement>> {
        let mut conn = self.conn.borrow_mut();
        student_lo_achievements::table
            .filter(student_lo_achievements::student_id.eq(student.0))
            .filter(student_lo_achievements::learning_outcome_id.eq(lo.0))
            .select(LoAchievementRow::as_select())
            .first::<LoAchievementRow>(&mut **conn)
            .optional()
            .map_err(map_diesel_error)
            .map(|row| row.map(LoAchievement::from))
    }

    fn lo_achievement_los_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<LearningOutcomeId>> {
        let mut conn = self.conn.borrow_mut();
        let ids: Vec<i64> = student_lo_achievements::table
            .filter(student_lo_achievements::student_id.eq(student.0))
            .select(student_lo_achievements::learning_outcome_id)
            .order(student_lo_achievements::learning_outcome_id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(LearningOutcomeId).collect())
    }

    fn po_achievement_pos_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<ProgramOutcomeId>> {
        let mut conn = self.conn.borrow_mut();
        let ids: Vec<i64> = student_po_achievements::table
            .filter(student_po_achievements::student_id.eq(student.0))
            .select(student_po_achievements::program_outcome_id)
            .order(student_po_achievements::program_outcome_id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(ProgramOutcomeId).collect())
    }

    fn upsert_lo_achievement(&mut self, row: &LoAchievement) -> RepositoryResult<()> {
        let insert = LoAchievementRow::from(row);
        let mut conn = self.conn.borrow_mut();
        diesel::insert_into(student_lo_achievements::table)
            .values(&insert)
            .on_conflict((
                student_lo_achievements::student_id,
                student_lo_achievements::learning_outcome_id,
            ))
            .do_update()
            .set((
                student_lo_achievements::current_percentage
                    .eq(excluded(student_lo_achievements::current_percentage)),
                student_lo_achievements::total_assessments
                    .eq(excluded(student_lo_achievements::total_assessments)),
                student_lo_achievements::completed_assessments
                    .eq(excluded(student_lo_achievements::completed_assessments)),
                student_lo_achievements::last_calculated
                    .eq(excluded(student_lo_achievements::last_calculated)),
            ))
            .execute(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(())
    }

    fn upsert_po_achievement(&mut self, row: &PoAchievement) -> RepositoryResult<()> {
        let insert = PoAchievementRow::from(row);
        let mut conn = self.conn.borrow_mut();
        diesel::insert_into(student_po_achievements::table)
            .values(&insert)
            .on_conflict((
                student_po_achievements::student_id,
                student_po_achievements::program_outcome_id,
            ))
            .do_update()
            .set((
                student_po_achievements::current_percentage
                    .eq(excluded(student_po_achievements::current_percentage)),
                student_po_achievements::total_assessments
                    .eq(excluded(student_po_achievements::total_assessments)),
                student_po_achievements::completed_assessments
                    .eq(excluded(student_po_achievements::completed_assessments)),
                student_po_achievements::last_calculated
                    .eq(excluded(student_po_achievements::last_calculated)),
            ))
            .execute(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(())
    }

    fn delete_lo_achievement(
        &mut self,
        student: StudentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<bool> {
        let mut conn = self.conn.borrow_mut();
        let deleted = diesel::delete(
            student_lo_achievements::table
                .filter(student_lo_achievements::student_id.eq(student.0))
                .filter(student_lo_achievements::learning_outcome_id.eq(lo.0)),
        )
        .execute(&mut **conn)
        .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    fn insert_student(&mut self, student: &Student) -> RepositoryResult<StudentId> {
        let mut conn = self.conn.borrow_mut();
        let id: i64 = diesel::insert_into(students::table)
            .values(&NewStudentRow {
                external_ref: student.external_ref.clone(),
                name: student.name.clone(),
            })
            .returning(students::id)
            .get_result(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(StudentId(id))
    }

    fn insert_course(&mut self, course: &Course) -> RepositoryResult<CourseId> {
        let mut conn = self.conn.borrow_mut();
        let id: i64 = diesel::insert_into(courses::table)
            .values(&NewCourseRow {
                code: course.code.clone(),
                name: course.name.clone(),
                department: course.department.clone(),
            })
            .returning(courses::id)
            .get_result(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(CourseId(id))
    }

    fn insert_assessment(&mut self, assessment: &Assessment) -> RepositoryResult<AssessmentId> {
        let mut conn = self.conn.borrow_mut();
        let id: i64 = diesel::insert_into(assessments::table)
            .values(&NewAssessmentRow {
                course_id: assessment.course_id.0,
                name: assessment.name.clone(),
                weight: assessment.weight,
                max_score: assessment.max_score,
                active: assessment.active,
            })
            .returning(assessments::id)
            .get_result(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(AssessmentId(id))
    }

    fn insert_learning_outcome(
        &mut self,
        lo: &LearningOutcome,
    ) -> RepositoryResult<LearningOutcomeId> {
        let mut conn = self.conn.borrow_mut();
        let id: i64 = diesel::insert_into(learning_outcomes::table)
            .values(&NewLearningOutcomeRow {
                course_id: lo.course_id.0,
                code: lo.code.clone(),
                description: lo.description.clone(),
                target_percentage: lo.target_percentage,
                active: lo.active,
            })
            .returning(learning_outcomes::id)
            .get_result(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(LearningOutcomeId(id))
    }

    fn insert_program_outcome(
        &mut self,
        po: &ProgramOutcome,
    ) -> RepositoryResult<ProgramOutcomeId> {
        let mut conn = self.conn.borrow_mut();
        let id: i64 = diesel::insert_into(program_outcomes::table)
            .values(&NewProgramOutcomeRow {
                department: po.department.clone(),
                code: po.code.clone(),
                description: po.description.clone(),
                target_percentage: po.target_percentage,
                active: po.active,
            })
            .returning(program_outcomes::id)
            .get_result(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ProgramOutcomeId(id))
    }

    fn put_grade(
        &mut self,
        student: StudentId,
        assessment: AssessmentId,
        score: f64,
    ) -> RepositoryResult<()> {
        let mut conn = self.conn.borrow_mut();
        diesel::insert_into(grades::table)
            .values((
                grades::student_id.eq(student.0),
                grades::assessment_id.eq(assessment.0),
                grades::score.eq(score),
            ))
            .on_conflict((grades::student_id, grades::assessment_id))
            .do_update()
            .set(grades::score.eq(score))
            .execute(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(())
    }

    fn remove_grade(
        &mut self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> RepositoryResult<bool> {
        let mut conn = self.conn.borrow_mut();
        let deleted = diesel::delete(
            grades::table
                .filter(grades::student_id.eq(student.0))
                .filter(grades::assessment_id.eq(assessment.0)),
        )
        .execute(&mut **conn)
        .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    fn put_enrollment(
        &mut self,
        student: StudentId,
        course: CourseId,
        active: bool,
    ) -> RepositoryResult<()> {
        let mut conn = self.conn.borrow_mut();
        diesel::insert_into(enrollments::table)
            .values((
                enrollments::student_id.eq(student.0),
                enrollments::course_id.eq(course.0),
                enrollments::active.eq(active),
            ))
            .on_conflict((enrollments::student_id, enrollments::course_id))
            .do_update()
            .set(enrollments::active.eq(active))
            .execute(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(())
    }

    fn set_assessment_active_flag(
        &mut self,
        assessment: AssessmentId,
        active: bool,
    ) -> RepositoryResult<()> {
        let mut conn = self.conn.borrow_mut();
        let updated = diesel::update(assessments::table.filter(assessments::id.eq(assessment.0)))
            .set(assessments::active.eq(active))
            .execute(&mut **conn)
            .map_err(map_diesel_error)?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Assessment {} not found",
                assessment
            )));
        }
        Ok(())
    }

    fn set_learning_outcome_active_flag(
        &mut self,
        lo: LearningOutcomeId,
        active: bool,
    ) -> RepositoryResult<()> {
        let mut conn = self.conn.borrow_mut();
        let updated =
            diesel::update(learning_outcomes::table.filter(learning_outcomes::id.eq(lo.0)))
                .set(learning_outcomes::active.eq(active))
                .execute(&mut **conn)
                .map_err(map_diesel_error)?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Learning outcome {} not found",
                lo
            )));
        }
        Ok(())
    }

    fn set_program_outcome_active_flag(
        &mut self,
        po: ProgramOutcomeId,
        active: bool,
    ) -> RepositoryResult<()> {
        let mut conn = self.conn.borrow_mut();
        let updated =
            diesel::update(program_outcomes::table.filter(program_outcomes::id.eq(po.0)))
                .set(program_outcomes::active.eq(active))
                .execute(&mut **conn)
                .map_err(map_diesel_error)?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Program outcome {} not found",
                po
            )));
        }
        Ok(())
    }

    fn put_assessment_lo_link(
        &mut self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
        weight: f64,
    ) -> RepositoryResult<()> {
        let mut conn = self.conn.borrow_mut();
        // The carried course id feeds the composite same-course foreign keys.
        let course_id: i64 = assessments::table
            .filter(assessments::id.eq(assessment.0))
            .select(assessments::course_id)
            .first(&mut **conn)
            .map_err(map_diesel_error)?;
        diesel::insert_into(assessment_lo_links::table)
            .values((
                assessment_lo_links::assessment_id.eq(assessment.0),
                assessment_lo_links::learning_outcome_id.eq(lo.0),
                assessment_lo_links::course_id.eq(course_id),
                assessment_lo_links::weight.eq(weight),
            ))
            .on_conflict((
                assessment_lo_links::assessment_id,
                assessment_lo_links::learning_outcome_id,
            ))
            .do_update()
            .set(assessment_lo_links::weight.eq(weight))
            .execute(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(())
    }

    fn remove_assessment_lo_link(
        &mut self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<bool> {
        let mut conn = self.conn.borrow_mut();
        let deleted = diesel::delete(
            assessment_lo_links::table
                .filter(assessment_lo_links::assessment_id.eq(assessment.0))
                .filter(assessment_lo_links::learning_outcome_id.eq(lo.0)),
        )
        .execute(&mut **conn)
        .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    fn put_lo_po_link(
        &mut self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
        weight: f64,
    ) -> RepositoryResult<()> {
        let mut conn = self.conn.borrow_mut();
        diesel::insert_into(lo_po_links::table)
            .values((
                lo_po_links::learning_outcome_id.eq(lo.0),
                lo_po_links::program_outcome_id.eq(po.0),
                lo_po_links::weight.eq(weight),
            ))
            .on_conflict((
                lo_po_links::learning_outcome_id,
                lo_po_links::program_outcome_id,
            ))
            .do_update()
            .set(lo_po_links::weight.eq(weight))
            .execute(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(())
    }

    fn remove_lo_po_link(
        &mut self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<bool> {
        let mut conn = self.conn.borrow_mut();
        let deleted = diesel::delete(
            lo_po_links::table
                .filter(lo_po_links::learning_outcome_id.eq(lo.0))
                .filter(lo_po_links::program_outcome_id.eq(po.0)),
        )
        .execute(&mut **conn)
        .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    fn active_assessments_without_lo_links(&self) -> RepositoryResult<Vec<AssessmentId>> {
        let mut conn = self.conn.borrow_mut();
        let linked = assessment_lo_links::table.select(assessment_lo_links::assessment_id);
        let ids: Vec<i64> = assessments::table
            .filter(assessments::active.eq(true))
            .filter(not(assessments::id.eq_any(linked)))
            .select(assessments::id)
            .order(assessments::id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(AssessmentId).collect())
    }

    fn active_los_without_po_links(&self) -> RepositoryResult<Vec<LearningOutcomeId>> {
        let mut conn = self.conn.borrow_mut();
        let linked = lo_po_links::table.select(lo_po_links::learning_outcome_id);
        let ids: Vec<i64> = learning_outcomes::table
            .filter(learning_outcomes::active.eq(true))
            .filter(not(learning_outcomes::id.eq_any(linked)))
            .select(learning_outcomes::id)
            .order(learning_outcomes::id.asc())
            .load(&mut **conn)
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(LearningOutcomeId).collect())
    }

    fn cross_course_assessment_lo_links(
        &self,
    ) -> RepositoryResult<Vec<(AssessmentId, LearningOutcomeId)>> {
        let mut conn = self.conn.borrow_mut();
        let rows: Vec<LinkPairRow> = sql_query(
            "SELECT l.assessment_id AS left_id, l.learning_outcome_id AS right_id \
             FROM assessment_lo_links l \
             JOIN assessments a ON a.id = l.assessment_id \
             JOIN learning_outcomes lo ON lo.id = l.learning_outcome_id \
             WHERE a.course_id <> lo.course_id \
             ORDER BY 1, 2",
        )
        .load(&mut **conn)
        .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(|r| (AssessmentId(r.left_id), LearningOutcomeId(r.right_id)))
            .collect())
    }

    fn legacy_direct_po_links(
        &self,
    ) -> RepositoryResult<Vec<(AssessmentId, ProgramOutcomeId)>> {
        let mut conn = self.conn.borrow_mut();
        // The table is dropped by the DAG migration; databases restored from
        // older dumps may still carry it.
        let presence: PresenceRow = sql_query(
            "SELECT to_regclass('assessment_program_outcomes') IS NOT NULL AS present",
        )
        .get_result(&mut **conn)
        .map_err(map_diesel_error)?;
        if !presence.present {
            return Ok(Vec::new());
        }
        let rows: Vec<LinkPairRow> = sql_query(
            "SELECT assessment_id AS left_id, program_outcome_id AS right_id \
             FROM assessment_program_outcomes ORDER BY 1, 2",
        )
        .load(&mut **conn)
        .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(|r| (AssessmentId(r.left_id), ProgramOutcomeId(r.right_id)))
            .collect())
    }
}
