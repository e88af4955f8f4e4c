//! Diesel row structs and their conversions to domain types.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::models::{
    Assessment, AssessmentId, Course, CourseId, LearningOutcome, LearningOutcomeId, LoAchievement,
    PoAchievement, ProgramOutcome, ProgramOutcomeId, Student, StudentId,
};

use super::schema::*;

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = students)]
pub struct StudentRow {
    pub id: i64,
    pub external_ref: String,
    pub name: String,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: Some(StudentId(row.id)),
            external_ref: row.external_ref,
            name: row.name,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = students)]
pub struct NewStudentRow {
    pub external_ref: String,
    pub name: String,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = courses)]
pub struct CourseRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub department: String,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Course {
            id: Some(CourseId(row.id)),
            code: row.code,
            name: row.name,
            department: row.department,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = courses)]
pub struct NewCourseRow {
    pub code: String,
    pub name: String,
    pub department: String,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = assessments)]
pub struct AssessmentRow {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub weight: f64,
    pub max_score: f64,
    pub active: bool,
}

impl From<AssessmentRow> for Assessment {
    fn from(row: AssessmentRow) -> Self {
        Assessment {
            id: Some(AssessmentId(row.id)),
            course_id: CourseId(row.course_id),
            name: row.name,
            weight: row.weight,
            max_score: row.max_score,
            active: row.active,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = assessments)]
pub struct NewAssessmentRow {
    pub course_id: i64,
    pub name: String,
    pub weight: f64,
    pub max_score: f64,
    pub active: bool,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = learning_outcomes)]
pub struct LearningOutcomeRow {
    pub id: i64,
    pub course_id: i64,
    pub code: String,
    pub description: String,
    pub target_percentage: f64,
    pub active: bool,
}

impl From<LearningOutcomeRow> for LearningOutcome {
    fn from(row: LearningOutcomeRow) -> Self {
        LearningOutcome {
            id: Some(LearningOutcomeId(row.id)),
            course_id: CourseId(row.course_id),
            code: row.code,
            description: row.description,
            target_percentage: row.target_percentage,
            active: row.active,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = learning_outcomes)]
pub struct NewLearningOutcomeRow {
    pub course_id: i64,
    pub code: String,
    pub description: String,
    pub target_percentage: f64,
    pub active: bool,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = program_outcomes)]
pub struct ProgramOutcomeRow {
    pub id: i64,
    pub department: String,
    pub code: String,
    pub description: String,
    pub target_percentage: f64,
    pub active: bool,
}

impl From<ProgramOutcomeRow> for ProgramOutcome {
    fn from(row: ProgramOutcomeRow) -> Self {
        ProgramOutcome {
            id: Some(ProgramOutcomeId(row.id)),
            department: row.department,
            code: row.code,
            description: row.description,
            target_percentage: row.target_percentage,
            active: row.active,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = program_outcomes)]
pub struct NewProgramOutcomeRow {
    pub department: String,
    pub code: String,
    pub description: String,
    pub target_percentage: f64,
    pub active: bool,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = student_lo_achievements)]
pub struct LoAchievementRow {
    pub student_id: i64,
    pub learning_outcome_id: i64,
    pub current_percentage: f64,
    pub total_assessments: i32,
    pub completed_assessments: i32,
    pub last_calculated: DateTime<Utc>,
}

impl From<LoAchievementRow> for LoAchievement {
    fn from(row: LoAchievementRow) -> Self {
        LoAchievement {
            student_id: StudentId(row.student_id),
            learning_outcome_id: LearningOutcomeId(row.learning_outcome_id),
            current_percentage: row.current_percentage,
            total_assessments: row.total_assessments,
            completed_assessments: row.completed_assessments,
            last_calculated: row.last_calculated,
        }
    }
}

impl From<&LoAchievement> for LoAchievementRow {
    fn from(row: &LoAchievement) -> Self {
        LoAchievementRow {
            student_id: row.student_id.0,
            learning_outcome_id: row.learning_outcome_id.0,
            current_percentage: row.current_percentage,
            total_assessments: row.total_assessments,
            completed_assessments: row.completed_assessments,
            last_calculated: row.last_calculated,
        }
    }
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = student_po_achievements)]
pub struct PoAchievementRow {
    pub student_id: i64,
    pub program_outcome_id: i64,
    pub current_percentage: f64,
    pub total_assessments: i32,
    pub completed_assessments: i32,
    pub last_calculated: DateTime<Utc>,
}

impl From<PoAchievementRow> for PoAchievement {
    fn from(row: PoAchievementRow) -> Self {
        PoAchievement {
            student_id: StudentId(row.student_id),
            program_outcome_id: ProgramOutcomeId(row.program_outcome_id),
            current_percentage: row.current_percentage,
            total_assessments: row.total_assessments,
            completed_assessments: row.completed_assessments,
            last_calculated: row.last_calculated,
        }
    }
}

impl From<&PoAchievement> for PoAchievementRow {
    fn from(row: &PoAchievement) -> Self {
        PoAchievementRow {
            student_id: row.student_id.0,
            program_outcome_id: row.program_outcome_id.0,
            current_percentage: row.current_percentage,
            total_assessments: row.total_assessments,
            completed_assessments: row.completed_assessments,
            last_calculated: row.last_calculated,
        }
    }
}
