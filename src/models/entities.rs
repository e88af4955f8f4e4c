//! Graph node entities and the raw facts recorded against them.
//!
//! The engine never mutates students or courses; it only reads them to scope
//! enrollments and fan-outs. Assessments, learning outcomes and program
//! outcomes carry the `active` flag that gates their visibility to the
//! calculator.

use serde::{Deserialize, Serialize};

use super::ids::{AssessmentId, CourseId, LearningOutcomeId, ProgramOutcomeId, StudentId};

/// A student. Identity only; the engine keys achievement rows by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: Option<StudentId>,
    /// Institution-side identifier (student number, LDAP uid, ...).
    pub external_ref: String,
    pub name: String,
}

/// A course. Groups assessments, learning outcomes and enrollments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Option<CourseId>,
    pub code: String,
    pub name: String,
    pub department: String,
}

/// A gradable event (exam, quiz, project) within a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Option<AssessmentId>,
    pub course_id: CourseId,
    pub name: String,
    /// Course-level contribution; used as the edge-weight fallback.
    pub weight: f64,
    pub max_score: f64,
    pub active: bool,
}

impl Assessment {
    /// Check the numeric ranges the store refuses to persist.
    pub fn validate(&self) -> Result<(), String> {
        if self.weight < 0.0 {
            return Err(format!("assessment weight {} must be non-negative", self.weight));
        }
        if self.max_score <= 0.0 {
            return Err(format!("assessment max_score {} must be positive", self.max_score));
        }
        Ok(())
    }
}

/// A course-scoped competency statement with a target percentage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningOutcome {
    pub id: Option<LearningOutcomeId>,
    pub course_id: CourseId,
    pub code: String,
    pub description: String,
    pub target_percentage: f64,
    pub active: bool,
}

impl LearningOutcome {
    pub fn validate(&self) -> Result<(), String> {
        validate_target(self.target_percentage)
    }
}

/// A department-scoped competency statement. Lives independently of courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramOutcome {
    pub id: Option<ProgramOutcomeId>,
    pub department: String,
    pub code: String,
    pub description: String,
    pub target_percentage: f64,
    pub active: bool,
}

impl ProgramOutcome {
    pub fn validate(&self) -> Result<(), String> {
        validate_target(self.target_percentage)
    }
}

/// Active membership of a student in a course. At most one per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub active: bool,
}

/// A recorded score for a (student, assessment) pair. At most one per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub student_id: StudentId,
    pub assessment_id: AssessmentId,
    pub score: f64,
}

fn validate_target(target: f64) -> Result<(), String> {
    if !(0.0..=100.0).contains(&target) {
        return Err(format!("target percentage {} must be within [0, 100]", target));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assessment_rejects_nonpositive_max_score() {
        let assessment = Assessment {
            id: None,
            course_id: CourseId(1),
            name: "Midterm".to_string(),
            weight: 1.0,
            max_score: 0.0,
            active: true,
        };
        assert!(assessment.validate().is_err());
    }

    #[test]
    fn assessment_rejects_negative_weight() {
        let assessment = Assessment {
            id: None,
            course_id: CourseId(1),
            name: "Midterm".to_string(),
            weight: -0.5,
            max_score: 100.0,
            active: true,
        };
        assert!(assessment.validate().is_err());
    }

    #[test]
    fn outcome_targets_bounded() {
        let lo = LearningOutcome {
            id: None,
            course_id: CourseId(1),
            code: "LO1".to_string(),
            description: "Apply numerical methods".to_string(),
            target_percentage: 70.0,
            active: true,
        };
        assert!(lo.validate().is_ok());

        let po = ProgramOutcome {
            id: None,
            department: "CENG".to_string(),
            code: "PO1".to_string(),
            description: "Engineering problem solving".to_string(),
            target_percentage: 101.0,
            active: true,
        };
        assert!(po.validate().is_err());
    }
}
