//! Domain model for the outcome graph.
//!
//! The graph has three levels of nodes (assessments, learning outcomes,
//! program outcomes) connected by two typed, weighted edge tables, plus the
//! two materialized achievement projections derived from grades.

pub mod achievement;
pub mod edges;
pub mod entities;
pub mod ids;

pub use achievement::{LoAchievement, PoAchievement};
pub use edges::{AssessmentLoLink, LoPoLink};
pub use entities::{Assessment, Course, Enrollment, Grade, LearningOutcome, ProgramOutcome, Student};
pub use ids::{AssessmentId, CourseId, LearningOutcomeId, ProgramOutcomeId, StudentId};
