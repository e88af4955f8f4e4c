//! Postgres repository implementation using Diesel.
//!
//! This module implements the repository traits against a Postgres database
//! following the schema in `migrations/`. Every triggering mutation runs in
//! one serializable transaction; `pg_advisory_xact_lock` on the affected
//! students serializes concurrent fan-outs that overlap, and invalidation
//! keys are published only after the transaction has committed.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{FileBasedMigrations, MigrationHarness};
use tokio::task;

use crate::db::repository::{
    AchievementRepository, AuditRepository, GraphRepository, OutcomeStore, RepositoryError,
    RepositoryResult,
};
use crate::models::{
    Assessment, AssessmentId, Course, CourseId, LearningOutcome, LearningOutcomeId, LoAchievement,
    PoAchievement, ProgramOutcome, ProgramOutcomeId, Student, StudentId,
};
use crate::services::audit::{self, GraphAuditReport};
use crate::services::dispatcher::{self, DispatchSummary};
use crate::services::invalidation::{InvalidationSink, NullSink};
use crate::services::mutations;

mod models;
mod schema;
mod store;

use models::{LoAchievementRow, PoAchievementRow};
use schema::{student_lo_achievements, student_po_achievements};
use store::PgStore;

type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_pool_size: u32,
}

impl PostgresConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let max_pool_size = std::env::var("PG_POOL_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        Ok(Self {
            database_url,
            max_pool_size,
        })
    }
}

/// Diesel-backed repository for Postgres.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    sink: Arc<dyn InvalidationSink>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        Self::with_sink(config, Arc::new(NullSink))
    }

    /// Create a repository publishing invalidation keys to `sink`.
    pub fn with_sink(
        config: PostgresConfig,
        sink: Arc<dyn InvalidationSink>,
    ) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(config.database_url);
        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .build(manager)
            .map_err(|e| RepositoryError::ConnectionError(e.to_string()))?;

        // Run migrations once during initialization.
        {
            let mut conn = pool
                .get()
                .map_err(|e| RepositoryError::ConnectionError(e.to_string()))?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self { pool, sink })
    }

    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        let migrations =
            FileBasedMigrations::from_path(format!("{}/migrations", env!("CARGO_MANIFEST_DIR")))
                .map_err(|e| {
                    RepositoryError::InternalError(format!("Migrations not found: {e}"))
                })?;

        conn.run_pending_migrations(migrations)
            .map_err(|e| RepositoryError::InternalError(format!("Migration error: {e}")))?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| RepositoryError::ConnectionError(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RepositoryError::InternalError(e.to_string()))?
    }

    /// Run a triggering transaction: serializable isolation, the closure
    /// performs locking + mutation + dispatch, keys publish post-commit.
    async fn trigger<F>(&self, f: F) -> RepositoryResult<DispatchSummary>
    where
        F: FnOnce(&mut PgStore<'_>) -> RepositoryResult<DispatchSummary> + Send + 'static,
    {
        let summary = self
            .with_conn(move |conn| {
                conn.build_transaction().serializable().run(|conn| {
                    let mut store = PgStore::new(conn);
                    f(&mut store)
                })
            })
            .await?;
        self.sink.publish(&summary.invalidation_keys());
        Ok(summary)
    }
}

pub(crate) fn map_diesel_error(err: diesel::result::Error) -> RepositoryError {
    use diesel::result::{DatabaseErrorKind, Error};
    match err {
        Error::NotFound => RepositoryError::NotFound("Record not found".into()),
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            RepositoryError::ConstraintViolation(info.message().to_string())
        }
        Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            RepositoryError::ConstraintViolation(info.message().to_string())
        }
        Error::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
            RepositoryError::ValidationError(info.message().to_string())
        }
        other => RepositoryError::QueryError(other.to_string()),
    }
}

// Needed so `?` works on raw Diesel errors inside `build_transaction().run`.
impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        map_diesel_error(err)
    }
}

/// Students whose rollups a learning-outcome-scoped mutation can touch.
fn students_of_lo(store: &PgStore<'_>, lo: LearningOutcomeId) -> RepositoryResult<Vec<StudentId>> {
    match store.learning_outcome(lo) {
        Ok(row) => store.enrolled_students(row.course_id),
        Err(RepositoryError::NotFound(_)) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl GraphRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn create_student(&self, student: &Student) -> RepositoryResult<StudentId> {
        let student = student.clone();
        self.with_conn(move |conn| PgStore::new(conn).insert_student(&student))
            .await
    }

    async fn create_course(&self, course: &Course) -> RepositoryResult<CourseId> {
        let course = course.clone();
        self.with_conn(move |conn| PgStore::new(conn).insert_course(&course))
            .await
    }

    async fn create_assessment(&self, assessment: &Assessment) -> RepositoryResult<AssessmentId> {
        assessment.validate().map_err(RepositoryError::ValidationError)?;
        let assessment = assessment.clone();
        self.with_conn(move |conn| PgStore::new(conn).insert_assessment(&assessment))
            .await
    }

    async fn create_learning_outcome(
        &self,
        lo: &LearningOutcome,
    ) -> RepositoryResult<LearningOutcomeId> {
        lo.validate().map_err(RepositoryError::ValidationError)?;
        let lo = lo.clone();
        self.with_conn(move |conn| PgStore::new(conn).insert_learning_outcome(&lo))
            .await
    }

    async fn create_program_outcome(
        &self,
        po: &ProgramOutcome,
    ) -> RepositoryResult<ProgramOutcomeId> {
        po.validate().map_err(RepositoryError::ValidationError)?;
        let po = po.clone();
        self.with_conn(move |conn| PgStore::new(conn).insert_program_outcome(&po))
            .await
    }

    async fn upsert_grade(
        &self,
        student: StudentId,
        assessment: AssessmentId,
        score: f64,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            store.lock_students(&[student])?;
            mutations::upsert_grade(store, student, assessment, score)
        })
        .await
    }

    async fn delete_grade(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            store.lock_students(&[student])?;
            mutations::delete_grade(store, student, assessment)
        })
        .await
    }

    async fn set_enrollment(
        &self,
        student: StudentId,
        course: CourseId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            store.lock_students(&[student])?;
            mutations::set_enrollment(store, student, course, active)
        })
        .await
    }

    async fn set_assessment_active(
        &self,
        assessment: AssessmentId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            let row = store.assessment(assessment)?;
            let students = store.enrolled_students(row.course_id)?;
            store.lock_students(&students)?;
            mutations::set_assessment_active(store, assessment, active)
        })
        .await
    }

    async fn set_learning_outcome_active(
        &self,
        lo: LearningOutcomeId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            let students = students_of_lo(store, lo)?;
            store.lock_students(&students)?;
            mutations::set_learning_outcome_active(store, lo, active)
        })
        .await
    }

    async fn set_program_outcome_active(
        &self,
        po: ProgramOutcomeId,
        active: bool,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            let mut students = Vec::new();
            for lo in store.los_linked_to_po(po)? {
                students.extend(students_of_lo(store, lo)?);
            }
            store.lock_students(&students)?;
            mutations::set_program_outcome_active(store, po, active)
        })
        .await
    }

    async fn link_assessment_lo(
        &self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
        weight: f64,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            let students = students_of_lo(store, lo)?;
            store.lock_students(&students)?;
            mutations::link_assessment_lo(store, assessment, lo, weight)
        })
        .await
    }

    async fn unlink_assessment_lo(
        &self,
        assessment: AssessmentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            let students = students_of_lo(store, lo)?;
            store.lock_students(&students)?;
            mutations::unlink_assessment_lo(store, assessment, lo)
        })
        .await
    }

    async fn link_lo_po(
        &self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
        weight: f64,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            let students = students_of_lo(store, lo)?;
            store.lock_students(&students)?;
            mutations::link_lo_po(store, lo, po, weight)
        })
        .await
    }

    async fn unlink_lo_po(
        &self,
        lo: LearningOutcomeId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            let students = students_of_lo(store, lo)?;
            store.lock_students(&students)?;
            mutations::unlink_lo_po(store, lo, po)
        })
        .await
    }
}

#[async_trait]
impl AchievementRepository for PostgresRepository {
    async fn lo_achievement(
        &self,
        student: StudentId,
        lo: LearningOutcomeId,
    ) -> RepositoryResult<Option<LoAchievement>> {
        self.with_conn(move |conn| PgStore::new(conn).lo_achievement(student, lo))
            .await
    }

    async fn po_achievement(
        &self,
        student: StudentId,
        po: ProgramOutcomeId,
    ) -> RepositoryResult<Option<PoAchievement>> {
        self.with_conn(move |conn| {
            student_po_achievements::table
                .filter(student_po_achievements::student_id.eq(student.0))
                .filter(student_po_achievements::program_outcome_id.eq(po.0))
                .select(PoAchievementRow::as_select())
                .first::<PoAchievementRow>(conn)
                .optional()
                .map_err(map_diesel_error)
                .map(|row| row.map(PoAchievement::from))
        })
        .await
    }

    async fn lo_achievements_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<LoAchievement>> {
        self.with_conn(move |conn| {
            let rows: Vec<LoAchievementRow> = student_lo_achievements::table
                .filter(student_lo_achievements::student_id.eq(student.0))
                .select(LoAchievementRow::as_select())
                .order(student_lo_achievements::learning_outcome_id.asc())
                .load(conn)
                .map_err(map_diesel_error)?;
            Ok(rows.into_iter().map(LoAchievement::from).collect())
        })
        .await
    }

    async fn po_achievements_for_student(
        &self,
        student: StudentId,
    ) -> RepositoryResult<Vec<PoAchievement>> {
        self.with_conn(move |conn| {
            let rows: Vec<PoAchievementRow> = student_po_achievements::table
                .filter(student_po_achievements::student_id.eq(student.0))
                .select(PoAchievementRow::as_select())
                .order(student_po_achievements::program_outcome_id.asc())
                .load(conn)
                .map_err(map_diesel_error)?;
            Ok(rows.into_iter().map(PoAchievement::from).collect())
        })
        .await
    }

    async fn rebuild_student(&self, student: StudentId) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            if !store.student_exists(student)? {
                return Err(RepositoryError::NotFound(format!(
                    "Student {} not found",
                    student
                )));
            }
            store.lock_students(&[student])?;
            dispatcher::rebuild_student(store, student)
        })
        .await
    }

    async fn rebuild_all(&self) -> RepositoryResult<DispatchSummary> {
        self.trigger(move |store| {
            let students = store.student_ids()?;
            store.lock_students(&students)?;
            let mut merged = DispatchSummary::default();
            for student in students {
                merged.merge(dispatcher::rebuild_student(store, student)?);
            }
            Ok(merged)
        })
        .await
    }
}

#[async_trait]
impl AuditRepository for PostgresRepository {
    async fn audit_graph(&self, max_examples: usize) -> RepositoryResult<GraphAuditReport> {
        self.with_conn(move |conn| {
            let store = PgStore::new(conn);
            audit::audit(&store, max_examples)
        })
        .await
    }
}
