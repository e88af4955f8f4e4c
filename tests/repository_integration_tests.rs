//! Integration tests for repository implementations.

use std::sync::Arc;

use oae_rust::db::{
    AchievementRepository, AuditRepository, GraphRepository, LocalRepository, RepositoryError,
};
use oae_rust::models::*;
use oae_rust::services::invalidation::MemorySink;

fn student(external_ref: &str) -> Student {
    Student {
        id: None,
        external_ref: external_ref.to_string(),
        name: format!("Student {external_ref}"),
    }
}

fn course(code: &str) -> Course {
    Course {
        id: None,
        code: code.to_string(),
        name: format!("Course {code}"),
        department: "CENG".to_string(),
    }
}

fn assessment(course_id: CourseId, name: &str) -> Assessment {
    Assessment {
        id: None,
        course_id,
        name: name.to_string(),
        weight: 1.0,
        max_score: 100.0,
        active: true,
    }
}

fn learning_outcome(course_id: CourseId, code: &str) -> LearningOutcome {
    LearningOutcome {
        id: None,
        course_id,
        code: code.to_string(),
        description: format!("{code} description"),
        target_percentage: 60.0,
        active: true,
    }
}

fn program_outcome(code: &str) -> ProgramOutcome {
    ProgramOutcome {
        id: None,
        department: "CENG".to_string(),
        code: code.to_string(),
        description: format!("{code} description"),
        target_percentage: 60.0,
        active: true,
    }
}

#[tokio::test]
async fn test_repository_health_check() {
    let repo: Arc<dyn GraphRepository> = Arc::new(LocalRepository::new());
    let result = repo.health_check().await;
    assert!(result.is_ok());
    assert!(result.unwrap());
}

#[tokio::test]
async fn test_not_found_errors() {
    let repo = LocalRepository::new();

    let result = repo.upsert_grade(StudentId(99), AssessmentId(99), 10.0).await;
    assert!(matches!(result, Err(RepositoryError::NotFound(_))));

    let result = repo.set_enrollment(StudentId(99), CourseId(99), true).await;
    assert!(matches!(result, Err(RepositoryError::NotFound(_))));

    let result = repo.rebuild_student(StudentId(99)).await;
    assert!(matches!(result, Err(RepositoryError::NotFound(_))));
}

#[tokio::test]
async fn test_cross_course_link_rejected() {
    let repo = LocalRepository::new();
    let c1 = repo.create_course(&course("CENG301")).await.unwrap();
    let c2 = repo.create_course(&course("CENG302")).await.unwrap();
    let a = repo.create_assessment(&assessment(c1, "Final")).await.unwrap();
    let lo = repo
        .create_learning_outcome(&learning_outcome(c2, "LO1"))
        .await
        .unwrap();

    let result = repo.link_assessment_lo(a, lo, 1.0).await;
    assert!(matches!(result, Err(RepositoryError::ConstraintViolation(_))));

    // the rejected edge must not exist
    let report = repo.audit_graph(5).await.unwrap();
    assert_eq!(report.cross_course_links.count, 0);
}

#[tokio::test]
async fn test_nonpositive_edge_weight_rejected() {
    let repo = LocalRepository::new();
    let c = repo.create_course(&course("CENG301")).await.unwrap();
    let a = repo.create_assessment(&assessment(c, "Final")).await.unwrap();
    let lo = repo
        .create_learning_outcome(&learning_outcome(c, "LO1"))
        .await
        .unwrap();
    let po = repo.create_program_outcome(&program_outcome("PO1")).await.unwrap();

    assert!(matches!(
        repo.link_assessment_lo(a, lo, 0.0).await,
        Err(RepositoryError::ValidationError(_))
    ));
    assert!(matches!(
        repo.link_lo_po(lo, po, -2.0).await,
        Err(RepositoryError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_delete_absent_grade_is_noop() {
    let repo = LocalRepository::new();
    let s = repo.create_student(&student("s1")).await.unwrap();
    let c = repo.create_course(&course("CENG301")).await.unwrap();
    let a = repo.create_assessment(&assessment(c, "Final")).await.unwrap();

    let summary = repo.delete_grade(s, a).await.unwrap();
    assert!(summary.is_empty());
}

#[tokio::test]
async fn test_rebuild_student_matches_reactive_state() {
    let repo = LocalRepository::new();
    let s = repo.create_student(&student("s1")).await.unwrap();
    let c = repo.create_course(&course("CENG301")).await.unwrap();
    let a1 = repo.create_assessment(&assessment(c, "Midterm")).await.unwrap();
    let a2 = repo.create_assessment(&assessment(c, "Final")).await.unwrap();
    let lo = repo
        .create_learning_outcome(&learning_outcome(c, "LO1"))
        .await
        .unwrap();
    let po = repo.create_program_outcome(&program_outcome("PO1")).await.unwrap();
    repo.link_assessment_lo(a1, lo, 1.0).await.unwrap();
    repo.link_assessment_lo(a2, lo, 3.0).await.unwrap();
    repo.link_lo_po(lo, po, 1.0).await.unwrap();
    repo.set_enrollment(s, c, true).await.unwrap();
    repo.upsert_grade(s, a1, 80.0).await.unwrap();
    repo.upsert_grade(s, a2, 60.0).await.unwrap();

    let reactive_lo = repo.lo_achievement(s, lo).await.unwrap().unwrap();
    let reactive_po = repo.po_achievement(s, po).await.unwrap().unwrap();

    let summary = repo.rebuild_student(s).await.unwrap();
    assert_eq!(summary.lo_recomputed, 1);
    assert_eq!(summary.po_recomputed, 1);

    let rebuilt_lo = repo.lo_achievement(s, lo).await.unwrap().unwrap();
    let rebuilt_po = repo.po_achievement(s, po).await.unwrap().unwrap();
    assert_eq!(reactive_lo.current_percentage, rebuilt_lo.current_percentage);
    assert_eq!(reactive_lo.total_assessments, rebuilt_lo.total_assessments);
    assert_eq!(reactive_po.current_percentage, rebuilt_po.current_percentage);
}

#[tokio::test]
async fn test_rebuild_all_covers_every_student() {
    let repo = LocalRepository::new();
    let c = repo.create_course(&course("CENG301")).await.unwrap();
    let a = repo.create_assessment(&assessment(c, "Final")).await.unwrap();
    let lo = repo
        .create_learning_outcome(&learning_outcome(c, "LO1"))
        .await
        .unwrap();
    repo.link_assessment_lo(a, lo, 1.0).await.unwrap();

    let mut students = Vec::new();
    for i in 0..4 {
        let s = repo.create_student(&student(&format!("s{i}"))).await.unwrap();
        repo.set_enrollment(s, c, true).await.unwrap();
        repo.upsert_grade(s, a, 50.0 + 10.0 * i as f64).await.unwrap();
        students.push(s);
    }

    let summary = repo.rebuild_all().await.unwrap();
    assert_eq!(summary.lo_recomputed, 4);
    assert_eq!(summary.students_touched, students);
}

#[tokio::test]
async fn test_achievements_for_student_listing() {
    let repo = LocalRepository::new();
    let s = repo.create_student(&student("s1")).await.unwrap();
    let c = repo.create_course(&course("CENG301")).await.unwrap();
    let a = repo.create_assessment(&assessment(c, "Final")).await.unwrap();
    let lo1 = repo
        .create_learning_outcome(&learning_outcome(c, "LO1"))
        .await
        .unwrap();
    let lo2 = repo
        .create_learning_outcome(&learning_outcome(c, "LO2"))
        .await
        .unwrap();
    repo.link_assessment_lo(a, lo1, 1.0).await.unwrap();
    repo.link_assessment_lo(a, lo2, 1.0).await.unwrap();
    repo.set_enrollment(s, c, true).await.unwrap();
    repo.upsert_grade(s, a, 90.0).await.unwrap();

    let rows = repo.lo_achievements_for_student(s).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].learning_outcome_id, lo1);
    assert_eq!(rows[1].learning_outcome_id, lo2);
}

#[tokio::test]
async fn test_concurrent_triggering_transactions() {
    use tokio::task::JoinSet;

    let repo = Arc::new(LocalRepository::new());
    let c = repo.create_course(&course("CENG301")).await.unwrap();
    let a = repo.create_assessment(&assessment(c, "Final")).await.unwrap();
    let lo = repo
        .create_learning_outcome(&learning_outcome(c, "LO1"))
        .await
        .unwrap();
    repo.link_assessment_lo(a, lo, 1.0).await.unwrap();

    let mut students = Vec::new();
    for i in 0..10 {
        let s = repo.create_student(&student(&format!("s{i}"))).await.unwrap();
        repo.set_enrollment(s, c, true).await.unwrap();
        students.push(s);
    }

    let mut set = JoinSet::new();
    for (i, s) in students.iter().enumerate() {
        let repo_clone = repo.clone();
        let s = *s;
        set.spawn(async move { repo_clone.upsert_grade(s, a, 10.0 * i as f64).await });
    }

    let mut count = 0;
    while let Some(result) = set.join_next().await {
        assert!(result.is_ok());
        assert!(result.unwrap().is_ok());
        count += 1;
    }
    assert_eq!(count, 10);

    for (i, s) in students.iter().enumerate() {
        let row = repo.lo_achievement(*s, lo).await.unwrap().unwrap();
        assert_eq!(row.current_percentage, 10.0 * i as f64);
    }
}

#[tokio::test]
async fn test_invalidation_only_after_commit() {
    let sink = Arc::new(MemorySink::new());
    let repo = LocalRepository::with_sink(sink.clone());

    let s = repo.create_student(&student("s1")).await.unwrap();
    let c = repo.create_course(&course("CENG301")).await.unwrap();
    let a = repo.create_assessment(&assessment(c, "Final")).await.unwrap();
    repo.set_enrollment(s, c, true).await.unwrap();
    sink.clear();

    // committed trigger publishes the student's keys
    repo.upsert_grade(s, a, 40.0).await.unwrap();
    let published = sink.published();
    assert!(published.contains(&format!("user:{s}")));
    assert!(published.contains(&format!("dashboard:user:{s}")));

    // aborted trigger publishes nothing
    sink.clear();
    let result = repo.upsert_grade(s, a, 400.0).await;
    assert!(result.is_err());
    assert!(sink.published().is_empty());
}

#[tokio::test]
async fn test_audit_reports_staged_gaps() {
    let repo = LocalRepository::new();
    let c = repo.create_course(&course("CENG301")).await.unwrap();
    let _a = repo.create_assessment(&assessment(c, "Final")).await.unwrap();
    let _lo = repo
        .create_learning_outcome(&learning_outcome(c, "LO1"))
        .await
        .unwrap();

    let report = repo.audit_graph(10).await.unwrap();
    assert!(!report.is_clean());
    assert!(!report.has_hard_violations());
    assert_eq!(report.unlinked_assessments.count, 1);
    assert_eq!(report.unlinked_learning_outcomes.count, 1);
}
