//! Criterion benchmarks for the reactive recompute path.
//!
//! Measures the grade-upsert fan-out and the bulk per-student rebuild over
//! the in-memory backend, which bounds the pure engine cost without
//! database round-trips.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use oae_rust::db::{AchievementRepository, GraphRepository, LocalRepository};
use oae_rust::models::*;

struct Fixture {
    repo: LocalRepository,
    student: StudentId,
    assessments: Vec<AssessmentId>,
}

/// One course with `n_assessments` assessments fanning into 4 LOs that all
/// roll up into 2 POs; one enrolled, fully graded student.
fn build_fixture(runtime: &Runtime, n_assessments: usize) -> Fixture {
    runtime.block_on(async {
        let repo = LocalRepository::new();
        let student = repo
            .create_student(&Student {
                id: None,
                external_ref: "bench-student".to_string(),
                name: "Bench Student".to_string(),
            })
            .await
            .unwrap();
        let course = repo
            .create_course(&Course {
                id: None,
                code: "BENCH101".to_string(),
                name: "Benchmark Course".to_string(),
                department: "CENG".to_string(),
            })
            .await
            .unwrap();

        let mut los = Vec::new();
        for i in 0..4 {
            los.push(
                repo.create_learning_outcome(&LearningOutcome {
                    id: None,
                    course_id: course,
                    code: format!("LO{i}"),
                    description: format!("Outcome {i}"),
                    target_percentage: 60.0,
                    active: true,
                })
                .await
                .unwrap(),
            );
        }
        let mut pos = Vec::new();
        for i in 0..2 {
            pos.push(
                repo.create_program_outcome(&ProgramOutcome {
                    id: None,
                    department: "CENG".to_string(),
                    code: format!("PO{i}"),
                    description: format!("Program outcome {i}"),
                    target_percentage: 60.0,
                    active: true,
                })
                .await
                .unwrap(),
            );
        }
        for (i, lo) in los.iter().enumerate() {
            for po in &pos {
                repo.link_lo_po(*lo, *po, 1.0 + i as f64).await.unwrap();
            }
        }

        let mut assessments = Vec::new();
        for i in 0..n_assessments {
            let assessment = repo
                .create_assessment(&Assessment {
                    id: None,
                    course_id: course,
                    name: format!("Assessment {i}"),
                    weight: 1.0,
                    max_score: 100.0,
                    active: true,
                })
                .await
                .unwrap();
            let lo = los[i % los.len()];
            repo.link_assessment_lo(assessment, lo, 1.0 + (i % 3) as f64)
                .await
                .unwrap();
            assessments.push(assessment);
        }

        repo.set_enrollment(student, course, true).await.unwrap();
        for (i, assessment) in assessments.iter().enumerate() {
            repo.upsert_grade(student, *assessment, (i % 101) as f64)
                .await
                .unwrap();
        }

        Fixture {
            repo,
            student,
            assessments,
        }
    })
}

fn bench_grade_upsert(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("grade_upsert_fanout");

    for n_assessments in [8, 64, 256] {
        let fixture = build_fixture(&runtime, n_assessments);
        let target = fixture.assessments[0];
        group.bench_with_input(
            BenchmarkId::from_parameter(n_assessments),
            &n_assessments,
            |b, _| {
                let mut score = 0.0;
                b.iter(|| {
                    score = (score + 1.0) % 100.0;
                    runtime
                        .block_on(fixture.repo.upsert_grade(fixture.student, target, score))
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_rebuild_student(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let mut group = c.benchmark_group("rebuild_student");

    for n_assessments in [8, 64, 256] {
        let fixture = build_fixture(&runtime, n_assessments);
        group.bench_with_input(
            BenchmarkId::from_parameter(n_assessments),
            &n_assessments,
            |b, _| {
                b.iter(|| {
                    runtime
                        .block_on(fixture.repo.rebuild_student(fixture.student))
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_grade_upsert, bench_rebuild_student);
criterion_main!(benches);
