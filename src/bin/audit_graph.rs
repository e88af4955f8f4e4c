//! Read-only audit of the outcome graph.
//!
//! Scans the configured repository for staged-data gaps (active assessments
//! without LO edges, active LOs without PO edges) and structural corruption
//! (cross-course Assessment→LO edges, residual direct Assessment→PO links).
//! Exits non-zero when a hard invariant is broken.
//!
//! Usage:
//!   oae-audit [MAX_EXAMPLES] [--json]
//!
//! The backend is selected with `REPOSITORY_TYPE` (and `DATABASE_URL` for
//! Postgres), like every other embedding of the engine.

use anyhow::Result;

use oae_rust::db::{AuditRepository, RepositoryFactory};
use oae_rust::services::audit::{GraphAuditReport, ViolationSummary};

fn print_section(title: &str, summary: &ViolationSummary) {
    println!("{}: {}", title, summary.count);
    for example in &summary.examples {
        println!("    {}", example);
    }
    if summary.count > summary.examples.len() {
        println!("    ... and {} more", summary.count - summary.examples.len());
    }
}

fn print_report(report: &GraphAuditReport) {
    println!("Outcome graph audit");
    println!("===================");
    print_section(
        "Active assessments with no LO edge (soft)",
        &report.unlinked_assessments,
    );
    print_section(
        "Active learning outcomes with no PO edge (soft)",
        &report.unlinked_learning_outcomes,
    );
    print_section(
        "Cross-course Assessment->LO edges (HARD)",
        &report.cross_course_links,
    );
    print_section(
        "Direct Assessment->PO links (HARD)",
        &report.direct_po_links,
    );
    println!();
    if report.has_hard_violations() {
        println!("FAILED: hard invariant violations present");
    } else if report.is_clean() {
        println!("OK: graph is fully wired, topological order holds");
    } else {
        println!("OK with warnings: staged data is not fully wired yet");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let max_examples = args
        .iter()
        .find_map(|a| a.parse::<usize>().ok())
        .unwrap_or(10);

    let repo = RepositoryFactory::from_env()?;
    let report = repo.audit_graph(max_examples).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.has_hard_violations() {
        std::process::exit(1);
    }
    Ok(())
}
