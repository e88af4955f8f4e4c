//! Read-only graph audit.
//!
//! Operational scan over the outcome graph: reports staged-data gaps and
//! structural corruption, with counts and a capped list of offending
//! identifiers per category. The scan never mutates; fixing is left to
//! operators and importers.

use log::warn;
use serde::Serialize;

use crate::db::repository::{OutcomeStore, RepositoryResult};

/// One violation category: how many, and up to N example identifiers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViolationSummary {
    pub count: usize,
    pub examples: Vec<String>,
}

impl ViolationSummary {
    fn from_ids<T: std::fmt::Display>(ids: Vec<T>, max_examples: usize) -> Self {
        Self {
            count: ids.len(),
            examples: ids.iter().take(max_examples).map(|id| id.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Result of a full graph audit.
#[derive(Debug, Clone, Serialize)]
pub struct GraphAuditReport {
    /// Active assessments with no Assessment→LO edge (soft).
    pub unlinked_assessments: ViolationSummary,
    /// Active learning outcomes with no LO→PO edge (soft).
    pub unlinked_learning_outcomes: ViolationSummary,
    /// Assessment→LO edges crossing course boundaries (hard).
    pub cross_course_links: ViolationSummary,
    /// Residual direct Assessment→PO links (hard).
    pub direct_po_links: ViolationSummary,
    pub max_examples: usize,
}

impl GraphAuditReport {
    /// Whether a hard structural invariant is broken. The audit binary exits
    /// non-zero on this.
    pub fn has_hard_violations(&self) -> bool {
        !self.cross_course_links.is_empty() || !self.direct_po_links.is_empty()
    }

    /// Whether the graph is fully wired: no violations of any kind. With
    /// both edge tables typed by column role, this is also the
    /// topological-order check: every edge goes Assessment→LO or LO→PO.
    pub fn is_clean(&self) -> bool {
        self.unlinked_assessments.is_empty()
            && self.unlinked_learning_outcomes.is_empty()
            && !self.has_hard_violations()
    }
}

/// Scan the store and build the audit report.
pub fn audit<S: OutcomeStore + ?Sized>(
    store: &S,
    max_examples: usize,
) -> RepositoryResult<GraphAuditReport> {
    let unlinked_assessments =
        ViolationSummary::from_ids(store.active_assessments_without_lo_links()?, max_examples);
    let unlinked_learning_outcomes =
        ViolationSummary::from_ids(store.active_los_without_po_links()?, max_examples);

    let cross_course: Vec<String> = store
        .cross_course_assessment_lo_links()?
        .into_iter()
        .map(|(a, l)| format!("assessment {} -> lo {}", a, l))
        .collect();
    let direct: Vec<String> = store
        .legacy_direct_po_links()?
        .into_iter()
        .map(|(a, p)| format!("assessment {} -> po {}", a, p))
        .collect();

    let report = GraphAuditReport {
        unlinked_assessments,
        unlinked_learning_outcomes,
        cross_course_links: ViolationSummary::from_ids(cross_course, max_examples),
        direct_po_links: ViolationSummary::from_ids(direct, max_examples),
        max_examples,
    };

    if report.has_hard_violations() {
        warn!(
            "graph audit found hard violations: {} cross-course links, {} direct PO links",
            report.cross_course_links.count, report.direct_po_links.count
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_caps_examples_but_counts_everything() {
        let summary = ViolationSummary::from_ids(vec![1, 2, 3, 4, 5], 3);
        assert_eq!(summary.count, 5);
        assert_eq!(summary.examples, vec!["1", "2", "3"]);
    }

    #[test]
    fn hard_violations_drive_the_verdict() {
        let clean = GraphAuditReport {
            unlinked_assessments: ViolationSummary::default(),
            unlinked_learning_outcomes: ViolationSummary::default(),
            cross_course_links: ViolationSummary::default(),
            direct_po_links: ViolationSummary::default(),
            max_examples: 10,
        };
        assert!(clean.is_clean());
        assert!(!clean.has_hard_violations());

        let staged = GraphAuditReport {
            unlinked_assessments: ViolationSummary { count: 2, examples: vec![] },
            ..clean.clone()
        };
        assert!(!staged.is_clean());
        assert!(!staged.has_hard_violations());

        let corrupt = GraphAuditReport {
            direct_po_links: ViolationSummary { count: 1, examples: vec![] },
            ..clean
        };
        assert!(corrupt.has_hard_violations());
    }
}
