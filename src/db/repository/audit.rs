//! Repository trait for the read-only graph audit.

use async_trait::async_trait;

use crate::services::audit::GraphAuditReport;

use super::error::RepositoryResult;

/// Repository trait for the operational invariant scan.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Scan the graph and report invariant violations, with up to
    /// `max_examples` offending identifiers per category.
    async fn audit_graph(&self, max_examples: usize) -> RepositoryResult<GraphAuditReport>;
}
