//! Weighted edges of the outcome graph.
//!
//! Only two edge tables exist and their direction is fixed by column role,
//! which is what makes Assessment → LO → PO a DAG by construction. There is
//! deliberately no direct Assessment → PO edge type.

use serde::{Deserialize, Serialize};

use super::ids::{AssessmentId, LearningOutcomeId, ProgramOutcomeId};

/// Assessment → LearningOutcome edge. Unique per pair, same course on both
/// ends, strictly positive weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentLoLink {
    pub assessment_id: AssessmentId,
    pub learning_outcome_id: LearningOutcomeId,
    pub weight: f64,
}

/// LearningOutcome → ProgramOutcome edge. Unique per pair, may cross
/// departments, strictly positive weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoPoLink {
    pub learning_outcome_id: LearningOutcomeId,
    pub program_outcome_id: ProgramOutcomeId,
    pub weight: f64,
}

/// Shared weight rule for both edge tables.
pub fn validate_edge_weight(weight: f64) -> Result<(), String> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(format!("edge weight {} must be a positive finite number", weight));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_weight_must_be_positive() {
        assert!(validate_edge_weight(1.0).is_ok());
        assert!(validate_edge_weight(0.25).is_ok());
        assert!(validate_edge_weight(0.0).is_err());
        assert!(validate_edge_weight(-3.0).is_err());
        assert!(validate_edge_weight(f64::NAN).is_err());
    }
}
