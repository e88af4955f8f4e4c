//! Achievement calculator.
//!
//! Two layers: pure rollup arithmetic over plain input pairs, and the
//! store-driven [`compute_lo`] / [`compute_po`] operations that read a
//! transactional snapshot and write the materialized rows back. The
//! store-driven layer is deterministic, idempotent, and independent of the
//! iteration order of its inputs.

use chrono::Utc;
use log::debug;

use crate::db::repository::{OutcomeStore, RepositoryResult};
use crate::models::{
    LearningOutcomeId, LoAchievement, PoAchievement, ProgramOutcomeId, StudentId,
};

/// One weighted percentage contribution to a rollup.
#[derive(Debug, Clone, Copy)]
pub struct WeightedScore {
    pub percentage: f64,
    pub weight: f64,
}

/// Outcome of a single LO computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoComputeResult {
    /// The row was written (possibly as a zeroed row).
    Upserted,
    /// The student is not actively enrolled; the row is now absent.
    Deleted,
}

/// Normalize a raw score against its maximum, as a percentage.
///
/// A non-positive maximum yields zero rather than a division error.
pub fn score_percentage(score: f64, max_score: f64) -> f64 {
    if max_score > 0.0 {
        (score / max_score) * 100.0
    } else {
        0.0
    }
}

/// Weighted average of percentage contributions.
///
/// Non-positive weights contribute nothing; an empty or zero-weight input
/// yields zero. Commutative and associative over the `(p·w, w)` pairs.
pub fn weighted_average(parts: &[WeightedScore]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for part in parts {
        if part.weight > 0.0 {
            num += part.percentage * part.weight;
            den += part.weight;
        }
    }
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Clamp to [0, 100] and round half-even to two decimals.
pub fn clip_percentage(value: f64) -> f64 {
    let clamped = value.clamp(0.0, 100.0);
    round_half_even_2dp(clamped)
}

fn round_half_even_2dp(value: f64) -> f64 {
    let scaled = value * 100.0;
    let floor = scaled.floor();
    let frac = scaled - floor;
    let rounded = if (frac - 0.5).abs() < 1e-9 {
        // tie: round to the even neighbour
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / 100.0
}

/// Recompute the (student, learning outcome) achievement row.
///
/// Weighted average over the graded subset of active assessments touching
/// the outcome; ungraded assessments raise `total_assessments` only. When
/// the student is not actively enrolled in the outcome's course the row is
/// deleted instead: rows exist only under an active enrollment.
pub fn compute_lo<S: OutcomeStore + ?Sized>(
    store: &mut S,
    student: StudentId,
    lo_id: LearningOutcomeId,
) -> RepositoryResult<LoComputeResult> {
    let lo = store.learning_outcome(lo_id)?;

    if !store.active_enrollment_exists(student, lo.course_id)? {
        store.delete_lo_achievement(student, lo_id)?;
        return Ok(LoComputeResult::Deleted);
    }

    let assessments = store.active_assessments_touching_lo(lo.course_id, lo_id)?;
    let total = assessments.len() as i32;

    let mut parts = Vec::with_capacity(assessments.len());
    for assessment in &assessments {
        let Some(id) = assessment.id else { continue };
        let Some(score) = store.grade_score(student, id)? else {
            continue;
        };
        let weight = store
            .assessment_lo_weight(id, lo_id)?
            .unwrap_or(assessment.weight);
        parts.push(WeightedScore {
            percentage: score_percentage(score, assessment.max_score),
            weight,
        });
    }
    let completed = parts.len() as i32;

    let current_percentage = if total == 0 || completed == 0 {
        0.0
    } else {
        clip_percentage(weighted_average(&parts))
    };

    debug!(
        "compute_lo student={} lo={} pct={:.2} completed={}/{}",
        student, lo_id, current_percentage, completed, total
    );

    store.upsert_lo_achievement(&LoAchievement {
        student_id: student,
        learning_outcome_id: lo_id,
        current_percentage,
        total_assessments: total,
        completed_assessments: completed,
        last_calculated: Utc::now(),
    })?;
    Ok(LoComputeResult::Upserted)
}

/// Recompute the (student, program outcome) achievement row.
///
/// Rollup of the student's LO rows reachable into the outcome, weighted by
/// the LO→PO edges. With no reachable active LO the row is zeroed; the
/// legacy direct Assessment→PO path is intentionally collapsed to zero.
pub fn compute_po<S: OutcomeStore + ?Sized>(
    store: &mut S,
    student: StudentId,
    po_id: ProgramOutcomeId,
) -> RepositoryResult<()> {
    store.program_outcome(po_id)?;

    let reachable = store.los_pointing_to_po_for_student(po_id, student)?;

    let mut parts = Vec::with_capacity(reachable.len());
    let mut total = 0;
    let mut completed = 0;
    for lo in &reachable {
        let Some(lo_id) = lo.id else { continue };
        let Some(row) = store.lo_achievement(student, lo_id)? else {
            continue;
        };
        let weight = store.lopo_weight(lo_id, po_id)?.unwrap_or(0.0);
        if weight <= 0.0 {
            continue;
        }
        total += row.total_assessments;
        completed += row.completed_assessments;
        parts.push(WeightedScore {
            percentage: row.current_percentage,
            weight,
        });
    }

    let current_percentage = if parts.is_empty() {
        0.0
    } else {
        clip_percentage(weighted_average(&parts))
    };

    debug!(
        "compute_po student={} po={} pct={:.2} over {} outcomes",
        student,
        po_id,
        current_percentage,
        parts.len()
    );

    store.upsert_po_achievement(&PoAchievement {
        student_id: student,
        program_outcome_id: po_id,
        current_percentage,
        total_assessments: total,
        completed_assessments: completed,
        last_calculated: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_percentage_handles_degenerate_max() {
        assert_eq!(score_percentage(80.0, 100.0), 80.0);
        assert_eq!(score_percentage(5.0, 0.0), 0.0);
        assert_eq!(score_percentage(5.0, -1.0), 0.0);
    }

    #[test]
    fn weighted_average_matches_hand_computation() {
        // 100 with weight 1 plus 50 with weight 4
        let parts = [
            WeightedScore { percentage: 100.0, weight: 1.0 },
            WeightedScore { percentage: 50.0, weight: 4.0 },
        ];
        assert_eq!(weighted_average(&parts), 60.0);
    }

    #[test]
    fn weighted_average_ignores_nonpositive_weights() {
        let parts = [
            WeightedScore { percentage: 90.0, weight: 3.0 },
            WeightedScore { percentage: 40.0, weight: 2.0 },
            WeightedScore { percentage: 10.0, weight: 0.0 },
        ];
        assert_eq!(weighted_average(&parts), 70.0);
    }

    #[test]
    fn weighted_average_of_nothing_is_zero() {
        assert_eq!(weighted_average(&[]), 0.0);
        let only_zero = [WeightedScore { percentage: 80.0, weight: 0.0 }];
        assert_eq!(weighted_average(&only_zero), 0.0);
    }

    #[test]
    fn clip_clamps_out_of_range_values() {
        assert_eq!(clip_percentage(-3.5), 0.0);
        assert_eq!(clip_percentage(104.2), 100.0);
    }

    #[test]
    fn clip_rounds_half_even() {
        // 0.125 and 0.375 scale to exact binary ties 12.5 and 37.5
        assert_eq!(clip_percentage(0.125), 0.12);
        assert_eq!(clip_percentage(0.375), 0.38);
        assert_eq!(clip_percentage(66.666_666_7), 66.67);
    }
}
