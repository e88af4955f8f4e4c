//! Property tests for the pure calculator layer.
//!
//! Exercises the quantified invariants over randomly generated grade and
//! weight configurations: bounds, idempotence, monotonicity, and order
//! independence of the weighted rollups.

use proptest::prelude::*;

use oae_rust::services::calculator::{
    clip_percentage, score_percentage, weighted_average, WeightedScore,
};

/// (score fraction of max, max_score, weight) triples for one outcome.
fn assessment_inputs() -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec(
        (0.0f64..=1.0, 0.1f64..1000.0, 0.001f64..50.0),
        1..12,
    )
}

fn to_parts(inputs: &[(f64, f64, f64)]) -> Vec<WeightedScore> {
    inputs
        .iter()
        .map(|(fraction, max_score, weight)| WeightedScore {
            percentage: score_percentage(fraction * max_score, *max_score),
            weight: *weight,
        })
        .collect()
}

proptest! {
    /// Achievement percentages always land in [0, 100].
    #[test]
    fn percentage_always_bounded(inputs in assessment_inputs()) {
        let pct = clip_percentage(weighted_average(&to_parts(&inputs)));
        prop_assert!((0.0..=100.0).contains(&pct));
    }

    /// Averages of bounded percentages stay bounded.
    #[test]
    fn rollup_of_bounded_percentages_is_bounded(
        lo_pcts in prop::collection::vec((0.0f64..=100.0, 0.001f64..50.0), 1..10)
    ) {
        let parts: Vec<WeightedScore> = lo_pcts
            .iter()
            .map(|(percentage, weight)| WeightedScore { percentage: *percentage, weight: *weight })
            .collect();
        let pct = clip_percentage(weighted_average(&parts));
        prop_assert!((0.0..=100.0).contains(&pct));
    }

    /// The computation is a pure function of its inputs.
    #[test]
    fn recompute_is_deterministic(inputs in assessment_inputs()) {
        let first = clip_percentage(weighted_average(&to_parts(&inputs)));
        let second = clip_percentage(weighted_average(&to_parts(&inputs)));
        prop_assert_eq!(first, second);
    }

    /// Clipping is idempotent: a stored percentage re-clips to itself.
    #[test]
    fn clipping_is_idempotent(value in -50.0f64..150.0) {
        let once = clip_percentage(value);
        prop_assert_eq!(clip_percentage(once), once);
    }

    /// Raising one score never lowers the weighted average.
    #[test]
    fn raising_a_score_never_lowers_the_average(
        inputs in assessment_inputs(),
        index in any::<prop::sample::Index>(),
        bump in 0.0f64..=1.0,
    ) {
        let parts = to_parts(&inputs);
        let before = weighted_average(&parts);

        let i = index.index(inputs.len());
        let mut raised = inputs.clone();
        // move the chosen score toward its maximum
        raised[i].0 = (raised[i].0 + bump * (1.0 - raised[i].0)).min(1.0);
        let after = weighted_average(&to_parts(&raised));

        prop_assert!(after >= before - 1e-9);
    }

    /// The rollup is commutative over its input pairs.
    #[test]
    fn rollup_is_order_independent(inputs in assessment_inputs()) {
        let parts = to_parts(&inputs);
        let mut reversed = parts.clone();
        reversed.reverse();

        let forward = weighted_average(&parts);
        let backward = weighted_average(&reversed);
        prop_assert!((forward - backward).abs() < 1e-6);
    }

    /// Zero-weight contributions are exactly absent.
    #[test]
    fn zero_weights_contribute_nothing(inputs in assessment_inputs()) {
        let parts = to_parts(&inputs);
        let mut padded = parts.clone();
        padded.push(WeightedScore { percentage: 55.0, weight: 0.0 });

        prop_assert_eq!(weighted_average(&parts), weighted_average(&padded));
    }
}
