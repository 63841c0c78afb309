//! Monte-Carlo Shapley Estimation
//!
//! Each contribution event's Shapley value under the coalition value
//! `S(subset) = f(sum of donations in subset)` is approximated by walking
//! `K` random permutations and averaging each event's marginal contribution
//! at the point it joins.
//!
//! The estimate is unbiased with sampling variance at finite `K`. Cost is
//! O(K·n) because the coalition total is carried incrementally.
//!
//! Permutations are drawn from per-sample generators forked off the caller's
//! RNG, so a fixed seed reproduces the estimate exactly (serially) and the
//! `parallel` feature consumes the caller's RNG the same way.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{is_valid_amount, AllocationError};
use crate::core::config::EngineConfig;
use crate::core::rng::DeterministicRng;

/// One unit of allocation input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributionEvent {
    /// Video the engagement was on.
    pub video_id: u64,
    /// Creator of that video.
    pub creator_id: u64,
    /// Donation driving this event's value.
    pub donation_amount: f64,
}

impl ContributionEvent {
    /// Create an event.
    pub fn new(video_id: u64, creator_id: u64, donation_amount: f64) -> Self {
        Self {
            video_id,
            creator_id,
            donation_amount,
        }
    }
}

/// Coalition value as a function of the coalition's donation total.
///
/// Expected to be non-decreasing with `value(0) == 0`. The estimator floors
/// every marginal contribution at zero, so for a function that decreases
/// anywhere the values no longer sum to `value(total)`. All [`ValueCurve`]
/// variants are non-decreasing.
pub trait ValueFunction: Sync {
    /// Value of a coalition whose donations sum to `total`.
    fn value(&self, total: f64) -> f64;
}

/// Built-in value curves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCurve {
    /// `sqrt(total)`: diminishing returns, favors broad participation.
    #[default]
    Sqrt,
    /// `total^exponent`.
    Power {
        /// Curve exponent, finite and positive.
        exponent: f64,
    },
    /// `total`: plain proportional split.
    Linear,
}

impl ValueCurve {
    /// Check curve parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ValueCurve::Power { exponent } if !(exponent.is_finite() && *exponent > 0.0) => {
                Err(format!("exponent {} must be finite and positive", exponent))
            }
            _ => Ok(()),
        }
    }
}

impl ValueFunction for ValueCurve {
    #[inline]
    fn value(&self, total: f64) -> f64 {
        let total = total.max(0.0);
        match self {
            ValueCurve::Sqrt => total.sqrt(),
            ValueCurve::Power { exponent } => total.powf(*exponent),
            ValueCurve::Linear => total,
        }
    }
}

impl<F: Fn(f64) -> f64 + Sync> ValueFunction for F {
    fn value(&self, total: f64) -> f64 {
        self(total)
    }
}

/// Shapley estimates for one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapleyEstimate {
    /// Mean marginal contribution per event (unnormalized).
    pub values: Vec<f64>,
    /// `values` normalized to sum to 1.
    pub weights: Vec<f64>,
    /// True when the total was not positive and weights fell back to `1/n`.
    pub uniform_fallback: bool,
}

/// Permutation-sampling Shapley estimator.
#[derive(Clone, Debug)]
pub struct ShapleyEstimator<V: ValueFunction = ValueCurve> {
    permutations: usize,
    value: V,
}

impl Default for ShapleyEstimator<ValueCurve> {
    fn default() -> Self {
        Self::new(crate::core::config::DEFAULT_PERMUTATIONS)
    }
}

impl ShapleyEstimator<ValueCurve> {
    /// Estimator over the square-root curve.
    pub fn new(permutations: usize) -> Self {
        Self {
            permutations,
            value: ValueCurve::Sqrt,
        }
    }

    /// Estimator using the configured `K` and curve.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            permutations: config.permutations,
            value: config.value_curve,
        }
    }
}

impl<V: ValueFunction> ShapleyEstimator<V> {
    /// Estimator over a custom value function.
    pub fn with_value_function(permutations: usize, value: V) -> Self {
        Self {
            permutations,
            value,
        }
    }

    /// Permutation samples per run.
    pub fn permutations(&self) -> usize {
        self.permutations
    }

    /// Estimate Shapley values and normalized weights.
    ///
    /// An empty event list yields an empty estimate.
    pub fn estimate(
        &self,
        events: &[ContributionEvent],
        rng: &mut DeterministicRng,
    ) -> Result<ShapleyEstimate, AllocationError> {
        if self.permutations == 0 {
            return Err(AllocationError::NoPermutations);
        }
        if let Some((index, event)) = events
            .iter()
            .enumerate()
            .find(|(_, e)| !is_valid_amount(e.donation_amount))
        {
            return Err(AllocationError::InvalidDonation {
                index,
                amount: event.donation_amount,
            });
        }
        let grand_total: f64 = events.iter().map(|e| e.donation_amount).sum();
        if !grand_total.is_finite() {
            return Err(AllocationError::DonationOverflow(grand_total));
        }
        if events.is_empty() {
            return Ok(ShapleyEstimate {
                values: Vec::new(),
                weights: Vec::new(),
                uniform_fallback: false,
            });
        }

        let donations: Vec<f64> = events.iter().map(|e| e.donation_amount).collect();
        let samplers = rng.fork(self.permutations);
        let totals = self.accumulate(&donations, samplers);

        let k = self.permutations as f64;
        let values: Vec<f64> = totals.into_iter().map(|t| t / k).collect();
        let (weights, uniform_fallback) = normalize(&values);

        debug!(
            events = events.len(),
            permutations = self.permutations,
            uniform_fallback,
            "estimated shapley weights"
        );

        Ok(ShapleyEstimate {
            values,
            weights,
            uniform_fallback,
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn accumulate(&self, donations: &[f64], samplers: Vec<DeterministicRng>) -> Vec<f64> {
        let mut totals = vec![0.0; donations.len()];
        let mut order: Vec<usize> = (0..donations.len()).collect();
        for mut sampler in samplers {
            self.sample(donations, &mut sampler, &mut order, &mut totals);
        }
        totals
    }

    #[cfg(feature = "parallel")]
    fn accumulate(&self, donations: &[f64], samplers: Vec<DeterministicRng>) -> Vec<f64> {
        use rayon::prelude::*;

        let n = donations.len();
        // Private accumulators per worker, merged at the end
        samplers
            .into_par_iter()
            .fold(
                || (vec![0.0; n], (0..n).collect::<Vec<usize>>()),
                |(mut totals, mut order), mut sampler| {
                    self.sample(donations, &mut sampler, &mut order, &mut totals);
                    (totals, order)
                },
            )
            .map(|(totals, _)| totals)
            .reduce(
                || vec![0.0; n],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            )
    }

    /// Walk one random permutation, adding each event's marginal.
    ///
    /// Negative marginals from a decreasing value function count as zero.
    fn sample(
        &self,
        donations: &[f64],
        sampler: &mut DeterministicRng,
        order: &mut [usize],
        totals: &mut [f64],
    ) {
        order
            .iter_mut()
            .enumerate()
            .for_each(|(i, slot)| *slot = i);
        sampler.shuffle(order);

        let mut running = 0.0;
        let mut prev = self.value.value(0.0);
        for &idx in order.iter() {
            running += donations[idx];
            let cur = self.value.value(running);
            totals[idx] += (cur - prev).max(0.0);
            prev = cur;
        }
    }
}

/// Normalize to weights; non-positive totals fall back to uniform.
pub fn normalize(values: &[f64]) -> (Vec<f64>, bool) {
    let n = values.len();
    let total: f64 = values.iter().sum();
    if n == 0 {
        return (Vec::new(), false);
    }
    if !(total.is_finite() && total > 0.0) {
        return (vec![1.0 / n as f64; n], true);
    }
    (values.iter().map(|v| v / total).collect(), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn events(donations: &[f64]) -> Vec<ContributionEvent> {
        donations
            .iter()
            .enumerate()
            .map(|(i, d)| ContributionEvent::new(i as u64, 100 + i as u64, *d))
            .collect()
    }

    fn assert_normalized(weights: &[f64]) {
        assert!(weights.iter().all(|w| *w >= 0.0));
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_events() {
        let est = ShapleyEstimator::new(25)
            .estimate(&[], &mut DeterministicRng::new(1))
            .unwrap();
        assert!(est.values.is_empty());
        assert!(est.weights.is_empty());
    }

    #[test]
    fn test_single_event_gets_everything() {
        let est = ShapleyEstimator::new(5)
            .estimate(&events(&[49.0]), &mut DeterministicRng::new(1))
            .unwrap();
        assert_eq!(est.values, vec![7.0]);
        assert_eq!(est.weights, vec![1.0]);
    }

    #[test]
    fn test_donor_beats_non_donor() {
        let est = ShapleyEstimator::new(1)
            .estimate(&events(&[100.0, 0.0]), &mut DeterministicRng::new(3))
            .unwrap();
        assert!(est.values[0] > est.values[1]);
        assert_eq!(est.values, vec![10.0, 0.0]);
        assert_normalized(&est.weights);
        assert!(!est.uniform_fallback);
    }

    #[test]
    fn test_all_zero_donations_uniform() {
        for n in 1..=6 {
            let est = ShapleyEstimator::new(25)
                .estimate(&events(&vec![0.0; n]), &mut DeterministicRng::new(n as u64))
                .unwrap();
            assert!(est.uniform_fallback);
            for w in &est.weights {
                assert!((w - 1.0 / n as f64).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_values_sum_to_grand_coalition() {
        // Efficiency: marginals along any permutation telescope to S(all)
        let donations = [4.0, 9.0, 16.0, 25.0];
        let est = ShapleyEstimator::new(40)
            .estimate(&events(&donations), &mut DeterministicRng::new(77))
            .unwrap();
        let grand = donations.iter().sum::<f64>().sqrt();
        assert!((est.values.iter().sum::<f64>() - grand).abs() < 1e-9);
    }

    #[test]
    fn test_equal_donations_converge() {
        let est = ShapleyEstimator::new(4000)
            .estimate(&events(&[10.0, 10.0, 10.0]), &mut DeterministicRng::new(5))
            .unwrap();
        for w in &est.weights {
            assert!((w - 1.0 / 3.0).abs() < 0.02, "weight {} far from 1/3", w);
        }
    }

    #[test]
    fn test_seeded_runs_reproduce() {
        let input = events(&[3.0, 1.0, 8.0, 0.5, 12.0]);
        let estimator = ShapleyEstimator::new(25);
        let a = estimator.estimate(&input, &mut DeterministicRng::new(2024)).unwrap();
        let b = estimator.estimate(&input, &mut DeterministicRng::new(2024)).unwrap();
        for (x, y) in a.weights.iter().zip(&b.weights) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_linear_curve_is_proportional() {
        let estimator = ShapleyEstimator::with_value_function(3, ValueCurve::Linear);
        let est = estimator
            .estimate(&events(&[1.0, 3.0]), &mut DeterministicRng::new(8))
            .unwrap();
        assert!((est.weights[0] - 0.25).abs() < 1e-12);
        assert!((est.weights[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_custom_value_function() {
        let capped = |total: f64| total.min(10.0);
        let estimator = ShapleyEstimator::with_value_function(10, capped);
        let est = estimator
            .estimate(&events(&[20.0]), &mut DeterministicRng::new(8))
            .unwrap();
        assert_eq!(est.values, vec![10.0]);
    }

    #[test]
    fn test_invalid_input() {
        let estimator = ShapleyEstimator::new(5);
        let mut rng = DeterministicRng::new(1);
        assert_eq!(
            estimator.estimate(&events(&[1.0, -2.0]), &mut rng),
            Err(AllocationError::InvalidDonation { index: 1, amount: -2.0 })
        );
        assert!(matches!(
            estimator.estimate(&events(&[f64::NAN]), &mut rng),
            Err(AllocationError::InvalidDonation { index: 0, .. })
        ));
        assert_eq!(
            ShapleyEstimator::new(0).estimate(&events(&[1.0]), &mut rng),
            Err(AllocationError::NoPermutations)
        );
    }

    #[test]
    fn test_known_seed_values() {
        // K = 4 from seed 2024 walks orders [0,2,1], [0,1,2], [0,2,1], [1,2,0]
        let est = ShapleyEstimator::new(4)
            .estimate(&events(&[3.0, 1.0, 8.0]), &mut DeterministicRng::new(2024))
            .unwrap();
        let expected = [1.4150635094610966, 0.390725710498958, 1.6583123951777];
        for (got, want) in est.values.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_caller_rng_advances_by_k() {
        let mut rng = DeterministicRng::new(2024);
        ShapleyEstimator::new(4)
            .estimate(&events(&[3.0, 1.0, 8.0]), &mut rng)
            .unwrap();
        assert_eq!(rng.state(), [6336040282694782165, 15585466278750287922]);

        let mut reference = DeterministicRng::new(2024);
        reference.fork(4);
        assert_eq!(rng.state(), reference.state());
    }

    #[test]
    fn test_overflowing_total_rejected() {
        let est = ShapleyEstimator::new(5)
            .estimate(&events(&[1e308, 1e308, 1.0]), &mut DeterministicRng::new(1));
        assert_eq!(est, Err(AllocationError::DonationOverflow(f64::INFINITY)));
    }

    #[test]
    fn test_decreasing_value_function_marginals_floored() {
        // Value peaks at 5 then falls; the later joiner's negative marginal is dropped
        let peaked = |total: f64| if total <= 5.0 { total } else { 10.0 - total };
        let est = ShapleyEstimator::with_value_function(20, peaked)
            .estimate(&events(&[5.0, 5.0]), &mut DeterministicRng::new(3))
            .unwrap();
        assert!(est.values.iter().all(|v| *v >= 0.0));
        assert!((est.values.iter().sum::<f64>() - 5.0).abs() < 1e-12);
        assert_normalized(&est.weights);
    }

    #[test]
    fn test_power_curve_validation() {
        assert!(ValueCurve::Power { exponent: 0.5 }.validate().is_ok());
        assert!(ValueCurve::Power { exponent: 0.0 }.validate().is_err());
        assert!(ValueCurve::Power { exponent: f64::NAN }.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_weights_normalized(
            donations in prop::collection::vec(0.0f64..1_000.0, 1..20),
            seed in any::<u64>(),
            k in 1usize..30,
        ) {
            let est = ShapleyEstimator::new(k)
                .estimate(&events(&donations), &mut DeterministicRng::new(seed))
                .unwrap();
            prop_assert_eq!(est.weights.len(), donations.len());
            prop_assert!(est.weights.iter().all(|w| *w >= 0.0 && w.is_finite()));
            prop_assert!((est.weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
