//! Allocation Engine
//!
//! Runs the Shapley estimator and quadratic matching together and prices
//! each contribution event: `amount = viewer_budget * weight + match`.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::matching::quadratic_match;
use super::shapley::{ContributionEvent, ShapleyEstimator, ValueCurve, ValueFunction};
use super::{is_valid_amount, AllocationError};
use crate::core::config::EngineConfig;
use crate::core::rng::DeterministicRng;

/// Raw inputs that drove an allocation, for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationComponents {
    /// Donation amount as supplied.
    pub donation: f64,
}

/// Payout for one contribution event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Video the event belongs to.
    pub video_id: u64,
    /// Creator receiving the payout.
    pub creator_id: u64,
    /// Normalized Shapley weight in `[0, 1]`.
    pub weight: f64,
    /// Budget share plus quadratic match.
    pub amount: f64,
    /// Explanatory inputs.
    pub components: AllocationComponents,
}

/// Shapley weights plus quadratic matching.
#[derive(Clone, Debug)]
pub struct AllocationEngine<V: ValueFunction = ValueCurve> {
    estimator: ShapleyEstimator<V>,
}

impl Default for AllocationEngine<ValueCurve> {
    fn default() -> Self {
        Self::new(ShapleyEstimator::default())
    }
}

impl AllocationEngine<ValueCurve> {
    /// Engine using the configured estimator.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(ShapleyEstimator::from_config(config))
    }
}

impl<V: ValueFunction> AllocationEngine<V> {
    /// Engine over a given estimator.
    pub fn new(estimator: ShapleyEstimator<V>) -> Self {
        Self { estimator }
    }

    /// The underlying estimator.
    pub fn estimator(&self) -> &ShapleyEstimator<V> {
        &self.estimator
    }

    /// Allocate `viewer_budget` plus `platform_match_pool` across `events`.
    ///
    /// Results are in event order. An empty event list returns an empty result.
    pub fn allocate(
        &self,
        events: &[ContributionEvent],
        viewer_budget: f64,
        platform_match_pool: f64,
        rng: &mut DeterministicRng,
    ) -> Result<Vec<AllocationResult>, AllocationError> {
        if !is_valid_amount(viewer_budget) {
            return Err(AllocationError::InvalidBudget(viewer_budget));
        }
        if !is_valid_amount(platform_match_pool) {
            return Err(AllocationError::InvalidMatchPool(platform_match_pool));
        }
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let estimate = self.estimator.estimate(events, rng)?;
        if estimate.uniform_fallback {
            warn!(events = events.len(), "no positive shapley total, using uniform weights");
        }
        let matched = quadratic_match(&estimate.weights, platform_match_pool)?;

        let results: Vec<AllocationResult> = events
            .iter()
            .zip(estimate.weights.iter().zip(matched))
            .map(|(event, (&weight, match_amount))| AllocationResult {
                video_id: event.video_id,
                creator_id: event.creator_id,
                weight,
                amount: viewer_budget * weight + match_amount,
                components: AllocationComponents {
                    donation: event.donation_amount,
                },
            })
            .collect();

        info!(
            events = results.len(),
            permutations = self.estimator.permutations(),
            viewer_budget,
            platform_match_pool,
            "allocation complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(donations: &[f64]) -> Vec<ContributionEvent> {
        donations
            .iter()
            .enumerate()
            .map(|(i, d)| ContributionEvent::new(10 + i as u64, 20 + i as u64, *d))
            .collect()
    }

    #[test]
    fn test_empty_events() {
        let engine = AllocationEngine::default();
        let out = engine
            .allocate(&[], 100.0, 50.0, &mut DeterministicRng::new(1))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_amounts_sum_to_budget_plus_pool() {
        let engine = AllocationEngine::default();
        let out = engine
            .allocate(&events(&[5.0, 20.0, 1.0, 0.0]), 100.0, 40.0, &mut DeterministicRng::new(9))
            .unwrap();

        let total: f64 = out.iter().map(|r| r.amount).sum();
        assert!((total - 140.0).abs() < 1e-9);
        let weights: f64 = out.iter().map(|r| r.weight).sum();
        assert!((weights - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_components_report_raw_donation() {
        let engine = AllocationEngine::default();
        let out = engine
            .allocate(&events(&[7.25, 0.0]), 10.0, 0.0, &mut DeterministicRng::new(4))
            .unwrap();
        assert_eq!(out[0].components.donation, 7.25);
        assert_eq!(out[1].components.donation, 0.0);
        assert_eq!(out[0].video_id, 10);
        assert_eq!(out[1].creator_id, 21);
    }

    #[test]
    fn test_no_match_pool_is_pure_budget_split() {
        let engine = AllocationEngine::default();
        let out = engine
            .allocate(&events(&[100.0, 0.0]), 50.0, 0.0, &mut DeterministicRng::new(2))
            .unwrap();
        assert_eq!(out[0].amount, 50.0);
        assert_eq!(out[1].amount, 0.0);
    }

    #[test]
    fn test_all_zero_donations() {
        let engine = AllocationEngine::default();
        let out = engine
            .allocate(&events(&[0.0, 0.0, 0.0, 0.0]), 80.0, 20.0, &mut DeterministicRng::new(6))
            .unwrap();
        for r in &out {
            assert!((r.weight - 0.25).abs() < 1e-12);
            assert!((r.amount - 25.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_budget_and_pool() {
        let engine = AllocationEngine::default();
        let mut rng = DeterministicRng::new(1);
        assert_eq!(
            engine.allocate(&events(&[1.0]), -1.0, 0.0, &mut rng),
            Err(AllocationError::InvalidBudget(-1.0))
        );
        assert_eq!(
            engine.allocate(&events(&[1.0]), 1.0, -5.0, &mut rng),
            Err(AllocationError::InvalidMatchPool(-5.0))
        );
    }

    #[test]
    fn test_from_config() {
        let config = EngineConfig {
            permutations: 7,
            ..EngineConfig::default()
        };
        assert_eq!(AllocationEngine::from_config(&config).estimator().permutations(), 7);
    }
}
