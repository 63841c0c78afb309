//! Quadratic Matching
//!
//! Spreads a platform matching pool in proportion to `sqrt(weight)`, which
//! lifts many small contributions relative to one large one.

use super::{is_valid_amount, AllocationError};

/// Match amount per weight, summing to `pool`.
///
/// A zero pool yields all zeros without touching the weights.
pub fn quadratic_match(weights: &[f64], pool: f64) -> Result<Vec<f64>, AllocationError> {
    if !is_valid_amount(pool) {
        return Err(AllocationError::InvalidMatchPool(pool));
    }
    if pool == 0.0 {
        return Ok(vec![0.0; weights.len()]);
    }

    let roots: Vec<f64> = weights.iter().map(|w| w.max(0.0).sqrt()).collect();
    let denom: f64 = roots.iter().sum();
    if denom <= 0.0 {
        return Ok(vec![0.0; weights.len()]);
    }

    Ok(roots.into_iter().map(|r| pool * (r / denom)).collect())
}
