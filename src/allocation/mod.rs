//! Fair Allocation Engine
//!
//! Splits monetary value among contributors from verified engagement:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    FAIR ALLOCATION                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  shapley.rs   - Monte-Carlo permutation Shapley estimator   │
//! │  matching.rs  - Quadratic matching pool distribution        │
//! │  engine.rs    - Budget + match payout per contribution      │
//! │  quality.rs   - Content quality score                       │
//! │  fairsplit.rs - Bounty + paid request splits, ledger rows   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

pub mod engine;
pub mod fairsplit;
pub mod matching;
pub mod quality;
pub mod shapley;

pub use engine::{AllocationComponents, AllocationEngine, AllocationResult};
pub use fairsplit::{
    fund_paid_request, preview, receipt_weight, release_reserve, settle, settle_paid_request,
    Account, CreatorDirectory, CreatorProfile, FairSplitPreview, LedgerPosting,
    PaidRequestSettlement, Payout, PayoutSplit, RefType, RiskTier, Settlement, SettlementError,
    SettlementPolicy,
};
pub use matching::quadratic_match;
pub use quality::quality_score;
pub use shapley::{ContributionEvent, ShapleyEstimate, ShapleyEstimator, ValueCurve, ValueFunction};

/// Invalid allocation input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    /// Donation is negative, NaN or infinite.
    #[error("event {index} has invalid donation amount {amount}")]
    InvalidDonation {
        /// Event position.
        index: usize,
        /// Offending amount.
        amount: f64,
    },

    /// Donations are individually valid but their sum overflows.
    #[error("donation total {0} is not finite")]
    DonationOverflow(f64),

    /// Viewer budget is negative or not finite.
    #[error("invalid viewer budget {0}")]
    InvalidBudget(f64),

    /// Matching pool is negative or not finite.
    #[error("invalid platform match pool {0}")]
    InvalidMatchPool(f64),

    /// Estimator configured with zero permutations.
    #[error("permutation count must be at least 1")]
    NoPermutations,
}

/// Reject negative and non-finite money amounts.
pub(crate) fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}
