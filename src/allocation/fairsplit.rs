//! FairSplit Bounty Settlement
//!
//! Splits a bounty pool across the videos of a published window by receipt
//! engagement, pays the top N, and derives the fee/reserve/net breakdown as
//! double-entry ledger postings. Paid requests (a viewer funding one creator
//! directly) go through the same fee/reserve/net split. Posting the rows is
//! the host's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::core::config::EngineConfig;
use crate::proof::commitment::ReceiptMeta;

/// Seconds of watch time credited per receipt at most.
pub const RECEIPT_WATCH_CAP: u64 = 60;

/// Interactions credited per receipt at most.
pub const RECEIPT_INTERACTION_CAP: u64 = 10;

/// Weight of one interaction relative to one second watched.
pub const INTERACTION_WEIGHT: f64 = 2.0;

/// Settlement errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettlementError {
    /// Fee rate outside `[0, 1]`.
    #[error("fee rate {0} is not within [0, 1]")]
    InvalidFeeRate(f64),

    /// Reserve percentage outside `[0, 1]`.
    #[error("reserve percentage {0} is not within [0, 1]")]
    InvalidReserve(f64),

    /// Negative or non-finite amount.
    #[error("invalid amount {0}")]
    InvalidAmount(f64),
}

/// Engagement weight of one receipt.
pub fn receipt_weight(meta: &ReceiptMeta) -> f64 {
    meta.seconds_watched.min(RECEIPT_WATCH_CAP) as f64
        + INTERACTION_WEIGHT * meta.interactions.min(RECEIPT_INTERACTION_CAP) as f64
}

/// Round to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Proposed split of a bounty pool over a window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FairSplitPreview {
    /// Window label.
    pub window: String,
    /// Published root the split is anchored to.
    pub root: String,
    /// Bounty pool.
    pub pool: f64,
    /// Summed receipt weight per video.
    pub weights: BTreeMap<u64, f64>,
    /// Cent-rounded share of the pool per video.
    pub alloc: BTreeMap<u64, f64>,
}

/// Reject negative and non-finite money amounts.
fn check_amount(amount: f64) -> Result<f64, SettlementError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(SettlementError::InvalidAmount(amount))
    }
}

/// Split `pool` across videos by summed receipt weight.
pub fn preview(
    window: &str,
    root: &str,
    receipts: &[ReceiptMeta],
    pool: f64,
) -> Result<FairSplitPreview, SettlementError> {
    check_amount(pool)?;

    let mut weights: BTreeMap<u64, f64> = BTreeMap::new();
    for meta in receipts {
        *weights.entry(meta.video_id).or_insert(0.0) += receipt_weight(meta);
    }

    let total: f64 = weights.values().sum();
    let total = if total > 0.0 { total } else { 1.0 };
    let alloc = weights
        .iter()
        .map(|(video, w)| (*video, round_cents(pool * (w / total))))
        .collect();

    Ok(FairSplitPreview {
        window: window.to_string(),
        root: root.to_string(),
        pool,
        weights,
        alloc,
    })
}

/// Creator risk tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Low risk.
    Low,
    /// Normal risk.
    #[default]
    Normal,
    /// High risk: reserve is floored.
    High,
}

/// What settlement needs to know about a video's creator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatorProfile {
    /// Creator account.
    pub creator_id: u64,
    /// Explicit reserve fraction, if any.
    pub reserve_pct: Option<f64>,
    /// Risk tier.
    pub risk_tier: RiskTier,
}

/// Host lookup from video to creator.
pub trait CreatorDirectory {
    /// Creator of `video_id`, if known.
    fn creator_of(&self, video_id: u64) -> Option<CreatorProfile>;
}

impl CreatorDirectory for BTreeMap<u64, CreatorProfile> {
    fn creator_of(&self, video_id: u64) -> Option<CreatorProfile> {
        self.get(&video_id).cloned()
    }
}

/// Fee and reserve rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementPolicy {
    /// Platform fee fraction.
    pub fee_rate: f64,
    /// Reserve fraction when the creator has none.
    pub default_reserve_pct: f64,
    /// Reserve floor for high-risk creators.
    pub high_risk_floor: f64,
    /// Videos paid per settlement.
    pub top_n: usize,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SettlementPolicy {
    /// Policy from engine config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            fee_rate: config.platform_fee_rate,
            default_reserve_pct: config.default_reserve_pct,
            high_risk_floor: config.high_risk_reserve_floor,
            top_n: config.settle_top_n,
        }
    }

    /// Check rates are fractions.
    pub fn validate(&self) -> Result<(), SettlementError> {
        if !(0.0..=1.0).contains(&self.fee_rate) {
            return Err(SettlementError::InvalidFeeRate(self.fee_rate));
        }
        for pct in [self.default_reserve_pct, self.high_risk_floor] {
            if !(0.0..=1.0).contains(&pct) {
                return Err(SettlementError::InvalidReserve(pct));
            }
        }
        Ok(())
    }

    /// Reserve fraction held back for `creator`.
    ///
    /// A creator fraction of zero falls back to the policy default; one
    /// outside `[0, 1]` is rejected.
    pub fn reserve_pct(&self, creator: &CreatorProfile) -> Result<f64, SettlementError> {
        if let Some(pct) = creator.reserve_pct {
            if !(0.0..=1.0).contains(&pct) {
                return Err(SettlementError::InvalidReserve(pct));
            }
        }
        let base = creator
            .reserve_pct
            .filter(|pct| *pct > 0.0)
            .unwrap_or(self.default_reserve_pct);
        Ok(match creator.risk_tier {
            RiskTier::High => base.max(self.high_risk_floor),
            _ => base,
        })
    }

    /// Split `gross` for `creator` under this policy.
    pub fn split(
        &self,
        gross: f64,
        creator: &CreatorProfile,
    ) -> Result<PayoutSplit, SettlementError> {
        check_amount(gross)?;
        Ok(PayoutSplit::compute(gross, self.fee_rate, self.reserve_pct(creator)?))
    }
}

/// Ledger account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Account {
    /// Bounty escrow.
    Escrow,
    /// Platform fee income.
    PlatformPool,
    /// Held creator reserves.
    EscrowReserve,
    /// Amount owed to creators.
    CreatorPayable,
}

/// Why a posting was made.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    /// Platform fee on a payout.
    FairsplitFee,
    /// Reserve held from a payout.
    FairsplitReserve,
    /// Net payout to the creator.
    FairsplitPayout,
    /// Reserve released to a creator.
    ReserveRelease,
    /// Viewer funds moved into escrow for a paid request.
    PaidRequest,
    /// Platform fee on an approved paid request.
    PaidRequestFee,
    /// Reserve held from an approved paid request.
    PaidRequestReserve,
    /// Net paid request amount owed to the creator.
    PaidRequestPayout,
}

/// One ledger row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerPosting {
    /// Account touched.
    pub account: Account,
    /// Debit amount.
    pub debit: f64,
    /// Credit amount.
    pub credit: f64,
    /// Posting reason.
    pub ref_type: RefType,
    /// Video or creator the posting refers to.
    pub ref_id: u64,
}

impl LedgerPosting {
    fn debit(account: Account, amount: f64, ref_type: RefType, ref_id: u64) -> Self {
        Self {
            account,
            debit: amount,
            credit: 0.0,
            ref_type,
            ref_id,
        }
    }

    fn credit(account: Account, amount: f64, ref_type: RefType, ref_id: u64) -> Self {
        Self {
            account,
            debit: 0.0,
            credit: amount,
            ref_type,
            ref_id,
        }
    }

    fn pair(from: Account, to: Account, amount: f64, ref_type: RefType, ref_id: u64) -> [Self; 2] {
        [
            Self::credit(from, amount, ref_type, ref_id),
            Self::debit(to, amount, ref_type, ref_id),
        ]
    }
}

/// Fee, reserve and net carved out of one gross amount.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayoutSplit {
    /// Amount being paid out.
    pub gross: f64,
    /// Platform fee: `fee_rate * gross`.
    pub fee: f64,
    /// Reserve: `reserve_pct * (gross - fee)`.
    pub reserve: f64,
    /// What is left for the creator.
    pub net: f64,
}

impl PayoutSplit {
    /// Cent-rounded split of `gross`. Rates must already be in `[0, 1]`.
    pub fn compute(gross: f64, fee_rate: f64, reserve_pct: f64) -> Self {
        let gross = round_cents(gross);
        let fee = round_cents(fee_rate * gross);
        let reserve = round_cents(reserve_pct * (gross - fee));
        let net = round_cents(gross - fee - reserve);
        Self {
            gross,
            fee,
            reserve,
            net,
        }
    }

    /// Escrow postings for this split; the reserve pair is omitted when zero.
    fn postings(&self, refs: [RefType; 3], ref_id: u64) -> Vec<LedgerPosting> {
        let [fee_ref, reserve_ref, payout_ref] = refs;
        let mut rows = Vec::with_capacity(6);
        rows.extend(LedgerPosting::pair(
            Account::Escrow,
            Account::PlatformPool,
            self.fee,
            fee_ref,
            ref_id,
        ));
        if self.reserve > 0.0 {
            rows.extend(LedgerPosting::pair(
                Account::Escrow,
                Account::EscrowReserve,
                self.reserve,
                reserve_ref,
                ref_id,
            ));
        }
        rows.extend(LedgerPosting::pair(
            Account::Escrow,
            Account::CreatorPayable,
            self.net,
            payout_ref,
            ref_id,
        ));
        rows
    }
}

const BOUNTY_REFS: [RefType; 3] = [
    RefType::FairsplitFee,
    RefType::FairsplitReserve,
    RefType::FairsplitPayout,
];

const PAID_REQUEST_REFS: [RefType; 3] = [
    RefType::PaidRequestFee,
    RefType::PaidRequestReserve,
    RefType::PaidRequestPayout,
];

/// Payout to one video's creator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    /// Video paid.
    pub video_id: u64,
    /// Creator paid.
    pub creator_id: u64,
    /// Gross share of the pool.
    pub gross: f64,
    /// Platform fee.
    pub fee: f64,
    /// Reserve held back.
    pub reserve: f64,
    /// Net amount payable.
    pub net_to_creator: f64,
}

/// Settlement result for one bounty over one window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    /// Window label.
    pub window: String,
    /// Root the settlement is anchored to.
    pub root: String,
    /// Payouts in descending order.
    pub payouts: Vec<Payout>,
    /// Ledger rows to post.
    pub postings: Vec<LedgerPosting>,
}

/// Pay the top-N videos of a preview.
///
/// Videos with no known creator are skipped. A negative or non-finite pool
/// or allocation is rejected.
pub fn settle<D: CreatorDirectory + ?Sized>(
    preview: &FairSplitPreview,
    policy: &SettlementPolicy,
    directory: &D,
) -> Result<Settlement, SettlementError> {
    policy.validate()?;
    check_amount(preview.pool)?;

    let mut ranked = preview
        .alloc
        .iter()
        .map(|(video, share)| Ok((*video, check_amount(*share)?)))
        .collect::<Result<Vec<(u64, f64)>, SettlementError>>()?;
    // Stable: ties keep ascending video order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(policy.top_n);

    let denom: f64 = ranked.iter().map(|(_, a)| a).sum();
    let denom = if denom > 0.0 { denom } else { 1.0 };

    let mut payouts = Vec::with_capacity(ranked.len());
    let mut postings = Vec::new();

    for (video_id, share) in ranked {
        let Some(creator) = directory.creator_of(video_id) else {
            warn!(video_id, "no creator for video, skipping payout");
            continue;
        };

        let split = policy.split(preview.pool * (share / denom), &creator)?;
        postings.extend(split.postings(BOUNTY_REFS, video_id));

        payouts.push(Payout {
            video_id,
            creator_id: creator.creator_id,
            gross: split.gross,
            fee: split.fee,
            reserve: split.reserve,
            net_to_creator: split.net,
        });
    }

    info!(
        window = %preview.window,
        payouts = payouts.len(),
        pool = preview.pool,
        "settled bounty"
    );

    Ok(Settlement {
        window: preview.window.clone(),
        root: preview.root.clone(),
        payouts,
        postings,
    })
}

/// Postings that release held reserve to a creator.
pub fn release_reserve(
    creator_id: u64,
    amount: f64,
) -> Result<Vec<LedgerPosting>, SettlementError> {
    let amount = round_cents(check_amount(amount)?);
    Ok(LedgerPosting::pair(
        Account::EscrowReserve,
        Account::CreatorPayable,
        amount,
        RefType::ReserveRelease,
        creator_id,
    )
    .to_vec())
}

/// Escrow row for a newly created paid request.
///
/// The viewer-side leg belongs to the host's payment flow.
pub fn fund_paid_request(
    request_id: u64,
    amount: f64,
) -> Result<Vec<LedgerPosting>, SettlementError> {
    let amount = round_cents(check_amount(amount)?);
    Ok(vec![LedgerPosting::debit(
        Account::Escrow,
        amount,
        RefType::PaidRequest,
        request_id,
    )])
}

/// Outcome of approving a delivered paid request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaidRequestSettlement {
    /// Request being paid.
    pub request_id: u64,
    /// Creator paid.
    pub creator_id: u64,
    /// Fee/reserve/net breakdown.
    pub split: PayoutSplit,
    /// Ledger rows to post.
    pub postings: Vec<LedgerPosting>,
}

/// Pay out an approved paid request to `creator`.
pub fn settle_paid_request(
    request_id: u64,
    creator: &CreatorProfile,
    amount: f64,
    policy: &SettlementPolicy,
) -> Result<PaidRequestSettlement, SettlementError> {
    policy.validate()?;
    let split = policy.split(amount, creator)?;

    info!(
        request_id,
        creator_id = creator.creator_id,
        gross = split.gross,
        net = split.net,
        "settled paid request"
    );

    Ok(PaidRequestSettlement {
        request_id,
        creator_id: creator.creator_id,
        split,
        postings: split.postings(PAID_REQUEST_REFS, request_id),
    })
}
