//! FairSplit Audit Tool
//!
//! Commits a batch of sample receipts into the current hourly window,
//! publishes the window root, replays every inclusion proof and then runs
//! allocation, bounty settlement and a paid request payout seeded from that root.
//!
//! Usage: `fairsplit-audit [config.json]`. Without a config file the
//! `FAIRSPLIT_*` environment variables are read.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fairsplit::{
    allocation::{
        fairsplit::{
            fund_paid_request, settle, settle_paid_request, CreatorProfile, RiskTier,
            SettlementPolicy,
        },
        quality_score,
    },
    core::hash::parse_digest,
    proof::{CommitStatus, ReceiptBuilder, WindowLabel},
    AllocationEngine, ContributionEvent, DeterministicRng, EngineConfig, MemoryWindowStore,
    ReceiptMeta, WindowAccumulator, VERSION,
};

/// Bounty pool paid out by the demo settlement.
const DEMO_BOUNTY_POOL: f64 = 100.0;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("FairSplit audit v{}", VERSION);

    let config = load_config()?;
    info!(
        permutations = config.permutations,
        fee_rate = config.platform_fee_rate,
        top_n = config.settle_top_n,
        "engine configured"
    );

    run_audit(&config)
}

fn load_config() -> Result<EngineConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path))?;
            EngineConfig::from_json(&text).with_context(|| format!("loading config {}", path))
        }
        None => {
            let config = EngineConfig::from_env();
            config.validate().context("invalid FAIRSPLIT_* environment")?;
            Ok(config)
        }
    }
}

fn sample_receipts() -> Result<Vec<ReceiptMeta>> {
    let rows: [(u64, u64, u64, u64, &str, Option<&str>); 5] = [
        (1, 501, 45, 3, "n-7f1c", Some("dev-a1")),
        (2, 501, 120, 6, "n-09be", None),
        (3, 502, 30, 0, "n-55d2", Some("dev-b7")),
        (4, 503, 75, 12, "n-c3a0", Some("dev-a1")),
        (5, 502, 60, 2, "n-e814", None),
    ];

    rows.iter()
        .map(|&(session, video, seconds, interactions, nonce, device)| {
            let builder = ReceiptBuilder::new()
                .session_id(session)
                .video_id(video)
                .seconds_watched(seconds)
                .interactions(interactions)
                .nonce(nonce);
            let builder = match device {
                Some(hash) => builder.device_hash(hash),
                None => builder,
            };
            builder.build().context("building sample receipt")
        })
        .collect()
}

fn run_audit(config: &EngineConfig) -> Result<()> {
    info!("=== Committing Receipts ===");

    let window = WindowLabel::hourly(Utc::now());
    let mut accumulator = WindowAccumulator::new(MemoryWindowStore::new());

    let receipts = sample_receipts()?;
    // Replay the first receipt to exercise duplicate handling
    let replay = receipts.first().cloned();
    for meta in receipts.iter().cloned().chain(replay) {
        let session = meta.session_id;
        let outcome = accumulator.commit_receipt(window.as_str(), meta)?;
        match outcome.status {
            CommitStatus::Recorded => {
                info!(session, commitment = %outcome.commitment, "recorded")
            }
            CommitStatus::DuplicateIgnored => {
                warn!(session, commitment = %outcome.commitment, "duplicate ignored")
            }
        }
    }

    info!("=== Publishing Root ===");

    let published = accumulator.publish_root(window.as_str())?;
    info!("Window: {}", published.window);
    info!("Root: {}", published.root);
    info!("Leaves: {}", published.leaf_count);

    info!("=== Verifying Proofs ===");

    let bundle = accumulator.proof_bundle(window.as_str())?;
    if !bundle.is_current() {
        bail!("published root does not cover the window snapshot");
    }
    for entry in &bundle.entries {
        let wire: Vec<(String, &str)> = entry.proof.iter().map(|step| step.to_wire()).collect();
        let ok = fairsplit::verify_hex(&entry.commitment.to_hex(), &wire, &bundle.root)?;
        info!(
            session = entry.meta.session_id,
            steps = wire.len(),
            ok,
            "proof replayed"
        );
        if !ok {
            bail!("proof for session {} failed", entry.meta.session_id);
        }
    }
    if !bundle.verify_all() {
        bail!("bundle verification failed");
    }
    let encoded = bundle.to_bytes().context("encoding proof bundle")?;
    info!(bytes = encoded.len(), "proof bundle encoded");

    info!("=== Allocating ===");

    let root = parse_digest(&published.root).context("parsing published root")?;
    let mut rng = DeterministicRng::for_settlement(window.as_str(), &root, "demo-allocation");
    let events = vec![
        ContributionEvent::new(501, 9001, 40.0),
        ContributionEvent::new(502, 9002, 10.0),
        ContributionEvent::new(503, 9003, 25.0),
        ContributionEvent::new(501, 9001, 5.0),
    ];
    let engine = AllocationEngine::from_config(config);
    let results = engine.allocate(&events, 50.0, 20.0, &mut rng)?;
    for result in &results {
        info!(
            "  video {} creator {}: weight {:.4}, amount {:.2}",
            result.video_id, result.creator_id, result.weight, result.amount
        );
    }

    for entry in &bundle.entries {
        let score = quality_score(entry.meta.seconds_watched, entry.meta.interactions, true);
        info!(session = entry.meta.session_id, score, "quality");
    }

    info!("=== Settling Bounty ===");

    let preview = accumulator.fairsplit_preview(window.as_str(), DEMO_BOUNTY_POOL)?;
    let directory: BTreeMap<u64, CreatorProfile> = [
        (501, 9001, None, RiskTier::Normal),
        (502, 9002, Some(0.05), RiskTier::Low),
        (503, 9003, None, RiskTier::High),
    ]
    .into_iter()
    .map(|(video, creator_id, reserve_pct, risk_tier)| {
        (
            video,
            CreatorProfile {
                creator_id,
                reserve_pct,
                risk_tier,
            },
        )
    })
    .collect();

    let policy = SettlementPolicy::from_config(config);
    let settlement = settle(&preview, &policy, &directory)?;
    for payout in &settlement.payouts {
        info!(
            "  video {} -> creator {}: gross {:.2}, fee {:.2}, reserve {:.2}, net {:.2}",
            payout.video_id,
            payout.creator_id,
            payout.gross,
            payout.fee,
            payout.reserve,
            payout.net_to_creator
        );
    }
    info!(postings = settlement.postings.len(), "ledger rows ready");

    println!("{}", serde_json::to_string_pretty(&settlement)?);

    info!("=== Paid Request ===");

    let request_id = 1;
    let funded = fund_paid_request(request_id, 25.0)?;
    let creator = directory
        .get(&502)
        .context("sample directory has no creator for video 502")?;
    let paid = settle_paid_request(request_id, creator, 25.0, &policy)?;
    info!(
        "  request {} -> creator {}: gross {:.2}, fee {:.2}, reserve {:.2}, net {:.2}",
        paid.request_id,
        paid.creator_id,
        paid.split.gross,
        paid.split.fee,
        paid.split.reserve,
        paid.split.net
    );
    info!(
        postings = funded.len() + paid.postings.len(),
        "paid request rows ready"
    );

    info!("=== Audit Complete ===");
    Ok(())
}
