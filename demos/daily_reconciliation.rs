//! Daily reconciliation walkthrough
//!
//! Seeds an in-memory store with one day of MPR, internal and bank records, runs the
//! engine for that day and prints the outcome rows and a summary.
//!
//! Run with `RUST_LOG=debug cargo run --example daily_reconciliation [YYYY-MM-DD]`.

use bigdecimal::BigDecimal;
use recon_core::{
    utils::{parse_date_filter, MemoryStorage},
    BankTransaction, InternalTransaction, MprTransaction, ReconConfig, ReconResult,
    ReconciliationEngine, TransactionSource, Upload,
};
use std::str::FromStr;

fn amount(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap_or_default()
}

fn seed(storage: &MemoryStorage, day: &str) {
    storage.add_upload(Upload::completed(1, TransactionSource::Mpr));
    storage.add_upload(Upload::completed(2, TransactionSource::Internal));
    storage.add_upload(Upload::completed(3, TransactionSource::Bank));
    storage.add_upload(Upload::new(4, TransactionSource::Mpr));

    let at = |time: &str| format!("{}T{}", day, time);

    // Settlement report from the channel
    storage.add_mpr_transaction(
        MprTransaction::new(1, 1, amount("1500.00"))
            .with_transaction_id("ORD-1001")
            .with_time(at("09:15:00Z"))
            .with_utr("UTR5550001"),
    );
    storage.add_mpr_transaction(
        MprTransaction::new(2, 1, amount("249.99"))
            .with_transaction_id("ORD-1002")
            .with_time(at("11:40:00Z")),
    );
    storage.add_mpr_transaction(
        MprTransaction::new(3, 1, amount("80.00"))
            .with_transaction_id("ORD-1003")
            .with_time(at("14:05:00Z")),
    );
    // Still being processed, so ignored
    storage.add_mpr_transaction(
        MprTransaction::new(4, 4, amount("10.00")).with_time(at("15:00:00Z")),
    );

    // Internal order log
    storage.add_internal_transaction(
        InternalTransaction::new(1, 2, amount("1500.00"))
            .with_transaction_id("ORD-1001")
            .with_time(at("09:14:58")),
    );
    storage.add_internal_transaction(
        InternalTransaction::new(2, 2, amount("250.00"))
            .with_transaction_id("ORD-1002-R")
            .with_time(at("11:41:10")),
    );
    storage.add_internal_transaction(
        InternalTransaction::new(3, 2, amount("42.00"))
            .with_transaction_id("ORD-0999")
            .with_time(at("16:20:00")),
    );

    // Bank statement credits and a debit
    storage.add_bank_transaction(
        BankTransaction::new(1, 3, amount("1500.00"))
            .with_utr("UTR5550001")
            .with_date(day)
            .with_description("NEFT CR SETTLEMENT"),
    );
    storage.add_bank_transaction(
        BankTransaction::new(2, 3, amount("-1500.00"))
            .with_date(day)
            .with_description("SWEEP OUT"),
    );
}

#[tokio::main]
async fn main() -> ReconResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let day = std::env::args()
        .nth(1)
        .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());
    let date = parse_date_filter(&day)?;

    let storage = MemoryStorage::new();
    seed(&storage, &day);

    let config = ReconConfig::load("recon.toml")?;
    println!(
        "Reconciling {} with tolerance {} and a {}-day window\n",
        date, config.match_tolerance, config.date_tolerance_days
    );

    let mut engine = ReconciliationEngine::new(storage, config);
    let run = engine.run(Some(date)).await?;

    for outcome in &run.outcomes {
        println!(
            "{:<9} mpr={:<6} internal={:<6} bank={:<6} {}",
            outcome.status.as_str(),
            outcome.mpr_transaction_id.map(|id| id.to_string()).unwrap_or_default(),
            outcome.internal_transaction_id.map(|id| id.to_string()).unwrap_or_default(),
            outcome.bank_transaction_id.map(|id| id.to_string()).unwrap_or_default(),
            outcome.description.as_deref().unwrap_or("")
        );
    }

    let summary = run.summary();
    println!("\n=== Summary ({} results processed) ===", run.processed());
    println!("Matched:   {}", summary.total_matched);
    println!("Pending:   {}", summary.total_pending);
    println!("Anomalies: {}", summary.total_anomalies);
    for (anomaly_type, count) in &summary.anomaly_breakdown {
        println!("  {:<17} {}", anomaly_type.as_str(), count);
    }

    Ok(())
}
