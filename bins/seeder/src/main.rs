//! Demo seeder for the bank ledger.
//!
//! Wires the write path from configuration, opens two accounts, runs one
//! transfer that succeeds and one that is rejected, then prints the read
//! model once the events have drained.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use bank_core::events::{ChannelEventPublisher, DeadLetterQueue, EventReader};
use bank_core::ledger::{TimestampAccountNumbers, TransferOrchestrator};
use bank_core::lock::DistributedLockService;
use bank_core::resilience::{CircuitBreaker, RetryPolicy};
use bank_db::{MemoryLedgerStore, ReadModelStore};
use bank_shared::AppConfig;
use rust_decimal_macros::dec;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seeder=debug,bank_core=debug,bank_db=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let store = Arc::new(MemoryLedgerStore::new());
    let read_model = Arc::new(ReadModelStore::new());
    let dead_letters = Arc::new(DeadLetterQueue::new());
    let (publisher, receivers) = ChannelEventPublisher::channel(&config.events);
    let publisher = publisher.with_dead_letters(Arc::clone(&dead_letters));
    let reader = Arc::new(EventReader::new(
        read_model.clone(),
        RetryPolicy::from_config(&config.events),
        Arc::clone(&dead_letters),
    ))
    .spawn(receivers);

    let orchestrator = TransferOrchestrator::new(
        Arc::clone(&store),
        Arc::new(DistributedLockService::from_config(&config.lock)),
        Arc::new(CircuitBreaker::from_config(&config.breaker)),
        Arc::new(publisher),
        Arc::new(TimestampAccountNumbers::new()),
    )
    .with_domain_failures_recorded(config.breaker.record_domain_failures);

    println!("Seeding accounts...");
    let alice = orchestrator.create_account("Alice", dec!(100.00)).await;
    let bob = orchestrator.create_account("Bob", dec!(50.00)).await;
    let (Some(alice), Some(bob)) = (alice.data, bob.data) else {
        anyhow::bail!("Failed to seed demo accounts");
    };
    info!(alice = %alice.account_number, bob = %bob.account_number, "Accounts seeded");

    println!("Transferring 30.00 from Alice to Bob...");
    let response = orchestrator
        .transfer(&alice.account_number, &bob.account_number, dec!(30.00))
        .await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    println!("Transferring 1000.00 from Alice to Bob...");
    let response = orchestrator
        .transfer(&alice.account_number, &bob.account_number, dec!(1000.00))
        .await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    // Closing the publisher lets the reader drain and stop.
    drop(orchestrator);
    reader.join().await.context("Event reader panicked")?;
    if !dead_letters.is_empty() {
        warn!(count = dead_letters.len(), "Events left in the dead letter queue");
    }

    println!("Read model:");
    for account in read_model.accounts() {
        println!("{}", serde_json::to_string_pretty(&account)?);
        for record in read_model.transactions_for(account.account_id) {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    info!(
        ledger_total = %store.total_balance(),
        records = store.transaction_count(),
        "Seeding complete"
    );

    Ok(())
}
