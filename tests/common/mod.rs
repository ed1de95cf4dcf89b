#![allow(dead_code)]

use mktledger::application::engine::MarketplaceEngine;
use mktledger::config::EngineConfig;
use mktledger::domain::earning::SellerShare;
use mktledger::domain::ids::{AccountId, OrderId};
use mktledger::infrastructure::in_memory::InMemoryLedgerStore;
use rust_decimal::Decimal;
use std::io::{Error, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const HEADER: &str = "op, account, order, item, amount, rate, reference, remarks";

pub fn engine() -> MarketplaceEngine {
    MarketplaceEngine::new(
        Arc::new(InMemoryLedgerStore::new()),
        EngineConfig::default(),
    )
}

/// Records one single-item order paying `net` to `account` with no commission.
pub async fn earn(engine: &MarketplaceEngine, order: &str, account: &str, net: Decimal) {
    engine
        .record_order_earnings(
            &OrderId::new(order),
            &[SellerShare::new(account, format!("{order}-1"), net, Decimal::ZERO)],
        )
        .await
        .unwrap();
}

/// Earns, aggregates and settles `net` so it becomes spendable.
pub async fn fund(engine: &MarketplaceEngine, order: &str, account: &str, net: Decimal) {
    earn(engine, order, account, net).await;
    let payout = engine.create_payout(&AccountId::new(account)).await.unwrap();
    engine.mark_payout_paid(payout.id).await.unwrap();
}

/// Writes a command file with the standard header followed by `rows`.
pub fn commands_file(rows: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{HEADER}")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    Ok(file)
}

/// One order per seller row, then a payout and settlement for every seller.
pub fn generate_csv(path: &Path, sellers: usize, orders_per_seller: usize) -> Result<(), Error> {
    let file = std::fs::File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record([
        "op", "account", "order", "item", "amount", "rate", "reference", "remarks",
    ])?;

    for seller in 1..=sellers {
        let account = format!("s{seller}");
        for order in 1..=orders_per_seller {
            let order_id = format!("o{seller}-{order}");
            wtr.write_record(["earning", &account, &order_id, "", "10.00", "0", "", ""])?;
        }
        wtr.write_record(["payout", &account, "", "", "", "", "", ""])?;
        wtr.write_record(["settle", &account, "", "", "", "", "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
