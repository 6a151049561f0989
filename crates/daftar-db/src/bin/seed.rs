//! # Seed Data Generator
//!
//! Populates a ledger database with demo customers, sales and collections
//! for development.
//!
//! ## Usage
//! ```bash
//! # 8 customers, 6 invoices each (default)
//! cargo run -p daftar-db --bin seed
//!
//! # Custom amount
//! cargo run -p daftar-db --bin seed -- --invoices 20
//!
//! # Specify database path (defaults to the ledger config / DAFTAR_DB_PATH)
//! cargo run -p daftar-db --bin seed -- --db ./data/daftar.db
//! ```
//!
//! ## Generated Data
//! - Customers from a fixed list of names
//! - Credit sales of print jobs, some with an upfront deposit
//! - Walk-in cash and wallet sales
//! - One collection per customer, allocated oldest-first

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use daftar_core::{
    Dimensions, LineItem, Money, PaymentMethod, PricingMethod, Product, SelectedService,
    SettlementMethod,
};
use daftar_db::{Database, DbConfig, SqliteLedgerStore};
use daftar_ledger::{DebtLedger, LedgerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CUSTOMERS: &[(&str, &str)] = &[
    ("Ahmed Hassan", "0100 123 4567"),
    ("Mona Adel", "0111 222 3333"),
    ("Karim Saleh", "0122 444 5555"),
    ("Nour El-Din", "0155 666 7777"),
    ("Salma Fathy", "0106 888 9999"),
    ("Youssef Ali", "0114 321 0000"),
    ("Hana Mostafa", "0127 654 1111"),
    ("Omar Farouk", "0150 987 2222"),
];

/// (name, price in cents, pricing method)
const CATALOG: &[(&str, i64, PricingMethod)] = &[
    ("Business cards (100)", 15_000, PricingMethod::Fixed),
    ("Flyers A5 (500)", 45_000, PricingMethod::Fixed),
    ("Vinyl banner", 12_000, PricingMethod::Area),
    ("Roll-up stand", 95_000, PricingMethod::Fixed),
    ("Sticker sheet", 2_500, PricingMethod::Area),
    ("Letterheads (250)", 30_000, PricingMethod::Fixed),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,daftar=debug,sqlx=warn")),
        )
        .init();

    let config = LedgerConfig::load_or_default(None);

    let args: Vec<String> = env::args().collect();
    let mut invoices: usize = 6;
    let mut db_path: PathBuf = config.store.database_path.clone();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--invoices" | "-n" => {
                if i + 1 < args.len() {
                    invoices = args[i + 1].parse().unwrap_or(6);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Daftar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --invoices <N>  Credit invoices per customer (default: 6)");
                println!("  -d, --db <PATH>     Database file path");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(path = %db_path.display(), invoices, "Seeding ledger");

    let db_config = DbConfig::from_settings(&config.store);
    let db = Database::new(DbConfig {
        database_path: db_path,
        ..db_config
    })
    .await?;

    let existing = db.transactions().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has transactions, skipping seed");
        return Ok(());
    }

    let store = Arc::new(SqliteLedgerStore::new(db.clone()));
    let ledger = DebtLedger::new(Arc::clone(&store)).with_settings(config.ledger.clone());
    let start = std::time::Instant::now();

    // Customers and their credit invoices
    let mut customers = Vec::with_capacity(CUSTOMERS.len());
    for (name, phone) in CUSTOMERS {
        customers.push(db.customers().create(name, phone, None).await?);
    }

    let mut issued = 0usize;
    for (c_idx, customer) in customers.iter().enumerate() {
        for n in 0..invoices {
            let seed = c_idx * 31 + n * 7;
            let cart = demo_cart(seed);
            let upfront = (seed % 4 == 0).then(|| Money::from_major(50));

            ledger
                .create_sale_transaction(&cart, PaymentMethod::Credit, Some(customer), upfront)
                .await?;
            issued += 1;
        }
    }

    // Walk-in sales
    for seed in 0..invoices * 2 {
        let method = if seed % 3 == 0 {
            PaymentMethod::MobileWallet
        } else {
            PaymentMethod::Cash
        };
        ledger
            .create_sale_transaction(&demo_cart(seed), method, None, None)
            .await?;
        issued += 1;
    }

    // One collection per customer
    for (c_idx, customer) in customers.iter().enumerate() {
        let amount = Money::from_major(200 + (c_idx as i64 * 150));
        let method = if c_idx % 2 == 0 {
            SettlementMethod::Cash
        } else {
            SettlementMethod::MobileWallet
        };
        match ledger.collect_from_customer(&customer.id, amount, method).await {
            Ok(receipt) => info!(
                customer = %customer.name,
                applied = %receipt.applied,
                invoices = receipt.allocations.len(),
                "Collected"
            ),
            Err(e) => warn!(customer = %customer.name, error = %e, "Collection skipped"),
        }
    }

    info!(issued, elapsed = ?start.elapsed(), "Seed complete");

    let summary = ledger.ledger_summary().await?;
    println!();
    println!("Sales:        {}", summary.total_sales);
    println!("Collected:    {}", summary.total_collected);
    println!("Outstanding:  {}", summary.total_outstanding);
    println!("Open invoices {}", summary.open_invoices);
    println!();
    println!("Top debtors:");
    for debtor in ledger.debtors_list(&customers).await?.iter().take(5) {
        println!(
            "  {:<16} {:>12}  ({} invoices)",
            debtor.name, debtor.total_debt, debtor.invoice_count
        );
    }

    db.close().await;
    Ok(())
}

/// Builds a one- or two-line print job cart.
fn demo_cart(seed: usize) -> Vec<LineItem> {
    let (name, cents, pricing_method) = CATALOG[seed % CATALOG.len()];
    let product = Product {
        id: format!("demo-{}", seed % CATALOG.len()),
        name: name.to_string(),
        price: Money::from_cents(cents),
        pricing_method,
    };

    let dimensions = match pricing_method {
        PricingMethod::Area => Some(Dimensions::new(1.0 + (seed % 3) as f64, 0.5 + (seed % 2) as f64)),
        PricingMethod::Fixed => None,
    };
    let services = if seed % 5 == 0 {
        vec![SelectedService {
            name: "Lamination".to_string(),
            unit_price: Money::from_cents(1_000),
        }]
    } else {
        vec![]
    };

    let mut cart = vec![LineItem::from_product(
        &product,
        1 + (seed % 3) as i64,
        dimensions,
        services,
    )];
    if seed % 2 == 1 {
        let (name, cents, _) = CATALOG[0];
        let cards = Product {
            id: "demo-0".to_string(),
            name: name.to_string(),
            price: Money::from_cents(cents),
            pricing_method: PricingMethod::Fixed,
        };
        cart.push(LineItem::from_product(&cards, 1, None, vec![]));
    }
    cart
}
