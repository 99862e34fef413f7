//! Common test utilities for faktur-service integration tests.
//!
//! The suites exercise a real Postgres instance. They look for
//! `TEST_DATABASE_URL` and skip quietly when it is not set, so plain
//! `cargo test` still passes on machines without a database.

#![allow(dead_code)]

use chrono::NaiveDate;
use faktur_service::models::{CreateClient, CreateInvoice, DiscountType, ItemInput};
use faktur_service::services::Database;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,faktur_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Connect to the test database, or `None` to skip when no database is
/// configured. Each test isolates itself with a fresh account id, so suites
/// can share one database without cleanup.
pub async fn test_db() -> Option<Database> {
    init_tracing();

    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return None;
        }
    };

    let db = Database::new(&url, 4, 1)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations()
        .await
        .expect("Failed to run test migrations");

    Some(db)
}

pub fn test_account() -> Uuid {
    Uuid::new_v4()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn client_input(account_id: Uuid, name: &str, email: &str) -> CreateClient {
    CreateClient {
        account_id,
        name: name.to_string(),
        email: email.to_string(),
        phone: Some("555-0100".to_string()),
        company: Some("Test Co".to_string()),
        address_line1: Some("1 Test Street".to_string()),
        address_line2: None,
        city: Some("Testville".to_string()),
        state: Some("TS".to_string()),
        postal_code: Some("12345".to_string()),
        country: Some("US".to_string()),
        tax_id: None,
        notes: None,
    }
}

pub fn item(description: &str, quantity: &str, rate: &str) -> ItemInput {
    ItemInput {
        description: description.to_string(),
        quantity: dec(quantity),
        rate: dec(rate),
    }
}

/// A draft invoice input with no discount and no tax, issued 2026-01-15 and
/// due a month later.
pub fn invoice_input(
    account_id: Uuid,
    client_id: Uuid,
    number: &str,
    items: Vec<ItemInput>,
) -> CreateInvoice {
    CreateInvoice {
        account_id,
        client_id,
        invoice_number: number.to_string(),
        issue_date: date(2026, 1, 15),
        due_date: date(2026, 2, 14),
        currency: "USD".to_string(),
        tax_rate: Decimal::ZERO,
        discount_type: DiscountType::None,
        discount_value: Decimal::ZERO,
        notes: None,
        terms: Some("Net 30".to_string()),
        items,
    }
}
