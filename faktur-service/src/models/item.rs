//! Invoice line item model for faktur-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A line on an invoice. `amount` is always `round2(quantity * rate)`;
/// `position` preserves the order the items were entered in, which is the
/// order forms and the PDF show them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub account_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
    pub position: i32,
    pub created_utc: DateTime<Utc>,
}

/// One item row as submitted by the invoice form.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
}
