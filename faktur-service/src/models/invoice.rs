//! Invoice model for faktur-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::ItemInput;

/// Invoice status.
///
/// `Overdue` is a read-time projection over `Sent` plus a date comparison;
/// it is never written to storage (see [`crate::domain::status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Draft,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discount configuration applied to the invoice subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    None,
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::None => "none",
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "percentage" => DiscountType::Percentage,
            "fixed" => DiscountType::Fixed,
            _ => DiscountType::None,
        }
    }
}

/// Invoice record.
///
/// `subtotal`, `discount_amount`, `tax_amount` and `total` are a persisted
/// cache of the pure computation in [`crate::domain::totals`]; every mutation
/// to items, tax, or discount overwrites them, and read paths that matter
/// (document assembly) recompute rather than trust them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub account_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub tax_rate: Decimal,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub sent_utc: Option<DateTime<Utc>>,
    pub paid_utc: Option<DateTime<Utc>>,
    pub cancelled_utc: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }

    pub fn discount_type(&self) -> DiscountType {
        DiscountType::from_string(&self.discount_type)
    }

    /// Status as seen by readers on `today`: `Sent` past its due date
    /// projects to `Overdue`, everything else is the stored value.
    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        crate::domain::status::effective_status(self.status(), self.due_date, today)
    }
}

/// Input for creating a draft invoice together with its line items.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub account_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub tax_rate: Decimal,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub items: Vec<ItemInput>,
}

/// Input for updating a draft invoice. Scalar fields left `None` are kept;
/// `items` always replaces the full item list, matching the edit form which
/// submits every row.
#[derive(Debug, Clone)]
pub struct UpdateInvoice {
    pub client_id: Option<Uuid>,
    pub invoice_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub items: Vec<ItemInput>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
