//! Dashboard aggregation models for faktur-service.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Invoice count and total amount for one effective status.
///
/// The status here is the read-time projection: `sent` invoices past their
/// due date are reported under `overdue`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusSlice {
    pub status: String,
    pub count: i64,
    pub amount: Decimal,
}

/// Revenue recognized from paid invoices in one calendar month.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyRevenue {
    pub month: NaiveDate,
    pub revenue: Decimal,
}

/// Everything the dashboard page needs, computed in one call.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub status_breakdown: Vec<StatusSlice>,
    /// Sum of totals for invoices that have been communicated (sent or paid).
    pub total_billed: Decimal,
    /// Sum of totals for paid invoices.
    pub total_collected: Decimal,
    /// Sum of totals still awaiting payment (sent, including overdue).
    pub outstanding: Decimal,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}
