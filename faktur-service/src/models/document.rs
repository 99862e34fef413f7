//! Invoice document assembly model for faktur-service.

use serde::Serialize;

use crate::domain::totals::InvoiceTotals;
use crate::models::{BusinessProfile, Client, Invoice, InvoiceItem};

/// Everything an external renderer needs to lay out one invoice document.
///
/// `totals` is recomputed from the items at assembly time rather than read
/// from the invoice row, so a renderer can never show figures that disagree
/// with the line items.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDocument {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub client: Client,
    pub business_profile: Option<BusinessProfile>,
    pub totals: InvoiceTotals,
}
