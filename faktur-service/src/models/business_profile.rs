//! Business profile model for faktur-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// The account's own business identity, one row per account. Read-only
/// input to document assembly; the ledger engine never derives anything
/// from it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessProfile {
    pub account_id: Uuid,
    pub company_name: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
    pub logo_url: Option<String>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating or replacing the account's business profile.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertBusinessProfile {
    pub account_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub company_name: String,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
    #[validate(length(max = 500))]
    pub logo_url: Option<String>,
}
