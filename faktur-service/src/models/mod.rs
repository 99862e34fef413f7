//! Domain models for faktur-service.

mod business_profile;
mod client;
mod dashboard;
mod document;
mod invoice;
mod item;

pub use business_profile::{BusinessProfile, UpsertBusinessProfile};
pub use client::{Client, CreateClient, ListClientsFilter, UpdateClient};
pub use dashboard::{DashboardSummary, MonthlyRevenue, StatusSlice};
pub use document::InvoiceDocument;
pub use invoice::{
    CreateInvoice, DiscountType, Invoice, InvoiceStatus, ListInvoicesFilter, UpdateInvoice,
};
pub use item::{InvoiceItem, ItemInput};
