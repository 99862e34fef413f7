//! faktur-service: invoice ledger engine for the Faktur invoicing application.
//!
//! The crate is split the same way the data flows: pure domain logic in
//! [`domain`] (monetary computation, status lifecycle), record shapes in
//! [`models`], and the Postgres-backed store in [`services`]. Presentation
//! layers (forms, charts, the PDF renderer) call into this crate and never
//! compute totals themselves.
pub mod config;
pub mod domain;
pub mod models;
pub mod services;
pub mod startup;
