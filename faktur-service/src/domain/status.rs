//! Invoice status lifecycle.
//!
//! Stored states are `draft`, `sent`, `paid`, and `cancelled`. `overdue` is
//! never stored: it is a projection computed on read from `sent` plus a date
//! comparison, so there is exactly one source of truth for whether an
//! invoice is late, and paying a late invoice needs no special casing.

use anyhow::anyhow;
use chrono::NaiveDate;

use faktur_core::error::AppError;

use crate::models::InvoiceStatus;

/// Validate a user/state-machine transition from `current` to `target`.
///
/// Allowed: `draft -> sent`, `sent -> paid`, and `draft|sent -> cancelled`.
/// `paid` and `cancelled` are terminal. `overdue` is not a storable target.
/// Everything else fails with [`AppError::InvalidTransition`] naming both
/// states.
pub fn transition(current: InvoiceStatus, target: InvoiceStatus) -> Result<(), AppError> {
    use InvoiceStatus::*;

    let allowed = matches!(
        (current, target),
        (Draft, Sent) | (Sent, Paid) | (Draft, Cancelled) | (Sent, Cancelled)
    );

    if allowed {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            from: current.as_str().to_string(),
            to: target.as_str().to_string(),
        })
    }
}

/// The status a reader should see on `today`.
///
/// A `sent` invoice past its due date projects to `overdue`; every other
/// stored status passes through unchanged. In particular a late invoice that
/// is then paid shows `paid`, not `overdue`.
pub fn effective_status(
    stored: InvoiceStatus,
    due_date: NaiveDate,
    today: NaiveDate,
) -> InvoiceStatus {
    if stored == InvoiceStatus::Sent && today > due_date {
        InvoiceStatus::Overdue
    } else {
        stored
    }
}

/// Items, tax, and discount may only change while the invoice is a draft.
pub fn can_edit(status: InvoiceStatus) -> bool {
    status == InvoiceStatus::Draft
}

/// Guard an edit attempt, failing with a validation error that names the
/// offending status. Once a number has been communicated to a client it
/// must not silently change.
pub fn ensure_editable(status: InvoiceStatus) -> Result<(), AppError> {
    if can_edit(status) {
        Ok(())
    } else {
        Err(AppError::Validation(anyhow!(
            "only draft invoices can be edited, invoice is {}",
            status
        )))
    }
}
