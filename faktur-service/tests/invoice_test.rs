//! Invoice CRUD and totals-persistence integration tests for faktur-service.

mod common;

use common::{client_input, date, dec, invoice_input, item, test_account, test_db};
use faktur_core::error::AppError;
use faktur_service::domain::totals::compute_invoice_totals;
use faktur_service::models::{
    DiscountType, InvoiceStatus, ItemInput, UpdateInvoice, UpsertBusinessProfile,
};
use rust_decimal::Decimal;
use uuid::Uuid;

fn percentage_invoice(
    account: Uuid,
    client_id: Uuid,
    number: &str,
) -> faktur_service::models::CreateInvoice {
    let mut input = invoice_input(
        account,
        client_id,
        number,
        vec![item("Consulting", "2", "50.00"), item("Hosting", "1", "25.005")],
    );
    input.tax_rate = dec("8");
    input.discount_type = DiscountType::Percentage;
    input.discount_value = dec("10");
    input
}

#[tokio::test]
async fn create_invoice_stores_computed_totals() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Totals Client", "totals@example.com"))
        .await
        .unwrap();

    let invoice = db
        .create_invoice(&percentage_invoice(account, client.client_id, "INV-3001"))
        .await
        .unwrap();

    assert_eq!(invoice.status(), InvoiceStatus::Draft);
    assert_eq!(invoice.subtotal, dec("125.01"));
    assert_eq!(invoice.discount_amount, dec("12.50"));
    assert_eq!(invoice.tax_amount, dec("9.00"));
    assert_eq!(invoice.total, dec("121.51"));

    let items = db
        .get_invoice_items(account, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].description, "Consulting");
    assert_eq!(items[0].amount, dec("100.00"));
    assert_eq!(items[1].description, "Hosting");
    assert_eq!(items[1].amount, dec("25.01"));
}

#[tokio::test]
async fn stored_totals_always_match_a_recomputation() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Recompute", "recompute@example.com"))
        .await
        .unwrap();
    let invoice = db
        .create_invoice(&percentage_invoice(account, client.client_id, "INV-3002"))
        .await
        .unwrap();

    let items = db
        .get_invoice_items(account, invoice.invoice_id)
        .await
        .unwrap();
    let inputs: Vec<ItemInput> = items
        .iter()
        .map(|i| ItemInput {
            description: i.description.clone(),
            quantity: i.quantity,
            rate: i.rate,
        })
        .collect();

    let recomputed = compute_invoice_totals(
        &inputs,
        invoice.tax_rate,
        invoice.discount_type(),
        invoice.discount_value,
    )
    .unwrap();

    assert_eq!(invoice.subtotal, recomputed.subtotal);
    assert_eq!(invoice.discount_amount, recomputed.discount_amount);
    assert_eq!(invoice.tax_amount, recomputed.tax_amount);
    assert_eq!(invoice.total, recomputed.total);
}

#[tokio::test]
async fn items_keep_their_entry_order() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Ordered", "ordered@example.com"))
        .await
        .unwrap();

    let descriptions = ["Zeta", "Alpha", "Mu", "Beta"];
    let items = descriptions
        .iter()
        .map(|d| item(d, "1", "10.00"))
        .collect();
    let invoice = db
        .create_invoice(&invoice_input(account, client.client_id, "INV-3003", items))
        .await
        .unwrap();

    let stored = db
        .get_invoice_items(account, invoice.invoice_id)
        .await
        .unwrap();
    let stored_descriptions: Vec<&str> =
        stored.iter().map(|i| i.description.as_str()).collect();
    assert_eq!(stored_descriptions, descriptions);
}

#[tokio::test]
async fn create_invoice_requires_existing_client() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let err = db
        .create_invoice(&invoice_input(
            account,
            Uuid::new_v4(),
            "INV-3004",
            vec![item("Ghost work", "1", "10.00")],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn create_invoice_rejects_due_date_before_issue_date() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Dates", "dates@example.com"))
        .await
        .unwrap();

    let mut input = invoice_input(
        account,
        client.client_id,
        "INV-3005",
        vec![item("Work", "1", "10.00")],
    );
    input.due_date = date(2026, 1, 1);

    let err = db.create_invoice(&input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn update_draft_replaces_items_and_recomputes_totals() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Editable", "edit@example.com"))
        .await
        .unwrap();
    let invoice = db
        .create_invoice(&percentage_invoice(account, client.client_id, "INV-3006"))
        .await
        .unwrap();

    let update = UpdateInvoice {
        client_id: None,
        invoice_number: None,
        issue_date: None,
        due_date: None,
        currency: None,
        tax_rate: Some(Decimal::ZERO),
        discount_type: Some(DiscountType::None),
        discount_value: Some(Decimal::ZERO),
        notes: Some("Revised".to_string()),
        terms: None,
        items: vec![item("Flat fee", "1", "500.00")],
    };

    let updated = db
        .update_invoice(account, invoice.invoice_id, &update)
        .await
        .unwrap()
        .expect("Invoice missing");

    assert_eq!(updated.subtotal, dec("500.00"));
    assert_eq!(updated.discount_amount, Decimal::ZERO);
    assert_eq!(updated.tax_amount, Decimal::ZERO);
    assert_eq!(updated.total, dec("500.00"));
    assert_eq!(updated.notes.as_deref(), Some("Revised"));
    // Kept from the original input.
    assert_eq!(updated.terms.as_deref(), Some("Net 30"));

    let items = db
        .get_invoice_items(account, invoice.invoice_id)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].description, "Flat fee");
}

#[tokio::test]
async fn sent_invoice_cannot_be_edited() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Locked", "locked@example.com"))
        .await
        .unwrap();
    let invoice = db
        .create_invoice(&percentage_invoice(account, client.client_id, "INV-3007"))
        .await
        .unwrap();
    db.transition_invoice_status(
        account,
        invoice.invoice_id,
        InvoiceStatus::Sent,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let update = UpdateInvoice {
        client_id: None,
        invoice_number: None,
        issue_date: None,
        due_date: None,
        currency: None,
        tax_rate: None,
        discount_type: None,
        discount_value: None,
        notes: None,
        terms: None,
        items: vec![item("Sneaky change", "1", "1.00")],
    };
    let err = db
        .update_invoice(account, invoice.invoice_id, &update)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn only_draft_invoices_can_be_deleted() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Deletable", "del@example.com"))
        .await
        .unwrap();
    let draft = db
        .create_invoice(&percentage_invoice(account, client.client_id, "INV-3008"))
        .await
        .unwrap();
    assert!(db.delete_invoice(account, draft.invoice_id).await.unwrap());
    assert!(db
        .get_invoice_items(account, draft.invoice_id)
        .await
        .unwrap()
        .is_empty());

    let sent = db
        .create_invoice(&percentage_invoice(account, client.client_id, "INV-3009"))
        .await
        .unwrap();
    db.transition_invoice_status(
        account,
        sent.invoice_id,
        InvoiceStatus::Sent,
        chrono::Utc::now(),
    )
    .await
    .unwrap();

    let err = db.delete_invoice(account, sent.invoice_id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn invoice_document_bundles_profile_client_and_recomputed_totals() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    db.upsert_business_profile(&UpsertBusinessProfile {
        account_id: account,
        company_name: "Faktur GmbH".to_string(),
        contact_email: Some("billing@faktur.example".to_string()),
        phone: None,
        address_line1: Some("Rechnungsweg 1".to_string()),
        address_line2: None,
        city: Some("Berlin".to_string()),
        state: None,
        postal_code: Some("10115".to_string()),
        country: Some("DE".to_string()),
        tax_id: Some("DE123456789".to_string()),
        logo_url: None,
    })
    .await
    .unwrap();

    let client = db
        .create_client(&client_input(account, "Doc Client", "doc@example.com"))
        .await
        .unwrap();
    let invoice = db
        .create_invoice(&percentage_invoice(account, client.client_id, "INV-3010"))
        .await
        .unwrap();

    let document = db
        .get_invoice_document(account, invoice.invoice_id)
        .await
        .unwrap();

    assert_eq!(document.client.client_id, client.client_id);
    assert_eq!(
        document
            .business_profile
            .as_ref()
            .map(|p| p.company_name.as_str()),
        Some("Faktur GmbH")
    );
    assert_eq!(document.items.len(), 2);
    assert_eq!(document.totals.total, dec("121.51"));
    assert_eq!(document.totals.total, document.invoice.total);
}
