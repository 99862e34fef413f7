//! Client deletion cascade integration tests for faktur-service.

mod common;

use common::{client_input, invoice_input, item, test_account, test_db};
use faktur_core::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn cascade_delete_accepts_case_insensitive_confirmation() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Cascade Client", "a@b.com"))
        .await
        .unwrap();
    let invoice = db
        .create_invoice(&invoice_input(
            account,
            client.client_id,
            "INV-1001",
            vec![item("Consulting", "2", "50.00")],
        ))
        .await
        .unwrap();

    db.delete_client_cascade(account, client.client_id, "A@B.COM")
        .await
        .expect("Case-insensitive confirmation should succeed");

    assert!(db
        .get_client(account, client.client_id)
        .await
        .unwrap()
        .is_none());
    assert!(db
        .get_invoice(account, invoice.invoice_id)
        .await
        .unwrap()
        .is_none());
    assert!(db
        .get_invoice_items(account, invoice.invoice_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn cascade_delete_rejects_wrong_confirmation_and_mutates_nothing() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Protected Client", "a@b.com"))
        .await
        .unwrap();
    let invoice = db
        .create_invoice(&invoice_input(
            account,
            client.client_id,
            "INV-1002",
            vec![item("Design work", "1", "300.00")],
        ))
        .await
        .unwrap();

    let err = db
        .delete_client_cascade(account, client.client_id, "a@b.co")
        .await
        .unwrap_err();
    assert!(
        matches!(err, AppError::ConfirmationMismatch(_)),
        "got {:?}",
        err
    );

    // Everything is still there.
    assert!(db
        .get_client(account, client.client_id)
        .await
        .unwrap()
        .is_some());
    assert!(db
        .get_invoice(account, invoice.invoice_id)
        .await
        .unwrap()
        .is_some());
    assert_eq!(
        db.get_invoice_items(account, invoice.invoice_id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn cascade_delete_of_unknown_client_is_not_found() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let err = db
        .delete_client_cascade(account, Uuid::new_v4(), "whoever@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn cascade_delete_is_not_idempotent() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let client = db
        .create_client(&client_input(account, "Once Only", "once@example.com"))
        .await
        .unwrap();

    db.delete_client_cascade(account, client.client_id, "once@example.com")
        .await
        .expect("First delete should succeed");

    let err = db
        .delete_client_cascade(account, client.client_id, "once@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn cascade_delete_leaves_other_clients_invoices_alone() {
    let Some(db) = test_db().await else { return };
    let account = test_account();

    let doomed = db
        .create_client(&client_input(account, "Doomed", "doomed@example.com"))
        .await
        .unwrap();
    let survivor = db
        .create_client(&client_input(account, "Survivor", "survivor@example.com"))
        .await
        .unwrap();

    db.create_invoice(&invoice_input(
        account,
        doomed.client_id,
        "INV-2001",
        vec![item("Doomed work", "1", "100.00")],
    ))
    .await
    .unwrap();
    let kept = db
        .create_invoice(&invoice_input(
            account,
            survivor.client_id,
            "INV-2002",
            vec![item("Kept work", "1", "200.00")],
        ))
        .await
        .unwrap();

    db.delete_client_cascade(account, doomed.client_id, "doomed@example.com")
        .await
        .unwrap();

    assert!(db
        .get_invoice(account, kept.invoice_id)
        .await
        .unwrap()
        .is_some());
    assert_eq!(
        db.get_invoice_items(account, kept.invoice_id)
            .await
            .unwrap()
            .len(),
        1
    );
}
