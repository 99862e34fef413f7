//! Database service for faktur-service.
//!
//! Every multi-step mutation (invoice create/update with its items, the
//! client cascade delete) runs inside a single transaction so concurrent
//! readers never observe a half-applied state. Stored totals columns are
//! written exclusively from [`crate::domain::totals`] output.

use crate::domain::status as status_rules;
use crate::domain::totals::{self, InvoiceTotals};
use crate::models::{
    BusinessProfile, Client, CreateClient, CreateInvoice, DashboardSummary, Invoice,
    InvoiceDocument, InvoiceItem, InvoiceStatus, ItemInput, ListClientsFilter,
    ListInvoicesFilter, MonthlyRevenue, StatusSlice, UpdateClient, UpdateInvoice,
    UpsertBusinessProfile,
};
use crate::services::metrics::{
    CLIENT_CASCADE_DELETES_TOTAL, DB_QUERY_DURATION, INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL,
};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use faktur_core::error::AppError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

const CLIENT_COLUMNS: &str = "client_id, account_id, name, email, phone, company, \
    address_line1, address_line2, city, state, postal_code, country, tax_id, notes, \
    created_utc, updated_utc";

const INVOICE_COLUMNS: &str = "invoice_id, account_id, client_id, invoice_number, status, \
    issue_date, due_date, currency, tax_rate, discount_type, discount_value, notes, terms, \
    subtotal, discount_amount, tax_amount, total, created_utc, updated_utc, sent_utc, \
    paid_utc, cancelled_utc";

const ITEM_COLUMNS: &str =
    "item_id, invoice_id, account_id, description, quantity, rate, amount, position, created_utc";

const PROFILE_COLUMNS: &str = "account_id, company_name, contact_email, phone, address_line1, \
    address_line2, city, state, postal_code, country, tax_id, logo_url, updated_utc";

/// Database connection pool wrapper.
///
/// Constructed once at process start and injected into whatever needs it;
/// there is deliberately no ambient global handle.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "faktur-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    /// Create a new client.
    #[instrument(skip(self, input), fields(account_id = %input.account_id))]
    pub async fn create_client(&self, input: &CreateClient) -> Result<Client, AppError> {
        input.validate()?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client_id = Uuid::new_v4();
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (
                client_id, account_id, name, email, phone, company,
                address_line1, address_line2, city, state, postal_code, country, tax_id, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(client_id)
        .bind(input.account_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.tax_id)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A client with email '{}' already exists",
                    input.email
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)),
        })?;

        timer.observe_duration();

        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    /// Get a client by ID.
    #[instrument(skip(self), fields(account_id = %account_id, client_id = %client_id))]
    pub async fn get_client(
        &self,
        account_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {}
            FROM clients
            WHERE account_id = $1 AND client_id = $2
            "#,
            CLIENT_COLUMNS
        ))
        .bind(account_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// List clients for an account.
    #[instrument(skip(self, filter), fields(account_id = %account_id))]
    pub async fn list_clients(
        &self,
        account_id: Uuid,
        filter: &ListClientsFilter,
    ) -> Result<Vec<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s));

        let clients = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Client>(&format!(
                r#"
                SELECT {}
                FROM clients
                WHERE account_id = $1
                  AND ($2::text IS NULL OR name ILIKE $2 OR company ILIKE $2 OR email ILIKE $2)
                  AND client_id > $3
                ORDER BY client_id
                LIMIT $4
                "#,
                CLIENT_COLUMNS
            ))
            .bind(account_id)
            .bind(&pattern)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Client>(&format!(
                r#"
                SELECT {}
                FROM clients
                WHERE account_id = $1
                  AND ($2::text IS NULL OR name ILIKE $2 OR company ILIKE $2 OR email ILIKE $2)
                ORDER BY client_id
                LIMIT $3
                "#,
                CLIENT_COLUMNS
            ))
            .bind(account_id)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list clients: {}", e)))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// Update a client. Absent fields are left unchanged.
    #[instrument(skip(self, input), fields(account_id = %account_id, client_id = %client_id))]
    pub async fn update_client(
        &self,
        account_id: Uuid,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Option<Client>, AppError> {
        input.validate()?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                company = COALESCE($6, company),
                address_line1 = COALESCE($7, address_line1),
                address_line2 = COALESCE($8, address_line2),
                city = COALESCE($9, city),
                state = COALESCE($10, state),
                postal_code = COALESCE($11, postal_code),
                country = COALESCE($12, country),
                tax_id = COALESCE($13, tax_id),
                notes = COALESCE($14, notes),
                updated_utc = NOW()
            WHERE account_id = $1 AND client_id = $2
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(account_id)
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.tax_id)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Another client already uses that email"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to update client: {}", e)),
        })?;

        timer.observe_duration();

        if let Some(ref c) = client {
            info!(client_id = %c.client_id, "Client updated");
        }

        Ok(client)
    }

    /// Delete a client and every invoice it owns, as one atomic unit.
    ///
    /// The caller must supply the client's email (case-insensitive) as a
    /// confirmation token; on mismatch nothing is touched. Deleting an
    /// unknown client id is a not-found error, never a silent success.
    #[instrument(skip(self, confirmation_email), fields(account_id = %account_id, client_id = %client_id))]
    pub async fn delete_client_cascade(
        &self,
        account_id: Uuid,
        client_id: Uuid,
        confirmation_email: &str,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client_cascade"])
            .start_timer();

        let client = self
            .get_client(account_id, client_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

        if !client
            .email
            .eq_ignore_ascii_case(confirmation_email.trim())
        {
            CLIENT_CASCADE_DELETES_TOTAL
                .with_label_values(&["confirmation_mismatch"])
                .inc();
            return Err(AppError::ConfirmationMismatch(anyhow::anyhow!(
                "Confirmation email does not match the client's email"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let items_deleted = sqlx::query(
            r#"
            DELETE FROM invoice_items
            WHERE account_id = $1
              AND invoice_id IN (
                SELECT invoice_id FROM invoices WHERE account_id = $1 AND client_id = $2
              )
            "#,
        )
        .bind(account_id)
        .bind(client_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice items: {}", e))
        })?;

        let invoices_deleted = sqlx::query(
            r#"
            DELETE FROM invoices
            WHERE account_id = $1 AND client_id = $2
            "#,
        )
        .bind(account_id)
        .bind(client_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoices: {}", e))
        })?;

        sqlx::query(
            r#"
            DELETE FROM clients
            WHERE account_id = $1 AND client_id = $2
            "#,
        )
        .bind(account_id)
        .bind(client_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete client: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit cascade delete: {}", e))
        })?;

        timer.observe_duration();

        CLIENT_CASCADE_DELETES_TOTAL
            .with_label_values(&["deleted"])
            .inc();

        info!(
            client_id = %client_id,
            invoices_deleted = invoices_deleted.rows_affected(),
            items_deleted = items_deleted.rows_affected(),
            "Client deleted with cascade"
        );

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create a draft invoice together with its line items.
    ///
    /// Totals are computed from the items and stored alongside them in the
    /// same transaction; the stored columns are a cache of that computation,
    /// never independently editable.
    #[instrument(skip(self, input), fields(account_id = %input.account_id, client_id = %input.client_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        validate_invoice_fields(&input.invoice_number, input.issue_date, input.due_date)?;
        validate_items(&input.items)?;

        let totals = totals::compute_invoice_totals(
            &input.items,
            input.tax_rate,
            input.discount_type,
            input.discount_value,
        )?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        // An invoice cannot exist without a valid client.
        self.get_client(input.account_id, input.client_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, account_id, client_id, invoice_number, status, issue_date, due_date,
                currency, tax_rate, discount_type, discount_value, notes, terms,
                subtotal, discount_amount, tax_amount, total
            )
            VALUES ($1, $2, $3, $4, 'draft', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(input.account_id)
        .bind(input.client_id)
        .bind(&input.invoice_number)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(&input.currency)
        .bind(input.tax_rate)
        .bind(input.discount_type.as_str())
        .bind(input.discount_value)
        .bind(&input.notes)
        .bind(&input.terms)
        .bind(totals.subtotal)
        .bind(totals.discount_amount)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        insert_items(&mut tx, input.account_id, invoice_id, &input.items).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice create: {}", e))
        })?;

        timer.observe_duration();

        INVOICES_TOTAL.with_label_values(&["draft"]).inc();
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[&invoice.currency])
            .inc_by(totals.total.to_f64().unwrap_or(0.0));

        info!(invoice_id = %invoice.invoice_id, total = %invoice.total, "Draft invoice created");

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(account_id = %account_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE account_id = $1 AND invoice_id = $2
            "#,
            INVOICE_COLUMNS
        ))
        .bind(account_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get the line items of an invoice, in entry order.
    #[instrument(skip(self), fields(account_id = %account_id, invoice_id = %invoice_id))]
    pub async fn get_invoice_items(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InvoiceItem>(&format!(
            r#"
            SELECT {}
            FROM invoice_items
            WHERE account_id = $1 AND invoice_id = $2
            ORDER BY position
            "#,
            ITEM_COLUMNS
        ))
        .bind(account_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice items: {}", e))
        })?;

        timer.observe_duration();

        Ok(items)
    }

    /// List invoices for an account.
    ///
    /// Filtering on [`InvoiceStatus::Overdue`] translates to the projection
    /// predicate (`sent` and past due as of `today`) since `overdue` is
    /// never stored.
    #[instrument(skip(self, filter), fields(account_id = %account_id))]
    pub async fn list_invoices(
        &self,
        account_id: Uuid,
        filter: &ListInvoicesFilter,
        today: NaiveDate,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let (status_str, overdue_only) = match filter.status {
            Some(InvoiceStatus::Overdue) => (Some("sent".to_string()), true),
            Some(s) => (Some(s.as_str().to_string()), false),
            None => (None, false),
        };

        let invoices = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {}
                FROM invoices
                WHERE account_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::bool = FALSE OR due_date < $4)
                  AND ($5::uuid IS NULL OR client_id = $5)
                  AND ($6::date IS NULL OR issue_date >= $6)
                  AND ($7::date IS NULL OR issue_date <= $7)
                  AND invoice_id > $8
                ORDER BY invoice_id
                LIMIT $9
                "#,
                INVOICE_COLUMNS
            ))
            .bind(account_id)
            .bind(&status_str)
            .bind(overdue_only)
            .bind(today)
            .bind(filter.client_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {}
                FROM invoices
                WHERE account_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::bool = FALSE OR due_date < $4)
                  AND ($5::uuid IS NULL OR client_id = $5)
                  AND ($6::date IS NULL OR issue_date >= $6)
                  AND ($7::date IS NULL OR issue_date <= $7)
                ORDER BY invoice_id
                LIMIT $8
                "#,
                INVOICE_COLUMNS
            ))
            .bind(account_id)
            .bind(&status_str)
            .bind(overdue_only)
            .bind(today)
            .bind(filter.client_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Update a draft invoice, replacing its line items and recomputing the
    /// stored totals in the same transaction.
    ///
    /// Edits to a sent, paid, or cancelled invoice are rejected: once a
    /// number has been communicated to a client it must not silently change.
    #[instrument(skip(self, input), fields(account_id = %account_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Option<Invoice>, AppError> {
        let existing = match self.get_invoice(account_id, invoice_id).await? {
            Some(inv) => inv,
            None => return Ok(None),
        };
        status_rules::ensure_editable(existing.status())?;

        // Merge scalars in Rust so totals are computed from the effective
        // values, not a COALESCE the database resolves after the fact.
        let client_id = input.client_id.unwrap_or(existing.client_id);
        let invoice_number = input
            .invoice_number
            .clone()
            .unwrap_or_else(|| existing.invoice_number.clone());
        let issue_date = input.issue_date.unwrap_or(existing.issue_date);
        let due_date = input.due_date.unwrap_or(existing.due_date);
        let currency = input
            .currency
            .clone()
            .unwrap_or_else(|| existing.currency.clone());
        let tax_rate = input.tax_rate.unwrap_or(existing.tax_rate);
        let discount_type = input.discount_type.unwrap_or_else(|| existing.discount_type());
        let discount_value = input.discount_value.unwrap_or(existing.discount_value);
        let notes = input.notes.clone().or_else(|| existing.notes.clone());
        let terms = input.terms.clone().or_else(|| existing.terms.clone());

        validate_invoice_fields(&invoice_number, issue_date, due_date)?;
        validate_items(&input.items)?;

        let totals = totals::compute_invoice_totals(
            &input.items,
            tax_rate,
            discount_type,
            discount_value,
        )?;

        if input.client_id.is_some() {
            self.get_client(account_id, client_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET client_id = $3,
                invoice_number = $4,
                issue_date = $5,
                due_date = $6,
                currency = $7,
                tax_rate = $8,
                discount_type = $9,
                discount_value = $10,
                notes = $11,
                terms = $12,
                subtotal = $13,
                discount_amount = $14,
                tax_amount = $15,
                total = $16,
                updated_utc = NOW()
            WHERE account_id = $1 AND invoice_id = $2 AND status = 'draft'
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(account_id)
        .bind(invoice_id)
        .bind(client_id)
        .bind(&invoice_number)
        .bind(issue_date)
        .bind(due_date)
        .bind(&currency)
        .bind(tax_rate)
        .bind(discount_type.as_str())
        .bind(discount_value)
        .bind(&notes)
        .bind(&terms)
        .bind(totals.subtotal)
        .bind(totals.discount_amount)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        let Some(invoice) = invoice else {
            // Status changed between the check and the update.
            tx.rollback().await.ok();
            return Err(AppError::Validation(anyhow::anyhow!(
                "only draft invoices can be edited"
            )));
        };

        sqlx::query(
            r#"
            DELETE FROM invoice_items
            WHERE account_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(account_id)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to replace invoice items: {}", e))
        })?;

        insert_items(&mut tx, account_id, invoice_id, &input.items).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice update: {}", e))
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, total = %invoice.total, "Invoice updated");

        Ok(Some(invoice))
    }

    /// Delete a draft invoice and its items.
    #[instrument(skip(self), fields(account_id = %account_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, AppError> {
        let existing = match self.get_invoice(account_id, invoice_id).await? {
            Some(inv) => inv,
            None => return Ok(false),
        };
        status_rules::ensure_editable(existing.status())?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            DELETE FROM invoice_items
            WHERE account_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(account_id)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice items: {}", e))
        })?;

        let result = sqlx::query(
            r#"
            DELETE FROM invoices
            WHERE account_id = $1 AND invoice_id = $2 AND status = 'draft'
            "#,
        )
        .bind(account_id)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice delete: {}", e))
        })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Draft invoice deleted");
        }

        Ok(deleted)
    }

    /// Move an invoice to `target` status.
    ///
    /// Sending requires at least one line item; `paid` and `cancelled` are
    /// terminal; `overdue` is a projection and never a valid target. The
    /// matching timestamp column is stamped with `now`.
    #[instrument(skip(self), fields(account_id = %account_id, invoice_id = %invoice_id, target = %target))]
    pub async fn transition_invoice_status(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
        target: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> Result<Invoice, AppError> {
        let existing = self
            .get_invoice(account_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        status_rules::transition(existing.status(), target)?;

        if target == InvoiceStatus::Sent {
            let items = self.get_invoice_items(account_id, invoice_id).await?;
            if items.is_empty() {
                return Err(AppError::Validation(anyhow::anyhow!(
                    "cannot send an invoice without line items"
                )));
            }
        }

        let stamp_column = match target {
            InvoiceStatus::Sent => "sent_utc",
            InvoiceStatus::Paid => "paid_utc",
            InvoiceStatus::Cancelled => "cancelled_utc",
            _ => {
                // transition() already rejected everything else.
                return Err(AppError::InvalidTransition {
                    from: existing.status.clone(),
                    to: target.as_str().to_string(),
                });
            }
        };

        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_invoice_status"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = $3,
                {} = $4,
                updated_utc = $4
            WHERE account_id = $1 AND invoice_id = $2 AND status = $5
            RETURNING {}
            "#,
            stamp_column, INVOICE_COLUMNS
        ))
        .bind(account_id)
        .bind(invoice_id)
        .bind(target.as_str())
        .bind(now)
        .bind(&existing.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to transition invoice: {}", e))
        })?
        .ok_or_else(|| AppError::InvalidTransition {
            // Status moved under us between the read and the update.
            from: existing.status.clone(),
            to: target.as_str().to_string(),
        })?;

        timer.observe_duration();

        INVOICES_TOTAL.with_label_values(&[target.as_str()]).inc();

        info!(
            invoice_id = %invoice.invoice_id,
            from = %existing.status,
            to = %invoice.status,
            "Invoice status transitioned"
        );

        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Business Profile Operations
    // -------------------------------------------------------------------------

    /// Get the account's business profile, if one has been saved.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn get_business_profile(
        &self,
        account_id: Uuid,
    ) -> Result<Option<BusinessProfile>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_business_profile"])
            .start_timer();

        let profile = sqlx::query_as::<_, BusinessProfile>(&format!(
            r#"
            SELECT {}
            FROM business_profiles
            WHERE account_id = $1
            "#,
            PROFILE_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get business profile: {}", e))
        })?;

        timer.observe_duration();

        Ok(profile)
    }

    /// Create or replace the account's business profile (one row per account).
    #[instrument(skip(self, input), fields(account_id = %input.account_id))]
    pub async fn upsert_business_profile(
        &self,
        input: &UpsertBusinessProfile,
    ) -> Result<BusinessProfile, AppError> {
        input.validate()?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_business_profile"])
            .start_timer();

        let profile = sqlx::query_as::<_, BusinessProfile>(&format!(
            r#"
            INSERT INTO business_profiles (
                account_id, company_name, contact_email, phone, address_line1, address_line2,
                city, state, postal_code, country, tax_id, logo_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (account_id) DO UPDATE
            SET company_name = EXCLUDED.company_name,
                contact_email = EXCLUDED.contact_email,
                phone = EXCLUDED.phone,
                address_line1 = EXCLUDED.address_line1,
                address_line2 = EXCLUDED.address_line2,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                postal_code = EXCLUDED.postal_code,
                country = EXCLUDED.country,
                tax_id = EXCLUDED.tax_id,
                logo_url = EXCLUDED.logo_url,
                updated_utc = NOW()
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(input.account_id)
        .bind(&input.company_name)
        .bind(&input.contact_email)
        .bind(&input.phone)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.tax_id)
        .bind(&input.logo_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to upsert business profile: {}", e))
        })?;

        timer.observe_duration();

        info!(account_id = %profile.account_id, "Business profile saved");

        Ok(profile)
    }

    // -------------------------------------------------------------------------
    // Document Assembly
    // -------------------------------------------------------------------------

    /// Assemble everything a renderer needs for one invoice document.
    ///
    /// Totals are recomputed from the line items here rather than read from
    /// the invoice row, so export can never disagree with the items even if
    /// the cached columns were somehow stale.
    #[instrument(skip(self), fields(account_id = %account_id, invoice_id = %invoice_id))]
    pub async fn get_invoice_document(
        &self,
        account_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceDocument, AppError> {
        let invoice = self
            .get_invoice(account_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        let items = self.get_invoice_items(account_id, invoice_id).await?;

        let client = self
            .get_client(account_id, invoice.client_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

        let business_profile = self.get_business_profile(account_id).await?;

        let line_inputs: Vec<ItemInput> = items
            .iter()
            .map(|i| ItemInput {
                description: i.description.clone(),
                quantity: i.quantity,
                rate: i.rate,
            })
            .collect();
        let totals: InvoiceTotals = totals::compute_invoice_totals(
            &line_inputs,
            invoice.tax_rate,
            invoice.discount_type(),
            invoice.discount_value,
        )?;

        Ok(InvoiceDocument {
            invoice,
            items,
            client,
            business_profile,
            totals,
        })
    }

    // -------------------------------------------------------------------------
    // Dashboard Operations
    // -------------------------------------------------------------------------

    /// Invoice counts and amounts grouped by effective status as of `today`.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn status_breakdown(
        &self,
        account_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<StatusSlice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["status_breakdown"])
            .start_timer();

        let slices = sqlx::query_as::<_, StatusSlice>(
            r#"
            SELECT CASE WHEN status = 'sent' AND due_date < $2 THEN 'overdue' ELSE status END
                       AS status,
                   COUNT(*) AS count,
                   COALESCE(SUM(total), 0) AS amount
            FROM invoices
            WHERE account_id = $1
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(account_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute status breakdown: {}", e))
        })?;

        timer.observe_duration();

        Ok(slices)
    }

    /// Revenue from paid invoices per calendar month, for the trailing year
    /// ending at `today`'s month.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn monthly_revenue(
        &self,
        account_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<MonthlyRevenue>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["monthly_revenue"])
            .start_timer();

        let window_start = trailing_year_start(today);

        let months = sqlx::query_as::<_, MonthlyRevenue>(
            r#"
            SELECT (date_trunc('month', issue_date))::date AS month,
                   COALESCE(SUM(total), 0) AS revenue
            FROM invoices
            WHERE account_id = $1
              AND status = 'paid'
              AND issue_date >= $2
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(account_id)
        .bind(window_start)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute monthly revenue: {}", e))
        })?;

        timer.observe_duration();

        Ok(months)
    }

    /// Everything the dashboard page shows, in one call.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn dashboard_summary(
        &self,
        account_id: Uuid,
        today: NaiveDate,
    ) -> Result<DashboardSummary, AppError> {
        let status_breakdown = self.status_breakdown(account_id, today).await?;
        let monthly_revenue = self.monthly_revenue(account_id, today).await?;

        let timer = DB_QUERY_DURATION
            .with_label_values(&["dashboard_summary"])
            .start_timer();

        let total_billed: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total), 0)
            FROM invoices
            WHERE account_id = $1 AND status IN ('sent', 'paid')
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute billed total: {}", e))
        })?;

        let total_collected: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total), 0)
            FROM invoices
            WHERE account_id = $1 AND status = 'paid'
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute collected total: {}", e))
        })?;

        let outstanding: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total), 0)
            FROM invoices
            WHERE account_id = $1 AND status = 'sent'
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to compute outstanding total: {}", e))
        })?;

        timer.observe_duration();

        Ok(DashboardSummary {
            status_breakdown,
            total_billed: total_billed.unwrap_or(Decimal::ZERO),
            total_collected: total_collected.unwrap_or(Decimal::ZERO),
            outstanding: outstanding.unwrap_or(Decimal::ZERO),
            monthly_revenue,
        })
    }
}

/// Insert line items in entry order, with amounts derived per line.
async fn insert_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    account_id: Uuid,
    invoice_id: Uuid,
    items: &[ItemInput],
) -> Result<(), AppError> {
    for (position, item) in items.iter().enumerate() {
        let amount = totals::item_amount(item.quantity, item.rate)?;
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                item_id, invoice_id, account_id, description, quantity, rate, amount, position
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(account_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.rate)
        .bind(amount)
        .bind(position as i32)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice item: {}", e))
        })?;
    }
    Ok(())
}

fn validate_invoice_fields(
    invoice_number: &str,
    issue_date: NaiveDate,
    due_date: NaiveDate,
) -> Result<(), AppError> {
    if invoice_number.trim().is_empty() {
        return Err(AppError::Validation(anyhow::anyhow!(
            "invoice number must not be empty"
        )));
    }
    if due_date < issue_date {
        return Err(AppError::Validation(anyhow::anyhow!(
            "due date {} is before issue date {}",
            due_date,
            issue_date
        )));
    }
    Ok(())
}

fn validate_items(items: &[ItemInput]) -> Result<(), AppError> {
    for item in items {
        if item.description.trim().is_empty() {
            return Err(AppError::Validation(anyhow::anyhow!(
                "item description must not be empty"
            )));
        }
    }
    Ok(())
}

/// First day of the month eleven months before `today`'s month.
fn trailing_year_start(today: NaiveDate) -> NaiveDate {
    let month_start = today.with_day(1).unwrap_or(today);
    month_start
        .checked_sub_months(Months::new(11))
        .unwrap_or(month_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_year_start_spans_twelve_months() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        assert_eq!(
            trailing_year_start(today),
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
        );
    }
}
