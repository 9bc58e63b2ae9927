//! # Invoice Repository
//!
//! Reads confirmed sales and adopts remote invoices during pull.
//!
//! Invoices are created exactly once, by the checkout coordinator, inside its
//! transaction - this repository exposes the `pub(crate)` insert helpers the
//! coordinator borrows, but no public insert. Locally created invoices are
//! immutable; only `upsert_from_remote` rewrites one, and only with a copy
//! that originated on another till.

use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use almacen_core::{Invoice, InvoiceItem};

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

/// Inserts the invoice header; the store assigns the id.
pub(crate) async fn insert_invoice<'e, E>(executor: E, invoice: &Invoice) -> DbResult<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO invoices (
            date_millis, customer_id, customer_name,
            subtotal_cents, tax_cents,
            discount_bps, discount_cents, surcharge_bps, surcharge_cents,
            total_cents, payment_method, notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        RETURNING id
        "#,
    )
    .bind(invoice.date_millis)
    .bind(invoice.customer_id)
    .bind(&invoice.customer_name)
    .bind(invoice.subtotal_cents)
    .bind(invoice.tax_cents)
    .bind(invoice.discount_bps)
    .bind(invoice.discount_cents)
    .bind(invoice.surcharge_bps)
    .bind(invoice.surcharge_cents)
    .bind(invoice.total_cents)
    .bind(&invoice.payment_method)
    .bind(&invoice.notes)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Inserts one line item for an invoice.
pub(crate) async fn insert_item<'e, E>(executor: E, item: &InvoiceItem) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO invoice_items (
            invoice_id, product_id, product_name,
            quantity, unit_price_cents, line_total_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(item.invoice_id)
    .bind(item.product_id)
    .bind(&item.product_name)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.line_total_cents)
    .execute(executor)
    .await?;

    Ok(())
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    date_millis: i64,
    customer_id: Option<i64>,
    customer_name: Option<String>,
    subtotal_cents: i64,
    tax_cents: i64,
    discount_bps: i64,
    discount_cents: i64,
    surcharge_bps: i64,
    surcharge_cents: i64,
    total_cents: i64,
    payment_method: String,
    notes: Option<String>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Invoice {
            id: row.id,
            date_millis: row.date_millis,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            subtotal_cents: row.subtotal_cents,
            tax_cents: row.tax_cents,
            discount_bps: row.discount_bps,
            discount_cents: row.discount_cents,
            surcharge_bps: row.surcharge_bps,
            surcharge_cents: row.surcharge_cents,
            total_cents: row.total_cents,
            payment_method: row.payment_method,
            notes: row.notes,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    invoice_id: i64,
    product_id: i64,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
}

impl From<ItemRow> for InvoiceItem {
    fn from(row: ItemRow) -> Self {
        InvoiceItem {
            id: row.id,
            invoice_id: row.invoice_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            line_total_cents: row.line_total_cents,
        }
    }
}

const INVOICE_COLUMNS: &str = "id, date_millis, customer_id, customer_name, \
     subtotal_cents, tax_cents, discount_bps, discount_cents, \
     surcharge_bps, surcharge_cents, total_cents, payment_method, notes";

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Gets an invoice header by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Invoice>> {
        let row: Option<InvoiceRow> =
            sqlx::query_as(&format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Invoice::from))
    }

    /// Loads invoices by id, skipping ids that no longer exist.
    pub async fn get_many(&self, ids: &[i64]) -> DbResult<Vec<Invoice>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows: Vec<InvoiceRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    /// Lists the line items of an invoice in insertion order.
    pub async fn items_for_invoice(&self, invoice_id: i64) -> DbResult<Vec<InvoiceItem>> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT id, invoice_id, product_id, product_name,
                   quantity, unit_price_cents, line_total_cents
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InvoiceItem::from).collect())
    }

    /// Lists recent invoices, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Invoice>> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY date_millis DESC, id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    /// Adopts a remote invoice under its remote id.
    ///
    /// Replaces the header and all line items in one transaction. Item rows
    /// get fresh local ids; their identity is (invoice_id, position), not the
    /// id they carried on the till that created them.
    ///
    /// Pull-side only: this never touches stock or the outbox, because the
    /// stock effects of a remote sale happened on the till that made it.
    pub async fn upsert_from_remote(
        &self,
        invoice: &Invoice,
        items: &[InvoiceItem],
    ) -> DbResult<()> {
        if invoice.id <= 0 {
            return Err(DbError::Internal(format!(
                "remote invoice must carry a positive id, got {}",
                invoice.id
            )));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, date_millis, customer_id, customer_name,
                subtotal_cents, tax_cents,
                discount_bps, discount_cents, surcharge_bps, surcharge_cents,
                total_cents, payment_method, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                date_millis = excluded.date_millis,
                customer_id = excluded.customer_id,
                customer_name = excluded.customer_name,
                subtotal_cents = excluded.subtotal_cents,
                tax_cents = excluded.tax_cents,
                discount_bps = excluded.discount_bps,
                discount_cents = excluded.discount_cents,
                surcharge_bps = excluded.surcharge_bps,
                surcharge_cents = excluded.surcharge_cents,
                total_cents = excluded.total_cents,
                payment_method = excluded.payment_method,
                notes = excluded.notes
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.date_millis)
        .bind(invoice.customer_id)
        .bind(&invoice.customer_name)
        .bind(invoice.subtotal_cents)
        .bind(invoice.tax_cents)
        .bind(invoice.discount_bps)
        .bind(invoice.discount_cents)
        .bind(invoice.surcharge_bps)
        .bind(invoice.surcharge_cents)
        .bind(invoice.total_cents)
        .bind(&invoice.payment_method)
        .bind(&invoice.notes)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?1")
            .bind(invoice.id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            let local_item = InvoiceItem {
                id: 0,
                invoice_id: invoice.id,
                ..item.clone()
            };
            insert_item(&mut *tx, &local_item).await?;
        }

        tx.commit().await?;

        debug!(invoice_id = invoice.id, items = items.len(), "Remote invoice adopted");

        Ok(())
    }

    /// Counts all invoices.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use almacen_core::{Invoice, InvoiceItem};

    fn remote_invoice(id: i64) -> Invoice {
        Invoice {
            id,
            date_millis: 1_756_000_000_000,
            customer_id: None,
            customer_name: Some("Walk-in".into()),
            subtotal_cents: 3_000,
            tax_cents: 630,
            discount_bps: 0,
            discount_cents: 0,
            surcharge_bps: 0,
            surcharge_cents: 0,
            total_cents: 3_630,
            payment_method: "CARD".into(),
            notes: None,
        }
    }

    fn remote_item(invoice_id: i64, product_id: i64, quantity: i64) -> InvoiceItem {
        InvoiceItem {
            id: 0,
            invoice_id,
            product_id,
            product_name: format!("product-{product_id}"),
            quantity,
            unit_price_cents: 1_000,
            line_total_cents: quantity * 1_000,
        }
    }

    #[tokio::test]
    async fn remote_invoice_is_adopted_with_its_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.invoices();

        let invoice = remote_invoice(42);
        let items = vec![remote_item(42, 1, 2), remote_item(42, 2, 1)];
        repo.upsert_from_remote(&invoice, &items).await.unwrap();

        let loaded = repo.get_by_id(42).await.unwrap().unwrap();
        assert_eq!(loaded.total_cents, 3_630);
        assert_eq!(loaded.number(), "F-000042");

        let loaded_items = repo.items_for_invoice(42).await.unwrap();
        assert_eq!(loaded_items.len(), 2);
        // Item ids are assigned locally, never copied from the remote copy.
        assert!(loaded_items.iter().all(|i| i.id > 0));
    }

    #[tokio::test]
    async fn re_adoption_replaces_items_instead_of_duplicating() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.invoices();

        let invoice = remote_invoice(7);
        repo.upsert_from_remote(&invoice, &[remote_item(7, 1, 1)])
            .await
            .unwrap();
        repo.upsert_from_remote(&invoice, &[remote_item(7, 1, 1), remote_item(7, 2, 3)])
            .await
            .unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.items_for_invoice(7).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn remote_invoice_without_id_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .invoices()
            .upsert_from_remote(&remote_invoice(0), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::DbError::Internal(_)));
    }
}
