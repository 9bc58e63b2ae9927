//! # Checkout Coordinator
//!
//! Confirms a sale: one transaction that writes the invoice, snapshots its
//! line items, decrements stock with the atomic conditional statement, leaves
//! audit movements, and marks everything pending sync.
//!
//! ## The Confirmation Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  confirm_invoice(draft)                                                 │
//! │                                                                         │
//! │  validate draft (outside the transaction)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN ─────────────────────────────────────────────────────┐           │
//! │  │ 1. resolve customer name (explicit wins over lookup)     │           │
//! │  │ 2. INSERT invoice header            → assigned id        │           │
//! │  │ 3. per line item:                                        │           │
//! │  │      INSERT invoice_items (recomputed line total)        │           │
//! │  │      UPDATE products SET quantity = quantity - n         │           │
//! │  │             WHERE id = ? AND quantity >= n               │           │
//! │  │        └─ 0 rows → probe existence → NotFound or         │           │
//! │  │           InsufficientStock → ROLLBACK everything        │           │
//! │  │      INSERT stock_movements (delta = -n, SALE)           │           │
//! │  │ 4. outbox: marker for the invoice + each product         │           │
//! │  └──────────────────────────────────────────────────────────┘           │
//! │  COMMIT ──► InvoiceReceipt { invoice_id, "F-000042" }                   │
//! │                                                                         │
//! │  Any failure leaves NO trace: no invoice, no items, no stock            │
//! │  change, no movements, no outbox markers.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The commit never waits on the network. Pushing the outbox markers to the
//! remote store is the sync engine's job, after the sale is durably local.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{customer, invoice, outbox, stock};
use almacen_core::{
    validate_draft, EntityKind, Invoice, InvoiceDraft, InvoiceItem, InvoiceReceipt,
    MovementReason,
};
use sqlx::SqlitePool;

/// Confirms sales transactionally.
#[derive(Debug, Clone)]
pub struct CheckoutCoordinator {
    pool: SqlitePool,
}

impl CheckoutCoordinator {
    /// Creates a new CheckoutCoordinator.
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutCoordinator { pool }
    }

    /// Confirms a draft as a sale.
    ///
    /// ## Errors
    /// * `DbError::Validation` - the draft is malformed (nothing written)
    /// * `DbError::NotFound` - a line references a product that doesn't exist
    /// * `DbError::InsufficientStock` - a line asks for more than is on hand
    ///
    /// All three leave the database exactly as it was.
    pub async fn confirm_invoice(&self, draft: &InvoiceDraft) -> DbResult<InvoiceReceipt> {
        validate_draft(draft)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Explicit name wins; otherwise snapshot the directory entry. A
        // dangling customer_id is tolerated - the sale proceeds nameless.
        let customer_name = match (&draft.customer_name, draft.customer_id) {
            (Some(name), _) => Some(name.clone()),
            (None, Some(customer_id)) => customer::name_for_customer(&mut *tx, customer_id).await?,
            (None, None) => None,
        };

        let header = Invoice {
            id: 0,
            date_millis: now.timestamp_millis(),
            customer_id: draft.customer_id,
            customer_name,
            subtotal_cents: draft.subtotal_cents,
            tax_cents: draft.tax_cents,
            discount_bps: draft.discount_bps,
            discount_cents: draft.discount_cents,
            surcharge_bps: draft.surcharge_bps,
            surcharge_cents: draft.surcharge_cents,
            total_cents: draft.total_cents,
            payment_method: draft.payment_method.clone(),
            notes: draft.notes.clone(),
        };

        let invoice_id = invoice::insert_invoice(&mut *tx, &header).await?;

        for item in &draft.items {
            let line = InvoiceItem {
                id: 0,
                invoice_id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                // Always recomputed; a caller-supplied total is never trusted.
                line_total_cents: item.line_total_cents(),
            };
            invoice::insert_item(&mut *tx, &line).await?;

            Self::decrement_for_sale(&mut tx, item.product_id, item.quantity, now).await?;
        }

        outbox::upsert_entry(&mut *tx, EntityKind::Invoice, invoice_id, now).await?;

        let mut marked: Vec<i64> = Vec::new();
        for item in &draft.items {
            // One marker per distinct product even if it appears on two lines.
            if !marked.contains(&item.product_id) {
                outbox::upsert_entry(&mut *tx, EntityKind::Product, item.product_id, now).await?;
                marked.push(item.product_id);
            }
        }

        tx.commit().await?;

        info!(
            invoice_id,
            items = draft.items.len(),
            total_cents = draft.total_cents,
            "Sale confirmed"
        );

        Ok(InvoiceReceipt {
            invoice_id,
            invoice_number: almacen_core::invoice_number(invoice_id),
        })
    }

    /// Persists a prebuilt invoice and adjusts stock for its items.
    ///
    /// Lower-level sibling of [`confirm_invoice`](Self::confirm_invoice) for
    /// callers that assemble the header themselves (imports, replays). Same
    /// transaction, same guarantees; the header's id and the items'
    /// `invoice_id` are overwritten with the assigned id.
    pub async fn add_invoice_and_adjust_stock(
        &self,
        header: &Invoice,
        items: &[InvoiceItem],
    ) -> DbResult<InvoiceReceipt> {
        if items.is_empty() {
            return Err(DbError::Validation(
                almacen_core::ValidationError::EmptyDraft,
            ));
        }
        for item in items {
            if item.quantity <= 0 {
                return Err(DbError::Validation(
                    almacen_core::ValidationError::NonPositiveQuantity {
                        product_id: item.product_id,
                        quantity: item.quantity,
                    },
                ));
            }
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let invoice_id = invoice::insert_invoice(&mut *tx, header).await?;

        for item in items {
            let line = InvoiceItem {
                id: 0,
                invoice_id,
                ..item.clone()
            };
            invoice::insert_item(&mut *tx, &line).await?;

            Self::decrement_for_sale(&mut tx, item.product_id, item.quantity, now).await?;
        }

        outbox::upsert_entry(&mut *tx, EntityKind::Invoice, invoice_id, now).await?;

        let mut marked: Vec<i64> = Vec::new();
        for item in items {
            if !marked.contains(&item.product_id) {
                outbox::upsert_entry(&mut *tx, EntityKind::Product, item.product_id, now).await?;
                marked.push(item.product_id);
            }
        }

        tx.commit().await?;

        info!(invoice_id, items = items.len(), "Invoice recorded with stock adjustment");

        Ok(InvoiceReceipt {
            invoice_id,
            invoice_number: almacen_core::invoice_number(invoice_id),
        })
    }

    /// Conditional decrement plus its SALE audit row, inside the caller's
    /// transaction. Disambiguates the zero-rows case before failing.
    async fn decrement_for_sale(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        product_id: i64,
        quantity: i64,
        now: chrono::DateTime<Utc>,
    ) -> DbResult<()> {
        if !stock::decrement_if_available(&mut **tx, product_id, quantity, now).await? {
            let err = if stock::product_exists(&mut **tx, product_id).await? {
                DbError::InsufficientStock {
                    product_id,
                    requested: quantity,
                }
            } else {
                DbError::not_found("Product", product_id)
            };
            warn!(product_id, quantity, %err, "Sale aborted");
            return Err(err);
        }

        stock::insert_movement(
            &mut **tx,
            product_id,
            -quantity,
            MovementReason::Sale,
            None,
            now,
        )
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
