//! # Sales Service
//!
//! The entry point a till calls: confirm the sale locally, then immediately
//! try to push it out.
//!
//! ## Local-First Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  confirm_invoice(draft)                                             │
//! │                                                                     │
//! │  1. CheckoutCoordinator commits the sale locally                    │
//! │       └─ any failure here: nothing was written, error returned      │
//! │                                                                     │
//! │  2. SyncEngine pushes the pending markers                           │
//! │       └─ failure here: the SALE IS ALREADY DURABLE. Attempts are    │
//! │          recorded, markers stay pending, and the error surfaces     │
//! │          so the caller can show "saved locally, sync pending".      │
//! │          The next push (any trigger) retries automatically.         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The push is idempotent and scoped by the outbox, so "push after every
//! sale" and "push on a timer" coexist without coordination.

use tracing::{info, warn};

use crate::engine::{PullReport, PushReport, SyncEngine};
use crate::error::SyncResult;
use almacen_core::{Invoice, InvoiceDraft, InvoiceItem, InvoiceReceipt};

/// Confirms sales and keeps the remote store in step.
#[derive(Clone)]
pub struct SalesService {
    engine: SyncEngine,
}

impl SalesService {
    /// Creates a new SalesService.
    pub fn new(engine: SyncEngine) -> Self {
        SalesService { engine }
    }

    /// Returns the underlying sync engine.
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Confirms a draft as a sale and pushes it to the remote store.
    ///
    /// ## Errors
    /// * Local errors (validation, insufficient stock, unknown product)
    ///   mean nothing was written.
    /// * A `SyncError::Remote` AFTER confirmation means the sale is safely
    ///   committed locally and only the push is outstanding - check the
    ///   outbox (or just retry the push) rather than re-submitting the sale.
    pub async fn confirm_invoice(&self, draft: &InvoiceDraft) -> SyncResult<InvoiceReceipt> {
        let receipt = self
            .engine
            .database()
            .checkout()
            .confirm_invoice(draft)
            .await?;

        if let Err(e) = self.engine.push_pending().await {
            warn!(
                invoice_id = receipt.invoice_id,
                error = %e,
                "Sale committed locally, push pending"
            );
            return Err(e);
        }

        info!(invoice_id = receipt.invoice_id, "Sale confirmed and pushed");
        Ok(receipt)
    }

    /// Records a prebuilt invoice with stock adjustment, then pushes.
    ///
    /// Same local-first contract as
    /// [`confirm_invoice`](Self::confirm_invoice).
    pub async fn add_invoice_and_adjust_stock(
        &self,
        header: &Invoice,
        items: &[InvoiceItem],
    ) -> SyncResult<InvoiceReceipt> {
        let receipt = self
            .engine
            .database()
            .checkout()
            .add_invoice_and_adjust_stock(header, items)
            .await?;

        if let Err(e) = self.engine.push_pending().await {
            warn!(
                invoice_id = receipt.invoice_id,
                error = %e,
                "Invoice recorded locally, push pending"
            );
            return Err(e);
        }

        Ok(receipt)
    }

    /// Pushes every pending outbox marker.
    pub async fn push_pending(&self) -> SyncResult<PushReport> {
        self.engine.push_pending().await
    }

    /// Pulls and reconciles the remote collections.
    pub async fn pull_remote(&self) -> SyncResult<PullReport> {
        self.engine.pull_remote().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::SyncError;
    use crate::remote::{InMemoryRemoteStore, RemoteStore};
    use almacen_core::{DraftItem, Product};
    use almacen_db::{Database, DbConfig};
    use chrono::Utc;
    use std::sync::Arc;

    async fn service_with_store() -> (SalesService, Arc<InMemoryRemoteStore>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Arc::new(InMemoryRemoteStore::new());
        let engine = SyncEngine::new(db, remote.clone(), SyncConfig::default());
        (SalesService::new(engine), remote)
    }

    async fn seed_product(service: &SalesService, quantity: i64) -> i64 {
        service
            .engine()
            .database()
            .products()
            .insert(&Product {
                id: 0,
                code: "P-001".into(),
                barcode: "779000000001".into(),
                name: "Yerba 1kg".into(),
                description: None,
                sale_price_cents: 1_500,
                purchase_price_cents: 900,
                quantity,
                image_url: None,
                category_id: None,
                category_name: None,
                provider_id: None,
                provider_name: None,
                updated_at: Utc::now(),
            })
            .await
            .unwrap()
            .id
    }

    fn draft(product_id: i64, quantity: i64) -> InvoiceDraft {
        InvoiceDraft {
            items: vec![DraftItem {
                product_id,
                product_name: "Yerba 1kg".into(),
                quantity,
                unit_price_cents: 1_500,
            }],
            customer_id: None,
            customer_name: None,
            subtotal_cents: quantity * 1_500,
            tax_cents: 0,
            discount_bps: 0,
            discount_cents: 0,
            surcharge_bps: 0,
            surcharge_cents: 0,
            total_cents: quantity * 1_500,
            payment_method: "CASH".into(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn confirmed_sale_lands_on_the_remote_immediately() {
        let (service, remote) = service_with_store().await;
        let product_id = seed_product(&service, 5).await;

        let receipt = service.confirm_invoice(&draft(product_id, 3)).await.unwrap();

        assert_eq!(remote.len("invoices").await, 1);
        let doc = remote
            .get("products", &product_id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["quantity"], 2);
        assert_eq!(
            service
                .engine()
                .database()
                .outbox()
                .count_pending()
                .await
                .unwrap(),
            0
        );
        assert_eq!(receipt.invoice_number, format!("F-{:06}", receipt.invoice_id));
    }

    #[tokio::test]
    async fn offline_sale_is_durable_and_syncs_on_recovery() {
        let (service, remote) = service_with_store().await;
        let product_id = seed_product(&service, 5).await;

        remote.set_offline(true);
        let err = service.confirm_invoice(&draft(product_id, 2)).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));

        // Sale durable locally despite the failed push.
        let db = service.engine().database();
        assert_eq!(db.invoices().count().await.unwrap(), 1);
        let product = db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 3);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 2);

        // Back online: a plain push drains the backlog.
        remote.set_offline(false);
        let report = service.push_pending().await.unwrap();
        assert_eq!(report.invoices_pushed, 1);
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
        assert_eq!(remote.len("invoices").await, 1);
    }

    #[tokio::test]
    async fn local_failures_write_nothing_and_skip_the_push() {
        let (service, remote) = service_with_store().await;
        let product_id = seed_product(&service, 1).await;

        let err = service.confirm_invoice(&draft(product_id, 5)).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Database(almacen_db::DbError::InsufficientStock { .. })
        ));

        assert!(remote.is_empty("invoices").await);
        assert_eq!(
            service
                .engine()
                .database()
                .invoices()
                .count()
                .await
                .unwrap(),
            0
        );
    }
}
