//! # Sync Engine
//!
//! Drains the outbox to the remote store (push) and reconciles remote
//! documents into the local store (pull).
//!
//! ## Push Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  push_pending()                        per entity kind:             │
//! │                                                                     │
//! │  1. load pending markers (oldest first)                             │
//! │  2. load the CURRENT local rows for those ids                       │
//! │     └─ marker with no row = deleted entity → prune the marker,      │
//! │        never contact the remote                                     │
//! │  3. serialize rows into documents, batch by batch_size              │
//! │  4. per batch: remote.batch_upsert                                  │
//! │       success → DELETE that batch's markers                         │
//! │       failure → attempts += 1, last_error recorded on what's        │
//! │                 left, error re-raised (markers survive)             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pull Cycle (last-write-wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  pull_remote()                                                      │
//! │                                                                     │
//! │  products: full collection scan                                     │
//! │    match local by id, then by barcode                               │
//! │    ┌──────────────────────────┬────────────────────────────────┐    │
//! │    │ no local counterpart     │ adopt under the remote id      │    │
//! │    │ remote.updated_at >=     │ remote wins: overwrite local   │    │
//! │    │   local.updated_at       │ row, quantity included         │    │
//! │    │ local strictly newer     │ local wins: push local copy    │    │
//! │    │                          │ back to the remote store       │    │
//! │    └──────────────────────────┴────────────────────────────────┘    │
//! │                                                                     │
//! │  invoices: append-only upsert                                       │
//! │    every remote invoice is upserted: header replaced, items         │
//! │    deleted then re-inserted (duplicate-proof). NO stock effects:    │
//! │    the till that made the sale already decremented its stock and    │
//! │    the pushed product documents carry the result                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::documents::{self, InvoiceDocument, ProductDocument};
use crate::error::SyncResult;
use crate::remote::RemoteStore;
use almacen_core::{EntityKind, Product};
use almacen_db::Database;

// =============================================================================
// Reports
// =============================================================================

/// What a push cycle accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Product documents confirmed present on the remote store.
    pub products_pushed: usize,
    /// Invoice documents confirmed present on the remote store.
    pub invoices_pushed: usize,
    /// Markers dropped because their local row no longer exists.
    pub pruned: usize,
}

impl PushReport {
    /// True if the cycle had nothing to do.
    pub fn is_noop(&self) -> bool {
        *self == PushReport::default()
    }
}

/// What a pull cycle accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Remote products adopted locally (no prior local counterpart).
    pub products_adopted: usize,
    /// Local products overwritten because the remote copy was newer.
    pub products_updated: usize,
    /// Local products pushed back because the local copy was newer.
    pub products_pushed_back: usize,
    /// Remote invoices adopted locally.
    pub invoices_adopted: usize,
    /// Remote documents skipped because they could not be decoded.
    pub skipped: usize,
}

// =============================================================================
// Engine
// =============================================================================

/// Push/pull synchronization against a remote document store.
#[derive(Clone)]
pub struct SyncEngine {
    db: Database,
    remote: Arc<dyn RemoteStore>,
    config: SyncConfig,
}

impl SyncEngine {
    /// Creates a new SyncEngine.
    pub fn new(db: Database, remote: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        SyncEngine { db, remote, config }
    }

    /// Returns the local database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Pushes every pending outbox marker to the remote store.
    ///
    /// Safe to call at any time, including when the outbox is empty. On a
    /// remote failure the error is re-raised after recording the attempt;
    /// everything already confirmed in this cycle stays confirmed.
    pub async fn push_pending(&self) -> SyncResult<PushReport> {
        let mut report = PushReport::default();

        self.push_kind(EntityKind::Product, &mut report).await?;
        self.push_kind(EntityKind::Invoice, &mut report).await?;

        if !report.is_noop() {
            info!(
                products = report.products_pushed,
                invoices = report.invoices_pushed,
                pruned = report.pruned,
                "Push cycle complete"
            );
        }

        Ok(report)
    }

    async fn push_kind(&self, kind: EntityKind, report: &mut PushReport) -> SyncResult<()> {
        let outbox = self.db.outbox();
        let markers = outbox.get_by_kind(kind).await?;
        if markers.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = markers.iter().map(|m| m.entity_id).collect();

        // Load the CURRENT rows. A marker whose row is gone refers to a
        // deleted entity: drop the marker, nothing to tell the remote.
        let (docs, found_ids) = self.load_documents(kind, &ids).await?;

        let missing: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| !found_ids.contains(id))
            .collect();
        if !missing.is_empty() {
            debug!(kind = %kind, pruned = missing.len(), "Pruning markers for deleted rows");
            report.pruned += outbox.delete_by_kind_and_ids(kind, &missing).await? as usize;
        }

        let collection = self.collection_for(kind);
        let mut remaining: Vec<i64> = found_ids.clone();

        for chunk in docs.chunks(self.config.sync.batch_size) {
            let batch: Vec<(String, Value)> = chunk.to_vec();
            let batch_ids: Vec<i64> = remaining
                .iter()
                .copied()
                .take(chunk.len())
                .collect();

            if let Err(e) = self.remote.batch_upsert(collection, batch).await {
                warn!(kind = %kind, pending = remaining.len(), error = %e, "Push failed");
                outbox
                    .mark_attempt(kind, &remaining, &e.to_string())
                    .await?;
                return Err(e);
            }

            outbox.delete_by_kind_and_ids(kind, &batch_ids).await?;
            remaining.drain(..batch_ids.len());

            match kind {
                EntityKind::Product => report.products_pushed += batch_ids.len(),
                EntityKind::Invoice => report.invoices_pushed += batch_ids.len(),
            }
        }

        Ok(())
    }

    /// Serializes the current local rows for a set of ids.
    ///
    /// Returns the documents (keyed by decimal id) and the ids that still
    /// exist locally, both in the same order.
    async fn load_documents(
        &self,
        kind: EntityKind,
        ids: &[i64],
    ) -> SyncResult<(Vec<(String, Value)>, Vec<i64>)> {
        let mut docs = Vec::new();
        let mut found = Vec::new();

        match kind {
            EntityKind::Product => {
                for product in self.db.products().get_many(ids).await? {
                    let doc = serde_json::to_value(ProductDocument::from_domain(&product))?;
                    docs.push((product.id.to_string(), doc));
                    found.push(product.id);
                }
            }
            EntityKind::Invoice => {
                let invoices = self.db.invoices().get_many(ids).await?;
                for invoice in invoices {
                    let items = self.db.invoices().items_for_invoice(invoice.id).await?;
                    let doc =
                        serde_json::to_value(InvoiceDocument::from_domain(&invoice, &items))?;
                    docs.push((invoice.id.to_string(), doc));
                    found.push(invoice.id);
                }
            }
        }

        Ok((docs, found))
    }

    fn collection_for(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Product => &self.config.remote.products_collection,
            EntityKind::Invoice => &self.config.remote.invoices_collection,
        }
    }

    // =========================================================================
    // Pull
    // =========================================================================

    /// Reconciles the full remote collections into the local store.
    ///
    /// Products merge under last-write-wins on `updated_at`; a tie favors
    /// the remote copy, so two stores comparing equal clocks converge on the
    /// same bytes. Invoices are append-only: every remote invoice is
    /// upserted whole (items replaced, never duplicated). A document that
    /// fails to decode is skipped and counted, never fatal to the cycle.
    pub async fn pull_remote(&self) -> SyncResult<PullReport> {
        let mut report = PullReport::default();

        self.pull_products(&mut report).await?;
        self.pull_invoices(&mut report).await?;

        info!(
            adopted = report.products_adopted,
            updated = report.products_updated,
            pushed_back = report.products_pushed_back,
            invoices = report.invoices_adopted,
            skipped = report.skipped,
            "Pull cycle complete"
        );

        Ok(report)
    }

    async fn pull_products(&self, report: &mut PullReport) -> SyncResult<()> {
        let collection = self.config.remote.products_collection.clone();
        let remote_docs = self.remote.list_all(&collection).await?;
        let products = self.db.products();

        // Local copies that beat their remote counterpart; pushed back in
        // one batch at the end of the scan.
        let mut push_back: Vec<Product> = Vec::new();

        for (key, value) in remote_docs {
            // One corrupt document must not stop the cycle for every other
            // store; skip it and leave the diagnosis in the log.
            let remote: Product = match documents::decode::<ProductDocument>(&key, value) {
                Ok(doc) => doc.into_domain(),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping malformed remote product");
                    report.skipped += 1;
                    continue;
                }
            };

            // Primary match by id, fallback by barcode - the same physical
            // product may have been created independently on two tills.
            let local = match products.get_by_id(remote.id).await? {
                Some(found) => Some(found),
                None => products.get_by_barcode(&remote.barcode).await?,
            };

            match local {
                None => {
                    products.insert_with_id(&remote).await?;
                    report.products_adopted += 1;
                }
                Some(local) if remote.updated_at >= local.updated_at => {
                    // Remote wins; on a barcode match the remote fields land
                    // on the existing local row, the local id is kept.
                    let winner = Product {
                        id: local.id,
                        ..remote
                    };
                    products.apply_remote(&winner).await?;
                    report.products_updated += 1;
                }
                Some(local) => {
                    debug!(product_id = local.id, "Local copy newer, scheduling push-back");
                    push_back.push(local);
                }
            }
        }

        if !push_back.is_empty() {
            let ids: Vec<i64> = push_back.iter().map(|p| p.id).collect();
            let mut docs = Vec::with_capacity(push_back.len());
            for product in &push_back {
                docs.push((
                    product.id.to_string(),
                    serde_json::to_value(ProductDocument::from_domain(product))?,
                ));
            }

            if let Err(e) = self.remote.batch_upsert(&collection, docs).await {
                // Don't lose the local-wins outcome: mark the products
                // pending so the next push cycle retries.
                warn!(count = ids.len(), error = %e, "Push-back failed, queueing markers");
                for id in &ids {
                    self.db.outbox().upsert(EntityKind::Product, *id).await?;
                }
                return Err(e);
            }

            report.products_pushed_back = ids.len();
        }

        Ok(())
    }

    async fn pull_invoices(&self, report: &mut PullReport) -> SyncResult<()> {
        let collection = self.config.remote.invoices_collection.clone();
        let remote_docs = self.remote.list_all(&collection).await?;
        let invoices = self.db.invoices();

        for (key, value) in remote_docs {
            let doc: InvoiceDocument = match documents::decode(&key, value) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping malformed remote invoice");
                    report.skipped += 1;
                    continue;
                }
            };
            let known = invoices.get_by_id(doc.id).await?.is_some();

            let (invoice, items) = doc.into_domain();
            invoices.upsert_from_remote(&invoice, &items).await?;

            if !known {
                report.invoices_adopted += 1;
            }
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemoteStore;
    use almacen_core::{DraftItem, InvoiceDraft};
    use almacen_db::DbConfig;
    use chrono::{Duration, Utc};
    use serde_json::json;

    async fn engine_with_store() -> (SyncEngine, Arc<InMemoryRemoteStore>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Arc::new(InMemoryRemoteStore::new());
        let engine = SyncEngine::new(db, remote.clone(), SyncConfig::default());
        (engine, remote)
    }

    async fn seed_product(engine: &SyncEngine, code: &str, barcode: &str, quantity: i64) -> i64 {
        engine
            .db
            .products()
            .insert(&Product {
                id: 0,
                code: code.into(),
                barcode: barcode.into(),
                name: format!("Product {code}"),
                description: None,
                sale_price_cents: 1_000,
                purchase_price_cents: 600,
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

    fn draft_for(product_id: i64, quantity: i64) -> InvoiceDraft {
        InvoiceDraft {
            items: vec![DraftItem {
                product_id,
                product_name: "Product".into(),
                quantity,
                unit_price_cents: 1_000,
            }],
            customer_id: None,
            customer_name: None,
            subtotal_cents: quantity * 1_000,
            tax_cents: 0,
            discount_bps: 0,
            discount_cents: 0,
            surcharge_bps: 0,
            surcharge_cents: 0,
            total_cents: quantity * 1_000,
            payment_method: "CASH".into(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn push_drains_outbox_and_populates_remote() {
        let (engine, remote) = engine_with_store().await;
        let product_id = seed_product(&engine, "P-001", "779000000001", 10).await;

        let receipt = engine
            .db
            .checkout()
            .confirm_invoice(&draft_for(product_id, 3))
            .await
            .unwrap();

        let report = engine.push_pending().await.unwrap();
        assert_eq!(report.products_pushed, 1);
        assert_eq!(report.invoices_pushed, 1);

        // Outbox drained, remote has both documents.
        assert_eq!(engine.db.outbox().count_pending().await.unwrap(), 0);
        let product_doc = remote
            .get("products", &product_id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product_doc["quantity"], 7);
        let invoice_doc = remote
            .get("invoices", &receipt.invoice_id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invoice_doc["number"], receipt.invoice_number);
    }

    #[tokio::test]
    async fn second_push_is_a_noop() {
        let (engine, _remote) = engine_with_store().await;
        let product_id = seed_product(&engine, "P-001", "779000000001", 10).await;
        engine
            .db
            .checkout()
            .confirm_invoice(&draft_for(product_id, 1))
            .await
            .unwrap();

        engine.push_pending().await.unwrap();
        let report = engine.push_pending().await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn failed_push_keeps_markers_and_records_attempt() {
        let (engine, remote) = engine_with_store().await;
        let product_id = seed_product(&engine, "P-001", "779000000001", 10).await;
        engine
            .db
            .checkout()
            .confirm_invoice(&draft_for(product_id, 2))
            .await
            .unwrap();

        remote.set_offline(true);
        let err = engine.push_pending().await.unwrap_err();
        assert!(err.is_retryable());

        // Sale untouched, markers still pending with the failure recorded.
        assert_eq!(engine.db.invoices().count().await.unwrap(), 1);
        assert_eq!(engine.db.outbox().count_pending().await.unwrap(), 2);
        let markers = engine
            .db
            .outbox()
            .get_by_kind(EntityKind::Product)
            .await
            .unwrap();
        assert_eq!(markers[0].attempts, 1);
        assert!(markers[0].last_error.is_some());

        // Connectivity back: the retry drains everything.
        remote.set_offline(false);
        engine.push_pending().await.unwrap();
        assert_eq!(engine.db.outbox().count_pending().await.unwrap(), 0);
        assert_eq!(remote.len("products").await, 1);
    }

    #[tokio::test]
    async fn marker_for_deleted_row_is_pruned_without_remote_contact() {
        let (engine, remote) = engine_with_store().await;
        let product_id = seed_product(&engine, "P-001", "779000000001", 10).await;

        engine
            .db
            .outbox()
            .upsert(EntityKind::Product, product_id)
            .await
            .unwrap();
        engine.db.products().delete(product_id).await.unwrap();

        // Even with the remote unreachable, pruning succeeds.
        remote.set_offline(true);
        let report = engine.push_pending().await.unwrap();
        assert_eq!(report.pruned, 1);
        assert_eq!(engine.db.outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pull_adopts_unknown_products_and_invoices() {
        let (engine, remote) = engine_with_store().await;

        remote
            .seed(
                "products",
                "500",
                json!({
                    "id": 500,
                    "code": "P-500",
                    "barcode": "779000000500",
                    "name": "Fideos",
                    "sale_price_cents": 700,
                    "purchase_price_cents": 400,
                    "quantity": 20,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await;
        remote
            .seed(
                "invoices",
                "300",
                json!({
                    "id": 300,
                    "number": "F-000300",
                    "date_millis": 1_756_000_000_000i64,
                    "subtotal_cents": 700,
                    "tax_cents": 0,
                    "discount_bps": 0,
                    "discount_cents": 0,
                    "surcharge_bps": 0,
                    "surcharge_cents": 0,
                    "total_cents": 700,
                    "payment_method": "CARD",
                    "items": [{
                        "product_id": 500,
                        "product_name": "Fideos",
                        "quantity": 1,
                        "unit_price_cents": 700,
                        "line_total_cents": 700,
                    }],
                }),
            )
            .await;

        let report = engine.pull_remote().await.unwrap();
        assert_eq!(report.products_adopted, 1);
        assert_eq!(report.invoices_adopted, 1);

        let product = engine.db.products().get_by_id(500).await.unwrap().unwrap();
        assert_eq!(product.quantity, 20);

        // Adopting a remote invoice must NOT touch local stock: the till
        // that made the sale already decremented its own copy.
        let invoice = engine.db.invoices().get_by_id(300).await.unwrap().unwrap();
        assert_eq!(invoice.total_cents, 700);
        let product_after = engine.db.products().get_by_id(500).await.unwrap().unwrap();
        assert_eq!(product_after.quantity, 20);

        // Nothing adopted from a pull becomes pending (no echo).
        assert_eq!(engine.db.outbox().count_pending().await.unwrap(), 0);

        // A second pull re-upserts but adopts nothing new and never
        // duplicates line items.
        let report = engine.pull_remote().await.unwrap();
        assert_eq!(report.invoices_adopted, 0);
        assert_eq!(engine.db.invoices().items_for_invoice(300).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pull_applies_newer_remote_copy() {
        let (engine, remote) = engine_with_store().await;
        let product_id = seed_product(&engine, "P-001", "779000000001", 10).await;

        let future = Utc::now() + Duration::hours(1);
        remote
            .seed(
                "products",
                &product_id.to_string(),
                json!({
                    "id": product_id,
                    "code": "P-001",
                    "barcode": "779000000001",
                    "name": "Renamed Elsewhere",
                    "sale_price_cents": 1_200,
                    "purchase_price_cents": 600,
                    "quantity": 4,
                    "updated_at": future.to_rfc3339(),
                }),
            )
            .await;

        let report = engine.pull_remote().await.unwrap();
        assert_eq!(report.products_updated, 1);

        let product = engine.db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.name, "Renamed Elsewhere");
        assert_eq!(product.quantity, 4); // remote wins quantity too
    }

    #[tokio::test]
    async fn malformed_remote_document_is_skipped_not_fatal() {
        let (engine, remote) = engine_with_store().await;

        remote
            .seed("products", "bad", json!({"id": "not-a-number"}))
            .await;
        remote
            .seed(
                "products",
                "500",
                json!({
                    "id": 500,
                    "code": "P-500",
                    "barcode": "779000000500",
                    "name": "Fideos",
                    "sale_price_cents": 700,
                    "purchase_price_cents": 400,
                    "quantity": 20,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await;

        // The corrupt document is counted and skipped; the good one lands.
        let report = engine.pull_remote().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.products_adopted, 1);
        assert!(engine.db.products().get_by_id(500).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lww_tie_applies_remote_copy() {
        let (engine, remote) = engine_with_store().await;

        // Local and remote carry the exact same clock; `>=` must pick the
        // remote copy so equal-clock stores converge on the same bytes.
        let stamp = Utc::now();
        engine
            .db
            .products()
            .insert_with_id(&Product {
                id: 77,
                code: "P-077".into(),
                barcode: "779000000077".into(),
                name: "Local Name".into(),
                description: None,
                sale_price_cents: 1_000,
                purchase_price_cents: 600,
                quantity: 10,
                image_url: None,
                category_id: None,
                category_name: None,
                provider_id: None,
                provider_name: None,
                updated_at: stamp,
            })
            .await
            .unwrap();
        remote
            .seed(
                "products",
                "77",
                json!({
                    "id": 77,
                    "code": "P-077",
                    "barcode": "779000000077",
                    "name": "Remote Name",
                    "sale_price_cents": 1_000,
                    "purchase_price_cents": 600,
                    "quantity": 8,
                    "updated_at": stamp.to_rfc3339(),
                }),
            )
            .await;

        let report = engine.pull_remote().await.unwrap();
        assert_eq!(report.products_updated, 1);
        assert_eq!(report.products_pushed_back, 0);

        let product = engine.db.products().get_by_id(77).await.unwrap().unwrap();
        assert_eq!(product.name, "Remote Name");
        assert_eq!(product.quantity, 8);
    }

    #[tokio::test]
    async fn pull_pushes_back_newer_local_copy() {
        let (engine, remote) = engine_with_store().await;
        let product_id = seed_product(&engine, "P-001", "779000000001", 10).await;

        let past = Utc::now() - Duration::hours(1);
        remote
            .seed(
                "products",
                &product_id.to_string(),
                json!({
                    "id": product_id,
                    "code": "P-001",
                    "barcode": "779000000001",
                    "name": "Stale Remote",
                    "sale_price_cents": 900,
                    "purchase_price_cents": 600,
                    "quantity": 99,
                    "updated_at": past.to_rfc3339(),
                }),
            )
            .await;

        let report = engine.pull_remote().await.unwrap();
        assert_eq!(report.products_pushed_back, 1);

        // Local untouched, remote overwritten with the local copy.
        let product = engine.db.products().get_by_id(product_id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 10);
        let doc = remote
            .get("products", &product_id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["quantity"], 10);
        assert_eq!(doc["name"], "Product P-001");
    }

    #[tokio::test]
    async fn pull_matches_by_barcode_when_ids_differ() {
        let (engine, remote) = engine_with_store().await;
        let local_id = seed_product(&engine, "P-001", "779000000001", 10).await;

        // Same barcode, created independently on another till under id 888.
        let future = Utc::now() + Duration::hours(1);
        remote
            .seed(
                "products",
                "888",
                json!({
                    "id": 888,
                    "code": "P-001-B",
                    "barcode": "779000000001",
                    "name": "Same Physical Product",
                    "sale_price_cents": 1_100,
                    "purchase_price_cents": 600,
                    "quantity": 6,
                    "updated_at": future.to_rfc3339(),
                }),
            )
            .await;

        let report = engine.pull_remote().await.unwrap();
        assert_eq!(report.products_updated, 1);
        assert_eq!(report.products_adopted, 0);

        // Remote fields applied onto the existing local row, local id kept.
        let product = engine.db.products().get_by_id(local_id).await.unwrap().unwrap();
        assert_eq!(product.name, "Same Physical Product");
        assert!(engine.db.products().get_by_id(888).await.unwrap().is_none());
    }
}
