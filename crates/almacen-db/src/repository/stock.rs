//! # Stock Repository
//!
//! The stock ledger: every change to a product's quantity happens here (or
//! through the checkout coordinator, which borrows this module's helpers)
//! and leaves an append-only `stock_movements` audit row.
//!
//! ## The Conditional Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  WRONG (read-then-write race):                                      │
//! │                                                                     │
//! │    let qty = SELECT quantity FROM products WHERE id = ?             │
//! │    if qty >= requested { UPDATE products SET quantity = qty - n }   │
//! │    └── two concurrent sales can both pass the check ──► oversell    │
//! │                                                                     │
//! │  RIGHT (atomic check-and-decrement):                                │
//! │                                                                     │
//! │    UPDATE products SET quantity = quantity - ?                      │
//! │    WHERE id = ? AND quantity >= ?                                   │
//! │    └── rows_affected == 0 means "not found OR insufficient";        │
//! │        a follow-up existence probe disambiguates                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::outbox;
use almacen_core::{EntityKind, MovementReason, StockMovement, ValidationError, MAX_ITEM_QUANTITY};

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================
//
// These run against any executor so the checkout coordinator can call them
// inside its own transaction. The repository methods below wrap them in
// single-purpose transactions.

/// Atomically decrements stock if at least `quantity` units are on hand.
///
/// Returns `true` if the decrement applied. `false` means the product is
/// missing OR its stock is short; callers inside a transaction should probe
/// with [`product_exists`] to tell the two apart.
pub(crate) async fn decrement_if_available<'e, E>(
    executor: E,
    product_id: i64,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE products SET
            quantity = quantity - ?2,
            updated_at = ?3
        WHERE id = ?1 AND quantity >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Unconditionally adds `quantity` units of stock.
///
/// Returns `false` if the product does not exist.
pub(crate) async fn increment_stock<'e, E>(
    executor: E,
    product_id: i64,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE products SET
            quantity = quantity + ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Checks whether a product row exists.
pub(crate) async fn product_exists<'e, E>(executor: E, product_id: i64) -> DbResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = ?1)")
        .bind(product_id)
        .fetch_one(executor)
        .await?;

    Ok(exists != 0)
}

/// Appends one audit row to the stock ledger.
pub(crate) async fn insert_movement<'e, E>(
    executor: E,
    product_id: i64,
    delta: i64,
    reason: MovementReason,
    operator: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO stock_movements (product_id, delta, reason, operator, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(product_id)
    .bind(delta)
    .bind(reason.as_str())
    .bind(operator)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: i64,
    product_id: i64,
    delta: i64,
    reason: String,
    operator: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = DbError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let reason = row
            .reason
            .parse::<MovementReason>()
            .map_err(|e| DbError::Internal(e.to_string()))?;

        Ok(StockMovement {
            id: row.id,
            product_id: row.product_id,
            delta: row.delta,
            reason,
            operator: row.operator,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for stock operations outside the sale path.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Records goods-in: adds stock, appends a RESTOCK movement, and marks
    /// the product pending sync - all in one transaction.
    ///
    /// Returns the new quantity on hand.
    pub async fn restock(
        &self,
        product_id: i64,
        quantity: i64,
        operator: Option<&str>,
    ) -> DbResult<i64> {
        if quantity <= 0 {
            return Err(DbError::Validation(ValidationError::NonPositiveQuantity {
                product_id,
                quantity,
            }));
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(DbError::Validation(ValidationError::QuantityTooLarge {
                product_id,
                quantity,
                max: MAX_ITEM_QUANTITY,
            }));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !increment_stock(&mut *tx, product_id, quantity, now).await? {
            return Err(DbError::not_found("Product", product_id));
        }

        insert_movement(
            &mut *tx,
            product_id,
            quantity,
            MovementReason::Restock,
            operator,
            now,
        )
        .await?;

        outbox::upsert_entry(&mut *tx, EntityKind::Product, product_id, now).await?;

        let new_quantity: i64 = sqlx::query_scalar("SELECT quantity FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(product_id, quantity, new_quantity, "Stock restocked");

        Ok(new_quantity)
    }

    /// Records a manual correction with a signed delta.
    ///
    /// Negative deltas use the conditional decrement, so an adjustment can
    /// never drive stock below zero. A zero delta is rejected: it would
    /// commit a meaningless audit row and a pointless sync marker.
    pub async fn adjust(
        &self,
        product_id: i64,
        delta: i64,
        operator: Option<&str>,
    ) -> DbResult<i64> {
        if delta == 0 {
            return Err(DbError::Validation(ValidationError::NonPositiveQuantity {
                product_id,
                quantity: 0,
            }));
        }
        // unsigned_abs: i64::MIN has no i64 negation.
        if delta.unsigned_abs() > MAX_ITEM_QUANTITY as u64 {
            return Err(DbError::Validation(ValidationError::QuantityTooLarge {
                product_id,
                quantity: delta,
                max: MAX_ITEM_QUANTITY,
            }));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let applied = if delta >= 0 {
            increment_stock(&mut *tx, product_id, delta, now).await?
        } else {
            decrement_if_available(&mut *tx, product_id, -delta, now).await?
        };

        if !applied {
            if product_exists(&mut *tx, product_id).await? {
                return Err(DbError::InsufficientStock {
                    product_id,
                    requested: -delta,
                });
            }
            return Err(DbError::not_found("Product", product_id));
        }

        insert_movement(
            &mut *tx,
            product_id,
            delta,
            MovementReason::Adjust,
            operator,
            now,
        )
        .await?;

        outbox::upsert_entry(&mut *tx, EntityKind::Product, product_id, now).await?;

        let new_quantity: i64 = sqlx::query_scalar("SELECT quantity FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(product_id, delta, new_quantity, "Stock adjusted");

        Ok(new_quantity)
    }

    /// Lists a product's movement history, newest first.
    pub async fn movements_for_product(&self, product_id: i64) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(
            r#"
            SELECT id, product_id, delta, reason, operator, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StockMovement::try_from).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use crate::DbError;
    use almacen_core::{MovementReason, Product};
    use chrono::Utc;

    async fn seeded_db(quantity: i64) -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
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
            .unwrap();
        let id = product.id;
        (db, id)
    }

    #[tokio::test]
    async fn restock_adds_stock_and_records_movement() {
        let (db, id) = seeded_db(5).await;

        let new_qty = db.stock().restock(id, 7, Some("ana")).await.unwrap();
        assert_eq!(new_qty, 12);

        let movements = db.stock().movements_for_product(id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].delta, 7);
        assert_eq!(movements[0].reason, MovementReason::Restock);
        assert_eq!(movements[0].operator.as_deref(), Some("ana"));
    }

    #[tokio::test]
    async fn restock_marks_product_pending_sync() {
        let (db, id) = seeded_db(5).await;

        db.stock().restock(id, 1, None).await.unwrap();

        assert_eq!(db.outbox().count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn negative_adjust_cannot_go_below_zero() {
        let (db, id) = seeded_db(3).await;

        let err = db.stock().adjust(id, -5, None).await.unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { requested: 5, .. }));

        // Stock untouched, no movement recorded.
        let product = db.products().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 3);
        assert!(db.stock().movements_for_product(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn adjust_rejects_zero_and_extreme_deltas() {
        let (db, id) = seeded_db(3).await;

        for delta in [0, i64::MIN, i64::MAX, almacen_core::MAX_ITEM_QUANTITY + 1] {
            let err = db.stock().adjust(id, delta, None).await.unwrap_err();
            assert!(matches!(err, DbError::Validation(_)), "delta {delta}");
        }

        // Nothing committed: no movement, no marker, stock untouched.
        assert!(db.stock().movements_for_product(id).await.unwrap().is_empty());
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
        let product = db.products().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 3);
    }

    #[tokio::test]
    async fn restock_rejects_oversized_quantity() {
        let (db, id) = seeded_db(3).await;

        let err = db
            .stock()
            .restock(id, almacen_core::MAX_ITEM_QUANTITY + 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn restock_unknown_product_is_not_found() {
        let (db, _) = seeded_db(3).await;

        let err = db.stock().restock(9999, 1, None).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
