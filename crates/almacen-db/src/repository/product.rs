//! # Product Repository
//!
//! CRUD for the product catalog.
//!
//! ## Stock Changes Do Not Live Here
//! `update()` deliberately never touches `quantity`. All stock mutation goes
//! through [`crate::repository::stock::StockRepository`] so that every change
//! leaves an audit row and sales use the conditional decrement. The one
//! exception is `apply_remote()`, which overwrites the full row (quantity
//! included) when the remote copy wins reconciliation.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use almacen_core::Product;

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw database row; converted to the domain type at the repository boundary.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    code: String,
    barcode: String,
    name: String,
    description: Option<String>,
    sale_price_cents: i64,
    purchase_price_cents: i64,
    quantity: i64,
    image_url: Option<String>,
    category_id: Option<i64>,
    category_name: Option<String>,
    provider_id: Option<i64>,
    provider_name: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            code: row.code,
            barcode: row.barcode,
            name: row.name,
            description: row.description,
            sale_price_cents: row.sale_price_cents,
            purchase_price_cents: row.purchase_price_cents,
            quantity: row.quantity,
            image_url: row.image_url,
            category_id: row.category_id,
            category_name: row.category_name,
            provider_id: row.provider_id,
            provider_name: row.provider_name,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = "id, code, barcode, name, description, \
     sale_price_cents, purchase_price_cents, quantity, image_url, \
     category_id, category_name, provider_id, provider_name, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for product operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product; the store assigns the id.
    ///
    /// Returns the product with its assigned id and fresh `updated_at`.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        let now = Utc::now();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (
                code, barcode, name, description,
                sale_price_cents, purchase_price_cents, quantity, image_url,
                category_id, category_name, provider_id, provider_name,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING id
            "#,
        )
        .bind(&product.code)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.sale_price_cents)
        .bind(product.purchase_price_cents)
        .bind(product.quantity)
        .bind(&product.image_url)
        .bind(product.category_id)
        .bind(&product.category_name)
        .bind(product.provider_id)
        .bind(&product.provider_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(product_id = id, code = %product.code, "Product inserted");

        Ok(Product {
            id,
            updated_at: now,
            ..product.clone()
        })
    }

    /// Inserts a product under an explicit id.
    ///
    /// Used when adopting a remote product that has no local counterpart:
    /// the remote id becomes the local id so both stores agree on identity.
    pub async fn insert_with_id(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, barcode, name, description,
                sale_price_cents, purchase_price_cents, quantity, image_url,
                category_id, category_name, provider_id, provider_name,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(product.id)
        .bind(&product.code)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.sale_price_cents)
        .bind(product.purchase_price_cents)
        .bind(product.quantity)
        .bind(&product.image_url)
        .bind(product.category_id)
        .bind(&product.category_name)
        .bind(product.provider_id)
        .bind(&product.provider_name)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(product_id = product.id, "Product adopted from remote");

        Ok(())
    }

    /// Updates a product's catalog fields and bumps `updated_at`.
    ///
    /// Does NOT touch `quantity` - stock changes go through the stock
    /// repository so they always leave a movement row.
    pub async fn update(&self, product: &Product) -> DbResult<Product> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                code = ?2,
                barcode = ?3,
                name = ?4,
                description = ?5,
                sale_price_cents = ?6,
                purchase_price_cents = ?7,
                image_url = ?8,
                category_id = ?9,
                category_name = ?10,
                provider_id = ?11,
                provider_name = ?12,
                updated_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(product.id)
        .bind(&product.code)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.sale_price_cents)
        .bind(product.purchase_price_cents)
        .bind(&product.image_url)
        .bind(product.category_id)
        .bind(&product.category_name)
        .bind(product.provider_id)
        .bind(&product.provider_name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product.id));
        }

        self.get_by_id(product.id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product.id))
    }

    /// Overwrites the full local row with the remote copy, `updated_at`
    /// included. Only the reconciler calls this, and only after deciding the
    /// remote copy wins.
    pub async fn apply_remote(&self, product: &Product) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                code = ?2,
                barcode = ?3,
                name = ?4,
                description = ?5,
                sale_price_cents = ?6,
                purchase_price_cents = ?7,
                quantity = ?8,
                image_url = ?9,
                category_id = ?10,
                category_name = ?11,
                provider_id = ?12,
                provider_name = ?13,
                updated_at = ?14
            WHERE id = ?1
            "#,
        )
        .bind(product.id)
        .bind(&product.code)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.sale_price_cents)
        .bind(product.purchase_price_cents)
        .bind(product.quantity)
        .bind(&product.image_url)
        .bind(product.category_id)
        .bind(&product.category_name)
        .bind(product.provider_id)
        .bind(&product.provider_name)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product.id));
        }

        debug!(product_id = product.id, "Remote product applied locally");

        Ok(())
    }

    /// Gets a product by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM products WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Product::from))
    }

    /// Gets a product by barcode.
    ///
    /// Barcode is the fallback match key during reconciliation: a remote
    /// product with an unknown id may still be the same physical product.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM products WHERE barcode = ?1"
        ))
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Lists all products ordered by name.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM products ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Loads products by id, skipping ids that no longer exist.
    pub async fn get_many(&self, ids: &[i64]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = sqlx::QueryBuilder::<Sqlite>::new(format!(
            "SELECT {SELECT_COLUMNS} FROM products WHERE id IN ("
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows: Vec<ProductRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Deletes a product. Cascades to its stock movements.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(product_id = id, "Product deleted");

        Ok(())
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
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
    use almacen_core::Product;
    use chrono::Utc;

    fn sample(code: &str, barcode: &str) -> Product {
        Product {
            id: 0,
            code: code.into(),
            barcode: barcode.into(),
            name: format!("Product {code}"),
            description: None,
            sale_price_cents: 1_500,
            purchase_price_cents: 900,
            quantity: 10,
            image_url: None,
            category_id: None,
            category_name: None,
            provider_id: None,
            provider_name: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_round_trips() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let inserted = repo.insert(&sample("P-001", "779000000001")).await.unwrap();
        assert!(inserted.id > 0);

        let loaded = repo.get_by_id(inserted.id).await.unwrap().unwrap();
        assert_eq!(loaded, inserted);
    }

    #[tokio::test]
    async fn barcode_lookup_and_uniqueness() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&sample("P-001", "779000000001")).await.unwrap();

        let found = repo.get_by_barcode("779000000001").await.unwrap();
        assert!(found.is_some());
        assert!(repo.get_by_barcode("000000000000").await.unwrap().is_none());

        // Duplicate barcode must be rejected by the schema.
        let dup = repo.insert(&sample("P-002", "779000000001")).await;
        assert!(matches!(dup, Err(crate::DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn update_does_not_touch_quantity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let mut product = repo.insert(&sample("P-001", "779000000001")).await.unwrap();
        product.name = "Renamed".into();
        product.quantity = 999; // must be ignored

        let updated = repo.update(&product).await.unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.quantity, 10);
    }

    #[tokio::test]
    async fn insert_with_id_preserves_remote_identity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let mut product = sample("P-900", "779000000900");
        product.id = 900;

        repo.insert_with_id(&product).await.unwrap();

        let loaded = repo.get_by_id(900).await.unwrap().unwrap();
        assert_eq!(loaded.code, "P-900");
    }
}
