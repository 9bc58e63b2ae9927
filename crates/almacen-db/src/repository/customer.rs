//! # Customer Repository
//!
//! Minimal customer directory. The checkout coordinator only ever needs the
//! display name, resolved inside its transaction via [`name_for_customer`].

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use almacen_core::Customer;

/// Resolves a customer's display name inside a caller-owned transaction.
///
/// Returns `None` for an unknown id - an invoice with a dangling customer
/// reference is still a valid sale, it just loses the name snapshot.
pub(crate) async fn name_for_customer<'e, E>(
    executor: E,
    customer_id: i64,
) -> DbResult<Option<String>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let name: Option<String> = sqlx::query_scalar("SELECT name FROM customers WHERE id = ?1")
        .bind(customer_id)
        .fetch_optional(executor)
        .await?;

    Ok(name)
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    name: String,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

/// Repository for customer operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a new customer; the store assigns the id.
    pub async fn insert(&self, name: &str, phone: Option<&str>) -> DbResult<Customer> {
        let now = Utc::now();

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO customers (name, phone, created_at) VALUES (?1, ?2, ?3) RETURNING id",
        )
        .bind(name)
        .bind(phone)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(customer_id = id, "Customer inserted");

        Ok(Customer {
            id,
            name: name.to_string(),
            phone: phone.map(str::to_string),
            created_at: now,
        })
    }

    /// Gets a customer by id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Customer>> {
        let row: Option<CustomerRow> =
            sqlx::query_as("SELECT id, name, phone, created_at FROM customers WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Customer::from))
    }

    /// Lists all customers ordered by name.
    pub async fn list_all(&self) -> DbResult<Vec<Customer>> {
        let rows: Vec<CustomerRow> =
            sqlx::query_as("SELECT id, name, phone, created_at FROM customers ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }
}
