//! # almacen-db: Database Layer for Almacen POS
//!
//! Local persistence for the POS core: SQLite via sqlx, embedded migrations,
//! one repository per entity, and the checkout coordinator that confirms a
//! sale inside a single transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Almacen Data Flow                             │
//! │                                                                     │
//! │  SalesService (almacen-sync)                                        │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                   almacen-db (THIS CRATE)                     │ │
//! │  │                                                               │ │
//! │  │  ┌────────────┐  ┌──────────────┐  ┌───────────────────────┐ │ │
//! │  │  │  Database  │  │ Repositories │  │ CheckoutCoordinator   │ │ │
//! │  │  │ (pool.rs)  │◄─│ product/...  │◄─│ (one transaction per  │ │ │
//! │  │  │            │  │ outbox/stock │  │  confirmed sale)      │ │ │
//! │  │  └────────────┘  └──────────────┘  └───────────────────────┘ │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database file (WAL mode, foreign keys on)                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use almacen_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("almacen.db")).await?;
//! let receipt = db.checkout().confirm_invoice(&draft).await?;
//! ```

pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use checkout::CheckoutCoordinator;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::customer::CustomerRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::outbox::OutboxRepository;
pub use repository::product::ProductRepository;
pub use repository::stock::StockRepository;
