//! # almacen-sync: Synchronization Engine for Almacen POS
//!
//! Keeps each till's local SQLite store in step with a shared remote
//! document store, without ever letting the network into the sale path.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Almacen Sync Flow                             │
//! │                                                                     │
//! │  Till A                                  Till B                     │
//! │  ┌──────────────┐                        ┌──────────────┐           │
//! │  │ SalesService │                        │ SalesService │           │
//! │  │      │       │                        │      │       │           │
//! │  │      ▼       │                        │      ▼       │           │
//! │  │ SQLite+outbox│                        │ SQLite+outbox│           │
//! │  └──────┬───────┘                        └──────┬───────┘           │
//! │         │ push_pending()        push_pending() │                   │
//! │         ▼                                      ▼                   │
//! │  ┌───────────────────────────────────────────────────────┐         │
//! │  │              Remote Document Store                    │         │
//! │  │        "products" / "invoices" collections            │         │
//! │  └───────────────────────────────────────────────────────┘         │
//! │         ▲                                      ▲                   │
//! │         └── pull_remote(): last-write-wins ────┘                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`sales`] - The service facade: confirm locally, then push
//! - [`engine`] - Push/pull cycles over the outbox
//! - [`remote`] - The [`RemoteStore`] seam + in-memory implementation
//! - [`documents`] - JSON wire shapes for products and invoices
//! - [`config`] - TOML/env configuration
//! - [`error`] - Sync error types

pub mod config;
pub mod documents;
pub mod engine;
pub mod error;
pub mod remote;
pub mod sales;

pub use config::SyncConfig;
pub use documents::{InvoiceDocument, InvoiceItemDocument, ProductDocument};
pub use engine::{PullReport, PushReport, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use remote::{InMemoryRemoteStore, RemoteStore};
pub use sales::SalesService;
