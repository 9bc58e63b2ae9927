//! # almacen-core: Pure Domain Logic
//!
//! Core types and rules for the Almacen POS system. This crate performs no
//! I/O at all: the database layer (`almacen-db`) and the sync engine
//! (`almacen-sync`) both build on the types defined here.
//!
//! ## Module Organization
//! - [`types`] - Domain entities (Product, Invoice, StockMovement, outbox)
//! - [`validation`] - Draft validation before a transaction is opened
//! - [`error`] - Domain error types

pub mod error;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::{
    invoice_number, Customer, DraftItem, EntityKind, Invoice, InvoiceDraft, InvoiceItem,
    InvoiceReceipt, MovementReason, OutboxEntry, Product, StockMovement,
};
pub use validation::{validate_draft, ValidationResult};

/// Maximum number of line items accepted on a single invoice draft.
pub const MAX_DRAFT_ITEMS: usize = 500;

/// Maximum quantity accepted for a single line item.
pub const MAX_ITEM_QUANTITY: i64 = 100_000;
