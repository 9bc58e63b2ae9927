//! # Domain Types
//!
//! Core domain types used throughout Almacen POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐   ┌─────────────────┐       │
//! │  │   Product     │   │    Invoice    │   │  InvoiceItem    │       │
//! │  │ ───────────── │   │ ───────────── │   │ ─────────────── │       │
//! │  │ id (i64)      │   │ id (i64)      │   │ invoice_id (FK) │       │
//! │  │ code, barcode │   │ date_millis   │   │ product_id      │       │
//! │  │ quantity      │   │ total_cents   │   │ line_total      │       │
//! │  │ updated_at    │   │ payment       │   │ (price snapshot)│       │
//! │  └───────────────┘   └───────────────┘   └─────────────────┘       │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐                             │
//! │  │ StockMovement │   │  OutboxEntry  │                             │
//! │  │ ───────────── │   │ ───────────── │                             │
//! │  │ signed delta  │   │ (kind, id)    │                             │
//! │  │ reason tag    │   │ attempts      │                             │
//! │  │ append-only   │   │ last_error    │                             │
//! │  └───────────────┘   └───────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity carries an integer id assigned by the local store.
//! An id of 0 on insert means "let the store assign one". Remote documents
//! are keyed by the same id rendered as a decimal string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// `quantity` is never negative; all mutation goes through the stock ledger's
/// conditional statement, never a read-modify-write in application code.
/// `updated_at` drives last-write-wins reconciliation with the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Store-assigned identifier (0 = not yet persisted).
    pub id: i64,

    /// Internal product code - business identifier, unique.
    pub code: String,

    /// Barcode (EAN-13, UPC-A, etc.), unique. Also used as a fallback match
    /// key when reconciling remote products that lack a local id match.
    pub barcode: String,

    /// Display name shown on receipts.
    pub name: String,

    /// Optional long description.
    pub description: Option<String>,

    /// Sale price in cents.
    pub sale_price_cents: i64,

    /// Purchase (cost) price in cents.
    pub purchase_price_cents: i64,

    /// Current stock on hand. Invariant: >= 0.
    pub quantity: i64,

    /// Optional product image URL.
    pub image_url: Option<String>,

    /// Category reference (denormalized name snapshot alongside).
    pub category_id: Option<i64>,
    pub category_name: Option<String>,

    /// Provider reference (denormalized name snapshot alongside).
    pub provider_id: Option<i64>,
    pub provider_name: Option<String>,

    /// Last local modification; the last-write-wins clock.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Invoice
// =============================================================================

/// A confirmed sale. Created exactly once per confirmation and immutable
/// thereafter - there is no update path for invoices in this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Store-assigned identifier (0 = not yet persisted).
    pub id: i64,

    /// Sale timestamp in Unix milliseconds.
    pub date_millis: i64,

    /// Optional customer reference.
    pub customer_id: Option<i64>,

    /// Customer display name snapshot resolved at confirmation time.
    pub customer_name: Option<String>,

    pub subtotal_cents: i64,
    pub tax_cents: i64,

    /// Discount as basis points plus the resulting amount.
    pub discount_bps: i64,
    pub discount_cents: i64,

    /// Surcharge as basis points plus the resulting amount.
    pub surcharge_bps: i64,
    pub surcharge_cents: i64,

    pub total_cents: i64,

    /// Payment method tag (e.g. "CASH", "CARD").
    pub payment_method: String,

    pub notes: Option<String>,
}

impl Invoice {
    /// Derived display number: `F-` plus the id zero-padded to six digits.
    ///
    /// Cosmetic only - computed on demand, never stored independently.
    pub fn number(&self) -> String {
        invoice_number(self.id)
    }
}

/// Formats the display number for an invoice id (`F-000042`).
pub fn invoice_number(id: i64) -> String {
    format!("F-{:06}", id)
}

/// An invoice line item. Price and name are copied from the product at sale
/// time (snapshot pattern), so later product edits never rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Why a stock movement happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementReason {
    /// Decrement from a confirmed sale.
    Sale,
    /// Increment from goods-in.
    Restock,
    /// Manual correction.
    Adjust,
}

impl MovementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::Sale => "SALE",
            MovementReason::Restock => "RESTOCK",
            MovementReason::Adjust => "ADJUST",
        }
    }
}

impl fmt::Display for MovementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementReason {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SALE" => Ok(MovementReason::Sale),
            "RESTOCK" => Ok(MovementReason::Restock),
            "ADJUST" => Ok(MovementReason::Adjust),
            other => Err(CoreError::UnknownTag {
                kind: "movement reason",
                value: other.to_string(),
            }),
        }
    }
}

/// Append-only audit row for a stock change. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: i64,
    pub product_id: i64,
    /// Signed change: negative for sales, positive for restocking.
    pub delta: i64,
    pub reason: MovementReason,
    /// Optional operator who triggered the change.
    pub operator: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Outbox
// =============================================================================

/// Entity families tracked by the sync outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Product,
    Invoice,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "PRODUCT",
            EntityKind::Invoice => "INVOICE",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRODUCT" => Ok(EntityKind::Product),
            "INVOICE" => Ok(EntityKind::Invoice),
            other => Err(CoreError::UnknownTag {
                kind: "entity kind",
                value: other.to_string(),
            }),
        }
    }
}

/// A pending-sync marker: "this entity has local changes not yet confirmed
/// present in the remote store".
///
/// Exists while and only while that holds: removed on successful push,
/// pruned when the underlying local row no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: i64,
    pub entity_kind: EntityKind,
    pub entity_id: i64,
    pub created_at: DateTime<Utc>,
    /// Failed push attempts so far.
    pub attempts: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl OutboxEntry {
    /// A fresh marker for an entity, with zeroed retry bookkeeping.
    pub fn new(entity_kind: EntityKind, entity_id: i64, created_at: DateTime<Utc>) -> Self {
        OutboxEntry {
            id: 0,
            entity_kind,
            entity_id,
            created_at,
            attempts: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Minimal customer record; only the display name matters to this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Invoice Draft
// =============================================================================

/// One line of an invoice draft as assembled by the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftItem {
    pub product_id: i64,
    /// Name snapshot taken when the line was added.
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl DraftItem {
    /// Recomputed line total. The coordinator persists this value, never a
    /// total supplied by the caller.
    pub fn line_total_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }
}

/// Everything needed to confirm a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub items: Vec<DraftItem>,
    pub customer_id: Option<i64>,
    /// Explicit display name; wins over a lookup by `customer_id`.
    pub customer_name: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_bps: i64,
    pub discount_cents: i64,
    pub surcharge_bps: i64,
    pub surcharge_cents: i64,
    pub total_cents: i64,
    pub payment_method: String,
    pub notes: Option<String>,
}

/// What the caller gets back from a confirmed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceReceipt {
    pub invoice_id: i64,
    /// Derived display number (`F-000042`).
    pub invoice_number: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_is_zero_padded() {
        assert_eq!(invoice_number(42), "F-000042");
        assert_eq!(invoice_number(1_234_567), "F-1234567");
    }

    #[test]
    fn movement_reason_round_trips() {
        for reason in [
            MovementReason::Sale,
            MovementReason::Restock,
            MovementReason::Adjust,
        ] {
            assert_eq!(reason.as_str().parse::<MovementReason>().unwrap(), reason);
        }
        assert!("REFUND".parse::<MovementReason>().is_err());
    }

    #[test]
    fn entity_kind_round_trips() {
        assert_eq!("PRODUCT".parse::<EntityKind>().unwrap(), EntityKind::Product);
        assert_eq!("INVOICE".parse::<EntityKind>().unwrap(), EntityKind::Invoice);
        assert!("SALE".parse::<EntityKind>().is_err());
    }

    #[test]
    fn draft_item_recomputes_line_total() {
        let item = DraftItem {
            product_id: 1,
            product_name: "Yerba 1kg".into(),
            quantity: 3,
            unit_price_cents: 450,
        };
        assert_eq!(item.line_total_cents(), 1350);
    }
}
