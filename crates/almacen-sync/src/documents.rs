//! # Remote Document Schemas
//!
//! The JSON shapes exchanged with the remote store, kept separate from the
//! domain types so the wire format can evolve without touching them.
//!
//! ## Conventions
//! - Document keys are local ids rendered as decimal strings
//! - `updated_at` is RFC 3339; it is the last-write-wins clock for products
//! - Invoice documents embed their line items: an invoice travels whole
//! - Invoice documents carry the derived display `number` for remote
//!   consumers (dashboards, reports) that never see the local store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use almacen_core::{Invoice, InvoiceItem, Product};

// =============================================================================
// Product Document
// =============================================================================

/// Wire shape of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDocument {
    pub id: i64,
    pub code: String,
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sale_price_cents: i64,
    pub purchase_price_cents: i64,
    pub quantity: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub provider_id: Option<i64>,
    #[serde(default)]
    pub provider_name: Option<String>,
    /// Last-write-wins clock, RFC 3339.
    pub updated_at: DateTime<Utc>,
}

impl ProductDocument {
    /// Builds the wire shape from a local row.
    pub fn from_domain(product: &Product) -> Self {
        ProductDocument {
            id: product.id,
            code: product.code.clone(),
            barcode: product.barcode.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            sale_price_cents: product.sale_price_cents,
            purchase_price_cents: product.purchase_price_cents,
            quantity: product.quantity,
            image_url: product.image_url.clone(),
            category_id: product.category_id,
            category_name: product.category_name.clone(),
            provider_id: product.provider_id,
            provider_name: product.provider_name.clone(),
            updated_at: product.updated_at,
        }
    }

    /// Converts back into the domain type.
    pub fn into_domain(self) -> Product {
        Product {
            id: self.id,
            code: self.code,
            barcode: self.barcode,
            name: self.name,
            description: self.description,
            sale_price_cents: self.sale_price_cents,
            purchase_price_cents: self.purchase_price_cents,
            quantity: self.quantity,
            image_url: self.image_url,
            category_id: self.category_id,
            category_name: self.category_name,
            provider_id: self.provider_id,
            provider_name: self.provider_name,
            updated_at: self.updated_at,
        }
    }
}

// =============================================================================
// Invoice Document
// =============================================================================

/// Wire shape of an invoice line item. Carries no id: line identity is
/// positional within its invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItemDocument {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// Wire shape of an invoice, line items embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub id: i64,
    /// Derived display number ("F-000042"), for remote-only consumers.
    pub number: String,
    pub date_millis: i64,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_bps: i64,
    pub discount_cents: i64,
    pub surcharge_bps: i64,
    pub surcharge_cents: i64,
    pub total_cents: i64,
    pub payment_method: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<InvoiceItemDocument>,
}

impl InvoiceDocument {
    /// Builds the wire shape from a local invoice and its items.
    pub fn from_domain(invoice: &Invoice, items: &[InvoiceItem]) -> Self {
        InvoiceDocument {
            id: invoice.id,
            number: invoice.number(),
            date_millis: invoice.date_millis,
            customer_id: invoice.customer_id,
            customer_name: invoice.customer_name.clone(),
            subtotal_cents: invoice.subtotal_cents,
            tax_cents: invoice.tax_cents,
            discount_bps: invoice.discount_bps,
            discount_cents: invoice.discount_cents,
            surcharge_bps: invoice.surcharge_bps,
            surcharge_cents: invoice.surcharge_cents,
            total_cents: invoice.total_cents,
            payment_method: invoice.payment_method.clone(),
            notes: invoice.notes.clone(),
            items: items
                .iter()
                .map(|item| InvoiceItemDocument {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                    line_total_cents: item.line_total_cents,
                })
                .collect(),
        }
    }

    /// Converts back into the domain types. Item rows come back with zeroed
    /// local ids; the store assigns fresh ones on adoption.
    pub fn into_domain(self) -> (Invoice, Vec<InvoiceItem>) {
        let invoice = Invoice {
            id: self.id,
            date_millis: self.date_millis,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            discount_bps: self.discount_bps,
            discount_cents: self.discount_cents,
            surcharge_bps: self.surcharge_bps,
            surcharge_cents: self.surcharge_cents,
            total_cents: self.total_cents,
            payment_method: self.payment_method,
            notes: self.notes,
        };

        let items = self
            .items
            .into_iter()
            .map(|item| InvoiceItem {
                id: 0,
                invoice_id: invoice.id,
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                line_total_cents: item.line_total_cents,
            })
            .collect();

        (invoice, items)
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decodes a raw remote document, tagging failures with the document key so a
/// single corrupt document is diagnosable without stopping the whole pull.
pub fn decode<T: serde::de::DeserializeOwned>(key: &str, value: Value) -> SyncResult<T> {
    serde_json::from_value(value).map_err(|e| SyncError::MalformedDocument {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn invoice_document_embeds_items_and_number() {
        let invoice = Invoice {
            id: 42,
            date_millis: 1_756_000_000_000,
            customer_id: None,
            customer_name: None,
            subtotal_cents: 1_000,
            tax_cents: 210,
            discount_bps: 0,
            discount_cents: 0,
            surcharge_bps: 0,
            surcharge_cents: 0,
            total_cents: 1_210,
            payment_method: "CASH".into(),
            notes: None,
        };
        let items = vec![InvoiceItem {
            id: 9,
            invoice_id: 42,
            product_id: 1,
            product_name: "Yerba".into(),
            quantity: 2,
            unit_price_cents: 500,
            line_total_cents: 1_000,
        }];

        let doc = InvoiceDocument::from_domain(&invoice, &items);
        assert_eq!(doc.number, "F-000042");
        assert_eq!(doc.items.len(), 1);

        let (back, back_items) = doc.into_domain();
        assert_eq!(back, invoice);
        assert_eq!(back_items[0].id, 0); // local item ids never travel
        assert_eq!(back_items[0].invoice_id, 42);
    }

    #[test]
    fn malformed_document_names_its_key() {
        let bad = serde_json::json!({"id": "not-a-number"});
        let err = decode::<ProductDocument>("17", bad).unwrap_err();
        match err {
            SyncError::MalformedDocument { key, .. } => assert_eq!(key, "17"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn product_document_round_trips_through_json() {
        let product = Product {
            id: 3,
            code: "P-003".into(),
            barcode: "779000000003".into(),
            name: "Azúcar".into(),
            description: Some("1kg".into()),
            sale_price_cents: 800,
            purchase_price_cents: 500,
            quantity: 12,
            image_url: None,
            category_id: Some(1),
            category_name: Some("Almacén".into()),
            provider_id: None,
            provider_name: None,
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(ProductDocument::from_domain(&product)).unwrap();
        let decoded: ProductDocument = decode("3", value).unwrap();
        assert_eq!(decoded.into_domain(), product);
    }
}
