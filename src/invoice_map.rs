// src/invoice_map.rs

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Seller or buyer block of an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Party {
    pub name: Option<String>,
    pub address: Option<String>,
}

/// A single invoice line item, as printed on the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub amount: String,
}

/// Caller-facing invoice fields. Every key is always present; values the
/// service did not return are `null` (or `""` inside line items).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub vendor: Party,
    pub customer: Party,
    pub invoice_id: Option<String>,
    pub invoice_date: Option<String>,
    pub payment_term: Option<String>,
    pub items: Vec<LineItem>,
    pub subtotal: Option<String>,
    pub tax: Option<String>,
    pub total: Option<String>,
    /// Every field the service returned, by its service name.
    pub raw_fields: BTreeMap<String, String>,
}

impl ExtractionResult {
    /// How many scalar fields were filled (out of the scalar ones).
    pub fn coverage(&self) -> (usize, usize) {
        let total = 10;
        let filled = [
            self.vendor.name.is_some(),
            self.vendor.address.is_some(),
            self.customer.name.is_some(),
            self.customer.address.is_some(),
            self.invoice_id.is_some(),
            self.invoice_date.is_some(),
            self.payment_term.is_some(),
            self.subtotal.is_some(),
            self.tax.is_some(),
            self.total.is_some(),
        ]
        .iter()
        .filter(|&&v| v)
        .count();
        (filled, total)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("analysis finished with status {status:?} and no document")]
    NoDocument { status: String },
}

/// Map a terminal analyze-operation body onto [`ExtractionResult`].
///
/// Only the first document is used. Anything other than a `succeeded`
/// operation with at least one document is an error.
pub fn map_fields(operation: &Value) -> Result<ExtractionResult, ExtractionError> {
    let status = operation
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let document = if status == "succeeded" {
        operation.pointer("/analyzeResult/documents/0")
    } else {
        None
    };
    let Some(document) = document else {
        return Err(ExtractionError::NoDocument {
            status: status.to_string(),
        });
    };

    let empty = Map::new();
    let fields = document
        .get("fields")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let content = |name: &str| fields.get(name).and_then(field_content);

    let items: Vec<LineItem> = fields
        .get("Items")
        .and_then(|items| items.get("valueArray"))
        .and_then(Value::as_array)
        .map(|rows| rows.iter().map(line_item).collect())
        .unwrap_or_default();

    let raw_fields: BTreeMap<String, String> = fields
        .iter()
        .map(|(name, field)| (name.clone(), raw_text(field)))
        .collect();

    Ok(ExtractionResult {
        vendor: Party {
            name: content("VendorName"),
            address: content("VendorAddress"),
        },
        customer: Party {
            name: content("CustomerName"),
            address: content("CustomerAddress"),
        },
        invoice_id: content("InvoiceId"),
        invoice_date: content("InvoiceDate"),
        payment_term: content("PaymentTerm"),
        items,
        subtotal: content("SubTotal"),
        tax: content("TotalTax"),
        total: content("InvoiceTotal"),
        raw_fields,
    })
}

/// Non-empty OCR text of a field.
fn field_content(field: &Value) -> Option<String> {
    field
        .get("content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn line_item(row: &Value) -> LineItem {
    let object = row.get("valueObject");
    let sub = |name: &str| {
        object
            .and_then(|o| o.get(name))
            .and_then(field_content)
            .unwrap_or_default()
    };
    LineItem {
        description: sub("Description"),
        quantity: sub("Quantity"),
        unit_price: sub("UnitPrice"),
        amount: sub("Amount"),
    }
}

/// Field text, or the field's JSON when the service gave no text for it.
fn raw_text(field: &Value) -> String {
    match field_content(field) {
        Some(text) => text,
        None => match field {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}
