// src/stock/mod.rs

mod csv;

pub use csv::{CsvError, parse, serialize};

use serde::Serialize;
use serde::ser::SerializeMap;
use std::fmt;

/// Columns whose values are coerced to numbers when parsed.
pub const NUMERIC_COLUMNS: &[&str] = &["quantity", "reorder_level", "reorder_quantity"];

/// Column order used when stock is written back out as CSV for the model prompt.
pub const STOCK_COLUMNS: &[&str] = &[
    "drug_name",
    "quantity",
    "reorder_level",
    "strength",
    "dosage_form",
    "unit_of_measure",
    "reorder_quantity",
    "location",
    "batch_number",
    "expiry_date",
    "notes",
];

/// A single cell of a parsed row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    fn as_integer(n: f64) -> Option<i64> {
        (n.fract() == 0.0 && n.abs() < 1e15).then_some(n as i64)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => match Value::as_integer(*n) {
                Some(i) => write!(f, "{i}"),
                None => write!(f, "{n}"),
            },
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(n) => match Value::as_integer(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// One inventory row, keyed by the header names of the CSV it came from.
///
/// Keys keep the header's order. Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Set `key`, replacing an earlier value in place if the key repeats.
    fn insert(&mut self, key: &str, value: Value) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Typed view of a pharmacy stock row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockItem {
    pub drug_name: String,
    pub quantity: f64,
    pub reorder_level: f64,
    pub strength: String,
    pub dosage_form: String,
    pub unit_of_measure: String,
    pub reorder_quantity: f64,
    pub location: String,
    pub batch_number: String,
    pub expiry_date: String,
    pub notes: String,
}

impl StockItem {
    /// Stock has fallen to (or below) the point where it should be reordered.
    pub fn is_at_risk(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

impl From<&Record> for StockItem {
    fn from(record: &Record) -> Self {
        let text = |key: &str| match record.get(key) {
            Some(value) => value.to_string(),
            None => String::new(),
        };
        let number = |key: &str| record.get(key).and_then(Value::as_number).unwrap_or(0.0);

        StockItem {
            drug_name: text("drug_name"),
            quantity: number("quantity"),
            reorder_level: number("reorder_level"),
            strength: text("strength"),
            dosage_form: text("dosage_form"),
            unit_of_measure: text("unit_of_measure"),
            reorder_quantity: number("reorder_quantity"),
            location: text("location"),
            batch_number: text("batch_number"),
            expiry_date: text("expiry_date"),
            notes: text("notes"),
        }
    }
}

/// Parse the current stock CSV. No upload yet means no stock, not an error.
pub fn load_stock(raw_csv: Option<&str>) -> Result<Vec<Record>, CsvError> {
    match raw_csv {
        Some(text) => parse(text),
        None => Ok(Vec::new()),
    }
}

/// Render records as CSV using the fixed stock column order.
pub fn stock_to_csv(records: &[Record]) -> String {
    serialize(records, STOCK_COLUMNS)
}
