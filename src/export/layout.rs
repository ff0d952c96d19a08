//! Row layout shared by the spreadsheet and Excel writers.
//!
//! Every document becomes a block: the column header row, then one row per
//! line item. Document-level metadata is repeated on each item row so a block
//! can be filtered or sorted without losing context.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};

use crate::record::ProcessingResult;

pub const HEADER: [&str; 16] = [
    "Document No",
    "Date",
    "Type",
    "Supplier",
    "Supplier Tax ID",
    "Customer",
    "Description",
    "Unit",
    "Quantity",
    "Unit Price",
    "Line Total",
    "Currency",
    "Document Total",
    "Status",
    "Source",
    "Processed At",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(Decimal),
    Empty,
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    /// Cell as a Sheets API value. Whole numbers go out as integers.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Number(d) => number_json(*d),
            Cell::Empty => Value::String(String::new()),
        }
    }

    /// Rendered width, used for column sizing.
    pub fn width(&self) -> usize {
        match self {
            Cell::Text(s) => s.chars().count(),
            Cell::Number(d) => d.normalize().to_string().len(),
            Cell::Empty => 0,
        }
    }
}

fn number_json(d: Decimal) -> Value {
    let d = d.normalize();
    let native = if d.scale() == 0 {
        d.to_i64().map(Value::from)
    } else {
        d.to_f64().and_then(Number::from_f64).map(Value::Number)
    };
    native.unwrap_or_else(|| Value::String(d.to_string()))
}

pub fn header_row() -> Vec<Cell> {
    HEADER.iter().map(|h| Cell::Text(h.to_string())).collect()
}

/// Header row followed by the item rows of one document.
pub fn document_block(result: &ProcessingResult) -> Vec<Vec<Cell>> {
    let record = &result.record;
    let meta = |description: Cell, unit: Cell, quantity: Cell, price: Cell, line_total: Cell| {
        vec![
            Cell::text(record.document_number.clone()),
            record
                .document_date
                .map(|d| Cell::Text(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Cell::Empty),
            Cell::text(record.document_type.as_str()),
            Cell::text(record.supplier.name.clone()),
            Cell::text(record.supplier.tax_id.clone().unwrap_or_default()),
            Cell::text(record.customer.name.clone()),
            description,
            unit,
            quantity,
            price,
            line_total,
            Cell::text(record.currency.clone()),
            Cell::Number(record.total_amount),
            Cell::text(result.validation_status.as_str()),
            Cell::text(result.provenance.source_backend.as_str()),
            Cell::Text(
                result
                    .provenance
                    .received_at
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ),
        ]
    };

    let mut rows = vec![header_row()];
    if record.line_items.is_empty() {
        rows.push(meta(Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty));
    }
    for item in &record.line_items {
        rows.push(meta(
            Cell::text(item.description.clone()),
            Cell::text(item.unit.clone().unwrap_or_default()),
            Cell::Number(item.quantity),
            Cell::Number(item.unit_price),
            Cell::Number(item.line_total),
        ));
    }
    rows
}

/// Blocks of several documents, one after the other.
pub fn batch_rows(results: &[ProcessingResult]) -> Vec<Vec<Cell>> {
    results.iter().flat_map(document_block).collect()
}
