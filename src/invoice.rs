//! The extracted invoice: [`ExtractionResult`] and its [`LineItem`]s.
//!
//! Every field is optional text. The model is asked to answer `"N/A"` for
//! anything it cannot find; that sentinel is kept verbatim. A key the model
//! leaves out entirely is held as `None` and rendered as [`NOT_AVAILABLE`]
//! by the presentation layer.
//!
//! [`ExtractionResult::from_value`] is the schema gate between the model's
//! JSON and the rest of the crate. It either returns a complete typed result
//! or an [`InvoiceError::ExtractionSchema`]; it never hands back a partially
//! filled structure.

use crate::error::InvoiceError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Placeholder shown for absent fields, and the sentinel the model is told to use.
pub const NOT_AVAILABLE: &str = "N/A";

/// Top-level text fields, in prompt order.
pub const INVOICE_FIELDS: [&str; 12] = [
    "invoice_number",
    "invoice_date",
    "due_date",
    "vendor_name",
    "vendor_address",
    "vendor_tax_id",
    "customer_name",
    "customer_address",
    "subtotal",
    "tax_amount",
    "total_amount",
    "currency",
];

/// Key of the line-items sequence.
pub const LINE_ITEMS_FIELD: &str = "line_items";

/// Line-item columns, in prompt order.
pub const LINE_ITEM_FIELDS: [&str; 4] = ["description", "quantity", "unit_price", "total_price"];

/// Structured data extracted from one invoice image.
///
/// Field order matches the JSON shape requested in the prompt so that the
/// JSON export reads the same way the model was asked to answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_tax_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_address: Option<String>,
    /// `None` when the key was absent; `Some(vec![])` when the model sent `[]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// One row of the invoice's line-item table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<String>,
}

impl ExtractionResult {
    /// Validate a parsed JSON reply into a typed result.
    ///
    /// Rejected in every mode:
    /// - a root that is not an object
    /// - an object containing none of the requested keys
    /// - `line_items` that is not an array of objects
    /// - arrays or objects where a text value is expected
    ///
    /// Scalars are accepted as text (`12.5` → `"12.5"`) and `null` counts as
    /// absent. With `strict` unset, missing keys stay `None` and unknown keys
    /// are dropped with a warning; with `strict` set, either one is an error.
    pub fn from_value(value: Value, strict: bool) -> Result<Self, InvoiceError> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(schema_error(
                    vec![],
                    vec![],
                    format!("expected a JSON object, got {}", json_kind(&other)),
                ))
            }
        };

        let mut result = Self::default();
        let mut present: Vec<String> = Vec::new();
        let mut unexpected: Vec<String> = Vec::new();

        for (key, value) in map {
            if key == LINE_ITEMS_FIELD {
                result.line_items = parse_line_items(value, strict)?;
                present.push(key);
            } else if let Some(slot) = result.slot_mut(&key) {
                *slot = text_value(&key, value)?;
                present.push(key);
            } else {
                unexpected.push(key);
            }
        }

        if present.is_empty() {
            return Err(schema_error(
                vec![],
                unexpected,
                "none of the requested invoice fields are present".to_string(),
            ));
        }

        let missing: Vec<String> = INVOICE_FIELDS
            .iter()
            .chain(std::iter::once(&LINE_ITEMS_FIELD))
            .filter(|k| !present.iter().any(|p| p.as_str() == **k))
            .map(|k| k.to_string())
            .collect();

        if strict && (!missing.is_empty() || !unexpected.is_empty()) {
            let detail = describe_keys(&missing, &unexpected);
            return Err(schema_error(missing, unexpected, detail));
        }

        if !unexpected.is_empty() {
            warn!("Dropping unexpected invoice fields: {}", unexpected.join(", "));
        }

        Ok(result)
    }

    /// Value of a top-level text field by name; `None` if absent or unknown.
    pub fn field(&self, name: &str) -> Option<&str> {
        let v = match name {
            "invoice_number" => &self.invoice_number,
            "invoice_date" => &self.invoice_date,
            "due_date" => &self.due_date,
            "vendor_name" => &self.vendor_name,
            "vendor_address" => &self.vendor_address,
            "vendor_tax_id" => &self.vendor_tax_id,
            "customer_name" => &self.customer_name,
            "customer_address" => &self.customer_address,
            "subtotal" => &self.subtotal,
            "tax_amount" => &self.tax_amount,
            "total_amount" => &self.total_amount,
            "currency" => &self.currency,
            _ => return None,
        };
        v.as_deref()
    }

    /// Field value, or [`NOT_AVAILABLE`] when absent.
    pub fn field_or_na(&self, name: &str) -> &str {
        self.field(name).unwrap_or(NOT_AVAILABLE)
    }

    /// Line items, empty when the key was absent.
    pub fn line_items(&self) -> &[LineItem] {
        self.line_items.as_deref().unwrap_or(&[])
    }

    pub fn has_line_items(&self) -> bool {
        !self.line_items().is_empty()
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        Some(match name {
            "invoice_number" => &mut self.invoice_number,
            "invoice_date" => &mut self.invoice_date,
            "due_date" => &mut self.due_date,
            "vendor_name" => &mut self.vendor_name,
            "vendor_address" => &mut self.vendor_address,
            "vendor_tax_id" => &mut self.vendor_tax_id,
            "customer_name" => &mut self.customer_name,
            "customer_address" => &mut self.customer_address,
            "subtotal" => &mut self.subtotal,
            "tax_amount" => &mut self.tax_amount,
            "total_amount" => &mut self.total_amount,
            "currency" => &mut self.currency,
            _ => return None,
        })
    }
}

impl LineItem {
    /// Cell value by column name; `None` if absent or unknown.
    pub fn get(&self, column: &str) -> Option<&str> {
        let v = match column {
            "description" => &self.description,
            "quantity" => &self.quantity,
            "unit_price" => &self.unit_price,
            "total_price" => &self.total_price,
            _ => return None,
        };
        v.as_deref()
    }

    fn slot_mut(&mut self, column: &str) -> Option<&mut Option<String>> {
        Some(match column {
            "description" => &mut self.description,
            "quantity" => &mut self.quantity,
            "unit_price" => &mut self.unit_price,
            "total_price" => &mut self.total_price,
            _ => return None,
        })
    }
}

/// Columns present in at least one item, in canonical order.
pub fn present_columns(items: &[LineItem]) -> Vec<&'static str> {
    LINE_ITEM_FIELDS
        .iter()
        .copied()
        .filter(|col| items.iter().any(|item| item.get(col).is_some()))
        .collect()
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn parse_line_items(value: Value, strict: bool) -> Result<Option<Vec<LineItem>>, InvoiceError> {
    let items = match value {
        Value::Null => return Ok(None),
        Value::Array(items) => items,
        other => {
            return Err(schema_error(
                vec![],
                vec![],
                format!("'line_items' must be an array, got {}", json_kind(&other)),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => parse_line_item(idx, map, strict),
            other => Err(schema_error(
                vec![],
                vec![],
                format!("line item {} must be an object, got {}", idx + 1, json_kind(&other)),
            )),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn parse_line_item(idx: usize, map: Map<String, Value>, strict: bool) -> Result<LineItem, InvoiceError> {
    let mut item = LineItem::default();
    let mut present: Vec<String> = Vec::new();
    let mut unexpected: Vec<String> = Vec::new();

    for (key, value) in map {
        if let Some(slot) = item.slot_mut(&key) {
            *slot = text_value(&key, value)?;
            present.push(key);
        } else {
            unexpected.push(key);
        }
    }

    if strict {
        let missing: Vec<String> = LINE_ITEM_FIELDS
            .iter()
            .filter(|k| !present.iter().any(|p| p.as_str() == **k))
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            let detail = format!("line item {}: {}", idx + 1, describe_keys(&missing, &unexpected));
            return Err(schema_error(missing, unexpected, detail));
        }
    } else if !unexpected.is_empty() {
        warn!(
            "Dropping unexpected fields from line item {}: {}",
            idx + 1,
            unexpected.join(", ")
        );
    }

    Ok(item)
}

fn text_value(key: &str, value: Value) -> Result<Option<String>, InvoiceError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(schema_error(
            vec![],
            vec![],
            format!("field '{}' must be text, got {}", key, json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn describe_keys(missing: &[String], unexpected: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing fields: {}", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        parts.push(format!("unexpected fields: {}", unexpected.join(", ")));
    }
    parts.join("; ")
}

fn schema_error(missing: Vec<String>, unexpected: Vec<String>, detail: String) -> InvoiceError {
    InvoiceError::ExtractionSchema {
        missing,
        unexpected,
        detail,
    }
}
