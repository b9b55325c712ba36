//! Presentation: map an [`ExtractionResult`] onto the fixed invoice layout.
//!
//! The layout is plain data ([`InvoiceView`]) so the web page and the CLI
//! render exactly the same thing. Values are shown verbatim. Nothing is
//! recomputed or cross-checked; an absent field becomes [`NOT_AVAILABLE`].

use crate::invoice::{present_columns, ExtractionResult, NOT_AVAILABLE};
use std::fmt::Write as _;

/// Message shown instead of an empty table.
pub const NO_LINE_ITEMS: &str = "No line items found";

/// One labelled value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub label: &'static str,
    pub value: String,
}

/// A titled group of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionView {
    pub title: &'static str,
    pub icon: &'static str,
    pub fields: Vec<FieldView>,
}

/// The line-items block: either a table or the explicit empty state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItemsView {
    Empty,
    Table {
        /// Column keys, canonical order, only those present in some item.
        columns: Vec<&'static str>,
        /// Cell text per row; missing cells are blank.
        rows: Vec<Vec<String>>,
    },
}

/// The complete on-screen layout for one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceView {
    pub invoice: SectionView,
    pub vendor: SectionView,
    pub customer: SectionView,
    pub line_items: LineItemsView,
    pub totals: SectionView,
}

impl InvoiceView {
    pub fn from_result(result: &ExtractionResult) -> Self {
        let field = |label: &'static str, key: &str| FieldView {
            label,
            value: result.field_or_na(key).to_string(),
        };

        // Totals carry the currency as a prefix when the model reported one
        let currency = result
            .field("currency")
            .filter(|c| !c.trim().is_empty() && *c != NOT_AVAILABLE);
        let money = |label: &'static str, key: &str| FieldView {
            label,
            value: match currency {
                Some(c) => format!("{} {}", c, result.field_or_na(key)),
                None => result.field_or_na(key).to_string(),
            },
        };

        let items = result.line_items();
        let line_items = if items.is_empty() {
            LineItemsView::Empty
        } else {
            let columns = present_columns(items);
            let rows = items
                .iter()
                .map(|item| {
                    columns
                        .iter()
                        .map(|col| item.get(col).unwrap_or_default().to_string())
                        .collect()
                })
                .collect();
            LineItemsView::Table { columns, rows }
        };

        Self {
            invoice: SectionView {
                title: "Invoice Information",
                icon: "📋",
                fields: vec![
                    field("Invoice Number", "invoice_number"),
                    field("Invoice Date", "invoice_date"),
                    field("Due Date", "due_date"),
                ],
            },
            vendor: SectionView {
                title: "Vendor Information",
                icon: "🏢",
                fields: vec![
                    field("Name", "vendor_name"),
                    field("Address", "vendor_address"),
                    field("Tax ID", "vendor_tax_id"),
                ],
            },
            customer: SectionView {
                title: "Customer Information",
                icon: "👤",
                fields: vec![field("Name", "customer_name"), field("Address", "customer_address")],
            },
            line_items,
            totals: SectionView {
                title: "Totals",
                icon: "💰",
                fields: vec![
                    money("Subtotal", "subtotal"),
                    money("Tax Amount", "tax_amount"),
                    money("Total Amount", "total_amount"),
                ],
            },
        }
    }

    /// Header sections in display order (line items sit between customer and totals).
    pub fn sections(&self) -> [&SectionView; 3] {
        [&self.invoice, &self.vendor, &self.customer]
    }

    /// Plain-text rendering for terminals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for section in self.sections() {
            write_section(&mut out, section);
        }

        let _ = writeln!(out, "Line Items");
        match &self.line_items {
            LineItemsView::Empty => {
                let _ = writeln!(out, "  {NO_LINE_ITEMS}");
            }
            LineItemsView::Table { columns, rows } => {
                let widths: Vec<usize> = columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        rows.iter()
                            .map(|r| r[i].chars().count())
                            .chain(std::iter::once(col.len()))
                            .max()
                            .unwrap_or(0)
                    })
                    .collect();

                let header: Vec<String> = columns
                    .iter()
                    .zip(&widths)
                    .map(|(c, &w)| format!("{c:<w$}"))
                    .collect();
                let _ = writeln!(out, "  {}", header.join("  ").trim_end());
                for row in rows {
                    let cells: Vec<String> = row
                        .iter()
                        .zip(&widths)
                        .map(|(c, &w)| format!("{c:<w$}"))
                        .collect();
                    let _ = writeln!(out, "  {}", cells.join("  ").trim_end());
                }
            }
        }
        let _ = writeln!(out);

        write_section(&mut out, &self.totals);
        out
    }
}

fn write_section(out: &mut String, section: &SectionView) {
    let _ = writeln!(out, "{}", section.title);
    let width = section
        .fields
        .iter()
        .map(|f| f.label.len())
        .max()
        .unwrap_or(0);
    for f in &section.fields {
        let _ = writeln!(out, "  {:<width$}  {}", format!("{}:", f.label), f.value, width = width + 1);
    }
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::LineItem;

    fn sample() -> ExtractionResult {
        ExtractionResult {
            invoice_number: Some("INV-9".into()),
            vendor_name: Some("Acme".into()),
            subtotal: Some("10.00".into()),
            tax_amount: Some("1.00".into()),
            total_amount: Some("11.00".into()),
            currency: Some("USD".into()),
            line_items: Some(vec![LineItem {
                description: Some("Widget".into()),
                quantity: Some("2".into()),
                unit_price: Some("5".into()),
                total_price: Some("10".into()),
            }]),
            ..Default::default()
        }
    }

    fn value<'a>(section: &'a SectionView, label: &str) -> &'a str {
        &section
            .fields
            .iter()
            .find(|f| f.label == label)
            .unwrap()
            .value
    }

    #[test]
    fn missing_tax_amount_renders_na_only_there() {
        let mut r = sample();
        r.tax_amount = None;
        let view = InvoiceView::from_result(&r);
        assert_eq!(value(&view.totals, "Tax Amount"), "USD N/A");
        assert_eq!(value(&view.totals, "Subtotal"), "USD 10.00");
        assert_eq!(value(&view.totals, "Total Amount"), "USD 11.00");
        assert_eq!(value(&view.invoice, "Invoice Number"), "INV-9");
    }

    #[test]
    fn absent_fields_are_na() {
        let view = InvoiceView::from_result(&ExtractionResult::default());
        for section in view.sections() {
            for f in &section.fields {
                assert_eq!(f.value, NOT_AVAILABLE, "{}", f.label);
            }
        }
        assert_eq!(value(&view.totals, "Total Amount"), NOT_AVAILABLE);
    }

    #[test]
    fn na_currency_is_not_prefixed() {
        let mut r = sample();
        r.currency = Some("N/A".into());
        let view = InvoiceView::from_result(&r);
        assert_eq!(value(&view.totals, "Subtotal"), "10.00");
    }

    #[test]
    fn empty_or_absent_line_items_show_empty_state() {
        let mut r = sample();
        r.line_items = Some(vec![]);
        assert_eq!(InvoiceView::from_result(&r).line_items, LineItemsView::Empty);
        r.line_items = None;
        let view = InvoiceView::from_result(&r);
        assert_eq!(view.line_items, LineItemsView::Empty);
        assert!(view.render_text().contains(NO_LINE_ITEMS));
    }

    #[test]
    fn table_rows_follow_present_columns() {
        let mut r = sample();
        r.line_items = Some(vec![
            LineItem {
                description: Some("A".into()),
                total_price: Some("3".into()),
                ..Default::default()
            },
            LineItem {
                description: Some("B".into()),
                ..Default::default()
            },
        ]);
        match InvoiceView::from_result(&r).line_items {
            LineItemsView::Table { columns, rows } => {
                assert_eq!(columns, vec!["description", "total_price"]);
                assert_eq!(rows, vec![vec!["A".to_string(), "3".into()], vec!["B".into(), String::new()]]);
            }
            LineItemsView::Empty => panic!("expected a table"),
        }
    }

    #[test]
    fn text_rendering_contains_sections() {
        let text = InvoiceView::from_result(&sample()).render_text();
        assert!(text.contains("Invoice Information"));
        assert!(text.contains("Widget"));
        assert!(text.contains("USD 11.00"));
    }
}
