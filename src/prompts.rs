//! The fixed extraction instruction sent alongside every invoice image.
//!
//! Kept in one place so the requested JSON shape and the field list in
//! [`crate::invoice`] can be checked against each other in tests.
//! Callers can override it via [`crate::config::ExtractionConfig::prompt`].

/// Default instruction asking the model for the invoice JSON object.
pub const EXTRACTION_PROMPT: &str = r#"Analyze this invoice image and extract the following information in JSON format:

{
    "invoice_number": "",
    "invoice_date": "",
    "due_date": "",
    "vendor_name": "",
    "vendor_address": "",
    "vendor_tax_id": "",
    "customer_name": "",
    "customer_address": "",
    "line_items": [
        {
            "description": "",
            "quantity": "",
            "unit_price": "",
            "total_price": ""
        }
    ],
    "subtotal": "",
    "tax_amount": "",
    "total_amount": "",
    "currency": ""
}

If any field is not found, use "N/A" as the value.
Return only the JSON object, no additional text."#;
