//! Library-level extraction tests against an in-process backend.
//!
//! No network access: every test injects a [`ScriptedBackend`] through
//! `ExtractionConfig::backend`.

mod common;

use common::{corrupt_png_bytes, gif_bytes, jpeg_bytes, png_bytes, ScriptedBackend, FULL_REPLY};
use edgequake_invoice::{
    extract, extract_from_bytes, line_items_csv, to_json_pretty, ExtractionConfig,
    ExtractionResult, InvoiceError, InvoiceView,
};
use std::sync::Arc;

fn config_with(backend: Arc<ScriptedBackend>) -> ExtractionConfig {
    ExtractionConfig::builder().backend(backend).build().unwrap()
}

#[tokio::test]
async fn fenced_reply_yields_full_result() {
    let backend = Arc::new(ScriptedBackend::replying(FULL_REPLY));
    let config = config_with(backend.clone());

    let result = extract_from_bytes(&png_bytes(), "invoice.png", None, &config)
        .await
        .unwrap();

    assert_eq!(backend.calls(), 1);
    assert_eq!(result.invoice_number.as_deref(), Some("INV-2024-001"));
    assert_eq!(result.currency.as_deref(), Some("USD"));
    assert_eq!(result.line_items().len(), 1);
    assert_eq!(result.line_items()[0].description.as_deref(), Some("Widget"));

    let instruction = backend.last_instruction().unwrap();
    assert!(instruction.contains("invoice_number"));
    assert!(instruction.contains("N/A"));
}

#[tokio::test]
async fn unfenced_reply_and_jpeg_input() {
    let backend = Arc::new(ScriptedBackend::replying(
        r#"{"invoice_number": "7", "total_amount": 99.5, "line_items": []}"#,
    ));
    let config = config_with(backend);

    let result = extract_from_bytes(&jpeg_bytes(), "scan.JPG", None, &config)
        .await
        .unwrap();
    assert_eq!(result.total_amount.as_deref(), Some("99.5"));
    assert_eq!(result.tax_amount, None);
    assert!(!result.has_line_items());
}

#[tokio::test]
async fn prose_reply_is_a_parse_error() {
    let backend = Arc::new(ScriptedBackend::replying(
        "Sorry, I cannot read this invoice clearly.",
    ));
    let config = config_with(backend);

    let err = extract_from_bytes(&png_bytes(), "invoice.png", None, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::ExtractionParse { .. }), "got {err:?}");
    assert!(err.to_string().starts_with("Error extracting data"));
}

#[tokio::test]
async fn wrong_shape_is_a_schema_error() {
    let backend = Arc::new(ScriptedBackend::replying(r#"["INV-1", "42.00"]"#));
    let config = config_with(backend);

    let err = extract_from_bytes(&png_bytes(), "invoice.png", None, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::ExtractionSchema { .. }), "got {err:?}");
}

#[tokio::test]
async fn strict_mode_rejects_missing_keys() {
    let backend = Arc::new(ScriptedBackend::replying(r#"{"invoice_number": "INV-1"}"#));
    let config = ExtractionConfig::builder()
        .backend(backend)
        .strict_schema(true)
        .build()
        .unwrap();

    match extract_from_bytes(&png_bytes(), "invoice.png", None, &config).await {
        Err(InvoiceError::ExtractionSchema { missing, .. }) => {
            assert!(missing.contains(&"total_amount".to_string()));
            assert!(missing.contains(&"line_items".to_string()));
        }
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_is_reported() {
    let backend = Arc::new(ScriptedBackend::failing("HTTP 500: upstream unavailable"));
    let config = config_with(backend);

    let err = extract_from_bytes(&png_bytes(), "invoice.png", None, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::ExtractionTransport { .. }));
    assert!(err.to_string().contains("upstream unavailable"));
}

#[tokio::test]
async fn missing_credential_never_calls_out() {
    let config = ExtractionConfig::default();
    let err = extract_from_bytes(&png_bytes(), "invoice.png", None, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::MissingCredential));
    assert!(err.is_warning());
}

#[tokio::test]
async fn unsupported_and_corrupt_images_stop_before_the_call() {
    let backend = Arc::new(ScriptedBackend::replying(FULL_REPLY));
    let config = config_with(backend.clone());

    let err = extract_from_bytes(&gif_bytes(), "invoice.gif", None, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::UnsupportedFormat { .. }), "got {err:?}");

    let err = extract_from_bytes(&corrupt_png_bytes(), "invoice.png", None, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::ImageDecode { .. }), "got {err:?}");

    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn extract_reads_local_files() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    let path = dir.join("invoice.png");
    std::fs::write(&path, png_bytes()).unwrap();

    let backend = Arc::new(ScriptedBackend::replying(FULL_REPLY));
    let config = config_with(backend);

    let result = extract(path.to_string_lossy(), None, &config).await.unwrap();
    assert_eq!(result.vendor_name.as_deref(), Some("Acme Supplies"));

    let missing = extract(dir.join("nope.png").to_string_lossy(), None, &config)
        .await
        .unwrap_err();
    assert!(matches!(missing, InvoiceError::FileNotFound { .. }), "got {missing:?}");
}

#[tokio::test]
async fn result_feeds_layout_and_exports() {
    let backend = Arc::new(ScriptedBackend::replying(FULL_REPLY));
    let config = config_with(backend);
    let result = extract_from_bytes(&png_bytes(), "invoice.png", None, &config)
        .await
        .unwrap();

    let text = InvoiceView::from_result(&result).render_text();
    assert!(text.contains("USD 11.00"));
    assert!(text.contains("Globex Corp"));

    let csv = line_items_csv(result.line_items()).unwrap();
    assert_eq!(
        csv,
        "description,quantity,unit_price,total_price\nWidget,2,5.00,10.00\n"
    );

    let json = to_json_pretty(&result).unwrap();
    let back: ExtractionResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
}
