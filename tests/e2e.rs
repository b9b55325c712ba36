//! End-to-end integration tests for edgequake-invoice.
//!
//! These tests use real invoice images in `./test_cases/` and make live LLM
//! API calls. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 OPENAI_API_KEY=sk-... cargo test --test e2e -- --nocapture

use edgequake_invoice::{
    extract, line_items_csv, to_json_pretty, ExtractionConfig, ExtractionResult, InvoiceError,
    InvoiceView, INVOICE_FIELDS,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set, no API key is configured, or
/// no image exists at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let Ok(key) = std::env::var("OPENAI_API_KEY") else {
            println!("SKIP — OPENAI_API_KEY is not set");
            return;
        };
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test image not found: {}", p.display());
            return;
        }
        (p, key)
    }};
}

/// The reply must have produced at least a few of the requested fields.
fn assert_plausible(result: &ExtractionResult, context: &str) {
    let filled = INVOICE_FIELDS
        .iter()
        .filter(|f| result.field(f).is_some_and(|v| v != "N/A"))
        .count();
    assert!(
        filled >= 3,
        "[{context}] only {filled} fields extracted: {result:?}"
    );
    assert!(
        result.total_amount.is_some(),
        "[{context}] total_amount missing"
    );
}

// ── Live extraction ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_sample_invoice() {
    let (path, key) = e2e_skip_unless_ready!(test_cases_dir().join("invoice.png"));

    let config = ExtractionConfig::default();
    let result = extract(path.to_string_lossy(), Some(&key), &config)
        .await
        .expect("extraction should succeed");

    assert_plausible(&result, "invoice.png");
    println!("{}", InvoiceView::from_result(&result).render_text());

    let json = to_json_pretty(&result).unwrap();
    std::fs::write(output_dir().join("invoice.json"), &json).unwrap();
    let back: ExtractionResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);

    if result.has_line_items() {
        let csv = line_items_csv(result.line_items()).unwrap();
        assert!(csv.lines().count() >= 2, "CSV has no rows:\n{csv}");
    }
}

#[tokio::test]
async fn test_extract_jpeg_with_strict_schema() {
    let (path, key) = e2e_skip_unless_ready!(test_cases_dir().join("invoice.jpg"));

    let config = ExtractionConfig::builder()
        .strict_schema(true)
        .build()
        .unwrap();
    match extract(path.to_string_lossy(), Some(&key), &config).await {
        Ok(result) => assert_plausible(&result, "invoice.jpg"),
        // A model that drops or adds keys is reported, never half-parsed
        Err(InvoiceError::ExtractionSchema { missing, unexpected, .. }) => {
            println!("strict schema rejected reply: missing={missing:?} unexpected={unexpected:?}");
        }
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[tokio::test]
async fn test_invalid_key_is_a_transport_error() {
    let (path, _) = e2e_skip_unless_ready!(test_cases_dir().join("invoice.png"));

    let config = ExtractionConfig::default();
    let err = extract(path.to_string_lossy(), Some("sk-invalid-key"), &config)
        .await
        .unwrap_err();
    assert!(
        matches!(err, InvoiceError::ExtractionTransport { .. }),
        "got {err:?}"
    );
}
