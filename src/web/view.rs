//! Server-side HTML for the single-page UI.
//!
//! Every request re-renders the whole page from the session, so the page is
//! always a pure function of [`PageModel`].

use crate::export::{self, CSV_FILE_NAME, JSON_FILE_NAME};
use crate::invoice::ExtractionResult;
use crate::present::{InvoiceView, LineItemsView, SectionView, NO_LINE_ITEMS};
use crate::web::session::Session;
use std::fmt::Write as _;

/// Severity of an inline banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

impl NoticeKind {
    fn class(self) -> &'static str {
        match self {
            NoticeKind::Success => "success",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        }
    }
}

/// One inline banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// What the page shows.
pub struct PageModel<'a> {
    pub session: &'a Session,
    pub notices: Vec<Notice>,
    /// `false` when the server was started with its own backend or provider,
    /// so users never need to enter a key.
    pub credential_required: bool,
}

pub const CREDENTIAL_CONFIGURED: &str = "API key configured!";
pub const CREDENTIAL_NEEDED: &str = "Please enter your OpenAI API key in the sidebar to proceed.";
pub const EXTRACTED: &str = "Data extracted successfully!";
pub const IMAGE_REPLACED: &str =
    "A new image was uploaded while the previous one was being analyzed. Extract again to see its data.";

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; display: flex; color: #222; }
aside { width: 280px; background: #f4f5f7; padding: 1.5rem; min-height: 100vh; box-sizing: border-box; }
main { flex: 1; padding: 1.5rem 2.5rem; max-width: 1100px; }
.cols { display: flex; gap: 2rem; }
.cols > section { flex: 1; }
.notice { padding: .75rem 1rem; border-radius: 6px; margin: .75rem 0; white-space: pre-line; }
.success { background: #e6f4ea; color: #1e6b34; }
.warning { background: #fff6e0; color: #7a5a00; }
.error { background: #fde8e8; color: #8a1c1c; }
.info { background: #e8f0fe; color: #1a4b8c; }
img.preview { max-width: 100%; border: 1px solid #ddd; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ddd; padding: .4rem .6rem; text-align: left; }
pre { background: #f6f8fa; padding: 1rem; overflow: auto; }
.downloads a { display: inline-block; margin-right: 1rem; padding: .5rem 1rem; background: #1a73e8; color: #fff; border-radius: 6px; text-decoration: none; }
"#;

/// Escape text for HTML element content and double-quoted attributes.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Render the full page.
pub fn render_page(model: &PageModel<'_>) -> String {
    let session = model.session;
    let mut html = String::with_capacity(8 * 1024);

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Invoice Data Extractor</title>\n<style>{STYLE}</style>\n</head>\n<body>\n"
    );
    if model.credential_required {
        render_sidebar(&mut html, session);
    }

    html.push_str("<main>\n<h1>📄 Invoice Data Extractor</h1>\n");
    html.push_str("<p>Upload an invoice image to extract structured data using AI.</p>\n");

    for notice in &model.notices {
        render_notice(&mut html, notice);
    }

    if model.credential_required && !session.has_credential() {
        render_notice(&mut html, &Notice::warning(CREDENTIAL_NEEDED));
    }

    html.push_str(
        "<form method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\n\
         <label>Choose an invoice image\n\
         <input type=\"file\" name=\"file\" accept=\".png,.jpg,.jpeg,image/png,image/jpeg\" required>\n\
         </label>\n<button type=\"submit\">Upload</button>\n</form>\n",
    );

    if let Some(upload) = &session.upload {
        let _ = write!(
            html,
            "<div class=\"cols\">\n<section>\n<h3>Uploaded Invoice</h3>\n\
             <img class=\"preview\" alt=\"{name}\" src=\"{src}\">\n</section>\n<section>\n\
             <h3>Extracted Data</h3>\n\
             <form method=\"post\" action=\"/extract\"><button type=\"submit\"{disabled}>Extract Invoice Data</button></form>\n",
            name = html_escape(&upload.file_name),
            src = upload.image.data_uri(),
            disabled = if session.busy { " disabled" } else { "" },
        );
        if session.busy {
            html.push_str("<p class=\"notice info\">Analyzing invoice...</p>\n");
        }
        html.push_str("</section>\n</div>\n");
    }

    if let Some(result) = &session.result {
        render_result(&mut html, result);
    }

    html.push_str("</main>\n</body>\n</html>\n");
    html
}

fn render_sidebar(html: &mut String, session: &Session) {
    html.push_str(
        "<aside>\n<h2>Configuration</h2>\n\
         <form method=\"post\" action=\"/credential\">\n\
         <label>OpenAI API Key<br>\n\
         <input type=\"password\" name=\"api_key\" autocomplete=\"off\">\n</label>\n\
         <button type=\"submit\">Save</button>\n</form>\n",
    );
    if session.has_credential() {
        render_notice(html, &Notice::success(CREDENTIAL_CONFIGURED));
    }
    html.push_str(
        "<h3>Instructions</h3>\n<ol>\n\
         <li>Enter your OpenAI API key</li>\n\
         <li>Upload an invoice image</li>\n\
         <li>Click 'Extract Invoice Data'</li>\n\
         <li>Download the results</li>\n\
         </ol>\n</aside>\n",
    );
}

fn render_notice(html: &mut String, notice: &Notice) {
    let _ = writeln!(
        html,
        "<div class=\"notice {}\">{}</div>",
        notice.kind.class(),
        html_escape(&notice.text)
    );
}

fn render_section(html: &mut String, section: &SectionView) {
    let _ = writeln!(html, "<section>\n<h3>{} {}</h3>", section.icon, section.title);
    for field in &section.fields {
        let _ = writeln!(
            html,
            "<p><strong>{}:</strong> {}</p>",
            field.label,
            html_escape(&field.value)
        );
    }
    html.push_str("</section>\n");
}

fn render_result(html: &mut String, result: &ExtractionResult) {
    let view = InvoiceView::from_result(result);

    html.push_str("<hr>\n<div class=\"cols\">\n");
    for section in view.sections() {
        render_section(html, section);
    }
    html.push_str("</div>\n");

    html.push_str("<h3>📦 Line Items</h3>\n");
    match &view.line_items {
        LineItemsView::Empty => {
            let _ = writeln!(html, "<p class=\"notice info\">{NO_LINE_ITEMS}</p>");
        }
        LineItemsView::Table { columns, rows } => {
            html.push_str("<table>\n<thead><tr>");
            for col in columns {
                let _ = write!(html, "<th>{}</th>", html_escape(col));
            }
            html.push_str("</tr></thead>\n<tbody>\n");
            for row in rows {
                html.push_str("<tr>");
                for cell in row {
                    let _ = write!(html, "<td>{}</td>", html_escape(cell));
                }
                html.push_str("</tr>\n");
            }
            html.push_str("</tbody>\n</table>\n");
        }
    }

    render_section(html, &view.totals);

    html.push_str("<h3>💾 Download Results</h3>\n<div class=\"downloads\">\n");
    let _ = writeln!(
        html,
        "<a href=\"/download/json\" download=\"{JSON_FILE_NAME}\">Download JSON</a>"
    );
    if result.has_line_items() {
        let _ = writeln!(
            html,
            "<a href=\"/download/csv\" download=\"{CSV_FILE_NAME}\">Download Line Items CSV</a>"
        );
    }
    html.push_str("</div>\n");

    // The JSON export is the raw view; a failure here only hides the expander
    if let Ok(json) = export::to_json_pretty(result) {
        let _ = writeln!(
            html,
            "<details>\n<summary>🔍 View Raw JSON Data</summary>\n<pre>{}</pre>\n</details>",
            html_escape(&json)
        );
    }
}
