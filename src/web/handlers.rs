//! HTTP handlers for the web UI.
//!
//! Page handlers always answer with the full page; failures show up as an
//! inline banner and the status code of the underlying [`InvoiceError`].
//! Download handlers answer with the file or a plain-text 404.

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::InvoiceError;
use crate::export::{self, CSV_FILE_NAME, CSV_MIME, JSON_FILE_NAME, JSON_MIME};
use crate::extract::resolve_backend;
use crate::pipeline::{encode, llm};
use crate::web::session::{session_cookie, SessionId, UploadedImage};
use crate::web::view::{self, Notice, PageModel};
use crate::web::AppState;

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct CredentialForm {
    #[serde(default)]
    pub api_key: String,
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "OK"
}

/// `GET /`
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, created) = state.sessions.resolve(&headers).await;
    render(&state, id, created, StatusCode::OK, vec![]).await
}

/// `POST /credential`: store (or clear, when blank) the session's access key.
pub async fn set_credential(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CredentialForm>,
) -> Response {
    let (id, created) = state.sessions.resolve(&headers).await;
    let key = form.api_key.trim().to_string();
    let cleared = key.is_empty();
    state
        .sessions
        .update(id, |s| s.credential = (!cleared).then_some(key))
        .await;
    info!(session = %id, cleared, "Credential updated");
    render(&state, id, created, StatusCode::OK, vec![]).await
}

/// `POST /upload`: intake a new image and forget any previous result.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let (id, created) = state.sessions.resolve(&headers).await;

    let (file_name, bytes) = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => break (file_name, bytes),
                    Err(e) => {
                        warn!(session = %id, "Upload body rejected: {}", e);
                        let notice = Notice::error(e.body_text());
                        return render(&state, id, created, e.status(), vec![notice]).await;
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => {
                return error_page(&state, id, created, InvoiceError::NoImage).await;
            }
            Err(e) => {
                warn!(session = %id, "Malformed multipart upload: {}", e);
                let notice = Notice::error(e.body_text());
                return render(&state, id, created, e.status(), vec![notice]).await;
            }
        }
    };

    if !encode::has_accepted_extension(&file_name) {
        clear_upload(&state, id).await;
        let err = InvoiceError::UnsupportedFormat { name: file_name };
        return error_page(&state, id, created, err).await;
    }

    // Decoding a large photo is CPU-bound
    let name = file_name.clone();
    let intake = tokio::task::spawn_blocking(move || encode::intake(&bytes, &name))
        .await
        .map_err(|e| InvoiceError::Internal(format!("intake task failed: {e}")))
        .and_then(|r| r);

    match intake {
        Ok(image) => {
            info!(
                session = %id,
                file = %file_name,
                width = image.width,
                height = image.height,
                "Image uploaded"
            );
            state
                .sessions
                .update(id, |s| s.replace_upload(Some(UploadedImage { file_name, image })))
                .await;
            render(&state, id, created, StatusCode::OK, vec![]).await
        }
        Err(e) => {
            clear_upload(&state, id).await;
            error_page(&state, id, created, e).await
        }
    }
}

/// `POST /extract`: run one extraction for the held image.
pub async fn extract(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, created) = state.sessions.resolve(&headers).await;
    let credential = state
        .sessions
        .with_session(id, |s| s.credential.clone())
        .await;

    let backend = match resolve_backend(&state.config, credential.as_deref()) {
        Ok(b) => b,
        Err(e) => return error_page(&state, id, created, e).await,
    };

    let ticket = match state.sessions.begin_extraction(id).await {
        Ok(ticket) => ticket,
        Err(e) => return error_page(&state, id, created, e).await,
    };
    let generation = ticket.generation;

    // The call runs detached: the session is settled even if the client
    // goes away before the reply. No lock is held across it.
    let sessions = state.sessions.clone();
    let config = Arc::clone(&state.config);
    let call = tokio::spawn(async move {
        let outcome = llm::request_extraction(backend.as_ref(), &ticket.image, &config).await;
        let stored = sessions
            .finish_extraction(id, generation, outcome.as_ref().ok().cloned())
            .await;
        (outcome, stored)
    });

    match call.await {
        Ok((_, false)) => {
            let notice = Notice::warning(view::IMAGE_REPLACED);
            render(&state, id, created, StatusCode::CONFLICT, vec![notice]).await
        }
        Ok((Ok(_), true)) => {
            let notice = Notice::success(view::EXTRACTED);
            render(&state, id, created, StatusCode::OK, vec![notice]).await
        }
        Ok((Err(e), true)) => error_page(&state, id, created, e).await,
        Err(e) => {
            state.sessions.finish_extraction(id, generation, None).await;
            let err = InvoiceError::Internal(format!("extraction task failed: {e}"));
            error_page(&state, id, created, err).await
        }
    }
}

/// `GET /download/json`
pub async fn download_json(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(id) = state.sessions.find(&headers).await else {
        return not_found(NO_RESULT);
    };
    let body = state
        .sessions
        .with_session(id, |s| s.result.as_ref().map(export::to_json_pretty))
        .await;
    match body {
        None => not_found(NO_RESULT),
        Some(Ok(body)) => attachment(JSON_MIME, JSON_FILE_NAME, body),
        Some(Err(e)) => e.into_response(),
    }
}

/// `GET /download/csv`
pub async fn download_csv(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(id) = state.sessions.find(&headers).await else {
        return not_found(NO_RESULT);
    };
    let body = state
        .sessions
        .with_session(id, |s| {
            s.result.as_ref().map(|r| {
                r.has_line_items()
                    .then(|| export::line_items_csv(r.line_items()))
            })
        })
        .await;
    match body {
        None => not_found(NO_RESULT),
        Some(None) => not_found("No line items to download."),
        Some(Some(Ok(body))) => attachment(CSV_MIME, CSV_FILE_NAME, body),
        Some(Some(Err(e))) => e.into_response(),
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

const NO_RESULT: &str = "No extraction result to download.";

async fn clear_upload(state: &AppState, id: SessionId) {
    state.sessions.update(id, |s| s.replace_upload(None)).await
}

async fn error_page(state: &AppState, id: SessionId, created: bool, err: InvoiceError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let notice = if err.is_warning() {
        Notice::warning(err.to_string())
    } else {
        warn!(session = %id, "{}", err);
        Notice::error(err.to_string())
    };
    render(state, id, created, status, vec![notice]).await
}

async fn render(
    state: &AppState,
    id: SessionId,
    created: bool,
    status: StatusCode,
    notices: Vec<Notice>,
) -> Response {
    let credential_required = state.credential_required();
    let html = state
        .sessions
        .with_session(id, |session| {
            view::render_page(&PageModel {
                session,
                notices,
                credential_required,
            })
        })
        .await;
    with_cookie((status, Html(html)).into_response(), id, created)
}

fn attachment(mime: &'static str, file_name: &str, body: String) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(mime)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

fn not_found(message: &'static str) -> Response {
    (StatusCode::NOT_FOUND, message).into_response()
}

fn with_cookie(mut response: Response, id: SessionId, created: bool) -> Response {
    if created {
        response
            .headers_mut()
            .append(header::SET_COOKIE, session_cookie(id));
    }
    response
}
