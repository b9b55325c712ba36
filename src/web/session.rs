//! Per-browser session state.
//!
//! Each browser gets a random id in the `invoice_session` cookie. The id keys
//! a [`Session`] holding everything one user has done so far: the access key,
//! the uploaded image, the last result. Nothing is persisted. Sessions idle
//! past the TTL are reaped, and a full store evicts its least recently used
//! session.

use crate::config::ServeConfig;
use crate::error::InvoiceError;
use crate::invoice::ExtractionResult;
use crate::pipeline::encode::EncodedImage;
use axum::http::{header, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "invoice_session";

pub type SessionId = Uuid;

/// An image that passed intake, with the name the user uploaded it under.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub image: EncodedImage,
}

/// Everything one browser session holds.
#[derive(Debug, Clone)]
pub struct Session {
    pub credential: Option<String>,
    pub upload: Option<UploadedImage>,
    pub result: Option<ExtractionResult>,
    /// Set while an extraction call is in flight.
    pub busy: bool,
    /// Bumped whenever the held image changes.
    pub generation: u64,
    pub last_seen: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            credential: None,
            upload: None,
            result: None,
            busy: false,
            generation: 0,
            last_seen: Instant::now(),
        }
    }
}

impl Session {
    pub fn has_credential(&self) -> bool {
        self.credential
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }

    /// Swap the held image (or drop it with `None`). The current result goes
    /// too, and so will any result still being computed for the old image.
    pub fn replace_upload(&mut self, upload: Option<UploadedImage>) {
        self.upload = upload;
        self.result = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// The image handed to one extraction, tagged with the generation it belongs to.
#[derive(Debug, Clone)]
pub struct ExtractionTicket {
    pub image: EncodedImage,
    pub generation: u64,
}

/// In-memory session registry shared by all handlers.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, Session>>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        let serve = ServeConfig::default();
        Self::with_limits(serve.session_idle_ttl, serve.max_sessions)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            inner: Arc::default(),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Resolve the session named by the request cookie, creating a fresh one
    /// when the cookie is absent or unknown. Returns the id and whether it
    /// was newly created (so the caller knows to set the cookie).
    pub async fn resolve(&self, headers: &HeaderMap) -> (SessionId, bool) {
        let mut sessions = self.inner.write().await;
        if let Some(id) = touch(&mut sessions, headers) {
            return (id, false);
        }

        if sessions.len() >= self.max_sessions {
            if let Some(evicted) = evict_least_recent(&mut sessions) {
                debug!("Session {} evicted (store full)", evicted);
            }
        }
        let id = Uuid::new_v4();
        sessions.insert(id, Session::default());
        debug!("New session {}", id);
        (id, true)
    }

    /// Like [`resolve`](Self::resolve), but never creates a session.
    pub async fn find(&self, headers: &HeaderMap) -> Option<SessionId> {
        touch(&mut *self.inner.write().await, headers)
    }

    /// Run `f` on the session under the read lock. Unknown ids see an empty
    /// session.
    pub async fn with_session<R>(&self, id: SessionId, f: impl FnOnce(&Session) -> R) -> R {
        let sessions = self.inner.read().await;
        match sessions.get(&id) {
            Some(session) => f(session),
            None => f(&Session::default()),
        }
    }

    /// Apply `f` to the session under the write lock.
    pub async fn update<R>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.inner.write().await;
        f(sessions.entry(id).or_default())
    }

    /// Mark the session busy and hand back the image to extract from.
    ///
    /// Fails with `ExtractionInProgress` when another extraction for the same
    /// session has not finished, and with `NoImage` when nothing was uploaded.
    pub async fn begin_extraction(&self, id: SessionId) -> Result<ExtractionTicket, InvoiceError> {
        let mut sessions = self.inner.write().await;
        let session = sessions.get_mut(&id).ok_or(InvoiceError::NoImage)?;
        if session.busy {
            return Err(InvoiceError::ExtractionInProgress);
        }
        let image = session
            .upload
            .as_ref()
            .map(|u| u.image.clone())
            .ok_or(InvoiceError::NoImage)?;
        session.busy = true;
        Ok(ExtractionTicket {
            image,
            generation: session.generation,
        })
    }

    /// Clear the busy flag and store the outcome. A failed extraction leaves
    /// the session without a result.
    ///
    /// Returns `false` when the outcome was dropped because the image was
    /// replaced (or the session expired) while the call was running.
    pub async fn finish_extraction(
        &self,
        id: SessionId,
        generation: u64,
        result: Option<ExtractionResult>,
    ) -> bool {
        let mut sessions = self.inner.write().await;
        let Some(session) = sessions.get_mut(&id) else {
            return false;
        };
        session.busy = false;
        if session.generation != generation {
            debug!("Session {}: image replaced during extraction, outcome dropped", id);
            return false;
        }
        session.result = result;
        true
    }

    /// Drop every idle session not seen within the TTL. Sessions with an
    /// extraction in flight are kept. Returns how many were dropped.
    pub async fn reap_idle(&self) -> usize {
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.busy || s.last_seen.elapsed() < self.idle_ttl);
        before - sessions.len()
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

fn touch(sessions: &mut HashMap<SessionId, Session>, headers: &HeaderMap) -> Option<SessionId> {
    let id = session_id_from_headers(headers)?;
    let session = sessions.get_mut(&id)?;
    session.last_seen = Instant::now();
    Some(id)
}

fn evict_least_recent(sessions: &mut HashMap<SessionId, Session>) -> Option<SessionId> {
    let oldest = sessions
        .iter()
        .filter(|(_, s)| !s.busy)
        .min_by_key(|(_, s)| s.last_seen)
        .map(|(id, _)| *id)?;
    sessions.remove(&oldest);
    Some(oldest)
}

/// Pull the session id out of the `Cookie` header(s), if any.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// `Set-Cookie` value for a session id.
pub fn session_cookie(id: SessionId) -> HeaderValue {
    // A hyphenated UUID is always a valid header value
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("invoice_session=; Path=/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        h
    }

    #[test]
    fn parses_cookie_among_others() {
        let id = Uuid::new_v4();
        let h = headers_with_cookie(&format!("theme=dark; {SESSION_COOKIE}={id}; x=1"));
        assert_eq!(session_id_from_headers(&h), Some(id));
    }

    #[test]
    fn garbage_cookie_is_ignored() {
        let h = headers_with_cookie(&format!("{SESSION_COOKIE}=not-a-uuid"));
        assert_eq!(session_id_from_headers(&h), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_attributes() {
        let v = session_cookie(Uuid::nil());
        let s = v.to_str().unwrap();
        assert!(s.starts_with("invoice_session=00000000-"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("SameSite=Lax"));
    }

    fn cookie_for(id: SessionId) -> HeaderMap {
        headers_with_cookie(&format!("{SESSION_COOKIE}={id}"))
    }

    fn tiny_upload(name: &str) -> Option<UploadedImage> {
        Some(UploadedImage {
            file_name: name.into(),
            image: EncodedImage {
                base64: "AAAA".into(),
                width: 1,
                height: 1,
            },
        })
    }

    #[tokio::test]
    async fn unknown_cookie_gets_a_new_session() {
        let store = SessionStore::new();
        let (id, created) = store.resolve(&cookie_for(Uuid::new_v4())).await;
        assert!(created);

        let (again, created) = store.resolve(&cookie_for(id)).await;
        assert_eq!(again, id);
        assert!(!created);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn find_never_creates() {
        let store = SessionStore::new();
        assert_eq!(store.find(&HeaderMap::new()).await, None);
        assert_eq!(store.find(&cookie_for(Uuid::new_v4())).await, None);
        assert!(store.is_empty().await);

        let (id, _) = store.resolve(&HeaderMap::new()).await;
        assert_eq!(store.find(&cookie_for(id)).await, Some(id));
    }

    #[tokio::test]
    async fn extraction_needs_an_image_and_is_exclusive() {
        let store = SessionStore::new();
        let (id, _) = store.resolve(&HeaderMap::new()).await;
        assert!(matches!(
            store.begin_extraction(id).await,
            Err(InvoiceError::NoImage)
        ));

        store.update(id, |s| s.replace_upload(tiny_upload("a.png"))).await;

        let ticket = store.begin_extraction(id).await.unwrap();
        assert!(matches!(
            store.begin_extraction(id).await,
            Err(InvoiceError::ExtractionInProgress)
        ));

        assert!(store.finish_extraction(id, ticket.generation, None).await);
        assert!(!store.with_session(id, |s| s.busy).await);
        assert!(store.begin_extraction(id).await.is_ok());
    }

    #[tokio::test]
    async fn outcome_for_a_replaced_image_is_dropped() {
        let store = SessionStore::new();
        let (id, _) = store.resolve(&HeaderMap::new()).await;
        store.update(id, |s| s.replace_upload(tiny_upload("first.png"))).await;
        let ticket = store.begin_extraction(id).await.unwrap();

        store.update(id, |s| s.replace_upload(tiny_upload("second.png"))).await;
        let stored = store
            .finish_extraction(id, ticket.generation, Some(ExtractionResult::default()))
            .await;

        assert!(!stored);
        store
            .with_session(id, |s| {
                assert!(!s.busy);
                assert!(s.result.is_none());
                assert_eq!(s.upload.as_ref().unwrap().file_name, "second.png");
            })
            .await;
    }

    #[tokio::test]
    async fn full_store_evicts_least_recent() {
        let store = SessionStore::with_limits(Duration::from_secs(60), 2);
        let (first, _) = store.resolve(&HeaderMap::new()).await;
        let (second, _) = store.resolve(&HeaderMap::new()).await;
        // Touch the first so the second becomes the oldest
        tokio::time::sleep(Duration::from_millis(2)).await;
        store.resolve(&cookie_for(first)).await;

        let (third, _) = store.resolve(&HeaderMap::new()).await;
        assert_eq!(store.len().await, 2);
        assert_eq!(store.find(&cookie_for(second)).await, None);
        assert_eq!(store.find(&cookie_for(first)).await, Some(first));
        assert_eq!(store.find(&cookie_for(third)).await, Some(third));
    }

    #[tokio::test]
    async fn reaper_keeps_busy_sessions() {
        let store = SessionStore::with_limits(Duration::ZERO, 10);
        let (idle, _) = store.resolve(&HeaderMap::new()).await;
        let (busy, _) = store.resolve(&HeaderMap::new()).await;
        store.update(busy, |s| s.replace_upload(tiny_upload("a.png"))).await;
        store.begin_extraction(busy).await.unwrap();

        assert_eq!(store.reap_idle().await, 1);
        assert_eq!(store.find(&cookie_for(idle)).await, None);
        assert_eq!(store.find(&cookie_for(busy)).await, Some(busy));
    }
}
