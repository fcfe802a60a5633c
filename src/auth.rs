use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "console_session";
const FLASH_COOKIE: &str = "flash";

const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Logged-in admin sessions. The console has a single shared password, so a
/// session is just a random token; tokens live in memory and die with the
/// process. Tokens expire after [`SESSION_TTL`] and expired ones are pruned
/// on each login, so the map stays bounded by active sessions.
#[derive(Debug)]
pub struct SessionStore {
    tokens: HashMap<String, Instant>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self {
            tokens: HashMap::new(),
            ttl: SESSION_TTL,
        }
    }
}

impl SessionStore {
    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            tokens: HashMap::new(),
            ttl,
        }
    }

    pub fn create(&mut self) -> String {
        let now = Instant::now();
        let ttl = self.ttl;
        self.tokens
            .retain(|_, created| now.duration_since(*created) < ttl);

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        self.tokens.insert(token.clone(), now);
        token
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens
            .get(token)
            .is_some_and(|created| created.elapsed() < self.ttl)
    }

    pub fn remove(&mut self, token: &str) {
        self.tokens.remove(token);
    }
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            (key == name).then_some(val)
        })
}

pub fn session_cookie_header(token: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/",
        SESSION_COOKIE, token
    )
}

pub fn clear_session_cookie_header() -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", SESSION_COOKIE)
}

/// Single-shot flash message, carried in a short-lived cookie and cleared
/// when the admin page renders it.
pub fn flash_cookie_header(message: &str) -> String {
    format!(
        "{}={}; Path=/; Max-Age=60",
        FLASH_COOKIE,
        urlencoding::encode(message)
    )
}

pub fn clear_flash_cookie_header() -> String {
    format!("{}=; Path=/; Max-Age=0", FLASH_COOKIE)
}

pub fn take_flash(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, FLASH_COOKIE)
        .map(|raw| urlencoding::decode(raw).map(|s| s.into_owned()).unwrap_or_default())
        .filter(|s| !s.is_empty())
}

/// Extractor for routes that require a logged-in admin. Unauthenticated
/// requests are bounced to the login form rather than getting a bare 401.
pub struct AdminUser;

pub struct AuthRedirect;

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        Redirect::to("/admin").into_response()
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = cookie_value(&parts.headers, SESSION_COOKIE) else {
            return Err(AuthRedirect);
        };
        let sessions = state.sessions.lock().await;
        if sessions.contains(token) {
            Ok(AdminUser)
        } else {
            Err(AuthRedirect)
        }
    }
}

/// Like [`AdminUser`] but never rejects; used by GET /admin to decide
/// between login form and dashboard.
pub struct MaybeAdmin(pub bool);

impl FromRequestParts<AppState> for MaybeAdmin {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let authed = match cookie_value(&parts.headers, SESSION_COOKIE) {
            Some(token) => state.sessions.lock().await.contains(token),
            None => false,
        };
        Ok(MaybeAdmin(authed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn create_then_contains_then_remove() {
        let mut store = SessionStore::default();
        let token = store.create();
        assert_eq!(token.len(), 32);
        assert!(store.contains(&token));
        store.remove(&token);
        assert!(!store.contains(&token));
    }

    #[test]
    fn tokens_are_unique() {
        let mut store = SessionStore::default();
        assert_ne!(store.create(), store.create());
    }

    #[test]
    fn expired_tokens_are_rejected_and_pruned() {
        let mut store = SessionStore::with_ttl(Duration::ZERO);
        let token = store.create();
        assert!(!store.contains(&token));

        // The next login sweeps out the stale entry.
        store.create();
        assert!(!store.tokens.contains_key(&token));
        assert_eq!(store.tokens.len(), 1);
    }

    #[test]
    fn cookie_value_walks_multiple_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("a=1; console_session=tok123; b=2"),
        );
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), Some("tok123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn flash_round_trips_through_encoding() {
        let header_value = flash_cookie_header("Publié. À bientôt!");
        let encoded = header_value
            .split(';')
            .next()
            .unwrap()
            .split('=')
            .nth(1)
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("flash={}", encoded)).unwrap(),
        );
        assert_eq!(take_flash(&headers), Some("Publié. À bientôt!".to_string()));
    }
}
