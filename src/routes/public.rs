use askama::Template;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::Result;
use crate::models::PostStatus;
use crate::rss;
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub struct HomePost {
    pub title: String,
    pub link: String,
    pub source: String,
    pub excerpt: String,
    pub image_url: Option<String>,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub posts: Vec<HomePost>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/feed.xml", get(feed_xml))
        .route("/health", get(health))
}

async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let posts = state.repo.list_by_status(PostStatus::Published, 50).await?;
    let posts = posts
        .into_iter()
        .map(|p| HomePost {
            excerpt: excerpt(&p.body, 600),
            title: p.title,
            link: p.orig_link,
            source: p.source,
            image_url: p.image_url,
        })
        .collect();
    Ok(Html(HomeTemplate { posts }))
}

async fn feed_xml(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let posts = state.repo.list_by_status(PostStatus::Published, 100).await?;
    let base_url = base_url(&headers, &state);
    let xml = rss::render_channel(&base_url, &posts);
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    )
        .into_response())
}

async fn health() -> &'static str {
    "OK"
}

/// Reconstruct the externally visible base URL. Behind a TLS-terminating
/// proxy the request arrives as plain HTTP, so the scheme comes from
/// X-Forwarded-Proto when the proxy sets it.
fn base_url(headers: &HeaderMap, state: &AppState) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .filter(|s| *s == "https" || *s == "http")
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.to_string())
        .unwrap_or_else(|| format!("{}:{}", state.config.host, state.config.port));
    format!("{}://{}", scheme, host)
}

fn excerpt(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
