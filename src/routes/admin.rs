use std::collections::HashMap;

use askama::Template;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::auth::{
    clear_flash_cookie_header, clear_session_cookie_header, flash_cookie_header,
    session_cookie_header, take_flash, AdminUser, MaybeAdmin, SESSION_COOKIE,
};
use crate::error::{AppError, Result};
use crate::models::{keys, PostStatus, Settings};
use crate::routes::public::Html;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(admin_page).post(login))
        .route("/save/{id}", post(save))
        .route("/import-now", post(import_now))
        .route("/save-settings", post(save_settings))
        .route("/logout", get(logout))
}

pub struct PostView {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub link: String,
    pub source: String,
    pub publish_at: String,
    pub lang_verified: bool,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    flash: Option<String>,
}

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminTemplate {
    flash: Option<String>,
    report: Option<String>,
    drafts: Vec<PostView>,
    scheduled: Vec<PostView>,
    published: Vec<PostView>,
    feeds_text: String,
    openai_api_key: String,
    openai_model: String,
    default_image: String,
    require_image: bool,
    import_interval_min: u64,
    signature: String,
    scrapers_json: String,
}

fn view(post: crate::models::Post) -> PostView {
    PostView {
        id: post.id,
        title: post.title,
        body: post.body,
        link: post.orig_link,
        source: post.source,
        publish_at: post
            .publish_at
            .map(|dt| dt.format("%Y-%m-%dT%H:%M").to_string())
            .unwrap_or_default(),
        lang_verified: post.lang_verified,
    }
}

fn redirect_flash(to: &str, message: &str) -> Response {
    (
        [(header::SET_COOKIE, flash_cookie_header(message))],
        Redirect::to(to),
    )
        .into_response()
}

async fn admin_page(
    State(state): State<AppState>,
    MaybeAdmin(authed): MaybeAdmin,
    headers: HeaderMap,
) -> Result<Response> {
    let flash = take_flash(&headers);
    let clear = [(header::SET_COOKIE, clear_flash_cookie_header())];

    if !authed {
        return Ok((clear, Html(LoginTemplate { flash })).into_response());
    }

    let drafts = state.repo.list_by_status(PostStatus::Draft, 200).await?;
    let scheduled = state.repo.list_by_status(PostStatus::Scheduled, 50).await?;
    let published = state.repo.list_by_status(PostStatus::Published, 10).await?;

    let map = state.repo.get_settings_map().await?;
    let settings = Settings::from_map(&map, &state.config)?;
    let report = state.last_report.lock().await.as_ref().map(|r| r.to_string());

    let scrapers_json = settings.scrapers_json();
    let template = AdminTemplate {
        flash,
        report,
        drafts: drafts.into_iter().map(view).collect(),
        scheduled: scheduled.into_iter().map(view).collect(),
        published: published.into_iter().map(view).collect(),
        feeds_text: settings.feeds_text(),
        openai_api_key: settings.openai_api_key.unwrap_or_default(),
        openai_model: settings.openai_model,
        default_image: settings.default_image.unwrap_or_default(),
        require_image: settings.require_image,
        import_interval_min: settings.import_interval_min,
        signature: settings.signature,
        scrapers_json,
    };
    Ok((clear, Html(template)).into_response())
}

#[derive(Deserialize)]
struct LoginForm {
    password: String,
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if form.password == state.config.admin_pass {
        let token = state.sessions.lock().await.create();
        (
            [(header::SET_COOKIE, session_cookie_header(&token))],
            Redirect::to("/admin"),
        )
            .into_response()
    } else {
        redirect_flash("/admin", "Mot de passe incorrect.")
    }
}

#[derive(Deserialize)]
struct SaveForm {
    title: String,
    body: String,
    link: String,
    #[serde(default)]
    publish_at: String,
    action: String,
}

async fn save(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Form(form): Form<SaveForm>,
) -> Result<Response> {
    if state.repo.get_post(id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    if form.action != "delete" {
        state
            .repo
            .update_content(
                id,
                form.title.trim().to_string(),
                form.body.trim().to_string(),
                form.link.trim().to_string(),
            )
            .await?;
    }

    let response = match form.action.as_str() {
        "save" => redirect_flash("/admin", "Enregistré."),
        "publish" => {
            state.repo.publish(id).await?;
            redirect_flash("/admin", "Publié (apparaît sur la page publique et dans /feed.xml).")
        }
        "schedule" => {
            match NaiveDateTime::parse_from_str(&form.publish_at, "%Y-%m-%dT%H:%M") {
                Ok(naive) => {
                    state.repo.schedule(id, naive.and_utc()).await?;
                    redirect_flash("/admin", "Programmé.")
                }
                Err(_) => redirect_flash("/admin", "Date de publication invalide."),
            }
        }
        "unpublish" => {
            state.repo.unpublish(id).await?;
            redirect_flash("/admin", "Repassé en brouillon.")
        }
        "delete" => {
            state.repo.delete_post(id).await?;
            redirect_flash("/admin", "Supprimé.")
        }
        other => redirect_flash("/admin", &format!("Action inconnue: {}", other)),
    };
    Ok(response)
}

async fn import_now(State(state): State<AppState>, _admin: AdminUser) -> Response {
    match state.importer.run().await {
        Ok(report) => {
            let message = format!("Import terminé. {}", report);
            *state.last_report.lock().await = Some(report);
            redirect_flash("/admin", &message)
        }
        Err(e) => {
            tracing::warn!("Manual import failed: {}", e);
            redirect_flash("/admin", &format!("Import échoué: {}", e))
        }
    }
}

#[derive(Deserialize)]
struct SettingsForm {
    feeds: String,
    openai_api_key: String,
    openai_model: String,
    default_image: String,
    #[serde(default)]
    require_image: Option<String>,
    import_interval_min: String,
    signature: String,
    scrapers: String,
}

async fn save_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Form(form): Form<SettingsForm>,
) -> Result<Response> {
    let mut map = HashMap::new();
    map.insert(keys::FEEDS.to_string(), form.feeds.clone());
    map.insert(keys::OPENAI_API_KEY.to_string(), form.openai_api_key.clone());
    map.insert(keys::OPENAI_MODEL.to_string(), form.openai_model.clone());
    map.insert(keys::DEFAULT_IMAGE.to_string(), form.default_image.clone());
    map.insert(
        keys::REQUIRE_IMAGE.to_string(),
        if form.require_image.is_some() { "1" } else { "0" }.to_string(),
    );
    map.insert(
        keys::IMPORT_INTERVAL_MIN.to_string(),
        form.import_interval_min.clone(),
    );
    map.insert(keys::SIGNATURE.to_string(), form.signature.clone());
    map.insert(keys::SCRAPERS.to_string(), form.scrapers.clone());

    // Validate before persisting anything; a bad value flashes back to the
    // form and no setting changes.
    if let Err(e) = Settings::from_map(&map, &state.config) {
        let message = match e {
            AppError::BadRequest(msg) => msg,
            other => other.to_string(),
        };
        return Ok(redirect_flash("/admin", &message));
    }

    for (key, value) in &map {
        state.repo.set_setting(key, value).await?;
    }
    Ok(redirect_flash("/admin", "Paramètres enregistrés."))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = crate::auth::cookie_value(&headers, SESSION_COOKIE) {
        state.sessions.lock().await.remove(token);
    }
    (
        [(header::SET_COOKIE, clear_session_cookie_header())],
        Redirect::to("/"),
    )
        .into_response()
}
