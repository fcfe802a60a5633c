//! End-to-end tests that exercise the HTTP surface against a real server
//! bound to an ephemeral port, with a throwaway database and media dir.

use std::sync::Arc;

use reqwest::redirect::Policy;
use reqwest::Client;

use armenie_console::config::Config;
use armenie_console::db::Repository;
use armenie_console::importer::Importer;
use armenie_console::models::{NewPost, PostStatus};
use armenie_console::routes;
use armenie_console::state::AppState;

struct TestServer {
    base: String,
    repo: Arc<Repository>,
    _dir: tempfile::TempDir,
}

async fn start_server() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.db_path = dir.path().join("site.db");
    config.media_dir = dir.path().join("media");
    config.admin_pass = "secret".to_string();
    config.feeds = Vec::new();

    let repo = Arc::new(
        Repository::new(&config.db_path.to_string_lossy())
            .await
            .unwrap(),
    );
    let importer = Arc::new(Importer::new(repo.clone(), config.clone()).unwrap());
    let state = AppState::new(repo.clone(), config, importer);

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        repo,
        _dir: dir,
    }
}

fn client() -> Client {
    // Redirects stay visible so tests can assert on them and capture cookies.
    Client::builder().redirect(Policy::none()).build().unwrap()
}

async fn seed_post(repo: &Repository, n: u32) -> i64 {
    repo.insert_post(NewPost {
        guid: format!("guid-{}", n),
        orig_link: format!("https://exemple.am/article/{}", n),
        title: format!("Titre numéro {}", n),
        body: "Corps de l'article importé.".to_string(),
        image_url: None,
        image_sha1: None,
        source: "test".to_string(),
        lang_verified: true,
    })
    .await
    .unwrap()
}

/// Log in with the admin password and return the session cookie pair.
async fn login(client: &Client, base: &str) -> String {
    let response = client
        .post(format!("{}/admin", base))
        .form(&[("password", "secret")])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());

    let set_cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("login should set a session cookie")
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("console_session="));
    set_cookie
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let server = start_server().await;
    let response = client()
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn home_page_lists_only_published_posts() {
    let server = start_server().await;
    let draft_id = seed_post(&server.repo, 1).await;
    let published_id = seed_post(&server.repo, 2).await;
    server.repo.publish(published_id).await.unwrap();

    let body = client()
        .get(format!("{}/", server.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("Titre numéro 2"));
    assert!(!body.contains("Titre numéro 1"));

    // The draft is still there, just not visible.
    let draft = server.repo.get_post(draft_id).await.unwrap().unwrap();
    assert_eq!(draft.status, PostStatus::Draft);
}

#[tokio::test]
async fn feed_xml_is_valid_rss_when_empty() {
    let server = start_server().await;
    let response = client()
        .get(format!("{}/feed.xml", server.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("application/rss+xml"));

    let body = response.text().await.unwrap();
    assert!(body.starts_with("<?xml"));
    assert!(body.contains("<rss version=\"2.0\""));
    assert!(body.contains("</channel>"));
}

#[tokio::test]
async fn feed_xml_contains_published_items() {
    let server = start_server().await;
    let id = seed_post(&server.repo, 7).await;
    server.repo.publish(id).await.unwrap();

    let body = client()
        .get(format!("{}/feed.xml", server.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("Titre numéro 7"));
    assert!(body.contains("https://exemple.am/article/7"));
}

#[tokio::test]
async fn admin_page_shows_login_without_session() {
    let server = start_server().await;
    let body = client()
        .get(format!("{}/admin", server.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Mot de passe"));
    assert!(body.contains("type=\"password\""));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let server = start_server().await;
    let response = client()
        .post(format!("{}/admin", server.base))
        .form(&[("password", "wrong")])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let cookies: Vec<_> = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().all(|c| !c.starts_with("console_session=")));
    assert!(cookies.iter().any(|c| c.starts_with("flash=")));
}

#[tokio::test]
async fn save_requires_a_session() {
    let server = start_server().await;
    let id = seed_post(&server.repo, 3).await;

    let response = client()
        .post(format!("{}/save/{}", server.base, id))
        .form(&[
            ("title", "Titre"),
            ("body", "Corps"),
            ("link", "https://exemple.am/article/3"),
            ("action", "publish"),
        ])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let post = server.repo.get_post(id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Draft);
}

#[tokio::test]
async fn login_edit_and_publish_flow() {
    let server = start_server().await;
    let id = seed_post(&server.repo, 4).await;

    let client = client();
    let cookie = login(&client, &server.base).await;

    // Dashboard shows the draft.
    let dashboard = client
        .get(format!("{}/admin", server.base))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(dashboard.contains("Titre numéro 4"));

    // Edit the title and publish in one action.
    let response = client
        .post(format!("{}/save/{}", server.base, id))
        .header(reqwest::header::COOKIE, &cookie)
        .form(&[
            ("title", "Titre corrigé"),
            ("body", "Corps relu et corrigé."),
            ("link", "https://exemple.am/article/4"),
            ("action", "publish"),
        ])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());

    let post = server.repo.get_post(id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Published);
    assert_eq!(post.title, "Titre corrigé");

    // And it now appears on the public page.
    let home = client
        .get(format!("{}/", server.base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(home.contains("Titre corrigé"));
}

#[tokio::test]
async fn schedule_action_sets_status_and_timestamp() {
    let server = start_server().await;
    let id = seed_post(&server.repo, 6).await;

    let client = client();
    let cookie = login(&client, &server.base).await;

    let response = client
        .post(format!("{}/save/{}", server.base, id))
        .header(reqwest::header::COOKIE, &cookie)
        .form(&[
            ("title", "Titre numéro 6"),
            ("body", "Corps de l'article importé."),
            ("link", "https://exemple.am/article/6"),
            ("publish_at", "2030-01-01T08:00"),
            ("action", "schedule"),
        ])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());

    let post = server.repo.get_post(id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
    assert!(post.publish_at.is_some());
}

#[tokio::test]
async fn invalid_schedule_datetime_flashes_and_keeps_draft() {
    let server = start_server().await;
    let id = seed_post(&server.repo, 8).await;

    let client = client();
    let cookie = login(&client, &server.base).await;

    let response = client
        .post(format!("{}/save/{}", server.base, id))
        .header(reqwest::header::COOKIE, &cookie)
        .form(&[
            ("title", "Titre numéro 8"),
            ("body", "Corps de l'article importé."),
            ("link", "https://exemple.am/article/8"),
            ("publish_at", "pas-une-date"),
            ("action", "schedule"),
        ])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let cookies: Vec<_> = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("flash=")));

    let post = server.repo.get_post(id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Draft);
    assert!(post.publish_at.is_none());
}

#[tokio::test]
async fn feed_xml_honors_forwarded_proto() {
    let server = start_server().await;
    let id = seed_post(&server.repo, 9).await;
    server.repo.publish(id).await.unwrap();

    let body = client()
        .get(format!("{}/feed.xml", server.base))
        .header("x-forwarded-proto", "https")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("<link>https://"));
}

#[tokio::test]
async fn delete_action_removes_the_post() {
    let server = start_server().await;
    let id = seed_post(&server.repo, 5).await;

    let client = client();
    let cookie = login(&client, &server.base).await;

    let response = client
        .post(format!("{}/save/{}", server.base, id))
        .header(reqwest::header::COOKIE, &cookie)
        .form(&[
            ("title", ""),
            ("body", ""),
            ("link", ""),
            ("action", "delete"),
        ])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());
    assert!(server.repo.get_post(id).await.unwrap().is_none());
}

#[tokio::test]
async fn settings_round_trip_through_the_form() {
    let server = start_server().await;
    let client = client();
    let cookie = login(&client, &server.base).await;

    let response = client
        .post(format!("{}/save-settings", server.base))
        .header(reqwest::header::COOKIE, &cookie)
        .form(&[
            ("feeds", "https://exemple.am/rss"),
            ("openai_api_key", ""),
            ("openai_model", "gpt-4o-mini"),
            ("default_image", ""),
            ("import_interval_min", "15"),
            ("signature", "— Test"),
            ("scrapers", "[]"),
        ])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());

    let map = server.repo.get_settings_map().await.unwrap();
    assert_eq!(map.get("feeds").map(String::as_str), Some("https://exemple.am/rss"));
    assert_eq!(map.get("import_interval_min").map(String::as_str), Some("15"));
    // Unchecked checkbox persists as off.
    assert_eq!(map.get("require_image").map(String::as_str), Some("0"));
}

#[tokio::test]
async fn logout_clears_the_session() {
    let server = start_server().await;
    let client = client();
    let cookie = login(&client, &server.base).await;

    let response = client
        .get(format!("{}/logout", server.base))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_redirection());

    // The old token no longer grants access: /admin shows the login form.
    let body = client
        .get(format!("{}/admin", server.base))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("type=\"password\""));
}
