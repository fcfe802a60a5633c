pub mod admin;
pub mod public;

use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(admin::router())
        .nest_service("/media", ServeDir::new(&state.config.media_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
