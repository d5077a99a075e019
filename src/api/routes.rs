use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.upload.max_upload_size as usize;

    let mut router = Router::new()
        // Config files
        .route("/config-files", get(handlers::list_config_files))
        .route(
            "/config-files",
            post(handlers::create_config_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/config-files/:id", get(handlers::get_config_file))
        .route("/config-files/:id", delete(handlers::delete_config_file))
        .route("/config-files/:id/parent", put(handlers::attach_parent))
        .route("/config-files/:id/detach", post(handlers::detach_config_file))
        .route("/config-files/:id/content", get(handlers::serve_content))
        // Config sync
        .route("/_internal/config/export", post(handlers::export_config))
        .route("/_internal/config/import", post(handlers::import_config))
        .route("/_internal/cache/clear", post(handlers::clear_cache))
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, cache purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
