//! The application object.
//!
//! [`application`] is the single entry point a server binds: it maps the
//! route name [`FILEDB_ROUTE`] to the FileDB resource handler, adds the public
//! health probe, and wraps everything in request tracing. It is built once at
//! startup and shared for the lifetime of the process.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::routes;
use crate::state::AppState;

/// Route name under which the FileDB handler is mounted.
pub const FILEDB_ROUTE: &str = "filedb";

/// The FileDB resource handler: `/filedb` and `/filedb/{ident}`, behind
/// key-based permissions.
pub fn filedb_handler(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            &format!("/{FILEDB_ROUTE}"),
            get(routes::filedb::missing_ident).post(routes::filedb::post_file),
        )
        .route(
            &format!("/{FILEDB_ROUTE}/{{ident}}"),
            get(routes::filedb::get_file)
                .put(routes::filedb::put_file)
                .delete(routes::filedb::delete_file),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_permission,
        ))
        // Leave room for the size check in FileStore::add to report a JSON error.
        .layer(DefaultBodyLimit::max(
            state.config.server.max_file_size.saturating_add(1),
        ))
}

/// Build the application router.
pub fn application(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .merge(filedb_handler(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
