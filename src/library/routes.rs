use axum::{
    Router,
    routing::{get, put},
};

use super::handler;
use crate::handler::AppState;

// Full paths here: these routes sit beside the nested routers under /api.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/my-bookmarks", get(handler::my_bookmarks))
        .route("/api/bookmarks/:id", put(handler::save_bookmark))
        .route("/api/my-purchases", get(handler::my_purchases))
}
