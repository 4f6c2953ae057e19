use axum::{
    Router,
    routing::{get, put},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pending-books", get(handler::pending_books))
        .route("/books/:id/status", put(handler::update_book_status))
        .route("/users", get(handler::list_users))
        .route("/stats/users", get(handler::user_stats))
        .route("/stats/activity", get(handler::activity_stats))
        .route("/stats/system", get(handler::system_stats))
}
