use axum::{
    Router,
    routing::{get, post},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list_books))
        .route("/", post(handler::create_book))
        .route("/:id", get(handler::get_book))
        .route("/proxy/:id", get(handler::proxy_book_file))
        .route("/download/:id", get(handler::download_book_file))
        .route("/:id/my-rating", get(handler::my_rating))
        .route("/:id/rate", post(handler::rate_book))
}
