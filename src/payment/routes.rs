use axum::{Router, routing::post};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/order", post(handler::create_order))
        .route("/verify", post(handler::verify_payment))
}
