use axum::{
    Router,
    routing::{get, post},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations", get(handler::recommendations))
        .route("/discover", post(handler::discover))
}
