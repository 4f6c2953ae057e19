use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::gemini::TextModel;
use crate::mailer::Mailer;
use crate::razorpay::PaymentGateway;
use crate::supabase::Supabase;

#[derive(Clone)]
pub struct AppState {
    pub supabase: Arc<Supabase>,
    pub payments: Arc<PaymentGateway>,
    pub ai: Arc<TextModel>,
    pub mailer: Arc<Mailer>,
}

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct BookQueryParams {
    pub q: Option<String>,
    pub genre: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
    pub offset: u32,
}

impl BookQueryParams {
    pub fn window(&self) -> PageWindow {
        let page = self.page.unwrap_or(DEFAULT_PAGE).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        // page and limit come straight off the query string, so the offset
        // must not overflow on absurd page numbers.
        PageWindow {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

// ============================================================================
// Response helpers
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn success<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

pub fn not_found(msg: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

pub fn bad_request(msg: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

pub fn forbidden(msg: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "message": msg })),
    )
        .into_response()
}

pub fn internal_error(msg: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(json!({
        "message": "LibroVault backend is running",
        "status": "OK",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<u32>, limit: Option<u32>) -> BookQueryParams {
        BookQueryParams {
            q: None,
            genre: None,
            page,
            limit,
        }
    }

    #[test]
    fn test_window_defaults() {
        let w = params(None, None).window();
        assert_eq!(w.page, 1);
        assert_eq!(w.limit, 10);
        assert_eq!(w.offset, 0);
    }

    #[test]
    fn test_window_clamps_limit_and_page() {
        let w = params(Some(0), Some(500)).window();
        assert_eq!(w.page, 1);
        assert_eq!(w.limit, MAX_LIMIT);

        let w = params(Some(3), Some(0)).window();
        assert_eq!(w.limit, 1);
        assert_eq!(w.offset, 2);
    }

    #[test]
    fn test_window_survives_huge_page_numbers() {
        let w = params(Some(u32::MAX), Some(50)).window();
        assert_eq!(w.page, u32::MAX);
        assert_eq!(w.limit, 50);
        assert_eq!(w.offset, u32::MAX);
    }

    #[test]
    fn test_window_offset() {
        let w = params(Some(4), Some(10)).window();
        assert_eq!(w.offset, 30);
    }
}
