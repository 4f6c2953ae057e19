use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::collections::HashSet;

use crate::auth::Identity;
use crate::handler::{AppState, bad_request, internal_error, success};
use crate::model::Purchase;
use crate::supabase::TableQuery;

#[derive(Debug, Deserialize)]
pub struct BookmarkParams {
    // Kept as a string: a non-numeric limit is ignored, not a 400.
    pub limit: Option<String>,
}

impl BookmarkParams {
    fn parsed_limit(&self) -> Option<u32> {
        self.limit.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Latest unique bookmarks per book, resolved by the `get_user_bookmarks`
/// datastore function.
pub async fn my_bookmarks(
    State(state): State<AppState>,
    user: Identity,
    Query(params): Query<BookmarkParams>,
) -> Response {
    let args = json!({ "p_user_id": user.id() });

    match state
        .supabase
        .rpc("get_user_bookmarks", args, params.parsed_limit())
        .await
    {
        Ok(rows) => success(rows),
        Err(e) => {
            tracing::error!("failed to fetch bookmarks: {:#}", e);
            internal_error("Failed to fetch bookmarks")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveBookmarkRequest {
    pub page_number: Option<i64>,
}

pub async fn save_bookmark(
    State(state): State<AppState>,
    user: Identity,
    Path(book_id): Path<String>,
    Json(payload): Json<SaveBookmarkRequest>,
) -> Response {
    let page_number = match payload.page_number {
        Some(n) if n >= 1 => n,
        _ => return bad_request("Valid page number is required"),
    };

    let row = json!({
        "user_id": user.id(),
        "book_id": book_id,
        "page_number": page_number,
    });

    match state.supabase.insert::<JsonValue>("bookmarks", &row).await {
        Ok(mut rows) if !rows.is_empty() => {
            success(json!({ "message": "Bookmark saved!", "bookmark": rows.remove(0) }))
        }
        Ok(_) => internal_error("Failed to save bookmark"),
        Err(e) => {
            tracing::error!("failed to save bookmark for {}: {:#}", book_id, e);
            internal_error("Failed to save bookmark")
        }
    }
}

/// Deduplicated list of the caller's purchased book ids.
pub async fn my_purchases(State(state): State<AppState>, user: Identity) -> Response {
    let query = TableQuery::new().select("book_id").eq("user_id", user.id());

    match state.supabase.select::<Purchase>("purchases", query).await {
        Ok(rows) => {
            let ids: HashSet<String> = rows.into_iter().map(|p| p.book_id).collect();
            success(ids.into_iter().collect::<Vec<_>>())
        }
        Err(e) => {
            tracing::error!("failed to fetch purchases: {:#}", e);
            internal_error("Failed to fetch purchases")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmark_limit_parses_digits() {
        let params = BookmarkParams {
            limit: Some("5".to_string()),
        };
        assert_eq!(params.parsed_limit(), Some(5));
    }

    #[test]
    fn test_non_numeric_bookmark_limit_is_ignored() {
        for bad in ["abc", "-1", "1.5", ""] {
            let params = BookmarkParams {
                limit: Some(bad.to_string()),
            };
            assert_eq!(params.parsed_limit(), None, "limit={:?}", bad);
        }
        assert_eq!(BookmarkParams { limit: None }.parsed_limit(), None);
    }
}
