use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::auth::Identity;
use crate::books::backfill_summary;
use crate::handler::{AppState, bad_request, forbidden, internal_error, not_found, success};
use crate::model::{Book, BookStatus};
use crate::supabase::TableQuery;

const STORAGE_LIMIT_BYTES: u64 = 5 * 1024 * 1024 * 1024;
const STORAGE_BUCKETS: [&str; 2] = ["ebooks", "covers"];

fn require_admin(user: &Identity) -> Option<Response> {
    if user.is_admin() {
        None
    } else {
        Some(forbidden("Admin access required!"))
    }
}

pub async fn pending_books(State(state): State<AppState>, user: Identity) -> Response {
    if let Some(denied) = require_admin(&user) {
        return denied;
    }

    let query = TableQuery::new().eq("status", BookStatus::Pending.as_str());
    match state.supabase.select::<Book>("books", query).await {
        Ok(books) => success(books),
        Err(e) => {
            tracing::error!("failed to list pending books: {:#}", e);
            internal_error("Failed to fetch pending books")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
}

pub async fn update_book_status(
    State(state): State<AppState>,
    user: Identity,
    Path(book_id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Response {
    if let Some(denied) = require_admin(&user) {
        return denied;
    }

    let new_status = match payload.status.as_deref().and_then(BookStatus::from_str) {
        Some(s @ (BookStatus::Approved | BookStatus::Rejected)) => s,
        _ => return bad_request("Invalid status provided"),
    };

    let before = match state
        .supabase
        .select_optional::<Book>("books", TableQuery::new().eq("id", &book_id))
        .await
    {
        Ok(Some(book)) => book,
        Ok(None) => return not_found("Book not found"),
        Err(e) => {
            tracing::error!("failed to get book {}: {:#}", book_id, e);
            return internal_error("Failed to update book status");
        }
    };

    let updated = match state
        .supabase
        .update::<Book>(
            "books",
            TableQuery::new().eq("id", &book_id),
            &json!({ "status": new_status.as_str() }),
        )
        .await
    {
        Ok(mut rows) if !rows.is_empty() => rows.remove(0),
        Ok(_) => return internal_error("Failed to update book status"),
        Err(e) => {
            tracing::error!("failed to update book {} status: {:#}", book_id, e);
            return internal_error("Failed to update book status");
        }
    };

    if new_status == BookStatus::Approved {
        if before.summary.is_none() {
            backfill_summary(&state, &updated).await;
        }
        notify_uploader(&state, &before, &updated).await;
    }

    success(json!({
        "message": format!("Status updated to {}!", new_status.as_str()),
        "book": updated,
    }))
}

/// Look up the uploader's email through the auth service and send the
/// approval notification. Best effort: failures are logged, the moderation
/// request still succeeds.
async fn notify_uploader(state: &AppState, before: &Book, updated: &Book) {
    let Some(uploader_id) = before.user_id.as_deref() else {
        return;
    };

    match state.supabase.admin_get_user(uploader_id).await {
        Ok(Some(uploader)) => {
            if let Some(email) = uploader.email.as_deref() {
                state.mailer.send_approval(email, &updated.title).await;
            }
        }
        Ok(None) => {
            tracing::warn!("uploader {} not found in auth service", uploader_id);
        }
        Err(e) => {
            tracing::warn!(
                "failed to resolve uploader {} for notification: {:#}",
                uploader_id,
                e
            );
        }
    }
}

pub async fn list_users(State(state): State<AppState>, user: Identity) -> Response {
    if let Some(denied) = require_admin(&user) {
        return denied;
    }

    match state.supabase.admin_list_users().await {
        Ok(users) => success(users),
        Err(e) => {
            tracing::error!("failed to list users: {:#}", e);
            internal_error("Failed to fetch users")
        }
    }
}

pub async fn user_stats(State(state): State<AppState>, user: Identity) -> Response {
    if let Some(denied) = require_admin(&user) {
        return denied;
    }

    match state.supabase.rpc("get_monthly_signups", json!({}), None).await {
        Ok(data) => success(data),
        Err(e) => {
            tracing::error!("failed to fetch signup stats: {:#}", e);
            internal_error("Failed to fetch signup stats")
        }
    }
}

pub async fn activity_stats(State(state): State<AppState>, user: Identity) -> Response {
    if let Some(denied) = require_admin(&user) {
        return denied;
    }

    match state
        .supabase
        .rpc("get_monthly_reading_activity", json!({}), None)
        .await
    {
        Ok(data) => success(data),
        Err(e) => {
            tracing::error!("failed to fetch activity stats: {:#}", e);
            internal_error("Failed to fetch activity stats")
        }
    }
}

pub async fn system_stats(State(state): State<AppState>, user: Identity) -> Response {
    if let Some(denied) = require_admin(&user) {
        return denied;
    }

    let mut total_size_bytes: u64 = 0;
    for bucket in STORAGE_BUCKETS {
        match state.supabase.storage_list(bucket).await {
            Ok(objects) => total_size_bytes += total_object_size(&objects),
            Err(e) => {
                tracing::error!("failed to list storage bucket {}: {:#}", bucket, e);
                return internal_error("Failed to fetch system stats");
            }
        }
    }

    let mut rng = rand::thread_rng();
    success(json!({
        "serverLoad": rng.gen_range(30..=60),
        "dbConnections": rng.gen_range(50..=80),
        "storageCapacity": storage_percentage(total_size_bytes, STORAGE_LIMIT_BYTES),
    }))
}

fn total_object_size(objects: &[JsonValue]) -> u64 {
    objects
        .iter()
        .filter_map(|o| o.pointer("/metadata/size").and_then(JsonValue::as_u64))
        .sum()
}

/// Used storage as a percentage of the cap, rounded to two decimals.
fn storage_percentage(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    let pct = used as f64 / limit as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_total_object_size_skips_missing_metadata() {
        let objects = vec![
            json!({ "name": "a.pdf", "metadata": { "size": 100 } }),
            json!({ "name": "b.pdf", "metadata": {} }),
            json!({ "name": "folder" }),
            json!({ "name": "c.jpg", "metadata": { "size": 50 } }),
        ];
        assert_eq!(total_object_size(&objects), 150);
    }

    #[test]
    fn test_storage_percentage_rounds_to_two_decimals() {
        assert_eq!(storage_percentage(1024 * 1024 * 1024, STORAGE_LIMIT_BYTES), 20.0);
        assert_eq!(storage_percentage(0, STORAGE_LIMIT_BYTES), 0.0);
        assert_eq!(storage_percentage(1, 0), 0.0);

        let third = storage_percentage(STORAGE_LIMIT_BYTES / 3, STORAGE_LIMIT_BYTES);
        assert_eq!(third, 33.33);
    }

    #[test]
    fn test_status_validation_only_accepts_moderation_outcomes() {
        assert!(matches!(
            BookStatus::from_str("approved"),
            Some(BookStatus::Approved)
        ));
        assert!(matches!(
            BookStatus::from_str("rejected"),
            Some(BookStatus::Rejected)
        ));
        // "pending" parses but is not a valid moderation outcome.
        let status = BookStatus::from_str("pending");
        assert!(!matches!(
            status,
            Some(BookStatus::Approved | BookStatus::Rejected)
        ));
    }
}
