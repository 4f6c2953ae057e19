use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::access;
use crate::auth::Identity;
use crate::handler::{
    AppState, BookQueryParams, bad_request, created, internal_error, not_found, success,
};
use crate::model::{Book, BookStatus, NewBookRequest};
use crate::pdf_extract::{SUMMARY_EXCERPT_CHARS, SUMMARY_PAGE_COUNT, excerpt, first_pages_text};
use crate::supabase::TableQuery;

pub async fn list_books(
    State(state): State<AppState>,
    _user: Identity,
    Query(params): Query<BookQueryParams>,
) -> Response {
    let window = params.window();

    let mut query = TableQuery::new().eq("status", BookStatus::Approved.as_str());
    if let Some(genre) = params.genre.as_deref().filter(|g| !g.is_empty()) {
        query = query.eq("genre", genre);
    }
    if let Some(term) = params.q.as_deref().filter(|q| !q.is_empty()) {
        query = query.search(&["title", "author"], term);
    }
    query = query
        .order_desc("created_at")
        .limit(window.limit)
        .offset(window.offset);

    match state.supabase.select_counted::<Book>("books", query).await {
        Ok((books, total)) => success(json!({ "books": books, "totalCount": total })),
        Err(e) => {
            tracing::error!("failed to list books: {:#}", e);
            internal_error("Failed to fetch books")
        }
    }
}

pub async fn get_book(
    State(state): State<AppState>,
    user: Identity,
    Path(book_id): Path<String>,
) -> Response {
    let query = TableQuery::new()
        .eq("id", &book_id)
        .eq("status", BookStatus::Approved.as_str());

    let book = match state.supabase.select_optional::<Book>("books", query).await {
        Ok(Some(book)) => book,
        Ok(None) => return not_found("Book not found or not approved"),
        Err(e) => {
            tracing::error!("failed to get book {}: {:#}", book_id, e);
            return internal_error("Failed to fetch book");
        }
    };

    log_reading_history(&state, user.id(), &book_id).await;

    success(book)
}

/// Best-effort reading-history insert. Only logged when the user has a
/// profile row, since the history table's foreign key points there.
async fn log_reading_history(state: &AppState, user_id: &str, book_id: &str) {
    let profile = state
        .supabase
        .select_optional::<JsonValue>("users", TableQuery::new().select("id").eq("id", user_id))
        .await;

    match profile {
        Ok(Some(_)) => {
            let row = json!({ "user_id": user_id, "book_id": book_id });
            if let Err(e) = state
                .supabase
                .insert::<JsonValue>("reading_history", &row)
                .await
            {
                tracing::warn!("failed to log reading history: {:#}", e);
            }
        }
        Ok(None) => {
            tracing::warn!("cannot log reading history: user {} has no profile", user_id);
        }
        Err(e) => {
            tracing::warn!("reading history profile check failed: {:#}", e);
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file_url: Option<String>,
}

pub async fn proxy_book_file(
    State(state): State<AppState>,
    _user: Identity,
    Path(book_id): Path<String>,
) -> Response {
    let query = TableQuery::new()
        .select("file_url")
        .eq("id", &book_id)
        .eq("status", BookStatus::Approved.as_str());

    let file_url = match state.supabase.select_optional::<FileRef>("books", query).await {
        Ok(Some(FileRef {
            file_url: Some(url),
        })) => url,
        Ok(_) => return not_found("Book file not found or not accessible"),
        Err(e) => {
            tracing::error!("failed to resolve book file {}: {:#}", book_id, e);
            return internal_error("Failed to fetch book file");
        }
    };

    match state.supabase.fetch_file(&file_url).await {
        Ok(upstream) => stream_file(upstream, None),
        Err(e) => {
            tracing::error!("failed to proxy book file {}: {:#}", book_id, e);
            internal_error("Failed to fetch book file")
        }
    }
}

pub async fn download_book_file(
    State(state): State<AppState>,
    user: Identity,
    Path(book_id): Path<String>,
) -> Response {
    let book = match state
        .supabase
        .select_optional::<Book>("books", TableQuery::new().eq("id", &book_id))
        .await
    {
        Ok(Some(book)) => book,
        Ok(None) => return not_found("Book not found"),
        Err(e) => {
            tracing::error!("failed to get book {}: {:#}", book_id, e);
            return internal_error("Failed to fetch book");
        }
    };

    let is_owner = access::is_owner(&book, &user.0);
    if access::needs_purchase_check(user.is_admin(), is_owner, book.is_pro) {
        let purchase = state
            .supabase
            .select_optional::<JsonValue>(
                "purchases",
                TableQuery::new()
                    .select("id")
                    .eq("user_id", user.id())
                    .eq("book_id", &book_id),
            )
            .await;

        match purchase {
            Ok(Some(_)) => {}
            Ok(None) => {
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "error": "You do not have permission to download this book."
                    })),
                )
                    .into_response();
            }
            Err(e) => {
                tracing::error!("purchase lookup failed for {}: {:#}", book_id, e);
                return internal_error("Failed to check purchase");
            }
        }
    }

    let Some(file_url) = book.file_url.as_deref() else {
        return not_found("Book file not found");
    };

    match state.supabase.fetch_file(file_url).await {
        Ok(upstream) => {
            let filename = format!("{}.pdf", sanitize_filename(&book.title));
            let disposition = format!("attachment; filename=\"{}\"", filename);
            stream_file(upstream, Some(disposition))
        }
        Err(e) => {
            tracing::error!("failed to download book file {}: {:#}", book_id, e);
            internal_error("Failed to fetch book file")
        }
    }
}

/// Stream an upstream file response straight through, preserving its content
/// type (default PDF).
fn stream_file(upstream: reqwest::Response, disposition: Option<String>) -> Response {
    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/pdf")
        .to_string();

    let stream = upstream.bytes_stream().map_err(std::io::Error::other);

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type);
    if let Some(value) = disposition {
        builder = builder.header(CONTENT_DISPOSITION, value);
    }

    match builder.body(Body::from_stream(stream)) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("failed to build file response: {}", e);
            internal_error("Failed to stream file")
        }
    }
}

/// Keep only characters safe for a quoted attachment filename.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect::<String>()
        .trim_end()
        .to_string()
}

pub async fn create_book(
    State(state): State<AppState>,
    user: Identity,
    Json(payload): Json<NewBookRequest>,
) -> Response {
    let (Some(title), Some(author), Some(file_url), Some(cover_image_url), Some(genre)) = (
        payload.title.as_deref(),
        payload.author.as_deref(),
        payload.file_url.as_deref(),
        payload.cover_image_url.as_deref(),
        payload.genre.as_ref(),
    ) else {
        return bad_request("Missing required book information or genre.");
    };

    if genre.is_empty() {
        return bad_request("Missing required book information or genre.");
    }

    let status = if user.is_admin() {
        BookStatus::Approved
    } else {
        BookStatus::Pending
    };
    let is_pro = payload.is_pro.unwrap_or(false);
    let price = if is_pro {
        payload.price.unwrap_or(0.0)
    } else {
        0.0
    };

    let row = json!({
        "title": title,
        "author": author,
        "user_id": user.id(),
        "status": status.as_str(),
        "file_url": file_url,
        "cover_image_url": cover_image_url,
        "genre": genre,
        "summary": payload.summary,
        "is_pro": is_pro,
        "price": price,
    });

    let book = match state.supabase.insert::<Book>("books", &row).await {
        Ok(mut rows) if !rows.is_empty() => rows.remove(0),
        Ok(_) => return internal_error("Failed to add book to database"),
        Err(e) => {
            tracing::error!("failed to insert book: {:#}", e);
            return internal_error("Failed to add book to database");
        }
    };

    let message = match status {
        BookStatus::Approved => "Book published successfully!",
        _ => "Book submitted for approval!",
    };

    // Direct admin uploads go live immediately, so fill in the missing
    // summary before anyone browses the catalog.
    if status == BookStatus::Approved && book.summary.is_none() {
        backfill_summary(&state, &book).await;
    }

    created(json!({ "message": message, "book": book }))
}

/// Fetch the book's PDF, extract the opening pages, and ask the text model
/// for a one-line catalog summary. Every failure is logged and swallowed;
/// a missing summary never fails the surrounding request.
pub async fn backfill_summary(state: &AppState, book: &Book) {
    let Some(file_url) = book.file_url.as_deref() else {
        return;
    };

    let result: anyhow::Result<()> = async {
        let upstream = state.supabase.fetch_file(file_url).await?;
        let bytes = upstream.bytes().await?;
        let text = first_pages_text(&bytes, SUMMARY_PAGE_COUNT)?;
        if text.trim().is_empty() {
            return Ok(());
        }

        let prompt = format!(
            "Generate a concise, one-line summary for a library catalog based on this text: {}",
            excerpt(&text, SUMMARY_EXCERPT_CHARS)
        );
        let summary = state.ai.generate(&prompt).await;
        if !summary.is_empty() {
            state
                .supabase
                .update::<Book>(
                    "books",
                    TableQuery::new().eq("id", &book.id),
                    &json!({ "summary": summary }),
                )
                .await?;
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        tracing::warn!("ai summary backfill failed for book {}: {:#}", book.id, e);
    }
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: Option<i64>,
}

pub async fn my_rating(
    State(state): State<AppState>,
    user: Identity,
    Path(book_id): Path<String>,
) -> Response {
    let query = TableQuery::new()
        .select("rating")
        .eq("user_id", user.id())
        .eq("book_id", &book_id);

    match state.supabase.select_optional::<JsonValue>("ratings", query).await {
        Ok(row) => success(row),
        Err(e) => {
            tracing::error!("failed to get rating for {}: {:#}", book_id, e);
            success(JsonValue::Null)
        }
    }
}

pub async fn rate_book(
    State(state): State<AppState>,
    user: Identity,
    Path(book_id): Path<String>,
    Json(payload): Json<RateRequest>,
) -> Response {
    let rating = match payload.rating {
        Some(r) if (1..=5).contains(&r) => r,
        _ => return bad_request("A rating between 1 and 5 is required."),
    };

    let row = json!({
        "user_id": user.id(),
        "book_id": book_id,
        "rating": rating,
    });

    match state
        .supabase
        .upsert::<JsonValue>("ratings", &row, "user_id,book_id")
        .await
    {
        Ok(mut rows) if !rows.is_empty() => {
            success(json!({ "message": "Rating saved!", "rating": rows.remove(0) }))
        }
        Ok(_) => internal_error("Failed to save rating"),
        Err(e) => {
            tracing::error!("failed to save rating for {}: {:#}", book_id, e);
            internal_error("Failed to save rating")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_punctuation() {
        assert_eq!(sanitize_filename("Dune: Part Two!"), "Dune Part Two");
        assert_eq!(sanitize_filename("plain_title 2"), "plain_title 2");
    }

    #[test]
    fn test_sanitize_filename_trims_trailing_space() {
        assert_eq!(sanitize_filename("Title?!"), "Title");
        assert_eq!(sanitize_filename("A / B"), "A  B");
    }

    #[test]
    fn test_rating_bounds() {
        for r in [0, 6, -1] {
            assert!(!(1..=5).contains(&r));
        }
        for r in 1..=5 {
            assert!((1..=5).contains(&r));
        }
    }
}
