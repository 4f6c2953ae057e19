use axum::{
    Json,
    extract::State,
    response::Response,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

use crate::auth::Identity;
use crate::handler::{AppState, bad_request, internal_error, success};
use crate::model::{Book, BookStatus, Genre, ReadingHistoryEntry};
use crate::supabase::TableQuery;

const HISTORY_WINDOW: u32 = 5;
// Candidate cap so the prompt stays bounded.
const MAX_CANDIDATES: usize = 50;

#[derive(Debug, Deserialize)]
struct CandidateBook {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    genre: Option<Genre>,
}

fn empty_recommendations() -> Response {
    success(json!({ "recommendations": [] }))
}

pub async fn recommendations(State(state): State<AppState>, user: Identity) -> Response {
    let history_query = TableQuery::new()
        .select("books(title,genre)")
        .eq("user_id", user.id())
        .order_desc("read_at")
        .limit(HISTORY_WINDOW);

    let history = match state
        .supabase
        .select::<ReadingHistoryEntry>("reading_history", history_query)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("failed to fetch reading history: {:#}", e);
            return internal_error("Failed to fetch recommendations");
        }
    };

    let read_books: Vec<_> = history.into_iter().filter_map(|e| e.books).collect();
    if read_books.is_empty() {
        return empty_recommendations();
    }

    let read_titles: BTreeSet<String> = read_books
        .iter()
        .filter_map(|b| b.title.clone())
        .collect();
    let read_genres: BTreeSet<String> = read_books
        .iter()
        .filter_map(|b| b.genre.as_ref())
        .flat_map(Genre::names)
        .collect();

    let candidates = match approved_candidates(&state).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to fetch candidate books: {:#}", e);
            return internal_error("Failed to fetch recommendations");
        }
    };
    let candidates: Vec<_> = candidates
        .into_iter()
        .filter(|c| {
            c.title
                .as_ref()
                .map(|t| !read_titles.contains(t))
                .unwrap_or(false)
        })
        .collect();
    if candidates.is_empty() {
        return empty_recommendations();
    }

    let prompt = recommendation_prompt(&read_genres, &candidates);
    let reply = state.ai.generate(&prompt).await;
    respond_with_titles(&state, &reply).await
}

#[derive(Debug, Deserialize)]
pub struct DiscoverRequest {
    pub topic_or_author: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

pub async fn discover(
    State(state): State<AppState>,
    _user: Identity,
    Json(payload): Json<DiscoverRequest>,
) -> Response {
    let Some(topic) = payload
        .topic_or_author
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    else {
        return bad_request("Topic or author is required");
    };
    let style = payload.style.as_deref().unwrap_or("similar");

    let candidates = match approved_candidates(&state).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to fetch candidate books: {:#}", e);
            return internal_error("Failed to fetch recommendations");
        }
    };

    let listed: Vec<String> = candidates
        .iter()
        .filter_map(|c| match (&c.title, &c.author) {
            (Some(t), Some(a)) => Some(format!("'{}' by {}", t, a)),
            _ => None,
        })
        .take(MAX_CANDIDATES)
        .collect();
    if listed.is_empty() {
        return empty_recommendations();
    }

    let prompt = discover_prompt(topic, style, &listed);
    let reply = state.ai.generate(&prompt).await;
    respond_with_titles(&state, &reply).await
}

async fn approved_candidates(state: &AppState) -> anyhow::Result<Vec<CandidateBook>> {
    let query = TableQuery::new()
        .select("title,author,genre")
        .eq("status", BookStatus::Approved.as_str());
    state.supabase.select("books", query).await
}

/// Parse the model reply into titles and return the matching catalog rows.
/// An empty or unparseable reply is an empty list, never an error.
async fn respond_with_titles(state: &AppState, reply: &str) -> Response {
    let titles = parse_titles(reply);
    if titles.is_empty() {
        return empty_recommendations();
    }

    let query = TableQuery::new()
        .eq("status", BookStatus::Approved.as_str())
        .any_of("title", &titles);

    match state.supabase.select::<Book>("books", query).await {
        Ok(books) => success(json!({ "recommendations": books })),
        Err(e) => {
            tracing::error!("failed to resolve recommended titles: {:#}", e);
            internal_error("Failed to fetch recommendations")
        }
    }
}

fn recommendation_prompt(read_genres: &BTreeSet<String>, candidates: &[CandidateBook]) -> String {
    let genres = if read_genres.is_empty() {
        "N/A".to_string()
    } else {
        read_genres.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    let listed = candidates
        .iter()
        .take(MAX_CANDIDATES)
        .filter_map(|c| {
            let title = c.title.as_deref()?;
            let genre_names = c.genre.as_ref().map(Genre::names).unwrap_or_default();
            Some(format!("'{}' (Genres: {})", title, genre_names.join(", ")))
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "A user enjoys genres: {}. From this list, recommend up to 3 books they might \
         enjoy: {}. Respond with only a comma-separated list of titles.",
        genres, listed
    )
}

fn discover_prompt(topic: &str, style: &str, listed: &[String]) -> String {
    let catalog = listed.join(", ");
    if style == "similar" {
        format!(
            "Recommend up to 3 books similar to '{}' from this list: {}. Respond ONLY \
             with a comma-separated list of exact book titles.",
            topic, catalog
        )
    } else {
        format!(
            "Based on interest in '{}', recommend 3 surprising choices from this list: {}. \
             Respond ONLY with a comma-separated list of exact book titles.",
            topic, catalog
        )
    }
}

/// Split a comma-separated model reply into cleaned-up titles.
pub fn parse_titles(reply: &str) -> Vec<String> {
    reply
        .split(',')
        .map(|t| t.trim().trim_matches('\'').trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_titles_trims_quotes_and_whitespace() {
        let titles = parse_titles(" 'Dune' , Hyperion ,'The Dispossessed'");
        assert_eq!(titles, vec!["Dune", "Hyperion", "The Dispossessed"]);
    }

    #[test]
    fn test_parse_titles_drops_empty_entries() {
        assert!(parse_titles("").is_empty());
        assert!(parse_titles(" , ,, ").is_empty());
    }

    #[test]
    fn test_recommendation_prompt_lists_genres_and_candidates() {
        let genres: BTreeSet<String> = ["sci-fi".to_string()].into_iter().collect();
        let candidates = vec![CandidateBook {
            title: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            genre: Some(Genre::Many(vec!["sci-fi".to_string(), "classic".to_string()])),
        }];

        let prompt = recommendation_prompt(&genres, &candidates);
        assert!(prompt.contains("genres: sci-fi"));
        assert!(prompt.contains("'Dune' (Genres: sci-fi, classic)"));
    }

    #[test]
    fn test_recommendation_prompt_without_genres() {
        let prompt = recommendation_prompt(&BTreeSet::new(), &[]);
        assert!(prompt.contains("genres: N/A"));
    }

    #[test]
    fn test_discover_prompt_styles() {
        let listed = vec!["'Dune' by Frank Herbert".to_string()];
        let similar = discover_prompt("Asimov", "similar", &listed);
        assert!(similar.starts_with("Recommend up to 3 books similar to 'Asimov'"));

        let surprise = discover_prompt("Asimov", "surprise", &listed);
        assert!(surprise.starts_with("Based on interest in 'Asimov'"));
    }
}
