use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Pending,
    Approved,
    Rejected,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Pending => "pending",
            BookStatus::Approved => "approved",
            BookStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(BookStatus::Pending),
            "approved" => Some(BookStatus::Approved),
            "rejected" => Some(BookStatus::Rejected),
            _ => None,
        }
    }
}

/// Genre is stored either as a plain string or as a list, depending on how
/// the row was written. Both shapes pass through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Genre {
    One(String),
    Many(Vec<String>),
}

impl Genre {
    pub fn is_empty(&self) -> bool {
        match self {
            Genre::One(s) => s.trim().is_empty(),
            Genre::Many(v) => v.iter().all(|s| s.trim().is_empty()),
        }
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            Genre::One(s) => vec![s.clone()],
            Genre::Many(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: Option<Genre>,
    pub status: BookStatus,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub is_pro: bool,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub user_id: String,
    pub book_id: String,
    pub page_number: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: String,
    pub book_id: String,
    pub rating: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    #[serde(default)]
    pub user_id: Option<String>,
    pub book_id: String,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
}

/// One reading-history row joined with its book, as returned by the
/// datastore's embedded select (`select=books(title,genre)`).
#[derive(Debug, Clone, Deserialize)]
pub struct ReadingHistoryEntry {
    #[serde(default)]
    pub books: Option<ReadBook>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadBook {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub genre: Option<Genre>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub file_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub genre: Option<Genre>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub is_pro: Option<bool>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Identity resolved from the auth service for the current request.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl AuthUser {
    pub fn role(&self) -> &str {
        self.user_metadata.role.as_deref().unwrap_or("user")
    }

    pub fn is_admin(&self) -> bool {
        self.role() == "admin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_accepts_string_or_list() {
        let one: Genre = serde_json::from_str("\"fiction\"").unwrap();
        assert_eq!(one.names(), vec!["fiction".to_string()]);

        let many: Genre = serde_json::from_str("[\"fiction\",\"history\"]").unwrap();
        assert_eq!(many.names(), vec!["fiction".to_string(), "history".to_string()]);
    }

    #[test]
    fn test_auth_user_role_defaults_to_user() {
        let user: AuthUser =
            serde_json::from_str(r#"{"id":"u1","email":"a@b.c","user_metadata":{}}"#).unwrap();
        assert_eq!(user.role(), "user");
        assert!(!user.is_admin());

        let admin: AuthUser =
            serde_json::from_str(r#"{"id":"u2","user_metadata":{"role":"admin"}}"#).unwrap();
        assert!(admin.is_admin());
    }

    #[test]
    fn test_book_status_round_trip() {
        assert_eq!(BookStatus::from_str("Approved"), Some(BookStatus::Approved));
        assert_eq!(BookStatus::Approved.as_str(), "approved");
        assert_eq!(BookStatus::from_str("unknown"), None);
    }
}
