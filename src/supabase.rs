use crate::config::Config;
use crate::model::AuthUser;
use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

// Merge on the conflict key instead of erroring, and hand the row back.
const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=representation";

/// Query-string builder for the datastore's REST endpoint.
///
/// Values are percent-encoded at build time; keys and the filter grammar
/// (`eq.`, `ilike.`, `or=(...)`, `in.(...)`) stay literal.
#[derive(Debug, Clone)]
pub struct TableQuery {
    params: Vec<(String, String)>,
}

impl TableQuery {
    pub fn new() -> Self {
        TableQuery {
            params: vec![("select".to_string(), "*".to_string())],
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params[0].1 = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    /// Case-insensitive substring match across several columns, as an
    /// or-group: `or=(title.ilike.*term*,author.ilike.*term*)`.
    pub fn search(mut self, columns: &[&str], term: &str) -> Self {
        let pattern = format!("*{}*", term);
        let group = columns
            .iter()
            .map(|c| format!("{}.ilike.{}", c, pattern))
            .collect::<Vec<_>>()
            .join(",");
        self.params.push(("or".to_string(), format!("({})", group)));
        self
    }

    pub fn any_of(mut self, column: &str, values: &[String]) -> Self {
        let quoted = values
            .iter()
            .map(|v| format!("\"{}\"", v.replace('"', "")))
            .collect::<Vec<_>>()
            .join(",");
        self.params
            .push((column.to_string(), format!("in.({})", quoted)));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.params
            .push(("order".to_string(), format!("{}.desc", column)));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    pub fn offset(mut self, n: u32) -> Self {
        self.params.push(("offset".to_string(), n.to_string()));
        self
    }

    pub fn build(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl Default for TableQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for the external managed datastore: REST tables, RPC functions,
/// the auth service, storage listing, and raw file fetches.
pub struct Supabase {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl Supabase {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")?;

        Ok(Supabase {
            http,
            base_url: cfg.supabase.url.trim_end_matches('/').to_string(),
            service_key: cfg.supabase.service_key.clone(),
        })
    }

    fn rest_url(&self, table: &str, query: &TableQuery) -> String {
        format!("{}/rest/v1/{}?{}", self.base_url, table, query.build())
    }

    fn service_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn read_rows<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Vec<T>> {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("datastore returned {}: {}", status, body);
        }
        serde_json::from_str(&body).context("failed to decode datastore rows")
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: TableQuery,
    ) -> Result<Vec<T>> {
        let resp = self
            .service_headers(self.http.get(self.rest_url(table, &query)))
            .send()
            .await
            .with_context(|| format!("select on {} failed", table))?;
        Self::read_rows(resp).await
    }

    /// Select with an exact total count, read from the `Content-Range`
    /// response header. Falls back to the row count when the header is
    /// missing or malformed.
    pub async fn select_counted<T: DeserializeOwned>(
        &self,
        table: &str,
        query: TableQuery,
    ) -> Result<(Vec<T>, u64)> {
        let resp = self
            .service_headers(self.http.get(self.rest_url(table, &query)))
            .header("Prefer", "count=exact")
            .send()
            .await
            .with_context(|| format!("counted select on {} failed", table))?;

        let total = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        let rows: Vec<T> = Self::read_rows(resp).await?;
        let total = total.unwrap_or(rows.len() as u64);
        Ok((rows, total))
    }

    pub async fn select_optional<T: DeserializeOwned>(
        &self,
        table: &str,
        query: TableQuery,
    ) -> Result<Option<T>> {
        let mut rows: Vec<T> = self.select(table, query.limit(1)).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    pub async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &JsonValue,
    ) -> Result<Vec<T>> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let resp = self
            .service_headers(self.http.post(url))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .with_context(|| format!("insert into {} failed", table))?;
        Self::read_rows(resp).await
    }

    pub async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        query: TableQuery,
        body: &JsonValue,
    ) -> Result<Vec<T>> {
        let resp = self
            .service_headers(self.http.patch(self.rest_url(table, &query)))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .with_context(|| format!("update on {} failed", table))?;
        Self::read_rows(resp).await
    }

    /// Insert-or-update keyed on `on_conflict` columns. Used for the rating
    /// upsert so one (user, book) pair keeps exactly one row.
    pub async fn upsert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &JsonValue,
        on_conflict: &str,
    ) -> Result<Vec<T>> {
        let url = upsert_url(&self.base_url, table, on_conflict);
        let resp = self
            .service_headers(self.http.post(url))
            .header("Prefer", UPSERT_PREFER)
            .json(body)
            .send()
            .await
            .with_context(|| format!("upsert into {} failed", table))?;
        Self::read_rows(resp).await
    }

    pub async fn rpc(
        &self,
        function: &str,
        args: JsonValue,
        limit: Option<u32>,
    ) -> Result<JsonValue> {
        let mut url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        if let Some(n) = limit {
            url.push_str(&format!("?limit={}", n));
        }
        let resp = self
            .service_headers(self.http.post(url))
            .json(&args)
            .send()
            .await
            .with_context(|| format!("rpc {} failed", function))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("rpc {} returned {}: {}", function, status, body);
        }
        serde_json::from_str(&body).context("failed to decode rpc result")
    }

    /// Resolve a bearer token into a user identity. `Ok(None)` means the
    /// token was rejected by the auth service; `Err` means the service
    /// itself could not be reached.
    pub async fn auth_user(&self, token: &str) -> Result<Option<AuthUser>> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let resp = self
            .http
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await
            .context("auth service request failed")?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let user = resp.json::<AuthUser>().await.context("bad auth payload")?;
                Ok(Some(user))
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                bail!("auth service returned {}: {}", status, body)
            }
        }
    }

    pub async fn admin_list_users(&self) -> Result<JsonValue> {
        let url = format!("{}/auth/v1/admin/users", self.base_url);
        let resp = self
            .service_headers(self.http.get(url))
            .send()
            .await
            .context("admin user listing failed")?;

        let status = resp.status();
        let body: JsonValue = resp.json().await.context("bad admin listing payload")?;
        if !status.is_success() {
            bail!("admin user listing returned {}", status);
        }

        // The auth service wraps the list in a `users` field.
        Ok(body.get("users").cloned().unwrap_or(body))
    }

    pub async fn admin_get_user(&self, user_id: &str) -> Result<Option<AuthUser>> {
        let url = format!("{}/auth/v1/admin/users/{}", self.base_url, user_id);
        let resp = self
            .service_headers(self.http.get(url))
            .send()
            .await
            .context("admin user lookup failed")?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let user = resp.json::<AuthUser>().await.context("bad user payload")?;
                Ok(Some(user))
            }
            status => bail!("admin user lookup returned {}", status),
        }
    }

    pub async fn storage_list(&self, bucket: &str) -> Result<Vec<JsonValue>> {
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, bucket);
        let resp = self
            .service_headers(self.http.post(url))
            .json(&json!({ "prefix": "", "limit": 1000, "offset": 0 }))
            .send()
            .await
            .with_context(|| format!("storage listing for {} failed", bucket))?;
        Self::read_rows(resp).await
    }

    /// Fetch an arbitrary file URL for streaming back to the client.
    pub async fn fetch_file(&self, url: &str) -> Result<reqwest::Response> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("file fetch failed")?
            .error_for_status()
            .context("file fetch returned an error status")?;
        Ok(resp)
    }
}

fn upsert_url(base_url: &str, table: &str, on_conflict: &str) -> String {
    format!(
        "{}/rest/v1/{}?on_conflict={}",
        base_url,
        table,
        urlencoding::encode(on_conflict)
    )
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    // Shapes: "0-9/57" or "*/57".
    value.rsplit('/').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_to_select_all() {
        assert_eq!(TableQuery::new().build(), "select=%2A");
    }

    #[test]
    fn test_query_eq_and_order() {
        let qs = TableQuery::new()
            .eq("status", "approved")
            .order_desc("created_at")
            .limit(10)
            .offset(20)
            .build();
        assert_eq!(
            qs,
            "select=%2A&status=eq.approved&order=created_at.desc&limit=10&offset=20"
        );
    }

    #[test]
    fn test_query_search_builds_or_group() {
        let qs = TableQuery::new().search(&["title", "author"], "dune").build();
        assert!(qs.contains("or="));
        let decoded = urlencoding::decode(qs.split("or=").nth(1).unwrap()).unwrap();
        assert_eq!(decoded, "(title.ilike.*dune*,author.ilike.*dune*)");
    }

    #[test]
    fn test_query_any_of_quotes_values() {
        let titles = vec!["Dune".to_string(), "A, B".to_string()];
        let qs = TableQuery::new().any_of("title", &titles).build();
        let decoded = urlencoding::decode(qs.split("title=").nth(1).unwrap()).unwrap();
        assert_eq!(decoded, "in.(\"Dune\",\"A, B\")");
    }

    #[test]
    fn test_upsert_targets_conflict_key() {
        // The one-row-per-(user, book) rating guarantee hangs on this pair.
        let url = upsert_url("http://db.local", "ratings", "user_id,book_id");
        assert_eq!(
            url,
            "http://db.local/rest/v1/ratings?on_conflict=user_id%2Cbook_id"
        );
        assert_eq!(UPSERT_PREFER, "resolution=merge-duplicates,return=representation");
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("0-9/57"), Some(57));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("garbage"), None);
    }
}
