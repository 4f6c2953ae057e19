use crate::config::Config;
use anyhow::{Context, Result, bail};
use serde_json::{Value as JsonValue, json};
use std::time::Duration;

/// Bridge to the generative-AI completion endpoint. All failures collapse to
/// an empty string so callers can degrade to "no suggestions" instead of a
/// request error.
pub struct TextModel {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl TextModel {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build ai http client")?;

        Ok(TextModel {
            http,
            api_key: cfg.gemini.api_key.clone(),
            model: cfg.gemini.model.clone(),
        })
    }

    pub async fn generate(&self, prompt: &str) -> String {
        match self.try_generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("ai generation failed: {:#}", e);
                String::new()
            }
        }
    }

    async fn try_generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .context("ai request failed")?;

        let status = resp.status();
        let payload: JsonValue = resp.json().await.context("bad ai payload")?;
        if !status.is_success() {
            bail!("ai endpoint returned {}: {}", status, payload);
        }

        let text = extract_text(&payload);
        if text.is_empty() {
            let finish_reason = payload.pointer("/candidates/0/finishReason");
            tracing::warn!(?finish_reason, "ai response carried no usable text");
        }
        Ok(text)
    }
}

/// Pull plain text out of a completion response whose shape varies across
/// provider versions. Tries, in order: a direct `text` field, the nested
/// candidate content parts, then a flat parts list. Empty string when
/// nothing matches.
pub fn extract_text(payload: &JsonValue) -> String {
    let candidates = [
        "/text",
        "/candidates/0/content/parts/0/text",
        "/candidates/0/content/parts/0/content",
        "/parts/0/text",
    ];

    for path in candidates {
        if let Some(text) = payload.pointer(path).and_then(JsonValue::as_str) {
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_direct_text_field() {
        let payload = json!({ "text": "  a summary  " });
        assert_eq!(extract_text(&payload), "a summary");
    }

    #[test]
    fn test_extract_nested_candidate_parts() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "nested text" }] },
                "finishReason": "STOP",
            }]
        });
        assert_eq!(extract_text(&payload), "nested text");
    }

    #[test]
    fn test_extract_part_content_string() {
        let payload = json!({
            "candidates": [{ "content": { "parts": [{ "content": "older shape" }] } }]
        });
        assert_eq!(extract_text(&payload), "older shape");
    }

    #[test]
    fn test_extract_flat_parts_fallback() {
        let payload = json!({ "parts": [{ "text": "flat text" }] });
        assert_eq!(extract_text(&payload), "flat text");
    }

    #[test]
    fn test_unrecognized_shape_yields_empty_string() {
        assert_eq!(extract_text(&json!({ "candidates": [] })), "");
        assert_eq!(extract_text(&json!({ "text": "   " })), "");
        assert_eq!(extract_text(&json!(null)), "");
        assert_eq!(extract_text(&json!({ "unrelated": true })), "");
    }
}
