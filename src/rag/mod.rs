use log::info;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::AgentError;

/// Text-match retrieval over an externally hosted records service
/// (Supabase-style REST). Chunks are tried first; when nothing matches,
/// whole documents are searched as a last resort.
pub struct RetrievalClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    pub default_limit: usize,
}

impl RetrievalClient {
    pub fn from_args(args: &Args) -> Option<Arc<Self>> {
        if !args.enable_retrieval {
            return None;
        }
        let base_url = args.retrieval_base_url.clone()?;
        Some(Arc::new(Self {
            http: HttpClient::new(),
            base_url,
            api_key: args.retrieval_api_key.clone(),
            default_limit: args.retrieval_limit,
        }))
    }

    async fn fetch_records(&self, table: &str) -> Result<Vec<Value>, AgentError> {
        let url = format!(
            "{}/rest/v1/{}?select=*",
            self.base_url.trim_end_matches('/'),
            table
        );
        let resp = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::from_upstream(status.as_u16(), body));
        }
        Ok(resp.json().await?)
    }

    pub async fn documents(&self) -> Result<Vec<Value>, AgentError> {
        self.fetch_records("documents").await
    }

    pub async fn chunks(&self) -> Result<Vec<Value>, AgentError> {
        self.fetch_records("document_chunks").await
    }

    /// Case-insensitive substring search, chunks first and documents as
    /// fallback. Results keep the record shape of whichever table hit.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Value>, AgentError> {
        info!("Searching knowledge base for: \"{}\"", query);

        let chunks = self.chunks().await?;
        let results = filter_chunks(chunks, query, limit);
        if !results.is_empty() {
            info!("Text search (chunks) found {} results", results.len());
            return Ok(results);
        }

        info!("No chunks matched, trying documents");
        let documents = self.documents().await?;
        let results = filter_documents(documents, query, limit);
        info!("Text search (documents) found {} results", results.len());
        Ok(results)
    }
}

fn filter_chunks(records: Vec<Value>, query: &str, limit: usize) -> Vec<Value> {
    let needle = query.to_lowercase();
    records
        .into_iter()
        .filter(|record| {
            record
                .get("content")
                .and_then(|c| c.as_str())
                .map(|c| c.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .take(limit)
        .collect()
}

fn filter_documents(records: Vec<Value>, query: &str, limit: usize) -> Vec<Value> {
    let needle = query.to_lowercase();
    records
        .into_iter()
        .filter(|record| {
            let title_hit = record
                .get("title")
                .and_then(|t| t.as_str())
                .map(|t| t.to_lowercase().contains(&needle))
                .unwrap_or(false);
            let text_hit = record
                .get("full_text")
                .and_then(|t| t.as_str())
                .map(|t| t.to_lowercase().contains(&needle))
                .unwrap_or(false);
            title_hit || text_hit
        })
        .take(limit)
        .map(|record| {
            let title = record.get("title").and_then(|t| t.as_str()).unwrap_or("");
            let body = record
                .get("full_text")
                .or_else(|| record.get("content"))
                .and_then(|t| t.as_str())
                .unwrap_or("");
            serde_json::json!({ "content": format!("Document: {}\nContent: {}", title, body) })
        })
        .collect()
}

/// Renders search hits as bullet lines for the instruction string.
pub fn format_snippets(results: &[Value]) -> String {
    results
        .iter()
        .filter_map(|record| record.get("content").and_then(|c| c.as_str()))
        .map(|content| format!("- {}", content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(content: &str) -> Value {
        json!({ "content": content, "document_id": 1 })
    }

    #[test]
    fn chunk_filter_is_case_insensitive_and_bounded() {
        let records = vec![
            chunk("Rust is a systems language"),
            chunk("Python is interpreted"),
            chunk("More RUST trivia"),
            chunk("rust again"),
        ];
        let hits = filter_chunks(records, "rust", 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["content"], "Rust is a systems language");
        assert_eq!(hits[1]["content"], "More RUST trivia");
    }

    #[test]
    fn chunk_filter_skips_records_without_content() {
        let records = vec![json!({ "id": 1 }), chunk("has rust content")];
        let hits = filter_chunks(records, "rust", 5);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn document_fallback_matches_title_or_body_and_reformats() {
        let records = vec![
            json!({ "title": "Rust guide", "full_text": "all about borrowing" }),
            json!({ "title": "Cooking", "full_text": "stews feature rusty pots" }),
            json!({ "title": "Unrelated", "full_text": "nothing here" }),
        ];
        let hits = filter_documents(records, "rust", 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(
            hits[0]["content"],
            "Document: Rust guide\nContent: all about borrowing"
        );
    }

    #[test]
    fn snippets_render_as_bullet_lines() {
        let results = vec![chunk("first"), chunk("second")];
        assert_eq!(format_snippets(&results), "- first\n- second");
    }
}
