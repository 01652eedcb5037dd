//! Retrieval Gateway: semantic search over the indexed documents.

use async_trait::async_trait;
use rc_domain::config::ServiceEndpoint;
use rc_domain::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::ServiceClient;

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDoc {
    pub text: String,
    pub score: f64,
}

/// Normalized search outcome, whichever shape the service replied with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Retrieved text joined into one context block.
    pub rag_answer: String,
    /// Relevance summary; not yet clamped.
    pub confidence: f64,
    pub docs: Vec<RetrievedDoc>,
}

#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    async fn search(&self, query: &str, top_k: u32) -> Result<RetrievalResult>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: u32,
}

/// REST client for `POST {base_url}/search`.
#[derive(Debug, Clone)]
pub struct RestRetrievalClient {
    client: ServiceClient,
}

impl RestRetrievalClient {
    pub fn new(endpoint: &ServiceEndpoint) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new("retrieval", endpoint)?,
        })
    }

    pub fn with_api_key(endpoint: &ServiceEndpoint, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::with_api_key("retrieval", endpoint, api_key)?,
        })
    }
}

#[async_trait]
impl RetrievalGateway for RestRetrievalClient {
    async fn search(&self, query: &str, top_k: u32) -> Result<RetrievalResult> {
        let body = self
            .client
            .post_json("/search", &SearchRequest { query, top_k })
            .await?;
        Ok(parse_search_response(&body))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Normalize a search reply.
///
/// Accepted shapes:
/// - `{"matches": [{"text", "score"}]}` (or `results`), where `text` may
///   also live under `metadata.text`; confidence is the mean score.
/// - `{"docs": [...], "rag_answer": "...", "confidence": 0.7}`.
///
/// Anything else yields an empty result.
pub fn parse_search_response(body: &Value) -> RetrievalResult {
    let matches = body
        .get("matches")
        .or_else(|| body.get("results"))
        .and_then(Value::as_array);

    if let Some(matches) = matches {
        let docs: Vec<RetrievedDoc> = matches.iter().map(doc_from_value).collect();
        let rag_answer = docs
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        return RetrievalResult {
            rag_answer,
            confidence: mean_score(&docs),
            docs,
        };
    }

    if body.get("rag_answer").is_some() || body.get("docs").is_some() {
        let docs: Vec<RetrievedDoc> = body
            .get("docs")
            .and_then(Value::as_array)
            .map(|docs| docs.iter().map(doc_from_value).collect())
            .unwrap_or_default();
        let rag_answer = match body.get("rag_answer").and_then(Value::as_str) {
            Some(answer) => answer.to_owned(),
            None => docs
                .iter()
                .map(|d| d.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        };
        let confidence = body
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or_else(|| mean_score(&docs));
        return RetrievalResult {
            rag_answer,
            confidence,
            docs,
        };
    }

    RetrievalResult::default()
}

fn doc_from_value(v: &Value) -> RetrievedDoc {
    if let Some(text) = v.as_str() {
        return RetrievedDoc {
            text: text.to_owned(),
            score: 0.0,
        };
    }
    let text = v
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| v.pointer("/metadata/text").and_then(Value::as_str))
        .unwrap_or_default()
        .to_owned();
    let score = v.get("score").and_then(Value::as_f64).unwrap_or(0.0);
    RetrievedDoc { text, score }
}

/// Mean score rounded to three decimals; `0.0` when there are no docs.
fn mean_score(docs: &[RetrievedDoc]) -> f64 {
    if docs.is_empty() {
        return 0.0;
    }
    let mean = docs.iter().map(|d| d.score).sum::<f64>() / docs.len() as f64;
    (mean * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_shape_joins_text_and_averages_scores() {
        let body = json!({
            "matches": [
                {"text": "alpha", "score": 0.5},
                {"metadata": {"text": "beta"}, "score": 0.25},
            ]
        });
        let r = parse_search_response(&body);
        assert_eq!(r.rag_answer, "alpha\n\nbeta");
        assert!((r.confidence - 0.375).abs() < 1e-9);
        assert_eq!(r.docs.len(), 2);
    }

    #[test]
    fn results_alias_is_accepted() {
        let body = json!({ "results": [{"text": "only", "score": 0.9}] });
        let r = parse_search_response(&body);
        assert_eq!(r.rag_answer, "only");
        assert!((r.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn mean_is_rounded_to_three_places() {
        let body = json!({ "matches": [
            {"text": "a", "score": 0.1},
            {"text": "b", "score": 0.2},
            {"text": "c", "score": 0.2},
        ]});
        let r = parse_search_response(&body);
        assert!((r.confidence - 0.167).abs() < 1e-9);
    }

    #[test]
    fn answer_shape_uses_explicit_fields() {
        let body = json!({
            "docs": ["first", {"text": "second", "score": 0.1}],
            "rag_answer": "precomputed",
            "confidence": 0.72,
        });
        let r = parse_search_response(&body);
        assert_eq!(r.rag_answer, "precomputed");
        assert!((r.confidence - 0.72).abs() < 1e-9);
        assert_eq!(r.docs[0].text, "first");
    }

    #[test]
    fn empty_matches_yield_zero_confidence() {
        let r = parse_search_response(&json!({ "matches": [] }));
        assert!(r.rag_answer.is_empty());
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn unknown_shape_is_empty() {
        assert_eq!(
            parse_search_response(&json!({"status": "ok"})),
            RetrievalResult::default()
        );
    }
}
