use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::{Deserialize, Serialize};

use super::{ObservabilityMetadata, simulate_work};
use crate::error::AppError;
use crate::fields;
use crate::logging::EventResult;
use crate::middleware::RequestTelemetry;
use crate::server::AppState;

/// The whole knowledge base.
pub const ARTICLES: [&str; 4] = [
    "How to reset password",
    "Network connectivity troubleshooting",
    "Software installation guide",
    "VPN configuration steps",
];

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<&'static str>,
    pub count: usize,
    pub trace_id: String,
    pub observability_metadata: ObservabilityMetadata<SearchDetails>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDetails {
    pub query: String,
    pub result_count: usize,
}

/// Case-insensitive substring match. An empty query matches nothing.
pub fn search_articles(query: &str) -> Vec<&'static str> {
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    ARTICLES
        .iter()
        .copied()
        .filter(|article| article.to_lowercase().contains(&needle))
        .collect()
}

/// `GET /search?q=`
pub async fn search(
    telemetry: RequestTelemetry,
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(params) = params?;
    let RequestTelemetry { context, logger, .. } = telemetry;
    let query = params.q.unwrap_or_default();

    logger.business_event(
        "KnowledgeBase",
        "SEARCH",
        EventResult::Pending,
        fields!({ "query": query, "resultCount": 0 }),
    );

    simulate_work(state.simulation().search_delay_ms).await;

    let results = search_articles(&query);

    logger.business_event(
        "KnowledgeBase",
        "SEARCH",
        EventResult::Success,
        fields!({ "query": query, "resultCount": results.len() }),
    );

    Ok(Json(SearchResponse {
        count: results.len(),
        trace_id: context.trace_id.clone(),
        observability_metadata: ObservabilityMetadata {
            action: "SEARCH_KNOWLEDGE_BASE",
            result: "SUCCESS",
            details: SearchDetails {
                query: query.clone(),
                result_count: results.len(),
            },
        },
        query,
        results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_is_case_insensitive() {
        assert_eq!(search_articles("vpn"), vec!["VPN configuration steps"]);
        assert_eq!(search_articles("PASSWORD"), vec!["How to reset password"]);
    }

    #[test]
    fn test_search_matches_substrings_across_articles() {
        assert_eq!(
            search_articles("ATION"),
            vec!["Software installation guide", "VPN configuration steps"]
        );
    }

    #[test]
    fn test_empty_or_unknown_query_has_no_results() {
        assert!(search_articles("").is_empty());
        assert!(search_articles("printer").is_empty());
    }
}
