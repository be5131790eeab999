use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{get_json, http_client, str_field, FetchOutcome, LeadRecord, SourceError};
use crate::settings::Settings;

/// The Custom Search JSON API rejects `num` outside this range.
const MAX_RESULTS: u32 = 10;

/// Google Custom Search JSON API.
pub struct GoogleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cse_id: String,
}

impl GoogleClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(settings.api_timeout_secs))?,
            base_url: settings.google_base_url.clone(),
            api_key: settings.google_api_key.clone(),
            cse_id: settings.google_cse_id.clone(),
        })
    }

    /// Run one search. Failures are logged by category and returned as
    /// `FetchOutcome::Failed`, which carries no records.
    pub async fn fetch(&self, query: &str, limit: u32) -> FetchOutcome {
        match self.try_fetch(query, limit).await {
            Ok(records) => {
                info!("Google returned {} results for {:?}", records.len(), query);
                FetchOutcome::from_records(records)
            }
            Err(e) => {
                match &e {
                    SourceError::MissingKey(_) => warn!("Google API {}", e),
                    SourceError::Network(_) => error!("Google API network error: {}", e),
                    _ => error!("Google API error: {}", e),
                }
                FetchOutcome::Failed(e)
            }
        }
    }

    async fn try_fetch(&self, query: &str, limit: u32) -> Result<Vec<LeadRecord>, SourceError> {
        if self.api_key.is_empty() {
            return Err(SourceError::MissingCredentials("google_api_key"));
        }
        if self.cse_id.is_empty() {
            return Err(SourceError::MissingCredentials("google_cse_id"));
        }

        let num = clamp_limit(limit);
        if num != limit {
            debug!("Search limit {} clamped to {}", limit, num);
        }

        let num = num.to_string();
        let req = self.http.get(&self.base_url).query(&[
            ("key", self.api_key.as_str()),
            ("cx", self.cse_id.as_str()),
            ("q", query),
            ("num", num.as_str()),
        ]);
        let body = get_json(req).await?;
        parse_items(&body)
    }
}

fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_RESULTS)
}

fn parse_items(body: &Value) -> Result<Vec<LeadRecord>, SourceError> {
    let items = body
        .get("items")
        .and_then(|i| i.as_array())
        .ok_or(SourceError::MissingKey("items"))?;

    Ok(items
        .iter()
        .map(|item| LeadRecord {
            name: str_field(item, "title"),
            link: str_field(item, "link"),
            detail: str_field(item, "snippet"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> Settings {
        Settings {
            google_api_key: "g-key".into(),
            google_cse_id: "cse-1".into(),
            google_base_url: format!("{}/customsearch/v1", server.uri()),
            ..Settings::default()
        }
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(7), 7);
        assert_eq!(clamp_limit(50), 10);
    }

    #[test]
    fn fixture_items_map_to_records() {
        let body: Value = serde_json::from_str(
            &std::fs::read_to_string("tests/fixtures/google_search.json").unwrap(),
        )
        .unwrap();
        let records = parse_items(&body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name.as_deref(), Some("Top 50 Startups in Bangalore"));
        assert_eq!(records[0].link.as_deref(), Some("https://example.com/top-startups"));
        assert!(records[0].detail.is_some());
        assert_eq!(records[1].detail, None);
    }

    #[tokio::test]
    async fn fetch_passes_search_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("key", "g-key"))
            .and(query_param("cx", "cse-1"))
            .and(query_param("q", "Top startups in banglore"))
            .and(query_param("num", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "title": "T1", "link": "http://x", "snippet": "S1" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleClient::new(&settings_for(&server)).unwrap();
        let outcome = client.fetch("Top startups in banglore", 25).await;
        assert_eq!(
            outcome.records(),
            &[LeadRecord {
                name: Some("T1".into()),
                link: Some("http://x".into()),
                detail: Some("S1".into()),
            }]
        );
    }

    #[tokio::test]
    async fn missing_items_yields_no_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "searchInformation": { "totalResults": "0" }
            })))
            .mount(&server)
            .await;

        let client = GoogleClient::new(&settings_for(&server)).unwrap();
        let outcome = client.fetch("nothing here", 10).await;
        assert!(outcome.is_empty());
        assert!(matches!(outcome, FetchOutcome::Failed(SourceError::MissingKey("items"))));
    }

    #[tokio::test]
    async fn empty_items_is_empty_not_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })),
            )
            .mount(&server)
            .await;

        let client = GoogleClient::new(&settings_for(&server)).unwrap();
        assert!(matches!(client.fetch("q", 10).await, FetchOutcome::Empty));
    }

    #[tokio::test]
    async fn quota_error_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("dailyLimitExceeded"))
            .mount(&server)
            .await;

        let client = GoogleClient::new(&settings_for(&server)).unwrap();
        let outcome = client.fetch("q", 10).await;
        assert!(matches!(outcome, FetchOutcome::Failed(SourceError::Http { .. })));
        assert!(outcome.into_records().is_empty());
    }
}
