use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tracing::{error, info, warn};

use super::{get_json, http_client, str_field, FetchOutcome, LeadRecord, SourceError};
use crate::settings::Settings;

/// Crunchbase organizations endpoint.
pub struct CrunchbaseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CrunchbaseClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(settings.api_timeout_secs))?,
            base_url: settings.crunchbase_base_url.trim_end_matches('/').to_string(),
            api_key: settings.crunchbase_api_key.clone(),
        })
    }

    /// Look up organizations by name. Never returns an error: failures are
    /// logged here and come back as `FetchOutcome::Failed`.
    pub async fn fetch(&self, query: &str) -> FetchOutcome {
        match self.try_fetch(query).await {
            Ok(records) => {
                info!("Crunchbase returned {} organizations for {:?}", records.len(), query);
                FetchOutcome::from_records(records)
            }
            Err(e) => {
                match &e {
                    SourceError::MissingKey(_) => warn!("Crunchbase {}", e),
                    SourceError::Http { .. } => error!("Crunchbase API HTTP error: {}", e),
                    SourceError::Network(_) => error!("Crunchbase API request error: {}", e),
                    SourceError::Parse(_) => error!("Error parsing Crunchbase response: {}", e),
                    SourceError::MissingCredentials(_) => error!("Crunchbase: {}", e),
                }
                FetchOutcome::Failed(e)
            }
        }
    }

    async fn try_fetch(&self, query: &str) -> Result<Vec<LeadRecord>, SourceError> {
        if self.api_key.is_empty() {
            return Err(SourceError::MissingCredentials("crunchbase_api_key"));
        }
        let url = format!("{}/organizations", self.base_url);
        let req = self
            .http
            .get(&url)
            .query(&[("user_key", self.api_key.as_str()), ("name", query)]);
        let body = get_json(req).await?;
        parse_organizations(&body)
    }
}

/// Map `data.items[].properties` into lead records, one per item.
fn parse_organizations(body: &Value) -> Result<Vec<LeadRecord>, SourceError> {
    let data = body.get("data").ok_or(SourceError::MissingKey("data"))?;
    let items = match data.get("items").and_then(|i| i.as_array()) {
        Some(items) => items,
        None => return Ok(Vec::new()),
    };

    Ok(items
        .iter()
        .map(|item| {
            let props = item.get("properties").unwrap_or(&Value::Null);
            LeadRecord {
                name: str_field(props, "name"),
                link: str_field(props, "homepage_url"),
                detail: str_field(props, "email"),
            }
        })
        .collect())
}
