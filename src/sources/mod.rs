pub mod crunchbase;
pub mod google;

use std::time::Duration;

use serde_json::{Map, Value};

/// One lead from either source. The three members line up positionally:
/// name/title, website/link, email/snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadRecord {
    pub name: Option<String>,
    pub link: Option<String>,
    pub detail: Option<String>,
}

impl LeadRecord {
    /// JSON document keyed by the source's field names.
    pub fn to_document(&self, source: Source) -> Value {
        let [k0, k1, k2] = source.field_names();
        let mut doc = Map::new();
        doc.insert(k0.into(), opt_value(&self.name));
        doc.insert(k1.into(), opt_value(&self.link));
        doc.insert(k2.into(), opt_value(&self.detail));
        Value::Object(doc)
    }

    /// CSV row; absent members become empty cells.
    pub fn to_row(&self) -> Vec<String> {
        [&self.name, &self.link, &self.detail]
            .into_iter()
            .map(|v| v.clone().unwrap_or_default())
            .collect()
    }
}

fn opt_value(v: &Option<String>) -> Value {
    v.as_ref().map(|s| Value::String(s.clone())).unwrap_or(Value::Null)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Crunchbase,
    Google,
}

impl Source {
    pub fn label(self) -> &'static str {
        match self {
            Source::Crunchbase => "Crunchbase",
            Source::Google => "Google",
        }
    }

    pub fn collection(self) -> &'static str {
        match self {
            Source::Crunchbase => "crunchbase_data",
            Source::Google => "google_data",
        }
    }

    pub fn file_base(self) -> &'static str {
        match self {
            Source::Crunchbase => "crunchbase_results",
            Source::Google => "google_results",
        }
    }

    pub fn field_names(self) -> [&'static str; 3] {
        match self {
            Source::Crunchbase => ["name", "website", "email"],
            Source::Google => ["title", "link", "snippet"],
        }
    }

    pub fn csv_headers(self) -> [&'static str; 3] {
        match self {
            Source::Crunchbase => ["Name", "Website", "Contact Email"],
            Source::Google => ["Title", "Link", "Snippet"],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("HTTP error: {status}")]
    Http { status: reqwest::StatusCode },

    #[error("request error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("error parsing response: {0}")]
    Parse(String),

    #[error("response missing '{0}' key")]
    MissingKey(&'static str),
}

/// Result of one adapter call. Both adapters use this shape so that "no
/// results" looks the same whichever source produced it.
#[derive(Debug)]
pub enum FetchOutcome {
    Records(Vec<LeadRecord>),
    Empty,
    Failed(SourceError),
}

impl FetchOutcome {
    fn from_records(records: Vec<LeadRecord>) -> Self {
        if records.is_empty() {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Records(records)
        }
    }

    pub fn records(&self) -> &[LeadRecord] {
        match self {
            FetchOutcome::Records(r) => r,
            FetchOutcome::Empty | FetchOutcome::Failed(_) => &[],
        }
    }

    pub fn into_records(self) -> Vec<LeadRecord> {
        match self {
            FetchOutcome::Records(r) => r,
            FetchOutcome::Empty | FetchOutcome::Failed(_) => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Send a prepared GET and decode the body as JSON, sorting failures into
/// the status / transport / parse buckets.
pub(crate) async fn get_json(req: reqwest::RequestBuilder) -> Result<Value, SourceError> {
    let response = req.send().await.map_err(SourceError::Network)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Http { status });
    }
    let body = response.text().await.map_err(SourceError::Network)?;
    serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))
}

/// String member of a JSON object, `None` when absent or not a string.
pub(crate) fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
