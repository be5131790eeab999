use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "leads.toml";
const ENV_PREFIX: &str = "LEADS";

/// Runtime settings. Later sources win: defaults, TOML file, `LEADS_*` env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub crunchbase_api_key: String,
    pub crunchbase_base_url: String,
    pub crunchbase_query: String,

    pub google_api_key: String,
    pub google_cse_id: String,
    pub google_base_url: String,
    pub google_query: String,
    pub google_limit: u32,

    /// Timeout for the two API calls.
    pub api_timeout_secs: u64,
    /// Timeout for each crawled result page.
    pub page_timeout_secs: u64,

    pub db_path: PathBuf,
    pub output_dir: PathBuf,
    pub launcher_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            crunchbase_api_key: String::new(),
            crunchbase_base_url: "https://api.crunchbase.com/v3.1".into(),
            crunchbase_query: "tech startups".into(),
            google_api_key: String::new(),
            google_cse_id: String::new(),
            google_base_url: "https://www.googleapis.com/customsearch/v1".into(),
            google_query: "Top startups in banglore".into(),
            google_limit: 10,
            api_timeout_secs: 10,
            page_timeout_secs: 5,
            db_path: PathBuf::from("data/leads.sqlite"),
            output_dir: PathBuf::from("data"),
            launcher_addr: "127.0.0.1:3000".into(),
        }
    }
}

impl Settings {
    pub fn load(file: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {:?}", file))?
            .try_deserialize::<Settings>()
            .context("Invalid settings")?;
        Ok(settings)
    }
}
