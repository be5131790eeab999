use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::db::{DocumentStore, Documents};
use crate::emails::EmailExtractor;
use crate::export;
use crate::settings::Settings;
use crate::sources::crunchbase::CrunchbaseClient;
use crate::sources::google::GoogleClient;
use crate::sources::{FetchOutcome, LeadRecord, Source};

const EMAILS_COLLECTION: &str = "extracted_emails";
const EMAILS_FILE_BASE: &str = "extracted_emails";

/// What one run produced, for the caller's final report.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub crunchbase_records: usize,
    pub google_records: usize,
    pub emails: usize,
    pub documents_written: usize,
    pub files_written: Vec<PathBuf>,
}

/// Fetch → normalize → enrich → persist. The two source branches share
/// nothing but the store handle; an empty or failed branch does not stop
/// the other.
pub struct Pipeline<'a> {
    store: &'a DocumentStore,
    output_dir: PathBuf,
    crunchbase: CrunchbaseClient,
    crunchbase_query: String,
    google: GoogleClient,
    google_query: String,
    google_limit: u32,
    extractor: EmailExtractor,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &Settings, store: &'a DocumentStore) -> Result<Self> {
        Ok(Self {
            store,
            output_dir: settings.output_dir.clone(),
            crunchbase: CrunchbaseClient::new(settings)?,
            crunchbase_query: settings.crunchbase_query.clone(),
            google: GoogleClient::new(settings)?,
            google_query: settings.google_query.clone(),
            google_limit: settings.google_limit,
            extractor: EmailExtractor::new(Duration::from_secs(settings.page_timeout_secs))?,
        })
    }

    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        self.run_crunchbase(&mut summary).await;
        self.run_google(&mut summary).await;
        info!(
            "Run finished: {} Crunchbase records, {} Google results, {} emails, \
             {} documents, {} files",
            summary.crunchbase_records,
            summary.google_records,
            summary.emails,
            summary.documents_written,
            summary.files_written.len()
        );
        summary
    }

    async fn run_crunchbase(&self, summary: &mut RunSummary) {
        println!("Fetching Crunchbase data...");
        let outcome = self.crunchbase.fetch(&self.crunchbase_query).await;
        let records = match non_empty(outcome, Source::Crunchbase) {
            Ok(records) => records,
            Err(msg) => {
                println!("{}", msg);
                return;
            }
        };

        println!("Crunchbase Data:");
        for r in &records {
            print_record(r, Source::Crunchbase.csv_headers());
        }
        summary.crunchbase_records = records.len();

        self.persist_records(Source::Crunchbase, &records, summary);
    }

    async fn run_google(&self, summary: &mut RunSummary) {
        println!("\nFetching Google search results...");
        let outcome = self.google.fetch(&self.google_query, self.google_limit).await;
        let records = match non_empty(outcome, Source::Google) {
            Ok(records) => records,
            Err(msg) => {
                println!("{}", msg);
                return;
            }
        };

        println!("\nGoogle Search Results:");
        for r in &records {
            print_record(r, Source::Google.csv_headers());
        }
        summary.google_records = records.len();

        self.persist_records(Source::Google, &records, summary);

        println!("\nExtracting emails from Google search results...");
        let emails = self.extractor.extract(&records).await;
        if emails.is_empty() {
            println!("No emails found.");
            return;
        }

        println!("Extracted Emails:");
        for email in &emails {
            println!("{}", email);
        }
        summary.emails = emails.len();

        let docs: Vec<Value> = emails.iter().map(|e| json!({ "email": e })).collect();
        self.persist_documents(EMAILS_COLLECTION, docs, summary);
        let rows: Vec<Vec<String>> = emails.into_iter().map(|e| vec![e]).collect();
        self.persist_csv(EMAILS_FILE_BASE, &["Email"], &rows, summary);
    }

    fn persist_records(&self, source: Source, records: &[LeadRecord], summary: &mut RunSummary) {
        let docs: Vec<Value> = records.iter().map(|r| r.to_document(source)).collect();
        self.persist_documents(source.collection(), docs, summary);
        let rows: Vec<Vec<String>> = records.iter().map(LeadRecord::to_row).collect();
        self.persist_csv(source.file_base(), &source.csv_headers(), &rows, summary);
    }

    /// Store writes are non-fatal: a failure loses this batch for this sink only.
    fn persist_documents(
        &self,
        collection: &str,
        docs: impl Into<Documents>,
        summary: &mut RunSummary,
    ) {
        match self.store.save(collection, docs) {
            Ok(n) => {
                summary.documents_written += n;
                info!("Data saved to collection: {} ({} documents)", collection, n);
            }
            Err(e) => error!("Error saving to collection {}: {:#}", collection, e),
        }
    }

    fn persist_csv(
        &self,
        base: &str,
        headers: &[&str],
        rows: &[Vec<String>],
        summary: &mut RunSummary,
    ) {
        let filename = export::unique_filename(base);
        match export::save_csv(&self.output_dir, &filename, headers, rows) {
            Ok(path) => {
                info!("Results saved to {}", path.display());
                summary.files_written.push(path);
            }
            Err(e) => error!("Error saving results to CSV: {:#}", e),
        }
    }
}

/// Records to carry on with, or the line to print when the source gave nothing.
fn non_empty(outcome: FetchOutcome, source: Source) -> Result<Vec<LeadRecord>, String> {
    if let FetchOutcome::Failed(e) = &outcome {
        return Err(format!("Failed to retrieve data from {}: {}", source.label(), e));
    }
    if outcome.is_empty() {
        warn!("{} returned no results.", source.label());
        return Err(format!("Failed to retrieve data from {}.", source.label()));
    }
    Ok(outcome.into_records())
}

fn print_record(r: &LeadRecord, labels: [&str; 3]) {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "None".into());
    println!("{}: {}", labels[0], show(&r.name));
    println!("{}: {}", labels[1], show(&r.link));
    println!("{}: {}", labels[2], show(&r.detail));
    println!("{}", "-".repeat(40));
}
