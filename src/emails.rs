use std::collections::BTreeSet;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tracing::{info, warn};

use crate::sources::LeadRecord;

const EMAIL_PATTERN: &str = r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).unwrap())
}

/// All email-shaped substrings of a raw page body. Markup is not parsed, so
/// addresses inside comments and scripts count too.
pub fn scan(body: &str) -> BTreeSet<String> {
    email_regex()
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub struct EmailExtractor {
    http: reqwest::Client,
}

impl EmailExtractor {
    pub fn new(page_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(page_timeout).build()?,
        })
    }

    /// Fetch every linked page in turn and collect the addresses found.
    /// A page that fails is logged and skipped.
    pub async fn extract(&self, records: &[LeadRecord]) -> BTreeSet<String> {
        let links: Vec<&str> = records.iter().filter_map(|r| r.link.as_deref()).collect();

        let pb = ProgressBar::new(links.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let mut emails = BTreeSet::new();
        let mut failed = 0usize;
        for link in &links {
            match self.fetch_page(link).await {
                Ok(body) => emails.extend(scan(&body)),
                Err(e) => {
                    failed += 1;
                    warn!("Error accessing {}: {}", link, e);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            "Crawled {} pages ({} failed), found {} distinct emails",
            links.len(),
            failed,
            emails.len()
        );
        emails
    }

    async fn fetch_page(&self, url: &str) -> reqwest::Result<String> {
        self.http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(link: Option<String>) -> LeadRecord {
        LeadRecord {
            name: Some("t".into()),
            link,
            detail: None,
        }
    }

    #[test]
    fn repeated_address_counts_once() {
        let found = scan("write a@b.com or a@b.com, sales: sales@b.co.uk");
        assert_eq!(found.len(), 2);
        assert!(found.contains("a@b.com"));
        assert!(found.contains("sales@b.co.uk"));
    }

    #[test]
    fn scan_is_markup_agnostic() {
        let html = std::fs::read_to_string("tests/fixtures/contact_page.html").unwrap();
        let found = scan(&html);
        assert!(found.contains("contact@firm.com"));
        assert!(found.contains("press@firm.com"));
        assert!(found.contains("jobs@firm.com"));
    }

    #[test]
    fn scan_is_idempotent_and_case_preserving() {
        let body = "Reach Info@Firm.com or info@firm.com";
        let first = scan(body);
        assert_eq!(first, scan(body));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn rejects_short_tld_and_bare_at() {
        assert!(scan("user@host.c and @example.com and name@").is_empty());
    }

    #[tokio::test]
    async fn failing_link_does_not_stop_the_crawl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>team@acme.io</p>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<!-- team@acme.io --> ceo@acme.io"),
            )
            .mount(&server)
            .await;

        let records = vec![
            record(Some(format!("{}/broken", server.uri()))),
            record(None),
            record(Some("not a url".into())),
            record(Some(format!("{}/about", server.uri()))),
            record(Some(format!("{}/contact", server.uri()))),
        ];

        let extractor = EmailExtractor::new(Duration::from_secs(5)).unwrap();
        let emails = extractor.extract(&records).await;
        let expected: BTreeSet<String> =
            ["ceo@acme.io", "team@acme.io"].iter().map(|s| s.to_string()).collect();
        assert_eq!(emails, expected);
    }
}
