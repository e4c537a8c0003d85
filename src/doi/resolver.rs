use std::time::Duration;

use backoff::ExponentialBackoff;
use log::{info, warn};
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;

/// Looks up the BibTeX record for a DOI.
///
/// `None` means the lookup failed; callers do not get to see why.
pub trait Resolver {
    fn resolve(&self, doi: &str) -> Option<String>;
}

// Use a single, lazily-initialized reqwest::Client for all lookups to enable connection pooling.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("bibbuilder/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
});

const DEFAULT_BASE_URL: &str = "https://doi.org";

/// Content negotiation against the DOI resolver: `GET <base>/<doi>` with
/// `Accept: application/x-bibtex`.
#[derive(Debug, Clone)]
pub struct DoiOrgResolver {
    base_url: String,
    max_elapsed: Duration,
}

impl Default for DoiOrgResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DoiOrgResolver {
    /// Base URL from `BIBBUILDER_DOI_BASE_URL`, retry budget from
    /// `BIBBUILDER_API_TIMEOUT_SECS` (default 30 seconds).
    pub fn new() -> Self {
        let base_url =
            std::env::var("BIBBUILDER_DOI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let max_timeout = std::env::var("BIBBUILDER_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        Self {
            base_url,
            max_elapsed: Duration::from_secs(max_timeout),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    fn fetch(&self, doi: &str) -> Result<String, backoff::Error<String>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), doi);
        let response = HTTP_CLIENT
            .get(&url)
            .header(ACCEPT, "application/x-bibtex")
            .send()
            .map_err(|e| backoff::Error::transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .text()
                .map_err(|e| backoff::Error::transient(format!("reading body failed: {}", e)))?;
            if body.contains('@') {
                return Ok(body);
            }
            return Err(backoff::Error::permanent(
                "response is not a BibTeX record".to_string(),
            ));
        }

        let message = format!("DOI resolver returned status {}", status);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!("{} for {}, retrying", message, doi);
            Err(backoff::Error::transient(message))
        } else {
            Err(backoff::Error::permanent(message))
        }
    }
}

impl Resolver for DoiOrgResolver {
    fn resolve(&self, doi: &str) -> Option<String> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        info!("Querying DOI resolver for {}", doi);
        match backoff::retry(backoff, || self.fetch(doi)) {
            Ok(bibtex) => Some(bibtex),
            Err(err) => {
                let reason = match err {
                    backoff::Error::Permanent(reason) => reason,
                    backoff::Error::Transient { err, .. } => err,
                };
                warn!("DOI lookup failed for {}: {}", doi, reason);
                None
            }
        }
    }
}
