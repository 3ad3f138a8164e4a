use std::time::Duration;

use async_trait::async_trait;
use rand::{rng, Rng};
use reqwest::header::USER_AGENT;
use tracing::debug;

use crate::config::{Config, DETAIL_TIMEOUT_SECS, INDEX_TIMEOUT_SECS, USER_AGENTS};
use crate::error::Result;
use crate::parser::ListingParser;
use crate::types::{ListingDetail, ListingSummary};

/// Where listings come from: the index page and one detail page per listing.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Current index batch, in page order.
    async fn fetch_index(&self) -> Result<Vec<ListingSummary>>;

    async fn fetch_detail(&self, listing: &ListingSummary) -> Result<ListingDetail>;
}

/// Marketplace pages over plain HTTP GET.
pub struct HtmlListingSource {
    client: reqwest::Client,
    listing_url: String,
    parser: ListingParser,
}

impl HtmlListingSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(8))
            .build()?;
        Ok(Self {
            client,
            listing_url: cfg.listing_url.clone(),
            parser: ListingParser::new(&cfg.site_origin)?,
        })
    }

    async fn get_html(&self, url: &str, timeout: Duration) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        let html = resp.text().await?;
        debug!(url, len = html.len(), "Fetched page");
        Ok(html)
    }
}

#[async_trait]
impl ListingSource for HtmlListingSource {
    async fn fetch_index(&self) -> Result<Vec<ListingSummary>> {
        let html = self
            .get_html(&self.listing_url, Duration::from_secs(INDEX_TIMEOUT_SECS))
            .await?;
        Ok(self.parser.parse_index(&html))
    }

    async fn fetch_detail(&self, listing: &ListingSummary) -> Result<ListingDetail> {
        let html = self
            .get_html(&listing.identity, Duration::from_secs(DETAIL_TIMEOUT_SECS))
            .await?;
        Ok(self.parser.parse_detail(&html))
    }
}

/// Uniform pick from the fixed pool, per request.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS[rng().random_range(0..USER_AGENTS.len())]
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use dashmap::{DashMap, DashSet};

    use super::*;
    use crate::error::AppError;

    /// Serves a fixed index and canned detail pages.
    /// Unknown identities get an empty detail; identities in `broken` fail.
    #[derive(Default)]
    pub struct ScriptedSource {
        pub index: Mutex<Vec<ListingSummary>>,
        pub details: DashMap<String, ListingDetail>,
        pub broken: DashSet<String>,
        pub index_down: AtomicBool,
        detail_calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub fn detail_calls(&self) -> usize {
            self.detail_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ListingSource for ScriptedSource {
        async fn fetch_index(&self) -> Result<Vec<ListingSummary>> {
            if self.index_down.load(Ordering::SeqCst) {
                return Err(AppError::Parse("index unavailable".to_string()));
            }
            Ok(self.index.lock().unwrap().clone())
        }

        async fn fetch_detail(&self, listing: &ListingSummary) -> Result<ListingDetail> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if self.broken.contains(&listing.identity) {
                return Err(AppError::Parse(format!("detail {} timed out", listing.identity)));
            }
            Ok(self
                .details
                .get(&listing.identity)
                .map(|d| d.clone())
                .unwrap_or_default())
        }
    }
}
