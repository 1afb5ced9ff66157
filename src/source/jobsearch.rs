//! JobTech job-search API source

use super::page::{Page, PageSource};
use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig, RequestConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// HTTP page source for the search endpoint
#[derive(Debug)]
pub struct JobSearchSource {
    client: HttpClient,
    url: Url,
    records_path: String,
    total_path: Option<String>,
}

impl JobSearchSource {
    /// Create a source for `base_url` + `path` using `client`
    pub fn new(client: HttpClient, base_url: &str, path: &str) -> Result<Self> {
        let url = search_url(base_url, path)?;
        Ok(Self {
            client,
            url,
            records_path: "hits".to_string(),
            total_path: Some("total.value".to_string()),
        })
    }

    /// Build the source described by a config section
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .no_rate_limit();
        if let Some(rps) = config.requests_per_second {
            builder = builder.rate_limit(RateLimiterConfig::per_second(rps));
        }
        let client = HttpClient::with_config(builder.build())?;

        Ok(Self::new(client, &config.base_url, &config.path)?
            .with_records_path(config.records_path.clone(), config.total_path.clone()))
    }

    /// Set where records and the total count live in the response
    #[must_use]
    pub fn with_records_path(
        mut self,
        records_path: impl Into<String>,
        total_path: Option<String>,
    ) -> Self {
        self.records_path = records_path.into();
        self.total_path = total_path;
        self
    }

    /// The resolved search URL
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl PageSource for JobSearchSource {
    async fn fetch_page(&self, query: &[(String, String)]) -> Result<Page> {
        let request = RequestConfig::new().query_pairs(query);
        let body: Value = self.client.get_json(self.url.as_str(), request).await?;

        Page::from_value(body, &self.records_path, self.total_path.as_deref())
    }
}

/// Join an API root and an endpoint path
fn search_url(base_url: &str, path: &str) -> Result<Url> {
    if base_url.is_empty() {
        return Err(Error::missing_field("source.base_url"));
    }
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}
