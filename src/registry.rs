/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::registry
  ------------------------------------------------------------
  Purpose:
    Talk to the NuGet V3 API: discover endpoints from the
    service index, page through search results, and stream
    package artifacts from the flat container.

  Security / Safety Notes:
    Performs read-only HTTPS requests to the public registry.
    No credentials are transmitted.

  Dependencies:
    reqwest for HTTP, serde for response parsing, async-trait
    for the collaborator seams.

  Operational Scope:
    Supplies package summaries to the paginator and byte
    streams to the artifact fetcher.

  Revision History:
    2026-10-16 NMR  Implemented NuGet search and download clients.
  ------------------------------------------------------------
  Principles Observed:
    - Bounded retry with exponential backoff for page fetches
    - Structured response parsing with explicit error paths
    - Configurable timeouts
============================================================*/

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::sleep;
use urlencoding::encode;

use crate::config::RegistryConfig;
use crate::error::{MirrorError, Result};
use crate::package_info::{PackageSummary, VersionEntry};
use crate::version::PackageVersion;

const SEARCH_RESOURCE: &str = "SearchQueryService";
const PACKAGE_BASE_RESOURCE: &str = "PackageBaseAddress/3.0.0";

/// One search page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub term: String,
    pub batch_size: usize,
    pub offset: usize,
    pub include_prerelease: bool,
}

impl PageQuery {
    /// Sort order requested from the registry; pages arrive most popular first.
    pub const SORT_BY: &'static str = "downloads";
}

/// Streaming artifact body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Result of asking the registry for one artifact.
pub enum DownloadOutcome {
    Available(ByteStream),
    Unavailable,
}

impl fmt::Debug for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadOutcome::Available(_) => f.write_str("Available(..)"),
            DownloadOutcome::Unavailable => f.write_str("Unavailable"),
        }
    }
}

/// Paged package search.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search_page(&self, query: &PageQuery) -> Result<Vec<PackageSummary>>;
}

/// Per-version artifact download.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch(&self, package_id: &str, version: &str) -> Result<DownloadOutcome>;
}

/// Concrete endpoints used for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub search_url: String,
    pub package_base_url: String,
}

/// Build the shared HTTP client.
pub fn build_http_client(config: &RegistryConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|err| MirrorError::Network(format!("Failed to build HTTP client: {err}")))
}

/// Resolve search and package endpoints, consulting the service index only
/// for the ones not configured explicitly.
pub async fn resolve_endpoints(client: &reqwest::Client, config: &RegistryConfig) -> Result<Endpoints> {
    if let (Some(search), Some(base)) = (&config.search_url, &config.package_base_url) {
        return Ok(Endpoints {
            search_url: search.clone(),
            package_base_url: base.trim_end_matches('/').to_string(),
        });
    }

    let index = fetch_service_index(client, &config.service_index).await?;
    let search_url = match &config.search_url {
        Some(url) => url.clone(),
        None => index.resource(SEARCH_RESOURCE).ok_or_else(|| {
            MirrorError::Serialization(format!(
                "Service index {} lists no {SEARCH_RESOURCE}",
                config.service_index
            ))
        })?,
    };
    let package_base_url = match &config.package_base_url {
        Some(url) => url.clone(),
        None => index.resource(PACKAGE_BASE_RESOURCE).ok_or_else(|| {
            MirrorError::Serialization(format!(
                "Service index {} lists no {PACKAGE_BASE_RESOURCE}",
                config.service_index
            ))
        })?,
    };

    Ok(Endpoints {
        search_url,
        package_base_url: package_base_url.trim_end_matches('/').to_string(),
    })
}

async fn fetch_service_index(client: &reqwest::Client, url: &str) -> Result<ServiceIndex> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| MirrorError::Network(format!("Service index request {url} failed: {err}")))?;
    if !response.status().is_success() {
        return Err(MirrorError::Network(format!(
            "Service index {url} returned status {}",
            response.status()
        )));
    }
    response.json::<ServiceIndex>().await.map_err(|err| {
        MirrorError::Serialization(format!("Failed to decode service index {url}: {err}"))
    })
}

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    #[serde(default)]
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
}

impl ServiceIndex {
    fn resource(&self, kind_prefix: &str) -> Option<String> {
        self.resources
            .iter()
            .find(|resource| resource.kind.starts_with(kind_prefix))
            .map(|resource| resource.id.clone())
    }
}

/// Client for the V3 search endpoint.
#[derive(Clone)]
pub struct NuGetSearchClient {
    client: reqwest::Client,
    search_url: String,
    max_retries: usize,
    backoff_base: Duration,
}

impl NuGetSearchClient {
    pub fn new(client: reqwest::Client, search_url: impl Into<String>, max_retries: usize) -> Self {
        Self {
            client,
            search_url: search_url.into(),
            max_retries: max_retries.max(1),
            backoff_base: Duration::from_millis(200),
        }
    }

    #[cfg(test)]
    fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    fn compose_url(&self, query: &PageQuery) -> String {
        format!(
            "{}?q={}&prerelease={}&take={}&skip={}&sortBy={}",
            self.search_url,
            encode(&query.term),
            query.include_prerelease,
            query.batch_size,
            query.offset,
            PageQuery::SORT_BY
        )
    }
}

#[async_trait]
impl SearchSource for NuGetSearchClient {
    async fn search_page(&self, query: &PageQuery) -> Result<Vec<PackageSummary>> {
        let url = self.compose_url(query);
        let mut attempt = 0;
        loop {
            let response = self.client.get(&url).send().await.map_err(|err| {
                MirrorError::Network(format!("Search request to {url} failed: {err}"))
            })?;

            if response.status().is_success() {
                let payload = response.json::<SearchResponse>().await.map_err(|err| {
                    MirrorError::Serialization(format!("Failed to decode search page {url}: {err}"))
                })?;
                return Ok(payload.data.into_iter().map(SearchEntry::into_summary).collect());
            }

            attempt += 1;
            if attempt >= self.max_retries {
                return Err(MirrorError::Network(format!(
                    "Search request {url} failed with status {} after {attempt} attempts",
                    response.status()
                )));
            }
            let exponent = (attempt as u32).min(8);
            sleep(self.backoff_base.saturating_mul(1_u32 << exponent)).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntry {
    id: String,
    #[serde(default)]
    total_downloads: u64,
    #[serde(default)]
    versions: Vec<SearchVersion>,
}

#[derive(Debug, Deserialize)]
struct SearchVersion {
    version: String,
    downloads: Option<u64>,
}

impl SearchEntry {
    fn into_summary(self) -> PackageSummary {
        let versions = self
            .versions
            .into_iter()
            .map(|v| VersionEntry::new(v.version, v.downloads))
            .collect();
        PackageSummary::new(self.id, self.total_downloads, versions)
    }
}

/// Client for the flat-container package download endpoint.
#[derive(Clone)]
pub struct FlatContainerClient {
    client: reqwest::Client,
    base_url: String,
    extension: String,
}

impl FlatContainerClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            extension: extension.into(),
        }
    }

    fn compose_url(&self, package_id: &str, version: &str) -> String {
        let id = package_id.to_lowercase();
        let version = version
            .parse::<PackageVersion>()
            .map(|parsed| parsed.normalized())
            .unwrap_or_else(|_| version.trim().to_lowercase());
        format!(
            "{}/{}/{}/{}.{}.{}",
            self.base_url,
            encode(&id),
            encode(&version),
            encode(&id),
            encode(&version),
            self.extension
        )
    }
}

#[async_trait]
impl ArtifactSource for FlatContainerClient {
    async fn fetch(&self, package_id: &str, version: &str) -> Result<DownloadOutcome> {
        let url = self.compose_url(package_id, version);
        let response = self.client.get(&url).send().await.map_err(|err| {
            MirrorError::Network(format!("Download request to {url} failed: {err}"))
        })?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes_stream().map(move |chunk| {
                    chunk.map_err(|err| MirrorError::Network(format!("Download stream interrupted: {err}")))
                });
                Ok(DownloadOutcome::Available(Box::pin(body)))
            }
            StatusCode::NOT_FOUND => Ok(DownloadOutcome::Unavailable),
            status => Err(MirrorError::Network(format!(
                "Download {url} failed with status {status}"
            ))),
        }
    }
}
