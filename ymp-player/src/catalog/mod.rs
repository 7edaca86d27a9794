//! Yandex Music catalog client
//!
//! Track search, download URL resolution and account lookup over the public
//! REST API. Requests carry `Authorization: OAuth <token>`.

pub mod models;

use md5::{Digest, Md5};
use models::{AccountStatus, ApiResponse, DownloadInfo, DownloadLocation, SearchResult, Track};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Public API endpoint
pub const DEFAULT_API_URL: &str = "https://api.music.yandex.net";

/// Salt mixed into download URL signatures
const SIGN_SALT: &str = "XGRlBW9FXlekgbPrRHuSiA";

/// Timeout for JSON API calls (file downloads are not limited)
const API_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body quoted in an error message
const MAX_ERROR_BODY: usize = 200;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("no downloadable mp3 for track {0}")]
    NoDownloadInfo(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Network(err.to_string())
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Authenticated catalog client
pub struct CatalogClient {
    client: Client,
    base_url: String,
    token: String,
}

impl CatalogClient {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> CatalogResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("ymp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn auth_header(&self) -> String {
        format!("OAuth {}", self.token)
    }

    /// GET an API endpoint and unwrap the `result` envelope.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> CatalogResult<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {} with {} params", url, params.len());

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .query(params)
            .timeout(API_TIMEOUT)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        let envelope: ApiResponse<T> = serde_json::from_str(&body)
            .map_err(|e| CatalogError::Parse(format!("{}: {}", endpoint, e)))?;
        Ok(envelope.result)
    }

    /// Search tracks matching `query` (first page).
    pub async fn search_tracks(&self, query: &str) -> CatalogResult<Vec<Track>> {
        let result: SearchResult = self
            .get_json(
                "/search",
                &[
                    ("text", query),
                    ("type", "track"),
                    ("page", "0"),
                    ("nocorrect", "false"),
                ],
            )
            .await?;

        let tracks = result.tracks.map(|page| page.results).unwrap_or_default();
        debug!("Search '{}' returned {} tracks", query, tracks.len());
        Ok(tracks)
    }

    /// Resolve a direct, signed mp3 URL for a track.
    pub async fn download_url(&self, track_id: &str) -> CatalogResult<String> {
        let infos: Vec<DownloadInfo> = self
            .get_json(&format!("/tracks/{}/download-info", track_id), &[])
            .await?;

        let best = models::best_mp3(&infos)
            .ok_or_else(|| CatalogError::NoDownloadInfo(track_id.to_string()))?;
        debug!(
            "Track {}: using {} kbps {}",
            track_id, best.bitrate_in_kbps, best.codec
        );

        let response = self
            .client
            .get(&best.download_info_url)
            .header("Authorization", self.auth_header())
            .timeout(API_TIMEOUT)
            .send()
            .await?;
        let xml = check_status(response).await?.text().await?;

        let location: DownloadLocation = quick_xml::de::from_str(&xml)
            .map_err(|e| CatalogError::Parse(format!("download info: {}", e)))?;

        Ok(signed_url(&location))
    }

    /// Numeric user id of the token's account.
    pub async fn account_uid(&self) -> CatalogResult<u64> {
        let status: AccountStatus = self.get_json("/account/status", &[]).await?;
        status
            .account
            .uid
            .ok_or_else(|| CatalogError::Parse("account status has no uid".to_string()))
    }

    /// Start a GET for a file, failing on a non-success status.
    pub async fn fetch_file(&self, url: &str) -> CatalogResult<Response> {
        let response = self
            .client
            .get(url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> CatalogResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("Unknown").to_string()
    } else {
        body.chars().take(MAX_ERROR_BODY).collect()
    };

    Err(CatalogError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Build the signed storage URL for a download descriptor.
pub fn signed_url(location: &DownloadLocation) -> String {
    let mut hasher = Md5::new();
    hasher.update(SIGN_SALT.as_bytes());
    hasher.update(location.path.get(1..).unwrap_or("").as_bytes());
    hasher.update(location.s.as_bytes());
    let sign = hex::encode(hasher.finalize());

    format!(
        "https://{}/get-mp3/{}/{}{}",
        location.host, sign, location.ts, location.path
    )
}
