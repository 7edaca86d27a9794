//! Release check
//!
//! Compares the running version with the latest GitHub release of the
//! project. Installing the release is left to the user.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::debug;

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_RELEASE_REPO: &str = "denizsincar29/go_yandex_music";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate { current: String },
    Available { current: String, latest: String, url: String },
}

/// Parse `v1.2.3` / `1.2` into numeric components.
///
/// Pre-release and build suffixes (`-rc1`, `+git`) are ignored.
pub fn parse_version(version: &str) -> Option<Vec<u64>> {
    let version = version.trim();
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);
    let core = version.split(['-', '+']).next()?;
    if core.is_empty() {
        return None;
    }
    core.split('.').map(|part| part.parse::<u64>().ok()).collect()
}

/// Compare two version strings numerically; missing components count as 0.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let a = parse_version(a)?;
    let b = parse_version(b)?;
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

/// Ask GitHub for the latest release of `repo` and compare with `current`.
pub async fn check_for_update(api_url: &str, repo: &str, current: &str) -> Result<UpdateStatus> {
    let url = format!("{}/repos/{}/releases/latest", api_url.trim_end_matches('/'), repo);
    debug!("Checking for updates at {}", url);

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("ymp/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Update(e.to_string()))?;

    let response = client
        .get(&url)
        .header("Accept", "application/vnd.github+json")
        .send()
        .await
        .map_err(|e| Error::Update(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Update(format!("release lookup returned {}", status)));
    }

    let release: Release = response
        .json()
        .await
        .map_err(|e| Error::Update(format!("invalid release data: {}", e)))?;

    match compare_versions(&release.tag_name, current) {
        Some(Ordering::Greater) => Ok(UpdateStatus::Available {
            current: current.to_string(),
            latest: release.tag_name,
            url: release.html_url,
        }),
        Some(_) => Ok(UpdateStatus::UpToDate {
            current: current.to_string(),
        }),
        None => Err(Error::Update(format!(
            "cannot compare release tag '{}' with version {}",
            release.tag_name, current
        ))),
    }
}
