//! Catalog data models
//!
//! Only the fields the player uses are mapped; everything else in the API
//! payloads is ignored.

use serde::{Deserialize, Deserializer};

/// Accept IDs sent either as strings or as numbers.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::custom("ID must be a string or number")),
    }
}

/// Envelope wrapping every API answer
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub result: T,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Artist {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Album {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub albums: Vec<Album>,
}

fn default_available() -> bool {
    true
}

impl Track {
    /// Artist names joined with `", "`
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Title including the version suffix, e.g. `Song (Remastered)`
    pub fn display_title(&self) -> String {
        match self.version.as_deref() {
            Some(version) if !version.is_empty() => format!("{} ({})", self.title, version),
            _ => self.title.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub tracks: Option<TrackPage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackPage {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub results: Vec<Track>,
}

/// One downloadable variant of a track
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub codec: String,
    pub bitrate_in_kbps: u32,
    pub download_info_url: String,
    #[serde(default)]
    pub direct: bool,
    #[serde(default)]
    pub preview: bool,
}

/// XML descriptor behind `download_info_url`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename = "download-info")]
pub struct DownloadLocation {
    pub host: String,
    pub path: String,
    pub ts: String,
    #[serde(default)]
    pub region: Option<String>,
    pub s: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountStatus {
    pub account: Account,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub uid: Option<u64>,
    #[serde(default)]
    pub login: Option<String>,
}

/// Pick the best full-length mp3 variant (highest bitrate).
pub fn best_mp3(infos: &[DownloadInfo]) -> Option<&DownloadInfo> {
    infos
        .iter()
        .filter(|info| info.codec == "mp3" && !info.preview)
        .max_by_key(|info| info.bitrate_in_kbps)
}
