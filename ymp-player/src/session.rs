//! Listening session
//!
//! Ties the catalog client to the playback controller: search results form a
//! track list that can be walked forwards and backwards, and the current
//! track can be saved to disk.

use crate::catalog::models::Track;
use crate::catalog::{CatalogClient, CatalogError};
use crate::error::{Error, Result};
use crate::playback::{PlaybackState, StreamPlayer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Search results and the position of the current track
#[derive(Debug, Default)]
pub struct TrackList {
    tracks: Vec<Track>,
    index: usize,
}

impl TrackList {
    /// Replace the results; the current position returns to the first track.
    pub fn set_results(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.index = 0;
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    /// Make `index` current.
    pub fn select(&mut self, index: usize) -> Result<&Track> {
        if index >= self.tracks.len() {
            return Err(Error::Navigation("index out of range".to_string()));
        }
        self.index = index;
        Ok(&self.tracks[index])
    }

    /// Move to the following track.
    pub fn advance(&mut self) -> Result<&Track> {
        if self.index + 1 >= self.tracks.len() {
            return Err(Error::Navigation("no more tracks".to_string()));
        }
        self.select(self.index + 1)
    }

    /// Move to the preceding track.
    pub fn retreat(&mut self) -> Result<&Track> {
        if self.index == 0 || self.tracks.is_empty() {
            return Err(Error::Navigation("no more tracks".to_string()));
        }
        self.select(self.index - 1)
    }

    pub fn select_last(&mut self) -> Result<&Track> {
        match self.tracks.len() {
            0 => Err(Error::Navigation("index out of range".to_string())),
            n => self.select(n - 1),
        }
    }
}

/// File name used when saving a track: `<title> (<artists>).mp3`
pub fn download_file_name(title: &str, artists: &str) -> String {
    let name = format!("{} ({}).mp3", title, artists);
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Catalog search plus playback of the selected track
pub struct MusicSession {
    catalog: CatalogClient,
    player: Arc<StreamPlayer>,
    tracks: TrackList,
}

impl MusicSession {
    pub fn new(catalog: CatalogClient, player: Arc<StreamPlayer>) -> Self {
        Self {
            catalog,
            player,
            tracks: TrackList::default(),
        }
    }

    pub fn player(&self) -> &Arc<StreamPlayer> {
        &self.player
    }

    pub fn tracks(&self) -> &TrackList {
        &self.tracks
    }

    /// Search the catalog and make the results the current track list.
    pub async fn search(&mut self, query: &str) -> Result<&[Track]> {
        let results = self.catalog.search_tracks(query).await?;
        info!("Found {} tracks for '{}'", results.len(), query);
        self.tracks.set_results(results);
        Ok(self.tracks.tracks())
    }

    pub async fn play_index(&mut self, index: usize) -> Result<()> {
        let track = self.tracks.select(index)?.clone();
        self.play_track(&track).await
    }

    pub async fn play_next(&mut self) -> Result<()> {
        let track = self.tracks.advance()?.clone();
        self.play_track(&track).await
    }

    pub async fn play_previous(&mut self) -> Result<()> {
        let track = self.tracks.retreat()?.clone();
        self.play_track(&track).await
    }

    pub async fn play_first(&mut self) -> Result<()> {
        self.play_index(0).await
    }

    pub async fn play_last(&mut self) -> Result<()> {
        let track = self.tracks.select_last()?.clone();
        self.play_track(&track).await
    }

    async fn play_track(&self, track: &Track) -> Result<()> {
        let url = self.catalog.download_url(&track.id).await?;
        debug!("Playing track {} from {}", track.id, url);

        let player = Arc::clone(&self.player);
        tokio::task::spawn_blocking(move || player.replace(&url))
            .await
            .map_err(|e| Error::Internal(format!("Playback task failed: {}", e)))?
    }

    /// Pause when playing, resume when paused. Returns the new state.
    pub fn toggle_pause(&self) -> PlaybackState {
        match self.player.state() {
            PlaybackState::Playing => self.player.pause(),
            PlaybackState::Paused => self.player.resume(),
            _ => {}
        }
        self.player.state()
    }

    pub async fn stop(&self) -> Result<()> {
        let player = Arc::clone(&self.player);
        tokio::task::spawn_blocking(move || player.stop())
            .await
            .map_err(|e| Error::Internal(format!("Stop task failed: {}", e)))?
    }

    pub async fn close(&self) -> Result<()> {
        let player = Arc::clone(&self.player);
        tokio::task::spawn_blocking(move || player.close())
            .await
            .map_err(|e| Error::Internal(format!("Close task failed: {}", e)))?
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.player.is_paused()
    }

    pub fn length(&self) -> Duration {
        self.player.length()
    }

    /// Title and comma-separated artists of the current track
    pub fn current_track(&self) -> Option<(String, String)> {
        self.tracks
            .current()
            .map(|track| (track.display_title(), track.artist_names()))
    }

    /// Save the current track as mp3 under `dir`.
    pub async fn download_current(&self, dir: &Path) -> Result<PathBuf> {
        let track = self
            .tracks
            .current()
            .ok_or_else(|| Error::Navigation("no track to download".to_string()))?;

        let url = self.catalog.download_url(&track.id).await?;
        let path = dir.join(download_file_name(
            &track.display_title(),
            &track.artist_names(),
        ));
        self.save_url(&url, &path).await?;
        Ok(path)
    }

    /// Stream the body of `url` into `path`, creating parent directories.
    pub async fn save_url(&self, url: &str, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut response = self.catalog.fetch_file(url).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(CatalogError::from)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Saved {} bytes to {}", written, path.display());
        Ok(written)
    }
}
