use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;

use super::types::first_name;
use super::{AlbumImageQuery, ArtistImageQuery, ImageProvider};
use crate::config::SubsonicConfig;
use crate::error::{Error, Result};
use crate::queue::RequestQueue;

const SERVICE: &str = "Subsonic";
const API_VERSION: &str = "1.13.0";
const CLIENT_NAME: &str = "linernotes";
const RATE_LIMIT: u32 = 5;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "subsonic-response")]
    response: SubsonicResponse,
}

#[derive(Debug, Deserialize)]
struct SubsonicResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<SubsonicError>,
    #[serde(rename = "searchResult3", default)]
    search_result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SubsonicError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    album: Vec<AlbumHit>,
    #[serde(default)]
    artist: Vec<ArtistHit>,
}

#[derive(Debug, Deserialize)]
struct AlbumHit {
    #[serde(rename = "coverArt", default)]
    cover_art: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistHit {
    #[serde(rename = "artistImageUrl", default)]
    artist_image_url: Option<String>,
}

/// Self-hosted Subsonic-compatible server (Navidrome, Gonic, ...).
pub struct SubsonicClient {
    url: String,
    auth_params: String,
    user_agent: String,
    queue: RequestQueue,
}

impl SubsonicClient {
    pub fn new(config: &SubsonicConfig, user_agent: &str) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_string(),
            auth_params: config.auth_params.clone(),
            user_agent: user_agent.to_string(),
            queue: RequestQueue::new(RATE_LIMIT, RATE_LIMIT),
        }
    }

    fn cover_art_url(&self, cover_art: &str) -> String {
        format!(
            "{}/rest/getCoverArt?{}&id={}&v={}&c={}",
            self.url,
            self.auth_params,
            urlencoding::encode(cover_art),
            API_VERSION,
            CLIENT_NAME
        )
    }

    async fn search3(&self, query: &str, artist_count: u32, album_count: u32) -> Result<SearchResult> {
        let url = format!(
            "{}/rest/search3?{}&f=json&query={}&v={}&c={}&artistCount={}&songCount=0&albumCount={}",
            self.url,
            self.auth_params,
            urlencoding::encode(query),
            API_VERSION,
            CLIENT_NAME,
            artist_count,
            album_count
        );

        let request = self
            .queue
            .client()
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .build()
            .map_err(|e| Error::http(SERVICE, e))?;

        tracing::debug!("Adding Subsonic search to queue: {}", query);
        let response = self
            .queue
            .execute(request, SERVICE)
            .await?
            .error_for_status(SERVICE)?;

        let envelope: Envelope =
            serde_json::from_slice(&response.body).map_err(|e| Error::decode(SERVICE, e))?;
        let response = envelope.response;

        if response.status != "ok" {
            let message = response
                .error
                .map(|error| format!("{} (code {})", error.message, error.code))
                .unwrap_or_else(|| format!("status {:?}", response.status));
            return Err(Error::Upstream {
                service: SERVICE,
                message,
            });
        }

        Ok(response.search_result)
    }
}

#[async_trait]
impl ImageProvider for SubsonicClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn artist_image(&self, query: &ArtistImageQuery) -> Result<Option<String>> {
        let Some(name) = first_name(&query.names) else {
            return Ok(None);
        };

        let result = self.search3(name, 1, 0).await?;
        Ok(result
            .artist
            .into_iter()
            .filter_map(|artist| artist.artist_image_url)
            .map(|url| url.trim().to_string())
            .find(|url| !url.is_empty()))
    }

    async fn album_image(&self, query: &AlbumImageQuery) -> Result<Option<String>> {
        let album = query.album.trim();
        let Some(artist) = first_name(&query.artists) else {
            return Ok(None);
        };
        if album.is_empty() {
            return Ok(None);
        }

        let result = self.search3(&format!("{} {}", artist, album), 0, 1).await?;
        Ok(result
            .album
            .iter()
            .filter_map(|hit| hit.cover_art.as_deref())
            .map(str::trim)
            .find(|cover_art| !cover_art.is_empty())
            .map(|cover_art| self.cover_art_url(cover_art)))
    }

    async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}
