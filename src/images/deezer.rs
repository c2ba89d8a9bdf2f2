use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::types::{distinct_names, matches_any};
use super::{AlbumImageQuery, ArtistImageQuery, ImageProvider};
use crate::config::DeezerConfig;
use crate::error::{Error, Result};
use crate::queue::RequestQueue;

const SERVICE: &str = "Deezer";
const RATE_LIMIT: u32 = 5;

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    error: Option<DeezerError>,
}

#[derive(Debug, Deserialize)]
struct DeezerError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResult {
    name: String,
    picture_xl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumSearchResult {
    title: String,
    cover_xl: Option<String>,
    artist: Option<AlbumArtist>,
}

#[derive(Debug, Deserialize)]
struct AlbumArtist {
    name: String,
}

/// Deezer serves a grey silhouette for entries without artwork; its path has
/// an empty image hash.
fn usable_image(url: Option<&str>) -> Option<String> {
    let url = url?.trim();
    if url.is_empty() || url.contains("/artist//") || url.contains("/cover//") {
        return None;
    }
    Some(url.to_string())
}

pub struct DeezerClient {
    url: String,
    user_agent: String,
    queue: RequestQueue,
}

impl DeezerClient {
    pub fn new(config: &DeezerConfig, user_agent: &str) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            queue: RequestQueue::new(RATE_LIMIT, RATE_LIMIT),
        }
    }

    async fn search<T: DeserializeOwned>(&self, kind: &str, query: &str) -> Result<Vec<T>> {
        let search_url = format!(
            "{}/search/{}?q={}",
            self.url,
            kind,
            urlencoding::encode(query)
        );

        let request = self
            .queue
            .client()
            .get(&search_url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .build()
            .map_err(|e| Error::http(SERVICE, e))?;

        tracing::debug!("Adding Deezer {} search to queue: {}", kind, query);
        let response = self
            .queue
            .execute(request, SERVICE)
            .await?
            .error_for_status(SERVICE)?;

        let parsed: SearchResponse<T> =
            serde_json::from_slice(&response.body).map_err(|e| Error::decode(SERVICE, e))?;

        // Quota and parameter errors come back as 200 with an error object.
        if let Some(error) = parsed.error {
            return Err(Error::Upstream {
                service: SERVICE,
                message: format!("{} (code {})", error.message, error.code),
            });
        }

        Ok(parsed.data)
    }
}

#[async_trait]
impl ImageProvider for DeezerClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn artist_image(&self, query: &ArtistImageQuery) -> Result<Option<String>> {
        for name in distinct_names(&query.names) {
            let results: Vec<ArtistSearchResult> = self.search("artist", &name).await?;

            let found = results
                .iter()
                .filter(|artist| artist.name.trim().to_lowercase() == name.to_lowercase())
                .find_map(|artist| usable_image(artist.picture_xl.as_deref()));

            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }

    async fn album_image(&self, query: &AlbumImageQuery) -> Result<Option<String>> {
        let album = query.album.trim();
        if album.is_empty() {
            return Ok(None);
        }

        let artists = distinct_names(&query.artists);
        let searches: Vec<String> = if artists.is_empty() {
            vec![format!("album:\"{}\"", album)]
        } else {
            artists
                .iter()
                .map(|artist| format!("artist:\"{}\" album:\"{}\"", artist, album))
                .collect()
        };

        for search in &searches {
            let results: Vec<AlbumSearchResult> = self.search("album", search).await?;

            let found = results
                .iter()
                .filter(|item| item.title.trim().to_lowercase() == album.to_lowercase())
                .filter(|item| {
                    artists.is_empty()
                        || item
                            .artist
                            .as_ref()
                            .is_some_and(|artist| matches_any(&artist.name, &artists))
                })
                .find_map(|item| usable_image(item.cover_xl.as_deref()));

            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }

    async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}
