use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::types::{distinct_names, matches_any};
use super::{AlbumImageQuery, ArtistImageQuery, ImageProvider};
use crate::config::SpotifyConfig;
use crate::error::{Error, Result};
use crate::queue::RequestQueue;

const SERVICE: &str = "Spotify";
const SEARCH_LIMIT: u32 = 5;
const RATE_LIMIT: u32 = 5;
/// Tokens are treated as expired this long before Spotify says they are.
const TOKEN_EXPIRY_PADDING: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    albums: AlbumPage,
    #[serde(default)]
    artists: ArtistPage,
}

#[derive(Debug, Default, Deserialize)]
struct AlbumPage {
    #[serde(default)]
    items: Vec<Option<SpotifyAlbum>>,
}

#[derive(Debug, Default, Deserialize)]
struct ArtistPage {
    #[serde(default)]
    items: Vec<Option<SpotifyArtist>>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtistRef>,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtistRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

/// Spotify lists images widest first.
#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

fn first_image(images: &[SpotifyImage]) -> Option<String> {
    images
        .iter()
        .map(|image| image.url.trim())
        .find(|url| !url.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

fn token_lifetime(expires_in: u64) -> Duration {
    let lifetime = Duration::from_secs(expires_in);
    if lifetime > TOKEN_EXPIRY_PADDING {
        lifetime - TOKEN_EXPIRY_PADDING
    } else {
        lifetime
    }
}

#[derive(Debug, Clone, Copy)]
enum SearchKind {
    Album,
    Artist,
}

impl SearchKind {
    fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Album => "album",
            SearchKind::Artist => "artist",
        }
    }
}

/// Spotify Web API search with client-credentials auth.
pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    token_url: String,
    api_url: String,
    market: Option<String>,
    user_agent: String,
    queue: RequestQueue,
    token: RwLock<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, user_agent: &str) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: config.token_url.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            market: config.market.clone(),
            user_agent: user_agent.to_string(),
            queue: RequestQueue::new(RATE_LIMIT, RATE_LIMIT),
            token: RwLock::new(None),
        }
    }

    /// Cached token if still fresh, otherwise a new one. Concurrent callers
    /// that miss together fetch only once.
    async fn access_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref().filter(|token| token.is_fresh()) {
                return Ok(token.value.clone());
            }
        }

        let mut token = self.token.write().await;
        if let Some(current) = token.as_ref().filter(|current| current.is_fresh()) {
            return Ok(current.value.clone());
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *token = Some(fresh);
        tracing::debug!("Obtained new Spotify access token");
        Ok(value)
    }

    /// Forget `rejected` unless another caller already replaced it.
    async fn invalidate_token(&self, rejected: &str) {
        let mut token = self.token.write().await;
        if token.as_ref().is_some_and(|current| current.value == rejected) {
            *token = None;
        }
    }

    async fn request_token(&self) -> Result<AccessToken> {
        let credentials =
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .queue
            .client()
            .post(&self.token_url)
            .header(AUTHORIZATION, format!("Basic {}", credentials))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| Error::http(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Spotify token request failed with status {}", status);
            return Err(Error::Status {
                service: SERVICE,
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::http(SERVICE, e))?;
        let parsed: TokenResponse =
            serde_json::from_slice(&body).map_err(|e| Error::decode(SERVICE, e))?;

        Ok(AccessToken {
            value: parsed.access_token,
            expires_at: Instant::now() + token_lifetime(parsed.expires_in),
        })
    }

    /// Run one search, refreshing the token and retrying once on 401.
    async fn search(&self, kind: SearchKind, query: &str) -> Result<SearchResponse> {
        let token = self.access_token().await?;
        if let Some(found) = self.search_once(&token, kind, query).await? {
            return Ok(found);
        }

        tracing::debug!("Spotify rejected the access token, refreshing and retrying");
        self.invalidate_token(&token).await;
        let token = self.access_token().await?;
        match self.search_once(&token, kind, query).await? {
            Some(found) => Ok(found),
            None => Err(Error::Unauthorized { service: SERVICE }),
        }
    }

    /// `Ok(None)` means the token was rejected.
    async fn search_once(
        &self,
        token: &str,
        kind: SearchKind,
        query: &str,
    ) -> Result<Option<SearchResponse>> {
        let mut url = format!(
            "{}/v1/search?type={}&limit={}&q={}",
            self.api_url,
            kind.as_str(),
            SEARCH_LIMIT,
            urlencoding::encode(query)
        );
        if let Some(market) = &self.market {
            url.push_str("&market=");
            url.push_str(&urlencoding::encode(market));
        }

        let request = self
            .queue
            .client()
            .get(&url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .build()
            .map_err(|e| Error::http(SERVICE, e))?;

        tracing::debug!("Adding Spotify {} search to queue: {}", kind.as_str(), query);
        let response = self.queue.execute(request, SERVICE).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        let response = response.error_for_status(SERVICE)?;
        let parsed = serde_json::from_slice(&response.body).map_err(|e| Error::decode(SERVICE, e))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl ImageProvider for SpotifyClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn artist_image(&self, query: &ArtistImageQuery) -> Result<Option<String>> {
        for name in distinct_names(&query.names) {
            let response = self
                .search(SearchKind::Artist, &format!("artist:\"{}\"", name))
                .await?;

            let found = response
                .artists
                .items
                .iter()
                .flatten()
                .filter(|artist| artist.name.trim().to_lowercase() == name.to_lowercase())
                .find_map(|artist| first_image(&artist.images));

            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }

    /// Tries `album:"A" artist:"X"` for each artist, then `album:"A"` alone.
    async fn album_image(&self, query: &AlbumImageQuery) -> Result<Option<String>> {
        let album = query.album.trim();
        if album.is_empty() {
            return Ok(None);
        }

        let artists = distinct_names(&query.artists);
        let mut searches: Vec<String> = artists
            .iter()
            .map(|artist| format!("album:\"{}\" artist:\"{}\"", album, artist))
            .collect();
        searches.push(format!("album:\"{}\"", album));

        for search in &searches {
            let response = self.search(SearchKind::Album, search).await?;

            let found = response
                .albums
                .items
                .iter()
                .flatten()
                .filter(|item| item.name.trim().to_lowercase() == album.to_lowercase())
                .filter(|item| {
                    artists.is_empty()
                        || item
                            .artists
                            .iter()
                            .any(|artist| matches_any(&artist.name, &artists))
                })
                .find_map(|item| first_image(&item.images));

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
