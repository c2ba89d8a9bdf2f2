//! MusicBrainz metadata lookups by MBID.
//!
//! All requests go through one [`RequestQueue`] so the whole process stays
//! under the MusicBrainz rate limit. Successful responses are cached as raw
//! JSON bodies, keyed `mbz:<kind>:<mbid>`, and decoded again on a hit.

mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::config::MusicBrainzConfig;
use crate::error::{Error, Result};
use crate::queue::RequestQueue;

pub use types::{
    Alias, Artist, ArtistCredit, ArtistRef, Genre, Release, ReleaseGroup, TextRepresentation,
    Track, LATIN_SCRIPT, PSEUDO_RELEASE_STATUS,
};

const SERVICE: &str = "MusicBrainz";
const CACHE_PREFIX: &str = "mbz";

pub const ARTIST_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const RELEASE_GROUP_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const RELEASE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const RELEASE_WITH_GENRES_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const RECORDING_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One kind of entity lookup: where to fetch it and how long to keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Artist,
    ReleaseGroup,
    Release,
    ReleaseWithGenres,
    Recording,
}

impl Lookup {
    pub fn cache_label(&self) -> &'static str {
        match self {
            Lookup::Artist => "artist",
            Lookup::ReleaseGroup => "release-group",
            Lookup::Release => "release",
            Lookup::ReleaseWithGenres => "release-with-genres",
            Lookup::Recording => "recording",
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            Lookup::Artist => ARTIST_CACHE_TTL,
            Lookup::ReleaseGroup => RELEASE_GROUP_CACHE_TTL,
            Lookup::Release => RELEASE_CACHE_TTL,
            Lookup::ReleaseWithGenres => RELEASE_WITH_GENRES_CACHE_TTL,
            Lookup::Recording => RECORDING_CACHE_TTL,
        }
    }

    fn path(&self, id: Uuid) -> String {
        match self {
            Lookup::Artist => format!("/ws/2/artist/{}?inc=aliases+genres", id),
            Lookup::ReleaseGroup => {
                format!("/ws/2/release-group/{}?inc=releases+artists+genres", id)
            }
            Lookup::Release => format!("/ws/2/release/{}?inc=artists", id),
            Lookup::ReleaseWithGenres => {
                format!("/ws/2/release/{}?inc=release-groups+genres", id)
            }
            Lookup::Recording => format!("/ws/2/recording/{}", id),
        }
    }
}

pub fn cache_key(lookup: Lookup, id: Uuid) -> String {
    format!("{}:{}:{}", CACHE_PREFIX, lookup.cache_label(), id)
}

/// What catalog code needs from MusicBrainz. Backfill jobs take this trait so
/// they can run against a fake in tests.
#[async_trait]
pub trait MusicBrainzCaller: Send + Sync {
    async fn get_artist_primary_aliases(&self, id: Uuid) -> Result<Vec<String>>;
    async fn get_artist_genres(&self, id: Uuid) -> Result<Vec<String>>;
    async fn get_release_titles(&self, release_group_id: Uuid) -> Result<Vec<String>>;
    async fn get_latin_titles(&self, release_group_id: Uuid) -> Result<Vec<String>>;
    async fn get_track(&self, id: Uuid) -> Result<Track>;
    async fn get_release_group(&self, id: Uuid) -> Result<ReleaseGroup>;
    async fn get_release(&self, id: Uuid) -> Result<Release>;
    async fn get_release_with_genres(&self, id: Uuid) -> Result<Release>;
    async fn shutdown(&self);
}

pub struct MusicBrainzClient {
    base_url: String,
    user_agent: String,
    queue: RequestQueue,
    cache: Option<Arc<dyn CacheStore>>,
}

impl MusicBrainzClient {
    /// `rate_limit` is both the steady requests/second and the burst size.
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>, rate_limit: u32) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            queue: RequestQueue::new(rate_limit, rate_limit),
            cache: None,
        }
    }

    pub fn from_config(config: &MusicBrainzConfig, user_agent: &str) -> Self {
        Self::new(config.url.clone(), user_agent, config.rate_limit)
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn get_artist(&self, id: Uuid) -> Result<Artist> {
        self.get_entity_cached(Lookup::Artist, id).await
    }

    /// Cache-aside read: a decodable cached body wins, anything else falls
    /// through to the network. Only bodies that decode are written back.
    async fn get_entity_cached<T: DeserializeOwned>(&self, lookup: Lookup, id: Uuid) -> Result<T> {
        let key = cache_key(lookup, id);

        if let Some(entity) = self.read_cache::<T>(&key) {
            tracing::debug!("MusicBrainz cache hit for {}", key);
            return Ok(entity);
        }

        let body = self.fetch_body(lookup, id).await?;
        let entity = serde_json::from_slice::<T>(&body).map_err(|e| {
            tracing::error!(
                "Failed to decode MusicBrainz {} response for {}: {}",
                lookup.cache_label(),
                id,
                e
            );
            Error::decode(SERVICE, e)
        })?;

        self.write_cache(&key, &body, lookup.ttl());
        Ok(entity)
    }

    fn read_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get(key) {
            Ok(Some(body)) => match serde_json::from_slice(&body) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!("Discarding undecodable MusicBrainz cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read MusicBrainz cache entry {}: {}", key, e);
                None
            }
        }
    }

    fn write_cache(&self, key: &str, body: &[u8], ttl: Duration) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(key, body, ttl) {
                tracing::warn!("Failed to store MusicBrainz cache entry {}: {}", key, e);
            }
        }
    }

    async fn fetch_body(&self, lookup: Lookup, id: Uuid) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, lookup.path(id));
        let request = self
            .queue
            .client()
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .build()
            .map_err(|e| Error::http(SERVICE, e))?;

        tracing::debug!("Adding MusicBrainz request to queue: {}", url);
        let response = self
            .queue
            .execute(request, SERVICE)
            .await
            .and_then(|response| response.error_for_status(SERVICE))
            .map_err(|e| {
                tracing::warn!("MusicBrainz request for {} failed: {}", url, e);
                e
            })?;

        Ok(response.body)
    }
}

#[async_trait]
impl MusicBrainzCaller for MusicBrainzClient {
    async fn get_artist_primary_aliases(&self, id: Uuid) -> Result<Vec<String>> {
        Ok(self.get_artist(id).await?.primary_aliases())
    }

    async fn get_artist_genres(&self, id: Uuid) -> Result<Vec<String>> {
        Ok(self.get_artist(id).await?.genre_names())
    }

    async fn get_release_titles(&self, release_group_id: Uuid) -> Result<Vec<String>> {
        Ok(self.get_release_group(release_group_id).await?.release_titles())
    }

    async fn get_latin_titles(&self, release_group_id: Uuid) -> Result<Vec<String>> {
        Ok(self.get_release_group(release_group_id).await?.latin_titles())
    }

    async fn get_track(&self, id: Uuid) -> Result<Track> {
        self.get_entity_cached(Lookup::Recording, id).await
    }

    async fn get_release_group(&self, id: Uuid) -> Result<ReleaseGroup> {
        self.get_entity_cached(Lookup::ReleaseGroup, id).await
    }

    async fn get_release(&self, id: Uuid) -> Result<Release> {
        self.get_entity_cached(Lookup::Release, id).await
    }

    async fn get_release_with_genres(&self, id: Uuid) -> Result<Release> {
        self.get_entity_cached(Lookup::ReleaseWithGenres, id).await
    }

    async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}
