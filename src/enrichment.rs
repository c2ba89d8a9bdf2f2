use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::{CacheStore, MemoryStore, SqliteStore};
use crate::config::Config;
use crate::images::ImageResolver;
use crate::musicbrainz::{MusicBrainzCaller, MusicBrainzClient};

/// Everything an application needs for metadata and artwork enrichment,
/// built once from a [`Config`].
///
/// Must be created inside a Tokio runtime; each client starts its queue
/// worker on construction.
pub struct Enrichment {
    pub cache: Arc<dyn CacheStore>,
    pub musicbrainz: Arc<MusicBrainzClient>,
    pub images: Arc<ImageResolver>,
}

impl Enrichment {
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache: Arc<dyn CacheStore> = match &config.cache_path {
            Some(path) => Arc::new(
                SqliteStore::open(path)
                    .with_context(|| format!("failed to open cache database at {}", path))?,
            ),
            None => {
                tracing::info!("Using in-memory cache");
                Arc::new(MemoryStore::new())
            }
        };

        let musicbrainz = MusicBrainzClient::from_config(&config.musicbrainz, &config.user_agent)
            .with_cache(cache.clone());
        let images = ImageResolver::new(&config.images, &config.user_agent);

        tracing::info!("MusicBrainz client using {}", config.musicbrainz.url);

        Ok(Self {
            cache,
            musicbrainz: Arc::new(musicbrainz),
            images: Arc::new(images),
        })
    }

    /// Stop every request queue. Pending lookups resolve as cancelled.
    pub async fn shutdown(&self) {
        self.musicbrainz.shutdown().await;
        self.images.shutdown().await;
    }
}
