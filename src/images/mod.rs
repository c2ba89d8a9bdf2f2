//! Artist and album artwork lookup across external providers.
//!
//! Providers are tried in a fixed order and the first non-empty URL wins:
//! artists go Spotify, Subsonic, Deezer; albums go Spotify, Subsonic,
//! Cover Art Archive, Deezer. Disabled providers are left out of the chain.

mod cover;
mod cover_art_archive;
mod deezer;
mod spotify;
mod subsonic;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ImageSourceConfig;
use crate::error::Result;

pub use cover::{select_cover, CoverImage};
pub use cover_art_archive::CoverArtArchiveClient;
pub use deezer::DeezerClient;
pub use spotify::SpotifyClient;
pub use subsonic::SubsonicClient;
pub use types::{AlbumImageQuery, ArtistImageQuery};

/// One artwork source. A provider that has no image returns `Ok(None)`;
/// errors are reserved for failed requests.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn artist_image(&self, _query: &ArtistImageQuery) -> Result<Option<String>> {
        Ok(None)
    }

    async fn album_image(&self, _query: &AlbumImageQuery) -> Result<Option<String>> {
        Ok(None)
    }

    async fn shutdown(&self) {}
}

#[derive(Debug, Clone, Copy)]
enum ImageLookup<'a> {
    Artist(&'a ArtistImageQuery),
    Album(&'a AlbumImageQuery),
}

impl ImageLookup<'_> {
    fn kind(&self) -> &'static str {
        match self {
            ImageLookup::Artist(_) => "artist",
            ImageLookup::Album(_) => "album",
        }
    }
}

pub struct ImageResolver {
    artist_chain: Vec<Arc<dyn ImageProvider>>,
    album_chain: Vec<Arc<dyn ImageProvider>>,
    providers: Vec<Arc<dyn ImageProvider>>,
}

impl ImageResolver {
    pub fn new(config: &ImageSourceConfig, user_agent: &str) -> Self {
        let spotify = config.spotify.as_ref().map(|spotify| {
            Arc::new(SpotifyClient::new(spotify, user_agent)) as Arc<dyn ImageProvider>
        });
        let subsonic = config.subsonic.as_ref().map(|subsonic| {
            Arc::new(SubsonicClient::new(subsonic, user_agent)) as Arc<dyn ImageProvider>
        });
        let cover_art_archive = config.cover_art_archive.as_ref().map(|caa| {
            Arc::new(CoverArtArchiveClient::new(caa, user_agent)) as Arc<dyn ImageProvider>
        });
        let deezer = config.deezer.as_ref().map(|deezer| {
            Arc::new(DeezerClient::new(deezer, user_agent)) as Arc<dyn ImageProvider>
        });

        let artist_chain: Vec<_> = [spotify.clone(), subsonic.clone(), deezer.clone()]
            .into_iter()
            .flatten()
            .collect();
        let album_chain: Vec<_> = [spotify, subsonic, cover_art_archive, deezer]
            .into_iter()
            .flatten()
            .collect();

        let resolver = Self::from_chains(artist_chain, album_chain);
        if resolver.providers.is_empty() {
            tracing::warn!("No image providers are enabled; artwork lookups will find nothing");
        } else {
            tracing::info!(
                "Image providers enabled: {}",
                resolver
                    .providers
                    .iter()
                    .map(|provider| provider.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        resolver
    }

    /// Build a resolver from explicit chains. A provider may appear in both.
    pub fn from_chains(
        artist_chain: Vec<Arc<dyn ImageProvider>>,
        album_chain: Vec<Arc<dyn ImageProvider>>,
    ) -> Self {
        let mut providers: Vec<Arc<dyn ImageProvider>> = Vec::new();
        for provider in artist_chain.iter().chain(album_chain.iter()) {
            if !providers.iter().any(|known| same_provider(known, provider)) {
                providers.push(provider.clone());
            }
        }

        Self {
            artist_chain,
            album_chain,
            providers,
        }
    }

    pub fn artist_provider_names(&self) -> Vec<&'static str> {
        self.artist_chain.iter().map(|p| p.name()).collect()
    }

    pub fn album_provider_names(&self) -> Vec<&'static str> {
        self.album_chain.iter().map(|p| p.name()).collect()
    }

    pub async fn artist_image(&self, query: &ArtistImageQuery) -> Result<Option<String>> {
        resolve(&self.artist_chain, ImageLookup::Artist(query)).await
    }

    pub async fn album_image(&self, query: &AlbumImageQuery) -> Result<Option<String>> {
        resolve(&self.album_chain, ImageLookup::Album(query)).await
    }

    /// Stop every provider's request queue. Each provider is shut down once
    /// even when it sits in both chains.
    pub async fn shutdown(&self) {
        for provider in &self.providers {
            provider.shutdown().await;
        }
    }
}

fn same_provider(a: &Arc<dyn ImageProvider>, b: &Arc<dyn ImageProvider>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Errors from all but the last provider are logged and the chain moves on;
/// the last provider's error is returned to the caller.
async fn resolve(
    chain: &[Arc<dyn ImageProvider>],
    lookup: ImageLookup<'_>,
) -> Result<Option<String>> {
    if chain.is_empty() {
        tracing::warn!("No image providers are enabled for {} images", lookup.kind());
        return Ok(None);
    }

    let last = chain.len() - 1;
    for (position, provider) in chain.iter().enumerate() {
        tracing::debug!(
            "Attempting to find {} image from {}",
            lookup.kind(),
            provider.name()
        );

        let attempt = match lookup {
            ImageLookup::Artist(query) => provider.artist_image(query).await,
            ImageLookup::Album(query) => provider.album_image(query).await,
        };

        match attempt {
            Ok(Some(url)) if !url.trim().is_empty() => {
                tracing::debug!("Found {} image from {}", lookup.kind(), provider.name());
                return Ok(Some(url));
            }
            Ok(_) => {
                tracing::debug!("No {} image from {}", lookup.kind(), provider.name());
            }
            Err(e) if position == last => {
                tracing::warn!(
                    "Could not get {} image from {}: {}",
                    lookup.kind(),
                    provider.name(),
                    e
                );
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not get {} image from {}, trying next provider: {}",
                    lookup.kind(),
                    provider.name(),
                    e
                );
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests;
