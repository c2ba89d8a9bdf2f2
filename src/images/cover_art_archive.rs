use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use super::cover::{select_cover, CoverImage};
use super::{AlbumImageQuery, ImageProvider};
use crate::config::CoverArtArchiveConfig;
use crate::error::{Error, Result};
use crate::queue::client_or_default;

const SERVICE: &str = "Cover Art Archive";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct ImageListing {
    #[serde(default)]
    images: Vec<ListedImage>,
}

#[derive(Debug, Deserialize)]
struct ListedImage {
    #[serde(default)]
    image: String,
    #[serde(default)]
    front: bool,
    #[serde(default)]
    back: bool,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    thumbnails: HashMap<String, String>,
}

impl From<ListedImage> for CoverImage {
    fn from(listed: ListedImage) -> Self {
        CoverImage {
            url: listed.image,
            front: listed.front,
            back: listed.back,
            width: listed.width.unwrap_or(0),
            height: listed.height.unwrap_or(0),
            thumbnails: listed.thumbnails,
        }
    }
}

/// Direct Cover Art Archive lookups by release or release group MBID.
///
/// The archive is a CDN-backed redirect service without a published rate
/// limit, so requests go straight out instead of through a queue.
pub struct CoverArtArchiveClient {
    base_url: String,
    user_agent: String,
    client: reqwest::Client,
}

impl CoverArtArchiveClient {
    pub fn new(config: &CoverArtArchiveConfig, user_agent: &str) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            client: client_or_default(
                reqwest::Client::builder().timeout(REQUEST_TIMEOUT),
                SERVICE,
            ),
        }
    }

    /// `kind` is "release" or "release-group".
    async fn lookup(&self, kind: &str, id: Uuid) -> Result<Option<String>> {
        if let Some(url) = self.listed_cover(kind, id).await? {
            return Ok(Some(url));
        }

        let front_url = format!("{}/{}/{}/front", self.base_url, kind, id);
        let response = self
            .client
            .head(&front_url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| Error::http(SERVICE, e))?;

        if response.status() == StatusCode::OK {
            return Ok(Some(front_url));
        }

        tracing::debug!("No front cover at {} ({})", front_url, response.status());
        Ok(None)
    }

    async fn listed_cover(&self, kind: &str, id: Uuid) -> Result<Option<String>> {
        let listing_url = format!("{}/{}/{}", self.base_url, kind, id);
        let response = self
            .client
            .get(&listing_url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| Error::http(SERVICE, e))?;

        if response.status() != StatusCode::OK {
            tracing::debug!("No cover listing at {} ({})", listing_url, response.status());
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::http(SERVICE, e))?;
        let listing: ImageListing =
            serde_json::from_slice(&body).map_err(|e| Error::decode(SERVICE, e))?;

        let images: Vec<CoverImage> = listing.images.into_iter().map(CoverImage::from).collect();
        Ok(select_cover(&images))
    }
}

#[async_trait]
impl ImageProvider for CoverArtArchiveClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    /// Release first, then release group. Nil MBIDs are skipped.
    async fn album_image(&self, query: &AlbumImageQuery) -> Result<Option<String>> {
        let targets = [
            ("release", query.release_id),
            ("release-group", query.release_group_id),
        ];

        for (kind, id) in targets {
            let Some(id) = id.filter(|id| !id.is_nil()) else {
                continue;
            };
            tracing::debug!("Checking Cover Art Archive for {} {}", kind, id);
            if let Some(url) = self.lookup(kind, id).await? {
                return Ok(Some(url));
            }
        }

        Ok(None)
    }
}
