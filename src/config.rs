//! Environment-driven settings.
//!
//! `Config::from_env` loads `.env` when present and then reads the process
//! environment; `Config::from_lookup` takes any key lookup so tests never
//! touch the real environment.

use std::fmt;

use anyhow::{bail, Context, Result};

pub const DEFAULT_USER_AGENT: &str = concat!(
    "linernotes/",
    env!("CARGO_PKG_VERSION"),
    " ( https://github.com/linernotes/linernotes )"
);
pub const DEFAULT_MUSICBRAINZ_URL: &str = "https://musicbrainz.org";
/// MusicBrainz asks anonymous clients for one request per second.
pub const DEFAULT_MUSICBRAINZ_RATE_LIMIT: u32 = 1;
pub const DEFAULT_COVER_ART_ARCHIVE_URL: &str = "https://coverartarchive.org";
pub const DEFAULT_DEEZER_URL: &str = "https://api.deezer.com";
pub const DEFAULT_SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub user_agent: String,
    /// SQLite cache file. The cache lives in memory when unset.
    pub cache_path: Option<String>,
    pub musicbrainz: MusicBrainzConfig,
    pub images: ImageSourceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicBrainzConfig {
    pub url: String,
    pub rate_limit: u32,
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MUSICBRAINZ_URL.to_string(),
            rate_limit: DEFAULT_MUSICBRAINZ_RATE_LIMIT,
        }
    }
}

/// Enabled image providers. `None` means the provider is off.
#[derive(Debug, Clone, Default)]
pub struct ImageSourceConfig {
    pub spotify: Option<SpotifyConfig>,
    pub subsonic: Option<SubsonicConfig>,
    pub cover_art_archive: Option<CoverArtArchiveConfig>,
    pub deezer: Option<DeezerConfig>,
}

impl ImageSourceConfig {
    pub fn is_empty(&self) -> bool {
        self.spotify.is_none()
            && self.subsonic.is_none()
            && self.cover_art_archive.is_none()
            && self.deezer.is_none()
    }
}

#[derive(Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub api_url: String,
    /// Optional `market` search parameter, e.g. "KR".
    pub market: Option<String>,
}

impl SpotifyConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: DEFAULT_SPOTIFY_TOKEN_URL.to_string(),
            api_url: DEFAULT_SPOTIFY_API_URL.to_string(),
            market: None,
        }
    }
}

impl fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .field("market", &self.market)
            .finish()
    }
}

#[derive(Clone)]
pub struct SubsonicConfig {
    pub url: String,
    /// Pre-encoded auth query string, e.g. `u=alice&t=<token>&s=<salt>`.
    pub auth_params: String,
}

impl fmt::Debug for SubsonicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubsonicConfig")
            .field("url", &self.url)
            .field("auth_params", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArtArchiveConfig {
    pub url: String,
}

impl Default for CoverArtArchiveConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_COVER_ART_ARCHIVE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeezerConfig {
    pub url: String,
}

impl Default for DeezerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DEEZER_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load environment variables if .env exists
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let user_agent = get("LINERNOTES_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let rate_limit = match get("MUSICBRAINZ_RATE_LIMIT") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("MUSICBRAINZ_RATE_LIMIT must be a whole number, got {:?}", raw))?,
            None => DEFAULT_MUSICBRAINZ_RATE_LIMIT,
        };
        if rate_limit == 0 {
            bail!("MUSICBRAINZ_RATE_LIMIT must be at least 1");
        }

        let musicbrainz = MusicBrainzConfig {
            url: get("MUSICBRAINZ_URL").unwrap_or_else(|| DEFAULT_MUSICBRAINZ_URL.to_string()),
            rate_limit,
        };

        let spotify = if flag(&get, "ENABLE_SPOTIFY", false)? {
            let client_id = get("SPOTIFY_CLIENT_ID")
                .context("ENABLE_SPOTIFY is set but SPOTIFY_CLIENT_ID is missing")?;
            let client_secret = get("SPOTIFY_CLIENT_SECRET")
                .context("ENABLE_SPOTIFY is set but SPOTIFY_CLIENT_SECRET is missing")?;
            Some(SpotifyConfig {
                client_id,
                client_secret,
                token_url: get("SPOTIFY_TOKEN_URL")
                    .unwrap_or_else(|| DEFAULT_SPOTIFY_TOKEN_URL.to_string()),
                api_url: get("SPOTIFY_API_URL")
                    .unwrap_or_else(|| DEFAULT_SPOTIFY_API_URL.to_string()),
                market: get("SPOTIFY_MARKET"),
            })
        } else {
            None
        };

        let subsonic = if flag(&get, "ENABLE_SUBSONIC", false)? {
            let url = get("SUBSONIC_URL")
                .context("ENABLE_SUBSONIC is set but SUBSONIC_URL is missing")?;
            let auth_params = get("SUBSONIC_PARAMS")
                .context("ENABLE_SUBSONIC is set but SUBSONIC_PARAMS is missing")?;
            Some(SubsonicConfig {
                url,
                auth_params: auth_params.trim_start_matches(&['?', '&'][..]).to_string(),
            })
        } else {
            None
        };

        let cover_art_archive = if flag(&get, "ENABLE_COVER_ART_ARCHIVE", true)? {
            Some(CoverArtArchiveConfig {
                url: get("COVER_ART_ARCHIVE_URL")
                    .unwrap_or_else(|| DEFAULT_COVER_ART_ARCHIVE_URL.to_string()),
            })
        } else {
            None
        };

        let deezer = if flag(&get, "ENABLE_DEEZER", true)? {
            Some(DeezerConfig {
                url: get("DEEZER_URL").unwrap_or_else(|| DEFAULT_DEEZER_URL.to_string()),
            })
        } else {
            None
        };

        Ok(Self {
            user_agent,
            cache_path: get("CACHE_PATH"),
            musicbrainz,
            images: ImageSourceConfig {
                spotify,
                subsonic,
                cover_art_archive,
                deezer,
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_path: None,
            musicbrainz: MusicBrainzConfig::default(),
            images: ImageSourceConfig {
                cover_art_archive: Some(CoverArtArchiveConfig::default()),
                deezer: Some(DeezerConfig::default()),
                ..ImageSourceConfig::default()
            },
        }
    }
}

fn flag<F>(get: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{} must be true or false, got {:?}", key, raw),
    }
}
