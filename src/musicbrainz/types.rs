use serde::{Deserialize, Serialize};

/// Status MusicBrainz gives to transliterated/translated tracklists.
pub const PSEUDO_RELEASE_STATUS: &str = "Pseudo-Release";
/// ISO 15924 code for Latin script.
pub const LATIN_SCRIPT: &str = "Latn";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArtistCredit {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: ArtistRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct TextRepresentation {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReleaseGroup {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(rename = "primary-type", alias = "primary_type", default)]
    pub primary_type: Option<String>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub releases: Vec<Release>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

impl ReleaseGroup {
    /// Distinct release titles, in the order MusicBrainz lists the releases.
    pub fn release_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = Vec::new();
        for release in &self.releases {
            if !titles.contains(&release.title) {
                titles.push(release.title.clone());
            }
        }
        titles
    }

    pub fn genre_names(&self) -> Vec<String> {
        genre_names(&self.genres)
    }

    /// Titles of Latin-script pseudo-releases, e.g. romanized editions of
    /// Japanese or Korean albums.
    pub fn latin_titles(&self) -> Vec<String> {
        self.releases
            .iter()
            .filter(|release| release.is_latin_pseudo_release())
            .map(|release| release.title.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Release {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "text-representation", default)]
    pub text_representation: Option<TextRepresentation>,
    #[serde(rename = "release-group", default)]
    pub release_group: Option<Box<ReleaseGroup>>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

impl Release {
    pub fn is_latin_pseudo_release(&self) -> bool {
        self.status.as_deref() == Some(PSEUDO_RELEASE_STATUS)
            && self
                .text_representation
                .as_ref()
                .and_then(|text| text.script.as_deref())
                == Some(LATIN_SCRIPT)
    }

    /// Genres of the enclosing release group, when it was included.
    pub fn release_group_genres(&self) -> Vec<String> {
        self.release_group
            .as_ref()
            .map(|group| group.genre_names())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Alias {
    pub name: String,
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(rename = "type", default)]
    pub alias_type: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Artist {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "sort-name", default)]
    pub sort_name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

impl Artist {
    /// The canonical name followed by every alias flagged primary.
    pub fn primary_aliases(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        for alias in &self.aliases {
            if alias.primary == Some(true) && !names.contains(&alias.name) {
                names.push(alias.name.clone());
            }
        }
        names
    }

    pub fn genre_names(&self) -> Vec<String> {
        genre_names(&self.genres)
    }
}

/// A MusicBrainz recording.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Track {
    #[serde(default)]
    pub id: String,
    pub title: String,
    /// Length in milliseconds, `null` upstream when unknown.
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCredit>,
}

impl Track {
    pub fn length_ms(&self) -> u64 {
        self.length.unwrap_or(0)
    }
}

fn genre_names(genres: &[Genre]) -> Vec<String> {
    genres.iter().map(|genre| genre.name.clone()).collect()
}
