use uuid::Uuid;

/// Names to look an artist image up by, usually the canonical name followed
/// by its aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistImageQuery {
    pub names: Vec<String>,
}

impl ArtistImageQuery {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumImageQuery {
    pub artists: Vec<String>,
    pub album: String,
    pub release_id: Option<Uuid>,
    pub release_group_id: Option<Uuid>,
}

impl AlbumImageQuery {
    pub fn new(artists: Vec<String>, album: String) -> Self {
        Self {
            artists,
            album,
            release_id: None,
            release_group_id: None,
        }
    }

    pub fn with_release_id(mut self, id: Uuid) -> Self {
        self.release_id = Some(id);
        self
    }

    pub fn with_release_group_id(mut self, id: Uuid) -> Self {
        self.release_group_id = Some(id);
        self
    }
}

/// Non-blank names, first spelling kept, case-insensitive duplicates dropped.
pub(crate) fn distinct_names(names: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut distinct = Vec::new();

    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        let folded = trimmed.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        distinct.push(trimmed.to_string());
    }

    distinct
}

/// First non-blank name, for providers that only search by one.
pub(crate) fn first_name(names: &[String]) -> Option<&str> {
    names.iter().map(|name| name.trim()).find(|name| !name.is_empty())
}

pub(crate) fn matches_any(name: &str, candidates: &[String]) -> bool {
    let name = name.trim().to_lowercase();
    candidates
        .iter()
        .any(|candidate| candidate.trim().to_lowercase() == name)
}
