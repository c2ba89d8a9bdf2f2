use std::collections::HashMap;

/// One image from an artwork listing, e.g. a Cover Art Archive entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverImage {
    pub url: String,
    pub front: bool,
    pub back: bool,
    /// 0 when unknown.
    pub width: u32,
    pub height: u32,
    /// Size label ("small", "large", "250", "1200", ...) to URL.
    pub thumbnails: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    Back,
    Unspecified,
    Front,
}

#[derive(Debug)]
struct Candidate<'a> {
    url: &'a str,
    width: u64,
    height: u64,
    side: Side,
}

impl Candidate<'_> {
    fn area(&self) -> u64 {
        self.width.saturating_mul(self.height)
    }

    fn beats(&self, current: &Candidate<'_>) -> bool {
        (self.side, self.area(), self.width, self.height)
            > (current.side, current.area(), current.width, current.height)
    }
}

/// Pick the best cover: front over unlabelled over back, then the largest
/// image, then the widest, then the tallest. Earlier images win exact ties.
pub fn select_cover(images: &[CoverImage]) -> Option<String> {
    let mut best: Option<Candidate<'_>> = None;

    for image in images {
        let Some(candidate) = candidate(image) else {
            continue;
        };
        if best.as_ref().map_or(true, |current| candidate.beats(current)) {
            best = Some(candidate);
        }
    }

    best.map(|candidate| candidate.url.to_string())
}

fn candidate(image: &CoverImage) -> Option<Candidate<'_>> {
    let mut url = image.url.trim();
    let mut width = u64::from(image.width);
    let mut height = u64::from(image.height);

    // Listings often omit original dimensions; a big thumbnail tells us more.
    if let Some((thumb_url, size)) = largest_thumbnail(&image.thumbnails) {
        if size.saturating_mul(size) > width.saturating_mul(height) {
            url = thumb_url;
            width = size;
            height = size;
        }
    }

    if url.is_empty() {
        return None;
    }

    let side = if image.front {
        Side::Front
    } else if image.back {
        Side::Back
    } else {
        Side::Unspecified
    };

    Some(Candidate {
        url,
        width,
        height,
        side,
    })
}

fn largest_thumbnail(thumbnails: &HashMap<String, String>) -> Option<(&str, u64)> {
    let mut best: Option<(&str, u64)> = None;

    for (label, url) in thumbnails {
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        let Some(size) = thumbnail_size(label) else {
            continue;
        };
        // Ties go to the lexicographically smaller URL so map order never matters.
        let better = match best {
            None => true,
            Some((best_url, best_size)) => size > best_size || (size == best_size && url < best_url),
        };
        if better {
            best = Some((url, size));
        }
    }

    best
}

fn thumbnail_size(label: &str) -> Option<u64> {
    match label.trim().to_lowercase().as_str() {
        "small" => Some(250),
        "large" => Some(500),
        other => other.parse::<u64>().ok().filter(|size| *size > 0),
    }
}
