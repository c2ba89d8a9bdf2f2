//! Metadata and artwork enrichment for music catalogs.
//!
//! MusicBrainz lookups are rate limited, cached and typed; artwork comes from
//! an ordered chain of image providers. [`Enrichment`] wires both up from a
//! [`Config`].

pub mod cache;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod images;
pub mod logging;
pub mod musicbrainz;
pub mod queue;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use enrichment::Enrichment;
pub use error::{Error, Result};
