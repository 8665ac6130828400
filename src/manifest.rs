//! MPEG-DASH manifest model and retrieval.
//!
//! The document is deserialized with `quick-xml` into a tree of plain structs.
//! Only the parts the downloader needs are modelled; everything else in the
//! document is ignored. Navigation goes through the accessors below, which
//! turn a missing node into [`Error::ManifestParse`] instead of panicking.
use std::collections::HashSet;

use quick_xml::de::from_str;
use serde::Deserialize;

use crate::config::Platform;
use crate::error::{Error, Result};
use crate::http::Transport;
use crate::resolution::Resolution;
use crate::video::VideoIdentity;

/// Media type of an adaptation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Video,
}

impl MediaType {
    /// MIME type used by the platform for this media type.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaType::Audio => "audio/mp4",
            MediaType::Video => "video/mp4",
        }
    }

    /// Name used in temporary file names and progress labels.
    pub fn label(self) -> &'static str {
        match self {
            MediaType::Audio => "Audio",
            MediaType::Video => "Video",
        }
    }

    /// Container suffix of the downloaded track.
    pub fn suffix(self) -> &'static str {
        match self {
            MediaType::Audio => ".aac",
            MediaType::Video => ".mp4",
        }
    }
}

/// Parsed MPD document.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(rename = "Period", default)]
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Period {
    #[serde(rename = "AdaptationSet", default)]
    pub adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdaptationSet {
    #[serde(rename = "@mimeType")]
    pub mime_type: Option<String>,
    #[serde(rename = "@contentType")]
    pub content_type: Option<String>,

    #[serde(rename = "ContentProtection", default)]
    pub content_protections: Vec<ContentProtection>,
    #[serde(rename = "Representation", default)]
    pub representations: Vec<Representation>,
}

/// A `<ContentProtection>` descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentProtection {
    #[serde(rename = "@schemeIdUri")]
    pub scheme_id_uri: Option<String>,
    #[serde(rename = "@default_KID", alias = "@cenc:default_KID")]
    pub default_kid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Representation {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(rename = "@mimeType")]
    pub mime_type: Option<String>,
    #[serde(rename = "@bandwidth")]
    pub bandwidth: Option<u64>,
    #[serde(rename = "@width")]
    pub width: Option<u32>,
    #[serde(rename = "@height")]
    pub height: Option<u32>,

    #[serde(rename = "BaseURL", default)]
    pub base_urls: Vec<String>,
    #[serde(rename = "SegmentList", default)]
    pub segment_lists: Vec<SegmentList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentList {
    #[serde(rename = "SegmentURL", default)]
    pub segment_urls: Vec<SegmentUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentUrl {
    #[serde(rename = "@media")]
    pub media: Option<String>,
}

impl Manifest {
    /// Parse an MPD document.
    ///
    /// Besides XML well-formedness this checks that there is at least one
    /// period and that video resolutions are unique within each adaptation set.
    pub fn parse(content: &str) -> Result<Self> {
        let manifest = from_str::<Manifest>(content)
            .map_err(|e| Error::ManifestParse(format!("Failed to parse MPD: {}", e)))?;

        if manifest.periods.is_empty() {
            return Err(Error::ManifestParse("MPD has no Period".to_string()));
        }

        for period in &manifest.periods {
            for set in &period.adaptation_sets {
                let mut seen = HashSet::new();
                for resolution in set.representations.iter().filter_map(Representation::resolution) {
                    if !seen.insert(resolution) {
                        return Err(Error::ManifestParse(format!(
                            "Duplicate resolution {} in adaptation set",
                            resolution
                        )));
                    }
                }
            }
        }

        Ok(manifest)
    }

    /// First period of the presentation.
    pub fn first_period(&self) -> Result<&Period> {
        self.periods
            .first()
            .ok_or_else(|| Error::ManifestParse("MPD has no Period".to_string()))
    }
}

impl Period {
    /// Adaptation set at `index`.
    pub fn adaptation_set(&self, index: usize) -> Result<&AdaptationSet> {
        self.adaptation_sets.get(index).ok_or_else(|| {
            Error::ManifestParse(format!("Period has no AdaptationSet #{}", index))
        })
    }

    /// First adaptation set whose MIME type matches `media_type`.
    pub fn adaptation_set_for(&self, media_type: MediaType) -> Result<&AdaptationSet> {
        self.adaptation_sets
            .iter()
            .find(|set| set.mime_type() == Some(media_type.mime_type()))
            .ok_or_else(|| {
                Error::ManifestParse(format!(
                    "No {} AdaptationSet in MPD",
                    media_type.mime_type()
                ))
            })
    }
}

impl AdaptationSet {
    /// MIME type of the set, falling back to its first representation.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type
            .as_deref()
            .or_else(|| self.representations.first()?.mime_type.as_deref())
    }

    pub fn first_representation(&self) -> Result<&Representation> {
        self.representations
            .first()
            .ok_or_else(|| Error::ManifestParse("AdaptationSet has no Representation".to_string()))
    }

    /// Whether the representations of this set carry a non-zero height.
    pub fn has_video(&self) -> bool {
        self.representations
            .first()
            .is_some_and(|r| r.resolution().is_some())
    }

    /// Key id of the first content protection descriptor, if any.
    ///
    /// `Ok(None)` means the set is not protected.
    pub fn default_kid(&self) -> Result<Option<&str>> {
        match self.content_protections.first() {
            None => Ok(None),
            Some(protection) => protection
                .default_kid
                .as_deref()
                .map(Some)
                .ok_or_else(|| {
                    Error::UnsupportedEncryption(
                        "ContentProtection carries no default_KID".to_string(),
                    )
                }),
        }
    }
}

impl Representation {
    /// `(width, height)` when the representation has a non-zero height.
    pub fn resolution(&self) -> Option<Resolution> {
        match self.height {
            Some(height) if height > 0 => Some(Resolution::new(self.width.unwrap_or(0), height)),
            _ => None,
        }
    }

    pub fn base_url(&self) -> Result<&str> {
        self.base_urls
            .first()
            .map(|s| s.trim())
            .ok_or_else(|| Error::ManifestParse("Representation has no BaseURL".to_string()))
    }

    pub fn segment_list(&self) -> Result<&SegmentList> {
        self.segment_lists
            .first()
            .ok_or_else(|| Error::ManifestParse("Representation has no SegmentList".to_string()))
    }
}

/// Download and parse the master manifest of a video.
///
/// The platform only serves manifests to requests that carry its own origin
/// as `Referer`, whatever page the video is embedded in.
pub fn fetch_manifest<T: Transport>(
    transport: &T,
    platform: &Platform,
    video: &VideoIdentity,
) -> Result<Manifest> {
    let url = platform.manifest_url(video.video_id());
    debug!("Fetching manifest {}", url);

    let body = transport
        .get(&url, &[("Referer", platform.origin())])
        .map_err(|e| Error::ManifestFetch(e.to_string()))?;
    let content = String::from_utf8(body)
        .map_err(|e| Error::ManifestParse(format!("MPD is not valid UTF-8: {}", e)))?;

    Manifest::parse(&content)
}
