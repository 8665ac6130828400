//! Video quality tiers.
use std::fmt;

use crate::manifest::Manifest;

/// A `(width, height)` pair. Tiers are ordered by height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Short label such as `720p`.
    pub fn label(&self) -> String {
        format!("{}p", self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Video tiers of the manifest, ascending by height.
///
/// Looks at the first adaptation set of the first period whose
/// representations carry a height. An audio-only manifest yields an empty
/// list, which callers treat as "nothing to choose".
pub fn list_resolutions(manifest: &Manifest) -> Vec<Resolution> {
    let Some(period) = manifest.periods.first() else {
        return Vec::new();
    };

    let mut resolutions: Vec<Resolution> = period
        .adaptation_sets
        .iter()
        .find(|set| set.has_video())
        .map(|set| {
            set.representations
                .iter()
                .filter_map(|r| r.resolution())
                .collect()
        })
        .unwrap_or_default();

    resolutions.sort_by_key(|r| r.height);
    resolutions
}
