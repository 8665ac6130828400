//! Segment URL resolution and sequential segment download.
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::http::Transport;
use crate::manifest::{Manifest, MediaType};
use crate::resolution::Resolution;

/// Attempts per segment before the download is abandoned.
pub const MAX_ATTEMPTS: u32 = 5;

/// Observer for per-track download progress.
pub trait Progress {
    /// A track with `total` segment entries is about to be fetched.
    fn start(&self, _label: &str, _total: usize) {}
    /// One segment entry was processed (downloaded or skipped as duplicate).
    fn advance(&self) {}
    fn finish(&self) {}
}

/// [`Progress`] that reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Ordered segment URLs of one track.
///
/// Video sets are matched against `resolution` exactly; audio sets have no
/// resolution and always use their first representation. Entries without a
/// media fragment are skipped.
pub fn resolve_segment_urls(
    manifest: &Manifest,
    media_type: MediaType,
    resolution: Option<Resolution>,
) -> Result<Vec<String>> {
    let set = manifest.first_period()?.adaptation_set_for(media_type)?;

    let representation = if set.has_video() {
        let wanted = resolution.ok_or(Error::InvalidResolution {
            width: 0,
            height: 0,
        })?;
        set.representations
            .iter()
            .find(|r| r.resolution() == Some(wanted))
            .ok_or(Error::InvalidResolution {
                width: wanted.width,
                height: wanted.height,
            })?
    } else {
        set.first_representation()?
    };

    let base_url = representation.base_url()?;
    Ok(representation
        .segment_list()?
        .segment_urls
        .iter()
        .filter_map(|s| s.media.as_deref())
        .filter(|media| !media.is_empty())
        .map(|media| format!("{}{}", base_url, media))
        .collect())
}

/// Downloads segment lists into single files.
pub struct SegmentFetcher<'a, T> {
    transport: &'a T,
    cancelled: &'a AtomicBool,
}

impl<'a, T: Transport> SegmentFetcher<'a, T> {
    pub fn new(transport: &'a T, cancelled: &'a AtomicBool) -> Self {
        Self {
            transport,
            cancelled,
        }
    }

    /// Append every distinct segment of `urls` to `destination`, in order.
    ///
    /// A URL seen earlier in the list is not requested again and contributes
    /// nothing to the file. Any error leaves a partial file behind; the caller
    /// owns its cleanup.
    pub fn fetch_to_file(
        &self,
        urls: &[String],
        destination: &Path,
        label: &str,
        progress: &dyn Progress,
    ) -> Result<()> {
        let mut file = BufWriter::new(File::create(destination)?);
        let mut visited: HashSet<&str> = HashSet::with_capacity(urls.len());

        progress.start(label, urls.len());
        for url in urls {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(Error::Interrupted);
            }
            if !visited.contains(url.as_str()) {
                let data = self.fetch_segment(url)?;
                file.write_all(&data)?;
                visited.insert(url.as_str());
            }
            progress.advance();
        }
        file.flush()?;
        progress.finish();

        debug!(
            "{}: wrote {} segments to {}",
            label,
            visited.len(),
            destination.display()
        );
        Ok(())
    }

    /// Fetch one segment, retrying truncated responses without delay.
    fn fetch_segment(&self, url: &str) -> Result<Vec<u8>> {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.transport.get(url, &[]) {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() => {
                    warn!("Attempt {}/{} for {} failed: {}", attempt, MAX_ATTEMPTS, url, e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::SegmentDownload {
            url: url.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }
}
