//! Download orchestration.
//!
//! A [`Downloader`] owns the HTTP transport, the process runner and the
//! temporary workspace of one download. It fetches the manifest on
//! construction, then [`Downloader::download`] resolves the key, fetches each
//! track, decrypts and merges them. The workspace is deleted when the
//! downloader is dropped, which `download` guarantees by consuming it.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::http::Transport;
use crate::license::{LicenseClient, LicenseKey};
use crate::manifest::{fetch_manifest, Manifest, MediaType};
use crate::resolution::{list_resolutions, Resolution};
use crate::segment::{resolve_segment_urls, Progress, SegmentFetcher};
use crate::tools::{CommandRunner, Decryptor, Muxer};
use crate::utils::{ensure_parent_dir, move_file};
use crate::video::VideoIdentity;
use crate::workspace::Workspace;

const ENCRYPTED_SUFFIX: &str = ".enc";

/// Files and segments of one track within a download.
#[derive(Debug, Clone)]
pub struct TrackPlan {
    pub media_type: MediaType,
    pub segment_urls: Vec<String>,
    /// Final (decrypted or plain) track file.
    pub tmp_path: PathBuf,
    /// Encrypted download target; present iff a key exists.
    pub enc_path: Option<PathBuf>,
}

impl TrackPlan {
    /// File the segments are written to.
    pub fn fetch_path(&self) -> &Path {
        self.enc_path.as_deref().unwrap_or(&self.tmp_path)
    }
}

/// Single-use downloader for one video.
pub struct Downloader<T, R> {
    video: VideoIdentity,
    config: DownloadConfig,
    transport: T,
    runner: R,
    manifest: Manifest,
    cancelled: Arc<AtomicBool>,
    workspace: Workspace,
}

impl<T: Transport, R: CommandRunner> Downloader<T, R> {
    /// Create the workspace and load the manifest.
    ///
    /// If the manifest cannot be loaded the workspace is removed again before
    /// the error is returned.
    pub fn new(video: VideoIdentity, config: DownloadConfig, transport: T, runner: R) -> Result<Self> {
        Self::with_cancel(video, config, transport, runner, Arc::new(AtomicBool::new(false)))
    }

    /// Like [`Downloader::new`], observing an existing cancel flag.
    ///
    /// A flag set while the manifest is loading fails construction with
    /// [`Error::Interrupted`] once the request returns; the workspace is
    /// removed.
    pub fn with_cancel(
        video: VideoIdentity,
        config: DownloadConfig,
        transport: T,
        runner: R,
        cancelled: Arc<AtomicBool>,
    ) -> Result<Self> {
        let workspace = Workspace::create(&config.temp_dir)?;
        let manifest = fetch_manifest(&transport, &config.platform, &video)?;
        if cancelled.load(Ordering::SeqCst) {
            return Err(Error::Interrupted);
        }
        info!("Loaded manifest for video {}", video.video_id());

        Ok(Self {
            video,
            config,
            transport,
            runner,
            manifest,
            cancelled,
            workspace,
        })
    }

    pub fn video(&self) -> &VideoIdentity {
        &self.video
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Directory holding the intermediate files of this download.
    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    /// Available video tiers, ascending by height.
    pub fn resolutions(&self) -> Vec<Resolution> {
        list_resolutions(&self.manifest)
    }

    /// Highest available tier.
    pub fn best_resolution(&self) -> Option<Resolution> {
        self.resolutions().last().copied()
    }

    /// Flag that aborts the download before the next segment or stage.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Tracks fetched by this download, in merge order.
    pub fn track_types(&self) -> Vec<MediaType> {
        if self.config.audio_only {
            vec![MediaType::Audio]
        } else {
            vec![MediaType::Audio, MediaType::Video]
        }
    }

    /// Run the download and write the result next to `output`.
    ///
    /// `resolution` defaults to the best tier. The suffix of `output` is
    /// replaced by the container suffix (`.mp4`, or `.aac` for audio-only).
    /// Returns the path actually written. The workspace is removed on every
    /// exit path.
    pub fn download(
        self,
        output: impl AsRef<Path>,
        resolution: Option<Resolution>,
        progress: &dyn Progress,
    ) -> Result<PathBuf> {
        let resolution = resolution.or_else(|| self.best_resolution());
        let result = self.run(output.as_ref(), resolution, progress);
        if let Err(e) = &result {
            error!("Download of {} failed: {}", self.video.video_id(), e);
        }
        result
    }

    fn run(
        &self,
        output: &Path,
        resolution: Option<Resolution>,
        progress: &dyn Progress,
    ) -> Result<PathBuf> {
        let key = LicenseClient::new(&self.transport, &self.config.platform)
            .fetch_key(&self.video, &self.manifest)?;

        let tracks = self.plan_tracks(resolution, key.is_some())?;

        let fetcher = SegmentFetcher::new(&self.transport, &self.cancelled);
        for track in &tracks {
            fetcher.fetch_to_file(
                &track.segment_urls,
                track.fetch_path(),
                track.media_type.label(),
                progress,
            )?;
        }

        if let Some(key) = &key {
            self.decrypt_tracks(&tracks, key)?;
        }

        self.check_cancelled()?;
        let last = tracks
            .last()
            .ok_or_else(|| Error::Other("No tracks to download".to_string()))?;
        let target = output.with_extension(last.media_type.suffix().trim_start_matches('.'));
        ensure_parent_dir(&target)?;

        if tracks.len() > 1 {
            info!("Merging tracks...");
            let inputs: Vec<PathBuf> = tracks.iter().map(|t| t.tmp_path.clone()).collect();
            if let Err(e) = Muxer::new(&self.runner, &self.config.ffmpeg_path).mux(&inputs, &target) {
                let _ = std::fs::remove_file(&target);
                return Err(e);
            }
        } else {
            move_file(&last.tmp_path, &target)?;
        }

        info!("Saved {}", target.display());
        Ok(target)
    }

    /// Compute segment lists and file paths for every requested track.
    pub fn plan_tracks(&self, resolution: Option<Resolution>, encrypted: bool) -> Result<Vec<TrackPlan>> {
        self.track_types()
            .into_iter()
            .map(|media_type| {
                let segment_urls = resolve_segment_urls(&self.manifest, media_type, resolution)?;
                let tmp_path = self.workspace.file(&format!(
                    "{}_{}{}",
                    self.video.video_id(),
                    media_type.label(),
                    media_type.suffix()
                ));
                let enc_path = encrypted.then(|| {
                    let mut name = tmp_path.clone().into_os_string();
                    name.push(ENCRYPTED_SUFFIX);
                    PathBuf::from(name)
                });
                Ok(TrackPlan {
                    media_type,
                    segment_urls,
                    tmp_path,
                    enc_path,
                })
            })
            .collect()
    }

    fn decrypt_tracks(&self, tracks: &[TrackPlan], key: &LicenseKey) -> Result<()> {
        info!("Decrypting...");
        let decryptor = Decryptor::new(&self.runner, &self.config.mp4decrypt_path);
        for track in tracks {
            self.check_cancelled()?;
            decryptor.decrypt(track.fetch_path(), &track.tmp_path, key)?;
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}
