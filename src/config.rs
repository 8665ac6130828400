//! Download configuration.
//!
//! All structs deserialize with defaults, so a partial YAML/JSON document (or
//! none at all) yields a usable configuration.
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default platform origin.
pub const KINESCOPE_BASE_URL: &str = "https://kinescope.io";

/// Platform endpoints derived from the site origin.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Platform {
    /// Site origin, sent as `Referer` and `Origin`.
    pub base_url: String,
    /// License server origin. Derived from `base_url` when unset.
    pub license_url: Option<String>,
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            base_url: KINESCOPE_BASE_URL.to_string(),
            license_url: None,
        }
    }
}

impl Platform {
    /// Site origin without a trailing slash.
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// `<base>/<id>/master.mpd`
    pub fn manifest_url(&self, video_id: &str) -> String {
        format!("{}/{}/master.mpd", self.origin(), video_id)
    }

    /// `https://license.<host>/v1/vod/<id>/acquire/clearkey?token=`
    pub fn clearkey_license_url(&self, video_id: &str) -> String {
        let license = match &self.license_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let origin = self.origin();
                match origin.split_once("://") {
                    Some((scheme, host)) => format!("{}://license.{}", scheme, host),
                    None => format!("https://license.{}", origin),
                }
            }
        };
        format!("{}/v1/vod/{}/acquire/clearkey?token=", license, video_id)
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connect timeout; `None` keeps the transport default.
    #[serde(with = "opt_secs")]
    pub connect_timeout: Option<Duration>,
    /// Whole-request timeout; `None` keeps the transport default.
    #[serde(with = "opt_secs")]
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            timeout: None,
            user_agent: concat!("kinescope-dl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Settings consumed by [`crate::downloader::Downloader`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory for intermediate files. Removed after every run.
    pub temp_dir: PathBuf,
    /// Path to the `mp4decrypt` executable.
    pub mp4decrypt_path: PathBuf,
    /// Path to the `ffmpeg` executable.
    pub ffmpeg_path: PathBuf,
    /// Fetch the audio track only and skip muxing.
    pub audio_only: bool,
    pub platform: Platform,
    pub http: HttpConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("./temp"),
            mp4decrypt_path: PathBuf::from("./mp4decrypt"),
            ffmpeg_path: PathBuf::from("./ffmpeg"),
            audio_only: false,
            platform: Platform::default(),
            http: HttpConfig::default(),
        }
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.map(Duration::from_secs_f64))
    }
}
