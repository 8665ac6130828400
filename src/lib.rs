//! kinescope-dl - downloader for ClearKey-protected DASH videos on Kinescope.
//!
//! This crate provides:
//! - MPEG-DASH manifest retrieval and a typed manifest tree.
//! - Quality tier enumeration.
//! - ClearKey license acquisition.
//! - Sequential segment download with retry and de-duplication.
//! - Decryption (`mp4decrypt`) and muxing (`ffmpeg`) through external tools.
//! - A [`downloader::Downloader`] sequencing all of the above inside a
//!   temporary workspace that is always cleaned up.
//!
//! Feature flags:
//! - `tracing`: emit log events through `tracing` (default).
//! - `cli`: build the `kinescope-dl` binary.

#[macro_use]
mod macros;

/// Download configuration.
pub mod config;
/// Download orchestration.
pub mod downloader;
/// Common error types and Result alias.
pub mod error;
/// Blocking HTTP transport.
pub mod http;
/// ClearKey license acquisition.
pub mod license;
/// MPD model and retrieval.
pub mod manifest;
/// Video quality tiers.
pub mod resolution;
/// Segment resolution and download.
pub mod segment;
/// External decryptor and muxer.
pub mod tools;
/// Shared helper utilities.
pub mod utils;
/// Video identity resolution.
pub mod video;
/// Scoped temporary directory.
pub mod workspace;

pub use config::DownloadConfig;
pub use downloader::Downloader;
pub use error::{Error, Result};
pub use resolution::Resolution;
pub use video::VideoIdentity;
