#![cfg(feature = "cli")]
use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};

use kinescope_dl::config::DownloadConfig;
use kinescope_dl::http::HttpClient;
use kinescope_dl::segment::Progress;
use kinescope_dl::tools::SystemRunner;
use kinescope_dl::utils::locate_tool;
use kinescope_dl::video::validate_url;
use kinescope_dl::{Downloader, Resolution, VideoIdentity};

/// Kinescope-dl: Video downloader for Kinescope
#[derive(Parser)]
#[command(name = "kinescope-dl", version)]
struct Cli {
    /// Url of the Kinescope video
    input_url: String,

    /// Path to the output file (defaults to <video id>.mp4)
    output_file: Option<PathBuf>,

    /// Referer url of the site where the video is embedded
    #[arg(short = 'r', long = "referer")]
    referer: Option<String>,

    /// Automatically select the best possible quality
    #[arg(long = "best-quality", action = ArgAction::SetTrue)]
    best_quality: bool,

    /// Only audio download
    #[arg(long = "audio-only", action = ArgAction::SetTrue)]
    audio_only: bool,

    /// Path to directory for temporary files
    #[arg(long = "temp", default_value = "./temp")]
    temp: PathBuf,

    /// Path to ffmpeg executable
    #[arg(long = "ffmpeg-path", env = "FFMPEG_PATH", default_value = "./ffmpeg")]
    ffmpeg_path: PathBuf,

    /// Path to mp4decrypt executable
    #[arg(long = "mp4decrypt-path", env = "MP4DECRYPT_PATH", default_value = "./mp4decrypt")]
    mp4decrypt_path: PathBuf,

    /// Request timeout in seconds
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    #[arg(short = 'd', long = "debug", action = ArgAction::SetTrue)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    validate_url(&cli.input_url)?;
    if let Some(referer) = cli.referer.as_deref() {
        validate_url(referer)?;
    }

    let mut config = DownloadConfig {
        temp_dir: cli.temp.clone(),
        mp4decrypt_path: locate_tool(&cli.mp4decrypt_path, "mp4decrypt"),
        ffmpeg_path: locate_tool(&cli.ffmpeg_path, "ffmpeg"),
        audio_only: cli.audio_only,
        ..Default::default()
    };
    config.http.timeout = cli.timeout.map(Duration::from_secs);

    let client = HttpClient::new(&config.http)?;
    let video = VideoIdentity::resolve(&client, &cli.input_url, cli.referer.clone())
        .context("Failed to resolve video id")?;

    let interrupt = Arc::new(Interrupt::default());
    install_interrupt_handler(Arc::clone(&interrupt))?;

    let downloader = Downloader::with_cancel(
        video,
        config,
        client,
        SystemRunner,
        Arc::clone(&interrupt.cancelled),
    )
    .context("Failed to load video manifest")?;
    let _ = interrupt.workspace.set(downloader.workspace_path().to_path_buf());

    println!("= OPTIONS ============================");
    let resolutions = downloader.resolutions();
    let resolution = if cli.audio_only || cli.best_quality {
        resolutions.last().copied()
    } else {
        prompt_resolution(&resolutions, &interrupt.cancelled)?
    };
    if let Some(resolution) = resolution {
        println!("[*] {} is selected", resolution.label());
    }
    println!("======================================");

    let output = cli
        .output_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.mp4", downloader.video().video_id())));

    println!("\n= DOWNLOADING =================");
    let progress = BarProgress::default();
    interrupt.downloading.store(true, Ordering::SeqCst);
    let saved = downloader.download(&output, resolution, &progress)?;
    println!("===============================");
    info!("Saved to {}", saved.display());

    Ok(())
}

/// Ask for one of `resolutions` on stdin. `None` when there is nothing to pick.
fn prompt_resolution(
    resolutions: &[Resolution],
    cancelled: &AtomicBool,
) -> anyhow::Result<Option<Resolution>> {
    if resolutions.is_empty() {
        return Ok(None);
    }

    let choices = resolutions
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}) {}", i + 1, r.label()))
        .collect::<Vec<_>>()
        .join("   ");

    let stdin = std::io::stdin();
    loop {
        print!("{}\n> Quality: ", choices);
        std::io::stdout().flush()?;

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line)?;
        if cancelled.load(Ordering::SeqCst) {
            return Err(kinescope_dl::Error::Interrupted.into());
        }
        if read == 0 {
            anyhow::bail!("No quality selected");
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=resolutions.len()).contains(&n) => return Ok(Some(resolutions[n - 1])),
            _ => warn!("Expected a number between 1 and {}", resolutions.len()),
        }
    }
}

/// State shared with the Ctrl+C handler.
#[derive(Default)]
struct Interrupt {
    cancelled: Arc<AtomicBool>,
    /// Set once the downloader exists.
    workspace: OnceLock<PathBuf>,
    downloading: AtomicBool,
}

impl Interrupt {
    fn remove_workspace(&self) {
        if let Some(path) = self.workspace.get() {
            if let Err(e) = std::fs::remove_dir_all(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temporary directory {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// First Ctrl+C cancels the download, which then fails and removes its
/// workspace. While the manifest loads that happens once the request returns.
/// At the quality prompt, or on a second Ctrl+C during the download, the
/// workspace is removed here and the process exits.
fn install_interrupt_handler(interrupt: Arc<Interrupt>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create runtime")?;

    std::thread::spawn(move || {
        runtime.block_on(async {
            while tokio::signal::ctrl_c().await.is_ok() {
                let repeated = interrupt.cancelled.swap(true, Ordering::SeqCst);
                let loading = interrupt.workspace.get().is_none();
                let prompting = !loading && !interrupt.downloading.load(Ordering::SeqCst);
                if prompting || (repeated && !loading) {
                    interrupt.remove_workspace();
                    std::process::exit(130);
                }
                warn!("[*] Interrupted, cleaning up...");
            }
        });
    });
    Ok(())
}

#[derive(Default)]
struct BarProgress {
    bar: RefCell<Option<ProgressBar>>,
}

impl Progress for BarProgress {
    fn start(&self, label: &str, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg}: {percent:>3}%|{bar:10}| [{pos}/{len}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(label.to_string());
        *self.bar.borrow_mut() = Some(bar);
    }

    fn advance(&self) {
        if let Some(bar) = self.bar.borrow().as_ref() {
            bar.inc(1);
        }
    }

    fn finish(&self) {
        if let Some(bar) = self.bar.borrow_mut().take() {
            bar.finish();
        }
    }
}
