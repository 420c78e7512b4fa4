use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use vidrelay_core::config::DownloaderConfig;

use crate::{
    error::ExtractError,
    extractor::{Extractor, Fetched, Metadata, QualityProfile},
};

const STDERR_SNIPPET_CHARS: usize = 500;

/// [`Extractor`] backed by the `yt-dlp` command-line tool.
///
/// Each call spawns one process and reads its `-J` JSON from stdout. The
/// process is not killed if the caller stops waiting for it.
pub struct YtDlpExtractor {
    binary: String,
    media_dir: PathBuf,
    cookies_file: Option<PathBuf>,
    max_duration_secs: u64,
}

impl YtDlpExtractor {
    pub fn new(config: &DownloaderConfig, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: config.binary.clone(),
            media_dir: media_dir.into(),
            cookies_file: config.cookies_file.clone().filter(|p| !p.as_os_str().is_empty()),
            max_duration_secs: config.max_duration_secs,
        }
    }

    /// Flags shared by probe and fetch.
    fn base_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--no-warnings",
            "--no-playlist",
            "--flat-playlist",
            "--playlist-items",
            "1-20",
            "--retries",
            "5",
            "--fragment-retries",
            "5",
            "--extractor-retries",
            "5",
            "--match-filter",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("!is_live & duration <=? {}", self.max_duration_secs));

        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        args
    }

    fn probe_args(&self, reference: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.push("-J".to_string());
        args.push("--".to_string());
        args.push(reference.to_string());
        args
    }

    fn fetch_args(&self, reference: &str, profile: QualityProfile) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "-J".to_string(),
            "--no-simulate".to_string(),
            "--embed-metadata".to_string(),
            "-f".to_string(),
            format_selector(profile),
            "-o".to_string(),
            output_template(&self.media_dir, profile),
            "--".to_string(),
            reference.to_string(),
        ]);
        args
    }

    async fn run(&self, args: &[String]) -> Result<Metadata, ExtractError> {
        debug!(binary = %self.binary, ?args, "spawning yt-dlp");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let snippet: String = stderr.trim().chars().take(STDERR_SNIPPET_CHARS).collect();
            return Err(ExtractError::Failed(snippet));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        // yt-dlp exits 0 and prints nothing when the match filter drops the item.
        if stdout.is_empty() || stdout == "null" {
            return Err(ExtractError::Rejected("filtered out by match filter".to_string()));
        }
        Ok(serde_json::from_str(stdout)?)
    }
}

/// `-f` selector capped at the profile's height.
pub fn format_selector(profile: QualityProfile) -> String {
    let h = profile.max_height();
    let video = format!("bv*[ext=mp4][height<=?{h}][filesize_approx<=?2G]");
    format!("{video}+ba[ext=m4a] / {video}+ba[ext=mp4] / b[ext=mp4][height<=?{h}]")
}

/// `-o` template: date prefix, truncated title, id.
pub fn output_template(media_dir: &Path, profile: QualityProfile) -> String {
    format!(
        "{}/%(timestamp>%Y%m%d_%H%M%S,upload_date>%Y%m%d_u,epoch>%Y%m%d_e)s - %(title).80s{} [%(id).20s].%(ext)s",
        media_dir.display(),
        profile.title_suffix()
    )
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    #[instrument(skip(self))]
    async fn probe(&self, reference: &str) -> Result<Metadata, ExtractError> {
        self.run(&self.probe_args(reference)).await
    }

    #[instrument(skip(self))]
    async fn fetch(
        &self,
        reference: &str,
        profile: QualityProfile,
    ) -> Result<Fetched, ExtractError> {
        let mut metadata = self.run(&self.fetch_args(reference, profile)).await?;
        if metadata.is_playlist() {
            return Err(ExtractError::Rejected(format!("{reference} is a playlist")));
        }
        let download = metadata
            .requested_downloads
            .first()
            .cloned()
            .unwrap_or_default();
        let path = download
            .filepath
            .ok_or_else(|| ExtractError::NoOutput(reference.to_string()))?;
        let filename = download.filename.or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        });
        metadata.requested_downloads.clear();
        Ok(Fetched {
            metadata,
            path,
            filename,
        })
    }
}
