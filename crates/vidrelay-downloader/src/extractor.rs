use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use vidrelay_core::{Payload, ResourceRecord};

use crate::error::ExtractError;

/// `%Y%m%d_%H%M%S`, the timestamp format used in captions and filenames.
pub const DATETIME_FORMAT: &str = "%Y%m%d_%H%M%S";

const DESCRIPTION_MAX_CHARS: usize = 1000;
const CAPTION_TITLE_MAX_CHARS: usize = 100;

/// Rendition requested from the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityProfile {
    /// Up to 720p.
    Standard,
    /// Up to 360p, written under a distinct filename.
    Degraded,
}

impl QualityProfile {
    pub fn max_height(self) -> u32 {
        match self {
            QualityProfile::Standard => 720,
            QualityProfile::Degraded => 360,
        }
    }

    /// Appended to the title part of the output filename.
    pub fn title_suffix(self) -> &'static str {
        match self {
            QualityProfile::Standard => "",
            QualityProfile::Degraded => ".scaled",
        }
    }
}

/// One entry of `requested_downloads` in the extractor output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestedDownload {
    pub filepath: Option<PathBuf>,
    pub filename: Option<String>,
}

/// Metadata reported by the extractor (the subset the engine uses).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub webpage_url: Option<String>,
    pub url: Option<String>,
    pub upload_date: Option<String>,
    /// Unix seconds.
    pub timestamp: Option<f64>,
    pub thumbnail: Option<String>,
    /// Seconds; fractional for some sites.
    pub duration: Option<f64>,
    pub uploader_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    /// Present when the reference is a playlist or channel.
    pub entries: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub requested_downloads: Vec<RequestedDownload>,
}

impl Metadata {
    /// The URL other keys for the same resource should alias to.
    pub fn canonical_url(&self) -> Option<&str> {
        self.webpage_url.as_deref().or(self.url.as_deref())
    }

    pub fn is_playlist(&self) -> bool {
        self.entries.is_some()
    }

    /// Build a cache record from this metadata.
    pub fn into_record(self, payload: Payload) -> ResourceRecord {
        let url = self.canonical_url().unwrap_or_default().to_string();
        let thumbnail = match &self.id {
            Some(id) => Some(format!("https://i.ytimg.com/vi/{id}/default.jpg")),
            None => self.thumbnail.clone(),
        };
        let timestamp = self
            .timestamp
            .and_then(|ts| chrono::DateTime::from_timestamp(ts as i64, 0))
            .map(|dt| dt.format(DATETIME_FORMAT).to_string());
        let caption_title: String = self
            .title
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(CAPTION_TITLE_MAX_CHARS)
            .collect();
        let caption = format!(
            "[{}] {}\n{}",
            self.upload_date.as_deref().unwrap_or_default(),
            caption_title,
            url
        );
        let description = self
            .description
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(DESCRIPTION_MAX_CHARS)
            .collect();

        ResourceRecord {
            title: self.title.clone().unwrap_or_else(|| url.clone()),
            description,
            caption,
            duration: self.duration.unwrap_or(0.0) as u32,
            width: self.width,
            height: self.height,
            webpage_url: self.webpage_url,
            upload_date: self.upload_date,
            timestamp,
            thumbnail,
            uploader_url: self.uploader_url,
            format: self.format,
            payload,
            origin: None,
            source: None,
            processed_at: None,
        }
    }
}

/// A completed download.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub metadata: Metadata,
    pub path: PathBuf,
    pub filename: Option<String>,
}

impl Fetched {
    pub fn into_record(self) -> ResourceRecord {
        self.metadata.into_record(Payload::Local {
            path: self.path,
            filename: self.filename,
        })
    }
}

/// The media extraction capability.
///
/// Implementations are free to be slow and resource hungry; the executor
/// serialises [`fetch`](Self::fetch) calls and bounds them with a timeout.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Metadata only, no download.
    async fn probe(&self, reference: &str) -> Result<Metadata, ExtractError>;

    /// Download `reference` at `profile` into local storage.
    async fn fetch(&self, reference: &str, profile: QualityProfile)
        -> Result<Fetched, ExtractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        serde_json::from_value(serde_json::json!({
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "description": "x".repeat(1500),
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "upload_date": "20091025",
            "timestamp": 1256453280,
            "duration": 212.0,
            "width": 1280,
            "height": 720,
            "format": "22 - 1280x720",
            "requested_downloads": [
                {"filepath": "/media/clip.mp4", "filename": "clip.mp4"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn record_carries_caption_and_truncated_description() {
        let rec = sample().into_record(Payload::Metadata);
        assert_eq!(
            rec.caption,
            "[20091025] Never Gonna Give You Up\nhttps://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(rec.description.chars().count(), 1000);
        assert_eq!(rec.duration, 212);
        assert_eq!(rec.timestamp.as_deref(), Some("20091025_064800"));
        assert_eq!(
            rec.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg")
        );
    }

    #[test]
    fn untitled_record_uses_url_as_title() {
        let meta = Metadata {
            url: Some("https://cdn.example/v.mp4".to_string()),
            ..Metadata::default()
        };
        assert_eq!(meta.canonical_url(), Some("https://cdn.example/v.mp4"));
        let rec = meta.into_record(Payload::Metadata);
        assert_eq!(rec.title, "https://cdn.example/v.mp4");
        assert_eq!(rec.caption, "[] \nhttps://cdn.example/v.mp4");
    }

    #[test]
    fn degraded_profile_lowers_height_and_tags_filename() {
        assert_eq!(QualityProfile::Standard.max_height(), 720);
        assert_eq!(QualityProfile::Degraded.max_height(), 360);
        assert_eq!(QualityProfile::Degraded.title_suffix(), ".scaled");
    }

    #[test]
    fn requested_downloads_are_parsed() {
        let meta = sample();
        assert_eq!(
            meta.requested_downloads[0].filepath.as_deref(),
            Some(std::path::Path::new("/media/clip.mp4"))
        );
        assert!(!meta.is_playlist());
    }
}
