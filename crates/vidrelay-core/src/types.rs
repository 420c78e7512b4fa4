use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Priority added by an `Append` that names no explicit targets.
pub const IMPLICIT_TARGET_WEIGHT: u64 = 2;

/// Source tag of intents queued by the `/download` command.
pub const SOURCE_DOWNLOAD: &str = "download";

/// Platform handle for an already-uploaded asset (a Telegram `file_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaHandle(pub String);

impl MediaHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MediaHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One recipient of a fetched asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// Send the asset as a new message to a chat.
    Broadcast { chat_id: String },
    /// Replace the media of an inline-mode placeholder.
    InlinePlaceholder { inline_message_id: String },
    /// Replace the media of a message the bot already sent.
    ChatMessage { chat_id: String, message_id: String },
}

impl Target {
    pub fn broadcast(chat_id: impl Into<String>) -> Self {
        Target::Broadcast {
            chat_id: chat_id.into(),
        }
    }

    pub fn inline(inline_message_id: impl Into<String>) -> Self {
        Target::InlinePlaceholder {
            inline_message_id: inline_message_id.into(),
        }
    }

    pub fn message(chat_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Target::ChatMessage {
            chat_id: chat_id.into(),
            message_id: message_id.into(),
        }
    }

    /// The chat this target lives in, if it has one.
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Target::Broadcast { chat_id } | Target::ChatMessage { chat_id, .. } => Some(chat_id),
            Target::InlinePlaceholder { .. } => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Broadcast { chat_id } => write!(f, "chat:{chat_id}"),
            Target::InlinePlaceholder { inline_message_id } => {
                write!(f, "inline:{inline_message_id}")
            }
            Target::ChatMessage {
                chat_id,
                message_id,
            } => write!(f, "message:{chat_id}/{message_id}"),
        }
    }
}

/// A pending fetch-and-deliver request for one resource key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Deduplicated, in arrival order.
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub priority: u64,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub source: Option<String>,
    /// First-seen order; breaks priority ties.
    #[serde(default)]
    pub seq: u64,
}

impl Intent {
    pub fn new(seq: u64) -> Self {
        Self {
            targets: Vec::new(),
            priority: 0,
            ignored: false,
            source: None,
            seq,
        }
    }

    /// Union `targets` into this intent. Returns how many were new.
    pub fn merge_targets(&mut self, targets: &[Target]) -> usize {
        let mut added = 0;
        for target in targets {
            if !self.targets.contains(target) {
                self.targets.push(target.clone());
                added += 1;
            }
        }
        added
    }

    /// Chats named by broadcast targets.
    pub fn broadcast_chats(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().filter_map(|t| match t {
            Target::Broadcast { chat_id } => Some(chat_id.as_str()),
            _ => None,
        })
    }
}

/// Priority contributed by a single `Append` call.
pub fn priority_increment(targets: &[Target]) -> u64 {
    if targets.is_empty() {
        IMPLICIT_TARGET_WEIGHT
    } else {
        targets.len() as u64
    }
}

/// Dimensions and format of the full-quality fetch, kept when the cached
/// asset is a degraded re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoOrigin {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

/// Where the bytes of a record currently live.
///
/// `Local` → `Uploaded` is one-way: once a handle exists the file is gone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Payload {
    /// Metadata only; nothing was downloaded.
    #[default]
    Metadata,
    /// Freshly downloaded, waiting for its first delivery.
    Local {
        path: PathBuf,
        filename: Option<String>,
    },
    /// Delivered once; re-sendable by handle.
    Uploaded { handle: MediaHandle },
}

/// A fetched (or probed) resource as cached by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub duration: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Canonical URL reported by the extractor.
    pub webpage_url: Option<String>,
    pub upload_date: Option<String>,
    pub timestamp: Option<String>,
    pub thumbnail: Option<String>,
    pub uploader_url: Option<String>,
    pub format: Option<String>,
    #[serde(default)]
    pub payload: Payload,
    pub origin: Option<VideoOrigin>,
    pub source: Option<String>,
    pub processed_at: Option<String>,
}

impl ResourceRecord {
    pub fn handle(&self) -> Option<&MediaHandle> {
        match &self.payload {
            Payload::Uploaded { handle } => Some(handle),
            _ => None,
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::Local { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match &self.payload {
            Payload::Local { filename, .. } => filename.as_deref(),
            _ => None,
        }
    }

    /// Move to the delivered phase. Returns the local path that is no
    /// longer referenced, so the caller can dispose of the file.
    pub fn attach_handle(&mut self, handle: MediaHandle) -> Option<PathBuf> {
        match std::mem::replace(&mut self.payload, Payload::Uploaded { handle }) {
            Payload::Local { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Canonical URL if known, else `fallback` (the request key).
    pub fn canonical_url<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.webpage_url.as_deref().unwrap_or(fallback)
    }

    pub fn origin_info(&self) -> VideoOrigin {
        VideoOrigin {
            width: self.width,
            height: self.height,
            format: self.format.clone(),
        }
    }
}
