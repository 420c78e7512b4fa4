use std::path::Path;

use serde::{Deserialize, Serialize};

use vidrelay_core::{MediaHandle, ResourceRecord};

/// A local file ready for its first upload.
#[derive(Debug, Clone, Copy)]
pub struct MediaFile<'a> {
    pub path: &'a Path,
    pub filename: Option<&'a str>,
    pub duration: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl<'a> MediaFile<'a> {
    /// Borrow the local file of `record`, if it still has one.
    pub fn from_record(record: &'a ResourceRecord) -> Option<Self> {
        Some(Self {
            path: record.local_path()?,
            filename: record.filename(),
            duration: record.duration,
            width: record.width,
            height: record.height,
        })
    }
}

/// Where an upload landed on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub chat_id: String,
    pub message_id: String,
}

/// Result of a first upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Reusable handle for every later delivery.
    pub handle: MediaHandle,
    /// The message that carried the upload, if the channel created one.
    pub receipt: Option<Receipt>,
}
