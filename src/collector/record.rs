//! Discovered media record types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One discovered lecture segment, as produced by the scraping layer.
///
/// `id` is the stable identifier of the source block and the primary
/// deduplication key. `video_url` may be absent on a candidate; candidates
/// without one never enter the positive result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredMedia {
    /// Stable identifier of the source block.
    pub id: String,
    /// Course display name.
    pub course: String,
    /// Chapter display name.
    pub chapter: String,
    /// Lecture (sequence) display name.
    pub lecture: String,
    /// Segment or video name within the lecture.
    pub segment: String,
    /// Direct media URL, when one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Direct subtitle/transcript URL, absent if none was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_url: Option<String>,
    /// Precomputed output directory for this segment's files.
    pub base_directory: PathBuf,
    /// Precomputed output filename, without extension.
    pub base_filename: String,
}

impl DiscoveredMedia {
    /// Returns the full path for the video file.
    #[must_use]
    pub fn video_path(&self) -> PathBuf {
        self.base_directory
            .join(format!("{}.mp4", self.base_filename))
    }

    /// Returns the full path for the subtitle file.
    #[must_use]
    pub fn subtitle_path(&self) -> PathBuf {
        self.base_directory
            .join(format!("{}.srt", self.base_filename))
    }

    /// Returns the full path for an exported auxiliary document.
    #[must_use]
    pub fn document_path(&self) -> PathBuf {
        self.base_directory
            .join(format!("{}.html", self.base_filename))
    }
}
