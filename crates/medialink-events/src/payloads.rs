//! Typed payloads for the message kinds listed in [`crate::kinds`].

use serde::{Deserialize, Deserializer, Serialize};

use crate::envelope::InboundMessage;
use crate::error::DecodeResult;
use crate::kinds;

/// Outcome for a single file during a link operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// A hard link was created.
    Linked,
    /// The destination already existed.
    Skipped,
    /// Linking failed.
    Failed,
}

/// Payload of `link:progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkProgress {
    /// File name being processed.
    pub file: String,
    /// Outcome for the file.
    pub status: LinkStatus,
    /// One-based index of the file.
    pub current: u32,
    /// Number of files in the operation.
    pub total: u32,
}

/// Payload of `link:complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResult {
    /// Files linked.
    pub linked: u32,
    /// Files skipped.
    pub skipped: u32,
    /// Files that failed.
    pub failed: u32,
    /// Total bytes linked.
    pub size: i64,
    /// Destination directory.
    pub dest_dir: String,
    /// Destination paths of linked files.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<String>,
}

/// Snapshot of one torrent in the download client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentStatus {
    /// Display name.
    pub name: String,
    /// Info hash.
    pub hash: String,
    /// Client-reported state label.
    pub state: String,
    /// Completion ratio in `0.0..=1.0`.
    pub progress: f64,
    /// Download rate in bytes per second.
    #[serde(rename = "dlSpeed")]
    pub download_bps: i64,
    /// Upload rate in bytes per second.
    #[serde(rename = "ulSpeed")]
    pub upload_bps: i64,
    /// Payload size in bytes.
    pub size: i64,
    /// Estimated seconds remaining.
    pub eta: i64,
    /// Share ratio.
    pub ratio: f64,
}

impl TorrentStatus {
    /// Completion as a percentage.
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        (self.progress * 100.0).clamp(0.0, 100.0)
    }
}

/// Payload of `torrent_progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentProgress {
    /// All torrents currently tracked.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub torrents: Vec<TorrentStatus>,
    /// Torrents that completed since the previous snapshot.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub completed: Vec<TorrentStatus>,
}

/// Outcome recorded for an RSS match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RssMatchStatus {
    /// The release was handed to the download client.
    Downloaded,
    /// The release was linked into the library.
    Linked,
    /// Handing the release off failed.
    Failed,
    /// The match is awaiting action.
    Pending,
}

/// Payload of `rss_match`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RssMatch {
    /// Rule that matched.
    pub rule_name: String,
    /// Release title.
    pub title: String,
    /// Outcome for the match.
    pub status: RssMatchStatus,
}

// The backend encodes empty lists as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Typed view over messages whose kind is listed in [`kinds::KNOWN`].
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// `link:progress`
    LinkProgress(LinkProgress),
    /// `link:complete`
    LinkComplete(LinkResult),
    /// `torrent_progress`
    TorrentProgress(TorrentProgress),
    /// `download_complete`
    DownloadComplete(TorrentStatus),
    /// `rss_match`
    RssMatch(RssMatch),
}

impl MediaEvent {
    /// Decode a typed event. Returns `Ok(None)` for kinds without a typed payload.
    ///
    /// # Errors
    ///
    /// Returns a payload error when a known kind carries a mismatched payload.
    pub fn from_message(message: &InboundMessage) -> DecodeResult<Option<Self>> {
        let event = match message.kind.as_str() {
            kinds::LINK_PROGRESS => Self::LinkProgress(message.payload()?),
            kinds::LINK_COMPLETE => Self::LinkComplete(message.payload()?),
            kinds::TORRENT_PROGRESS => Self::TorrentProgress(message.payload()?),
            kinds::DOWNLOAD_COMPLETE => Self::DownloadComplete(message.payload()?),
            kinds::RSS_MATCH => Self::RssMatch(message.payload()?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Wire discriminator for the event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LinkProgress(_) => kinds::LINK_PROGRESS,
            Self::LinkComplete(_) => kinds::LINK_COMPLETE,
            Self::TorrentProgress(_) => kinds::TORRENT_PROGRESS,
            Self::DownloadComplete(_) => kinds::DOWNLOAD_COMPLETE,
            Self::RssMatch(_) => kinds::RSS_MATCH,
        }
    }
}
