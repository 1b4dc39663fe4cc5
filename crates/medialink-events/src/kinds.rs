//! Message kinds emitted by the backend.

/// Per-file progress while a link operation runs.
pub const LINK_PROGRESS: &str = "link:progress";
/// Summary emitted once a link operation finishes.
pub const LINK_COMPLETE: &str = "link:complete";
/// Periodic snapshot of torrents tracked by the download monitor.
pub const TORRENT_PROGRESS: &str = "torrent_progress";
/// A single torrent finished downloading.
pub const DOWNLOAD_COMPLETE: &str = "download_complete";
/// An RSS rule matched a release.
pub const RSS_MATCH: &str = "rss_match";

/// Every kind with a typed payload in [`crate::payloads`].
pub const KNOWN: [&str; 5] = [
    LINK_PROGRESS,
    LINK_COMPLETE,
    TORRENT_PROGRESS,
    DOWNLOAD_COMPLETE,
    RSS_MATCH,
];

/// Returns `true` when `kind` has a typed payload.
#[must_use]
pub fn is_known(kind: &str) -> bool {
    KNOWN.contains(&kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_exclude_wildcard() {
        assert!(is_known("rss_match"));
        assert!(is_known("link:progress"));
        assert!(!is_known(crate::WILDCARD));
        assert!(!is_known("progress"));
    }
}
