//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use medialink_events::{
    InboundMessage, LinkProgress, LinkResult, LinkStatus, MediaEvent, RssMatch, RssMatchStatus,
    TorrentProgress, TorrentStatus,
};

use crate::client::{CliError, CliResult};

/// Rendering used by `tail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TailFormat {
    Json,
    Pretty,
    Summary,
}

pub(crate) fn render_message(message: &InboundMessage, format: TailFormat) -> CliResult<String> {
    match format {
        TailFormat::Json => serde_json::to_string(message)
            .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}"))),
        TailFormat::Pretty => serde_json::to_string_pretty(message)
            .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}"))),
        TailFormat::Summary => Ok(summarize(message)),
    }
}

/// One line per event; unknown kinds and mismatched payloads fall back to raw JSON.
fn summarize(message: &InboundMessage) -> String {
    match MediaEvent::from_message(message) {
        Ok(Some(event)) => summarize_event(&event),
        Ok(None) | Err(_) => match &message.data {
            Some(data) => format!("{} {data}", message.kind),
            None => message.kind.clone(),
        },
    }
}

fn summarize_event(event: &MediaEvent) -> String {
    let detail = match event {
        MediaEvent::LinkProgress(progress) => summarize_link_progress(progress),
        MediaEvent::LinkComplete(result) => summarize_link_result(result),
        MediaEvent::TorrentProgress(progress) => summarize_torrent_progress(progress),
        MediaEvent::DownloadComplete(torrent) => summarize_torrent(torrent),
        MediaEvent::RssMatch(matched) => summarize_rss_match(matched),
    };
    format!("{} {detail}", event.kind())
}

fn summarize_link_progress(progress: &LinkProgress) -> String {
    format!(
        "[{}/{}] {} {}",
        progress.current,
        progress.total,
        link_status_to_str(progress.status),
        progress.file
    )
}

fn summarize_link_result(result: &LinkResult) -> String {
    format!(
        "linked={} skipped={} failed={} ({}) -> {}",
        result.linked,
        result.skipped,
        result.failed,
        format_bytes(result.size),
        result.dest_dir
    )
}

fn summarize_torrent_progress(progress: &TorrentProgress) -> String {
    let downloading: Vec<String> = progress
        .torrents
        .iter()
        .map(|torrent| format!("{} {:.1}%", torrent.name, torrent.percent_complete()))
        .collect();
    let mut line = format!(
        "active={} completed={}",
        progress.torrents.len(),
        progress.completed.len()
    );
    if !downloading.is_empty() {
        line.push_str(": ");
        line.push_str(&downloading.join(", "));
    }
    line
}

fn summarize_torrent(torrent: &TorrentStatus) -> String {
    format!(
        "{} ({}, ratio {:.2})",
        torrent.name,
        format_bytes(torrent.size),
        torrent.ratio
    )
}

fn summarize_rss_match(matched: &RssMatch) -> String {
    format!(
        "{}: {} ({})",
        matched.rule_name,
        matched.title,
        rss_status_to_str(matched.status)
    )
}

#[must_use]
pub(crate) const fn link_status_to_str(status: LinkStatus) -> &'static str {
    match status {
        LinkStatus::Linked => "linked",
        LinkStatus::Skipped => "skipped",
        LinkStatus::Failed => "failed",
    }
}

#[must_use]
pub(crate) const fn rss_status_to_str(status: RssMatchStatus) -> &'static str {
    match status {
        RssMatchStatus::Downloaded => "downloaded",
        RssMatchStatus::Linked => "linked",
        RssMatchStatus::Failed => "failed",
        RssMatchStatus::Pending => "pending",
    }
}

/// Human-readable size; negative sizes reported by the backend render as `0 B`.
#[must_use]
pub(crate) fn format_bytes(bytes: i64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    let bytes = u64::try_from(bytes).unwrap_or(0);
    let value = bytes_to_f64(bytes);
    if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: &serde_json::Value) -> InboundMessage {
        InboundMessage::decode(&value.to_string()).expect("valid envelope")
    }

    #[test]
    fn json_lines_keep_the_envelope() {
        let msg = message(&json!({"type": "progress", "data": {"pct": 50}}));
        let line = render_message(&msg, TailFormat::Json).expect("render");
        assert_eq!(line, r#"{"type":"progress","data":{"pct":50}}"#);

        let bare = message(&json!({"type": "heartbeat", "data": null}));
        assert_eq!(
            render_message(&bare, TailFormat::Json).expect("render"),
            r#"{"type":"heartbeat"}"#
        );
    }

    #[test]
    fn pretty_output_spans_lines() {
        let msg = message(&json!({"type": "progress", "data": {"pct": 50}}));
        let text = render_message(&msg, TailFormat::Pretty).expect("render");
        assert!(text.contains('\n'));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).expect("json"),
            json!({"type": "progress", "data": {"pct": 50}})
        );
    }

    #[test]
    fn summaries_describe_known_events() {
        let progress = message(&json!({
            "type": "link:progress",
            "data": {"file": "a.mkv", "status": "skipped", "current": 2, "total": 5}
        }));
        assert_eq!(
            summarize(&progress),
            "link:progress [2/5] skipped a.mkv"
        );

        let complete = message(&json!({
            "type": "link:complete",
            "data": {"linked": 3, "skipped": 1, "failed": 0, "size": 3_145_728,
                     "destDir": "/media/movies", "files": null}
        }));
        assert_eq!(
            summarize(&complete),
            "link:complete linked=3 skipped=1 failed=0 (3.00 MiB) -> /media/movies"
        );

        let rss = message(&json!({
            "type": "rss_match",
            "data": {"ruleName": "shows", "title": "Show S01E01", "status": "pending"}
        }));
        assert_eq!(summarize(&rss), "rss_match shows: Show S01E01 (pending)");
    }

    #[test]
    fn summaries_report_torrent_progress() {
        let msg = message(&json!({
            "type": "torrent_progress",
            "data": {
                "torrents": [{
                    "name": "distro.iso", "hash": "abc", "state": "downloading",
                    "progress": 0.5, "dlSpeed": 1024, "ulSpeed": 0,
                    "size": 2048, "eta": 60, "ratio": 0.0
                }],
                "completed": null
            }
        }));
        assert_eq!(
            summarize(&msg),
            "torrent_progress active=1 completed=0: distro.iso 50.0%"
        );
    }

    #[test]
    fn unknown_or_mismatched_events_fall_back_to_raw_data() {
        let unknown = message(&json!({"type": "library_scan", "data": {"count": 4}}));
        assert_eq!(summarize(&unknown), r#"library_scan {"count":4}"#);

        let mismatched = message(&json!({"type": "rss_match", "data": 7}));
        assert_eq!(summarize(&mismatched), "rss_match 7");

        let bare = message(&json!({"type": "heartbeat"}));
        assert_eq!(summarize(&bare), "heartbeat");
    }

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(-1), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GiB");
    }
}
