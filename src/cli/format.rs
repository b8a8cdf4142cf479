//! Output formatting for CLI display.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

use crate::pipeline::PipelineReport;
use crate::stats::Summary;

/// How many entries the digest lists per ranking.
const TOP: usize = 5;

/// Format a summary as a short human-readable digest.
pub(super) fn format_summary(summary: &Summary) -> String {
    if summary.downloads_count == 0 {
        return format!(
            "No downloads ({} other event(s) skipped)",
            summary.events_ignored
        );
    }

    let mut out = format!(
        "{} download(s) in {} session(s)",
        summary.downloads_count, summary.sessions_count
    );
    if let (Some(start), Some(end)) = (&summary.start_time, &summary.end_time) {
        out.push_str(&format!(", {start} .. {end}"));
    }
    if summary.events_ignored > 0 {
        out.push_str(&format!(
            " ({} other event(s) skipped)",
            summary.events_ignored
        ));
    }

    out.push_str(&format!(
        "\nTop packages: {}",
        format_top(&summary.downloads_by_package)
    ));
    out.push_str(&format!(
        "\nTop users: {}",
        format_top(&summary.downloads_by_user)
    ));
    out.push_str(&format!(
        "\nSession sizes: {}",
        summary
            .sessions_by_count
            .iter()
            .map(|(size, n)| format!("{size}×{n}"))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    out
}

pub(super) fn format_pipeline_report(report: &PipelineReport, out: &Path) -> String {
    format!(
        "Merged {} event(s), added {} goodbye(s) → {}",
        report.merged,
        report.goodbye.goodbyes,
        out.display()
    )
}

/// The `TOP` largest counts as `name (n)`, ties in key order.
fn format_top<K: Display>(counts: &BTreeMap<K, u64>) -> String {
    let mut ranked: Vec<_> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1));
    ranked
        .into_iter()
        .take(TOP)
        .map(|(key, n)| format!("{key} ({n})"))
        .collect::<Vec<_>>()
        .join(", ")
}
