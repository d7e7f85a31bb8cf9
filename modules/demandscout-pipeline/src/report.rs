//! Run reports — one timestamped directory per run, holding the clustered
//! demands and posting outcomes as both JSON (for machines) and markdown
//! (for a human skim).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use demandscout_common::types::{ClusterSummary, PostOutcome, Verdict};
use demandscout_common::DemandScoutError;

use crate::stats::RunStats;

/// Everything known about one cluster at the end of a run.
#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub summary: ClusterSummary,
    pub verdict: Verdict,
    pub outcome: PostOutcome,
}

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Write the full report set and return the run directory.
    pub fn write(
        &self,
        run_id: &str,
        stats: &RunStats,
        rows: &[ReportRow],
    ) -> Result<PathBuf, DemandScoutError> {
        let dir = self
            .output_dir
            .join(format!("run_{}", Utc::now().format("%Y%m%d_%H%M%S")));
        fs::create_dir_all(&dir)
            .map_err(|e| DemandScoutError::Report(format!("cannot create {}: {e}", dir.display())))?;

        let summaries: Vec<&ClusterSummary> = rows.iter().map(|r| &r.summary).collect();
        write_json(&dir.join("demand_clusters.json"), &summaries)?;
        write_json(&dir.join("posting_report.json"), &rows)?;
        fs::write(&dir.join("report.md"), clusters_markdown(run_id, rows))
            .map_err(|e| DemandScoutError::Report(format!("cannot write report.md: {e}")))?;
        fs::write(&dir.join("posting_report.md"), posting_markdown(run_id, stats, rows))
            .map_err(|e| DemandScoutError::Report(format!("cannot write posting_report.md: {e}")))?;

        info!(dir = %dir.display(), "Run reports written");
        Ok(dir)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DemandScoutError> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| DemandScoutError::Report(format!("cannot serialize report: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| DemandScoutError::Report(format!("cannot write {}: {e}", path.display())))
}

fn clusters_markdown(run_id: &str, rows: &[ReportRow]) -> String {
    let mut out = format!("# Demand clusters — run {run_id}\n\n");
    if rows.is_empty() {
        out.push_str("No demand clusters found in this run.\n");
        return out;
    }
    for (i, row) in rows.iter().enumerate() {
        let s = &row.summary;
        out.push_str(&format!("## {}. {}\n\n", i + 1, s.representative_text));
        out.push_str(&format!("- Cluster id: `{}`\n", s.cluster_id));
        out.push_str(&format!("- Mentions: {}\n", s.mentions));
        out.push_str(&format!(
            "- Avg confidence: {:.2} | Avg urgency: {:.2}\n",
            s.avg_confidence, s.avg_urgency
        ));
        out.push_str(&format!("- Keywords: {}\n", s.keywords.join(", ")));
        out.push_str(&format!("- Subreddits: {}\n", s.subreddits.join(", ")));
        if !s.evidence.url.is_empty() {
            out.push_str(&format!("- Evidence: [{}]({})\n", s.evidence.title, s.evidence.url));
        }
        let verdict_label = if row.verdict.accepted { "accepted" } else { "rejected" };
        out.push_str(&format!(
            "- Verdict: {} ({:.2}) — {}\n\n",
            verdict_label, row.verdict.confidence, row.verdict.reason
        ));
    }
    out
}

fn posting_markdown(run_id: &str, stats: &RunStats, rows: &[ReportRow]) -> String {
    let mut out = format!("# Posting report — run {run_id}\n\n");
    out.push_str(&format!(
        "Posted: {} | Failed: {} | Duplicates skipped: {} | Rejected: {}\n\n",
        stats.posted, stats.post_failures, stats.skipped_duplicates, stats.clusters_rejected
    ));
    out.push_str("| Cluster | Outcome | Detail |\n|---|---|---|\n");
    for row in rows {
        let detail = match &row.outcome {
            PostOutcome::Posted { external_ref } => external_ref.clone().unwrap_or_default(),
            PostOutcome::Failed { error } => error.clone(),
            PostOutcome::Rejected { reason } => reason.clone(),
            PostOutcome::SkippedDuplicate | PostOutcome::DryRun => String::new(),
        };
        out.push_str(&format!(
            "| `{}` | {} | {} |\n",
            row.summary.cluster_id,
            row.outcome.label(),
            detail.replace('|', "\\|").replace('\n', " ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{summary_fixture, verdict_for};

    fn rows() -> Vec<ReportRow> {
        let posted = summary_fixture("cluster-a");
        let rejected = summary_fixture("cluster-b");
        vec![
            ReportRow {
                verdict: verdict_for(&posted, true, "clear requirement"),
                outcome: PostOutcome::Posted {
                    external_ref: Some("idea-1".to_string()),
                },
                summary: posted,
            },
            ReportRow {
                verdict: verdict_for(&rejected, false, "too vague"),
                outcome: PostOutcome::Rejected {
                    reason: "too vague".to_string(),
                },
                summary: rejected,
            },
        ]
    }

    #[test]
    fn writes_all_four_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let run_dir = writer.write("run-1", &RunStats::default(), &rows()).unwrap();

        for name in [
            "demand_clusters.json",
            "posting_report.json",
            "report.md",
            "posting_report.md",
        ] {
            assert!(run_dir.join(name).exists(), "missing {name}");
        }

        let raw = std::fs::read_to_string(run_dir.join("demand_clusters.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn posting_markdown_carries_outcomes() {
        let md = posting_markdown("run-1", &RunStats::default(), &rows());
        assert!(md.contains("posted"));
        assert!(md.contains("idea-1"));
        assert!(md.contains("too vague"));
    }

    #[test]
    fn empty_run_still_renders() {
        let md = clusters_markdown("run-1", &[]);
        assert!(md.contains("No demand clusters"));
    }

    #[test]
    fn unwritable_output_dir_is_a_report_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "not a directory").unwrap();

        let err = ReportWriter::new(&blocked)
            .write("run-1", &RunStats::default(), &rows())
            .unwrap_err();
        assert!(matches!(err, DemandScoutError::Report(_)));
    }
}
