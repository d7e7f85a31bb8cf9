// Publisher — walks the run's (cluster, verdict) pairs, gates each accepted
// cluster on the posting ledger, performs the external post, and records the
// outcome. A single posting failure never aborts the batch; a failure to
// persist the ledger does, because continuing without it risks double-posting.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use demandscout_common::types::{ClusterSummary, PostOutcome, PostingStatus, Verdict};
use demandscout_common::DemandScoutError;

use crate::ledger::PostingLedger;
use crate::traits::IdeaPoster;

/// Tag marking automated posts on the tracking site.
pub const SOURCE_TAG: &str = "_social_";

/// External post payloads are truncated to this many characters.
const MAX_POST_TEXT_LEN: usize = 2900;

pub struct Publisher<'a> {
    poster: &'a dyn IdeaPoster,
    dry_run: bool,
}

impl<'a> Publisher<'a> {
    pub fn new(poster: &'a dyn IdeaPoster) -> Self {
        Self {
            poster,
            dry_run: false,
        }
    }

    /// Prepare payloads and report outcomes without posting or recording.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Publish this run's accepted clusters, in order. Returns one outcome
    /// per input pair, preserving order.
    pub async fn publish(
        &self,
        pairs: &[(ClusterSummary, Verdict)],
        ledger: &mut PostingLedger,
        run_id: &str,
    ) -> Result<Vec<(String, PostOutcome)>, DemandScoutError> {
        let mut outcomes = Vec::with_capacity(pairs.len());

        for (summary, verdict) in pairs {
            let cluster_id = summary.cluster_id.clone();
            let outcome = if !verdict.accepted {
                PostOutcome::Rejected {
                    reason: verdict.reason.clone(),
                }
            } else if ledger.has_posted(&cluster_id) {
                // Re-check immediately before each attempt, not just at run
                // start; the store enforces at-most-one regardless.
                info!(%cluster_id, "Already posted in a prior run, skipping");
                PostOutcome::SkippedDuplicate
            } else if self.dry_run {
                PostOutcome::DryRun
            } else {
                match self.poster.post(summary, ledger.anon_id()).await {
                    Ok(external_ref) => {
                        ledger.record(
                            &cluster_id,
                            PostingStatus::Posted,
                            external_ref.clone(),
                            run_id,
                        )?;
                        info!(
                            %cluster_id,
                            external_ref = external_ref.as_deref().unwrap_or("-"),
                            "Posted cluster"
                        );
                        PostOutcome::Posted { external_ref }
                    }
                    Err(e) => {
                        warn!(%cluster_id, error = %e, "Post failed, continuing with next cluster");
                        ledger.record(&cluster_id, PostingStatus::Failed, None, run_id)?;
                        PostOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            };
            outcomes.push((cluster_id, outcome));
        }

        Ok(outcomes)
    }
}

// ---------------------------------------------------------------------------
// HttpIdeaPoster — tracking-site client
// ---------------------------------------------------------------------------

pub struct HttpIdeaPoster {
    site_url: String,
    http: reqwest::Client,
}

impl HttpIdeaPoster {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

/// Narrative payload the site feeds to its own spec generator.
fn build_raw_input_text(summary: &ClusterSummary) -> String {
    let mut lines = vec![
        format!(
            "User requirement from social community: {}",
            summary.representative_text
        ),
        String::new(),
        "Context:".to_string(),
        "- Source: Reddit".to_string(),
        format!("- Mention count in this run: {}", summary.mentions),
    ];
    if !summary.evidence.title.is_empty() {
        lines.push(format!("- Evidence title: {}", summary.evidence.title));
    }
    if !summary.evidence.url.is_empty() {
        lines.push(format!("- Evidence link: {}", summary.evidence.url));
    }
    lines.push(String::new());
    lines.push("Please generate a buildable product spec from this requirement.".to_string());

    let text = lines.join("\n");
    text.chars().take(MAX_POST_TEXT_LEN).collect()
}

/// 201 means created; 200 with `merged: true` means an equivalent idea
/// already existed on the site and absorbed this one. Both count as a
/// successful post even when the response carries no idea id — recording
/// such a response as failed would re-post the cluster on every later run.
fn interpret_response(status: u16, body: &serde_json::Value) -> anyhow::Result<Option<String>> {
    let created = status == 201;
    let merged = status == 200 && body["merged"].as_bool().unwrap_or(false);
    if !(created || merged) {
        let detail: String = body.to_string().chars().take(600).collect();
        return Err(anyhow!("site rejected post (HTTP {status}): {detail}"));
    }
    Ok(body["idea"]["id"].as_str().map(str::to_string))
}

#[async_trait]
impl IdeaPoster for HttpIdeaPoster {
    async fn post(&self, summary: &ClusterSummary, anon_id: &str) -> anyhow::Result<Option<String>> {
        let payload = json!({
            "raw_input_text": build_raw_input_text(summary),
            "target_users": "People asking for practical productivity and workflow software tools",
            "platform": "Any",
            "constraints": "Prefer simple setup and low friction.",
            "source_tag": SOURCE_TAG,
            "show_name": false,
        });

        let response = self
            .http
            .post(format!("{}/api/ideas", self.site_url))
            .header("x-anon-id", anon_id)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_else(|_| json!({}));
        interpret_response(status.as_u16(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{summary_fixture, verdict_for, MemoryLedgerStore, MockPoster};

    fn ledger() -> PostingLedger {
        PostingLedger::load(Box::new(MemoryLedgerStore::new())).unwrap()
    }

    #[tokio::test]
    async fn rejected_clusters_are_never_attempted() {
        let poster = MockPoster::new();
        let mut ledger = ledger();
        let summary = summary_fixture("cluster-a");
        let pairs = vec![(summary.clone(), verdict_for(&summary, false, "not a requirement"))];
        let outcomes = Publisher::new(&poster)
            .publish(&pairs, &mut ledger, "run-1")
            .await
            .unwrap();
        assert!(matches!(outcomes[0].1, PostOutcome::Rejected { .. }));
        assert_eq!(poster.attempts(), 0);
        assert!(ledger.record_for("cluster-a").is_none());
    }

    #[tokio::test]
    async fn partial_failure_does_not_abort_the_batch() {
        let poster = MockPoster::new().failing_for("cluster-a");
        let mut ledger = ledger();
        let pairs: Vec<_> = ["cluster-a", "cluster-b", "cluster-c"]
            .iter()
            .map(|id| {
                let s = summary_fixture(id);
                let v = verdict_for(&s, true, "ok");
                (s, v)
            })
            .collect();
        let outcomes = Publisher::new(&poster)
            .publish(&pairs, &mut ledger, "run-1")
            .await
            .unwrap();

        assert!(matches!(outcomes[0].1, PostOutcome::Failed { .. }));
        assert!(matches!(outcomes[1].1, PostOutcome::Posted { .. }));
        assert!(matches!(outcomes[2].1, PostOutcome::Posted { .. }));
        assert!(!ledger.has_posted("cluster-a"));
        assert!(ledger.has_posted("cluster-b"));
        assert!(ledger.has_posted("cluster-c"));
    }

    #[tokio::test]
    async fn dry_run_posts_and_records_nothing() {
        let poster = MockPoster::new();
        let mut ledger = ledger();
        let summary = summary_fixture("cluster-a");
        let pairs = vec![(summary.clone(), verdict_for(&summary, true, "ok"))];
        let outcomes = Publisher::new(&poster)
            .dry_run()
            .publish(&pairs, &mut ledger, "run-1")
            .await
            .unwrap();
        assert_eq!(outcomes[0].1, PostOutcome::DryRun);
        assert_eq!(poster.attempts(), 0);
        assert!(ledger.record_for("cluster-a").is_none());
    }

    #[tokio::test]
    async fn duplicate_within_one_batch_is_posted_once() {
        // Should not happen given upstream dedup, but the gate is re-checked
        // before every attempt.
        let poster = MockPoster::new();
        let mut ledger = ledger();
        let summary = summary_fixture("cluster-a");
        let pairs = vec![
            (summary.clone(), verdict_for(&summary, true, "ok")),
            (summary.clone(), verdict_for(&summary, true, "ok")),
        ];
        let outcomes = Publisher::new(&poster)
            .publish(&pairs, &mut ledger, "run-1")
            .await
            .unwrap();
        assert!(matches!(outcomes[0].1, PostOutcome::Posted { .. }));
        assert_eq!(outcomes[1].1, PostOutcome::SkippedDuplicate);
        assert_eq!(poster.attempts(), 1);
    }

    #[tokio::test]
    async fn post_without_external_ref_is_still_recorded_posted() {
        let poster = MockPoster::new().returning_no_ref();
        let mut ledger = ledger();
        let summary = summary_fixture("cluster-a");
        let pairs = vec![(summary.clone(), verdict_for(&summary, true, "ok"))];
        let publisher = Publisher::new(&poster);

        let outcomes = publisher.publish(&pairs, &mut ledger, "run-1").await.unwrap();
        assert_eq!(outcomes[0].1, PostOutcome::Posted { external_ref: None });
        assert!(ledger.has_posted("cluster-a"));
        assert!(ledger.record_for("cluster-a").unwrap().external_ref.is_none());

        // Never re-posted on a later run.
        let outcomes = publisher.publish(&pairs, &mut ledger, "run-2").await.unwrap();
        assert_eq!(outcomes[0].1, PostOutcome::SkippedDuplicate);
        assert_eq!(poster.attempts(), 1);
    }

    #[test]
    fn created_response_yields_idea_id() {
        let body = serde_json::json!({ "idea": { "id": "idea-42" } });
        let external_ref = interpret_response(201, &body).unwrap();
        assert_eq!(external_ref.as_deref(), Some("idea-42"));
    }

    #[test]
    fn merged_response_without_id_is_success() {
        let body = serde_json::json!({ "merged": true });
        assert_eq!(interpret_response(200, &body).unwrap(), None);
        let body = serde_json::json!({ "idea": {} });
        assert_eq!(interpret_response(201, &body).unwrap(), None);
    }

    #[test]
    fn unmerged_200_and_errors_are_failures() {
        let body = serde_json::json!({ "merged": false });
        assert!(interpret_response(200, &body).is_err());
        let body = serde_json::json!({ "error": "rate limited" });
        let err = interpret_response(429, &body).unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn raw_input_text_is_bounded_and_descriptive() {
        let summary = summary_fixture("cluster-a");
        let text = build_raw_input_text(&summary);
        assert!(text.starts_with("User requirement from social community:"));
        assert!(text.contains("Mention count"));
        assert!(text.chars().count() <= MAX_POST_TEXT_LEN);
    }
}
