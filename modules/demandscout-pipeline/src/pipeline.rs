//! Run orchestration: fetch -> normalize -> extract -> cluster -> judge ->
//! publish. Each phase only sees the previous phase's output; the posting
//! ledger is the only cross-run state.

use chrono::{Duration, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use demandscout_common::types::PostOutcome;
use demandscout_common::DemandScoutError;

use crate::cluster::Clusterer;
use crate::extractor::DemandExtractor;
use crate::judge::{self, JUDGE_FAILURE_MARKER};
use crate::ledger::PostingLedger;
use crate::normalizer;
use crate::poster::Publisher;
use crate::report::ReportRow;
use crate::stats::RunStats;
use crate::traits::{DemandJudge, IdeaPoster, ItemSource};

pub struct Pipeline<'a> {
    source: &'a dyn ItemSource,
    judge: &'a dyn DemandJudge,
    poster: &'a dyn IdeaPoster,
    similarity_threshold: f64,
    min_confidence: f64,
    max_age_days: Option<i64>,
    dry_run: bool,
}

/// Everything one run produced, ready for reporting.
pub struct RunOutput {
    pub run_id: String,
    pub stats: RunStats,
    pub rows: Vec<ReportRow>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        source: &'a dyn ItemSource,
        judge: &'a dyn DemandJudge,
        poster: &'a dyn IdeaPoster,
        similarity_threshold: f64,
        min_confidence: f64,
    ) -> Self {
        Self {
            source,
            judge,
            poster,
            similarity_threshold,
            min_confidence,
            max_age_days: None,
            dry_run: false,
        }
    }

    /// Drop items older than this many days before extraction.
    pub fn max_age_days(mut self, days: i64) -> Self {
        self.max_age_days = Some(days);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[instrument(skip_all, fields(run_id))]
    pub async fn run(&self, ledger: &mut PostingLedger) -> Result<RunOutput, DemandScoutError> {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        let mut stats = RunStats::default();

        let mut items = self
            .source
            .fetch()
            .await
            .map_err(|e| DemandScoutError::Ingestion(e.to_string()))?;
        stats.items_fetched = items.len() as u32;

        if let Some(days) = self.max_age_days {
            let cutoff = Utc::now() - Duration::days(days);
            items.retain(|item| item.created_at >= cutoff);
            info!(kept = items.len(), max_age_days = days, "Age filter applied");
        }

        let extractor = DemandExtractor::new(self.min_confidence);
        let mut candidates = Vec::new();
        for item in items {
            let Some(normalized) = normalizer::normalize(item) else {
                stats.items_dropped += 1;
                continue;
            };
            stats.items_normalized += 1;
            match extractor.extract(normalized) {
                Some(candidate) => candidates.push(candidate),
                None => stats.items_dropped += 1,
            }
        }
        stats.candidates_extracted = candidates.len() as u32;

        let clusters = Clusterer::new(self.similarity_threshold).cluster(candidates);
        stats.clusters_formed = clusters.len() as u32;
        info!(
            candidates = stats.candidates_extracted,
            clusters = stats.clusters_formed,
            "Clustering complete"
        );

        let mut pairs = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            let summary = cluster.summary();
            let verdict = judge::decide(self.judge, &summary).await;
            if verdict.accepted {
                stats.clusters_accepted += 1;
            } else {
                stats.clusters_rejected += 1;
                if verdict.reason.starts_with(JUDGE_FAILURE_MARKER) {
                    stats.judge_failures += 1;
                }
            }
            pairs.push((summary, verdict));
        }

        let mut publisher = Publisher::new(self.poster);
        if self.dry_run {
            publisher = publisher.dry_run();
        }
        let outcomes = publisher.publish(&pairs, ledger, &run_id).await?;

        let rows = pairs
            .into_iter()
            .zip(outcomes)
            .map(|((summary, verdict), (_, outcome))| {
                match &outcome {
                    PostOutcome::Posted { .. } => stats.posted += 1,
                    PostOutcome::Failed { .. } => stats.post_failures += 1,
                    PostOutcome::SkippedDuplicate => stats.skipped_duplicates += 1,
                    PostOutcome::DryRun => stats.dry_run_posts += 1,
                    PostOutcome::Rejected { .. } => {}
                }
                ReportRow {
                    summary,
                    verdict,
                    outcome,
                }
            })
            .collect();

        Ok(RunOutput {
            run_id,
            stats,
            rows,
        })
    }
}
