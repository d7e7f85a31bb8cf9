use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::text;

// --- Run-scoped pipeline types ---

/// A raw forum post handed over by the ingestion collaborator.
/// Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub source_id: String,
    pub subreddit: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// A raw item plus its canonical text forms. Derived, never mutated.
#[derive(Debug, Clone)]
pub struct NormalizedItem {
    pub raw: RawItem,
    /// Compacted title + body with URLs stripped.
    pub canonical_text: String,
    /// Sorted unique tokens of the canonical text. Input to similarity
    /// matching and to cluster identity.
    pub normalized_text: String,
    pub keywords: BTreeSet<String>,
}

/// A normalized item heuristically judged to express a concrete need.
#[derive(Debug, Clone)]
pub struct DemandCandidate {
    pub item: NormalizedItem,
    /// The sentence that best states the demand, shortened for summaries.
    pub demand_text: String,
    /// Heuristic confidence in [0, 1].
    pub confidence: f64,
    /// Urgency in [0, 1]; 0 when no time-pressure signal was detected.
    pub urgency: f64,
}

/// One representative post backing a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub title: String,
    pub url: String,
}

/// A group of semantically-equivalent demand statements sharing one stable,
/// content-derived identifier. Members only grow within a run; clusters are
/// never merged or split after creation.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub cluster_id: String,
    /// Normalized text of the seed member; the similarity anchor for the run.
    pub anchor_text: String,
    /// Members in discovery order.
    pub members: Vec<DemandCandidate>,
    pub subreddits: BTreeSet<String>,
}

impl Cluster {
    /// Derive the stable cluster id for an anchor: a slug of its leading
    /// tokens plus a truncated SHA-256. Identical canonical text always
    /// yields the identical id, across runs.
    pub fn id_for_anchor(anchor_text: &str) -> String {
        let digest = hex::encode(Sha256::digest(anchor_text.as_bytes()));
        let slug = text::slugify(anchor_text, 4);
        if slug.is_empty() {
            format!("demand-{}", &digest[..12])
        } else {
            format!("{slug}-{}", &digest[..12])
        }
    }

    pub fn mentions(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn avg_confidence(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.members.iter().map(|m| m.confidence).sum::<f64>() / self.members.len() as f64
    }

    pub fn avg_urgency(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.members.iter().map(|m| m.urgency).sum::<f64>() / self.members.len() as f64
    }

    /// Highest-confidence member; earliest-discovered wins ties.
    pub fn representative(&self) -> &DemandCandidate {
        self.members
            .iter()
            .reduce(|best, m| if m.confidence > best.confidence { m } else { best })
            .expect("cluster always has at least one member")
    }

    pub fn representative_text(&self) -> &str {
        &self.representative().demand_text
    }

    pub fn example_evidence(&self) -> Evidence {
        let rep = self.representative();
        Evidence {
            title: rep.item.raw.title.clone(),
            url: rep.item.raw.url.clone(),
        }
    }

    /// Serializable snapshot consumed by the judge, the poster, and reports.
    /// Keywords are ranked by frequency across members, not the raw union.
    pub fn summary(&self) -> ClusterSummary {
        let joined = self
            .members
            .iter()
            .map(|m| m.item.canonical_text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        ClusterSummary {
            cluster_id: self.cluster_id.clone(),
            representative_text: self.representative_text().to_string(),
            mentions: self.mentions(),
            avg_confidence: self.avg_confidence(),
            avg_urgency: self.avg_urgency(),
            keywords: text::keyword_tokens(&joined, 8),
            subreddits: self.subreddits.iter().cloned().collect(),
            evidence: self.example_evidence(),
        }
    }
}

/// Flattened cluster view for judging, posting, and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: String,
    pub representative_text: String,
    pub mentions: u32,
    pub avg_confidence: f64,
    pub avg_urgency: f64,
    pub keywords: Vec<String>,
    pub subreddits: Vec<String>,
    pub evidence: Evidence,
}

/// The accept/reject decision for a cluster in a given run. Run-scoped;
/// re-derived every run since the judge is not assumed deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub cluster_id: String,
    pub accepted: bool,
    pub reason: String,
    pub confidence: f64,
    pub decided_at: DateTime<Utc>,
}

// --- Durable posting state ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingStatus {
    Posted,
    Failed,
    SkippedDuplicate,
}

impl std::fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostingStatus::Posted => write!(f, "posted"),
            PostingStatus::Failed => write!(f, "failed"),
            PostingStatus::SkippedDuplicate => write!(f, "skipped_duplicate"),
        }
    }
}

/// One ledger entry, keyed by cluster id. At most one `posted` record ever
/// exists per cluster id; a `posted` record is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingRecord {
    pub cluster_id: String,
    pub status: PostingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    pub attempted_at: DateTime<Utc>,
    pub run_id: String,
}

/// Per-cluster outcome in a run's posting report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostOutcome {
    Posted { external_ref: Option<String> },
    SkippedDuplicate,
    Failed { error: String },
    Rejected { reason: String },
    DryRun,
}

impl PostOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PostOutcome::Posted { .. } => "posted",
            PostOutcome::SkippedDuplicate => "skipped_duplicate",
            PostOutcome::Failed { .. } => "failed",
            PostOutcome::Rejected { .. } => "rejected",
            PostOutcome::DryRun => "dry_run",
        }
    }
}
