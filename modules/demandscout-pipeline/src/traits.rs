// Trait abstractions for pipeline collaborators.
//
// ItemSource — hands the core a sequence of raw post records.
// DemandJudge — the external accept/reject collaborator (LLM or heuristic).
// IdeaPoster — performs the external post to the tracking site.
//
// These enable deterministic testing with StaticItemSource, ScriptedJudge,
// and MockPoster: no network, no real site. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;

use demandscout_common::types::{ClusterSummary, RawItem};

/// What the judge collaborator returns for one cluster.
#[derive(Debug, Clone)]
pub struct JudgeDecision {
    pub accept: bool,
    pub reason: String,
    /// Judge's own confidence, distinct from the extractor's heuristic score.
    pub confidence: f64,
}

#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Fetch the raw items for this run, in discovery order.
    async fn fetch(&self) -> Result<Vec<RawItem>>;
}

#[async_trait]
pub trait DemandJudge: Send + Sync {
    /// Decide whether a cluster states a buildable user requirement.
    /// May fail with a transient error; the caller must treat failure as
    /// rejection, never acceptance.
    async fn judge(&self, summary: &ClusterSummary) -> Result<JudgeDecision>;
}

#[async_trait]
pub trait IdeaPoster: Send + Sync {
    /// Post one accepted cluster to the tracking site. Returns the
    /// site-assigned external reference when the site provides one; a
    /// successful post may carry no reference.
    async fn post(&self, summary: &ClusterSummary, anon_id: &str) -> Result<Option<String>>;
}
