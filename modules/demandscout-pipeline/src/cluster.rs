// Clusterer / Deduplicator — single-pass, streaming grouping of demand
// candidates. Order-dependent by design: the first-seen member of a group
// seeds the cluster and fixes its similarity anchor for the run. Clusters are
// never merged or split after creation within a run.
//
// Cluster identity is content-derived (slug + truncated SHA-256 of the
// anchor), never a counter or timestamp, so identical demands across separate
// runs collapse to the same id and the posting ledger recognizes repeats.

use std::collections::BTreeSet;

use tracing::debug;

use demandscout_common::text;
use demandscout_common::types::{Cluster, DemandCandidate};

pub struct Clusterer {
    similarity_threshold: f64,
}

impl Clusterer {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// Group candidates into clusters, preserving discovery order of both
    /// clusters and members.
    pub fn cluster(&self, candidates: Vec<DemandCandidate>) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();

        for candidate in candidates {
            match self.best_match(&clusters, &candidate) {
                Some(idx) => {
                    let cluster = &mut clusters[idx];
                    debug!(
                        cluster_id = %cluster.cluster_id,
                        source_id = %candidate.item.raw.source_id,
                        "Candidate joined existing cluster"
                    );
                    cluster.subreddits.insert(candidate.item.raw.subreddit.clone());
                    cluster.members.push(candidate);
                }
                None => {
                    let anchor_text = candidate.item.normalized_text.clone();
                    let mut subreddits = BTreeSet::new();
                    subreddits.insert(candidate.item.raw.subreddit.clone());
                    clusters.push(Cluster {
                        cluster_id: Cluster::id_for_anchor(&anchor_text),
                        anchor_text,
                        members: vec![candidate],
                        subreddits,
                    });
                }
            }
        }

        clusters
    }

    /// Index of the most similar existing cluster at or above the threshold.
    fn best_match(&self, clusters: &[Cluster], candidate: &DemandCandidate) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, cluster) in clusters.iter().enumerate() {
            let sim = similarity(&candidate.item.normalized_text, &cluster.anchor_text);
            if best.is_none_or(|(_, s)| sim > s) {
                best = Some((idx, sim));
            }
        }
        best.filter(|&(_, s)| s >= self.similarity_threshold).map(|(idx, _)| idx)
    }
}

/// Exact normalized-text match, or Jaccard overlap of anchor token sets.
fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a_tokens: BTreeSet<String> = a.split_whitespace().map(|t| t.to_string()).collect();
    let b_tokens: BTreeSet<String> = b.split_whitespace().map(|t| t.to_string()).collect();
    text::jaccard(&a_tokens, &b_tokens)
}
