//! In-memory collaborators for tests. Also available to downstream crates
//! through the `test-support` feature.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use demandscout_common::types::{ClusterSummary, Evidence, RawItem, Verdict};
use demandscout_common::DemandScoutError;

use crate::ledger::LedgerStore;
use crate::traits::{DemandJudge, IdeaPoster, ItemSource, JudgeDecision};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn summary_fixture(cluster_id: &str) -> ClusterSummary {
    ClusterSummary {
        cluster_id: cluster_id.to_string(),
        representative_text: format!("looking for a tool like {cluster_id}"),
        mentions: 2,
        avg_confidence: 0.7,
        avg_urgency: 0.0,
        keywords: vec!["tool".to_string(), "looking".to_string()],
        subreddits: vec!["SaaS".to_string()],
        evidence: Evidence {
            title: format!("looking for a tool like {cluster_id}"),
            url: format!("https://reddit.com/r/SaaS/{cluster_id}"),
        },
    }
}

pub fn verdict_for(summary: &ClusterSummary, accepted: bool, reason: &str) -> Verdict {
    Verdict {
        cluster_id: summary.cluster_id.clone(),
        accepted,
        reason: reason.to_string(),
        confidence: if accepted { 0.9 } else { 0.1 },
        decided_at: Utc::now(),
    }
}

pub fn raw_item(source_id: &str, subreddit: &str, title: &str, body: &str) -> RawItem {
    RawItem {
        source_id: source_id.to_string(),
        subreddit: subreddit.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        url: format!("https://reddit.com/{source_id}"),
        created_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// StaticItemSource
// ---------------------------------------------------------------------------

pub struct StaticItemSource {
    items: Vec<RawItem>,
}

impl StaticItemSource {
    pub fn new(items: Vec<RawItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl ItemSource for StaticItemSource {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        Ok(self.items.clone())
    }
}

// ---------------------------------------------------------------------------
// ScriptedJudge
// ---------------------------------------------------------------------------

enum JudgeScript {
    Accept { reason: String, confidence: f64 },
    Reject { reason: String },
    Fail { message: String },
}

pub struct ScriptedJudge {
    script: JudgeScript,
}

impl ScriptedJudge {
    pub fn accepting(reason: &str) -> Self {
        Self::accepting_with_confidence(reason, 0.9)
    }

    pub fn accepting_with_confidence(reason: &str, confidence: f64) -> Self {
        Self {
            script: JudgeScript::Accept {
                reason: reason.to_string(),
                confidence,
            },
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            script: JudgeScript::Reject {
                reason: reason.to_string(),
            },
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            script: JudgeScript::Fail {
                message: message.to_string(),
            },
        }
    }
}

#[async_trait]
impl DemandJudge for ScriptedJudge {
    async fn judge(&self, _summary: &ClusterSummary) -> Result<JudgeDecision> {
        match &self.script {
            JudgeScript::Accept { reason, confidence } => Ok(JudgeDecision {
                accept: true,
                reason: reason.clone(),
                confidence: *confidence,
            }),
            JudgeScript::Reject { reason } => Ok(JudgeDecision {
                accept: false,
                reason: reason.clone(),
                confidence: 0.2,
            }),
            JudgeScript::Fail { message } => Err(anyhow!("{message}")),
        }
    }
}

// ---------------------------------------------------------------------------
// MockPoster
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockPosterState {
    attempts: usize,
    posted: Vec<String>,
}

#[derive(Default)]
pub struct MockPoster {
    state: Mutex<MockPosterState>,
    fail_for: Vec<String>,
    omit_refs: bool,
}

impl MockPoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every attempt for this cluster id.
    pub fn failing_for(mut self, cluster_id: &str) -> Self {
        self.fail_for.push(cluster_id.to_string());
        self
    }

    /// Succeed without a site-assigned reference, like a merged response.
    pub fn returning_no_ref(mut self) -> Self {
        self.omit_refs = true;
        self
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }

    pub fn posted_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().posted.clone()
    }
}

#[async_trait]
impl IdeaPoster for MockPoster {
    async fn post(&self, summary: &ClusterSummary, _anon_id: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if self.fail_for.iter().any(|id| id == &summary.cluster_id) {
            return Err(anyhow!("simulated post failure for {}", summary.cluster_id));
        }
        state.posted.push(summary.cluster_id.clone());
        if self.omit_refs {
            Ok(None)
        } else {
            Ok(Some(format!("idea-{}", state.attempts)))
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryLedgerStore
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    raw: Arc<Mutex<Option<String>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(raw: &str) -> Self {
        Self {
            raw: Arc::new(Mutex::new(Some(raw.to_string()))),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap().clone()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<Option<String>, DemandScoutError> {
        Ok(self.raw.lock().unwrap().clone())
    }

    fn save(&self, raw: &str) -> Result<(), DemandScoutError> {
        *self.raw.lock().unwrap() = Some(raw.to_string());
        Ok(())
    }
}
