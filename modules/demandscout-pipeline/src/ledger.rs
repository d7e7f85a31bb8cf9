// Posting State Store — the durable, keyed ledger gating every external
// post. This is the only state that survives between runs. The at-most-one
// `posted` invariant is enforced here, not by callers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use demandscout_common::types::{PostingRecord, PostingStatus};
use demandscout_common::DemandScoutError;

/// The on-disk ledger document: a stable anonymous identity plus one record
/// per ever-seen cluster id.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerDocument {
    anon_id: String,
    records: BTreeMap<String, PostingRecord>,
}

/// Persistence seam for the ledger. File-backed in production, in-memory in
/// tests.
pub trait LedgerStore: Send + Sync {
    /// Raw document content, or `None` when no ledger exists yet (first run).
    fn load(&self) -> Result<Option<String>, DemandScoutError>;
    /// Durably replace the document.
    fn save(&self, raw: &str) -> Result<(), DemandScoutError>;
}

/// JSON file backend. Writes go through a sibling temp file and rename so a
/// crash mid-write cannot corrupt the previous document.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<Option<String>, DemandScoutError> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&self.path)
            .map(Some)
            .map_err(|e| DemandScoutError::Ledger(format!("cannot read {}: {e}", self.path.display())))
    }

    fn save(&self, raw: &str) -> Result<(), DemandScoutError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    DemandScoutError::Ledger(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .map_err(|e| DemandScoutError::Ledger(format!("cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            DemandScoutError::Ledger(format!("cannot replace {}: {e}", self.path.display()))
        })
    }
}

pub struct PostingLedger {
    store: Box<dyn LedgerStore>,
    anon_id: String,
    records: BTreeMap<String, PostingRecord>,
}

impl std::fmt::Debug for PostingLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostingLedger")
            .field("anon_id", &self.anon_id)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl PostingLedger {
    /// Load the full document at run start. An unreadable or corrupt ledger
    /// is fatal: proceeding without it risks double-posting. A missing
    /// document means first run and starts empty.
    pub fn load(store: Box<dyn LedgerStore>) -> Result<Self, DemandScoutError> {
        match store.load()? {
            Some(raw) => {
                let doc: LedgerDocument = serde_json::from_str(&raw).map_err(|e| {
                    DemandScoutError::Ledger(format!("corrupt posting state, refusing to run: {e}"))
                })?;
                info!(entries = doc.records.len(), "Posting ledger loaded");
                Ok(Self {
                    store,
                    anon_id: doc.anon_id,
                    records: doc.records,
                })
            }
            None => {
                let anon_id = Uuid::new_v4().to_string();
                info!(%anon_id, "No posting ledger found, starting fresh");
                Ok(Self {
                    store,
                    anon_id,
                    records: BTreeMap::new(),
                })
            }
        }
    }

    /// Stable anonymous identity sent with every external post. Minted on
    /// first run, persisted with the ledger.
    pub fn anon_id(&self) -> &str {
        &self.anon_id
    }

    /// True iff a `posted` record exists for this id. Checked immediately
    /// before every post attempt, not just at run start.
    pub fn has_posted(&self, cluster_id: &str) -> bool {
        self.records
            .get(cluster_id)
            .is_some_and(|r| r.status == PostingStatus::Posted)
    }

    pub fn record_for(&self, cluster_id: &str) -> Option<&PostingRecord> {
        self.records.get(cluster_id)
    }

    pub fn posted_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.status == PostingStatus::Posted)
            .count()
    }

    /// Record an outcome for a cluster id and persist immediately, so a crash
    /// mid-run never loses an already-posted entry. A `posted` record is
    /// immutable; any attempt to overwrite one is ignored. `failed` records
    /// may transition to `posted` on a later attempt.
    pub fn record(
        &mut self,
        cluster_id: &str,
        status: PostingStatus,
        external_ref: Option<String>,
        run_id: &str,
    ) -> Result<(), DemandScoutError> {
        if self.has_posted(cluster_id) {
            warn!(cluster_id, %status, "Ignoring record for already-posted cluster");
            return Ok(());
        }
        self.records.insert(
            cluster_id.to_string(),
            PostingRecord {
                cluster_id: cluster_id.to_string(),
                status,
                external_ref,
                attempted_at: Utc::now(),
                run_id: run_id.to_string(),
            },
        );
        self.persist()
    }

    fn persist(&self) -> Result<(), DemandScoutError> {
        let doc = LedgerDocument {
            anon_id: self.anon_id.clone(),
            records: self.records.clone(),
        };
        let raw = serde_json::to_string_pretty(&doc)
            .map_err(|e| DemandScoutError::Ledger(format!("cannot serialize posting state: {e}")))?;
        self.store.save(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryLedgerStore;

    #[test]
    fn fresh_ledger_has_no_posts() {
        let ledger = PostingLedger::load(Box::new(MemoryLedgerStore::new())).unwrap();
        assert!(!ledger.has_posted("anything"));
        assert_eq!(ledger.posted_count(), 0);
    }

    #[test]
    fn posted_record_survives_reload() {
        let store = MemoryLedgerStore::new();
        {
            let mut ledger = PostingLedger::load(Box::new(store.clone())).unwrap();
            ledger
                .record("cluster-a", PostingStatus::Posted, Some("idea-1".to_string()), "run-1")
                .unwrap();
        }
        let ledger = PostingLedger::load(Box::new(store)).unwrap();
        assert!(ledger.has_posted("cluster-a"));
        assert_eq!(
            ledger.record_for("cluster-a").unwrap().external_ref.as_deref(),
            Some("idea-1")
        );
    }

    #[test]
    fn anon_id_is_stable_across_reloads() {
        let store = MemoryLedgerStore::new();
        let first = {
            let mut ledger = PostingLedger::load(Box::new(store.clone())).unwrap();
            ledger
                .record("cluster-a", PostingStatus::Failed, None, "run-1")
                .unwrap();
            ledger.anon_id().to_string()
        };
        let ledger = PostingLedger::load(Box::new(store)).unwrap();
        assert_eq!(ledger.anon_id(), first);
    }

    #[test]
    fn posted_record_is_immutable() {
        let mut ledger = PostingLedger::load(Box::new(MemoryLedgerStore::new())).unwrap();
        ledger
            .record("cluster-a", PostingStatus::Posted, Some("idea-1".to_string()), "run-1")
            .unwrap();
        ledger
            .record("cluster-a", PostingStatus::Failed, None, "run-2")
            .unwrap();
        let record = ledger.record_for("cluster-a").unwrap();
        assert_eq!(record.status, PostingStatus::Posted);
        assert_eq!(record.external_ref.as_deref(), Some("idea-1"));
        assert_eq!(ledger.posted_count(), 1);
    }

    #[test]
    fn failed_record_may_transition_to_posted() {
        let mut ledger = PostingLedger::load(Box::new(MemoryLedgerStore::new())).unwrap();
        ledger
            .record("cluster-a", PostingStatus::Failed, None, "run-1")
            .unwrap();
        assert!(!ledger.has_posted("cluster-a"));
        ledger
            .record("cluster-a", PostingStatus::Posted, Some("idea-2".to_string()), "run-2")
            .unwrap();
        assert!(ledger.has_posted("cluster-a"));
    }

    #[test]
    fn corrupt_document_is_fatal() {
        let store = MemoryLedgerStore::with_raw("{not json");
        let err = PostingLedger::load(Box::new(store)).unwrap_err();
        assert!(matches!(err, DemandScoutError::Ledger(_)));
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posting_state.json");
        {
            let store = JsonFileStore::new(&path);
            let mut ledger = PostingLedger::load(Box::new(store)).unwrap();
            ledger
                .record("cluster-a", PostingStatus::Posted, Some("idea-9".to_string()), "run-1")
                .unwrap();
        }
        let ledger = PostingLedger::load(Box::new(JsonFileStore::new(&path))).unwrap();
        assert!(ledger.has_posted("cluster-a"));
    }

    #[test]
    fn missing_file_is_a_fresh_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        let ledger = PostingLedger::load(Box::new(store)).unwrap();
        assert_eq!(ledger.posted_count(), 0);
    }
}
