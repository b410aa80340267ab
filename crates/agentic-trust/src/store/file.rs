//! Filesystem-backed attestation store.
//!
//! Stores records as versioned JSON files under a directory tree:
//!
//! ```text
//! {base_dir}/
//! ├── genesis/          — genesis records
//! ├── attestations/     — capability attestations
//! ├── constraints/      — constraint records
//! ├── delegations/      — delegation records
//! ├── revocations/      — terminal revocation records
//! └── anchors/          — audit anchors
//! ```
//!
//! File format:
//! ```json
//! { "version": 1, "record": { ... StoredRecord ... } }
//! ```
//!
//! Every operation runs under an optional per-op timeout budget; an
//! exceeded budget is reported as `TrustError::Timeout`, never as a
//! denial or a missing record.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustError};
use crate::record::{AgentId, DelegationRecord, StoredRecord};

use super::AttestationStore;

// ── File format constants ─────────────────────────────────────────────────────

const RECORD_FILE_VERSION: u32 = 1;

const KIND_DIRS: &[&str] = &[
    "genesis",
    "attestations",
    "constraints",
    "delegations",
    "revocations",
    "anchors",
];

/// Wrapper written to disk for each record.
#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    /// Format version number.
    version: u32,
    /// The stored record.
    record: StoredRecord,
}

// ── FileStore ─────────────────────────────────────────────────────────────────

/// Versioned-JSON directory store, one file per record.
pub struct FileStore {
    base_dir: PathBuf,
    op_timeout: Option<Duration>,
}

impl FileStore {
    /// Create a `FileStore` rooted at `base_dir`, creating the kind
    /// sub-directories if needed.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Io` if any directory cannot be created.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        for dir in KIND_DIRS {
            std::fs::create_dir_all(base_dir.join(dir))?;
        }
        Ok(Self {
            base_dir,
            op_timeout: None,
        })
    }

    /// Set a per-operation time budget.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    fn kind_dir(kind: &str) -> &'static str {
        match kind {
            "genesis" => "genesis",
            "attestation" => "attestations",
            "constraint" => "constraints",
            "delegation" => "delegations",
            "revocation" => "revocations",
            _ => "anchors",
        }
    }

    fn record_path(&self, kind: &str, id: &str) -> PathBuf {
        self.base_dir
            .join(Self::kind_dir(kind))
            .join(format!("{id}.json"))
    }

    fn check_budget(&self, started: Instant) -> Result<()> {
        if let Some(budget) = self.op_timeout {
            if started.elapsed() > budget {
                return Err(TrustError::Timeout(budget));
            }
        }
        Ok(())
    }

    fn read_record(path: &Path) -> Result<StoredRecord> {
        let bytes = std::fs::read(path)?;
        let file: RecordFile = serde_json::from_slice(&bytes).map_err(|e| {
            TrustError::InvalidFileFormat(format!(
                "failed to parse record file {}: {e}",
                path.display()
            ))
        })?;
        Ok(file.record)
    }

    /// Scan every kind directory, applying `visit` to each record.
    fn scan(&self, started: Instant, mut visit: impl FnMut(StoredRecord)) -> Result<()> {
        for dir in KIND_DIRS {
            let dir_path = self.base_dir.join(dir);
            for entry in std::fs::read_dir(&dir_path)? {
                self.check_budget(started)?;
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    visit(Self::read_record(&path)?);
                }
            }
        }
        Ok(())
    }
}

impl AttestationStore for FileStore {
    fn put(&self, record: StoredRecord) -> Result<String> {
        let started = Instant::now();
        let id = record.id().to_string();
        let path = self.record_path(record.kind(), &id);

        if path.exists() {
            let existing = Self::read_record(&path)?;
            if existing.record_hash() == record.record_hash() {
                return Ok(id);
            }
            return Err(TrustError::StoreUnavailable(format!(
                "content address collision for {id}"
            )));
        }

        let file = RecordFile {
            version: RECORD_FILE_VERSION,
            record,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| TrustError::SerializationError(e.to_string()))?;
        std::fs::write(&path, json.as_bytes())?;

        self.check_budget(started)?;
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let started = Instant::now();
        for dir in KIND_DIRS {
            self.check_budget(started)?;
            let path = self.base_dir.join(dir).join(format!("{id}.json"));
            if path.exists() {
                return Ok(Some(Self::read_record(&path)?));
            }
        }
        Ok(None)
    }

    fn list_by_agent(&self, agent_id: &AgentId) -> Result<Vec<StoredRecord>> {
        let started = Instant::now();
        let mut out = Vec::new();
        self.scan(started, |record| {
            if record.agent_ids().contains(&agent_id) {
                out.push(record);
            }
        })?;
        Ok(out)
    }

    fn list_delegations_by_delegator(&self, agent_id: &AgentId) -> Result<Vec<DelegationRecord>> {
        let started = Instant::now();
        let mut out = Vec::new();
        let dir_path = self.base_dir.join("delegations");
        for entry in std::fs::read_dir(&dir_path)? {
            self.check_budget(started)?;
            let entry = entry?;
            if let StoredRecord::Delegation(d) = Self::read_record(&entry.path())? {
                if &d.delegator_id == agent_id {
                    out.push(d);
                }
            }
        }
        Ok(out)
    }

    fn list_delegations_by_delegatee(&self, agent_id: &AgentId) -> Result<Vec<DelegationRecord>> {
        let started = Instant::now();
        let mut out = Vec::new();
        let dir_path = self.base_dir.join("delegations");
        for entry in std::fs::read_dir(&dir_path)? {
            self.check_budget(started)?;
            let entry = entry?;
            if let StoredRecord::Delegation(d) = Self::read_record(&entry.path())? {
                if &d.delegatee_id == agent_id {
                    out.push(d);
                }
            }
        }
        Ok(out)
    }
}
