//! Resumable output log.
//!
//! The log is a single JSON array of [`ClusterResult`]s. It is rewritten in
//! full after every append so an interrupted run loses at most the cluster
//! in flight.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use ekimae_shared::{ClusterResult, EkimaeError, Result};

/// Durable store of finished clusters.
pub trait ProgressLog {
    /// Every record persisted so far, in append order.
    fn load(&self) -> Result<Vec<ClusterResult>>;

    /// Persist one more record. An error here must stop the run.
    fn append(&mut self, result: &ClusterResult) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JSON file log
// ---------------------------------------------------------------------------

/// [`ProgressLog`] backed by one pretty-printed JSON file.
#[derive(Debug)]
pub struct JsonFileLog {
    path: PathBuf,
    records: Vec<ClusterResult>,
}

impl JsonFileLog {
    /// Open `path`, reading existing records. A missing file is an empty log;
    /// an unreadable one is an error so earlier progress is never overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| EkimaeError::io(&path, e))?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    EkimaeError::validation(format!(
                        "output log {} is not a JSON array of results: {e}",
                        path.display()
                    ))
                })?
            }
        } else {
            Vec::new()
        };

        info!(path = %path.display(), records = records.len(), "output log opened");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| EkimaeError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&self.records).map_err(|e| {
            EkimaeError::validation(format!("JSON serialization failed: {e}"))
        })?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "log".to_string());
        let temp = self.path.with_file_name(format!(".{file_name}.tmp"));

        std::fs::write(&temp, json).map_err(|e| EkimaeError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| EkimaeError::io(&self.path, e))?;

        debug!(path = %self.path.display(), records = self.records.len(), "output log written");
        Ok(())
    }
}

impl ProgressLog for JsonFileLog {
    fn load(&self) -> Result<Vec<ClusterResult>> {
        Ok(self.records.clone())
    }

    fn append(&mut self, result: &ClusterResult) -> Result<()> {
        self.records.push(result.clone());
        if let Err(e) = self.persist() {
            self.records.pop();
            return Err(e);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory log
// ---------------------------------------------------------------------------

/// [`ProgressLog`] kept in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    records: Vec<ClusterResult>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ClusterResult>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ClusterResult] {
        &self.records
    }
}

impl ProgressLog for MemoryLog {
    fn load(&self) -> Result<Vec<ClusterResult>> {
        Ok(self.records.clone())
    }

    fn append(&mut self, result: &ClusterResult) -> Result<()> {
        self.records.push(result.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// Which clusters are done, and their results in completion order.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    processed: HashSet<String>,
    results: Vec<ClusterResult>,
}

impl PipelineState {
    /// Rebuild state from persisted records.
    pub fn from_records(records: Vec<ClusterResult>) -> Self {
        let mut state = Self::default();
        for record in records {
            state.record(record);
        }
        state
    }

    pub fn is_processed(&self, cluster_id: &str) -> bool {
        self.processed.contains(cluster_id)
    }

    /// Mark a cluster done. A cluster already present is not added twice.
    pub fn record(&mut self, result: ClusterResult) {
        if self.processed.insert(result.cluster_id.clone()) {
            self.results.push(result);
        }
    }

    pub fn results(&self) -> &[ClusterResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
