//! Per-question performance history and its durable store.
//!
//! The store is the only state shared between clients. Every write re-reads
//! the backing table under the store lock, applies the outcomes and persists
//! the whole table, so two completions never overwrite each other.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::selector::{classify, Tier};

/// Length of the rolling outcome window.
pub const RECENT_WINDOW: usize = 5;

/// Historical performance of a single question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    #[serde(default)]
    pub total_attempts: u32,
    #[serde(default)]
    pub correct_attempts: u32,
    #[serde(default)]
    pub incorrect_attempts: u32,
    /// `correct_attempts / total_attempts`, 0 when there are no attempts.
    #[serde(default)]
    pub success_rate: f64,
    /// Most recent outcome last, at most [`RECENT_WINDOW`] entries.
    #[serde(default)]
    pub recent_outcomes: Vec<bool>,
    /// Fields written by other versions, kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PerformanceRecord {
    /// Fold one graded attempt into the record.
    pub fn apply(&mut self, was_correct: bool) {
        self.total_attempts += 1;
        if was_correct {
            self.correct_attempts += 1;
        } else {
            self.incorrect_attempts += 1;
        }
        self.recent_outcomes.push(was_correct);
        if self.recent_outcomes.len() > RECENT_WINDOW {
            let overflow = self.recent_outcomes.len() - RECENT_WINDOW;
            self.recent_outcomes.drain(..overflow);
        }
        self.success_rate = self.correct_attempts as f64 / self.total_attempts as f64;
    }

    /// Whether the last `n` outcomes exist and all equal `value`.
    pub fn last_n_all(&self, n: usize, value: bool) -> bool {
        self.recent_outcomes.len() >= n
            && self.recent_outcomes[self.recent_outcomes.len() - n..]
                .iter()
                .all(|&o| o == value)
    }
}

/// Flat mapping of question id to record, as persisted.
pub type StatsTable = BTreeMap<String, PerformanceRecord>;

/// One graded answer to feed back into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question_id: String,
    pub correct: bool,
}

/// Durable key-value backing for the full record table.
pub trait StatsBackend: Send + Sync {
    /// Read the whole table. A backing that does not exist yet is empty.
    fn load(&self) -> Result<StatsTable, StorageError>;

    /// Replace the whole table durably.
    fn persist(&self, table: &StatsTable) -> Result<(), StorageError>;
}

/// JSON file backing, replaced atomically on every persist.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatsBackend for JsonFileBackend {
    fn load(&self) -> Result<StatsTable, StorageError> {
        if !self.path.exists() {
            return Ok(StatsTable::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| StorageError::Read {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(StatsTable::new());
        }
        serde_json::from_str(&content).map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self, table: &StatsTable) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(table)?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let write_err = |source: std::io::Error| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// In-memory backing for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    table: Mutex<StatsTable>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: StatsTable) -> Self {
        Self {
            table: Mutex::new(table),
        }
    }
}

impl StatsBackend for MemoryBackend {
    fn load(&self) -> Result<StatsTable, StorageError> {
        self.table
            .lock()
            .map(|t| t.clone())
            .map_err(|_| StorageError::Poisoned("memory backend"))
    }

    fn persist(&self, table: &StatsTable) -> Result<(), StorageError> {
        let mut guard = self
            .table
            .lock()
            .map_err(|_| StorageError::Poisoned("memory backend"))?;
        *guard = table.clone();
        Ok(())
    }
}

/// The statistics store: a lazily loaded cache over a [`StatsBackend`].
pub struct StatisticsStore {
    backend: Box<dyn StatsBackend>,
    cache: Mutex<Option<StatsTable>>,
}

impl StatisticsStore {
    pub fn new(backend: impl StatsBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            cache: Mutex::new(None),
        }
    }

    /// Store backed by a JSON file at `path`.
    pub fn open_json(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileBackend::new(path))
    }

    /// Store backed by memory only.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Record for `id`, if it has ever been graded.
    pub fn get(&self, id: &str) -> Result<Option<PerformanceRecord>, StorageError> {
        self.with_cache(|table| table.get(id).cloned())
    }

    /// A consistent copy of the whole table.
    pub fn snapshot(&self) -> Result<StatsTable, StorageError> {
        self.with_cache(|table| table.clone())
    }

    /// Grade a single attempt and persist before returning.
    pub fn record(&self, id: &str, was_correct: bool) -> Result<PerformanceRecord, StorageError> {
        let updated = self.record_all(&[GradedAnswer {
            question_id: id.to_string(),
            correct: was_correct,
        }])?;
        Ok(updated.into_iter().next().unwrap_or_default())
    }

    /// Grade a batch of attempts with a single durable write.
    ///
    /// Returns the updated record after each answer, in input order.
    pub fn record_all(
        &self,
        answers: &[GradedAnswer],
    ) -> Result<Vec<PerformanceRecord>, StorageError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| StorageError::Poisoned("statistics"))?;

        // Re-read so writers sharing the backing do not lose updates.
        let mut table = self.backend.load()?;
        let mut updated = Vec::with_capacity(answers.len());
        for answer in answers {
            let record = table.entry(answer.question_id.clone()).or_default();
            record.apply(answer.correct);
            updated.push(record.clone());
        }

        self.persist_with_retry(&table)?;
        tracing::debug!("recorded {} graded answers", answers.len());
        *cache = Some(table);
        Ok(updated)
    }

    /// Per-tier counts over every question that has a record.
    pub fn tier_summary(&self) -> Result<TierSummary, StorageError> {
        self.with_cache(|table| {
            let mut summary = TierSummary::default();
            for record in table.values() {
                match classify(Some(record)) {
                    Tier::Difficult => summary.difficult += 1,
                    Tier::Normal => summary.normal += 1,
                    Tier::Mastered => summary.mastered += 1,
                }
            }
            summary
        })
    }

    /// The `limit` weakest questions: lowest success rate first, then most
    /// attempts, then id.
    pub fn weakest(
        &self,
        limit: usize,
    ) -> Result<Vec<(String, PerformanceRecord)>, StorageError> {
        self.with_cache(|table| {
            let mut rows: Vec<(String, PerformanceRecord)> = table
                .iter()
                .filter(|(_, r)| r.total_attempts > 0)
                .map(|(id, r)| (id.clone(), r.clone()))
                .collect();
            rows.sort_by(|(a_id, a), (b_id, b)| {
                a.success_rate
                    .total_cmp(&b.success_rate)
                    .then(b.total_attempts.cmp(&a.total_attempts))
                    .then(a_id.cmp(b_id))
            });
            rows.truncate(limit);
            rows
        })
    }

    fn with_cache<T>(&self, f: impl FnOnce(&StatsTable) -> T) -> Result<T, StorageError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| StorageError::Poisoned("statistics"))?;
        if cache.is_none() {
            *cache = Some(self.backend.load()?);
        }
        match cache.as_ref() {
            Some(table) => Ok(f(table)),
            None => Err(StorageError::Poisoned("statistics")),
        }
    }

    fn persist_with_retry(&self, table: &StatsTable) -> Result<(), StorageError> {
        match self.backend.persist(table) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!("statistics write failed, retrying once: {e}");
                self.backend.persist(table)
            }
        }
    }
}

/// Number of recorded questions in each tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSummary {
    pub difficult: usize,
    pub normal: usize,
    pub mastered: usize,
}
