//! Persistent CSV ledger of match scores and review verdicts.
//!
//! The ledger keeps one row per catalog candidate, keyed by hemilineage
//! identifier. Loading merges stored rows with the current catalog: every
//! catalog id gets a row (defaulting to unscored), stored rows whose id no
//! longer exists in the catalog are dropped with a warning. Saving writes
//! to a temporary sibling file and renames it into place so a crash cannot
//! truncate an existing ledger.

pub mod record;

use csv::{ReaderBuilder, Writer};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{Read, Write as IoWrite};
use std::path::Path;

use crate::error::{MatchError, Result};

pub use record::{parse_centroid_tuple, ReviewStatus, ScoreRecord, UNSET_SCORE};

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    #[serde(rename = "Hemilineage")]
    hemilineage: String,
    query_centroid: String,
    time_stamp: String,
    voxel_score: f32,
    nblast_score: f32,
    status: ReviewStatus,
    threshold: f32,
}

const REQUIRED_COLUMNS: [&str; 7] = [
    "Hemilineage",
    "query_centroid",
    "time_stamp",
    "voxel_score",
    "nblast_score",
    "status",
    "threshold",
];

/// The score ledger: one record per catalog candidate.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    records: BTreeMap<String, ScoreRecord>,
}

impl Ledger {
    /// Create a fresh ledger with a default (unscored) record per id.
    pub fn create_empty(ids: &[String]) -> Self {
        let records = ids
            .iter()
            .map(|id| (id.clone(), ScoreRecord::default()))
            .collect();
        Self { records }
    }

    /// Read a ledger from CSV, merging stored rows with the catalog ids.
    ///
    /// The header row must contain all required columns. Malformed data
    /// rows are skipped with a warning; rows for ids absent from `ids` are
    /// dropped with a warning; ids without a stored row get a default
    /// record.
    pub fn read_from<R: Read>(reader: R, ids: &[String]) -> Result<Self> {
        let mut csv = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = csv.headers()?.clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|&&col| !headers.iter().any(|h| h == col))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(MatchError::InputValidation(format!(
                "ledger is missing required columns: {}",
                missing.join(", ")
            )));
        }

        let mut stored: BTreeMap<String, ScoreRecord> = BTreeMap::new();
        for row in csv.deserialize::<LedgerRow>() {
            match row {
                Ok(row) => {
                    let mut query_centroid = row.query_centroid;
                    if !query_centroid.is_empty() {
                        if let Err(e) = parse_centroid_tuple(&query_centroid) {
                            warn!(
                                "[ledger] discarding stored centroid for '{}': {}",
                                row.hemilineage, e
                            );
                            query_centroid.clear();
                        }
                    }
                    stored.insert(
                        row.hemilineage,
                        ScoreRecord {
                            voxel_score: row.voxel_score,
                            nblast_score: row.nblast_score,
                            query_centroid,
                            time_stamp: row.time_stamp,
                            status: row.status,
                            threshold: row.threshold,
                        },
                    );
                }
                Err(e) => {
                    warn!("[ledger] skipping malformed row: {}", e);
                }
            }
        }

        let mut records = BTreeMap::new();
        for id in ids {
            let record = stored.remove(id).unwrap_or_default();
            records.insert(id.clone(), record);
        }
        for id in stored.keys() {
            warn!("[ledger] dropping row for unknown candidate '{}'", id);
        }

        Ok(Self { records })
    }

    /// Load a ledger file, merging with the catalog ids.
    pub fn load<P: AsRef<Path>>(path: P, ids: &[String]) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_from(file, ids)
    }

    /// Load a ledger file, falling back to a fresh ledger on any error.
    ///
    /// Used when opening a session: a missing or corrupt ledger should not
    /// block new work.
    pub fn load_or_empty<P: AsRef<Path>>(path: P, ids: &[String]) -> Self {
        match Self::load(path.as_ref(), ids) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(
                    "[ledger] could not load '{}', starting fresh: {}",
                    path.as_ref().display(),
                    e
                );
                Self::create_empty(ids)
            }
        }
    }

    /// Write the ledger as CSV.
    pub fn write_to<W: IoWrite>(&self, writer: W) -> Result<()> {
        let mut csv = Writer::from_writer(writer);
        for (id, record) in &self.records {
            csv.serialize(LedgerRow {
                hemilineage: id.clone(),
                query_centroid: record.query_centroid.clone(),
                time_stamp: record.time_stamp.clone(),
                voxel_score: record.voxel_score,
                nblast_score: record.nblast_score,
                status: record.status,
                threshold: record.threshold,
            })?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Save the ledger to a file.
    ///
    /// Writes a temporary sibling first and renames it over the target, so
    /// an interrupted save leaves the previous file intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");

        {
            let file = std::fs::File::create(&tmp)?;
            self.write_to(file)?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// The record for one candidate, if the id is known.
    pub fn get(&self, id: &str) -> Option<&ScoreRecord> {
        self.records.get(id)
    }

    /// Whether a candidate needs (re)scoring at the current threshold.
    /// Unknown ids are treated as stale.
    pub fn is_stale(&self, id: &str, current_threshold: f32) -> bool {
        match self.records.get(id) {
            Some(record) => record.is_stale(current_threshold),
            None => true,
        }
    }

    /// Record newly computed scores for a candidate.
    ///
    /// Only the scores actually provided are overwritten; the other score
    /// keeps its stored value. When any score is written the centroid,
    /// timestamp and threshold are refreshed. The review status is never
    /// touched here: verdicts change only through
    /// [`Ledger::set_review_status`].
    pub fn upsert_scores(
        &mut self,
        id: &str,
        voxel_score: Option<f32>,
        nblast_score: Option<f32>,
        threshold: f32,
        query_centroid: &str,
        time_stamp: &str,
    ) -> Result<()> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| MatchError::NotFound(format!("candidate '{}' is not in the ledger", id)))?;

        if voxel_score.is_none() && nblast_score.is_none() {
            return Ok(());
        }

        if let Some(v) = voxel_score {
            record.voxel_score = v;
        }
        if let Some(n) = nblast_score {
            record.nblast_score = n;
        }
        record.threshold = threshold;
        record.query_centroid = query_centroid.to_string();
        record.time_stamp = time_stamp.to_string();
        Ok(())
    }

    /// Set the review verdict for a candidate.
    pub fn set_review_status(&mut self, id: &str, status: ReviewStatus) -> Result<()> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| MatchError::NotFound(format!("candidate '{}' is not in the ledger", id)))?;
        record.status = status;
        Ok(())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ledger has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over (id, record) pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScoreRecord)> {
        self.records.iter()
    }
}
