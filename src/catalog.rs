//! Candidate catalog: centroids, volumes, and shape clouds per hemilineage.
//!
//! The catalog is the read-only side of the engine. The centroid table is a
//! small CSV loaded eagerly; volumes and dotprops are fetched per candidate
//! through the [`Catalog`] trait so backends can load them lazily from disk
//! or keep everything in memory.

use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::core::{Dotprops, Point3, VoxelVolume};
use crate::error::{MatchError, Result};

/// One catalog entry in the centroid table.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateCentroid {
    /// Hemilineage identifier (unique within a catalog).
    pub id: String,
    /// Mean cell body position in template space.
    pub centroid: Point3,
    /// Acceptance radius for centroid matching, in template units.
    pub match_radius: f32,
}

#[derive(Debug, Deserialize)]
struct CentroidRow {
    #[serde(rename = "ito_lee_hemilineage")]
    id: String,
    centroid_x: f32,
    centroid_y: f32,
    centroid_z: f32,
    #[serde(rename = "3*RMSE")]
    match_radius: f32,
}

const REQUIRED_COLUMNS: [&str; 5] = [
    "ito_lee_hemilineage",
    "centroid_x",
    "centroid_y",
    "centroid_z",
    "3*RMSE",
];

/// The centroid table: all candidate centroids with their acceptance radii.
#[derive(Clone, Debug, Default)]
pub struct CentroidTable {
    entries: Vec<CandidateCentroid>,
}

impl CentroidTable {
    /// Build a table from in-memory entries.
    pub fn from_entries(entries: Vec<CandidateCentroid>) -> Self {
        Self { entries }
    }

    /// Load a centroid table from a CSV file.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parse a centroid table from any CSV reader.
    ///
    /// The header row must contain all required columns; extra columns are
    /// ignored. A missing column is reported by name.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = csv.headers()?.clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|&&col| !headers.iter().any(|h| h == col))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(MatchError::InputValidation(format!(
                "centroid table is missing required columns: {}",
                missing.join(", ")
            )));
        }

        let mut entries = Vec::new();
        for row in csv.deserialize::<CentroidRow>() {
            let row = row.map_err(|e| {
                MatchError::InputValidation(format!("malformed centroid table row: {}", e))
            })?;
            entries.push(CandidateCentroid {
                id: row.id,
                centroid: Point3::new(row.centroid_x, row.centroid_y, row.centroid_z),
                match_radius: row.match_radius,
            });
        }
        Ok(Self { entries })
    }

    /// All entries, in table order.
    pub fn entries(&self) -> &[CandidateCentroid] {
        &self.entries
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read access to candidate data.
///
/// `shape(id, symmetric)` fetches the dotprops cloud for a candidate; when
/// `symmetric` is true the backend should return the midline-symmetrized
/// variant if it has one.
pub trait Catalog {
    /// All candidate identifiers, in catalog order.
    fn candidate_ids(&self) -> Vec<String>;

    /// The centroid table covering all candidates.
    fn centroid_table(&self) -> Result<CentroidTable>;

    /// The binary volume of one candidate.
    fn volume(&self, id: &str) -> Result<VoxelVolume>;

    /// The dotprops cloud of one candidate, symmetrized when available.
    fn shape(&self, id: &str, symmetric: bool) -> Result<Dotprops>;
}

/// In-memory catalog backend, used by tests and small datasets.
#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog {
    centroids: Vec<CandidateCentroid>,
    volumes: BTreeMap<String, VoxelVolume>,
    shapes: BTreeMap<String, Dotprops>,
    symmetric_shapes: BTreeMap<String, Dotprops>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate's centroid entry.
    pub fn insert_candidate(&mut self, id: &str, centroid: Point3, match_radius: f32) {
        self.centroids.push(CandidateCentroid {
            id: id.to_string(),
            centroid,
            match_radius,
        });
    }

    /// Attach a binary volume to a candidate.
    pub fn set_volume(&mut self, id: &str, volume: VoxelVolume) {
        self.volumes.insert(id.to_string(), volume);
    }

    /// Attach a dotprops cloud to a candidate. Symmetric variants are stored
    /// separately and preferred by `shape(id, true)`.
    pub fn set_shape(&mut self, id: &str, shape: Dotprops, symmetric: bool) {
        if symmetric {
            self.symmetric_shapes.insert(id.to_string(), shape);
        } else {
            self.shapes.insert(id.to_string(), shape);
        }
    }
}

impl Catalog for MemoryCatalog {
    fn candidate_ids(&self) -> Vec<String> {
        self.centroids.iter().map(|c| c.id.clone()).collect()
    }

    fn centroid_table(&self) -> Result<CentroidTable> {
        Ok(CentroidTable::from_entries(self.centroids.clone()))
    }

    fn volume(&self, id: &str) -> Result<VoxelVolume> {
        self.volumes
            .get(id)
            .cloned()
            .ok_or_else(|| MatchError::NotFound(format!("no volume for candidate '{}'", id)))
    }

    fn shape(&self, id: &str, symmetric: bool) -> Result<Dotprops> {
        if symmetric {
            if let Some(shape) = self.symmetric_shapes.get(id) {
                return Ok(shape.clone());
            }
        }
        self.shapes
            .get(id)
            .cloned()
            .ok_or_else(|| MatchError::NotFound(format!("no shape for candidate '{}'", id)))
    }
}
