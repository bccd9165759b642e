//! Canonical feature extraction.
//!
//! Turns a harmonized `RawTable` into canonical feature vectors:
//!
//! 1. numeric coercion per canonical feature (failures become null, never errors)
//! 2. `flux_mean` / `flux_std` from a flux-like column when present, else 0
//! 3. completeness filter: rows without `orbital_period` or `planet_radius` are dropped
//! 4. the disposition-like column, if any, is carried through raw for labeling
//!
//! Note on flux: both `flux_mean` and `flux_std` are set to the same coerced,
//! zero-filled per-row flux value. They are not true statistics; downstream
//! artifacts depend on this shape, so it is kept as-is.

use log::debug;

use crate::catalog::harmonize::{ColumnMapping, Field};
use crate::domain::CanonicalFeatureVector;
use crate::io::ingest::RawTable;

/// One extracted row. `features.label` is unset until labeling.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    /// Index of the row in the (cleaned) input table.
    pub source_row: usize,
    /// Identifier from the first resolvable id column, else the row index.
    pub id: String,
    pub features: CanonicalFeatureVector,
    /// Disposition cell exactly as found in the input.
    pub raw_label: Option<String>,
}

/// Output of extraction over one table.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFrame {
    pub rows: Vec<ExtractedRow>,
    pub mapping: ColumnMapping,
    /// Rows dropped by the completeness filter.
    pub dropped: usize,
}

impl ExtractedFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Extract canonical features from `table`.
pub fn extract_features(table: &RawTable) -> ExtractedFrame {
    let mapping = ColumnMapping::for_table(table);

    let period_idx = mapping.index(Field::OrbitalPeriod);
    let radius_idx = mapping.index(Field::PlanetRadius);
    let duration_idx = mapping.index(Field::TransitDuration);
    let flux_idx = mapping.index(Field::Flux);
    let label_idx = mapping.index(Field::Label);
    let id_idx = mapping.index(Field::RowId);

    let numeric = |row: usize, idx: Option<usize>| idx.and_then(|i| coerce_f64(table.cell(row, i)));

    let mut rows = Vec::with_capacity(table.len());
    let mut dropped = 0usize;

    for r in 0..table.len() {
        let (Some(orbital_period), Some(planet_radius)) = (numeric(r, period_idx), numeric(r, radius_idx)) else {
            dropped += 1;
            continue;
        };

        let flux = match flux_idx {
            Some(i) => coerce_f64(table.cell(r, i)).unwrap_or(0.0),
            None => 0.0,
        };

        let id = id_idx
            .and_then(|i| table.cell(r, i))
            .map(str::to_string)
            .unwrap_or_else(|| r.to_string());

        rows.push(ExtractedRow {
            source_row: r,
            id,
            features: CanonicalFeatureVector {
                orbital_period,
                planet_radius,
                transit_duration: numeric(r, duration_idx),
                flux_mean: flux,
                flux_std: flux,
                label: None,
            },
            raw_label: label_idx.and_then(|i| table.cell(r, i)).map(str::to_string),
        });
    }

    debug!(
        "extracted {} rows ({} dropped for missing period/radius)",
        rows.len(),
        dropped
    );

    ExtractedFrame {
        rows,
        mapping,
        dropped,
    }
}

/// Lenient numeric coercion: anything unparseable or non-finite is null.
pub fn coerce_f64(cell: Option<&str>) -> Option<f64> {
    let v = cell?.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
