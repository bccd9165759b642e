//! Per-source preparation and dataset combination.
//!
//! For each source: load → drop all-null rows → extract → label → keep labeled
//! rows. The combiner then concatenates every source that produced at least
//! one row, tags rows with their source name, and freezes per-source counts.
//! An empty result is fatal: nothing downstream is meaningful on zero rows.

use log::{info, warn};

use crate::catalog::extract::{ExtractedRow, extract_features};
use crate::catalog::label::apply_labels;
use crate::domain::{Dataset, LabelCompleteness, LabeledRow, SourceCounts, SourceSpec, SourceSummary};
use crate::error::AppError;
use crate::io::ingest::{RawTable, load_csv};

/// One source after extraction and labeling.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub name: String,
    pub completeness: LabelCompleteness,
    pub counts: SourceCounts,
    /// Labeled rows only.
    pub rows: Vec<LabeledRow>,
}

/// Run cleaning, extraction and labeling over an already-loaded table.
pub fn prepare_source(name: &str, completeness: LabelCompleteness, table: RawTable) -> SourceFrame {
    let raw = table.len();
    let cleaned = table.drop_all_null_rows();
    let cleaned_len = cleaned.len();

    let extracted = extract_features(&cleaned);
    let labeled = apply_labels(completeness, extracted.rows);
    let unlabeled = labeled.iter().filter(|r| r.features.label.is_none()).count();
    if unlabeled > 0 {
        info!("{name}: {unlabeled} rows without a usable disposition excluded from training");
    }

    let rows: Vec<LabeledRow> = labeled.into_iter().filter_map(|r| to_labeled(name, r)).collect();
    let positive = rows.iter().filter(|r| r.label == 1).count();

    SourceFrame {
        name: name.to_string(),
        completeness,
        counts: SourceCounts {
            raw,
            cleaned: cleaned_len,
            final_count: rows.len(),
            positive,
            negative: rows.len() - positive,
        },
        rows,
    }
}

fn to_labeled(source: &str, row: ExtractedRow) -> Option<LabeledRow> {
    let label = row.features.label?;
    Some(LabeledRow {
        source: source.to_string(),
        features: row.features,
        label,
    })
}

/// Load and prepare one source from disk.
///
/// A missing optional file yields `Ok(None)`; a missing required file or an
/// unparseable file is an error.
pub fn load_source(spec: &SourceSpec) -> Result<Option<SourceFrame>, AppError> {
    if !spec.path.exists() {
        if spec.required {
            return Err(AppError::input(format!(
                "Required source '{}' not found at {}",
                spec.name,
                spec.path.display()
            )));
        }
        warn!("{}: no file at {} (optional, skipped)", spec.name, spec.path.display());
        return Ok(None);
    }

    let table = load_csv(&spec.path)?;
    let frame = prepare_source(&spec.name, spec.completeness, table);
    info!(
        "{}: raw={} cleaned={} final={} (+{} / -{})",
        frame.name,
        frame.counts.raw,
        frame.counts.cleaned,
        frame.counts.final_count,
        frame.counts.positive,
        frame.counts.negative
    );
    Ok(Some(frame))
}

/// Concatenate source frames into one tagged dataset.
pub fn combine(frames: Vec<SourceFrame>) -> Result<Dataset, AppError> {
    let mut rows = Vec::new();
    let mut sources = Vec::with_capacity(frames.len());

    for frame in frames {
        if frame.rows.is_empty() {
            warn!("{}: no usable rows after cleaning; continuing without it", frame.name);
        }
        sources.push(SourceSummary {
            name: frame.name,
            completeness: frame.completeness,
            counts: frame.counts,
        });
        rows.extend(frame.rows);
    }

    if rows.is_empty() {
        return Err(AppError::empty(
            "Combined dataset is empty: no source contributed usable labeled rows.",
        ));
    }

    let dataset = Dataset { rows, sources };
    info!(
        "combined dataset: {} rows ({} positive, {} negative)",
        dataset.len(),
        dataset.positives(),
        dataset.negatives()
    );
    Ok(dataset)
}

/// Load every source and combine them.
pub fn load_dataset(specs: &[SourceSpec]) -> Result<Dataset, AppError> {
    let mut frames = Vec::with_capacity(specs.len());
    for spec in specs {
        if let Some(frame) = load_source(spec)? {
            frames.push(frame);
        }
    }
    combine(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::io::ingest::parse_csv;

    fn frame(name: &str, completeness: LabelCompleteness, csv: &str) -> SourceFrame {
        prepare_source(name, completeness, parse_csv(csv).unwrap())
    }

    #[test]
    fn counts_track_each_stage() {
        let f = frame(
            "Kepler",
            LabelCompleteness::Full,
            "koi_period,koi_prad,koi_disposition\n1,1,CONFIRMED\n,,\n2,,CANDIDATE\n3,3,FALSE POSITIVE\n4,4,NOT DISPOSITIONED\n",
        );
        assert_eq!(
            f.counts,
            SourceCounts {
                raw: 5,
                cleaned: 4,
                final_count: 2,
                positive: 1,
                negative: 1
            }
        );
    }

    #[test]
    fn combine_tags_rows_and_keeps_order() {
        let kepler = frame(
            "Kepler",
            LabelCompleteness::Full,
            "koi_period,koi_prad,koi_disposition\n1,1,CONFIRMED\n3,3,FALSE POSITIVE\n",
        );
        let tess = frame("TESS", LabelCompleteness::PositiveOnly, "pl_orbper,pl_rade\n5,5\n");
        let ds = combine(vec![kepler, tess]).unwrap();
        let tags: Vec<&str> = ds.rows.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(tags, vec!["Kepler", "Kepler", "TESS"]);
        assert_eq!(ds.labels(), vec![1, 0, 1]);
        let counts = ds.counts_by_source();
        assert_eq!(counts["TESS"].positive, 1);
        assert_eq!(counts["TESS"].negative, 0);
    }

    #[test]
    fn empty_source_is_tolerated_when_another_has_rows() {
        let empty = frame("K2", LabelCompleteness::PositiveOnly, "pl_orbper,pl_rade\n,1\n");
        let tess = frame("TESS", LabelCompleteness::PositiveOnly, "pl_orbper,pl_rade\n5,5\n");
        let ds = combine(vec![empty, tess]).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.sources.len(), 2);
        assert_eq!(ds.counts_by_source()["K2"].final_count, 0);
    }

    #[test]
    fn all_sources_empty_is_fatal() {
        let frames = vec![
            frame("Kepler", LabelCompleteness::Full, "koi_period,koi_prad,koi_disposition\n,1,CONFIRMED\n"),
            frame("K2", LabelCompleteness::PositiveOnly, "pl_orbper,pl_rade\n1,\n"),
            frame("TESS", LabelCompleteness::PositiveOnly, "pl_orbper,pl_rade\n"),
        ];
        let err = combine(frames).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyDataset);
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_optional_file_is_skipped_and_required_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let optional = SourceSpec {
            name: "K2".into(),
            path: dir.path().join("k2.csv"),
            completeness: LabelCompleteness::PositiveOnly,
            required: false,
        };
        assert!(load_source(&optional).unwrap().is_none());

        let required = SourceSpec {
            required: true,
            ..optional
        };
        assert_eq!(load_source(&required).unwrap_err().kind(), ErrorKind::Input);
    }

    #[test]
    fn load_dataset_reads_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kepler.csv");
        std::fs::write(
            &path,
            "# comment\nkoi_period,koi_prad,koi_disposition\n10.5,2.3,CONFIRMED\n1.2,0.9,FALSE POSITIVE\n",
        )
        .unwrap();
        let specs = vec![SourceSpec {
            name: "Kepler".into(),
            path,
            completeness: LabelCompleteness::Full,
            required: true,
        }];
        let ds = load_dataset(&specs).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.negatives(), 1);
    }
}
