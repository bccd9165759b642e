//! Per-source data-quality diagnostics.
//!
//! Answers "why did this source contribute so few rows?": which columns were
//! resolved, how many values parse, what the disposition vocabulary looks like,
//! and how many rows survive each stage.

use std::collections::BTreeMap;

use crate::catalog::{ColumnMapping, Field, coerce_f64, prepare_source};
use crate::domain::{LabelCompleteness, SourceCounts};
use crate::io::ingest::RawTable;

/// Numeric coverage of one resolved canonical field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCoverage {
    pub field: Field,
    pub column: Option<String>,
    pub valid: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceDiagnostic {
    pub name: String,
    pub completeness: LabelCompleteness,
    pub n_rows: usize,
    pub n_columns: usize,
    pub coverage: Vec<FieldCoverage>,
    pub label_column: Option<String>,
    pub id_column: Option<String>,
    /// Raw disposition values (trimmed, as found) with their counts.
    pub dispositions: BTreeMap<String, usize>,
    pub counts: SourceCounts,
}

const NUMERIC_FIELDS: [Field; 4] = [
    Field::OrbitalPeriod,
    Field::PlanetRadius,
    Field::TransitDuration,
    Field::Flux,
];

pub fn diagnose_table(name: &str, completeness: LabelCompleteness, table: &RawTable) -> SourceDiagnostic {
    let mapping = ColumnMapping::for_table(table);

    let coverage = NUMERIC_FIELDS
        .iter()
        .map(|&field| {
            let Some(idx) = mapping.index(field) else {
                return FieldCoverage {
                    field,
                    column: None,
                    valid: 0,
                    missing: table.len(),
                    min: None,
                    max: None,
                };
            };
            let values: Vec<f64> = (0..table.len())
                .filter_map(|r| coerce_f64(table.cell(r, idx)))
                .collect();
            FieldCoverage {
                field,
                column: mapping.column(field).map(str::to_string),
                valid: values.len(),
                missing: table.len() - values.len(),
                min: values.iter().copied().reduce(f64::min),
                max: values.iter().copied().reduce(f64::max),
            }
        })
        .collect();

    let mut dispositions = BTreeMap::new();
    if let Some(idx) = mapping.index(Field::Label) {
        for r in 0..table.len() {
            let value = table.cell(r, idx).unwrap_or("<null>").to_string();
            *dispositions.entry(value).or_insert(0) += 1;
        }
    }

    let counts = prepare_source(name, completeness, table.clone()).counts;

    SourceDiagnostic {
        name: name.to_string(),
        completeness,
        n_rows: table.len(),
        n_columns: table.headers.len(),
        coverage,
        label_column: mapping.column(Field::Label).map(str::to_string),
        id_column: mapping.column(Field::RowId).map(str::to_string),
        dispositions,
        counts,
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "-".to_string())
}

pub fn format_diagnostic(d: &SourceDiagnostic) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== {} ({}) ===\n",
        d.name,
        d.completeness.as_str()
    ));
    out.push_str(&format!("Shape: {} rows x {} columns\n", d.n_rows, d.n_columns));
    out.push_str(&format!(
        "Id column: {} | Disposition column: {}\n\n",
        d.id_column.as_deref().unwrap_or("(none)"),
        d.label_column.as_deref().unwrap_or("(none)")
    ));

    out.push_str(&format!(
        "{:<18} {:<18} {:>8} {:>8} {:>12} {:>12}\n",
        "feature", "column", "valid", "missing", "min", "max"
    ));
    out.push_str(&format!(
        "{:-<18} {:-<18} {:-<8} {:-<8} {:-<12} {:-<12}\n",
        "", "", "", "", "", ""
    ));
    for c in &d.coverage {
        out.push_str(
            format!(
                "{:<18} {:<18} {:>8} {:>8} {:>12} {:>12}\n",
                c.field.name(),
                c.column.as_deref().unwrap_or("(absent)"),
                c.valid,
                c.missing,
                fmt_opt(c.min),
                fmt_opt(c.max),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    if !d.dispositions.is_empty() {
        out.push_str("\nDisposition values:\n");
        for (value, n) in &d.dispositions {
            out.push_str(&format!("  {value:<24} {n:>8}\n"));
        }
    }

    let c = &d.counts;
    out.push_str(&format!(
        "\nRows: raw={} cleaned={} final={} (positive={}, negative={})\n",
        c.raw, c.cleaned, c.final_count, c.positive, c.negative
    ));
    out
}
