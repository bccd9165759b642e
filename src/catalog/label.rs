//! Per-source label policy.
//!
//! - `Full`: dispositions map case-insensitively to `CONFIRMED → 1`,
//!   `CANDIDATE → 1`, `FALSE POSITIVE → 0`; anything else is unlabeled.
//! - `PositiveOnly`: every row is a positive, whatever its disposition says.

use crate::catalog::extract::ExtractedRow;
use crate::domain::LabelCompleteness;

/// Resolve the label for one raw disposition value under `policy`.
pub fn reconcile(policy: LabelCompleteness, raw: Option<&str>) -> Option<u8> {
    match policy {
        LabelCompleteness::Full => map_disposition(raw?),
        LabelCompleteness::PositiveOnly => Some(1),
    }
}

fn map_disposition(raw: &str) -> Option<u8> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "CONFIRMED" | "CANDIDATE" => Some(1),
        "FALSE POSITIVE" => Some(0),
        _ => None,
    }
}

/// Fill `features.label` on every row. Unlabeled rows stay in place (they are
/// still valid inference inputs); training code filters them out.
pub fn apply_labels(policy: LabelCompleteness, rows: Vec<ExtractedRow>) -> Vec<ExtractedRow> {
    rows.into_iter()
        .map(|mut row| {
            row.features.label = reconcile(policy, row.raw_label.as_deref());
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::extract::extract_features;
    use crate::io::ingest::parse_csv;

    #[test]
    fn full_policy_maps_dispositions_case_insensitively() {
        let p = LabelCompleteness::Full;
        assert_eq!(reconcile(p, Some("CONFIRMED")), Some(1));
        assert_eq!(reconcile(p, Some("candidate")), Some(1));
        assert_eq!(reconcile(p, Some(" False Positive ")), Some(0));
        assert_eq!(reconcile(p, Some("NOT DISPOSITIONED")), None);
        assert_eq!(reconcile(p, Some("1")), None);
        assert_eq!(reconcile(p, None), None);
    }

    #[test]
    fn positive_only_ignores_disposition() {
        let p = LabelCompleteness::PositiveOnly;
        assert_eq!(reconcile(p, Some("FALSE POSITIVE")), Some(1));
        assert_eq!(reconcile(p, Some("garbage")), Some(1));
        assert_eq!(reconcile(p, None), Some(1));
    }

    #[test]
    fn forced_positive_without_disposition_column() {
        let table = parse_csv("koi_period,koi_prad,koi_duration\n10.5,2.3,3.2\n").unwrap();
        let rows = apply_labels(LabelCompleteness::PositiveOnly, extract_features(&table).rows);
        assert_eq!(rows.len(), 1);
        let f = &rows[0].features;
        assert_eq!((f.orbital_period, f.planet_radius, f.transit_duration), (10.5, 2.3, Some(3.2)));
        assert_eq!((f.flux_mean, f.flux_std), (0.0, 0.0));
        assert_eq!(f.label, Some(1));
    }

    #[test]
    fn positive_only_overrides_contradictory_dispositions() {
        let table = parse_csv(
            "pl_orbper,pl_rade,pl_disposition\n1,1,FALSE POSITIVE\n2,2,\n3,3,REFUTED\n4,4,CONFIRMED\n",
        )
        .unwrap();
        let rows = apply_labels(LabelCompleteness::PositiveOnly, extract_features(&table).rows);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.features.label == Some(1)));
    }

    #[test]
    fn full_policy_keeps_unlabeled_rows_for_inference() {
        let table = parse_csv("koi_period,koi_prad,koi_disposition\n1,1,CONFIRMED\n2,2,\n3,3,FALSE POSITIVE\n").unwrap();
        let rows = apply_labels(LabelCompleteness::Full, extract_features(&table).rows);
        let labels: Vec<Option<u8>> = rows.iter().map(|r| r.features.label).collect();
        assert_eq!(labels, vec![Some(1), None, Some(0)]);
    }
}
