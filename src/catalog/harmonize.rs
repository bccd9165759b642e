//! Column-name harmonization across survey vocabularies.
//!
//! Each canonical field has a fixed, ordered list of candidate column names.
//! Resolution returns the first candidate present in a table's header; a field
//! with no matching column is simply absent.

use std::collections::BTreeMap;

use crate::io::ingest::RawTable;

/// Fields the harmonizer knows how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    OrbitalPeriod,
    PlanetRadius,
    TransitDuration,
    /// A raw flux-like column (light-curve style exports).
    Flux,
    /// A disposition-like column.
    Label,
    /// A human-readable row identifier.
    RowId,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::OrbitalPeriod,
        Field::PlanetRadius,
        Field::TransitDuration,
        Field::Flux,
        Field::Label,
        Field::RowId,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::OrbitalPeriod => "orbital_period",
            Field::PlanetRadius => "planet_radius",
            Field::TransitDuration => "transit_duration",
            Field::Flux => "flux",
            Field::Label => "label",
            Field::RowId => "id",
        }
    }

    /// Ordered candidate column names (Kepler KOI, then K2/TESS archive names).
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Field::OrbitalPeriod => &["orbital_period", "koi_period", "pl_orbper"],
            Field::PlanetRadius => &["planet_radius", "koi_prad", "pl_rade", "pl_radius"],
            Field::TransitDuration => &["transit_duration", "koi_duration", "pl_trandurh", "pl_trandur"],
            Field::Flux => &["flux", "sap_flux", "pdcsap_flux"],
            Field::Label => &["koi_disposition", "pl_disposition", "tfopwg_disp", "label"],
            Field::RowId => &["kepoi_name", "koi_id", "kepid", "pl_name", "toi", "id"],
        }
    }
}

/// Return the first candidate for `field` present in `headers`.
pub fn resolve<'a, S: AsRef<str>>(headers: &'a [S], field: Field) -> Option<&'a str> {
    field
        .candidates()
        .iter()
        .find_map(|cand| headers.iter().map(|h| h.as_ref()).find(|h| *h == *cand))
}

/// Resolved column index per field for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: BTreeMap<Field, (String, usize)>,
}

impl ColumnMapping {
    /// Resolve every known field against `table`'s header.
    pub fn for_table(table: &RawTable) -> Self {
        let mut columns = BTreeMap::new();
        for field in Field::ALL {
            if let Some(name) = resolve(&table.headers, field) {
                if let Some(idx) = table.column_index(name) {
                    columns.insert(field, (name.to_string(), idx));
                }
            }
        }
        Self { columns }
    }

    pub fn index(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).map(|(_, idx)| *idx)
    }

    pub fn column(&self, field: Field) -> Option<&str> {
        self.columns.get(&field).map(|(name, _)| name.as_str())
    }

    pub fn is_absent(&self, field: Field) -> bool {
        !self.columns.contains_key(&field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_wins() {
        let headers = ["pl_rade", "koi_prad", "koi_period"];
        assert_eq!(resolve(&headers, Field::PlanetRadius), Some("koi_prad"));
        assert_eq!(resolve(&headers, Field::OrbitalPeriod), Some("koi_period"));
    }

    #[test]
    fn canonical_name_beats_aliases() {
        let headers = ["koi_period", "orbital_period"];
        assert_eq!(resolve(&headers, Field::OrbitalPeriod), Some("orbital_period"));
    }

    #[test]
    fn unresolvable_field_is_absent() {
        let headers = ["ra", "dec"];
        assert_eq!(resolve(&headers, Field::TransitDuration), None);
        let table = RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        };
        let mapping = ColumnMapping::for_table(&table);
        assert!(mapping.is_absent(Field::TransitDuration));
        assert!(mapping.is_absent(Field::Label));
    }

    #[test]
    fn tess_vocabulary_resolves() {
        let table = RawTable {
            headers: ["toi", "pl_orbper", "pl_rade", "pl_trandurh", "tfopwg_disp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: Vec::new(),
        };
        let mapping = ColumnMapping::for_table(&table);
        assert_eq!(mapping.index(Field::OrbitalPeriod), Some(1));
        assert_eq!(mapping.column(Field::TransitDuration), Some("pl_trandurh"));
        assert_eq!(mapping.column(Field::Label), Some("tfopwg_disp"));
        assert_eq!(mapping.column(Field::RowId), Some("toi"));
    }
}
