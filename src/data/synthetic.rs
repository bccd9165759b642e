//! Synthetic survey catalogs.
//!
//! Produces tables shaped like the three archive exports (column names,
//! disposition vocabularies, occasional blanks) so the whole pipeline can run
//! without downloading anything. Planets and false positives are drawn from
//! overlapping log-normal populations:
//!
//! - planets: period ~ LogN(ln 12, 1.0) days, radius ~ LogN(ln 2.2, 0.6) Earth radii
//! - false positives (eclipsing binaries etc.): period ~ LogN(ln 3, 1.2), radius ~ LogN(ln 9, 0.9)
//!
//! Transit duration follows `~ 2.2 * P^(1/3)` hours with multiplicative noise.
//! Generation is fully determined by the seed.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{LogNormal, Normal};

use crate::error::AppError;
use crate::io::ingest::RawTable;

#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    pub kepler_rows: usize,
    pub k2_rows: usize,
    pub tess_rows: usize,
    /// Probability that an optional cell (duration, flux) is blank.
    pub missing_rate: f64,
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            kepler_rows: 600,
            k2_rows: 150,
            tess_rows: 200,
            missing_rate: 0.05,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthCatalogs {
    pub kepler: RawTable,
    pub k2: RawTable,
    pub tess: RawTable,
}

struct Populations {
    planet_period: LogNormal<f64>,
    planet_radius: LogNormal<f64>,
    fp_period: LogNormal<f64>,
    fp_radius: LogNormal<f64>,
    duration_noise: LogNormal<f64>,
    flux: Normal<f64>,
}

impl Populations {
    fn new() -> Result<Self, AppError> {
        let ln = |mu: f64, sigma: f64| {
            LogNormal::new(mu, sigma).map_err(|e| AppError::numeric(format!("Distribution error: {e}")))
        };
        Ok(Self {
            planet_period: ln(12f64.ln(), 1.0)?,
            planet_radius: ln(2.2f64.ln(), 0.6)?,
            fp_period: ln(3f64.ln(), 1.2)?,
            fp_radius: ln(9f64.ln(), 0.9)?,
            duration_noise: ln(0.0, 0.25)?,
            flux: Normal::new(1.0e4, 2.5e3).map_err(|e| AppError::numeric(format!("Distribution error: {e}")))?,
        })
    }

    /// `(period_days, radius_earth, duration_hours)`.
    fn draw(&self, rng: &mut StdRng, planet: bool) -> (f64, f64, f64) {
        let (period, radius) = if planet {
            (self.planet_period.sample(rng), self.planet_radius.sample(rng))
        } else {
            (self.fp_period.sample(rng), self.fp_radius.sample(rng))
        };
        let mut duration = 2.2 * period.cbrt() * self.duration_noise.sample(rng);
        if !planet {
            duration *= 1.4;
        }
        (period, radius, duration)
    }
}

pub fn generate_catalogs(config: &SynthConfig) -> Result<SynthCatalogs, AppError> {
    if !(0.0..1.0).contains(&config.missing_rate) {
        return Err(AppError::input(format!(
            "missing_rate must be in [0, 1), got {}",
            config.missing_rate
        )));
    }
    if config.kepler_rows == 0 {
        return Err(AppError::input("The Kepler-shaped catalog needs at least one row."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let pops = Populations::new()?;

    Ok(SynthCatalogs {
        kepler: kepler_table(&mut rng, &pops, config),
        k2: k2_table(&mut rng, &pops, config),
        tess: tess_table(&mut rng, &pops, config),
    })
}

fn fmt(v: f64) -> Option<String> {
    Some(format!("{v:.5}"))
}

fn maybe(rng: &mut StdRng, rate: f64, v: f64) -> Option<String> {
    if rng.r#gen::<f64>() < rate { None } else { fmt(v) }
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn kepler_table(rng: &mut StdRng, pops: &Populations, config: &SynthConfig) -> RawTable {
    let mut rows = Vec::with_capacity(config.kepler_rows);
    for i in 0..config.kepler_rows {
        let u: f64 = rng.r#gen();
        let (disposition, planet) = match u {
            u if u < 0.30 => ("CONFIRMED", true),
            u if u < 0.50 => ("CANDIDATE", true),
            u if u < 0.95 => ("FALSE POSITIVE", false),
            _ => ("NOT DISPOSITIONED", rng.gen_bool(0.5)),
        };
        let (period, radius, duration) = pops.draw(rng, planet);
        // A small share of rows lose their radius and are dropped downstream.
        let radius = if rng.gen_bool(0.02) { None } else { fmt(radius) };
        let flux = pops.flux.sample(rng);
        rows.push(vec![
            Some(format!("K{:05}.01", i + 1)),
            Some(disposition.to_string()),
            fmt(period),
            radius,
            maybe(rng, config.missing_rate, duration),
            maybe(rng, config.missing_rate, flux),
        ]);
    }
    RawTable {
        headers: headers(&["kepoi_name", "koi_disposition", "koi_period", "koi_prad", "koi_duration", "sap_flux"]),
        rows,
    }
}

fn k2_table(rng: &mut StdRng, pops: &Populations, config: &SynthConfig) -> RawTable {
    let mut rows = Vec::with_capacity(config.k2_rows);
    for i in 0..config.k2_rows {
        let (period, radius, duration) = pops.draw(rng, true);
        rows.push(vec![
            Some(format!("K2-{} b", i + 1)),
            Some("CONFIRMED".to_string()),
            fmt(period),
            fmt(radius),
            maybe(rng, config.missing_rate, duration),
        ]);
    }
    RawTable {
        headers: headers(&["pl_name", "pl_disposition", "pl_orbper", "pl_rade", "pl_trandur"]),
        rows,
    }
}

fn tess_table(rng: &mut StdRng, pops: &Populations, config: &SynthConfig) -> RawTable {
    const DISPOSITIONS: [&str; 4] = ["CP", "KP", "PC", "FP"];
    let mut rows = Vec::with_capacity(config.tess_rows);
    for i in 0..config.tess_rows {
        let (period, radius, duration) = pops.draw(rng, true);
        let disp = DISPOSITIONS.choose(rng).copied().unwrap_or("PC");
        rows.push(vec![
            Some(format!("{}.01", 100 + i)),
            Some(disp.to_string()),
            fmt(period),
            fmt(radius),
            maybe(rng, config.missing_rate, duration),
        ]);
    }
    RawTable {
        headers: headers(&["toi", "tfopwg_disp", "pl_orbper", "pl_rade", "pl_trandurh"]),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::extract_features;

    #[test]
    fn same_seed_same_catalogs() {
        let cfg = SynthConfig {
            kepler_rows: 50,
            k2_rows: 10,
            tess_rows: 10,
            ..SynthConfig::default()
        };
        let a = generate_catalogs(&cfg).unwrap();
        let b = generate_catalogs(&cfg).unwrap();
        assert_eq!(a.kepler, b.kepler);
        assert_eq!(a.tess, b.tess);
    }

    #[test]
    fn tables_resolve_through_the_harmonizer() {
        let cats = generate_catalogs(&SynthConfig::default()).unwrap();
        for table in [&cats.kepler, &cats.k2, &cats.tess] {
            let frame = extract_features(table);
            assert!(frame.len() + frame.dropped == table.len());
            assert!(frame.len() > table.len() / 2);
        }
        assert!(cats.kepler.rows.iter().all(|r| r.len() == cats.kepler.headers.len()));
    }

    #[test]
    fn invalid_missing_rate_is_rejected() {
        let cfg = SynthConfig {
            missing_rate: 1.5,
            ..SynthConfig::default()
        };
        assert!(generate_catalogs(&cfg).is_err());
    }
}
