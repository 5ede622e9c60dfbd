//! Pluggable per-pixel index formulas.
//!
//! An index (eg. NDVI) is computed from the named bands of
//! a tile. Bands are named after the raster they come from:
//! the raster name itself for single band rasters, and
//! `<name>_<k>` (`k` from 1) for each band of multi-band
//! rasters.

use std::collections::BTreeMap;

use anyhow::anyhow;
use log::warn;
use ndarray::{Array2, Zip};

use crate::aggregate::IndexArrays;
use crate::analyzer::TileSamples;
use crate::extract::Outside;
use crate::Result;

/// Named 2-D bands of one tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandSet {
    bands: BTreeMap<String, Array2<f64>>,
}

impl BandSet {
    pub fn new() -> Self {
        Default::default()
    }

    /// Bands of every sample, with pixels outside the tile
    /// set according to `outside`.
    pub fn from_samples(samples: &TileSamples, outside: Outside) -> Self {
        let mut set = BandSet::new();
        for (name, sample) in samples {
            let count = sample.band_count();
            if count == 1 {
                set.insert(name.clone(), sample.band_with(0, outside));
            } else {
                for band in 0..count {
                    set.insert(
                        format!("{}_{}", name, band + 1),
                        sample.band_with(band, outside),
                    );
                }
            }
        }
        set
    }

    pub fn insert(&mut self, name: String, band: Array2<f64>) {
        self.bands.insert(name, band);
    }

    pub fn get(&self, name: &str) -> Option<&Array2<f64>> {
        self.bands.get(name)
    }

    /// Like [`get`][BandSet::get], but missing bands are an
    /// error.
    pub fn band(&self, name: &str) -> Result<&Array2<f64>> {
        self.bands.get(name).ok_or_else(|| {
            anyhow!(
                "band `{}' not available (have: {})",
                name,
                self.names().collect::<Vec<_>>().join(", ")
            )
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// A per-pixel formula over the bands of a tile.
pub trait VegetationIndex: Send + Sync {
    fn name(&self) -> &str;
    fn compute(&self, bands: &BandSet) -> Result<Array2<f64>>;
}

/// A [`VegetationIndex`] from a name and a closure.
pub struct IndexFn<F> {
    name: String,
    func: F,
}

impl<F> IndexFn<F>
where
    F: Fn(&BandSet) -> Result<Array2<f64>> + Send + Sync,
{
    pub fn new<S: Into<String>>(name: S, func: F) -> Self {
        IndexFn {
            name: name.into(),
            func,
        }
    }
}

impl<F> VegetationIndex for IndexFn<F>
where
    F: Fn(&BandSet) -> Result<Array2<f64>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&self, bands: &BandSet) -> Result<Array2<f64>> {
        (self.func)(bands)
    }
}

/// A band used as-is (eg. a DSM).
pub struct BandIndex(pub String);

impl VegetationIndex for BandIndex {
    fn name(&self) -> &str {
        &self.0
    }

    fn compute(&self, bands: &BandSet) -> Result<Array2<f64>> {
        bands.band(&self.0).map(|b| b.clone())
    }
}

/// Compute every index of `indices`. Infinite values (eg.
/// from a division by zero) are replaced by `NaN`. An index
/// that fails to compute is left out, with a warning.
pub fn compute_indices(indices: &[Box<dyn VegetationIndex>], bands: &BandSet) -> IndexArrays {
    let mut out = IndexArrays::new();
    for index in indices {
        match index.compute(bands) {
            Ok(mut arr) => {
                arr.mapv_inplace(|v| if v.is_finite() { v } else { f64::NAN });
                out.insert(index.name().to_string(), arr.into_dyn());
            }
            Err(e) => warn!("index `{}': {:#}", index.name(), e),
        }
    }
    out
}

/// `(a - b) / (a + b)`, `NaN` where `a + b` is zero.
pub fn normalized_difference(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    Zip::from(a).and(b).map_collect(|&a, &b| {
        let sum = a + b;
        if sum == 0. {
            f64::NAN
        } else {
            (a - b) / sum
        }
    })
}

/// `a / b`, `NaN` where `b` is zero.
pub fn ratio(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    Zip::from(a)
        .and(b)
        .map_collect(|&a, &b| if b == 0. { f64::NAN } else { a / b })
}
