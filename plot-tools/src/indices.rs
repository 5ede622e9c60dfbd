//! Built-in vegetation indices.
//!
//! Formulas refer to bands by raster name: `red`, `green`,
//! `blue`, `nir`, `swir1` and the red-edge bands `rededge1`,
//! `rededge2`, `rededge3` for single band rasters, and
//! `rgb_1`, `rgb_2`, `rgb_3` for the bands of an `rgb`
//! raster. A sensor with a single red-edge band may name it
//! `rededge`; it stands in for `rededge1`. Any other
//! requested name is used as a raw band (eg. `dsm`).

use anyhow::bail;
use ndarray::{Array2, Zip};
use plotgrid::prelude::*;

type Formula = fn(&BandSet) -> Result<Array2<f64>>;

const BUILTIN: &[(&str, Formula)] = &[
    ("ndvi", ndvi),
    ("gndvi", gndvi),
    ("ndre", ndre),
    ("rndvi", rndvi),
    ("ndwi", ndwi),
    ("lswi", lswi),
    ("rvi", rvi),
    ("gcvi", gcvi),
    ("clre", clre),
    ("rri1", rri1),
    ("rri2", rri2),
    ("msrre", msrre),
    ("ireci", ireci),
    ("dvi", dvi),
    ("tvi", tvi),
    ("savi", savi),
    ("evi", evi),
    ("msavi", msavi),
    ("exg", exg),
];

/// Names of the built-in indices.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(name, _)| *name)
}

pub fn builtin(name: &str) -> Option<Box<dyn VegetationIndex>> {
    BUILTIN
        .iter()
        .find(|(other, _)| *other == name)
        .map(|(name, f)| Box::new(IndexFn::new(*name, *f)) as Box<dyn VegetationIndex>)
}

/// Band names produced by rasters of the given band counts
/// (see [`BandSet::from_samples`]).
pub fn band_names(rasters: &[(String, usize)]) -> Vec<String> {
    let mut names = vec![];
    for (name, count) in rasters {
        if *count == 1 {
            names.push(name.clone());
        } else {
            names.extend((1..=*count).map(|k| format!("{}_{}", name, k)));
        }
    }
    names
}

/// Resolve index names to formulas: built-ins first, then
/// raw bands. Unknown names are an error.
pub fn resolve(names: &[String], bands: &[String]) -> Result<Vec<Box<dyn VegetationIndex>>> {
    names
        .iter()
        .map(|name| match builtin(name) {
            Some(index) => Ok(index),
            None if bands.contains(name) => {
                Ok(Box::new(BandIndex(name.clone())) as Box<dyn VegetationIndex>)
            }
            None => bail!(
                "unknown index `{}' (built-in: {}; bands: {})",
                name,
                builtin_names().collect::<Vec<_>>().join(", "),
                bands.join(", ")
            ),
        })
        .collect()
}

fn rededge1(b: &BandSet) -> Result<&Array2<f64>> {
    match b.get("rededge1") {
        Some(band) => Ok(band),
        None => b.band("rededge"),
    }
}

fn ndvi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(normalized_difference(b.band("nir")?, b.band("red")?))
}

fn gndvi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(normalized_difference(b.band("nir")?, b.band("green")?))
}

fn ndre(b: &BandSet) -> Result<Array2<f64>> {
    Ok(normalized_difference(b.band("nir")?, rededge1(b)?))
}

fn rndvi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(normalized_difference(rededge1(b)?, b.band("red")?))
}

fn ndwi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(normalized_difference(b.band("green")?, b.band("nir")?))
}

fn lswi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(normalized_difference(b.band("nir")?, b.band("swir1")?))
}

fn rvi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(ratio(b.band("nir")?, b.band("red")?))
}

fn gcvi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(ratio(b.band("nir")?, b.band("green")?) - 1.)
}

fn clre(b: &BandSet) -> Result<Array2<f64>> {
    Ok(ratio(b.band("nir")?, rededge1(b)?) - 1.)
}

fn rri1(b: &BandSet) -> Result<Array2<f64>> {
    Ok(ratio(b.band("nir")?, rededge1(b)?))
}

fn rri2(b: &BandSet) -> Result<Array2<f64>> {
    Ok(ratio(rededge1(b)?, b.band("nir")?))
}

fn msrre(b: &BandSet) -> Result<Array2<f64>> {
    Ok(Zip::from(b.band("nir")?)
        .and(rededge1(b)?)
        .map_collect(|&nir, &re| (nir - re - 1.) / ((nir - re).sqrt() + 1.)))
}

fn ireci(b: &BandSet) -> Result<Array2<f64>> {
    let slope = ratio(rededge1(b)?, b.band("rededge2")?);
    let rise = b.band("rededge3")? - b.band("red")?;
    Ok(ratio(&rise, &slope))
}

fn dvi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(b.band("nir")? - b.band("red")?)
}

fn tvi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(Zip::from(b.band("nir")?)
        .and(b.band("red")?)
        .and(b.band("green")?)
        .map_collect(|&nir, &red, &green| 60. * (nir - green) - 100. * (red - green)))
}

fn savi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(Zip::from(b.band("nir")?)
        .and(b.band("red")?)
        .map_collect(|&nir, &red| 1.5 * (nir - red) / (nir + red + 0.5)))
}

fn evi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(Zip::from(b.band("nir")?)
        .and(b.band("red")?)
        .and(b.band("blue")?)
        .map_collect(|&nir, &red, &blue| {
            2.5 * (nir - red) / (nir + 6. * red - 7.5 * blue + 1.)
        }))
}

fn msavi(b: &BandSet) -> Result<Array2<f64>> {
    Ok(Zip::from(b.band("nir")?)
        .and(b.band("red")?)
        .map_collect(|&nir, &red| {
            let a = 2. * nir + 1.;
            (a - (a * a - 8. * (nir - red)).sqrt()) / 2.
        }))
}

fn exg(b: &BandSet) -> Result<Array2<f64>> {
    Ok(Zip::from(b.band("rgb_1")?)
        .and(b.band("rgb_2")?)
        .and(b.band("rgb_3")?)
        .map_collect(|&r, &g, &b| 2. * g - r - b))
}
