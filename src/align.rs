//! Check that a set of rasters share the same pixel grid.
//!
//! Rasters are aligned when their geographic bounds, pixel
//! shape and coordinate reference system are exactly equal.
//! No tolerance is applied: rasters that differ by a
//! fraction of a pixel must be resampled beforehand.

use log::debug;

use crate::error::PlotError;
use crate::raster::{Crs, RasterMeta};
use crate::Result;

/// Verify every raster is aligned with the first one.
/// Fields are compared in order bounds, shape, CRS; the
/// first difference is reported.
pub fn check_alignment<S: AsRef<str>>(rasters: &[(S, &RasterMeta)]) -> Result<()> {
    let (reference, first) = match rasters.first() {
        Some((name, meta)) => (name.as_ref(), *meta),
        None => return Ok(()),
    };

    for (name, meta) in &rasters[1..] {
        let field = if meta.bounds() != first.bounds() {
            Some("bounds")
        } else if meta.shape() != first.shape() {
            Some("shape")
        } else if meta.crs != first.crs {
            Some("crs")
        } else {
            None
        };
        if let Some(field) = field {
            return Err(PlotError::RasterMisalignment {
                name: name.as_ref().to_string(),
                reference: reference.to_string(),
                field,
            }
            .into());
        }
    }
    debug!("{} rasters aligned with `{}'", rasters.len(), reference);
    Ok(())
}

/// Verify a raster is in the CRS of the tiles. Unknown
/// systems on both sides compare equal.
pub fn check_crs(name: &str, raster: Option<&Crs>, tiles: Option<&Crs>) -> Result<()> {
    if raster == tiles {
        return Ok(());
    }
    let ident = |crs: Option<&Crs>| crs.map_or_else(|| "unknown".to_string(), |c| c.to_string());
    Err(PlotError::CrsMismatch {
        name: name.to_string(),
        raster: ident(raster),
        tiles: ident(tiles),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> RasterMeta {
        RasterMeta::new((100, 80), [500000., 0.05, 0., 4600000., 0., -0.05], 5)
            .with_crs(Crs::epsg(32651))
    }

    fn misaligned_field(metas: &[(&str, &RasterMeta)]) -> Option<&'static str> {
        match check_alignment(metas) {
            Ok(()) => None,
            Err(e) => match e.downcast_ref::<PlotError>() {
                Some(PlotError::RasterMisalignment { field, .. }) => Some(field),
                _ => panic!("unexpected error {:?}", e),
            },
        }
    }

    #[test]
    fn identical_rasters_pass() {
        let a = meta();
        let b = meta();
        assert_eq!(misaligned_field(&[("a", &a), ("b", &b)]), None);
        assert_eq!(misaligned_field(&[("a", &a)]), None);
        assert!(check_alignment::<&str>(&[]).is_ok());
    }

    #[test]
    fn single_field_perturbations() {
        let a = meta();

        let mut shifted = meta();
        shifted.geo_transform[0] += 0.01;
        assert_eq!(misaligned_field(&[("a", &a), ("b", &shifted)]), Some("bounds"));

        // Same extent at twice the resolution.
        let mut finer = meta();
        finer.dims = (200, 160);
        finer.geo_transform[1] /= 2.;
        finer.geo_transform[5] /= 2.;
        assert_eq!(finer.bounds(), a.bounds());
        assert_eq!(misaligned_field(&[("a", &a), ("b", &finer)]), Some("shape"));

        let other = meta().with_crs(Crs::epsg(4326));
        assert_eq!(misaligned_field(&[("a", &a), ("b", &other)]), Some("crs"));
    }

    #[test]
    fn reports_offending_raster() {
        let a = meta();
        let b = meta();
        let mut c = meta();
        c.dims.0 += 1;
        let err = check_alignment(&[("red", &a), ("nir", &b), ("dsm", &c)]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PlotError>(),
            Some(&PlotError::RasterMisalignment {
                name: "dsm".into(),
                reference: "red".into(),
                field: "bounds",
            })
        );
    }

    #[test]
    fn crs_against_tiles() {
        let utm = Crs::epsg(32651);
        assert!(check_crs("red", Some(&utm), Some(&utm)).is_ok());
        assert!(check_crs("red", None, None).is_ok());

        let err = check_crs("red", Some(&utm), None).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PlotError>(),
            Some(&PlotError::CrsMismatch {
                name: "red".into(),
                raster: "EPSG:32651".into(),
                tiles: "unknown".into(),
            })
        );
    }
}
