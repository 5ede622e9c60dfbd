//! Raster sources: metadata and windowed reads.

use std::fmt;

use ndarray::{s, Array3};
use serde_derive::{Deserialize, Serialize};

use crate::geometry::{
    raster_bounds, transform_from_gdal, Bounds, GeoTransform, PixelTransform, RasterDims,
    RasterWindow,
};
use crate::Result;

/// Identity of a coordinate reference system: an authority
/// code (eg. `EPSG:4326`) when one is known, otherwise the
/// WKT definition. Two systems are considered equal iff
/// their identities are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(String);

impl Crs {
    pub fn new<S: Into<String>>(ident: S) -> Self {
        Crs(ident.into())
    }

    pub fn epsg(code: u32) -> Self {
        Crs(format!("EPSG:{}", code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The EPSG code, if the identity is one.
    pub fn epsg_code(&self) -> Option<u32> {
        let code = self.0.strip_prefix("EPSG:")?;
        code.parse().ok()
    }

    /// Identity of a GDAL spatial reference.
    #[cfg(feature = "gdal")]
    pub fn from_spatial_ref(srs: &gdal::spatial_ref::SpatialRef) -> Result<Self> {
        if let (Ok(name), Ok(code)) = (srs.auth_name(), srs.auth_code()) {
            return Ok(Crs(format!("{}:{}", name, code)));
        }
        let mut srs = srs.clone();
        if srs.auto_identify_epsg().is_ok() {
            if let Ok(code) = srs.auth_code() {
                return Ok(Crs::epsg(code as u32));
            }
        }
        Ok(Crs(srs.to_wkt()?))
    }

    #[cfg(feature = "gdal")]
    pub fn to_spatial_ref(&self) -> Result<gdal::spatial_ref::SpatialRef> {
        Ok(gdal::spatial_ref::SpatialRef::from_definition(&self.0)?)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Describes the pixel grid of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMeta {
    /// Size as `(cols, rows)`.
    pub dims: RasterDims,
    pub geo_transform: GeoTransform,
    pub crs: Option<Crs>,
    pub band_count: usize,
    pub no_data: Option<f64>,
}

impl RasterMeta {
    pub fn new(dims: RasterDims, geo_transform: GeoTransform, band_count: usize) -> Self {
        RasterMeta {
            dims,
            geo_transform,
            crs: None,
            band_count,
            no_data: None,
        }
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn with_no_data(mut self, no_data: f64) -> Self {
        self.no_data = Some(no_data);
        self
    }

    /// Pixel to geographic transform.
    pub fn transform(&self) -> PixelTransform {
        transform_from_gdal(&self.geo_transform)
    }

    pub fn bounds(&self) -> Bounds {
        raster_bounds(&self.transform(), self.dims)
    }

    /// Shape as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.dims.1, self.dims.0)
    }
}

/// An opened raster that supports windowed reads.
pub trait RasterSource {
    fn meta(&self) -> &RasterMeta;

    /// Read all bands of `window` as an array of shape
    /// `(bands, rows, cols)`. The window must lie within the
    /// raster. No-data pixels are read as `NaN`.
    fn read_window(&self, window: RasterWindow) -> Result<Array3<f64>>;
}

impl<T: RasterSource + ?Sized> RasterSource for Box<T> {
    fn meta(&self) -> &RasterMeta {
        (**self).meta()
    }

    fn read_window(&self, window: RasterWindow) -> Result<Array3<f64>> {
        (**self).read_window(window)
    }
}

/// A raster held in memory.
#[derive(Debug, Clone)]
pub struct MemRaster {
    meta: RasterMeta,
    data: Array3<f64>,
}

impl MemRaster {
    /// `data` has shape `(bands, rows, cols)`; the band count
    /// and dims of `meta` are taken from it.
    pub fn new(mut meta: RasterMeta, data: Array3<f64>) -> Self {
        let (bands, rows, cols) = data.dim();
        meta.dims = (cols, rows);
        meta.band_count = bands;
        MemRaster { meta, data }
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }
}

impl RasterSource for MemRaster {
    fn meta(&self) -> &RasterMeta {
        &self.meta
    }

    fn read_window(&self, window: RasterWindow) -> Result<Array3<f64>> {
        let ((x, y), (w, h)) = window;
        let (cols, rows) = self.meta.dims;
        if x < 0 || y < 0 || x as usize + w > cols || y as usize + h > rows {
            anyhow::bail!(
                "window @ ({},{}) of dimension ({}x{}) exceeds raster of dimension ({}x{})",
                x,
                y,
                w,
                h,
                cols,
                rows
            );
        }
        let (x, y) = (x as usize, y as usize);
        let mut out = self.data.slice(s![.., y..y + h, x..x + w]).to_owned();
        if let Some(no_data) = self.meta.no_data {
            out.mapv_inplace(|v| if v == no_data { f64::NAN } else { v });
        }
        Ok(out)
    }
}
