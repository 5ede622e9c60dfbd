//! Masked extraction of a tile from a raster.
//!
//! The tile polygon's bounding box is converted to the
//! enclosing pixel window, all bands of the window are
//! read, and pixels whose center lies outside the polygon
//! are zeroed. A center on the polygon boundary belongs to
//! the tile only along its top and left edges, so tiles
//! sharing an edge never both claim a pixel. The mask is kept alongside the data so that
//! callers can tell outside pixels apart from genuine
//! zeros.

use std::str::FromStr;

use anyhow::{anyhow, Context};
use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{BoundingRect, Contains, Coord, MapCoords, Point, Polygon};
use log::debug;
use nalgebra::Point2;
use ndarray::{Array2, Array3, Axis, Zip};
use serde_derive::{Deserialize, Serialize};

use crate::error::PlotError;
use crate::geometry::{
    transform_bounds, window_transform, BoundsExt, PixelTransform, RasterDims, RasterWindow,
};
use crate::raster::{RasterMeta, RasterSource};
use crate::Result;

/// Value given to pixels outside the tile polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outside {
    Nan,
    Zero,
}

impl Default for Outside {
    fn default() -> Self {
        Outside::Nan
    }
}

impl FromStr for Outside {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nan" => Ok(Outside::Nan),
            "zero" => Ok(Outside::Zero),
            _ => Err(anyhow!("expected `nan' or `zero': got `{}'", s)),
        }
    }
}

impl Outside {
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            Outside::Nan => f64::NAN,
            Outside::Zero => 0.,
        }
    }
}

/// Pixels of one raster covering one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSample {
    /// Window read from the raster.
    pub window: RasterWindow,
    /// Maps window pixel coordinates to geographic
    /// coordinates.
    pub transform: PixelTransform,
    /// `(bands, rows, cols)` values; zero outside the tile.
    pub data: Array3<f64>,
    /// `(rows, cols)`; `true` inside the tile.
    pub mask: Array2<bool>,
}

impl TileSample {
    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of pixels inside the tile.
    pub fn inside_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Band `band` (0-based) with outside pixels set to
    /// `outside`.
    pub fn band_with(&self, band: usize, outside: Outside) -> Array2<f64> {
        let mut out = self.data.index_axis(Axis(0), band).to_owned();
        if outside != Outside::Zero {
            let fill = outside.value();
            Zip::from(&mut out)
                .and(&self.mask)
                .for_each(|v, &inside| {
                    if !inside {
                        *v = fill;
                    }
                });
        }
        out
    }

    /// All bands with outside pixels set to `NaN`.
    pub fn nan_masked(&self) -> Array3<f64> {
        let mut out = self.data.clone();
        for mut band in out.outer_iter_mut() {
            Zip::from(&mut band)
                .and(&self.mask)
                .for_each(|v, &inside| {
                    if !inside {
                        *v = f64::NAN;
                    }
                });
        }
        out
    }
}

/// Pixel window enclosing the bounding box of `polygon`,
/// clipped to the raster.
pub fn tile_window(meta: &RasterMeta, polygon: &Polygon<f64>) -> Result<RasterWindow> {
    let inv = meta
        .transform()
        .try_inverse()
        .ok_or(PlotError::SingularTransform)?;
    let bounds = polygon
        .bounding_rect()
        .ok_or_else(|| anyhow::anyhow!("tile polygon is empty"))?;
    Ok(transform_bounds(&inv, &bounds).window_from_bounds(meta.dims))
}

/// Offset, in pixels, towards the bottom right that breaks
/// ties for centers on the boundary.
const EDGE_NUDGE: f64 = 1e-6;

/// Rasterize `polygon` on a pixel grid of dimension `dims`
/// whose pixel to geographic transform is `transform`. A
/// pixel is inside iff its center is in the interior of the
/// polygon, or on a top or left edge.
pub fn polygon_mask(
    polygon: &Polygon<f64>,
    transform: &PixelTransform,
    dims: RasterDims,
) -> Result<Array2<bool>> {
    let inv = transform
        .try_inverse()
        .ok_or(PlotError::SingularTransform)?;
    let pixel_poly = polygon.map_coords(|c| {
        let pt = inv.transform_point(&Point2::new(c.x, c.y));
        Coord { x: pt.x, y: pt.y }
    });

    let (cols, rows) = dims;
    Ok(Array2::from_shape_fn((rows, cols), |(i, j)| {
        let center = Coord {
            x: j as f64 + 0.5,
            y: i as f64 + 0.5,
        };
        match pixel_poly.coordinate_position(&center) {
            CoordPos::Inside => true,
            CoordPos::OnBoundary => pixel_poly
                .contains(&Point::new(center.x + EDGE_NUDGE, center.y + EDGE_NUDGE)),
            CoordPos::Outside => false,
        }
    }))
}

/// Read the pixels of `source` covering `polygon`, zeroing
/// those outside it.
pub fn extract_tile<S: RasterSource + ?Sized>(
    source: &S,
    polygon: &Polygon<f64>,
) -> Result<TileSample> {
    let meta = source.meta();
    let window = tile_window(meta, polygon)?;
    let (off, size) = window;
    let transform = window_transform(&meta.transform(), off);

    let mut data = if size.0 == 0 || size.1 == 0 {
        Array3::zeros((meta.band_count, size.1, size.0))
    } else {
        source.read_window(window).with_context(|| {
            format!(
                "reading window @ ({},{}) of dimension ({}x{})",
                off.0, off.1, size.0, size.1
            )
        })?
    };
    let mask = polygon_mask(polygon, &transform, size)?;
    for mut band in data.outer_iter_mut() {
        Zip::from(&mut band).and(&mask).for_each(|v, &inside| {
            if !inside {
                *v = 0.;
            }
        });
    }

    debug!(
        "extracted window @ ({},{}) of dimension ({}x{})",
        off.0, off.1, size.0, size.1
    );
    Ok(TileSample {
        window,
        transform,
        data,
        mask,
    })
}
