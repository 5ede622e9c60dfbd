//! Pixel and geographic coordinate conventions.
//!
//! Raster dimensions and offsets follow GDAL ordering:
//! `(x, y)` i.e. `(cols, rows)`. Arrays read from rasters
//! use `ndarray` ordering, i.e. `[row, col]`.

use geo::Rect;
use nalgebra::{Matrix3, Point2};

/// Raster size as `(cols, rows)`.
pub type RasterDims = (usize, usize);
/// Pixel offset as `(col, row)`.
pub type RasterOffset = (isize, isize);
/// A rectangular pixel window: offset and size.
pub type RasterWindow = (RasterOffset, RasterDims);

/// Affine (or projective) transform in homogeneous
/// coordinates. For rasters, maps pixel `(col, row)` to
/// geographic `(x, y)`.
pub type PixelTransform = Matrix3<f64>;

/// The 6 coefficients of a GDAL geo. transform.
pub type GeoTransform = [f64; 6];

/// Axis-aligned bounds, either in geographic or pixel
/// coordinates.
pub type Bounds = Rect<f64>;

/// Pixel offsets closer than this to an integer are
/// treated as integers when computing windows.
pub const PIXEL_EPSILON: f64 = 1e-6;

/// Convert a GDAL geo. transform into a `PixelTransform`.
pub fn transform_from_gdal(t: &GeoTransform) -> PixelTransform {
    Matrix3::new(t[1], t[2], t[0], t[4], t[5], t[3], 0., 0., 1.)
}

/// Inverse of [`transform_from_gdal`]. The projective row
/// of `t` is ignored.
pub fn transform_to_gdal(t: &PixelTransform) -> GeoTransform {
    [
        t[(0, 2)],
        t[(0, 0)],
        t[(0, 1)],
        t[(1, 2)],
        t[(1, 0)],
        t[(1, 1)],
    ]
}

/// The transform of a window starting at `off`: maps
/// window-relative pixel coordinates to geographic
/// coordinates.
pub fn window_transform(t: &PixelTransform, off: RasterOffset) -> PixelTransform {
    let shift = Matrix3::new(1., 0., off.0 as f64, 0., 1., off.1 as f64, 0., 0., 1.);
    t * shift
}

/// Geographic extent covered by a raster of dimension
/// `dims` with transform `t`.
pub fn raster_bounds(t: &PixelTransform, dims: RasterDims) -> Bounds {
    let lt = t.transform_point(&Point2::new(0., 0.));
    let rb = t.transform_point(&Point2::new(dims.0 as f64, dims.1 as f64));
    Rect::new((lt.x, lt.y), (rb.x, rb.y))
}

/// Map bounds through `t`. Only the two corners are
/// transformed, so `t` should be axis-aligned.
pub fn transform_bounds(t: &PixelTransform, bounds: &Bounds) -> Bounds {
    let (l, b) = bounds.min().x_y();
    let (r, top) = bounds.max().x_y();
    let p1 = t.transform_point(&Point2::new(l, top));
    let p2 = t.transform_point(&Point2::new(r, b));
    Rect::new((p1.x, p1.y), (p2.x, p2.y))
}

pub trait BoundsExt {
    /// The smallest integer pixel window enclosing these
    /// (pixel coordinate) bounds, clipped to a raster of
    /// dimension `dim`.
    fn window_from_bounds(&self, dim: RasterDims) -> RasterWindow;
}

impl BoundsExt for Bounds {
    fn window_from_bounds(&self, dim: RasterDims) -> RasterWindow {
        let (cols, rows) = (dim.0 as f64, dim.1 as f64);

        let left = snap_floor(self.min().x).max(0.).min(cols);
        let top = snap_floor(self.min().y).max(0.).min(rows);
        let right = snap_ceil(self.max().x).min(cols).max(left);
        let bot = snap_ceil(self.max().y).min(rows).max(top);

        (
            (left as isize, top as isize),
            ((right - left) as usize, (bot - top) as usize),
        )
    }
}

#[inline]
fn snap_floor(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < PIXEL_EPSILON {
        r
    } else {
        v.floor()
    }
}

#[inline]
fn snap_ceil(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < PIXEL_EPSILON {
        r
    } else {
        v.ceil()
    }
}
