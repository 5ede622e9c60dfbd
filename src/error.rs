//! Error kinds raised by the partitioning and sampling
//! operations.
//!
//! Operations return [`crate::Result`], an `anyhow` based
//! result. The kinds below are the root causes; recover
//! them with `err.downcast_ref::<PlotError>()`, which also
//! sees through context added on the way up.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlotError {
    #[error("degenerate control points: {0}")]
    DegenerateControlPoints(String),
    #[error("transform is singular and cannot be inverted")]
    SingularTransform,
    #[error("invalid grid size {columns}x{rows}: both must be at least 1")]
    InvalidGridSize { columns: usize, rows: usize },
    #[error("invalid shrink ratio ({0}, {1}): both must lie in (0, 1]")]
    InvalidShrinkRatio(f64, f64),
    #[error("invalid id ordering `{0}': expected `top-left' or `bottom-right'")]
    InvalidOrderingMode(String),
    #[error("missing control geometry: {0}")]
    MissingControlGeometry(String),
    #[error("raster `{name}' is not aligned with `{reference}': {field} differs")]
    RasterMisalignment {
        name: String,
        reference: String,
        field: &'static str,
    },
    #[error("raster `{name}' CRS ({raster}) differs from the tiles CRS ({tiles})")]
    CrsMismatch {
        name: String,
        raster: String,
        tiles: String,
    },
    #[error("identity field `{field}': {reason}")]
    MissingIdentityField { field: String, reason: String },
}
