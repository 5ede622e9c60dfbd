pub use crate::{Error, PlotError, Result};

pub use crate::geometry::*;
pub use crate::homography::Homography;
pub use crate::control::ControlQuad;
pub use crate::grid::*;
pub use crate::tiles::*;

pub use crate::raster::*;
pub use crate::align::*;
pub use crate::extract::*;
pub use crate::analyzer::*;

pub use crate::histogram::{Config as HistConfig, HistBin, Histogram};
pub use crate::stats::*;
pub use crate::aggregate::*;
pub use crate::index::*;

#[cfg(feature = "gdal")]
pub use crate::gdal_io::*;
