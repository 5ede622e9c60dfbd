//! Partition a field into a regular grid of plots and
//! summarize co-registered rasters per plot.
//!
//! The pipeline is:
//!
//! 1. [`control`]: four control points (or a boundary
//! polygon) describe the field quadrilateral.
//!
//! 1. [`grid`]: a [`homography`] maps the quadrilateral to
//! the unit square, where an `m x n` grid is laid out,
//! shrunk, and mapped back to geographic tiles.
//!
//! 1. [`analyzer`]: a set of rasters is opened, validated
//! for pixel-exact alignment ([`align`]) and sampled per
//! tile ([`extract`]).
//!
//! 1. [`aggregate`]: the sampled pixels (usually combined
//! into vegetation indices, see [`index`]) are reduced to
//! per-tile statistics and merged back into the
//! [`tiles::TileCollection`].

pub mod error;
pub use error::PlotError;

pub mod geometry;
pub mod homography;
pub mod control;
pub mod grid;
pub mod tiles;

pub mod raster;
pub mod align;
pub mod extract;
pub mod analyzer;

pub mod histogram;
pub mod stats;
pub mod aggregate;
pub mod index;

#[cfg(feature = "gdal")]
pub mod gdal_io;

pub mod prelude;

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
