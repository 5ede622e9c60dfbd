//! Utilities to read and write tile and raster datasets.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use gdal::Dataset;
use plotgrid::gdal_io::{read_tiles_vector, write_tiles_vector};
use plotgrid::prelude::{Crs, TileCollection};
use plotgrid::Result;
use serde::Serialize;

/// Vector driver used when none is given.
pub const DEFAULT_VECTOR_DRIVER: &str = "ESRI Shapefile";
/// Raster driver for extracted tiles.
pub const DEFAULT_RASTER_DRIVER: &str = "GTiff";

pub struct OutputArgs {
    pub path: PathBuf,
    /// GDAL driver; `None` guesses it from the extension
    /// (see [`vector_driver_for`]).
    pub driver: Option<String>,
}

pub fn read_dataset(path: &Path) -> Result<Dataset> {
    Ok(Dataset::open(&path).with_context(|| format!("reading dataset {}", path.display()))?)
}

/// CRS of a raster or vector dataset.
pub fn crs_of_dataset(path: &Path) -> Result<Option<Crs>> {
    let ds = read_dataset(path)?;
    if ds.raster_count() > 0 {
        return match ds.spatial_ref() {
            Ok(srs) => Ok(Some(Crs::from_spatial_ref(&srs)?)),
            Err(_) => Ok(None),
        };
    }
    use gdal::vector::LayerAccess;
    match ds.layer(0)?.spatial_ref() {
        Some(srs) => Ok(Some(Crs::from_spatial_ref(&srs)?)),
        None => Ok(None),
    }
}

/// GDAL vector driver for `path`, guessed from its
/// extension.
pub fn vector_driver_for(path: &Path) -> &'static str {
    let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase());
    match ext.as_deref() {
        Some("json") | Some("geojson") => "GeoJSON",
        Some("gpkg") => "GPKG",
        _ => DEFAULT_VECTOR_DRIVER,
    }
}

/// Read tiles from any vector dataset GDAL can open.
pub fn read_tiles(path: &Path, id_field: &str) -> Result<TileCollection> {
    read_tiles_vector(path, id_field)
}

pub fn write_tiles(out: &OutputArgs, tiles: &TileCollection) -> Result<()> {
    let driver = match &out.driver {
        Some(driver) => driver.as_str(),
        None => vector_driver_for(&out.path),
    };
    write_tiles_vector(&out.path, driver, tiles)
}

pub fn write_json<T: Serialize>(path: &Path, json: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut buf = std::io::BufWriter::with_capacity(0x100000, file);
    serde_json::to_writer(&mut buf, json)?;
    Ok(buf.flush()?)
}

pub fn print_json<T: Serialize>(json: &T) -> Result<()> {
    let mut writer = std::io::BufWriter::new(std::io::stdout());
    serde_json::to_writer(&mut writer, json)?;
    writeln!(writer)?;
    Ok(writer.flush()?)
}
