//! GDAL backed rasters and tile datasets.
//!
//! This module is only available with the "gdal" feature.

use std::path::Path;

use anyhow::{anyhow, bail, Context};
use gdal::raster::Buffer;
use gdal::vector::{
    Feature, FieldValue, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType, ToGdal,
};
use gdal::{Dataset, DriverManager};
use log::debug;
use ndarray::Array3;

use crate::geometry::{transform_to_gdal, GeoTransform, RasterWindow};
use crate::raster::{Crs, RasterMeta, RasterSource};
use crate::tiles::{AttrValue, TileCollection, TileFeature};
use crate::Result;

/// Geo. transform GDAL assumes for rasters without one.
const DEFAULT_GEO_TRANSFORM: GeoTransform = [0., 1., 0., 0., 0., 1.];

/// A raster dataset opened with GDAL. The dataset is closed
/// when dropped.
pub struct GdalRaster {
    name: String,
    ds: Dataset,
    meta: RasterMeta,
    no_data: Vec<Option<f64>>,
}

impl GdalRaster {
    pub fn open(path: &Path) -> Result<Self> {
        let ds =
            Dataset::open(path).with_context(|| format!("reading dataset {}", path.display()))?;
        let (cols, rows) = ds.raster_size();
        let geo_transform = ds.geo_transform().unwrap_or(DEFAULT_GEO_TRANSFORM);
        let crs = match ds.spatial_ref() {
            Ok(srs) => Some(Crs::from_spatial_ref(&srs)?),
            Err(_) => None,
        };
        let band_count = ds.raster_count() as usize;
        let no_data = (1..=band_count)
            .map(|b| Ok(ds.rasterband(b as isize)?.no_data_value()))
            .collect::<Result<Vec<_>>>()?;

        let meta = RasterMeta {
            dims: (cols, rows),
            geo_transform,
            crs,
            band_count,
            no_data: no_data.first().cloned().flatten(),
        };
        debug!(
            "opened raster {} ({}x{}, {} bands)",
            path.display(),
            cols,
            rows,
            band_count
        );
        Ok(GdalRaster {
            name: path.display().to_string(),
            ds,
            meta,
            no_data,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.ds
    }
}

impl RasterSource for GdalRaster {
    fn meta(&self) -> &RasterMeta {
        &self.meta
    }

    fn read_window(&self, window: RasterWindow) -> Result<Array3<f64>> {
        let (off, size) = window;
        let mut data = Vec::with_capacity(self.meta.band_count * size.0 * size.1);
        for (b, no_data) in self.no_data.iter().enumerate() {
            let band = self.ds.rasterband(b as isize + 1)?;
            let buf = band.read_as::<f64>(off, size, size, None).with_context(|| {
                format!(
                    "reading band {} window @ ({},{}) of dimension ({}x{})",
                    b + 1,
                    off.0,
                    off.1,
                    size.0,
                    size.1
                )
            })?;
            match no_data {
                Some(nd) => data.extend(
                    buf.data
                        .into_iter()
                        .map(|v| if v == *nd { f64::NAN } else { v }),
                ),
                None => data.extend(buf.data),
            }
        }
        Ok(Array3::from_shape_vec(
            (self.meta.band_count, size.1, size.0),
            data,
        )?)
    }
}

impl Drop for GdalRaster {
    fn drop(&mut self) {
        debug!("closing raster {}", self.name);
    }
}

fn attr_from_field(value: Option<FieldValue>) -> AttrValue {
    match value {
        None => AttrValue::Null,
        Some(FieldValue::IntegerValue(i)) => AttrValue::Integer(i as i64),
        Some(FieldValue::Integer64Value(i)) => AttrValue::Integer(i),
        Some(FieldValue::RealValue(f)) => AttrValue::Real(f),
        Some(FieldValue::StringValue(s)) => AttrValue::Text(s),
        Some(other) => other
            .into_string()
            .map_or(AttrValue::Null, AttrValue::Text),
    }
}

/// Read polygons of the first layer of a vector dataset.
/// Single part multi-polygons are accepted.
pub fn read_tiles_vector(path: &Path, id_field: &str) -> Result<TileCollection> {
    let ds = Dataset::open(path).with_context(|| format!("reading dataset {}", path.display()))?;
    let mut layer = ds.layer(0)?;
    let crs = match layer.spatial_ref() {
        Some(srs) => Some(Crs::from_spatial_ref(&srs)?),
        None => None,
    };

    let features = layer
        .features()
        .enumerate()
        .map(|(k, feature)| -> Result<TileFeature> {
            let geometry = feature
                .geometry()
                .ok_or_else(|| anyhow!("feature #{}: no geometry", k))?;
            let polygon = match geometry.to_geo()? {
                geo::Geometry::Polygon(poly) => poly,
                geo::Geometry::MultiPolygon(multi) if multi.0.len() == 1 => {
                    multi.0.into_iter().next().ok_or_else(|| anyhow!("empty multi-polygon"))?
                }
                _ => bail!("feature #{}: not a polygon", k),
            };
            let properties = feature
                .fields()
                .map(|(name, value)| (name, attr_from_field(value)))
                .collect();
            Ok(TileFeature {
                polygon,
                properties,
            })
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("reading features of {}", path.display()))?;

    TileCollection::from_features(id_field, crs, features)
}

/// Field type able to hold every non-null value of a column.
fn column_type(tiles: &TileCollection, col: usize) -> OGRFieldType::Type {
    let mut ty = OGRFieldType::OFTInteger64;
    for tile in tiles.iter() {
        match &tile.values()[col] {
            AttrValue::Null | AttrValue::Integer(_) => {}
            AttrValue::Real(_) => ty = OGRFieldType::OFTReal,
            AttrValue::Text(_) => return OGRFieldType::OFTString,
        }
    }
    ty
}

/// Write the tiles as a polygon layer, with the id field
/// first. `driver` is any GDAL vector driver (eg. "ESRI
/// Shapefile", "GPKG"). Non-finite values are written as
/// null.
pub fn write_tiles_vector(path: &Path, driver: &str, tiles: &TileCollection) -> Result<()> {
    let drv = DriverManager::get_driver_by_name(driver)?;
    let mut ds = drv
        .create_vector_only(path)
        .with_context(|| format!("creating dataset {}", path.display()))?;
    let srs = match tiles.crs() {
        Some(crs) => Some(crs.to_spatial_ref()?),
        None => None,
    };
    let layer_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tiles")
        .to_string();
    let layer = ds.create_layer(LayerOptions {
        name: &layer_name,
        srs: srs.as_ref(),
        ty: OGRwkbGeometryType::wkbPolygon,
        ..Default::default()
    })?;

    let types: Vec<_> = (0..tiles.columns().len())
        .map(|col| column_type(tiles, col))
        .collect();
    let mut defn = vec![(tiles.id_field(), OGRFieldType::OFTInteger64)];
    defn.extend(
        tiles
            .columns()
            .iter()
            .map(|c| c.as_str())
            .zip(types.iter().cloned()),
    );
    layer.create_defn_fields(&defn)?;

    // Drivers may rename fields (eg. shapefiles truncate to
    // 10 characters): use the names as created.
    let names: Vec<String> = layer.defn().fields().map(|f| f.name()).collect();
    if names.len() != defn.len() {
        bail!("{}: created {} of {} fields", driver, names.len(), defn.len());
    }

    for tile in tiles.iter() {
        let mut feature = Feature::new(layer.defn())?;
        feature.set_geometry(tile.polygon().to_gdal()?)?;
        feature.set_field_integer64(&names[0], tile.id())?;
        for ((value, name), &ty) in tile.values().iter().zip(&names[1..]).zip(&types) {
            match value {
                AttrValue::Integer(i) if ty == OGRFieldType::OFTReal => {
                    feature.set_field_double(name, *i as f64)?
                }
                AttrValue::Integer(i) => feature.set_field_integer64(name, *i)?,
                AttrValue::Real(f) if f.is_finite() => feature.set_field_double(name, *f)?,
                AttrValue::Text(s) => feature.set_field_string(name, s)?,
                AttrValue::Real(_) | AttrValue::Null => {}
            }
        }
        feature.create(&layer)?;
    }
    debug!("wrote {} tiles to {}", tiles.len(), path.display());
    Ok(())
}

/// Write a `(bands, rows, cols)` array as a `f64` raster.
pub fn write_raster(
    path: &Path,
    driver: &str,
    data: &Array3<f64>,
    geo_transform: &GeoTransform,
    crs: Option<&Crs>,
) -> Result<()> {
    let (bands, rows, cols) = data.dim();
    if bands == 0 || rows == 0 || cols == 0 {
        bail!("cannot write empty raster {}", path.display());
    }
    let drv = DriverManager::get_driver_by_name(driver)?;
    let mut ds = drv
        .create_with_band_type::<f64, _>(path, cols as isize, rows as isize, bands as isize)
        .with_context(|| format!("creating dataset {}", path.display()))?;
    ds.set_geo_transform(geo_transform)?;
    if let Some(crs) = crs {
        ds.set_spatial_ref(&crs.to_spatial_ref()?)?;
    }
    for (b, band_data) in data.outer_iter().enumerate() {
        let mut band = ds.rasterband(b as isize + 1)?;
        let buf = Buffer::new((cols, rows), band_data.iter().cloned().collect());
        band.write((0, 0), (cols, rows), &buf)?;
    }
    Ok(())
}

/// Write the pixels of one tile, positioned with the
/// transform of the window they were read from.
pub fn write_tile_raster(
    path: &Path,
    driver: &str,
    sample: &crate::extract::TileSample,
    crs: Option<&Crs>,
) -> Result<()> {
    write_raster(
        path,
        driver,
        &sample.data,
        &transform_to_gdal(&sample.transform),
        crs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlQuad;
    use crate::extract::extract_tile;
    use crate::grid::GridConfig;
    use geo::Coord;
    use ndarray::Array;
    use tempdir::TempDir;

    const GT: GeoTransform = [500000., 0.5, 0., 4600000., 0., -0.5];

    #[test]
    fn write_open_read_raster() -> Result<()> {
        let tmp_dir = TempDir::new("plotgrid_test").unwrap();
        let path = tmp_dir.path().join("ms.tif");

        let data = Array::from_shape_fn((2, 8, 6), |(b, r, c)| (b * 100 + r * 6 + c) as f64);
        write_raster(&path, "GTiff", &data, &GT, Some(&Crs::epsg(32651)))?;

        let raster = GdalRaster::open(&path)?;
        let meta = raster.meta();
        assert_eq!(meta.dims, (6, 8));
        assert_eq!(meta.band_count, 2);
        assert_eq!(meta.geo_transform, GT);
        assert_eq!(meta.crs, Some(Crs::epsg(32651)));

        let win = raster.read_window(((2, 3), (3, 2)))?;
        assert_eq!(win.dim(), (2, 2, 3));
        assert_eq!(win[[0, 0, 0]], (3 * 6 + 2) as f64);
        assert_eq!(win[[1, 1, 2]], (100 + 4 * 6 + 4) as f64);
        Ok(())
    }

    #[test]
    fn tile_raster_keeps_window_position() -> Result<()> {
        let tmp_dir = TempDir::new("plotgrid_test").unwrap();
        let src_path = tmp_dir.path().join("dsm.tif");
        let tile_path = tmp_dir.path().join("tile.tif");

        let data = Array::from_elem((1, 20, 20), 7.);
        write_raster(&src_path, "GTiff", &data, &GT, None)?;
        let raster = GdalRaster::open(&src_path)?;

        let c = |x, y| Coord { x, y };
        let quad = ControlQuad::new([
            c(500002., 4599998.),
            c(500006., 4599998.),
            c(500006., 4599996.),
            c(500002., 4599996.),
        ])?;
        let tiles = GridConfig::new(1, 1).partition(&quad, None)?;
        let sample = extract_tile(&raster, tiles.tiles()[0].polygon())?;
        assert_eq!(sample.window, ((4, 4), (8, 4)));

        write_tile_raster(&tile_path, "GTiff", &sample, None)?;
        let tile = GdalRaster::open(&tile_path)?;
        assert_eq!(tile.meta().dims, (8, 4));
        assert_eq!(tile.meta().geo_transform[0], 500002.);
        assert_eq!(tile.meta().geo_transform[3], 4599998.);
        Ok(())
    }

    #[test]
    fn vector_roundtrip() -> Result<()> {
        let tmp_dir = TempDir::new("plotgrid_test").unwrap();
        let path = tmp_dir.path().join("tiles.shp");

        let c = |x, y| Coord { x, y };
        let quad = ControlQuad::new([c(0., 10.), c(10., 10.), c(10., 0.), c(0., 0.)])?;
        let mut tiles = GridConfig::new(2, 2)
            .with_start_id(100)
            .partition(&quad, Some(Crs::epsg(32651)))?;
        for id in tiles.ids().collect::<Vec<_>>() {
            tiles.set_value(id, "avg_ndvi", AttrValue::Real(id as f64 / 1000.));
            tiles.set_value(id, "uniformity_x", AttrValue::Integer(id));
        }

        write_tiles_vector(&path, "ESRI Shapefile", &tiles)?;
        let back = read_tiles_vector(&path, "FID")?;

        assert_eq!(back.len(), 4);
        assert_eq!(back.crs(), Some(&Crs::epsg(32651)));
        assert_eq!(back.ids().collect::<Vec<_>>(), tiles.ids().collect::<Vec<_>>());
        assert_eq!(back.value(101, "avg_ndvi"), Some(&AttrValue::Real(0.101)));
        assert_eq!(back.value(104, "uniformity"), Some(&AttrValue::Integer(104)));
        Ok(())
    }
}
