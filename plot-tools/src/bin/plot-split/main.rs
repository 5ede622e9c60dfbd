use anyhow::{anyhow, bail};
use gdal::vector::LayerAccess;
use log::info;
use std::path::Path;

use plot_tools::{utils::*, *};
use plotgrid::prelude::*;

mod args;

// Main function
plot_tools::sync_main!(run());

fn run() -> Result<()> {
    // Parse command line
    let args = args::parse_cmd_line();

    // Boundary polygon, and its CRS if read from a dataset
    let (polygon, boundary_crs) = match &args.boundary {
        Some(path) => {
            let (polygon, crs) = read_boundary(path)?;
            (Some(polygon), crs)
        }
        None => (args.polygon.clone(), None),
    };
    let quad = ControlQuad::from_inputs(args.points.as_deref(), polygon.as_ref())?;

    let crs = match (&args.crs, &args.like) {
        (Some(def), _) => {
            let srs = gdal::spatial_ref::SpatialRef::from_definition(def)?;
            Some(Crs::from_spatial_ref(&srs)?)
        }
        (None, Some(path)) => crs_of_dataset(path)?,
        (None, None) => boundary_crs,
    };
    if crs.is_none() {
        log::warn!("plots have no CRS: use --crs or --like to set one");
    }

    let tiles = args.grid.partition(&quad, crs)?;
    write_tiles(&args.output, &tiles)?;
    info!(
        "wrote {} plots ({}x{}, ids {}) to {}",
        tiles.len(),
        args.grid.columns(),
        args.grid.rows(),
        id_range(&tiles),
        args.output.path.display()
    );
    Ok(())
}

/// First polygon of the first layer of a vector dataset.
fn read_boundary(path: &Path) -> Result<(geo::Polygon<f64>, Option<Crs>)> {
    let ds = read_dataset(path)?;
    let mut layer = ds.layer(0)?;
    let crs = match layer.spatial_ref() {
        Some(srs) => Some(Crs::from_spatial_ref(&srs)?),
        None => None,
    };
    let feature = layer
        .features()
        .next()
        .ok_or_else(|| anyhow!("boundary {}: no feature", path.display()))?;
    let geometry = feature
        .geometry()
        .ok_or_else(|| anyhow!("boundary {}: feature without geometry", path.display()))?;
    let polygon = match geometry.to_geo()? {
        geo::Geometry::Polygon(p) => p,
        geo::Geometry::MultiPolygon(mut p) if p.0.len() == 1 => p.0.remove(0),
        _ => bail!("boundary {}: not a (single part) polygon", path.display()),
    };
    Ok((polygon, crs))
}

fn id_range(tiles: &TileCollection) -> String {
    match (tiles.ids().min(), tiles.ids().max()) {
        (Some(lo), Some(hi)) => format!("{}..={}", lo, hi),
        _ => "none".into(),
    }
}
