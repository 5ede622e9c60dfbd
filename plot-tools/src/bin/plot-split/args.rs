use clap::{value_t, ArgMatches};
use crate::{arg, args_parser, opt};
use geo::{Coord, Polygon};
use plot_tools::cli::args::{parse_pair, parse_points};
use plot_tools::utils::OutputArgs;
use plotgrid::prelude::*;
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

/// Program arguments
pub struct Args {
    /// Control points
    pub points: Option<Vec<Coord<f64>>>,
    /// Boundary polygon (WKT)
    pub polygon: Option<Polygon<f64>>,
    /// Boundary dataset; its first feature is the boundary
    pub boundary: Option<PathBuf>,
    /// Grid parameters
    pub grid: GridConfig,
    /// CRS definition of the tiles
    pub crs: Option<String>,
    /// Dataset to take the CRS from
    pub like: Option<PathBuf>,
    /// Output tiles
    pub output: OutputArgs,
}

pub fn polygon_from_wkt(wkt: &str) -> Result<Polygon<f64>> {
    use anyhow::bail;
    let geom = gdal::vector::Geometry::from_wkt(wkt)?.to_geo()?;
    Ok(match geom {
        geo::Geometry::Polygon(p) => p,
        geo::Geometry::MultiPolygon(mut p) if p.0.len() == 1 => p.0.remove(0),
        _ => bail!("boundary WKT is not a (single part) polygon"),
    })
}

fn invalid(msg: String) -> ! {
    clap::Error::with_description(&msg, clap::ErrorKind::InvalidValue).exit()
}

fn is_number<T: FromStr>(s: String) -> std::result::Result<(), String> {
    s.parse::<T>()
        .map(|_| ())
        .map_err(|_| format!("`{}' is not a valid number", s))
}

fn matches_from<I, T>(itr: I) -> clap::Result<ArgMatches<'static>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    args_parser!("plot-split")
        .about("Partition a field into a grid of plots.")
        .arg(
            arg!("output")
                .required(true)
                .help("Output vector dataset (driver guessed from the extension)"),
        )
        .arg(
            opt!("points")
                .short("p")
                .help("Control points `x,y;x,y;x,y;x,y' (NW, NE, SE, SW)"),
        )
        .arg(
            opt!("polygon")
                .conflicts_with("boundary")
                .help("Boundary polygon (Polygon WKT); first 4 vertices are used"),
        )
        .arg(opt!("boundary").help("Boundary polygon (vector dataset; first feature)"))
        .arg(
            opt!("columns")
                .short("x")
                .required(true)
                .validator(is_number::<usize>)
                .help("Number of plot columns"),
        )
        .arg(
            opt!("rows")
                .short("y")
                .required(true)
                .validator(is_number::<usize>)
                .help("Number of plot rows"),
        )
        .arg(opt!("shrink").help("Fraction of each cell kept: `s' or `sx,sy' (default: 1)"))
        .arg(
            opt!("order")
                .possible_values(&["top-left", "bottom-right"])
                .help("Id assignment order (default: top-left)"),
        )
        .arg(
            opt!("start id")
                .validator(is_number::<TileId>)
                .help("Offset added to every id (default: 0)"),
        )
        .arg(opt!("id field").help("Name of the id field (default: FID)"))
        .arg(
            opt!("crs")
                .conflicts_with("like")
                .help("CRS of the plots (eg. EPSG:32650)"),
        )
        .arg(opt!("like").help("Take the CRS from this dataset (raster or vector)"))
        .arg(opt!("driver").help("Output GDAL driver (default: by extension)"))
        .get_matches_from_safe(itr)
}

pub fn parse_cmd_line() -> Args {
    let matches = matches_from(std::env::args_os()).unwrap_or_else(|e| e.exit());

    let output = OutputArgs {
        path: value_t!(matches, "output", PathBuf).unwrap_or_else(|e| e.exit()),
        driver: value_t!(matches, "driver", String).ok(),
    };

    let points = matches.value_of("points").map(|s| {
        parse_points(s).unwrap_or_else(|e| invalid(format!("points: {}", e)))
    });
    let polygon = matches.value_of("polygon").map(|wkt| {
        polygon_from_wkt(wkt).unwrap_or_else(|e| invalid(format!("cannot parse polygon: {:#}", e)))
    });
    let boundary = value_t!(matches, "boundary", PathBuf).ok();

    let columns = value_t!(matches, "columns", usize).unwrap_or_else(|e| e.exit());
    let rows = value_t!(matches, "rows", usize).unwrap_or_else(|e| e.exit());
    let shrink = matches
        .value_of("shrink")
        .map(|s| parse_pair(s).unwrap_or_else(|e| invalid(format!("shrink: {}", e))))
        .unwrap_or((1., 1.));
    let order = matches
        .value_of("order")
        .map(|s| s.parse::<IdOrder>().unwrap_or_else(|e| invalid(e.to_string())))
        .unwrap_or_default();
    let start_id = if matches.is_present("start id") {
        value_t!(matches, "start id", TileId).unwrap_or_else(|e| e.exit())
    } else {
        0
    };
    let id_field = value_t!(matches, "id field", String)
        .unwrap_or_else(|_| DEFAULT_ID_FIELD.to_string());

    let grid = GridConfig::new(columns, rows)
        .with_shrink(shrink)
        .with_order(order)
        .with_start_id(start_id)
        .with_id_field(id_field);
    if let Err(e) = grid.validate() {
        invalid(format!("{:#}", e));
    }

    Args {
        points,
        polygon,
        boundary,
        grid,
        crs: value_t!(matches, "crs", String).ok(),
        like: value_t!(matches, "like", PathBuf).ok(),
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(extra: &[&'static str]) -> Vec<&'static str> {
        let mut argv = vec!["plot-split", "plots.shp", "-p", "0,1;1,1;1,0;0,0"];
        argv.extend_from_slice(extra);
        argv
    }

    #[test]
    fn start_id_is_validated() {
        let m = matches_from(argv(&["-x", "4", "-y", "2", "--start-id=-100"])).unwrap();
        assert_eq!(value_t!(m, "start id", TileId).unwrap(), -100);

        let err = matches_from(argv(&["-x", "4", "-y", "2", "--start-id=1o0"]))
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err.kind, clap::ErrorKind::ValueValidation);
    }

    #[test]
    fn grid_size_is_validated() {
        assert!(matches_from(argv(&["-x", "four", "-y", "2"])).is_err());
        assert!(matches_from(argv(&["-x", "4", "-y", "-2"])).is_err());
        assert!(matches_from(argv(&["-x", "4", "-y", "2"])).is_ok());
    }
}
