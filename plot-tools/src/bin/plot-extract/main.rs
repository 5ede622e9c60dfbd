use anyhow::Context;
use clap::value_t;
use log::{debug, info};
use std::path::PathBuf;

use plot_tools::job::{parse_raster_arg, RasterInput};
use plot_tools::{utils::*, *};
use plotgrid::prelude::*;

// Main function
plot_tools::sync_main!(run());

fn run() -> Result<()> {
    // Parse command line
    let args = parse_cmd_line();

    let tiles = read_tiles(&args.tiles, &args.id_field)?;
    let crs = tiles.crs().cloned();
    let inputs: Vec<_> = args
        .rasters
        .iter()
        .map(|r| (r.name.clone(), r.path.clone()))
        .collect();
    let analyzer = MultiRasterAnalyzer::open(tiles, &inputs, |path| GdalRaster::open(path))?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let tracker = Tracker::new("tiles", analyzer.len());
    let mut written = 0;
    for item in analyzer.iter_tiles() {
        let (id, samples) = item?;
        if samples.values().all(|s| s.inside_count() == 0) {
            debug!("tile {}: no pixel inside the rasters", id);
            tracker.skip();
            continue;
        }

        let dir = args.output.join(format!("tile_{}", id));
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        for (name, sample) in &samples {
            let path = dir.join(format!("{}.{}", name, args.extension));
            if args.nan_outside {
                let data = sample.nan_masked();
                write_raster(
                    &path,
                    &args.driver,
                    &data,
                    &transform_to_gdal(&sample.transform),
                    crs.as_ref(),
                )?;
            } else {
                write_tile_raster(&path, &args.driver, sample, crs.as_ref())?;
            }
            written += 1;
        }
        tracker.increment();
    }
    drop(tracker);

    info!("wrote {} rasters to {}", written, args.output.display());
    analyzer.close();
    Ok(())
}

/// Program arguments
pub struct Args {
    /// Plots to cut
    tiles: PathBuf,
    /// Name of the plot id field
    id_field: String,
    /// Named rasters to cut
    rasters: Vec<RasterInput>,
    /// Output directory
    output: PathBuf,
    /// Output GDAL raster driver
    driver: String,
    /// Output file extension
    extension: String,
    /// Write `NaN` instead of zero outside the plot
    nan_outside: bool,
}

fn parse_cmd_line() -> Args {
    use clap::Error;
    use clap::ErrorKind::InvalidValue;
    let matches = args_parser!("plot-extract")
        .about("Cut the pixels of every plot out of a set of rasters.")
        .arg(
            arg!("tiles")
                .required(true)
                .help("Plots (vector dataset)"),
        )
        .arg(
            arg!("output")
                .required(true)
                .help("Output directory; rasters go to tile_<id>/<name>.<ext>"),
        )
        .arg(
            opt!("raster")
                .short("r")
                .required(true)
                .multiple(true)
                .number_of_values(1)
                .help("Raster to cut, as `name=path' (repeatable)"),
        )
        .arg(opt!("id field").help("Name of the id field (default: FID)"))
        .arg(opt!("driver").help("Output GDAL driver (default: GTiff)"))
        .arg(opt!("extension").help("Output file extension (default: tif)"))
        .arg(flag!("nan outside").help("Write NaN instead of 0 outside the plot"))
        .get_matches();

    let tiles = value_t!(matches, "tiles", PathBuf).unwrap_or_else(|e| e.exit());
    let output = value_t!(matches, "output", PathBuf).unwrap_or_else(|e| e.exit());
    let rasters = matches
        .values_of("raster")
        .into_iter()
        .flatten()
        .map(|s| {
            parse_raster_arg(s).unwrap_or_else(|e| {
                Error::with_description(&format!("raster: {:#}", e), InvalidValue).exit()
            })
        })
        .collect();

    Args {
        tiles,
        id_field: value_t!(matches, "id field", String)
            .unwrap_or_else(|_| DEFAULT_ID_FIELD.to_string()),
        rasters,
        output,
        driver: value_t!(matches, "driver", String)
            .unwrap_or_else(|_| DEFAULT_RASTER_DRIVER.to_string()),
        extension: value_t!(matches, "extension", String).unwrap_or_else(|_| "tif".to_string()),
        nan_outside: matches.is_present("nan outside"),
    }
}
