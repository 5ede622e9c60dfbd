use clap::value_t;
use crate::{arg, args_parser, flag, opt};
use plot_tools::job::{parse_raster_arg, JobConfig, RasterInput};
use plot_tools::utils::OutputArgs;
use plotgrid::prelude::*;
use std::path::PathBuf;

/// Program arguments, merged with the job file (if any)
pub struct Args {
    /// Tiles to compute statistics of
    pub tiles: PathBuf,
    /// Name of the tile id field
    pub id_field: String,
    /// Named rasters to sample
    pub rasters: Vec<RasterInput>,
    /// Indices to compute
    pub indices: Vec<String>,
    /// Value of pixels outside the tiles
    pub outside: Outside,
    /// Tiles with statistics
    pub output: Option<OutputArgs>,
    /// Print statistic records as JSON
    pub json: bool,
    /// Tiles reduced together in parallel
    pub batch_size: usize,
}

fn invalid(msg: String) -> ! {
    clap::Error::with_description(&msg, clap::ErrorKind::InvalidValue).exit()
}

pub fn parse_cmd_line() -> Args {
    let matches = args_parser!("plot-stats")
        .about("Compute per-plot statistics of vegetation indices.")
        .arg(arg!("tiles").help("Plots (vector dataset)"))
        .arg(
            opt!("config")
                .short("c")
                .help("Job file (JSON); command line options take precedence"),
        )
        .arg(
            opt!("raster")
                .short("r")
                .multiple(true)
                .number_of_values(1)
                .help("Raster to sample, as `name=path' (repeatable)"),
        )
        .arg(
            opt!("index")
                .short("i")
                .multiple(true)
                .use_delimiter(true)
                .help("Index to compute: built-in (eg. ndvi) or band name"),
        )
        .arg(opt!("id field").help("Name of the id field (default: FID)"))
        .arg(
            opt!("outside")
                .possible_values(&["nan", "zero"])
                .help("Value of pixels outside a plot (default: nan)"),
        )
        .arg(
            opt!("output")
                .short("o")
                .help("Output vector dataset (driver guessed from the extension)"),
        )
        .arg(opt!("driver").help("Output GDAL driver (default: by extension)"))
        .arg(flag!("json").help("Print the statistics as JSON to stdout"))
        .arg(opt!("batch size").help("Plots reduced together (default: 256)"))
        .get_matches();

    let job = match value_t!(matches, "config", PathBuf) {
        Ok(path) => JobConfig::read(&path).unwrap_or_else(|e| invalid(format!("{:#}", e))),
        Err(_) => JobConfig::default(),
    };

    let tiles = value_t!(matches, "tiles", PathBuf)
        .ok()
        .or(job.tiles)
        .unwrap_or_else(|| invalid("no plots given: pass TILES or a job file".into()));
    let id_field = value_t!(matches, "id field", String)
        .ok()
        .or(job.id_field)
        .unwrap_or_else(|| DEFAULT_ID_FIELD.to_string());

    let rasters = match matches.values_of("raster") {
        Some(values) => values
            .map(|s| parse_raster_arg(s).unwrap_or_else(|e| invalid(format!("raster: {:#}", e))))
            .collect(),
        None => job.rasters,
    };
    if rasters.is_empty() {
        invalid("no raster given: pass --raster name=path or a job file".into());
    }

    let indices: Vec<String> = match matches.values_of("index") {
        Some(values) => values.map(|s| s.to_string()).collect(),
        None => job.indices,
    };
    if indices.is_empty() {
        invalid("no index given: pass --index or a job file".into());
    }

    let outside = match matches.value_of("outside") {
        Some(s) => s
            .parse::<Outside>()
            .unwrap_or_else(|e| invalid(format!("{:#}", e))),
        None => job.outside.unwrap_or_default(),
    };

    let driver = value_t!(matches, "driver", String).ok().or(job.driver);
    let output = value_t!(matches, "output", PathBuf)
        .ok()
        .or(job.output)
        .map(|path| OutputArgs { path, driver });

    let json = matches.is_present("json");
    if output.is_none() && !json {
        invalid("nothing to do: pass --output, --json or a job file with an output".into());
    }

    let batch_size = if matches.is_present("batch size") {
        value_t!(matches, "batch size", usize).unwrap_or_else(|e| e.exit())
    } else {
        256
    }
    .max(1);

    Args {
        tiles,
        id_field,
        rasters,
        indices,
        outside,
        output,
        json,
        batch_size,
    }
}
