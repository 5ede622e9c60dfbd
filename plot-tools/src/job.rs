//! Job files for `plot-stats`.
//!
//! A job file is a JSON object; every entry is optional and
//! command line options take precedence:
//!
//! ```json
//! {
//!   "tiles": "plots.shp",
//!   "id_field": "FID",
//!   "rasters": [{ "name": "red", "path": "red.tif" },
//!               { "name": "nir", "path": "nir.tif" }],
//!   "indices": ["ndvi", "gndvi"],
//!   "outside": "nan",
//!   "output": "plots_stats.shp",
//!   "driver": "ESRI Shapefile"
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use plotgrid::prelude::Outside;
use plotgrid::Result;
use serde_derive::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RasterInput {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub tiles: Option<PathBuf>,
    pub id_field: Option<String>,
    pub rasters: Vec<RasterInput>,
    pub indices: Vec<String>,
    pub outside: Option<Outside>,
    pub output: Option<PathBuf>,
    pub driver: Option<String>,
}

impl JobConfig {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Read a job file. Relative paths in the file are
    /// resolved against its directory.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("reading job {}", path.display()))?;
        let mut job = JobConfig::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing job {}", path.display()))?;
        if let Some(dir) = path.parent() {
            job.resolve_paths(dir);
        }
        Ok(job)
    }

    fn resolve_paths(&mut self, dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };
        if let Some(p) = &mut self.tiles {
            resolve(p);
        }
        if let Some(p) = &mut self.output {
            resolve(p);
        }
        for raster in &mut self.rasters {
            resolve(&mut raster.path);
        }
    }
}

/// Parse `name=path` raster arguments.
pub fn parse_raster_arg(s: &str) -> Result<RasterInput> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok(RasterInput {
            name: name.to_string(),
            path: path.into(),
        }),
        _ => bail!("expected `name=path': got `{}'", s),
    }
}
