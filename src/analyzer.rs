//! Sample a set of aligned rasters tile by tile.
//!
//! A [`MultiRasterAnalyzer`] owns a tile collection and the
//! opened rasters to sample. On construction, every raster
//! is checked against the CRS of the tiles and against the
//! first raster (see [`crate::align`]). If any check fails,
//! the rasters already opened are released before the error
//! is returned.

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use log::{debug, info};

use crate::align::{check_alignment, check_crs};
use crate::extract::{extract_tile, TileSample};
use crate::raster::RasterSource;
use crate::tiles::{TileCollection, TileId};
use crate::Result;

/// Samples of one tile, by raster name.
pub type TileSamples = BTreeMap<String, TileSample>;

pub struct MultiRasterAnalyzer<S: RasterSource> {
    tiles: TileCollection,
    rasters: Vec<(String, S)>,
}

impl<S: RasterSource> MultiRasterAnalyzer<S> {
    /// Build from rasters that are already open. They are
    /// released if validation fails.
    pub fn new(tiles: TileCollection, rasters: Vec<(String, S)>) -> Result<Self> {
        if let Err(e) = validate(&tiles, &rasters) {
            release(rasters);
            return Err(e);
        }
        info!(
            "sampling {} tiles from {} rasters",
            tiles.len(),
            rasters.len()
        );
        Ok(MultiRasterAnalyzer { tiles, rasters })
    }

    /// Open each `(name, input)` with `opener`. The CRS of
    /// each raster is checked as soon as it is opened; on
    /// failure, the rasters opened so far are released.
    pub fn open<P, F>(tiles: TileCollection, inputs: &[(String, P)], mut opener: F) -> Result<Self>
    where
        F: FnMut(&P) -> Result<S>,
    {
        let mut rasters = Vec::with_capacity(inputs.len());
        for (name, input) in inputs {
            let source = match opener(input) {
                Ok(source) => source,
                Err(e) => {
                    release(rasters);
                    return Err(e.context(format!("opening raster `{}'", name)));
                }
            };
            let crs_check = check_crs(name, source.meta().crs.as_ref(), tiles.crs());
            rasters.push((name.clone(), source));
            if let Err(e) = crs_check {
                release(rasters);
                return Err(e);
            }
            debug!("opened raster `{}'", name);
        }
        MultiRasterAnalyzer::new(tiles, rasters)
    }

    pub fn tiles(&self) -> &TileCollection {
        &self.tiles
    }

    pub fn raster_names(&self) -> impl Iterator<Item = &str> {
        self.rasters.iter().map(|(name, _)| name.as_str())
    }

    pub fn raster(&self, name: &str) -> Option<&S> {
        self.rasters
            .iter()
            .find(|(other, _)| other == name)
            .map(|(_, source)| source)
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Samples of the `idx`-th tile (in stored order) from
    /// every raster.
    pub fn sample(&self, idx: usize) -> Result<(TileId, TileSamples)> {
        let tile = match self.tiles.tiles().get(idx) {
            Some(tile) => tile,
            None => bail!("tile index {} out of range ({} tiles)", idx, self.tiles.len()),
        };
        let mut samples = TileSamples::new();
        for (name, source) in &self.rasters {
            let sample = extract_tile(source, tile.polygon())
                .with_context(|| format!("tile {}: sampling raster `{}'", tile.id(), name))?;
            samples.insert(name.clone(), sample);
        }
        Ok((tile.id(), samples))
    }

    /// Iterate over the tiles, in stored order, from the
    /// start.
    pub fn iter_tiles(&self) -> TileCursor<'_, S> {
        TileCursor {
            analyzer: self,
            pos: 0,
        }
    }

    /// Release the rasters.
    pub fn close(self) {
        release(self.rasters);
    }

    /// Release the rasters and return the tiles.
    pub fn into_tiles(self) -> TileCollection {
        release(self.rasters);
        self.tiles
    }
}

fn validate<S: RasterSource>(tiles: &TileCollection, rasters: &[(String, S)]) -> Result<()> {
    if rasters.is_empty() {
        bail!("no raster to sample");
    }
    for (i, (name, source)) in rasters.iter().enumerate() {
        if rasters[..i].iter().any(|(other, _)| other == name) {
            bail!("raster name `{}' given more than once", name);
        }
        check_crs(name, source.meta().crs.as_ref(), tiles.crs())?;
    }
    let metas: Vec<_> = rasters
        .iter()
        .map(|(name, source)| (name.as_str(), source.meta()))
        .collect();
    check_alignment(&metas)
}

fn release<S>(rasters: Vec<(String, S)>) {
    for (name, source) in rasters.into_iter().rev() {
        drop(source);
        debug!("released raster `{}'", name);
    }
}

/// Cursor over the tiles of a [`MultiRasterAnalyzer`].
/// Yields `(id, samples)` for each tile, reading the
/// rasters lazily.
pub struct TileCursor<'a, S: RasterSource> {
    analyzer: &'a MultiRasterAnalyzer<S>,
    pos: usize,
}

impl<'a, S: RasterSource> TileCursor<'a, S> {
    /// Index of the next tile.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Restart from the first tile.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl<'a, S: RasterSource> Iterator for TileCursor<'a, S> {
    type Item = Result<(TileId, TileSamples)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.analyzer.len() {
            return None;
        }
        let item = self.analyzer.sample(self.pos);
        self.pos += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.analyzer.len().saturating_sub(self.pos);
        (left, Some(left))
    }
}

impl<'a, S: RasterSource> ExactSizeIterator for TileCursor<'a, S> {}
