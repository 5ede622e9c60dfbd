//! Tile collections: tile polygons keyed by a unique
//! identity, with a fixed set of attribute columns.
//!
//! Attributes are stored column-aligned: the collection
//! owns the ordered list of column names and each tile
//! stores one [`AttrValue`] per column. Adding a column
//! appends [`AttrValue::Null`] to every tile.

use std::collections::HashMap;

use geo::Polygon;
use log::{info, warn};
use serde_derive::{Deserialize, Serialize};

use crate::aggregate::StatTable;
use crate::error::PlotError;
use crate::raster::Crs;
use crate::Result;

pub type TileId = i64;

/// Name of the identity attribute unless configured
/// otherwise.
pub const DEFAULT_ID_FIELD: &str = "FID";

/// Attribute names longer than this do not survive a
/// round-trip through a shapefile.
pub const SHAPEFILE_FIELD_LIMIT: usize = 10;

/// Position of a generated tile in its grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Integer(i) => Some(*i as f64),
            AttrValue::Real(f) => Some(*f),
            AttrValue::Text(s) => s.trim().parse().ok(),
            AttrValue::Null => None,
        }
    }

    /// Interpret as a tile identity: integers, integral
    /// reals and integer strings are accepted.
    pub fn as_tile_id(&self) -> Option<TileId> {
        match self {
            AttrValue::Integer(i) => Some(*i),
            AttrValue::Real(f) if f.is_finite() && f.fract() == 0. => Some(*f as TileId),
            AttrValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Real(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Integer(v)
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

/// A polygon with arbitrary properties, as read from a
/// vector dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub polygon: Polygon<f64>,
    pub properties: Vec<(String, AttrValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    id: TileId,
    cell: Option<GridCell>,
    polygon: Polygon<f64>,
    values: Vec<AttrValue>,
}

impl Tile {
    pub fn id(&self) -> TileId {
        self.id
    }

    /// Grid position, for tiles generated by the
    /// partitioner.
    pub fn cell(&self) -> Option<GridCell> {
        self.cell
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Attribute values, aligned with
    /// [`TileCollection::columns`].
    pub fn values(&self) -> &[AttrValue] {
        &self.values
    }
}

/// Outcome of merging statistics into a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Columns that did not exist before the merge.
    pub added_columns: Vec<String>,
    /// Existing columns where at least one non-null value
    /// was replaced.
    pub overwritten_columns: Vec<String>,
    /// Record ids with no matching tile.
    pub skipped_ids: Vec<TileId>,
}

impl MergeReport {
    pub fn has_conflicts(&self) -> bool {
        !self.overwritten_columns.is_empty() || !self.skipped_ids.is_empty()
    }
}

/// Ordered tiles with unique ids and column-aligned
/// attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct TileCollection {
    id_field: String,
    crs: Option<Crs>,
    columns: Vec<String>,
    tiles: Vec<Tile>,
    positions: HashMap<TileId, usize>,
}

impl TileCollection {
    pub fn new<S: Into<String>>(id_field: S, crs: Option<Crs>) -> Self {
        TileCollection {
            id_field: id_field.into(),
            crs,
            columns: vec![],
            tiles: vec![],
            positions: HashMap::new(),
        }
    }

    /// Build a collection from features read from an
    /// external dataset. Every feature must carry a unique,
    /// integral `id_field` property. Remaining properties
    /// become columns in order of first appearance.
    pub fn from_features<S, I>(id_field: S, crs: Option<Crs>, features: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = TileFeature>,
    {
        let mut coll = TileCollection::new(id_field, crs);
        for (k, feature) in features.into_iter().enumerate() {
            let id = feature
                .properties
                .iter()
                .find(|(name, _)| *name == coll.id_field)
                .map(|(_, value)| value)
                .ok_or_else(|| coll.identity_error(format!("missing on feature #{}", k)))?
                .as_tile_id()
                .ok_or_else(|| coll.identity_error(format!("not an integer on feature #{}", k)))?;

            coll.push(id, None, feature.polygon)?;
            for (name, value) in feature.properties {
                if name == coll.id_field {
                    continue;
                }
                let col = coll.add_column(&name);
                let pos = coll.tiles.len() - 1;
                coll.tiles[pos].values[col] = value;
            }
        }
        Ok(coll)
    }

    /// Append a tile. Fails if the id is already present.
    pub fn push(&mut self, id: TileId, cell: Option<GridCell>, polygon: Polygon<f64>) -> Result<()> {
        if self.positions.contains_key(&id) {
            return Err(self.identity_error(format!("duplicate id {}", id)).into());
        }
        self.positions.insert(id, self.tiles.len());
        self.tiles.push(Tile {
            id,
            cell,
            polygon,
            values: vec![AttrValue::Null; self.columns.len()],
        });
        Ok(())
    }

    fn identity_error(&self, reason: String) -> PlotError {
        PlotError::MissingIdentityField {
            field: self.id_field.clone(),
            reason,
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Attribute column names (excluding the id field).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of the column `name`, adding it if absent.
    pub fn add_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        if name.len() > SHAPEFILE_FIELD_LIMIT {
            warn!(
                "attribute `{}' is longer than {} characters; shapefile output will truncate it",
                name, SHAPEFILE_FIELD_LIMIT
            );
        }
        self.columns.push(name.to_string());
        for tile in &mut self.tiles {
            tile.values.push(AttrValue::Null);
        }
        self.columns.len() - 1
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tile> {
        self.tiles.iter()
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.positions.get(&id).map(|&pos| &self.tiles[pos])
    }

    pub fn ids(&self) -> impl ExactSizeIterator<Item = TileId> + '_ {
        self.tiles.iter().map(|t| t.id)
    }

    pub fn value(&self, id: TileId, column: &str) -> Option<&AttrValue> {
        let col = self.column_index(column)?;
        self.get(id).map(|t| &t.values[col])
    }

    /// Set (adding the column if needed) an attribute of
    /// tile `id`. Returns the previous value, or `None` if
    /// there is no such tile.
    pub fn set_value(&mut self, id: TileId, column: &str, value: AttrValue) -> Option<AttrValue> {
        let pos = *self.positions.get(&id)?;
        let col = self.add_column(column);
        Some(std::mem::replace(&mut self.tiles[pos].values[col], value))
    }

    /// Merge per-tile statistics as attributes. Columns
    /// missing from the collection are added; records for
    /// unknown tile ids are skipped. Both, as well as any
    /// non-null value being replaced, are reported.
    pub fn merge_stats(&mut self, table: &StatTable) -> MergeReport {
        let mut report = MergeReport::default();

        let mut cols = Vec::with_capacity(table.schema().columns().len());
        for name in table.schema().columns() {
            if self.column_index(name).is_none() {
                report.added_columns.push(name.clone());
            }
            cols.push(self.add_column(name));
        }

        for record in table.records() {
            let pos = match self.positions.get(&record.tile_id) {
                Some(&pos) => pos,
                None => {
                    report.skipped_ids.push(record.tile_id);
                    continue;
                }
            };
            for (&col, &value) in cols.iter().zip(record.values.iter()) {
                let slot = &mut self.tiles[pos].values[col];
                if !slot.is_null() && !report.overwritten_columns.contains(&self.columns[col]) {
                    report.overwritten_columns.push(self.columns[col].clone());
                }
                *slot = AttrValue::Real(value);
            }
        }

        for name in &report.overwritten_columns {
            warn!("merge replaced existing values of attribute `{}'", name);
        }
        if !report.skipped_ids.is_empty() {
            warn!(
                "{} statistic records had no matching tile: {:?}",
                report.skipped_ids.len(),
                report.skipped_ids
            );
        }
        info!(
            "merged {} records ({} new attributes)",
            table.records().len() - report.skipped_ids.len(),
            report.added_columns.len()
        );
        report
    }
}
