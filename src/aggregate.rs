//! Reduce per-tile index arrays to statistic records.
//!
//! # Schema
//!
//! The set of attributes produced is fixed when the
//! aggregator is created: one column per (statistic, index)
//! pair, named `<prefix><index>` (see [`StatKind::prefix`]).
//! Columns are ordered statistic-major: all means, then all
//! standard deviations, and so on, each in index order.
//!
//! # Missing data
//!
//! Arrays are expected to hold `NaN` for pixels outside the
//! tile or without data. An index absent from the arrays of
//! a tile yields `NaN` for all of its statistics; the tile
//! is still aggregated. A statistic that is undefined for
//! the values of one index (eg. the mode of a sample with
//! infinite values) is `NaN` for that index only.

use std::collections::BTreeMap;

use anyhow::bail;
use log::warn;
use ndarray::ArrayD;
use serde_derive::Serialize;
use serde_json::{Map, Value};

use crate::stats::{StatKind, Summary};
use crate::tiles::TileId;
use crate::Result;

#[cfg(feature = "use-rayon")]
mod par_aggregate;

/// Index arrays of one tile, by index name.
pub type IndexArrays = BTreeMap<String, ArrayD<f64>>;

/// Attribute columns produced for a set of indices.
#[derive(Debug, Clone, PartialEq)]
pub struct StatSchema {
    indices: Vec<String>,
    columns: Vec<String>,
}

impl StatSchema {
    /// Index names must be non-empty and distinct.
    pub fn new(indices: Vec<String>) -> Result<Self> {
        for (i, name) in indices.iter().enumerate() {
            if name.is_empty() {
                bail!("index name must not be empty");
            }
            if indices[..i].contains(name) {
                bail!("index `{}' given more than once", name);
            }
        }
        let columns = StatKind::ALL
            .iter()
            .flat_map(|kind| indices.iter().map(move |index| kind.field_name(index)))
            .collect();
        Ok(StatSchema { indices, columns })
    }

    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of the `kind` column of `index`.
    pub fn column(&self, kind: StatKind, index: &str) -> Option<usize> {
        let i = self.indices.iter().position(|name| name == index)?;
        let k = StatKind::ALL.iter().position(|&other| other == kind)?;
        Some(k * self.indices.len() + i)
    }
}

/// Statistics of one tile, aligned with the columns of a
/// [`StatSchema`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatRecord {
    pub tile_id: TileId,
    pub values: Vec<f64>,
}

/// Records of many tiles sharing one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct StatTable {
    schema: StatSchema,
    records: Vec<StatRecord>,
}

impl StatTable {
    pub fn new(schema: StatSchema, records: Vec<StatRecord>) -> Self {
        StatTable { schema, records }
    }

    pub fn schema(&self) -> &StatSchema {
        &self.schema
    }

    pub fn records(&self) -> &[StatRecord] {
        &self.records
    }

    pub fn push(&mut self, record: StatRecord) {
        debug_assert_eq!(record.values.len(), self.schema.columns.len());
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Value of `column` for tile `id`.
    pub fn value(&self, id: TileId, column: &str) -> Option<f64> {
        let col = self.schema.columns.iter().position(|c| c == column)?;
        self.records
            .iter()
            .find(|r| r.tile_id == id)
            .map(|r| r.values[col])
    }

    /// The records as JSON objects keyed by column name, with
    /// the tile id stored under `id_field`. `NaN` becomes
    /// `null`.
    pub fn to_json(&self, id_field: &str) -> Value {
        let records = self
            .records
            .iter()
            .map(|r| {
                let mut obj = Map::new();
                obj.insert(id_field.to_string(), Value::from(r.tile_id));
                for (name, &v) in self.schema.columns.iter().zip(r.values.iter()) {
                    obj.insert(name.clone(), Value::from(v));
                }
                Value::Object(obj)
            })
            .collect();
        Value::Array(records)
    }
}

/// Computes a [`StatRecord`] for each tile.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    schema: StatSchema,
}

impl StatsAggregator {
    pub fn new(indices: Vec<String>) -> Result<Self> {
        Ok(StatsAggregator {
            schema: StatSchema::new(indices)?,
        })
    }

    pub fn schema(&self) -> &StatSchema {
        &self.schema
    }

    /// An empty table for the records of this aggregator.
    pub fn table(&self) -> StatTable {
        StatTable::new(self.schema.clone(), vec![])
    }

    pub fn aggregate(&self, tile_id: TileId, arrays: &IndexArrays) -> StatRecord {
        let summaries: Vec<Summary> = self
            .schema
            .indices
            .iter()
            .map(|index| match arrays.get(index) {
                Some(arr) => Summary::of(arr.iter().cloned()),
                None => {
                    warn!("tile {}: index `{}' not computed", tile_id, index);
                    Summary::empty()
                }
            })
            .collect();

        let values = StatKind::ALL
            .iter()
            .flat_map(|&kind| summaries.iter().map(move |s| kind.value(s)))
            .collect();
        StatRecord { tile_id, values }
    }

    /// Aggregate a sequence of tiles, in order.
    pub fn aggregate_all<I>(&self, tiles: I) -> StatTable
    where
        I: IntoIterator<Item = (TileId, IndexArrays)>,
    {
        let mut table = self.table();
        for (id, arrays) in tiles {
            table.push(self.aggregate(id, &arrays));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array};

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn schema_is_kind_major() {
        let schema = StatSchema::new(names(&["ndvi", "ndre"])).unwrap();
        assert_eq!(schema.columns().len(), 22);
        assert_eq!(&schema.columns()[..4], &names(&["avg_ndvi", "avg_ndre", "std_ndvi", "std_ndre"])[..]);
        assert_eq!(schema.column(StatKind::Uniformity, "ndre"), Some(21));
        assert_eq!(schema.column(StatKind::Mean, "gndvi"), None);

        assert!(StatSchema::new(names(&["ndvi", "ndvi"])).is_err());
        assert!(StatSchema::new(names(&[""])).is_err());
    }

    #[test]
    fn aggregate_tile() {
        let agg = StatsAggregator::new(names(&["ndvi", "dsm"])).unwrap();
        let mut arrays = IndexArrays::new();
        arrays.insert(
            "ndvi".into(),
            arr2(&[[0.2, 0.4], [f64::NAN, 0.6]]).into_dyn(),
        );

        let rec = agg.aggregate(7, &arrays);
        assert_eq!(rec.tile_id, 7);
        assert_eq!(rec.values.len(), 22);

        let col = |kind, index| agg.schema().column(kind, index).unwrap();
        assert!((rec.values[col(StatKind::Mean, "ndvi")] - 0.4).abs() < 1e-12);
        assert!((rec.values[col(StatKind::Median, "ndvi")] - 0.4).abs() < 1e-12);
        assert!((rec.values[col(StatKind::Range, "ndvi")] - 0.4).abs() < 1e-12);
        // missing index
        assert!(rec.values[col(StatKind::Mean, "dsm")].is_nan());
        assert!(rec.values[col(StatKind::Uniformity, "dsm")].is_nan());
    }

    #[test]
    fn degenerate_index_stays_local() {
        let agg = StatsAggregator::new(names(&["ndvi", "dsm", "rvi"])).unwrap();
        let mut arrays = IndexArrays::new();
        arrays.insert("ndvi".into(), Array::from_elem((3, 3), 0.5).into_dyn());
        arrays.insert("dsm".into(), Array::from_elem((3, 3), 1e17).into_dyn());
        arrays.insert(
            "rvi".into(),
            arr2(&[[1., 2.], [2., f64::INFINITY]]).into_dyn(),
        );

        let rec = agg.aggregate(3, &arrays);
        let val = |kind, index| rec.values[agg.schema().column(kind, index).unwrap()];

        assert_eq!(val(StatKind::Mean, "ndvi"), 0.5);
        assert_eq!(val(StatKind::Mode, "ndvi"), 0.5);
        assert_eq!(val(StatKind::Uniformity, "ndvi"), 1.);

        assert_eq!(val(StatKind::Mean, "dsm"), 1e17);
        assert_eq!(val(StatKind::Mode, "dsm"), 1e17);
        assert_eq!(val(StatKind::Std, "dsm"), 0.);

        assert_eq!(val(StatKind::Median, "rvi"), 2.);
        assert!(val(StatKind::Mode, "rvi").is_nan());
        assert!(val(StatKind::Mean, "rvi").is_nan());
    }

    #[test]
    fn table_lookup_and_json() {
        let agg = StatsAggregator::new(names(&["dsm"])).unwrap();
        let tiles = (1..=3).map(|id| {
            let mut arrays = IndexArrays::new();
            arrays.insert("dsm".into(), Array::from_elem((2, 2), id as f64).into_dyn());
            (id, arrays)
        });
        let table = agg.aggregate_all(tiles);
        assert_eq!(table.len(), 3);
        assert_eq!(table.value(2, "avg_dsm"), Some(2.));
        assert_eq!(table.value(3, "std_dsm"), Some(0.));
        assert_eq!(table.value(4, "avg_dsm"), None);

        let json = table.to_json("FID");
        assert_eq!(json[0]["FID"], 1);
        assert_eq!(json[1]["avg_dsm"], 2.0);
        // constant sample: undefined skewness
        assert!(json[2]["skew_dsm"].is_null());
    }
}
