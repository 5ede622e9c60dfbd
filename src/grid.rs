//! Partition a control quadrilateral into a grid of tiles.
//!
//! The grid is uniform in the normalized (unit square)
//! space of the control quadrilateral. Each cell is shrunk
//! about its center and the corners are mapped back to
//! geographic coordinates with the inverse homography, so
//! the tiles follow the perspective of the field.

use std::fmt;
use std::str::FromStr;

use geo::{Coord, LineString, Polygon};
use log::info;

use crate::control::ControlQuad;
use crate::error::PlotError;
use crate::homography::Homography;
use crate::raster::Crs;
use crate::tiles::{GridCell, TileCollection, TileId, DEFAULT_ID_FIELD};
use crate::Result;

/// Order in which tile ids are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdOrder {
    /// Row-major from the first control point: cell `(0,
    /// 0)` gets `start_id + 1`.
    TopLeft,
    /// Reverse of `TopLeft`: cell `(0, 0)` gets `start_id +
    /// columns * rows`.
    BottomRight,
}

impl Default for IdOrder {
    fn default() -> Self {
        IdOrder::TopLeft
    }
}

impl FromStr for IdOrder {
    type Err = PlotError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "top-left" => Ok(IdOrder::TopLeft),
            "bottom-right" => Ok(IdOrder::BottomRight),
            _ => Err(PlotError::InvalidOrderingMode(s.to_string())),
        }
    }
}

impl fmt::Display for IdOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdOrder::TopLeft => "top-left",
            IdOrder::BottomRight => "bottom-right",
        })
    }
}

/// Grid parameters. Construct with [`GridConfig::new`] and
/// refine with the `with_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    columns: usize,
    rows: usize,
    shrink: (f64, f64),
    order: IdOrder,
    start_id: TileId,
    id_field: String,
}

impl GridConfig {
    pub fn new(columns: usize, rows: usize) -> Self {
        GridConfig {
            columns,
            rows,
            shrink: (1., 1.),
            order: IdOrder::TopLeft,
            start_id: 0,
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }

    /// Fraction of the cell width (resp. height) kept.
    pub fn with_shrink(mut self, shrink: (f64, f64)) -> Self {
        self.shrink = shrink;
        self
    }

    pub fn with_order(mut self, order: IdOrder) -> Self {
        self.order = order;
        self
    }

    /// Offset added to every id. Grids that end up in the
    /// same dataset need disjoint id ranges.
    pub fn with_start_id(mut self, start_id: TileId) -> Self {
        self.start_id = start_id;
        self
    }

    pub fn with_id_field<S: Into<String>>(mut self, id_field: S) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn shrink(&self) -> (f64, f64) {
        self.shrink
    }

    pub fn order(&self) -> IdOrder {
        self.order
    }

    pub fn start_id(&self) -> TileId {
        self.start_id
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns == 0 || self.rows == 0 {
            return Err(PlotError::InvalidGridSize {
                columns: self.columns,
                rows: self.rows,
            }
            .into());
        }
        let (sx, sy) = self.shrink;
        let valid = |s: f64| s > 0. && s <= 1.;
        if !valid(sx) || !valid(sy) {
            return Err(PlotError::InvalidShrinkRatio(sx, sy).into());
        }
        Ok(())
    }

    /// Id of the tile at `(row, col)`.
    pub fn tile_id(&self, row: usize, col: usize) -> TileId {
        let m = self.columns as TileId;
        let n = self.rows as TileId;
        let k = row as TileId * m + col as TileId;
        match self.order {
            IdOrder::TopLeft => self.start_id + k + 1,
            IdOrder::BottomRight => self.start_id + m * n - k,
        }
    }

    /// The shrunk cell `(row, col)` in normalized
    /// coordinates, as `(min, max)` corners.
    pub fn normalized_cell(&self, row: usize, col: usize) -> (Coord<f64>, Coord<f64>) {
        let (x0, x1) = shrink_span(
            col as f64 / self.columns as f64,
            (col + 1) as f64 / self.columns as f64,
            self.shrink.0,
        );
        let (y0, y1) = shrink_span(
            row as f64 / self.rows as f64,
            (row + 1) as f64 / self.rows as f64,
            self.shrink.1,
        );
        (Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }

    /// Partition `quad` into `columns x rows` tiles. Tiles
    /// are stored column by column (all rows of column 0
    /// first).
    pub fn partition(&self, quad: &ControlQuad, crs: Option<Crs>) -> Result<TileCollection> {
        self.validate()?;
        let homography = Homography::to_unit_square(quad.points())?;

        let mut tiles = TileCollection::new(self.id_field.clone(), crs);
        for col in 0..self.columns {
            for row in 0..self.rows {
                let (lo, hi) = self.normalized_cell(row, col);
                let corners = [
                    lo,
                    Coord { x: hi.x, y: lo.y },
                    hi,
                    Coord { x: lo.x, y: hi.y },
                ];
                let ring: Vec<_> = corners
                    .iter()
                    .map(|&c| homography.apply_inverse(c))
                    .collect();
                tiles.push(
                    self.tile_id(row, col),
                    Some(GridCell { row, col }),
                    Polygon::new(LineString::from(ring), vec![]),
                )?;
            }
        }

        info!(
            "partitioned field into {}x{} tiles ({} order, start id {})",
            self.columns, self.rows, self.order, self.start_id
        );
        Ok(tiles)
    }
}

#[inline]
fn shrink_span(lo: f64, hi: f64, ratio: f64) -> (f64, f64) {
    let margin = (hi - lo) * (1. - ratio) / 2.;
    (lo + margin, hi - margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use geo::Area;
    use rand::Rng;
    use std::collections::HashSet;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn unit_field() -> ControlQuad {
        ControlQuad::new([c(0., 1.), c(1., 1.), c(1., 0.), c(0., 0.)]).unwrap()
    }

    fn skewed_field() -> ControlQuad {
        ControlQuad::new([c(10., 20.), c(30., 22.), c(28., 5.), c(11., 3.)]).unwrap()
    }

    fn kind(err: &crate::Error) -> Option<&PlotError> {
        err.downcast_ref::<PlotError>()
    }

    #[test]
    fn parse_order() {
        assert_eq!("top-left".parse::<IdOrder>(), Ok(IdOrder::TopLeft));
        assert_eq!("bottom-right".parse::<IdOrder>(), Ok(IdOrder::BottomRight));
        assert_eq!(
            "diagonal".parse::<IdOrder>(),
            Err(PlotError::InvalidOrderingMode("diagonal".into()))
        );
    }

    #[test]
    fn invalid_configs() {
        let quad = unit_field();

        let err = GridConfig::new(0, 3).partition(&quad, None).unwrap_err();
        assert!(matches!(kind(&err), Some(PlotError::InvalidGridSize { .. })));

        for shrink in &[(0., 1.), (1., 1.5), (-0.5, 0.5), (0.5, f64::NAN)] {
            let err = GridConfig::new(2, 2)
                .with_shrink(*shrink)
                .partition(&quad, None)
                .unwrap_err();
            assert!(matches!(kind(&err), Some(PlotError::InvalidShrinkRatio(..))));
        }
    }

    #[test]
    fn ids_are_unique_and_contiguous() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let m = rng.gen_range(1, 12);
            let n = rng.gen_range(1, 12);
            let start = rng.gen_range(-100, 100);
            for &order in &[IdOrder::TopLeft, IdOrder::BottomRight] {
                let config = GridConfig::new(m, n).with_order(order).with_start_id(start);
                let ids: HashSet<_> = (0..n)
                    .flat_map(|row| (0..m).map(move |col| (row, col)))
                    .map(|(row, col)| config.tile_id(row, col))
                    .collect();
                let expected: HashSet<_> = (start + 1..=start + (m * n) as TileId).collect();
                assert_eq!(ids, expected);
            }
        }
    }

    #[test]
    fn reorder_symmetry() {
        let config = GridConfig::new(4, 3).with_start_id(100);
        assert_eq!(config.tile_id(0, 0), 101);
        assert_eq!(config.tile_id(0, 1), 102);
        assert_eq!(config.tile_id(1, 0), 105);

        let config = config.with_order(IdOrder::BottomRight);
        assert_eq!(config.tile_id(0, 0), 112);
        assert_eq!(config.tile_id(2, 3), 101);
    }

    #[test]
    fn tiles_are_closed_quads() {
        let tiles = GridConfig::new(3, 5).partition(&skewed_field(), None).unwrap();
        assert_eq!(tiles.len(), 15);
        for tile in tiles.iter() {
            let ring = tile.polygon().exterior();
            assert_eq!(ring.0.len(), 5);
            assert!(ring.is_closed());
        }
        // column outer, row inner
        let cells: Vec<_> = tiles.iter().take(2).map(|t| t.cell().unwrap()).collect();
        assert_eq!(cells, vec![GridCell { row: 0, col: 0 }, GridCell { row: 1, col: 0 }]);
    }

    #[test]
    fn full_shrink_reproduces_cells() {
        let quad = skewed_field();
        let config = GridConfig::new(3, 2);
        let tiles = config.partition(&quad, None).unwrap();
        let h = Homography::to_unit_square(quad.points()).unwrap();

        for tile in tiles.iter() {
            let cell = tile.cell().unwrap();
            let (lo, _) = config.normalized_cell(cell.row, cell.col);
            assert_abs_diff_eq!(lo.x, cell.col as f64 / 3., epsilon = 1e-15);
            assert_abs_diff_eq!(lo.y, cell.row as f64 / 2., epsilon = 1e-15);

            let first = h.apply(tile.polygon().exterior().0[0]);
            assert_abs_diff_eq!(first.x, lo.x, epsilon = 1e-9);
            assert_abs_diff_eq!(first.y, lo.y, epsilon = 1e-9);
        }

        // Corner tiles touch the control points.
        let first = tiles.get(1).unwrap().polygon().exterior().0[0];
        assert_abs_diff_eq!(first.x, 10., epsilon = 1e-8);
        assert_abs_diff_eq!(first.y, 20., epsilon = 1e-8);

        // Unshrunk tiles cover the field.
        let total: f64 = tiles.iter().map(|t| t.polygon().unsigned_area()).sum();
        assert_abs_diff_eq!(total, quad.to_polygon().unsigned_area(), epsilon = 1e-8);
    }

    #[test]
    fn two_by_two_half_shrink() {
        let tiles = GridConfig::new(2, 2)
            .with_shrink((0.5, 0.5))
            .partition(&unit_field(), None)
            .unwrap();

        assert_eq!(tiles.len(), 4);
        let ids: HashSet<_> = tiles.ids().collect();
        assert_eq!(ids, [1, 2, 3, 4].iter().cloned().collect());

        let cell_area = 0.25;
        for tile in tiles.iter() {
            assert_abs_diff_eq!(
                tile.polygon().unsigned_area() / cell_area,
                0.25,
                epsilon = 1e-9
            );
        }

        // Shrunk tile centered in cell (0, 0), which sits at
        // the first control point (0, 1).
        let t = tiles.get(1).unwrap();
        assert_eq!(t.cell(), Some(GridCell { row: 0, col: 0 }));
        let first = t.polygon().exterior().0[0];
        assert_abs_diff_eq!(first.x, 0.125, epsilon = 1e-9);
        assert_abs_diff_eq!(first.y, 0.875, epsilon = 1e-9);
    }
}
