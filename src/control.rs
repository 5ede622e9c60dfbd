//! Control quadrilateral describing the field to
//! partition.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Coord, Line, LineString, Polygon};

use crate::error::PlotError;
use crate::Result;

/// Four ordered control points. The points are matched (in
/// order) with the unit square corners `(0, 0)`, `(1, 0)`,
/// `(1, 1)` and `(0, 1)`: typically north-west,
/// north-east, south-east and south-west corners of the
/// field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlQuad([Coord<f64>; 4]);

impl ControlQuad {
    /// Construct from four points. The points must form a
    /// simple quadrilateral with no three points collinear.
    pub fn new(points: [Coord<f64>; 4]) -> Result<Self> {
        if !is_simple_ring(&points) {
            return Err(PlotError::MissingControlGeometry(
                "control points do not form a simple polygon".into(),
            )
            .into());
        }
        check_non_collinear(&points)?;
        Ok(ControlQuad(points))
    }

    /// Resolve the control quadrilateral from either a list
    /// of points or a polygon; points take precedence.
    ///
    /// - `points`: at least 4 points which (all together)
    /// form a simple polygon; the first four are used.
    ///
    /// - `polygon`: a simple polygon with at least 4
    /// distinct exterior vertices; the first four are used.
    pub fn from_inputs(
        points: Option<&[Coord<f64>]>,
        polygon: Option<&Polygon<f64>>,
    ) -> Result<Self> {
        if let Some(points) = points {
            return ControlQuad::from_points(points);
        }
        if let Some(polygon) = polygon {
            return ControlQuad::from_polygon(polygon);
        }
        Err(PlotError::MissingControlGeometry(
            "neither control points nor a boundary polygon was given".into(),
        )
        .into())
    }

    pub fn from_points(points: &[Coord<f64>]) -> Result<Self> {
        if points.len() < 4 {
            return Err(PlotError::MissingControlGeometry(format!(
                "need at least 4 control points, got {}",
                points.len()
            ))
            .into());
        }
        if !is_simple_ring(points) {
            return Err(PlotError::MissingControlGeometry(
                "control points do not form a simple polygon".into(),
            )
            .into());
        }
        ControlQuad::new([points[0], points[1], points[2], points[3]])
    }

    pub fn from_polygon(polygon: &Polygon<f64>) -> Result<Self> {
        let vertices = ring_vertices(polygon.exterior());
        if vertices.len() < 4 {
            return Err(PlotError::MissingControlGeometry(format!(
                "boundary polygon needs at least 4 vertices, got {}",
                vertices.len()
            ))
            .into());
        }
        if !is_simple_ring(&vertices) {
            return Err(PlotError::MissingControlGeometry(
                "boundary polygon is not simple".into(),
            )
            .into());
        }
        ControlQuad::new([vertices[0], vertices[1], vertices[2], vertices[3]])
    }

    pub fn points(&self) -> &[Coord<f64>; 4] {
        &self.0
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(LineString::from(self.0.to_vec()), vec![])
    }
}

/// Exterior vertices without the closing coordinate.
fn ring_vertices(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords = ring.0.clone();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

/// Whether the closed ring through `pts` is simple: it has
/// non-zero area, edges only meet at their shared vertex,
/// and non-adjacent edges don't meet at all.
fn is_simple_ring(pts: &[Coord<f64>]) -> bool {
    let n = pts.len();
    if n < 3 || pts.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return false;
    }

    let ring = Polygon::new(LineString::from(pts.to_vec()), vec![]);
    if ring.unsigned_area() <= 0. {
        return false;
    }

    let edges: Vec<_> = (0..n).map(|i| Line::new(pts[i], pts[(i + 1) % n])).collect();
    if edges.iter().any(|e| e.start == e.end) {
        return false;
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            let shared = if j == i + 1 { edges[i].end } else { edges[i].start };
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) if adjacent => {
                    if intersection != shared {
                        return false;
                    }
                }
                Some(LineIntersection::Collinear { intersection }) if adjacent => {
                    if intersection.start != shared || intersection.end != shared {
                        return false;
                    }
                }
                Some(_) => return false,
            }
        }
    }
    true
}

fn check_non_collinear(pts: &[Coord<f64>; 4]) -> Result<()> {
    const TOLERANCE: f64 = 1e-10;
    for skip in 0..4 {
        let tri: Vec<_> = (0..4).filter(|&k| k != skip).map(|k| pts[k]).collect();
        let (a, b, c) = (tri[0], tri[1], tri[2]);
        let ab = b - a;
        let ac = c - a;
        let cross = ab.x * ac.y - ab.y * ac.x;
        let scale = (ab.x.hypot(ab.y)) * (ac.x.hypot(ac.y));
        if cross.abs() <= TOLERANCE * scale {
            return Err(PlotError::DegenerateControlPoints(format!(
                "control points ({}, {}), ({}, {}), ({}, {}) are collinear",
                a.x, a.y, b.x, b.y, c.x, c.y
            ))
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn kind(err: &crate::Error) -> Option<&PlotError> {
        err.downcast_ref::<PlotError>()
    }

    #[test]
    fn square_points() {
        let pts = [c(0., 10.), c(10., 10.), c(10., 0.), c(0., 0.)];
        let quad = ControlQuad::from_inputs(Some(&pts[..]), None).unwrap();
        assert_eq!(quad.points(), &pts);
    }

    #[test]
    fn points_take_precedence() {
        let pts = [c(0., 1.), c(1., 1.), c(1., 0.), c(0., 0.)];
        let poly = polygon![(x: 5., y: 5.), (x: 6., y: 5.), (x: 6., y: 6.), (x: 5., y: 6.)];
        let quad = ControlQuad::from_inputs(Some(&pts[..]), Some(&poly)).unwrap();
        assert_eq!(quad.points()[0], c(0., 1.));
    }

    #[test]
    fn polygon_first_four_vertices() {
        let poly = polygon![
            (x: 0., y: 0.), (x: 4., y: 0.), (x: 4., y: 3.), (x: 0., y: 3.)
        ];
        let quad = ControlQuad::from_inputs(None, Some(&poly)).unwrap();
        assert_eq!(quad.points()[2], c(4., 3.));
    }

    #[test]
    fn missing_geometry() {
        let err = ControlQuad::from_inputs(None, None).unwrap_err();
        assert!(matches!(kind(&err), Some(PlotError::MissingControlGeometry(_))));
    }

    #[test]
    fn triangle_polygon_is_rejected() {
        let poly = polygon![(x: 0., y: 0.), (x: 4., y: 0.), (x: 0., y: 3.)];
        let err = ControlQuad::from_inputs(None, Some(&poly)).unwrap_err();
        assert!(matches!(kind(&err), Some(PlotError::MissingControlGeometry(_))));
    }

    #[test]
    fn bow_tie_is_rejected() {
        let pts = [c(0., 0.), c(1., 1.), c(1., 0.), c(0., 1.)];
        let err = ControlQuad::from_inputs(Some(&pts[..]), None).unwrap_err();
        assert!(matches!(kind(&err), Some(PlotError::MissingControlGeometry(_))));
    }

    #[test]
    fn collinear_quad_is_rejected() {
        let pts = [c(0., 0.), c(1., 0.), c(2., 0.), c(3., 0.)];
        assert!(ControlQuad::from_points(&pts).is_err());

        // simple polygon, but three corners on a line
        let pts = [c(0., 0.), c(1., 0.), c(2., 0.), c(1., 1.)];
        let err = ControlQuad::from_points(&pts).unwrap_err();
        assert!(matches!(kind(&err), Some(PlotError::DegenerateControlPoints(_))));
    }
}
