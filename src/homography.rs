//! Projective transform between a control quadrilateral
//! and the unit square.
//!
//! The homography `H` maps homogeneous geographic
//! coordinates `(x, y, 1)` to `(u, v, w)`; the normalized
//! point is `(u / w, v / w)`. `H[2, 2]` is fixed to `1`,
//! leaving the usual 8 degrees of freedom.
//!
//! # Estimation
//!
//! Each point pair `(x, y) -> (u, v)` contributes two rows
//! to a linear system `A h = b`:
//!
//! `[x, y, 1, 0, 0, 0, -x u, -y u] . h = u`
//!
//! `[0, 0, 0, x, y, 1, -x v, -y v] . h = v`
//!
//! The system is solved in the least-squares sense with an
//! SVD, so more than four pairs are accepted. Geographic
//! coordinates of a field are typically large numbers with
//! small differences (eg. degrees with 1e-4 spread), so the
//! source points are first centered and scaled (Hartley
//! normalization) and the result is composed with the
//! normalizing transform.

use anyhow::Context;
use geo::Coord;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use crate::error::PlotError;
use crate::Result;

/// Corners of the unit square, in the order the control
/// points are matched against.
pub const UNIT_SQUARE: [Coord<f64>; 4] = [
    Coord { x: 0., y: 0. },
    Coord { x: 1., y: 0. },
    Coord { x: 1., y: 1. },
    Coord { x: 0., y: 1. },
];

/// Relative threshold on singular values below which the
/// estimation system is considered rank deficient.
const RANK_TOLERANCE: f64 = 1e-10;

/// A projective transform together with its inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct Homography {
    forward: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Homography {
    /// Wrap an explicit matrix. Fails with
    /// [`PlotError::SingularTransform`] if it cannot be
    /// inverted.
    pub fn from_matrix(forward: Matrix3<f64>) -> Result<Self> {
        let inverse = invert(&forward)?;
        Ok(Homography { forward, inverse })
    }

    /// Estimate the homography mapping each `src[i]` to
    /// `dst[i]` in the least-squares sense.
    pub fn estimate(src: &[Coord<f64>], dst: &[Coord<f64>]) -> Result<Self> {
        if src.len() != dst.len() {
            return Err(PlotError::DegenerateControlPoints(format!(
                "{} source points but {} destination points",
                src.len(),
                dst.len()
            ))
            .into());
        }
        if src.len() < 4 {
            return Err(PlotError::DegenerateControlPoints(format!(
                "need at least 4 point pairs, got {}",
                src.len()
            ))
            .into());
        }
        if src.iter().chain(dst).any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(
                PlotError::DegenerateControlPoints("non-finite coordinate".into()).into(),
            );
        }

        let norm = normalizing_transform(src)?;
        let normalized: Vec<_> = src
            .iter()
            .map(|c| {
                let p = norm * Vector3::new(c.x, c.y, 1.);
                (p.x, p.y)
            })
            .collect();

        let rows = 2 * src.len();
        let mut a = DMatrix::<f64>::zeros(rows, 8);
        let mut b = DVector::<f64>::zeros(rows);
        for (k, (&(x, y), d)) in normalized.iter().zip(dst).enumerate() {
            let (u, v) = (d.x, d.y);
            let r = 2 * k;
            a.row_mut(r)
                .copy_from_slice(&[x, y, 1., 0., 0., 0., -x * u, -y * u]);
            a.row_mut(r + 1)
                .copy_from_slice(&[0., 0., 0., x, y, 1., -x * v, -y * v]);
            b[r] = u;
            b[r + 1] = v;
        }

        let svd = a.svd(true, true);
        let max_sv = svd.singular_values.max();
        let rank = svd
            .singular_values
            .iter()
            .filter(|&&s| s > max_sv * RANK_TOLERANCE)
            .count();
        if rank < 8 {
            return Err(PlotError::DegenerateControlPoints(format!(
                "estimation system has rank {} (< 8)",
                rank
            ))
            .into());
        }

        let h = svd
            .solve(&b, max_sv * RANK_TOLERANCE)
            .map_err(|e| PlotError::DegenerateControlPoints(e.to_string()))?;

        let normalized_h = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.);
        let mut forward = normalized_h * norm;
        let scale = forward[(2, 2)];
        if scale.abs() > f64::EPSILON {
            forward /= scale;
        }

        if !forward.iter().all(|v| v.is_finite()) {
            return Err(
                PlotError::DegenerateControlPoints("estimated transform is not finite".into())
                    .into(),
            );
        }
        Homography::from_matrix(forward)
            .with_context(|| "inverting estimated homography")
    }

    /// Estimate the homography mapping the four control
    /// points to the corners of the unit square (see
    /// [`UNIT_SQUARE`]).
    pub fn to_unit_square(quad: &[Coord<f64>; 4]) -> Result<Self> {
        Homography::estimate(&quad[..], &UNIT_SQUARE[..])
    }

    /// The forward matrix `H`.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.forward
    }

    /// The reverse homography.
    pub fn inverse(&self) -> Homography {
        Homography {
            forward: self.inverse,
            inverse: self.forward,
        }
    }

    /// Map a geographic point to normalized coordinates.
    #[inline]
    pub fn apply(&self, c: Coord<f64>) -> Coord<f64> {
        project(&self.forward, c)
    }

    /// Map a normalized point back to geographic
    /// coordinates.
    #[inline]
    pub fn apply_inverse(&self, c: Coord<f64>) -> Coord<f64> {
        project(&self.inverse, c)
    }
}

#[inline]
fn project(m: &Matrix3<f64>, c: Coord<f64>) -> Coord<f64> {
    let p = m * Vector3::new(c.x, c.y, 1.);
    Coord {
        x: p.x / p.z,
        y: p.y / p.z,
    }
}

fn invert(m: &Matrix3<f64>) -> Result<Matrix3<f64>> {
    let det = m.determinant();
    let scale = m.iter().fold(0f64, |acc, v| acc.max(v.abs()));
    if !det.is_finite() || scale == 0. || det.abs() <= f64::EPSILON * scale.powi(3) {
        return Err(PlotError::SingularTransform.into());
    }
    m.try_inverse()
        .ok_or_else(|| PlotError::SingularTransform.into())
}

/// Similarity transform moving the centroid of `pts` to the
/// origin with a mean distance of `sqrt(2)`.
fn normalizing_transform(pts: &[Coord<f64>]) -> Result<Matrix3<f64>> {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|c| c.x).sum::<f64>() / n;
    let cy = pts.iter().map(|c| c.y).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|c| ((c.x - cx).powi(2) + (c.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !(mean_dist > 0.) {
        return Err(
            PlotError::DegenerateControlPoints("all control points coincide".into()).into(),
        );
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Ok(Matrix3::new(s, 0., -s * cx, 0., s, -s * cy, 0., 0., 1.))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn field_quad() -> [Coord<f64>; 4] {
        [
            c(123.30425725, 41.64233339),
            c(123.30442390, 41.64232080),
            c(123.304318616, 41.641444947),
            c(123.30415355, 41.64145984),
        ]
    }

    #[test]
    fn unit_square_is_identity() {
        let h = Homography::to_unit_square(&UNIT_SQUARE).unwrap();
        assert_abs_diff_eq!(*h.matrix(), Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn control_points_map_to_corners() {
        let quad = field_quad();
        let h = Homography::to_unit_square(&quad).unwrap();
        assert_eq!(h.matrix()[(2, 2)], 1.);
        for (p, corner) in quad.iter().zip(UNIT_SQUARE.iter()) {
            let n = h.apply(*p);
            assert_abs_diff_eq!(n.x, corner.x, epsilon = 1e-8);
            assert_abs_diff_eq!(n.y, corner.y, epsilon = 1e-8);
        }
    }

    #[test]
    fn forward_inverse_roundtrip() {
        let quad = field_quad();
        let h = Homography::to_unit_square(&quad).unwrap();
        for p in quad.iter() {
            let back = h.apply_inverse(h.apply(*p));
            assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-9);
            assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-9);
        }
        let inv = h.inverse();
        let mid = inv.apply(c(0.5, 0.5));
        assert_abs_diff_eq!(h.apply(mid).x, 0.5, epsilon = 1e-8);
    }

    #[test]
    fn projective_quad() {
        // A trapezoid needs the projective terms.
        let quad = [c(0., 0.), c(4., 0.), c(3., 2.), c(1., 2.)];
        let h = Homography::to_unit_square(&quad).unwrap();
        assert!(h.matrix()[(2, 1)].abs() > 1e-6);
        for (p, corner) in quad.iter().zip(UNIT_SQUARE.iter()) {
            let n = h.apply(*p);
            assert_abs_diff_eq!(n.x, corner.x, epsilon = 1e-10);
            assert_abs_diff_eq!(n.y, corner.y, epsilon = 1e-10);
        }
    }

    #[test]
    fn overdetermined_estimation() {
        let src = [c(0., 0.), c(2., 0.), c(2., 2.), c(0., 2.), c(1., 1.)];
        let dst = [c(0., 0.), c(1., 0.), c(1., 1.), c(0., 1.), c(0.5, 0.5)];
        let h = Homography::estimate(&src, &dst).unwrap();
        let n = h.apply(c(1., 0.5));
        assert_abs_diff_eq!(n.x, 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(n.y, 0.25, epsilon = 1e-10);
    }

    #[test]
    fn collinear_points_fail() {
        let quad = [c(0., 0.), c(1., 1.), c(2., 2.), c(3., 3.)];
        let err = Homography::to_unit_square(&quad).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlotError>(),
            Some(PlotError::DegenerateControlPoints(_))
        ));
    }

    #[test]
    fn too_few_points_fail() {
        let err = Homography::estimate(&UNIT_SQUARE[..3], &UNIT_SQUARE[..3]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlotError>(),
            Some(PlotError::DegenerateControlPoints(_))
        ));
    }

    #[test]
    fn singular_matrix_fails() {
        let m = Matrix3::new(1., 2., 3., 2., 4., 6., 0., 0., 1.);
        let err = Homography::from_matrix(m).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PlotError>(),
            Some(&PlotError::SingularTransform)
        );
    }
}
