//! Summary statistics of the pixel values of a tile.
//!
//! `NaN` values are ignored everywhere: they stand for
//! pixels outside the tile or without data. Statistics that
//! are undefined for the remaining sample are `NaN`, never
//! an error.
use serde_derive::Serialize;
use std::fmt;
use std::ops::AddAssign;

use crate::histogram::{percentile, Config, Histogram};

/// Accumulates count, sum, min and max of the non-`NaN`
/// values of a `f64` sample. Accumulation is done by
/// add-assigning (using `+=`) a value, or another
/// `PixelStats`.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PixelStats {
    max: f64,
    min: f64,
    sum: f64,
    count: usize,
}

impl Default for PixelStats {
    fn default() -> Self {
        use std::f64::*;
        PixelStats {
            max: NEG_INFINITY,
            min: INFINITY,
            sum: 0.,
            count: 0,
        }
    }
}

impl AddAssign<f64> for PixelStats {
    fn add_assign(&mut self, other: f64) {
        if other.is_nan() {
            return;
        }
        self.max = self.max.max(other);
        self.min = self.min.min(other);
        self.sum += other;
        self.count += 1;
    }
}

impl AddAssign<&PixelStats> for PixelStats {
    fn add_assign(&mut self, other: &PixelStats) {
        self.max = self.max.max(other.max);
        self.min = self.min.min(other.min);
        self.sum += other.sum;
        self.count += other.count;
    }
}

impl PixelStats {
    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// `NaN` if no value was added.
    #[inline]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }

    /// `NaN` if no value was added.
    #[inline]
    pub fn range(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.max - self.min
        }
    }
}

/// The statistics computed for every index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Mean,
    Std,
    Mode,
    Variance,
    Median,
    Iqr,
    Range,
    Skewness,
    Kurtosis,
    Cv,
    Uniformity,
}

impl StatKind {
    pub const ALL: [StatKind; 11] = [
        StatKind::Mean,
        StatKind::Std,
        StatKind::Mode,
        StatKind::Variance,
        StatKind::Median,
        StatKind::Iqr,
        StatKind::Range,
        StatKind::Skewness,
        StatKind::Kurtosis,
        StatKind::Cv,
        StatKind::Uniformity,
    ];

    /// Prefix of the attribute holding this statistic.
    pub fn prefix(self) -> &'static str {
        use StatKind::*;
        match self {
            Mean => "avg_",
            Std => "std_",
            Mode => "mode_",
            Variance => "var_",
            Median => "medi_",
            Iqr => "iqr_",
            Range => "rng_",
            Skewness => "skew_",
            Kurtosis => "kurt_",
            Cv => "cv_",
            Uniformity => "uni_",
        }
    }

    /// Attribute name of this statistic for `index`.
    pub fn field_name(self, index: &str) -> String {
        format!("{}{}", self.prefix(), index)
    }

    /// Value of this statistic in `summary`. Non-finite
    /// values are reported as `NaN`.
    pub fn value(self, summary: &Summary) -> f64 {
        use StatKind::*;
        let v = match self {
            Mean => summary.mean,
            Std => summary.std,
            Mode => summary.mode,
            Variance => summary.variance,
            Median => summary.median,
            Iqr => summary.iqr,
            Range => summary.range,
            Skewness => summary.skewness,
            Kurtosis => summary.kurtosis,
            Cv => summary.cv,
            Uniformity => summary.uniformity,
        };
        if v.is_finite() {
            v
        } else {
            f64::NAN
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('_'))
    }
}

/// All statistics of one sample.
///
/// Moments are population moments. Skewness is
/// `m3 / m2^1.5` and kurtosis is the excess kurtosis `m4 /
/// m2^2 - 3`, both biased; they are `NaN` for a constant
/// sample, or fewer than 3 (resp. 4) values. The mode is the
/// center of the fullest bin of a histogram with
/// [automatic][Config::auto] bins.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub mode: f64,
    pub variance: f64,
    pub median: f64,
    pub iqr: f64,
    pub range: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub cv: f64,
    pub uniformity: f64,
}

impl Summary {
    /// Summary of an empty sample: every statistic is `NaN`.
    pub fn empty() -> Self {
        use std::f64::NAN;
        Summary {
            count: 0,
            mean: NAN,
            std: NAN,
            mode: NAN,
            variance: NAN,
            median: NAN,
            iqr: NAN,
            range: NAN,
            skewness: NAN,
            kurtosis: NAN,
            cv: NAN,
            uniformity: NAN,
        }
    }

    pub fn of<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut acc = PixelStats::default();
        let mut sorted = Vec::new();
        for v in values {
            if v.is_nan() {
                continue;
            }
            acc += v;
            sorted.push(v);
        }
        if sorted.is_empty() {
            return Summary::empty();
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let constant = sorted[0] == sorted[sorted.len() - 1];

        let n = sorted.len() as f64;
        let mean = if constant { sorted[0] } else { acc.mean() };
        let (mut m2, mut m3, mut m4) = (0., 0., 0.);
        if !constant {
            for &v in &sorted {
                let d = v - mean;
                let d2 = d * d;
                m2 += d2;
                m3 += d2 * d;
                m4 += d2 * d2;
            }
        }
        let (m2, m3, m4) = (m2 / n, m3 / n, m4 / n);
        let std = m2.sqrt();

        let skewness = if sorted.len() < 3 || m2 == 0. {
            f64::NAN
        } else {
            m3 / m2.powf(1.5)
        };
        let kurtosis = if sorted.len() < 4 || m2 == 0. {
            f64::NAN
        } else {
            m4 / (m2 * m2) - 3.
        };

        let (cv, uniformity) = if mean == 0. {
            (0., 1.)
        } else {
            let ratio = std / mean;
            (ratio, (1. - ratio).clamp(0., 1.))
        };

        Summary {
            count: sorted.len(),
            mean,
            std,
            mode: mode(&sorted),
            variance: m2,
            median: percentile(&sorted, 50.),
            iqr: percentile(&sorted, 75.) - percentile(&sorted, 25.),
            range: acc.range(),
            skewness,
            kurtosis,
            cv,
            uniformity,
        }
    }
}

/// `NaN` if the values do not fit a histogram (eg. some
/// are infinite).
fn mode(sorted: &[f64]) -> f64 {
    match (sorted.first(), sorted.last()) {
        (Some(&first), Some(&last)) if first == last => return first,
        _ => {}
    }
    let cfg = match Config::auto(sorted) {
        Some(cfg) => cfg,
        None => return f64::NAN,
    };
    let mut hist = Histogram::new(&cfg);
    for &v in sorted {
        hist += v;
    }
    hist.mode().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn constant_sample() {
        let s = Summary::of(vec![5.; 12]);
        assert_eq!(s.count, 12);
        assert_eq!(s.mean, 5.);
        assert_eq!(s.std, 0.);
        assert_eq!(s.variance, 0.);
        assert_eq!(s.mode, 5.);
        assert_eq!(s.median, 5.);
        assert_eq!(s.iqr, 0.);
        assert_eq!(s.range, 0.);
        assert_eq!(s.cv, 0.);
        assert_eq!(s.uniformity, 1.);
        assert!(s.skewness.is_nan());
        assert!(s.kurtosis.is_nan());
    }

    #[test]
    fn all_nan_sample() {
        let s = Summary::of(vec![f64::NAN; 7]);
        assert_eq!(s.count, 0);
        for kind in StatKind::ALL.iter() {
            assert!(kind.value(&s).is_nan(), "{} should be NaN", kind);
        }
        assert!(Summary::of(Vec::new()).mean.is_nan());
    }

    #[test]
    fn small_sample() {
        let s = Summary::of(vec![4., f64::NAN, 1., 3., 2.]);
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.variance, 1.25);
        assert_abs_diff_eq!(s.std, 1.25f64.sqrt());
        assert_eq!(s.median, 2.5);
        assert_eq!(s.iqr, 1.5);
        assert_eq!(s.range, 3.);
        assert_eq!(s.mode, 3.5);
        assert_abs_diff_eq!(s.skewness, 0., epsilon = 1e-12);
        assert_abs_diff_eq!(s.kurtosis, -1.36, epsilon = 1e-12);
        assert_abs_diff_eq!(s.cv, 1.25f64.sqrt() / 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(s.uniformity, 1. - 1.25f64.sqrt() / 2.5, epsilon = 1e-12);
    }

    #[test]
    fn too_few_values_for_shape() {
        let s = Summary::of(vec![1., 2.]);
        assert!(s.skewness.is_nan());
        assert!(s.kurtosis.is_nan());

        let s = Summary::of(vec![1., 2., 4.]);
        assert!(s.skewness > 0.);
        assert!(s.kurtosis.is_nan());
    }

    #[test]
    fn zero_mean() {
        let s = Summary::of(vec![-1., 1.]);
        assert_eq!(s.mean, 0.);
        assert_eq!(s.cv, 0.);
        assert_eq!(s.uniformity, 1.);
    }

    #[test]
    fn uniformity_is_clamped() {
        // std > mean
        let s = Summary::of(vec![0., 0., 0., 10.]);
        assert!(s.cv > 1.);
        assert_eq!(s.uniformity, 0.);

        // negative mean
        let s = Summary::of(vec![-1., -2., -3.]);
        assert!(s.cv < 0.);
        assert_eq!(s.uniformity, 1.);
    }

    #[test]
    fn large_constant_sample() {
        for &v in &[1e17, -3.4028234663852886e38] {
            let s = Summary::of(vec![v; 9]);
            assert_eq!(s.count, 9);
            assert_eq!(s.mean, v);
            assert_eq!(s.mode, v);
            assert_eq!(s.median, v);
            assert_eq!(s.std, 0.);
            assert_eq!(s.range, 0.);
            assert_eq!(s.cv, 0.);
            assert_eq!(s.uniformity, 1.);
            assert!(s.skewness.is_nan());
            assert!(s.kurtosis.is_nan());
        }
    }

    #[test]
    fn single_value() {
        let s = Summary::of(vec![f64::NAN, 0.3, f64::NAN]);
        assert_eq!(s.count, 1);
        assert_eq!(s.mean, 0.3);
        assert_eq!(s.mode, 0.3);
        assert_eq!(s.median, 0.3);
        assert_eq!(s.iqr, 0.);
        assert_eq!(s.variance, 0.);
        assert!(s.skewness.is_nan());
    }

    #[test]
    fn infinite_values() {
        let s = Summary::of(vec![1., 2., 2., f64::INFINITY]);
        assert_eq!(s.count, 4);
        assert_eq!(s.median, 2.);
        assert!(s.mode.is_nan());
        for &kind in &[StatKind::Mean, StatKind::Std, StatKind::Range, StatKind::Iqr] {
            assert!(kind.value(&s).is_nan(), "{} should be NaN", kind);
        }

        let s = Summary::of(vec![f64::NEG_INFINITY, f64::INFINITY]);
        for kind in StatKind::ALL.iter() {
            assert!(kind.value(&s).is_nan(), "{} should be NaN", kind);
        }
    }

    #[test]
    fn subnormal_range() {
        let tiny = 5e-324;
        let s = Summary::of(vec![0., tiny, tiny]);
        assert_eq!(s.count, 3);
        assert_eq!(s.range, tiny);
        assert!(s.mode >= 0. && s.mode <= tiny);
    }

    #[test]
    fn field_names() {
        let names: Vec<_> = StatKind::ALL.iter().map(|k| k.field_name("ndvi")).collect();
        assert_eq!(names[0], "avg_ndvi");
        assert_eq!(names[4], "medi_ndvi");
        assert_eq!(names[9], "cv_ndvi");
        assert_eq!(names[10], "uni_ndvi");
    }
}
