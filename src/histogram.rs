//! Utilities to compute histogram

use serde_derive::Serialize;

/// Upper limit on the number of bins chosen by
/// [`Config::auto`].
pub const MAX_AUTO_BINS: usize = 1 << 20;

/// Configuration to generate histogram, from min, max and
/// number of bins, or from the data itself. The last bin is
/// closed: `max` falls in it.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Config {
    min: f64,
    max: f64,
    step: f64,
    len: usize,
}

impl Config {
    /// `None` unless `min < max`, `len > 0` and the bins have
    /// a positive, finite width.
    pub fn from_min_max_bins(min: f64, max: f64, len: usize) -> Option<Self> {
        if len == 0 || !(min < max) {
            return None;
        }
        let step = (max - min) / len as f64;
        if !(step > 0. && step.is_finite()) {
            return None;
        }
        Some(Config {
            min,
            max,
            step,
            len,
        })
    }

    /// Choose bins from the data, the way `numpy`'s `auto`
    /// estimator does: the bin width is the smaller of the
    /// Sturges and Freedman-Diaconis estimates (the latter
    /// only if non-zero). A constant sample gets a single bin
    /// centered on the value, at least one unit wide.
    ///
    /// `sorted` must be sorted and free of `NaN`. Returns
    /// `None` if it is empty, or if no usable bins exist
    /// (eg. infinite or subnormal ranges).
    pub fn auto(sorted: &[f64]) -> Option<Self> {
        let (first, last) = (*sorted.first()?, *sorted.last()?);
        if first == last {
            let half = (first.abs() * f64::EPSILON * 4.).max(0.5);
            return Config::from_min_max_bins(first - half, last + half, 1);
        }

        let n = sorted.len() as f64;
        let range = last - first;
        let sturges = range / (n.log2() + 1.);
        let iqr = percentile(sorted, 75.) - percentile(sorted, 25.);
        let fd = 2. * iqr * n.powf(-1. / 3.);
        let width = if fd > 0. { fd.min(sturges) } else { sturges };

        let len = if width > 0. && width.is_finite() {
            ((range / width).ceil() as usize).max(1).min(MAX_AUTO_BINS)
        } else {
            1
        };
        Config::from_min_max_bins(first, last, len)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn step(&self) -> f64 {
        self.step
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Center of bin `bin`.
    #[inline]
    pub fn center(&self, bin: usize) -> f64 {
        self.min + (bin as f64 + 0.5) * self.step
    }

    #[inline]
    pub fn bin_for(&self, val: f64) -> HistBin {
        use HistBin::*;
        if val > self.max || val.is_nan() {
            Max
        } else if val < self.min {
            Min
        } else {
            let bin = ((val - self.min) / self.step).floor() as usize;
            Bin(bin.min(self.len - 1))
        }
    }
}

/// Linear interpolation percentile (`q` in `[0, 100]`) of a
/// sorted, non-empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q / 100.;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    if lo == hi || frac == 0. {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Represent the location of a value with respect to a
/// histogram configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistBin {
    Min,
    Max,
    Bin(usize),
}

/// A histogram that can be built by accumulating individual
/// values, or other histograms.
#[derive(Clone, Serialize)]
pub struct Histogram<'a> {
    cfg: &'a Config,
    hist: Vec<usize>,
    min: usize,
    max: usize,
    count: usize,
}

impl<'a> Histogram<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Histogram {
            cfg,
            hist: vec![0; cfg.len()],
            min: 0,
            max: 0,
            count: 0,
        }
    }

    pub fn counts(&self) -> &[usize] {
        &self.hist
    }

    /// Number of values added, including those outside the
    /// configured range.
    pub fn count(&self) -> usize {
        self.count
    }

    /// First bin with the largest count, if any value fell
    /// in range.
    pub fn peak(&self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (bin, &c) in self.hist.iter().enumerate() {
            if c > 0 && best.map_or(true, |(_, b)| c > b) {
                best = Some((bin, c));
            }
        }
        best.map(|(bin, _)| bin)
    }

    /// Center of the [`peak`][Histogram::peak] bin.
    pub fn mode(&self) -> Option<f64> {
        self.peak().map(|bin| self.cfg.center(bin))
    }
}

use std::ops::AddAssign;
impl<'a, 'b> AddAssign<Histogram<'b>> for Histogram<'a> {
    fn add_assign(&mut self, other: Histogram<'b>) {
        assert!(
            self.cfg == other.cfg,
            "adding histogram with a different config"
        );
        for (a, b) in self.hist.iter_mut().zip(other.hist.iter()) {
            *a += *b;
        }
        self.min += other.min;
        self.max += other.max;
        self.count += other.count;
    }
}

impl<'a> AddAssign<f64> for Histogram<'a> {
    fn add_assign(&mut self, other: f64) {
        use HistBin::*;
        match self.cfg.bin_for(other) {
            Min => {
                self.min += 1;
            }
            Max => {
                self.max += 1;
            }
            Bin(bin) => {
                self.hist[bin] += 1;
            }
        }
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_bin_is_closed() {
        let cfg = Config::from_min_max_bins(0., 4., 4).unwrap();
        assert_eq!(cfg.bin_for(0.), HistBin::Bin(0));
        assert_eq!(cfg.bin_for(3.99), HistBin::Bin(3));
        assert_eq!(cfg.bin_for(4.), HistBin::Bin(3));
        assert_eq!(cfg.bin_for(4.01), HistBin::Max);
        assert_eq!(cfg.bin_for(-0.01), HistBin::Min);
    }

    #[test]
    fn auto_bins() {
        assert!(Config::auto(&[]).is_none());

        let cfg = Config::auto(&[5.; 10]).unwrap();
        assert_eq!((cfg.min(), cfg.max(), cfg.len()), (4.5, 5.5, 1));

        // Sturges: 3 / (log2(4) + 1) = 1 beats FD (~1.89).
        let cfg = Config::auto(&[1., 2., 3., 4.]).unwrap();
        assert_eq!(cfg.len(), 3);

        // Zero IQR falls back to Sturges: 2 / (log2(8) + 1).
        let data = [0., 1., 1., 1., 1., 1., 1., 2.];
        let cfg = Config::auto(&data).unwrap();
        assert_eq!(cfg.len(), 4);
    }

    #[test]
    fn invalid_bounds() {
        assert!(Config::from_min_max_bins(1., 1., 1).is_none());
        assert!(Config::from_min_max_bins(2., 1., 1).is_none());
        assert!(Config::from_min_max_bins(0., 1., 0).is_none());
        assert!(Config::from_min_max_bins(f64::NAN, 1., 1).is_none());
        assert!(Config::from_min_max_bins(0., f64::INFINITY, 1).is_none());
        assert!(Config::from_min_max_bins(f64::MIN, f64::MAX, 1).is_none());
    }

    #[test]
    fn auto_bins_large_constant() {
        // 0.5 is below the spacing of f64 at these magnitudes
        for &v in &[1e17, -3.4028234663852886e38, 5e300] {
            let cfg = Config::auto(&[v; 9]).unwrap();
            assert_eq!(cfg.len(), 1);
            assert!(cfg.min() < v && v < cfg.max());
            assert_eq!(cfg.bin_for(v), HistBin::Bin(0));
        }
        assert!(Config::auto(&[f64::MAX; 3]).is_none());
    }

    #[test]
    fn auto_bins_single_value() {
        let cfg = Config::auto(&[-2.]).unwrap();
        assert_eq!((cfg.min(), cfg.max(), cfg.len()), (-2.5, -1.5, 1));
    }

    #[test]
    fn auto_bins_degenerate_ranges() {
        assert!(Config::auto(&[1., 2., f64::INFINITY]).is_none());
        assert!(Config::auto(&[f64::NEG_INFINITY, 0.]).is_none());

        let tiny = 5e-324;
        let cfg = Config::auto(&[0., tiny]).unwrap();
        assert_eq!(cfg.len(), 1);
        assert_eq!(cfg.bin_for(tiny), HistBin::Bin(0));
    }

    #[test]
    fn peak_and_merge() {
        let cfg = Config::from_min_max_bins(0., 10., 5).unwrap();
        let mut a = Histogram::new(&cfg);
        for &v in &[1., 3., 3.5, 9., 12.] {
            a += v;
        }
        assert_eq!(a.counts(), &[1, 2, 0, 0, 1]);
        assert_eq!(a.peak(), Some(1));
        assert_eq!(a.mode(), Some(3.));

        let mut b = Histogram::new(&cfg);
        for &v in &[9.5, 8.5, 8.] {
            b += v;
        }
        a += b;
        assert_eq!(a.peak(), Some(4));
        assert_eq!(a.count(), 8);
        assert_eq!(Histogram::new(&cfg).peak(), None);
    }

    #[test]
    fn percentiles_interpolate() {
        let data = [1., 2., 3., 4.];
        assert_eq!(percentile(&data, 25.), 1.75);
        assert_eq!(percentile(&data, 50.), 2.5);
        assert_eq!(percentile(&data, 75.), 3.25);
        assert_eq!(percentile(&[7.], 90.), 7.);
        assert_eq!(percentile(&[1., f64::INFINITY, f64::INFINITY], 50.), f64::INFINITY);
    }
}
