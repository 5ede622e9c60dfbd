use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const PROGRESS_UPDATE_MILLIS: u64 = 500;

/// Items processed or skipped (eg. tiles outside the
/// rasters) out of a known total.
#[derive(Debug)]
struct Counts {
    units: &'static str,
    total: usize,
    processed: AtomicUsize,
    skipped: AtomicUsize,
    done: AtomicBool,
}

impl Counts {
    fn new(units: &'static str, total: usize) -> Self {
        Counts {
            units,
            total,
            processed: Default::default(),
            skipped: Default::default(),
            done: Default::default(),
        }
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: completed {}", self.units, self.processed.load(Ordering::Acquire))?;
        let skipped = self.skipped.load(Ordering::Acquire);
        if skipped > 0 {
            write!(f, " (skipped {})", skipped)?;
        }
        write!(f, " of {}.", self.total)
    }
}

/// Spinner over a fixed number of items, refreshed from a
/// background thread until dropped.
pub struct Tracker {
    counts: Arc<Counts>,
    handle: Option<JoinHandle<()>>,
}

impl Tracker {
    pub fn new(units: &'static str, len: usize) -> Self {
        let counts = Arc::new(Counts::new(units, len));
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}"));

        let shown = counts.clone();
        let handle = thread::spawn(move || {
            let timeout = Duration::from_millis(PROGRESS_UPDATE_MILLIS);
            while !shown.done.load(Ordering::Acquire) {
                bar.set_message(&shown.to_string());
                thread::park_timeout(timeout);
            }
            bar.set_message(&shown.to_string());
            bar.finish();
        });
        Tracker {
            counts,
            handle: Some(handle),
        }
    }

    pub fn increment(&self) {
        self.counts.processed.fetch_add(1, Ordering::AcqRel);
    }

    pub fn skip(&self) {
        self.counts.skipped.fetch_add(1, Ordering::AcqRel);
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.counts.done.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                eprintln!("Warning: progress thread panicked!");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let c = Counts::new("tiles", 4);
        c.processed.fetch_add(3, Ordering::AcqRel);
        assert_eq!(c.to_string(), "tiles: completed 3 of 4.");
        c.skipped.fetch_add(1, Ordering::AcqRel);
        assert_eq!(c.to_string(), "tiles: completed 3 (skipped 1) of 4.");
    }

    #[test]
    fn tracker_joins_on_drop() {
        let tracker = Tracker::new("tiles", 2);
        tracker.increment();
        tracker.skip();
        assert_eq!(tracker.counts.processed.load(Ordering::Acquire), 1);
        assert_eq!(tracker.counts.skipped.load(Ordering::Acquire), 1);
        drop(tracker);
    }
}
