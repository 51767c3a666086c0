//! Bounded rolling-window statistics over `f64` samples.

use std::collections::VecDeque;

/// Nearest-rank percentiles are computed on a sorted copy of the window.
/// Bound the sort region so a single call can't blow up on a huge window;
/// callers needing percentiles on larger windows should shrink `window_size`.
const MAX_PERCENTILE_SAMPLE: usize = 1024;

/// Fixed-capacity ring of `f64` samples with O(1) push and O(count) scalar
/// accessors. Empty stats return 0 for every scalar. No allocation after
/// construction (the backing `VecDeque` is pre-reserved to `window_size`).
pub struct RingStats {
    buf: VecDeque<f64>,
    window_size: usize,
}

impl RingStats {
    /// Creates a ring with the given fixed capacity. `window_size` of 0 is
    /// degenerate (every push is immediately dropped) but not rejected.
    pub fn new(window_size: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Number of samples currently held (`<= window_size`).
    pub fn count(&self) -> usize {
        self.buf.len()
    }

    /// Overwrites the oldest sample once the ring is full.
    pub fn push(&mut self, v: f64) {
        if self.window_size == 0 {
            return;
        }
        if self.buf.len() >= self.window_size {
            self.buf.pop_front();
        }
        self.buf.push_back(v);
    }

    pub fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }

    /// Bessel-corrected sample standard deviation. Defined only for
    /// `count >= 2`, else 0.
    pub fn stddev(&self) -> f64 {
        let n = self.buf.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.buf.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    }

    pub fn min(&self) -> f64 {
        self.buf.iter().cloned().fold(f64::INFINITY, f64::min).min_finite()
    }

    pub fn max(&self) -> f64 {
        self.buf
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
            .max_finite()
    }

    /// Nearest-rank percentile, `p` in `[0, 100]`. Returns 0 if empty.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        let take = self.buf.len().min(MAX_PERCENTILE_SAMPLE);
        let mut sorted: Vec<f64> = self.buf.iter().rev().take(take).cloned().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let p = p.clamp(0.0, 100.0);
        let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let idx = rank.saturating_sub(1).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Copies the last `out.len()` values into `out`, newest-to-oldest.
    /// Returns the number of values actually copied.
    pub fn recent_values(&self, out: &mut [f64]) -> usize {
        let n = out.len().min(self.buf.len());
        for (slot, v) in out.iter_mut().zip(self.buf.iter().rev()) {
            *slot = *v;
        }
        n
    }
}

/// `f64::min`/`max` over an empty iterator yield +-infinity; RingStats
/// reports 0 for an empty window instead.
trait FiniteOrZero {
    fn min_finite(self) -> f64;
    fn max_finite(self) -> f64;
}

impl FiniteOrZero for f64 {
    fn min_finite(self) -> f64 {
        if self.is_finite() { self } else { 0.0 }
    }
    fn max_finite(self) -> f64 {
        if self.is_finite() { self } else { 0.0 }
    }
}
