//! Correlation windows and the index used to assign events to them.
//!
//! Every (path, failure time `t`) pair becomes a window `[t, t + Δ]`. A
//! diagnostic event belongs to the first window, in discovery order, that
//! contains it. All windows share the same length, so a window contains `e`
//! exactly when its start lies in `[e - Δ, e]`: sorting by start turns the
//! scan into two binary searches plus a minimum over the candidates.

use crate::correlate::types::LocatedFailures;
use crate::time::Timestamp;

/// `[start, end]`, both inclusive, for the path at `path_slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationWindow {
    /// Index of the owning path in the [`LocatedFailures`] it was built from.
    pub path_slot: usize,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl CorrelationWindow {
    pub fn contains(&self, at: Timestamp) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Windows in discovery order plus a start-sorted view for lookups.
#[derive(Debug, Clone, Default)]
pub struct WindowIndex {
    windows: Vec<CorrelationWindow>,
    /// Positions into `windows`, sorted by (start, discovery position).
    by_start: Vec<usize>,
}

impl WindowIndex {
    pub fn build(failures: &LocatedFailures, window_secs: u64) -> Self {
        let windows: Vec<CorrelationWindow> = failures
            .iter()
            .enumerate()
            .flat_map(|(slot, path)| {
                path.times.iter().map(move |&start| CorrelationWindow {
                    path_slot: slot,
                    start,
                    end: start.plus_secs(window_secs),
                })
            })
            .collect();

        let mut by_start: Vec<usize> = (0..windows.len()).collect();
        by_start.sort_by_key(|&i| (windows[i].start, i));

        Self { windows, by_start }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Windows in discovery order.
    pub fn windows(&self) -> &[CorrelationWindow] {
        &self.windows
    }

    /// The earliest-discovered window containing `at`, if any.
    pub fn first_containing(&self, at: Timestamp) -> Option<&CorrelationWindow> {
        // Candidates start no later than `at`...
        let hi = self.by_start.partition_point(|&i| self.windows[i].start <= at);
        // ...and no earlier than the first start whose window still reaches `at`.
        let lo = self.by_start[..hi].partition_point(|&i| self.windows[i].end < at);

        self.by_start[lo..hi]
            .iter()
            .copied()
            .filter(|&i| self.windows[i].contains(at))
            .min()
            .map(|i| &self.windows[i])
    }
}
