//! Throughput and buffer based variant selection.

use dr_core::Variant;

use crate::session::MetricsSample;

/// Fraction of measured throughput a variant may use.
pub const THROUGHPUT_SAFETY: f64 = 0.9;

/// Picks a ladder rung from each metrics sample.
///
/// Rungs are ordered by total bitrate. Down-switches are immediate, but
/// up-switches climb one rung per call and need two segments of buffer.
#[derive(Debug, Clone)]
pub struct BitrateSelector {
    /// `(variant index, total bps)`, ascending by bitrate.
    rungs: Vec<(usize, u64)>,
    segment_duration: f64,
    /// Position in `rungs`.
    current: Option<usize>,
}

impl BitrateSelector {
    pub fn new(variants: &[Variant], segment_duration_secs: u32) -> Self {
        let mut rungs: Vec<(usize, u64)> = variants
            .iter()
            .enumerate()
            .map(|(i, v)| (i, v.total_bitrate_bps()))
            .collect();
        rungs.sort_by_key(|&(_, bps)| bps);
        Self {
            rungs,
            segment_duration: f64::from(segment_duration_secs),
            current: None,
        }
    }

    /// Variant index currently selected.
    pub fn current(&self) -> Option<usize> {
        self.current.map(|pos| self.rungs[pos].0)
    }

    /// Feed one sample; returns the new variant index when it changes.
    pub fn select(&mut self, sample: &MetricsSample) -> Option<usize> {
        if self.rungs.is_empty() {
            return None;
        }

        let next = match self.current {
            // Start on the lowest rung and climb as the buffer fills.
            None => 0,
            Some(current) => {
                let target = self.affordable(sample.average_throughput);
                let buffer = sample.buffer_length;
                if buffer < self.segment_duration {
                    target.min(current.saturating_sub(1))
                } else if target < current {
                    target
                } else if target > current && buffer >= 2.0 * self.segment_duration {
                    current + 1
                } else {
                    current
                }
            }
        };

        if self.current == Some(next) {
            return None;
        }
        self.current = Some(next);
        Some(self.rungs[next].0)
    }

    /// Highest rung within the throughput budget, or the lowest rung.
    fn affordable(&self, throughput_bps: f64) -> usize {
        let budget = throughput_bps.max(0.0) * THROUGHPUT_SAFETY;
        self.rungs
            .iter()
            .rposition(|&(_, bps)| bps as f64 <= budget)
            .unwrap_or(0)
    }
}
