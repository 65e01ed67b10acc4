//! Importance filters
//!
//! Filters run over the complete aggregated set and only flip the
//! `retained` flag; locations are never removed, so callers can still show
//! background locations separately.

use locus_domain::AggregatedLocation;

/// Marks which aggregated locations are central to the paper
pub trait ImportanceFilter: Send + Sync {
    /// Set `retained` on every location
    fn apply(&self, locations: &mut [AggregatedLocation]);
}

/// Keep locations at or above a percentile of the importance scores
///
/// # Examples
///
/// ```
/// use locus_extractor::{ImportanceFilter, PercentileFilter};
/// # use locus_domain::AggregatedLocation;
/// # fn loc(importance: f64) -> AggregatedLocation {
/// #     AggregatedLocation { name: importance.to_string(), canonical_key: importance.to_string(),
/// #         country: None, chunk_indices: vec![0], importance, frequency: 1, evidence: vec![],
/// #         text_occurrences: None, retained: true }
/// # }
///
/// let mut locations: Vec<_> = (1..=10).map(|i| loc(i as f64 * 10.0)).collect();
/// PercentileFilter::new(70.0).apply(&mut locations);
/// let kept: Vec<f64> = locations.iter().filter(|l| l.retained).map(|l| l.importance).collect();
/// assert_eq!(kept, vec![80.0, 90.0, 100.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileFilter {
    cutoff: f64,
    floor: Option<f64>,
}

impl PercentileFilter {
    /// Filter at the `cutoff` percentile (0-100)
    pub fn new(cutoff: f64) -> Self {
        Self {
            cutoff: cutoff.clamp(0.0, 100.0),
            floor: None,
        }
    }

    /// Never let the threshold fall below `floor`
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = Some(floor);
        self
    }

    /// Threshold for a set of scores, or `None` when every location is kept
    ///
    /// Uses linear interpolation between the two closest ranks of the
    /// ascending scores. Fewer than two distinct scores keep everything.
    pub fn threshold(&self, scores: &[f64]) -> Option<f64> {
        let mut sorted: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);

        let distinct = sorted.windows(2).filter(|w| w[0] != w[1]).count() + 1;
        if sorted.is_empty() || distinct < 2 {
            return None;
        }

        let n = sorted.len();
        let position = self.cutoff / 100.0 * (n - 1) as f64;
        let lower = position.floor() as usize;
        let fraction = position - lower as f64;
        let threshold = if lower >= n - 1 {
            sorted[n - 1]
        } else {
            sorted[lower] + fraction * (sorted[lower + 1] - sorted[lower])
        };

        Some(match self.floor {
            Some(floor) => threshold.max(floor),
            None => threshold,
        })
    }
}

impl ImportanceFilter for PercentileFilter {
    fn apply(&self, locations: &mut [AggregatedLocation]) {
        let scores: Vec<f64> = locations.iter().map(|l| l.importance).collect();
        match self.threshold(&scores) {
            Some(threshold) => {
                for location in locations.iter_mut() {
                    location.retained = location.importance >= threshold;
                }
            }
            None => {
                for location in locations.iter_mut() {
                    location.retained = true;
                }
            }
        }
    }
}

/// Keep the `k` most important locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopKFilter {
    k: usize,
}

impl TopKFilter {
    /// Keep at most `k` locations
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl ImportanceFilter for TopKFilter {
    fn apply(&self, locations: &mut [AggregatedLocation]) {
        let mut order: Vec<usize> = (0..locations.len()).collect();
        order.sort_by(|&a, &b| {
            locations[b]
                .importance
                .total_cmp(&locations[a].importance)
                .then(locations[b].frequency.cmp(&locations[a].frequency))
                .then(locations[a].name.cmp(&locations[b].name))
        });
        for (rank, idx) in order.into_iter().enumerate() {
            locations[idx].retained = rank < self.k;
        }
    }
}

/// Keep locations whose importance reaches a fixed score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdFilter {
    min: f64,
}

impl ThresholdFilter {
    /// Keep locations with importance `>= min`
    pub fn new(min: f64) -> Self {
        Self { min }
    }
}

impl ImportanceFilter for ThresholdFilter {
    fn apply(&self, locations: &mut [AggregatedLocation]) {
        for location in locations.iter_mut() {
            location.retained = location.importance >= self.min;
        }
    }
}
