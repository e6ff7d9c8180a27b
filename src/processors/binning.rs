//! Depth binning into half-open intervals.
//!
//! Every depth-grouped statistic in the pipeline (band filter thresholds, bin means)
//! goes through [`bin_depths`]. Bins are built from `0` in steps of `step`; the last
//! edge is pushed to `max(depth) + 1e-3` so the deepest sample always lands inside the
//! final bin, which absorbs any partial remainder.

use crate::config::IntervalClosure;
use crate::core::error::{ConfigError, CptError, DomainError, Result};
use crate::core::loaders::validate_depths;

/// Amount added to the deepest sample to close the final bin.
pub const FINAL_EDGE_EPSILON: f64 = 1e-3;

/// Largest number of fixed-width bins built for one profile.
pub const MAX_BINS: usize = 1_000_000;

/// How bin edges are produced.
#[derive(Debug, Clone, PartialEq)]
pub enum BinSpec {
    /// Fixed width starting at depth 0.
    Step(f64),
    /// Explicit, strictly increasing edges.
    Edges(Vec<f64>),
}

/// Contiguous depth bins `edges[i]..edges[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBins {
    edges: Vec<f64>,
    closure: IntervalClosure,
}

impl DepthBins {
    /// Fixed-width bins covering `[0, max_depth]`.
    pub fn from_step(max_depth: f64, step: f64, closure: IntervalClosure) -> Result<Self> {
        if !(step > 0.0 && step.is_finite()) {
            return Err(ConfigError::BinWidth(step).into());
        }

        let last_k = if max_depth >= 0.0 {
            (max_depth / step).floor()
        } else {
            -1.0
        };
        if last_k >= MAX_BINS as f64 {
            return Err(ConfigError::TooManyBins {
                step,
                max_depth,
                limit: MAX_BINS,
            }
            .into());
        }

        let mut edges: Vec<f64> = (0..=last_k as i64)
            .map(|k| k as f64 * step)
            .collect();
        // k * step may round past max_depth
        while edges.last().is_some_and(|&edge| edge > max_depth) {
            edges.pop();
        }

        let closing = max_depth + FINAL_EDGE_EPSILON;
        match edges.len() {
            // max_depth < 0: nothing to cover, but keep a valid single bin
            0 => edges.extend([0.0, FINAL_EDGE_EPSILON]),
            1 => edges.push(closing),
            _ => {
                if let Some(last) = edges.last_mut() {
                    *last = closing;
                }
            }
        }

        Ok(Self { edges, closure })
    }

    /// Bins from user-supplied edges.
    pub fn from_edges(edges: Vec<f64>, closure: IntervalClosure) -> Result<Self> {
        let increasing = edges.windows(2).all(|w| w[1] > w[0]);
        if edges.len() < 2 || !increasing || edges.iter().any(|e| !e.is_finite()) {
            return Err(DomainError::InvalidBinEdges.into());
        }
        Ok(Self { edges, closure })
    }

    /// Number of bins.
    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    #[inline]
    pub fn closure(&self) -> IntervalClosure {
        self.closure
    }

    /// `(lo, hi)` bounds of bin `index`.
    #[inline]
    pub fn bounds(&self, index: usize) -> (f64, f64) {
        (self.edges[index], self.edges[index + 1])
    }

    /// Index of the bin containing `depth`, if any.
    ///
    /// With right-closed bins the first bin also contains its left edge, so a sample at
    /// the ground surface is not dropped.
    pub fn locate(&self, depth: f64) -> Option<usize> {
        if depth.is_nan() {
            return None;
        }
        let n_bins = self.len();
        match self.closure {
            IntervalClosure::Left => {
                let above = self.edges.partition_point(|&e| e <= depth);
                (above >= 1 && above - 1 < n_bins).then(|| above - 1)
            }
            IntervalClosure::Right => {
                if depth == self.edges[0] {
                    return Some(0);
                }
                let below = self.edges.partition_point(|&e| e < depth);
                (below >= 1 && below - 1 < n_bins).then(|| below - 1)
            }
        }
    }
}

/// Bins plus the bin index of every sample.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBinning {
    pub bins: DepthBins,
    /// `assignment[i]` is the bin of sample `i`.
    pub assignment: Vec<usize>,
}

impl DepthBinning {
    /// Number of samples in each bin.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.bins.len()];
        for &bin in &self.assignment {
            counts[bin] += 1;
        }
        counts
    }
}

/// Assign each depth to its bin.
///
/// # Errors
///
/// `DomainError` for an empty or non-increasing depth array, or a depth outside every
/// bin (negative depths, or depths beyond custom edges). `ConfigError` for a
/// non-positive step.
pub fn bin_depths(
    depth: &[f64],
    spec: &BinSpec,
    closure: IntervalClosure,
) -> Result<DepthBinning> {
    validate_depths(depth)?;

    let bins = match spec {
        BinSpec::Step(step) => {
            let max_depth = depth[depth.len() - 1];
            DepthBins::from_step(max_depth, *step, closure)?
        }
        BinSpec::Edges(edges) => DepthBins::from_edges(edges.clone(), closure)?,
    };

    let assignment = depth
        .iter()
        .enumerate()
        .map(|(index, &d)| {
            bins.locate(d).ok_or(CptError::Domain(DomainError::OutsideBins {
                index,
                depth: d,
            }))
        })
        .collect::<Result<Vec<usize>>>()?;

    Ok(DepthBinning { bins, assignment })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_edges_stretch_final_bin() {
        let bins = DepthBins::from_step(12.0, 5.0, IntervalClosure::Left).unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(bins.edges()[..2], [0.0, 5.0]);
        assert!((bins.edges()[2] - 12.001).abs() < 1e-12);
    }

    #[test]
    fn test_step_edges_when_max_on_boundary() {
        let bins = DepthBins::from_step(10.0, 5.0, IntervalClosure::Left).unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(bins.locate(10.0), Some(1));
    }

    #[test]
    fn test_shallow_sounding_gets_single_bin() {
        let bins = DepthBins::from_step(3.0, 5.0, IntervalClosure::Left).unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins.locate(3.0), Some(0));
    }

    #[test]
    fn test_left_closure_boundaries() {
        let binning = bin_depths(&[0.0, 4.99, 5.0, 9.0, 11.0], &BinSpec::Step(5.0), IntervalClosure::Left)
            .unwrap();
        assert_eq!(binning.assignment, vec![0, 0, 1, 1, 1]);
        assert_eq!(binning.counts(), vec![2, 3]);
    }

    #[test]
    fn test_right_closure_boundaries() {
        let binning = bin_depths(&[0.0, 5.0, 5.01, 11.0], &BinSpec::Step(5.0), IntervalClosure::Right)
            .unwrap();
        assert_eq!(binning.assignment, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_bins_cover_zero_to_max_without_overlap() {
        let depth: Vec<f64> = (1..=437).map(|i| i as f64 * 0.05).collect();
        for step in [0.5, 0.88, 1.0, 2.5, 5.0] {
            let binning = bin_depths(&depth, &BinSpec::Step(step), IntervalClosure::Left).unwrap();
            let edges = binning.bins.edges();
            assert_eq!(edges[0], 0.0);
            assert!(edges[edges.len() - 1] > depth[depth.len() - 1]);
            assert!(edges.windows(2).all(|w| w[1] > w[0]));
            for (i, &bin) in binning.assignment.iter().enumerate() {
                let (lo, hi) = binning.bins.bounds(bin);
                assert!(lo <= depth[i] && depth[i] < hi);
            }
        }
    }

    #[test]
    fn test_custom_edges() {
        let spec = BinSpec::Edges(vec![0.25, 0.75, 1.25]);
        let binning = bin_depths(&[0.3, 0.75, 1.2], &spec, IntervalClosure::Left).unwrap();
        assert_eq!(binning.assignment, vec![0, 1, 1]);

        let err = bin_depths(&[0.1, 0.3], &spec, IntervalClosure::Left).unwrap_err();
        assert!(matches!(
            err,
            CptError::Domain(DomainError::OutsideBins { index: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            bin_depths(&[], &BinSpec::Step(5.0), IntervalClosure::Left),
            Err(CptError::Domain(DomainError::Empty { .. }))
        ));
        assert!(matches!(
            bin_depths(&[2.0, 1.0], &BinSpec::Step(5.0), IntervalClosure::Left),
            Err(CptError::Domain(DomainError::NonMonotonicDepth { .. }))
        ));
        assert!(matches!(
            bin_depths(&[1.0, 2.0], &BinSpec::Step(0.0), IntervalClosure::Left),
            Err(CptError::Config(ConfigError::BinWidth(_)))
        ));
        assert!(matches!(
            bin_depths(&[-1.0, 2.0], &BinSpec::Step(5.0), IntervalClosure::Left),
            Err(CptError::Domain(DomainError::OutsideBins { index: 0, .. }))
        ));
        assert!(matches!(
            DepthBins::from_edges(vec![1.0, 1.0], IntervalClosure::Left),
            Err(CptError::Domain(DomainError::InvalidBinEdges))
        ));
    }

    #[test]
    fn test_rejects_excessive_bin_count() {
        assert!(matches!(
            bin_depths(&[1.0, 50.0], &BinSpec::Step(1e-7), IntervalClosure::Left),
            Err(CptError::Config(ConfigError::TooManyBins { .. }))
        ));
        // just under the limit still builds
        let bins = DepthBins::from_step(200_000.0, 0.25, IntervalClosure::Left).unwrap();
        assert_eq!(bins.len(), 800_000);
    }
}
