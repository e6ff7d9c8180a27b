//! Cleaning filters for noisy CPT channels.
//!
//! Two filters are provided:
//! - The Settle3D band filter, which drops readings above a depth-local threshold built
//!   from bin means and neighbouring-bin standard deviations.
//! - A centred rolling median/average whose window shrinks at the ends of the record.

use crate::config::{IntervalClosure, SmoothingMode};
use crate::core::error::{ConfigError, DomainError, Result};
use crate::core::loaders::Sounding;

use super::binning::{bin_depths, BinSpec, DepthBinning};

/// Per-bin statistics of the band filter.
#[derive(Debug, Clone, PartialEq)]
pub struct BinStatistics {
    /// Non-NaN samples in the bin.
    pub count: usize,
    /// Mean of the channel (NaN for an empty bin).
    pub mean: f64,
    /// Sample standard deviation; 0 for bins with fewer than two samples.
    pub std: f64,
    /// Combined deviation with the shallower neighbour.
    pub sigma_above: f64,
    /// Combined deviation with the deeper neighbour.
    pub sigma_below: f64,
    /// Upper band; `None` for an empty bin.
    pub threshold: Option<f64>,
}

/// Result of [`band_filter`].
#[derive(Debug, Clone)]
pub struct BandFilterOutcome {
    pub binning: DepthBinning,
    pub stats: Vec<BinStatistics>,
    /// Indices of kept samples, ascending.
    pub retained: Vec<usize>,
    /// Indices of dropped samples, ascending.
    pub outliers: Vec<usize>,
}

impl BandFilterOutcome {
    /// Threshold applied to sample `index`.
    pub fn threshold_of(&self, index: usize) -> Option<f64> {
        self.stats[self.binning.assignment[index]].threshold
    }

    /// Retained entries of any sample-aligned array.
    pub fn retained_values(&self, values: &[f64]) -> Vec<f64> {
        self.retained.iter().map(|&i| values[i]).collect()
    }

    /// Retained `(value, secondary)` pairs, e.g. `(qc, elevation)`.
    pub fn retained_pairs(&self, values: &[f64], secondary: &[f64]) -> Vec<(f64, f64)> {
        self.retained
            .iter()
            .map(|&i| (values[i], secondary[i]))
            .collect()
    }
}

fn mean_and_std(samples: &[f64]) -> (f64, f64) {
    let n = samples.len();
    if n == 0 {
        return (f64::NAN, 0.0);
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let ss: f64 = samples.iter().map(|v| (v - mean) * (v - mean)).sum();
    (mean, (ss / (n - 1) as f64).sqrt())
}

/// Settle3D band filter.
///
/// Depth is binned with `width`; each bin gets the threshold
/// `mean + multiplier * min(sigma_above, sigma_below)`, where
/// `sigma_above = sqrt(std_i^2 + std_{i-1}^2)` and
/// `sigma_below = sqrt(std_i^2 + std_{i+1}^2)`. A missing neighbour contributes zero.
/// The first bin uses `sigma_below` and the last bin `sigma_above`, their only defined
/// neighbour terms. Samples whose value exceeds their bin's threshold are dropped;
/// surviving samples keep their original order.
///
/// # Errors
///
/// `DomainError` when `values` and `depth` differ in length or depth is not strictly
/// increasing. `ConfigError` for a non-positive width or non-finite multiplier.
pub fn band_filter(
    values: &[f64],
    depth: &[f64],
    width: f64,
    multiplier: f64,
    closure: IntervalClosure,
) -> Result<BandFilterOutcome> {
    if values.len() != depth.len() {
        return Err(DomainError::LengthMismatch {
            left: "depth",
            left_len: depth.len(),
            right: "channel",
            right_len: values.len(),
        }
        .into());
    }
    if !(width > 0.0 && width.is_finite()) {
        return Err(ConfigError::BinWidth(width).into());
    }
    if !multiplier.is_finite() {
        return Err(ConfigError::BandMultiplier(multiplier).into());
    }

    let binning = bin_depths(depth, &BinSpec::Step(width), closure)?;
    let n_bins = binning.bins.len();

    // Group values by bin
    let mut grouped: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
    for (&value, &bin) in values.iter().zip(&binning.assignment) {
        if !value.is_nan() {
            grouped[bin].push(value);
        }
    }

    let moments: Vec<(usize, f64, f64)> = grouped
        .iter()
        .map(|samples| {
            let (mean, std) = mean_and_std(samples);
            (samples.len(), mean, std)
        })
        .collect();

    let stats: Vec<BinStatistics> = (0..n_bins)
        .map(|i| {
            let (count, mean, std) = moments[i];
            let above = if i > 0 { moments[i - 1].2 } else { 0.0 };
            let below = if i + 1 < n_bins { moments[i + 1].2 } else { 0.0 };
            let sigma_above = (std * std + above * above).sqrt();
            let sigma_below = (std * std + below * below).sqrt();

            let sigma = if n_bins == 1 {
                std
            } else if i == 0 {
                sigma_below
            } else if i == n_bins - 1 {
                sigma_above
            } else {
                sigma_above.min(sigma_below)
            };

            BinStatistics {
                count,
                mean,
                std,
                sigma_above,
                sigma_below,
                threshold: (count > 0).then(|| mean + multiplier * sigma),
            }
        })
        .collect();

    let mut retained = Vec::with_capacity(values.len());
    let mut outliers = Vec::new();
    for (i, &value) in values.iter().enumerate() {
        let keep = stats[binning.assignment[i]]
            .threshold
            .map_or(false, |threshold| value <= threshold);
        if keep {
            retained.push(i);
        } else {
            outliers.push(i);
        }
    }

    log::debug!(
        "band filter: {} bins, {} retained, {} outliers",
        n_bins,
        retained.len(),
        outliers.len()
    );

    Ok(BandFilterOutcome {
        binning,
        stats,
        retained,
        outliers,
    })
}

/// Drop qc outliers from a sounding with [`band_filter`].
pub fn band_filter_sounding(
    sounding: &Sounding,
    width: f64,
    multiplier: f64,
    closure: IntervalClosure,
) -> Result<(Sounding, BandFilterOutcome)> {
    sounding.validate()?;
    let outcome = band_filter(&sounding.qc, &sounding.depth, width, multiplier, closure)?;
    Ok((sounding.select(&outcome.retained), outcome))
}

fn median(window: &mut [f64]) -> f64 {
    window.sort_by(|a, b| a.total_cmp(b));
    let n = window.len();
    if n % 2 == 1 {
        window[n / 2]
    } else {
        0.5 * (window[n / 2 - 1] + window[n / 2])
    }
}

/// Centred rolling median or average.
///
/// The window is `window_size` samples wide and centred on each sample. Near the ends it
/// is truncated to the samples that exist, down to a single sample. NaN readings are
/// skipped; a window with no valid reading yields NaN.
///
/// # Errors
///
/// `ConfigError::WindowSize` when `window_size` is zero or even.
pub fn rolling_filter(
    values: &[f64],
    window_size: usize,
    mode: SmoothingMode,
) -> std::result::Result<Vec<f64>, ConfigError> {
    if window_size == 0 || window_size % 2 == 0 {
        return Err(ConfigError::WindowSize(window_size));
    }

    let half = window_size / 2;
    let n = values.len();
    let mut buffer = Vec::with_capacity(window_size);

    let smoothed = (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);

            buffer.clear();
            buffer.extend(values[lo..hi].iter().copied().filter(|v| !v.is_nan()));

            if buffer.is_empty() {
                return f64::NAN;
            }
            match mode {
                SmoothingMode::Median => median(&mut buffer),
                SmoothingMode::Average => buffer.iter().sum::<f64>() / buffer.len() as f64,
            }
        })
        .collect();

    Ok(smoothed)
}

/// Smooth the qc and fs channels of a sounding. Depth and u2 are left untouched.
pub fn smooth_sounding(
    sounding: &Sounding,
    window_size: usize,
    mode: SmoothingMode,
) -> Result<Sounding> {
    sounding.validate()?;
    let mut smoothed = sounding.clone();
    smoothed.qc = rolling_filter(&sounding.qc, window_size, mode)?;
    smoothed.fs = rolling_filter(&sounding.fs, window_size, mode)?;
    Ok(smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CptError;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_band_filter_drops_spike() {
        // Two bins of five samples each; one spike in the first bin
        let depth = vec![0.5, 1.0, 1.5, 2.0, 2.5, 5.5, 6.0, 6.5, 7.0, 7.5];
        let qc = vec![10.0, 11.0, 10.0, 50.0, 9.0, 20.0, 21.0, 19.0, 20.0, 20.0];

        let outcome = band_filter(&qc, &depth, 5.0, 1.0, IntervalClosure::Left).unwrap();
        assert_eq!(outcome.stats.len(), 2);
        assert_eq!(outcome.outliers, vec![3]);
        assert_eq!(outcome.retained.len(), 9);

        for &i in &outcome.retained {
            assert!(qc[i] <= outcome.threshold_of(i).unwrap());
        }
    }

    #[test]
    fn test_band_filter_edge_bins_use_only_neighbour() {
        let depth = vec![1.0, 2.0, 6.0, 7.0, 11.0, 16.0];
        let qc = vec![10.0, 12.0, 20.0, 24.0, 30.0, 36.0];

        let outcome = band_filter(&qc, &depth, 5.0, 1.0, IntervalClosure::Left).unwrap();
        let stats = &outcome.stats;
        assert_eq!(stats.len(), 3);

        let std: Vec<f64> = stats.iter().map(|s| s.std).collect();
        // first bin: mean + sqrt(std0^2 + std1^2)
        let first = 11.0 + (std[0] * std[0] + std[1] * std[1]).sqrt();
        assert!(close(stats[0].threshold.unwrap(), first));
        // last bin: mean + sqrt(std2^2 + std1^2)
        let last = 33.0 + (std[2] * std[2] + std[1] * std[1]).sqrt();
        assert!(close(stats[2].threshold.unwrap(), last));
        // interior bin: min of both sides
        let interior = 22.0 + stats[1].sigma_above.min(stats[1].sigma_below);
        assert!(close(stats[1].threshold.unwrap(), interior));
    }

    #[test]
    fn test_single_sample_bin_has_zero_std() {
        // First bin holds one sample only; the final bin absorbs the rest
        let depth = vec![1.0, 6.0, 7.0, 8.0, 11.0, 12.0];
        let qc = vec![40.0, 10.0, 12.0, 14.0, 16.0, 18.0];

        let outcome = band_filter(&qc, &depth, 5.0, 1.0, IntervalClosure::Left).unwrap();
        assert_eq!(outcome.stats.len(), 2);
        let lone = &outcome.stats[0];
        assert_eq!(lone.count, 1);
        assert_eq!(lone.mean, 40.0);
        assert_eq!(lone.std, 0.0);
        // first bin: mean + sigma_below = 40 + sqrt(0 + std1^2), std1 = sqrt(10)
        assert!(close(lone.threshold.unwrap(), 40.0 + 10f64.sqrt()));
        assert!(outcome.retained.contains(&0));
    }

    #[test]
    fn test_single_bin_uses_own_std() {
        let depth = vec![0.5, 1.0, 1.5];
        let qc = vec![10.0, 20.0, 30.0];
        let outcome = band_filter(&qc, &depth, 5.0, 1.0, IntervalClosure::Left).unwrap();
        assert_eq!(outcome.stats.len(), 1);
        // mean 20, std 10 -> threshold 30, nothing dropped
        assert!(close(outcome.stats[0].threshold.unwrap(), 30.0));
        assert!(outcome.outliers.is_empty());
    }

    #[test]
    fn test_band_filter_pairs_secondary() {
        let depth = vec![0.5, 1.0, 1.5];
        let qc = vec![10.0, 10.0, 100.0];
        let elevation = vec![99.5, 99.0, 98.5];
        let outcome = band_filter(&qc, &depth, 5.0, 0.0, IntervalClosure::Left).unwrap();
        let pairs = outcome.retained_pairs(&qc, &elevation);
        assert_eq!(pairs, vec![(10.0, 99.5), (10.0, 99.0)]);
    }

    #[test]
    fn test_band_filter_rejects_bad_parameters() {
        let depth = vec![1.0, 2.0];
        assert!(matches!(
            band_filter(&[1.0], &depth, 5.0, 1.0, IntervalClosure::Left),
            Err(CptError::Domain(DomainError::LengthMismatch { .. }))
        ));
        assert!(matches!(
            band_filter(&[1.0, 2.0], &depth, 0.0, 1.0, IntervalClosure::Left),
            Err(CptError::Config(ConfigError::BinWidth(_)))
        ));
        assert!(matches!(
            band_filter(&[1.0, 2.0], &depth, -1.0, 1.0, IntervalClosure::Left),
            Err(CptError::Config(ConfigError::BinWidth(_)))
        ));
    }

    #[test]
    fn test_rolling_median_shrinks_at_edges() {
        let values = vec![1.0, 9.0, 2.0, 8.0, 3.0];
        let smoothed = rolling_filter(&values, 3, SmoothingMode::Median).unwrap();
        // first window [1, 9] -> median 5; last window [8, 3] -> 5.5
        assert_eq!(smoothed, vec![5.0, 2.0, 8.0, 3.0, 5.5]);
    }

    #[test]
    fn test_rolling_average() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let smoothed = rolling_filter(&values, 5, SmoothingMode::Average).unwrap();
        assert!(close(smoothed[0], 2.0)); // [1, 2, 3]
        assert!(close(smoothed[1], 2.5)); // [1, 2, 3, 4]
        assert!(close(smoothed[2], 3.0));
        assert!(close(smoothed[4], 4.0)); // [3, 4, 5]
    }

    #[test]
    fn test_rolling_window_one_is_identity() {
        let values = vec![3.0, 1.0, 2.0];
        assert_eq!(
            rolling_filter(&values, 1, SmoothingMode::Median).unwrap(),
            values
        );
    }

    #[test]
    fn test_rolling_skips_nan() {
        let values = vec![1.0, f64::NAN, 3.0];
        let smoothed = rolling_filter(&values, 3, SmoothingMode::Average).unwrap();
        assert!(close(smoothed[1], 2.0));
    }

    #[test]
    fn test_rolling_rejects_even_window() {
        assert_eq!(
            rolling_filter(&[1.0], 4, SmoothingMode::Median),
            Err(ConfigError::WindowSize(4))
        );
        assert_eq!(
            rolling_filter(&[1.0], 0, SmoothingMode::Average),
            Err(ConfigError::WindowSize(0))
        );
    }

    #[test]
    fn test_smooth_sounding_keeps_depth() {
        let sounding = Sounding::new(
            "S",
            vec![1.0, 2.0, 3.0],
            vec![10.0, 100.0, 10.0],
            vec![1.0, 1.0, 4.0],
            vec![0.0, 0.0, 0.0],
        );
        let smoothed = smooth_sounding(&sounding, 3, SmoothingMode::Median).unwrap();
        assert_eq!(smoothed.depth, sounding.depth);
        assert_eq!(smoothed.qc[1], 10.0);
        assert_eq!(smoothed.u2, sounding.u2);
    }
}
