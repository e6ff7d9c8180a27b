//! Scalar fixed-point iteration with an explicit cap.

/// Stopping rule for [`solve_fixed_point`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPointLimits {
    /// Absolute change between successive iterates that counts as converged.
    pub tolerance: f64,
    /// Maximum number of updates before giving up.
    pub max_iterations: usize,
}

impl FixedPointLimits {
    pub const fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

/// Outcome of a fixed-point iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixedPoint {
    /// `|update(x) - x| <= tolerance` was reached; `value` is the last update.
    Converged { value: f64, iterations: usize },
    /// The cap was hit; `last` is the final iterate, kept for diagnostics only.
    Exhausted { last: f64, iterations: usize },
}

impl FixedPoint {
    /// The converged value, or `None` if the iteration ran out.
    #[inline]
    pub fn value(&self) -> Option<f64> {
        match *self {
            FixedPoint::Converged { value, .. } => Some(value),
            FixedPoint::Exhausted { .. } => None,
        }
    }

    #[inline]
    pub fn iterations(&self) -> usize {
        match *self {
            FixedPoint::Converged { iterations, .. } | FixedPoint::Exhausted { iterations, .. } => {
                iterations
            }
        }
    }

    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, FixedPoint::Converged { .. })
    }
}

/// Iterate `x <- update(x)` from `seed` until two successive values agree within the
/// tolerance, or the iteration cap is reached.
///
/// A NaN iterate never satisfies the tolerance check, so it runs to the cap and comes
/// back as [`FixedPoint::Exhausted`].
pub fn solve_fixed_point<F>(seed: f64, limits: FixedPointLimits, mut update: F) -> FixedPoint
where
    F: FnMut(f64) -> f64,
{
    let mut current = seed;

    for iteration in 1..=limits.max_iterations {
        let next = update(current);
        if (next - current).abs() <= limits.tolerance {
            return FixedPoint::Converged {
                value: next,
                iterations: iteration,
            };
        }
        current = next;
    }

    FixedPoint::Exhausted {
        last: current,
        iterations: limits.max_iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_on_contraction() {
        // x = cos(x) has a fixed point near 0.739085
        let outcome = solve_fixed_point(1.0, FixedPointLimits::new(1e-9, 200), f64::cos);
        let value = outcome.value().unwrap();
        assert!((value - 0.739_085_133).abs() < 1e-6);
        assert!(outcome.iterations() < 200);
    }

    #[test]
    fn test_immediate_convergence() {
        let outcome = solve_fixed_point(0.5, FixedPointLimits::new(0.01, 25), |_| 0.5);
        assert_eq!(
            outcome,
            FixedPoint::Converged {
                value: 0.5,
                iterations: 1
            }
        );
    }

    #[test]
    fn test_exhausts_on_oscillation() {
        let outcome = solve_fixed_point(0.0, FixedPointLimits::new(0.01, 25), |x| 1.0 - x);
        assert!(!outcome.is_converged());
        assert_eq!(outcome.value(), None);
        assert_eq!(outcome.iterations(), 25);
    }

    #[test]
    fn test_nan_never_converges() {
        let outcome = solve_fixed_point(1.0, FixedPointLimits::new(0.01, 5), |_| f64::NAN);
        assert_eq!(outcome.value(), None);
    }
}
