//! Soil behaviour type index and friction angle.
//!
//! The stress exponent `n` and the index `Ic_n` depend on each other, so each sample is
//! solved as a fixed point of
//!
//! ```text
//! Cn    = min((pa / sigma_E)^n, 1.7)
//! Qt_n  = max((qt - sigma_T) / pa * Cn, 0.01)
//! Ic_n  = sqrt((3.47 - log10 Qt_n)^2 + (1.22 + log10 Fr)^2)
//! n'    = clip(0.381 Ic_n + 0.05 sigma_E / pa - 0.15, 0.35, 1.0)
//! ```
//!
//! starting from `n = 1`. Samples that fail to settle within the cap keep `None` for
//! `n`, `Qt_n` and `Ic_n` and are reported as [`ConvergenceWarning`]s.

use crate::core::error::{ConvergenceWarning, DomainError, IterationStage, Result};
use crate::core::iteration::{solve_fixed_point, FixedPoint, FixedPointLimits};
use crate::core::transforms::{clip, floor_non_positive};

/// Tolerance and cap of the `n` iteration.
pub const EXPONENT_LIMITS: FixedPointLimits = FixedPointLimits::new(0.01, 25);

/// Initial exponent of the `n` iteration.
pub const EXPONENT_SEED: f64 = 1.0;

const FS_FLOOR: f64 = 0.001;
const FR_FLOOR: f64 = 0.001;
const QT_FLOOR: f64 = 0.01;
const CN_CAP: f64 = 1.7;

/// Derived soil index values of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilIndexRecord {
    /// Normalized friction ratio (%).
    pub fr: f64,
    /// Normalized tip resistance with `n = 1`.
    pub qt_1: f64,
    /// Index from `Qt_1`.
    pub ic_0: f64,
    /// Converged stress exponent.
    pub n: Option<f64>,
    pub qt_n: Option<f64>,
    pub ic_n: Option<f64>,
    /// Friction angle (degrees).
    pub friction_angle: f64,
}

/// Soil index of a whole sounding.
#[derive(Debug, Clone, Default)]
pub struct SoilIndexProfile {
    pub records: Vec<SoilIndexRecord>,
    /// Samples whose `n` iteration did not converge.
    pub warnings: Vec<ConvergenceWarning>,
}

impl SoilIndexProfile {
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of samples with a converged exponent.
    pub fn converged_count(&self) -> usize {
        self.records.iter().filter(|r| r.n.is_some()).count()
    }
}

#[inline]
fn behaviour_index(qt_norm: f64, fr: f64) -> f64 {
    let a = 3.47 - qt_norm.log10();
    let b = 1.22 + fr.log10();
    (a * a + b * b).sqrt()
}

#[inline]
fn normalized_tip(qt: f64, sigma_t: f64, sigma_e: f64, pa_atm: f64, n: f64) -> f64 {
    let cn = clip((pa_atm / sigma_e).powf(n), f64::NEG_INFINITY, CN_CAP);
    clip((qt - sigma_t) / pa_atm * cn, QT_FLOOR, f64::INFINITY)
}

/// Friction angle (degrees): the larger of Kulhawy & Mayne (1990) and
/// Robertson & Campanella (1983).
pub fn friction_angle(qt: f64, sigma_t: f64, sigma_e: f64, pa_atm: f64) -> f64 {
    let qt_05 = floor_non_positive(
        (qt - sigma_t) / pa_atm * (pa_atm / sigma_e).sqrt(),
        QT_FLOOR,
    );
    let kulhawy_mayne = 17.6 + 11.0 * qt_05.log10();
    let robertson_campanella = ((1.0 / 2.68) * ((qt / sigma_e).log10() + 0.29))
        .atan()
        .to_degrees();
    kulhawy_mayne.max(robertson_campanella)
}

/// Soil index of a single sample, plus the raw outcome of its `n` iteration.
pub fn soil_index_sample(
    qt: f64,
    fs: f64,
    sigma_t: f64,
    sigma_e: f64,
    pa_atm: f64,
) -> (SoilIndexRecord, FixedPoint) {
    let fs = floor_non_positive(fs, FS_FLOOR);
    let fr = floor_non_positive(100.0 * fs / (qt - sigma_t), FR_FLOOR);

    let qt_1 = floor_non_positive((qt - sigma_t) / pa_atm * (pa_atm / sigma_e), QT_FLOOR);
    let ic_0 = behaviour_index(qt_1, fr);

    let outcome = solve_fixed_point(EXPONENT_SEED, EXPONENT_LIMITS, |n| {
        let ic = behaviour_index(normalized_tip(qt, sigma_t, sigma_e, pa_atm, n), fr);
        clip(0.381 * ic + 0.05 * (sigma_e / pa_atm) - 0.15, 0.35, 1.0)
    });

    let n = outcome.value();
    let qt_n = n.map(|n| normalized_tip(qt, sigma_t, sigma_e, pa_atm, n));
    let ic_n = qt_n.map(|q| behaviour_index(q, fr));

    let record = SoilIndexRecord {
        fr,
        qt_1,
        ic_0,
        n,
        qt_n,
        ic_n,
        friction_angle: friction_angle(qt, sigma_t, sigma_e, pa_atm),
    };
    (record, outcome)
}

/// Soil index of every sample in a sounding.
///
/// # Errors
///
/// `DomainError::LengthMismatch` if any input differs in length from `depth`.
pub fn soil_index(
    depth: &[f64],
    qt: &[f64],
    fs: &[f64],
    total_stress: &[f64],
    effective_stress: &[f64],
    pa_atm: f64,
) -> Result<SoilIndexProfile> {
    let n = depth.len();
    for (name, len) in [
        ("qt", qt.len()),
        ("fs", fs.len()),
        ("total_stress", total_stress.len()),
        ("effective_stress", effective_stress.len()),
    ] {
        if len != n {
            return Err(DomainError::LengthMismatch {
                left: "depth",
                left_len: n,
                right: name,
                right_len: len,
            }
            .into());
        }
    }

    let mut profile = SoilIndexProfile {
        records: Vec::with_capacity(n),
        warnings: Vec::new(),
    };

    for i in 0..n {
        let (record, outcome) =
            soil_index_sample(qt[i], fs[i], total_stress[i], effective_stress[i], pa_atm);
        if !outcome.is_converged() {
            profile.warnings.push(ConvergenceWarning {
                stage: IterationStage::SoilIndexExponent,
                index: i,
                depth: depth[i],
                iterations: outcome.iterations(),
            });
        }
        profile.records.push(record);
    }

    Ok(profile)
}
