//! Unit conversions, cone corrections and numeric guards.
//!
//! The guards here keep logarithms and fractional powers inside their domain. They
//! replace offending values with small positive constants instead of raising, so one
//! bad sample never aborts a sounding.

use crate::config::PressureUnit;

/// kPa per ton (short) per square foot.
pub const KPA_PER_TSF: f64 = 95.760_518;

/// kPa per MPa.
pub const KPA_PER_MPA: f64 = 1000.0;

/// Convert a pressure reading to kPa.
#[inline]
pub fn to_kpa(value: f64, unit: PressureUnit) -> f64 {
    match unit {
        PressureUnit::Kpa => value,
        PressureUnit::Mpa => value * KPA_PER_MPA,
        PressureUnit::Tsf => value * KPA_PER_TSF,
    }
}

/// Corrected tip resistance `qt = qc + (1 - a) * u2` for each sample.
///
/// `area_ratio` is the cone net area ratio `a`.
pub fn corrected_tip_resistance(qc: &[f64], u2: &[f64], area_ratio: f64) -> Vec<f64> {
    debug_assert_eq!(qc.len(), u2.len(), "qc and u2 must have same length");

    qc.iter()
        .zip(u2)
        .map(|(&q, &u)| q + (1.0 - area_ratio) * u)
        .collect()
}

/// Replace values `<= 0` with `floor`. NaN passes through.
#[inline]
pub fn floor_non_positive(value: f64, floor: f64) -> f64 {
    if value <= 0.0 {
        floor
    } else {
        value
    }
}

/// `min(max(value, lo), hi)`, propagating NaN from any argument.
///
/// Unlike [`f64::clamp`] this does not panic when `lo > hi`; the upper bound wins.
#[inline]
pub fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() || lo.is_nan() || hi.is_nan() {
        return f64::NAN;
    }
    let raised = if value < lo { lo } else { value };
    if raised > hi {
        hi
    } else {
        raised
    }
}
