//! Overburden stress integration.

use crate::core::error::{DomainError, Result};

/// Per-sample stresses (kPa), structure-of-arrays.
///
/// Built only by [`soil_stresses`]; `effective = total - pore_pressure` holds for every
/// sample.
#[derive(Debug, Clone, PartialEq)]
pub struct StressProfile {
    total: Vec<f64>,
    pore_pressure: Vec<f64>,
    effective: Vec<f64>,
}

impl StressProfile {
    #[inline]
    pub fn total(&self) -> &[f64] {
        &self.total
    }

    #[inline]
    pub fn pore_pressure(&self) -> &[f64] {
        &self.pore_pressure
    }

    #[inline]
    pub fn effective(&self) -> &[f64] {
        &self.effective
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.total.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }
}

fn check_len(name: &'static str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(DomainError::LengthMismatch {
            left: "depth",
            left_len: expected,
            right: name,
            right_len: len,
        }
        .into());
    }
    Ok(())
}

/// Integrate total, pore and effective stress down the profile.
///
/// Stress accumulates from the ground surface: the first increment is the depth of the
/// first sample, later ones the spacing between samples, each weighted by the sample's
/// own unit weight. Pore pressure is hydrostatic below `groundwater_depth` and zero
/// above it.
///
/// # Errors
///
/// `DomainError::LengthMismatch` when the per-sample arrays differ in length from `depth`.
pub fn soil_stresses(
    depth: &[f64],
    unit_weight: &[f64],
    groundwater_depth: &[f64],
    gamma_w: f64,
) -> Result<StressProfile> {
    let n = depth.len();
    check_len("unit_weight", unit_weight.len(), n)?;
    check_len("groundwater_depth", groundwater_depth.len(), n)?;

    let mut total = Vec::with_capacity(n);
    let mut pore_pressure = Vec::with_capacity(n);
    let mut effective = Vec::with_capacity(n);

    let mut running = 0.0;
    let mut previous = 0.0;
    for i in 0..n {
        let dz = depth[i] - previous;
        previous = depth[i];
        running += dz * unit_weight[i];

        let u = ((depth[i] - groundwater_depth[i]) * gamma_w).max(0.0);

        total.push(running);
        pore_pressure.push(u);
        effective.push(running - u);
    }

    Ok(StressProfile {
        total,
        pore_pressure,
        effective,
    })
}
