//! Liquefied strength ratio (LSR) and residual shear strength correlations.
//!
//! Three independent models, each a per-sample transform of the soil index outputs:
//! Olson & Stark (2002), Robertson (2010) and Idriss & Boulanger (2015). Residual
//! strength is `Sr = LSR * sigma_E` for every model.

use crate::config::{ExponentMode, ResidualConfig};
use crate::core::error::{ConvergenceWarning, DomainError, IterationStage, Result};
use crate::core::iteration::{solve_fixed_point, FixedPoint, FixedPointLimits};
use crate::core::transforms::clip;

use super::soil_index::SoilIndexProfile;

/// Upper bound shared by all LSR correlations.
pub const LSR_CAP: f64 = 0.4;

/// Lower bound of the Robertson and I&B correlations.
pub const LSR_FLOOR: f64 = 0.05;

/// Tolerance and cap of the I&B 2015 `m` iteration.
pub const IB_EXPONENT_LIMITS: FixedPointLimits = FixedPointLimits::new(0.001, 25);

/// Initial exponent of the I&B 2015 `m` iteration.
pub const IB_EXPONENT_SEED: f64 = 0.52;

const CN_CAP: f64 = 1.7;

#[inline]
fn tan_degrees(angle: f64) -> f64 {
    angle.to_radians().tan()
}

/// Olson & Stark (2002) LSR.
///
/// `qc1 = qt * 1.8 / (0.8 + sigma_E / pa) / 1000` (MPa);
/// `LSR = 0.03 + 0.0143 qc1`, or exactly 0.4 when `qc1 > 6.5`.
pub fn olson_stark_2002(qt: f64, sigma_e: f64, pa_atm: f64) -> f64 {
    let cq = 1.8 / (0.8 + sigma_e / pa_atm);
    let qc1_mpa = qt * cq / 1000.0;
    if qc1_mpa > 6.5 {
        LSR_CAP
    } else {
        0.03 + 0.0143 * qc1_mpa
    }
}

/// Robertson (2010) clean-sand factor `K` for a given `Ic`.
pub fn robertson_2010_k(ic: f64) -> f64 {
    if ic <= 1.64 {
        1.0
    } else {
        5.581 * ic.powi(3) - 0.403 * ic.powi(4) - 21.63 * ic.powi(2) + 33.75 * ic - 17.88
    }
}

/// Robertson (2010) outputs of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Robertson2010 {
    pub k: f64,
    /// Clean-sand equivalent normalized tip resistance.
    pub qtn_cs: f64,
    pub lsr: f64,
}

/// Robertson (2010) LSR from `Qt_n`, `Ic_n` and the friction angle (degrees).
pub fn robertson_2010(qt_n: f64, ic_n: f64, friction_angle: f64) -> Robertson2010 {
    let k = robertson_2010_k(ic_n);
    let qtn_cs = k * qt_n;

    let lsr = if qtn_cs <= 70.0 {
        let x = qtn_cs;
        let ratio = (0.02199 - 0.000_312_4 * x) / (1.0 - 0.02676 * x + 0.000_178_3 * x * x);
        clip(ratio, LSR_FLOOR, tan_degrees(friction_angle))
    } else if qtn_cs > 70.0 {
        LSR_CAP
    } else {
        f64::NAN
    };

    Robertson2010 { k, qtn_cs, lsr }
}

/// Idriss & Boulanger (2015) outputs of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdrissBoulanger2015 {
    /// Fines content (%).
    pub fines_content: f64,
    /// Stress exponent after clipping to [0.264, 0.782].
    pub m: f64,
    pub qc1n_cs: f64,
    /// LSR without void redistribution.
    pub lsr: f64,
    /// LSR with void redistribution.
    pub lsr_void: f64,
}

/// Fines content `FC = clip(80 (Ic + C_FC) - 137, 0, 100)`.
#[inline]
pub fn fines_content(ic: f64, fines_correction: f64) -> f64 {
    clip(80.0 * (ic + fines_correction) - 137.0, 0.0, 100.0)
}

/// One update of the I&B 2015 stress exponent.
pub fn ib_exponent_update(m: f64, qt: f64, sigma_e: f64, pa_atm: f64, fc: f64) -> f64 {
    let cn = clip((pa_atm / sigma_e).powf(m), f64::NEG_INFINITY, CN_CAP);
    let qc1n = cn * qt / pa_atm;
    let delta = (11.9 + qc1n / 14.6) * (1.63 - 9.7 / (fc + 2.0) - (15.7 / (fc + 2.0)).powi(2)).exp();
    let qc1n_cs = clip(qc1n + delta, 21.0, 254.0);
    1.338 - 0.249 * qc1n_cs.powf(0.264)
}

/// Resolve the I&B 2015 exponent `m` from the 0.52 seed.
///
/// [`ExponentMode::SingleStep`] takes the first update without a convergence check.
pub fn ib_exponent(
    qt: f64,
    sigma_e: f64,
    pa_atm: f64,
    fc: f64,
    mode: ExponentMode,
) -> FixedPoint {
    let update = |m| ib_exponent_update(m, qt, sigma_e, pa_atm, fc);
    match mode {
        ExponentMode::Converge => solve_fixed_point(IB_EXPONENT_SEED, IB_EXPONENT_LIMITS, update),
        ExponentMode::SingleStep => FixedPoint::Converged {
            value: update(IB_EXPONENT_SEED),
            iterations: 1,
        },
    }
}

/// Idriss & Boulanger (2015) LSR given a resolved exponent.
pub fn idriss_boulanger_2015(
    m: f64,
    fc: f64,
    qt: f64,
    sigma_e: f64,
    pa_atm: f64,
    friction_angle: f64,
) -> IdrissBoulanger2015 {
    let m = clip(m, 0.264, 0.782);
    let cn = clip((pa_atm / sigma_e).powf(m), f64::NEG_INFINITY, CN_CAP);
    let qc1n = cn * qt / pa_atm;
    let delta_sr = -0.007 * fc * fc + 1.2904 * fc - 2.4319;
    let q = qc1n + delta_sr;

    let lsr_base = (q / 24.5 - (q / 61.7).powi(2) + (q / 106.0).powi(3) - 4.42).exp();
    // min(tan(phi), 0.4) keeping NaN
    let upper = clip(tan_degrees(friction_angle), f64::NEG_INFINITY, LSR_CAP);

    let lsr_void = clip(lsr_base, LSR_FLOOR, upper);
    let lsr = clip(lsr_base * (1.0 + (q / 11.1 - 9.82).exp()), LSR_FLOOR, upper);

    IdrissBoulanger2015 {
        fines_content: fc,
        m,
        qc1n_cs: q,
        lsr,
        lsr_void,
    }
}

/// All residual strength outputs of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualRecord {
    pub olson_stark_lsr: f64,
    pub olson_stark_sr: f64,
    pub robertson: Option<Robertson2010>,
    pub robertson_sr: Option<f64>,
    pub idriss_boulanger: Option<IdrissBoulanger2015>,
    pub idriss_boulanger_sr: Option<f64>,
    pub idriss_boulanger_sr_void: Option<f64>,
}

/// Residual strength of a whole sounding.
#[derive(Debug, Clone, Default)]
pub struct ResidualProfile {
    pub records: Vec<ResidualRecord>,
    /// Samples whose I&B exponent did not converge.
    pub warnings: Vec<ConvergenceWarning>,
}

impl ResidualProfile {
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Run the three correlations for every sample.
///
/// Samples without a converged `Ic_n` get `None` for Robertson and I&B; Olson & Stark
/// needs only `qt` and `sigma_E` and is always defined.
///
/// # Errors
///
/// `DomainError::LengthMismatch` if the inputs differ in length from `depth`.
pub fn residual_strength(
    depth: &[f64],
    qt: &[f64],
    effective_stress: &[f64],
    soil: &SoilIndexProfile,
    pa_atm: f64,
    config: &ResidualConfig,
) -> Result<ResidualProfile> {
    let n = depth.len();
    for (name, len) in [
        ("qt", qt.len()),
        ("effective_stress", effective_stress.len()),
        ("soil_index", soil.len()),
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

    let mut profile = ResidualProfile {
        records: Vec::with_capacity(n),
        warnings: Vec::new(),
    };

    for (i, index) in soil.records.iter().enumerate() {
        let sigma_e = effective_stress[i];
        let phi = index.friction_angle;

        let olson_stark_lsr = olson_stark_2002(qt[i], sigma_e, pa_atm);

        let robertson = index
            .qt_n
            .zip(index.ic_n)
            .map(|(qt_n, ic_n)| robertson_2010(qt_n, ic_n, phi));

        let idriss_boulanger = match index.ic_n {
            Some(ic_n) => {
                let fc = fines_content(ic_n, config.fines_correction);
                let exponent = ib_exponent(qt[i], sigma_e, pa_atm, fc, config.ib_exponent);
                if !exponent.is_converged() {
                    profile.warnings.push(ConvergenceWarning {
                        stage: IterationStage::IdrissBoulangerExponent,
                        index: i,
                        depth: depth[i],
                        iterations: exponent.iterations(),
                    });
                }
                exponent
                    .value()
                    .map(|m| idriss_boulanger_2015(m, fc, qt[i], sigma_e, pa_atm, phi))
            }
            None => None,
        };

        profile.records.push(ResidualRecord {
            olson_stark_lsr,
            olson_stark_sr: olson_stark_lsr * sigma_e,
            robertson,
            robertson_sr: robertson.map(|r| r.lsr * sigma_e),
            idriss_boulanger,
            idriss_boulanger_sr: idriss_boulanger.map(|ib| ib.lsr * sigma_e),
            idriss_boulanger_sr_void: idriss_boulanger.map(|ib| ib.lsr_void * sigma_e),
        });
    }

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::soil_index::soil_index;

    const PA: f64 = 101.325;

    #[test]
    fn test_olson_stark_cap() {
        // sigma_E = pa gives Cq = 1, so qc1 = qt / 1000
        assert_eq!(olson_stark_2002(10_000.0, PA, PA), 0.4);
        assert_eq!(olson_stark_2002(6_600.0, PA, PA), 0.4);
        let below = olson_stark_2002(5_000.0, PA, PA);
        assert!((below - (0.03 + 0.0143 * 5.0)).abs() < 1e-12);
    }

    #[test]
    fn test_robertson_k_factor() {
        assert_eq!(robertson_2010_k(1.64), 1.0);
        assert_eq!(robertson_2010_k(1.2), 1.0);
        let ic: f64 = 2.5;
        let expected =
            5.581 * ic.powi(3) - 0.403 * ic.powi(4) - 21.63 * ic.powi(2) + 33.75 * ic - 17.88;
        assert!((robertson_2010_k(ic) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_robertson_lsr_branches() {
        // Ic <= 1.64 keeps Qtn_cs = Qt_n
        let dense = robertson_2010(120.0, 1.5, 38.0);
        assert_eq!(dense.qtn_cs, 120.0);
        assert_eq!(dense.lsr, 0.4);

        let mid = robertson_2010(50.0, 1.5, 30.0);
        let expected = (0.02199 - 0.0003124 * 50.0) / (1.0 - 0.02676 * 50.0 + 0.0001783 * 2500.0);
        assert!((mid.lsr - expected).abs() < 1e-12);

        // floored at 0.05
        assert_eq!(robertson_2010(10.0, 1.5, 30.0).lsr, 0.05);

        // capped by tan(phi) only in the rational branch
        let steep = robertson_2010(10.0, 1.5, 2.0);
        assert!((steep.lsr - 2f64.to_radians().tan()).abs() < 1e-12);
        assert_eq!(robertson_2010(120.0, 1.5, 2.0).lsr, 0.4);
    }

    #[test]
    fn test_robertson_nan_propagates() {
        assert!(robertson_2010(f64::NAN, 2.0, 30.0).lsr.is_nan());
    }

    #[test]
    fn test_fines_content_bounds() {
        assert_eq!(fines_content(1.5, 0.0), 0.0);
        assert!((fines_content(2.0, 0.0) - 23.0).abs() < 1e-12);
        assert_eq!(fines_content(3.5, 0.0), 100.0);
        assert!((fines_content(2.0, 0.1) - 31.0).abs() < 1e-9);
    }

    #[test]
    fn test_ib_single_step_is_first_update() {
        let fc = 23.0;
        let single = ib_exponent(5000.0, 80.0, PA, fc, ExponentMode::SingleStep);
        let expected = ib_exponent_update(0.52, 5000.0, 80.0, PA, fc);
        assert_eq!(single.value(), Some(expected));
        assert_eq!(single.iterations(), 1);
    }

    #[test]
    fn test_ib_exponent_converges_to_fixed_point() {
        let fc = 23.0;
        let outcome = ib_exponent(5000.0, 80.0, PA, fc, ExponentMode::Converge);
        let m = outcome.value().unwrap();
        let again = ib_exponent_update(m, 5000.0, 80.0, PA, fc);
        assert!((again - m).abs() <= 0.001);
    }

    #[test]
    fn test_ib_lsr_bounds() {
        for qt in [500.0, 2000.0, 8000.0, 30_000.0] {
            let ib = idriss_boulanger_2015(0.5, 10.0, qt, 80.0, PA, 33.0);
            assert!((0.264..=0.782).contains(&ib.m));
            assert!(ib.lsr >= 0.05 && ib.lsr <= 0.4);
            assert!(ib.lsr_void >= 0.05 && ib.lsr_void <= 0.4);
            // the no-redistribution factor is >= 1
            assert!(ib.lsr >= ib.lsr_void);
        }
        // exponent outside the published range is clipped
        assert_eq!(idriss_boulanger_2015(0.9, 10.0, 2000.0, 80.0, PA, 33.0).m, 0.782);
    }

    #[test]
    fn test_residual_profile() {
        let qt = [2000.0, 2000.0];
        let effective = [80.0, f64::NAN];
        let soil = soil_index(&[1.0, 2.0], &qt, &[20.0, 20.0], &[100.0, f64::NAN], &effective, PA)
            .unwrap();

        let profile =
            residual_strength(&[1.0, 2.0], &qt, &effective, &soil, PA, &ResidualConfig::default())
                .unwrap();
        assert_eq!(profile.len(), 2);

        let first = &profile.records[0];
        assert!((first.olson_stark_sr - first.olson_stark_lsr * 80.0).abs() < 1e-12);
        let rob = first.robertson.unwrap();
        assert!((first.robertson_sr.unwrap() - rob.lsr * 80.0).abs() < 1e-12);
        let ib = first.idriss_boulanger.unwrap();
        assert!((first.idriss_boulanger_sr.unwrap() - ib.lsr * 80.0).abs() < 1e-12);
        assert!((first.idriss_boulanger_sr_void.unwrap() - ib.lsr_void * 80.0).abs() < 1e-12);

        // undefined Ic_n leaves the dependent models undefined
        let second = &profile.records[1];
        assert!(second.robertson.is_none());
        assert!(second.idriss_boulanger.is_none());
        assert!(second.idriss_boulanger_sr.is_none());
        assert!(profile.warnings.is_empty());
    }

    #[test]
    fn test_ib_exponent_exhausts_on_nan() {
        let outcome = ib_exponent(f64::NAN, 80.0, PA, 23.0, ExponentMode::Converge);
        assert!(!outcome.is_converged());
        assert_eq!(outcome.value(), None);
        assert_eq!(outcome.iterations(), IB_EXPONENT_LIMITS.max_iterations);
    }

    #[test]
    fn test_negative_effective_stress_is_undefined() {
        let outcome = ib_exponent(5000.0, -10.0, PA, 23.0, ExponentMode::Converge);
        assert!(!outcome.is_converged());

        let ib = idriss_boulanger_2015(0.5, 10.0, 2000.0, -10.0, PA, 33.0);
        assert!(ib.lsr.is_nan());
        assert!(ib.lsr_void.is_nan());
    }

    #[test]
    fn test_residual_profile_reports_ib_exhaustion() {
        let stress = [18.0, 36.0];
        let soil =
            soil_index(&[1.0, 2.0], &[2000.0, 2000.0], &[20.0, 20.0], &stress, &stress, PA).unwrap();
        assert_eq!(soil.converged_count(), 2);

        // Ic_n is defined for both samples but the second tip reading is unusable
        let qt = [2000.0, f64::NAN];
        let profile =
            residual_strength(&[1.0, 2.0], &qt, &stress, &soil, PA, &ResidualConfig::default())
                .unwrap();

        assert!(profile.records[0].idriss_boulanger.is_some());
        let second = &profile.records[1];
        assert!(second.idriss_boulanger.is_none());
        assert!(second.idriss_boulanger_sr.is_none());
        assert!(second.idriss_boulanger_sr_void.is_none());

        assert_eq!(profile.warnings.len(), 1);
        let warning = &profile.warnings[0];
        assert_eq!(warning.stage, IterationStage::IdrissBoulangerExponent);
        assert_eq!(warning.index, 1);
        assert_eq!(warning.depth, 2.0);
    }
}
