//! # Kepler's equation solvers
//!
//! Root finders for the three conic regimes plus the universal-variable
//! formulation shared by the analytic propagator and the Lambert solver.
//!
//! | regime     | equation                  | method                                   |
//! |------------|---------------------------|------------------------------------------|
//! | elliptic   | `M = E − e·sin E`         | Newton–Raphson, seed `M` or bisection    |
//! | hyperbolic | `M = e·sinh H − H`        | Newton–Raphson, seed `sign(M)·ln(2|M|/e + 1.8)` |
//! | parabolic  | `M = D + D³/3`            | closed form (Barker)                     |
//! | universal  | `√μ·Δt = χ³c3 + …`        | safeguarded Newton–Raphson on χ          |
//!
//! All iterative solvers take a [`KeplerParams`] and fail with
//! [`OrbitError::Convergence`] when the iteration budget is exhausted.
//! Nothing is retried with a looser tolerance.

use std::f64::consts::PI;

use nalgebra::Vector3;
use roots::{find_root_newton_raphson, SimpleConvergency};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    anomaly::{
        eccentric_to_mean, eccentric_to_true, hyperbolic_to_mean, hyperbolic_to_true,
        mean_to_parabolic, parabolic_to_mean, parabolic_to_true, true_to_eccentric,
        true_to_hyperbolic, true_to_parabolic,
    },
    constants::{DPI, PARABOLIC_TOLERANCE},
    orbit_errors::OrbitError,
};

// -------------------------------------------------------------------------------------------------
// Angle helpers
// -------------------------------------------------------------------------------------------------

/// Principal value of an angle, in `[0, 2π)`.
pub fn principal_angle(a: f64) -> f64 {
    a.rem_euclid(DPI)
}

/// Wrap an angle into `(−π, π]`.
pub fn wrap_to_pi(a: f64) -> f64 {
    let w = principal_angle(a);
    if w > PI {
        w - DPI
    } else {
        w
    }
}

/// Principal difference `a − b`, in `[−π, π]`.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let mut diff = principal_angle(a) - principal_angle(b);

    if diff > PI {
        diff -= DPI;
    } else if diff < -PI {
        diff += DPI;
    }

    diff
}

// -------------------------------------------------------------------------------------------------
// Regime and parameters
// -------------------------------------------------------------------------------------------------

/// Conic regime of an orbit, decided from its eccentricity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrbitRegime {
    Elliptic,
    Parabolic,
    Hyperbolic,
}

impl OrbitRegime {
    /// Classify an eccentricity.
    ///
    /// Arguments
    /// ---------
    /// * `ecc` – eccentricity, must be finite and non-negative.
    /// * `parabolic_tolerance` – half-width of the band around 1 treated as parabolic.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidElements`] if `ecc` is negative or not finite.
    pub fn from_eccentricity(ecc: f64, parabolic_tolerance: f64) -> Result<Self, OrbitError> {
        if !ecc.is_finite() || ecc < 0.0 {
            return Err(OrbitError::InvalidElements(format!(
                "eccentricity must be finite and non-negative, got {ecc}"
            )));
        }
        Ok(if (ecc - 1.0).abs() <= parabolic_tolerance {
            OrbitRegime::Parabolic
        } else if ecc < 1.0 {
            OrbitRegime::Elliptic
        } else {
            OrbitRegime::Hyperbolic
        })
    }
}

/// Tuning of the Kepler-equation solvers.
///
/// Fields
/// ------
/// * `tolerance` – absolute residual tolerance (rad for the anomaly solvers,
///   relative step size for the universal solver).
/// * `max_iter` – Newton iteration budget.
/// * `parabolic_tolerance` – eccentricity band around 1 treated as parabolic.
///
/// The default tolerance (1e-12) is tighter than the usual 1e-8 so that
/// element round trips through the mean anomaly stay well below 1e-9.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeplerParams {
    pub tolerance: f64,
    pub max_iter: usize,
    pub parabolic_tolerance: f64,
}

impl KeplerParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent builder with validation on [`KeplerParamsBuilder::build`].
    pub fn builder() -> KeplerParamsBuilder {
        KeplerParamsBuilder::new()
    }
}

impl Default for KeplerParams {
    fn default() -> Self {
        KeplerParams {
            tolerance: 1e-12,
            max_iter: 50,
            parabolic_tolerance: PARABOLIC_TOLERANCE,
        }
    }
}

/// Builder for [`KeplerParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct KeplerParamsBuilder {
    params: KeplerParams,
}

impl KeplerParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: KeplerParams::default(),
        }
    }

    pub fn tolerance(mut self, v: f64) -> Self {
        self.params.tolerance = v;
        self
    }
    pub fn max_iter(mut self, v: usize) -> Self {
        self.params.max_iter = v;
        self
    }
    pub fn parabolic_tolerance(mut self, v: f64) -> Self {
        self.params.parabolic_tolerance = v;
        self
    }

    /// Validate and return the parameters.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if `tolerance ≤ 0`, `max_iter == 0`
    ///   or `parabolic_tolerance` is negative or ≥ 1.
    pub fn build(self) -> Result<KeplerParams, OrbitError> {
        let p = self.params;
        if !(p.tolerance.is_finite() && p.tolerance > 0.0) {
            return Err(OrbitError::InvalidArgument(
                "tolerance must be finite and > 0".into(),
            ));
        }
        if p.max_iter == 0 {
            return Err(OrbitError::InvalidArgument("max_iter must be >= 1".into()));
        }
        if !(0.0..1.0).contains(&p.parabolic_tolerance) {
            return Err(OrbitError::InvalidArgument(
                "parabolic_tolerance must be in [0, 1)".into(),
            ));
        }
        Ok(p)
    }
}

// -------------------------------------------------------------------------------------------------
// Regime-specific solvers
// -------------------------------------------------------------------------------------------------

/// Refine a starting point for high eccentricities by bisection on `[m, min(m + e, π)]`.
///
/// The residual `E − e·sin E − m` is monotonic and changes sign on that
/// interval for `m ∈ [0, π]`.
fn bisection_seed(m: f64, ecc: f64) -> f64 {
    const STEPS: usize = 8;

    let mut lo = m;
    let mut hi = (m + ecc).min(PI);
    for _ in 0..STEPS {
        let mid = 0.5 * (lo + hi);
        if mid - ecc * mid.sin() - m > 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Solve the elliptic Kepler equation `M = E − e·sin E` for `E`.
///
/// The mean anomaly is reduced to `(−π, π]` before solving and the removed
/// multiples of 2π are added back, so the result tracks `M` continuously.
///
/// Arguments
/// ---------
/// * `mean_anomaly` – mean anomaly M (rad), any real value.
/// * `ecc` – eccentricity in `[0, 1)`.
/// * `params` – tolerance and iteration budget.
///
/// Return
/// ------
/// * The eccentric anomaly E (rad).
///
/// Errors
/// ------
/// * [`OrbitError::InvalidElements`] if `ecc ∉ [0, 1)`.
/// * [`OrbitError::InvalidArgument`] if `mean_anomaly` is not finite.
/// * [`OrbitError::Convergence`] if Newton–Raphson exhausts `params.max_iter`.
pub fn solve_elliptic(mean_anomaly: f64, ecc: f64, params: &KeplerParams) -> Result<f64, OrbitError> {
    if !(0.0..1.0).contains(&ecc) {
        return Err(OrbitError::InvalidElements(format!(
            "elliptic Kepler equation needs 0 <= e < 1, got {ecc}"
        )));
    }
    if !mean_anomaly.is_finite() {
        return Err(OrbitError::InvalidArgument(format!(
            "mean anomaly must be finite, got {mean_anomaly}"
        )));
    }

    let reduced = wrap_to_pi(mean_anomaly);
    let offset = mean_anomaly - reduced;
    let sign = if reduced < 0.0 { -1.0 } else { 1.0 };
    let m = reduced.abs();

    let seed = if ecc <= 0.8 { m } else { bisection_seed(m, ecc) };

    let f = |e: f64| e - ecc * e.sin() - m;
    let df = |e: f64| 1.0 - ecc * e.cos();

    let mut convergency = SimpleConvergency {
        eps: params.tolerance,
        max_iter: params.max_iter,
    };

    let ecc_anomaly = find_root_newton_raphson(seed, &f, &df, &mut convergency)
        .map_err(|err| OrbitError::from_search(err, "elliptic Kepler solver", params.max_iter))?;

    trace!(mean_anomaly, ecc, ecc_anomaly, "elliptic Kepler equation solved");
    Ok(sign * ecc_anomaly + offset)
}

/// Solve the hyperbolic Kepler equation `M = e·sinh H − H` for `H`.
///
/// Arguments
/// ---------
/// * `mean_anomaly` – hyperbolic mean anomaly M (rad).
/// * `ecc` – eccentricity, `> 1`.
/// * `params` – tolerance and iteration budget.
///
/// Errors
/// ------
/// * [`OrbitError::InvalidElements`] if `ecc ≤ 1`.
/// * [`OrbitError::InvalidArgument`] if `mean_anomaly` is not finite.
/// * [`OrbitError::Convergence`] on iteration budget exhaustion.
pub fn solve_hyperbolic(
    mean_anomaly: f64,
    ecc: f64,
    params: &KeplerParams,
) -> Result<f64, OrbitError> {
    if !(ecc.is_finite() && ecc > 1.0) {
        return Err(OrbitError::InvalidElements(format!(
            "hyperbolic Kepler equation needs e > 1, got {ecc}"
        )));
    }
    if !mean_anomaly.is_finite() {
        return Err(OrbitError::InvalidArgument(format!(
            "mean anomaly must be finite, got {mean_anomaly}"
        )));
    }

    let seed = mean_anomaly.signum() * (2.0 * mean_anomaly.abs() / ecc + 1.8).ln();

    let f = |h: f64| ecc * h.sinh() - h - mean_anomaly;
    let df = |h: f64| ecc * h.cosh() - 1.0;

    let mut convergency = SimpleConvergency {
        eps: params.tolerance,
        max_iter: params.max_iter,
    };

    let hyp_anomaly = find_root_newton_raphson(seed, &f, &df, &mut convergency)
        .map_err(|err| OrbitError::from_search(err, "hyperbolic Kepler solver", params.max_iter))?;

    trace!(mean_anomaly, ecc, hyp_anomaly, "hyperbolic Kepler equation solved");
    Ok(hyp_anomaly)
}

/// Solve Barker's equation `M = D + D³/3` for the parabolic anomaly `D`.
pub fn solve_parabolic(mean_anomaly: f64) -> f64 {
    mean_to_parabolic(mean_anomaly)
}

/// Mean anomaly → true anomaly for any conic.
///
/// For elliptic orbits the result is in `[0, 2π)`; for open orbits it is in
/// `(−π, π)` and lies between the asymptotes.
///
/// Errors
/// ------
/// * Propagates the errors of [`solve_elliptic`] / [`solve_hyperbolic`].
pub fn mean_to_true_anomaly(
    mean_anomaly: f64,
    ecc: f64,
    params: &KeplerParams,
) -> Result<f64, OrbitError> {
    match OrbitRegime::from_eccentricity(ecc, params.parabolic_tolerance)? {
        OrbitRegime::Elliptic => {
            let e = solve_elliptic(mean_anomaly, ecc, params)?;
            Ok(principal_angle(eccentric_to_true(e, ecc)))
        }
        OrbitRegime::Hyperbolic => {
            let h = solve_hyperbolic(mean_anomaly, ecc, params)?;
            Ok(hyperbolic_to_true(h, ecc))
        }
        OrbitRegime::Parabolic => Ok(parabolic_to_true(solve_parabolic(mean_anomaly))),
    }
}

/// True anomaly → mean anomaly for any conic.
///
/// Errors
/// ------
/// * [`OrbitError::InvalidElements`] if `ecc` is invalid, or if an open
///   orbit's `nu` lies on or beyond its asymptotes.
pub fn true_to_mean_anomaly(nu: f64, ecc: f64, parabolic_tolerance: f64) -> Result<f64, OrbitError> {
    match OrbitRegime::from_eccentricity(ecc, parabolic_tolerance)? {
        OrbitRegime::Elliptic => Ok(principal_angle(eccentric_to_mean(
            true_to_eccentric(nu, ecc),
            ecc,
        ))),
        OrbitRegime::Hyperbolic => {
            let nu = wrap_to_pi(nu);
            if 1.0 + ecc * nu.cos() <= 0.0 {
                return Err(OrbitError::InvalidElements(format!(
                    "true anomaly {nu} lies beyond the asymptotes of a hyperbola with e = {ecc}"
                )));
            }
            Ok(hyperbolic_to_mean(true_to_hyperbolic(nu, ecc), ecc))
        }
        OrbitRegime::Parabolic => {
            let nu = wrap_to_pi(nu);
            if nu.abs() >= PI {
                return Err(OrbitError::InvalidElements(
                    "true anomaly of a parabola must lie in (-pi, pi)".into(),
                ));
            }
            Ok(parabolic_to_mean(true_to_parabolic(nu)))
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Universal variable
// -------------------------------------------------------------------------------------------------

/// Stumpff functions `c2(ψ)` and `c3(ψ)`.
///
/// Closed forms for `|ψ| ≥ 1`, power series otherwise:
/// `c2 = Σ (−ψ)^k / (2k+2)!`, `c3 = Σ (−ψ)^k / (2k+3)!`.
/// At `ψ = 0` they reduce to `(1/2, 1/6)`.
pub fn stumpff(psi: f64) -> (f64, f64) {
    const SERIES_TERMS: usize = 12;

    if psi >= 1.0 {
        let sq = psi.sqrt();
        ((1.0 - sq.cos()) / psi, (sq - sq.sin()) / (psi * sq))
    } else if psi <= -1.0 {
        let sq = (-psi).sqrt();
        ((1.0 - sq.cosh()) / psi, (sq.sinh() - sq) / (-psi * sq))
    } else {
        let mut term2 = 0.5;
        let mut term3 = 1.0 / 6.0;
        let mut c2 = term2;
        let mut c3 = term3;
        for k in 1..=SERIES_TERMS {
            let k = k as f64;
            term2 *= -psi / ((2.0 * k + 1.0) * (2.0 * k + 2.0));
            term3 *= -psi / ((2.0 * k + 2.0) * (2.0 * k + 3.0));
            c2 += term2;
            c3 += term3;
        }
        (c2, c3)
    }
}

/// Converged state of the universal Kepler equation.
///
/// Fields
/// ------
/// * `chi` – universal anomaly χ.
/// * `psi` – `χ²·α` with `α = 1/a`.
/// * `c2`, `c3` – Stumpff functions at `psi`.
/// * `radius` – distance to the attractor at the final time.
/// * `iterations` – Newton iterations used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniversalKeplerSolution {
    pub chi: f64,
    pub psi: f64,
    pub c2: f64,
    pub c3: f64,
    pub radius: f64,
    pub iterations: usize,
}

/// Initial guess for χ, one formula per conic family.
///
/// The hyperbolic formula is asymptotic in Δt and can land on the wrong side
/// of zero; any guess whose sign differs from Δt falls back to `√μ·Δt/|r0|`.
fn universal_seed(r0: &Vector3<f64>, v0: &Vector3<f64>, dt: f64, mu: f64, alpha: f64) -> f64 {
    let r0n = r0.norm();
    let sqrt_mu = mu.sqrt();
    let scaled_alpha = alpha * r0n;

    let guess = if scaled_alpha > 1e-6 {
        sqrt_mu * dt * alpha
    } else if scaled_alpha < -1e-6 {
        let a = 1.0 / alpha;
        let sdt = dt.signum();
        let num = -2.0 * mu * alpha * dt;
        let den = r0.dot(v0) + sdt * (-mu * a).sqrt() * (1.0 - r0n * alpha);
        sdt * (-a).sqrt() * (num / den).ln()
    } else {
        let h = r0.cross(v0);
        let p = h.norm_squared() / mu;
        let s = 0.5 * (1.0 / (3.0 * (mu / p.powi(3)).sqrt() * dt)).atan();
        let w = s.tan().cbrt().atan();
        p.sqrt() * 2.0 / (2.0 * w).tan()
    };

    if guess.is_finite() && guess * dt > 0.0 {
        guess
    } else {
        sqrt_mu * dt / r0n
    }
}

/// Solve the universal Kepler equation for the universal anomaly χ.
///
/// `√μ·Δt = χ³·c3(ψ) + (r0·v0/√μ)·χ²·c2(ψ) + |r0|·χ·(1 − ψ·c3(ψ))` with `ψ = α·χ²`,
/// valid across elliptic, parabolic and hyperbolic regimes.
///
/// The residual is strictly increasing in χ (its derivative is the radius), so
/// the root has the sign of Δt and every evaluated point tightens a bracket
/// around it. Newton–Raphson runs inside that bracket: a step that leaves it,
/// or an evaluation that overflows, is replaced by bisection (or by doubling
/// while the bracket is still open). Convergence is declared when the Newton
/// step drops below `params.tolerance · max(1, |χ|)`.
///
/// Arguments
/// ---------
/// * `r0`, `v0` – initial position and velocity.
/// * `dt` – signed elapsed time.
/// * `mu` – gravitational parameter.
/// * `params` – tolerance and iteration budget.
///
/// Errors
/// ------
/// * [`OrbitError::InvalidArgument`] if `mu ≤ 0`, `dt` is not finite or `r0` is null.
/// * [`OrbitError::Convergence`] if the iteration budget is exhausted.
pub fn solve_universal_kepler(
    r0: &Vector3<f64>,
    v0: &Vector3<f64>,
    dt: f64,
    mu: f64,
    params: &KeplerParams,
) -> Result<UniversalKeplerSolution, OrbitError> {
    if !(mu.is_finite() && mu > 0.0) {
        return Err(OrbitError::InvalidArgument(format!(
            "gravitational parameter must be > 0, got {mu}"
        )));
    }
    if !dt.is_finite() {
        return Err(OrbitError::InvalidArgument(format!(
            "elapsed time must be finite, got {dt}"
        )));
    }
    let r0n = r0.norm();
    if r0n == 0.0 {
        return Err(OrbitError::InvalidArgument(
            "initial position must not be the null vector".into(),
        ));
    }

    let sqrt_mu = mu.sqrt();
    let sigma0 = r0.dot(v0) / sqrt_mu;
    let alpha = 2.0 / r0n - v0.norm_squared() / mu;

    if dt == 0.0 {
        let (c2, c3) = stumpff(0.0);
        return Ok(UniversalKeplerSolution {
            chi: 0.0,
            psi: 0.0,
            c2,
            c3,
            radius: r0n,
            iterations: 0,
        });
    }

    let mut chi = universal_seed(r0, v0, dt, mu, alpha);
    let (mut lo, mut hi) = if dt > 0.0 {
        (0.0, f64::INFINITY)
    } else {
        (f64::NEG_INFINITY, 0.0)
    };

    for iteration in 1..=params.max_iter {
        let psi = chi * chi * alpha;
        let (c2, c3) = stumpff(psi);

        let chi2 = chi * chi;
        let radius = chi2 * c2 + sigma0 * chi * (1.0 - psi * c3) + r0n * (1.0 - psi * c2);
        let residual =
            chi2 * chi * c3 + sigma0 * chi2 * c2 + r0n * chi * (1.0 - psi * c3) - sqrt_mu * dt;

        let newton = if radius.is_finite() && radius > 0.0 && residual.is_finite() {
            let step = -residual / radius;
            if step.abs() <= params.tolerance * chi.abs().max(1.0) {
                let chi = chi + step;
                let psi = chi * chi * alpha;
                let (c2, c3) = stumpff(psi);
                let chi2 = chi * chi;
                let radius = chi2 * c2 + sigma0 * chi * (1.0 - psi * c3) + r0n * (1.0 - psi * c2);
                debug!(iterations = iteration, chi, "universal Kepler equation solved");
                return Ok(UniversalKeplerSolution {
                    chi,
                    psi,
                    c2,
                    c3,
                    radius,
                    iterations: iteration,
                });
            }
            if residual < 0.0 {
                lo = chi;
            } else {
                hi = chi;
            }
            chi + step
        } else {
            // overflow far out on a hyperbola: the root is closer to zero
            if chi > 0.0 {
                hi = chi;
            } else {
                lo = chi;
            }
            f64::NAN
        };

        chi = if lo < newton && newton < hi {
            newton
        } else if lo.is_finite() && hi.is_finite() {
            0.5 * (lo + hi)
        } else {
            2.0 * chi
        };
    }

    Err(OrbitError::Convergence {
        solver: "universal Kepler solver",
        iterations: params.max_iter,
    })
}
