//! # Lambert's problem
//!
//! Find the velocities joining two position vectors `r1`, `r2` in a fixed
//! time of flight `T` under two-body dynamics.
//!
//! ## Formulation
//!
//! Universal variable `ψ` with the Stumpff functions of [`stumpff`]:
//!
//! ```text
//! A    = ±√(r1·r2·(1 + cos Δν))        (+ short way, − long way)
//! y(ψ) = r1 + r2 + A·(ψ·c3 − 1)/√c2
//! √μ·T = (y/c2)^{3/2}·c3 + A·√y
//! ```
//!
//! and the Lagrange coefficients `f = 1 − y/r1`, `g = A·√(y/μ)`,
//! `ġ = 1 − y/r2` give
//!
//! ```text
//! v1 = (r2 − f·r1)/g        v2 = (ġ·r2 − r1)/g
//! ```
//!
//! ## Revolutions
//!
//! * `M = 0`: `T(ψ)` is monotonic on `ψ < 4π²`. A Newton–Raphson iteration
//!   is kept inside a shrinking bracket and falls back to bisection whenever
//!   the Newton step leaves it.
//! * `M > 0`: `ψ ∈ ((2Mπ)², (2(M+1)π)²)`. `T(ψ)` is infinite at both ends and
//!   has a single minimum in between. The minimum is located with Brent's
//!   method on `dT/dψ`, then each monotonic side ([`LambertBranch::Left`],
//!   [`LambertBranch::Right`]) is solved with Brent's method on `T(ψ) − T`.
//!   A time of flight below the minimum has no `M`-revolution solution.

use std::f64::consts::PI;

use nalgebra::Vector3;
use roots::{find_root_brent, SimpleConvergency};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{kepler::stumpff, orbit_errors::OrbitError};

/// Expansion steps allowed when pushing the hyperbolic side of the
/// zero-revolution bracket. Past this `cosh(√−ψ)` overflows.
const MAX_BRACKET_EXPANSIONS: usize = 12;

/// Direction of the transfer arc.
///
/// `ShortWay` and `LongWay` select the transfer angle directly
/// (`Δν < π` and `Δν > π`). `Prograde` and `Retrograde` pick whichever of
/// the two moves counter-clockwise (resp. clockwise) around `+ẑ`, based on
/// the sign of `(r1 × r2)·ẑ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferPath {
    ShortWay,
    LongWay,
    Prograde,
    Retrograde,
}

impl TransferPath {
    /// Path to use when solving the reversed problem `(r2, r1, T)` so that the
    /// same physical arc is flown backwards.
    ///
    /// Swapping the endpoints flips the sign of `(r1 × r2)·ẑ`, so the
    /// direction-based paths swap while the angle-based ones are unchanged.
    pub fn reversed(self) -> Self {
        match self {
            TransferPath::Prograde => TransferPath::Retrograde,
            TransferPath::Retrograde => TransferPath::Prograde,
            other => other,
        }
    }

    /// `true` if the path resolves to the short way (`Δν < π`) for these
    /// endpoints.
    pub fn is_short_way(self, r1: &Vector3<f64>, r2: &Vector3<f64>) -> bool {
        let cross_z = r1.cross(r2).z;
        match self {
            TransferPath::ShortWay => true,
            TransferPath::LongWay => false,
            TransferPath::Prograde => cross_z >= 0.0,
            TransferPath::Retrograde => cross_z < 0.0,
        }
    }
}

/// Which root of a multi-revolution problem a solution comes from.
///
/// `Left` has the smaller `ψ` (longer semi-major axis), `Right` the larger.
/// Zero-revolution solutions are `Single`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LambertBranch {
    Single,
    Left,
    Right,
}

/// Solver controls.
///
/// Fields
/// -----------------
/// * `tolerance` – relative tolerance on the time of flight and absolute
///   tolerance on `ψ` for the Brent searches.
/// * `max_iter` – iteration budget of each root search.
/// * `degenerate_angle_tolerance` – `sin Δν` below which the transfer plane
///   is considered undefined (`Δν ≈ 0` or `Δν ≈ π`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LambertParams {
    pub tolerance: f64,
    pub max_iter: usize,
    pub degenerate_angle_tolerance: f64,
}

impl LambertParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> LambertParamsBuilder {
        LambertParamsBuilder::new()
    }
}

impl Default for LambertParams {
    fn default() -> Self {
        LambertParams {
            tolerance: 1e-10,
            max_iter: 100,
            degenerate_angle_tolerance: 1e-8,
        }
    }
}

/// Builder for [`LambertParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct LambertParamsBuilder {
    params: LambertParams,
}

impl LambertParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: LambertParams::default(),
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
    pub fn degenerate_angle_tolerance(mut self, v: f64) -> Self {
        self.params.degenerate_angle_tolerance = v;
        self
    }

    /// Validate and return the parameters.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if `tolerance ≤ 0`, `max_iter == 0`
    ///   or `degenerate_angle_tolerance` is outside `[0, 1)`.
    pub fn build(self) -> Result<LambertParams, OrbitError> {
        let p = self.params;
        if !(p.tolerance.is_finite() && p.tolerance > 0.0) {
            return Err(OrbitError::InvalidArgument(
                "tolerance must be finite and > 0".into(),
            ));
        }
        if p.max_iter == 0 {
            return Err(OrbitError::InvalidArgument("max_iter must be >= 1".into()));
        }
        if !(0.0..1.0).contains(&p.degenerate_angle_tolerance) {
            return Err(OrbitError::InvalidArgument(
                "degenerate_angle_tolerance must be in [0, 1)".into(),
            ));
        }
        Ok(p)
    }
}

/// One solution of a Lambert problem.
///
/// Fields
/// -----------------
/// * `v1`, `v2` – velocities at `r1` and `r2`.
/// * `revolutions` – complete revolutions flown before reaching `r2`.
/// * `branch` – root the solution was taken from.
/// * `psi` – converged universal variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertSolution {
    pub v1: Vector3<f64>,
    pub v2: Vector3<f64>,
    pub revolutions: u32,
    pub branch: LambertBranch,
    pub psi: f64,
}

/// Boundary-value problem joining `r1` to `r2` in `time_of_flight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertProblem {
    r1: Vector3<f64>,
    r2: Vector3<f64>,
    time_of_flight: f64,
    mu: f64,
    path: TransferPath,
}

impl LambertProblem {
    /// Build and validate a Lambert problem.
    ///
    /// Arguments
    /// ---------
    /// * `r1`, `r2`: departure and arrival positions.
    /// * `time_of_flight`: transfer duration, same time unit as `mu`.
    /// * `mu`: gravitational parameter of the attractor.
    /// * `path`: transfer direction, see [`TransferPath`].
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if `time_of_flight ≤ 0`, `mu ≤ 0`,
    ///   or a position is zero-length or non-finite.
    pub fn new(
        r1: Vector3<f64>,
        r2: Vector3<f64>,
        time_of_flight: f64,
        mu: f64,
        path: TransferPath,
    ) -> Result<Self, OrbitError> {
        if !(time_of_flight.is_finite() && time_of_flight > 0.0) {
            return Err(OrbitError::InvalidArgument(format!(
                "time of flight must be finite and > 0, got {time_of_flight}"
            )));
        }
        if !(mu.is_finite() && mu > 0.0) {
            return Err(OrbitError::InvalidArgument(format!(
                "gravitational parameter must be finite and > 0, got {mu}"
            )));
        }
        for (name, r) in [("r1", &r1), ("r2", &r2)] {
            let n = r.norm();
            if !(n.is_finite() && n > 0.0) {
                return Err(OrbitError::InvalidArgument(format!(
                    "{name} must be a finite, non-zero position vector"
                )));
            }
        }
        Ok(LambertProblem {
            r1,
            r2,
            time_of_flight,
            mu,
            path,
        })
    }

    pub fn r1(&self) -> &Vector3<f64> {
        &self.r1
    }

    pub fn r2(&self) -> &Vector3<f64> {
        &self.r2
    }

    pub fn time_of_flight(&self) -> f64 {
        self.time_of_flight
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn path(&self) -> TransferPath {
        self.path
    }

    /// Same arc flown backwards: `(r2, r1, T)` with [`TransferPath::reversed`].
    ///
    /// Its solutions are the time-reversed velocities `(−v2, −v1)`.
    pub fn reversed(&self) -> Self {
        LambertProblem {
            r1: self.r2,
            r2: self.r1,
            time_of_flight: self.time_of_flight,
            mu: self.mu,
            path: self.path.reversed(),
        }
    }

    /// Transfer angle `Δν ∈ (0, 2π)` implied by the path.
    pub fn transfer_angle(&self) -> f64 {
        let cross = self.r1.cross(&self.r2).norm();
        let theta = cross.atan2(self.r1.dot(&self.r2));
        if self.path.is_short_way(&self.r1, &self.r2) {
            theta
        } else {
            2.0 * PI - theta
        }
    }

    /// All solutions with `0..=max_revolutions` complete revolutions.
    ///
    /// The zero-revolution solution comes first, followed by the `Left` and
    /// `Right` solutions of each feasible revolution count. Revolution counts
    /// whose minimum time of flight exceeds `T` are skipped.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::DegenerateGeometry`] if `Δν ≈ 0` or `Δν ≈ π`.
    /// * [`OrbitError::Convergence`] if a root search exhausts its budget.
    ///
    /// See also
    /// --------
    /// * [`LambertProblem::solve_single`] – one specific root.
    /// * [`solve_many`] – batch version.
    pub fn solve(
        &self,
        max_revolutions: u32,
        params: &LambertParams,
    ) -> Result<Vec<LambertSolution>, OrbitError> {
        let geometry = self.geometry(params)?;
        debug!(
            max_revolutions,
            tof = self.time_of_flight,
            transfer_angle = self.transfer_angle(),
            "Lambert solve"
        );

        let mut solutions = vec![self.zero_revolution(&geometry, params)?];
        for revs in 1..=max_revolutions {
            match self.multi_revolution(&geometry, revs, params)? {
                Some((left, right)) => {
                    solutions.push(left);
                    solutions.push(right);
                }
                None => debug!(revs, "time of flight below the minimum, no solution"),
            }
        }

        debug!(count = solutions.len(), "Lambert solve done");
        Ok(solutions)
    }

    /// Solve for one root.
    ///
    /// Arguments
    /// ---------
    /// * `revolutions`: number of complete revolutions.
    /// * `branch`: [`LambertBranch::Single`] when `revolutions == 0`,
    ///   `Left` or `Right` otherwise.
    /// * `params`: solver controls.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if `branch` does not match
    ///   `revolutions`, or if no `revolutions`-revolution transfer exists for
    ///   this time of flight.
    /// * [`OrbitError::DegenerateGeometry`] if `Δν ≈ 0` or `Δν ≈ π`.
    /// * [`OrbitError::Convergence`] if a root search exhausts its budget.
    pub fn solve_single(
        &self,
        revolutions: u32,
        branch: LambertBranch,
        params: &LambertParams,
    ) -> Result<LambertSolution, OrbitError> {
        match (revolutions, branch) {
            (0, LambertBranch::Single) => {
                let geometry = self.geometry(params)?;
                self.zero_revolution(&geometry, params)
            }
            (0, _) | (_, LambertBranch::Single) => Err(OrbitError::InvalidArgument(format!(
                "branch {branch:?} is not valid for {revolutions} revolution(s)"
            ))),
            (revs, _) => {
                let geometry = self.geometry(params)?;
                let (left, right) = self.multi_revolution(&geometry, revs, params)?.ok_or_else(|| {
                    OrbitError::InvalidArgument(format!(
                        "no {revs}-revolution transfer exists for a time of flight of {}",
                        self.time_of_flight
                    ))
                })?;
                Ok(if branch == LambertBranch::Left { left } else { right })
            }
        }
    }

    fn geometry(&self, params: &LambertParams) -> Result<TransferGeometry, OrbitError> {
        let r1_norm = self.r1.norm();
        let r2_norm = self.r2.norm();
        let scale = r1_norm * r2_norm;
        let sin_angle = self.r1.cross(&self.r2).norm() / scale;

        if sin_angle < params.degenerate_angle_tolerance {
            return Err(OrbitError::DegenerateGeometry(format!(
                "transfer angle is 0 or π (sin Δν = {sin_angle:.3e}), transfer plane undefined"
            )));
        }

        let cos_angle = (self.r1.dot(&self.r2) / scale).clamp(-1.0, 1.0);
        let magnitude = (scale * (1.0 + cos_angle)).sqrt();
        let a_param = if self.path.is_short_way(&self.r1, &self.r2) {
            magnitude
        } else {
            -magnitude
        };

        Ok(TransferGeometry {
            r1_norm,
            r2_norm,
            a_param,
            sqrt_mu: self.mu.sqrt(),
        })
    }

    fn zero_revolution(
        &self,
        geometry: &TransferGeometry,
        params: &LambertParams,
    ) -> Result<LambertSolution, OrbitError> {
        let target = self.time_of_flight;
        let tof_or_zero = |psi: f64| geometry.time_of_flight(psi).unwrap_or(0.0);

        let mut hi = 4.0 * PI * PI;
        let mut lo = -4.0 * PI * PI;
        let mut expansions = 0;
        while tof_or_zero(lo) >= target {
            if expansions == MAX_BRACKET_EXPANSIONS {
                return Err(OrbitError::Convergence {
                    solver: "Lambert bracket search",
                    iterations: expansions,
                });
            }
            lo *= 2.0;
            expansions += 1;
        }

        let mut psi = 0.0;
        for iteration in 0..params.max_iter {
            let Some(tof) = geometry.time_of_flight(psi) else {
                lo = psi;
                psi = 0.5 * (lo + hi);
                continue;
            };

            let residual = tof - target;
            if residual.abs() <= params.tolerance * target {
                debug!(iterations = iteration, psi, "zero-revolution Lambert converged");
                return self.solution(geometry, psi, 0, LambertBranch::Single);
            }

            if residual < 0.0 {
                lo = psi;
            } else {
                hi = psi;
            }

            let newton = psi - residual / geometry.time_derivative(psi);
            psi = if newton.is_finite() && newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };
        }

        Err(OrbitError::Convergence {
            solver: "zero-revolution Lambert solver",
            iterations: params.max_iter,
        })
    }

    fn multi_revolution(
        &self,
        geometry: &TransferGeometry,
        revolutions: u32,
        params: &LambertParams,
    ) -> Result<Option<(LambertSolution, LambertSolution)>, OrbitError> {
        let target = self.time_of_flight;
        let m = revolutions as f64;
        let lo = (2.0 * m * PI).powi(2);
        let hi = (2.0 * (m + 1.0) * PI).powi(2);
        let margin = 1e-6 * (hi - lo);

        // T → 0 as y → 0⁺, so 0 continues T past the edge of the real transfers
        let tof = |psi: f64| geometry.time_of_flight(psi).unwrap_or(0.0);
        let scaled_derivative = |psi: f64| geometry.time_derivative(psi) / target;
        let residual = |psi: f64| tof(psi) / target - 1.0;

        let mut convergency = SimpleConvergency {
            eps: params.tolerance,
            max_iter: params.max_iter,
        };
        let psi_min = find_root_brent(lo + margin, hi - margin, &scaled_derivative, &mut convergency)
            .map_err(|err| {
                OrbitError::from_search(err, "Lambert minimum-time search", params.max_iter)
            })?;

        let tof_min = tof(psi_min);
        if target < tof_min {
            return Ok(None);
        }
        if (target - tof_min) <= params.tolerance * target {
            warn!(
                revolutions,
                tof_min, "time of flight at the branch minimum, left and right roots coincide"
            );
        }

        let left_end = self.branch_end(lo, psi_min, &tof)?;
        let right_end = self.branch_end(hi, psi_min, &tof)?;

        let mut convergency = SimpleConvergency {
            eps: params.tolerance,
            max_iter: params.max_iter,
        };
        let psi_left = find_root_brent(left_end, psi_min, &residual, &mut convergency)
            .map_err(|err| OrbitError::from_search(err, "Lambert left branch", params.max_iter))?;

        let mut convergency = SimpleConvergency {
            eps: params.tolerance,
            max_iter: params.max_iter,
        };
        let psi_right = find_root_brent(psi_min, right_end, &residual, &mut convergency)
            .map_err(|err| OrbitError::from_search(err, "Lambert right branch", params.max_iter))?;

        debug!(revolutions, psi_min, psi_left, psi_right, "multi-revolution Lambert converged");

        Ok(Some((
            self.solution(geometry, psi_left, revolutions, LambertBranch::Left)?,
            self.solution(geometry, psi_right, revolutions, LambertBranch::Right)?,
        )))
    }

    /// Move from `psi_min` towards the singular end `edge` until the time of
    /// flight exceeds the target, giving the outer end of a Brent bracket.
    fn branch_end<F>(&self, edge: f64, psi_min: f64, tof: &F) -> Result<f64, OrbitError>
    where
        F: Fn(f64) -> f64,
    {
        let mut gap = 1e-3 * (edge - psi_min).abs();
        for attempt in 0..MAX_BRACKET_EXPANSIONS {
            let candidate = edge + gap.copysign(psi_min - edge);
            if tof(candidate) > self.time_of_flight {
                return Ok(candidate);
            }
            gap *= 1e-2;
            if gap == 0.0 {
                return Err(OrbitError::Convergence {
                    solver: "Lambert branch bracket",
                    iterations: attempt + 1,
                });
            }
        }
        Err(OrbitError::Convergence {
            solver: "Lambert branch bracket",
            iterations: MAX_BRACKET_EXPANSIONS,
        })
    }

    fn solution(
        &self,
        geometry: &TransferGeometry,
        psi: f64,
        revolutions: u32,
        branch: LambertBranch,
    ) -> Result<LambertSolution, OrbitError> {
        let y = geometry.y(psi).0;
        let f = 1.0 - y / geometry.r1_norm;
        let g = geometry.a_param * (y / self.mu).sqrt();
        let g_dot = 1.0 - y / geometry.r2_norm;

        if !(g.is_finite() && g != 0.0) {
            return Err(OrbitError::DegenerateGeometry(
                "Lagrange coefficient g vanished, velocities undefined".into(),
            ));
        }

        Ok(LambertSolution {
            v1: (self.r2 - f * self.r1) / g,
            v2: (g_dot * self.r2 - self.r1) / g,
            revolutions,
            branch,
            psi,
        })
    }
}

/// Quantities fixed by the endpoints and path.
struct TransferGeometry {
    r1_norm: f64,
    r2_norm: f64,
    a_param: f64,
    sqrt_mu: f64,
}

impl TransferGeometry {
    /// `(y, c2, c3)` at `psi`.
    fn y(&self, psi: f64) -> (f64, f64, f64) {
        let (c2, c3) = stumpff(psi);
        let y = self.r1_norm + self.r2_norm + self.a_param * (psi * c3 - 1.0) / c2.sqrt();
        (y, c2, c3)
    }

    /// Time of flight at `psi`, `None` where `y < 0` (no real transfer).
    fn time_of_flight(&self, psi: f64) -> Option<f64> {
        let (y, c2, c3) = self.y(psi);
        if y < 0.0 {
            return None;
        }
        let x = (y / c2).sqrt();
        Some((x.powi(3) * c3 + self.a_param * y.sqrt()) / self.sqrt_mu)
    }

    /// `dT/dψ`.
    ///
    /// `y` is floored at a round-off sized positive value, so the result stays
    /// finite where no real transfer exists or where `y` touches zero.
    fn time_derivative(&self, psi: f64) -> f64 {
        let (y, c2, c3) = self.y(psi);
        let y = y.max(f64::EPSILON * (self.r1_norm + self.r2_norm));
        let a = self.a_param;
        let d = if psi.abs() > 1e-6 {
            (y / c2).powf(1.5) * ((c2 - 1.5 * c3 / c2) / (2.0 * psi) + 0.75 * c3 * c3 / c2)
                + a / 8.0 * (3.0 * c3 / c2 * y.sqrt() + a * (c2 / y).sqrt())
        } else {
            2f64.sqrt() / 40.0 * y.powf(1.5)
                + a / 8.0 * (y.sqrt() + a * (1.0 / (2.0 * y)).sqrt())
        };
        d / self.sqrt_mu
    }
}

/// Solve many independent problems.
///
/// With the `parallel` feature the problems are spread over the rayon thread
/// pool. Results keep the input order.
pub fn solve_many(
    problems: &[LambertProblem],
    max_revolutions: u32,
    params: &LambertParams,
) -> Vec<Result<Vec<LambertSolution>, OrbitError>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        problems
            .par_iter()
            .map(|p| p.solve(max_revolutions, params))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        problems
            .iter()
            .map(|p| p.solve(max_revolutions, params))
            .collect()
    }
}
