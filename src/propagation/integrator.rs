//! # Dormand–Prince 5(4) integrator
//!
//! Explicit embedded Runge–Kutta pair of order 5 with a 4th order error
//! estimate (Hairer, Nørsett & Wanner, *Solving ODE I*, DOPRI5):
//!
//! - 7 stages, the last one reused as the first of the next step (FSAL),
//! - local error control on a mixed absolute/relative scale,
//! - continuous 4th order dense output over each accepted step.
//!
//! The integrator works on the 6-dimensional Cartesian state and a scalar
//! time measured in seconds from the start epoch. It is a plain `Clone`
//! value: the right-hand side is passed to every call, so a copy of the
//! integrator is an independent restart point.

use nalgebra::Vector6;
use tracing::trace;

use crate::{orbit_errors::OrbitError, propagation::cowell::CowellParams};

/// `[x, y, z, vx, vy, vz]`
pub type State6 = Vector6<f64>;

// Butcher tableau
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// 5th minus 4th order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// dense output
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// One accepted step with its continuous extension.
#[derive(Debug, Clone)]
pub struct DenseStep {
    pub t0: f64,
    pub t1: f64,
    pub y1: State6,
    rcont: [State6; 5],
}

impl DenseStep {
    /// Whether `t` lies in the closed step interval.
    pub fn contains(&self, t: f64) -> bool {
        let (lo, hi) = if self.t0 <= self.t1 {
            (self.t0, self.t1)
        } else {
            (self.t1, self.t0)
        };
        (lo..=hi).contains(&t)
    }

    /// Evaluate the 4th order interpolant at `t`.
    pub fn interpolate(&self, t: f64) -> State6 {
        if t == self.t1 {
            return self.y1;
        }
        let theta = (t - self.t0) / (self.t1 - self.t0);
        let theta1 = 1.0 - theta;
        let [r1, r2, r3, r4, r5] = &self.rcont;
        r1 + theta * (r2 + theta1 * (r3 + theta * (r4 + theta1 * r5)))
    }
}

/// Weighted RMS norm of `v` on the scale `atol + rtol·max(|a|, |b|)`.
fn error_norm(v: &State6, a: &State6, b: &State6, params: &CowellParams) -> f64 {
    let sum: f64 = (0..6)
        .map(|i| {
            let sc = params.atol + params.rtol * a[i].abs().max(b[i].abs());
            (v[i] / sc).powi(2)
        })
        .sum();
    (sum / 6.0).sqrt()
}

/// Integrator state between two accepted steps.
#[derive(Debug, Clone)]
pub struct DormandPrince {
    t: f64,
    y: State6,
    f: State6,
    h: f64,
    direction: f64,
    steps: usize,
    rejected: usize,
}

impl DormandPrince {
    /// Start an integration at `(t0, y0)` heading in the sign of `direction`.
    ///
    /// The initial step is `params.initial_step` if set, otherwise Hairer's
    /// automatic estimate.
    ///
    /// Errors
    /// ------
    /// * Any error raised by `rhs`.
    pub fn new<F>(
        rhs: &F,
        t0: f64,
        y0: State6,
        direction: f64,
        params: &CowellParams,
    ) -> Result<Self, OrbitError>
    where
        F: Fn(f64, &State6) -> Result<State6, OrbitError>,
    {
        let direction = if direction < 0.0 { -1.0 } else { 1.0 };
        let f0 = rhs(t0, &y0)?;
        let h = match params.initial_step {
            Some(h) => h.abs().min(params.max_step),
            None => initial_step(rhs, t0, &y0, &f0, direction, params)?,
        };

        Ok(DormandPrince {
            t: t0,
            y: y0,
            f: f0,
            h: direction * h,
            direction,
            steps: 0,
            rejected: 0,
        })
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn state(&self) -> &State6 {
        &self.y
    }

    pub fn direction(&self) -> f64 {
        self.direction
    }

    /// Accepted and rejected step counts.
    pub fn step_counts(&self) -> (usize, usize) {
        (self.steps, self.rejected)
    }

    /// Advance by one accepted step, never past `t_bound`.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::Propagation`] on step size underflow, exhausted step
    ///   budget, or a non-finite state.
    /// * Any error raised by `rhs`.
    pub fn step<F>(
        &mut self,
        rhs: &F,
        t_bound: f64,
        params: &CowellParams,
    ) -> Result<DenseStep, OrbitError>
    where
        F: Fn(f64, &State6) -> Result<State6, OrbitError>,
    {
        let mut reject_streak = false;
        loop {
            if self.steps + self.rejected >= params.max_steps {
                return Err(OrbitError::Propagation(format!(
                    "step budget of {} exhausted at t = {} s",
                    params.max_steps, self.t
                )));
            }

            let mut h = self.h.abs().min(params.max_step);
            if h < params.min_step {
                return Err(OrbitError::Propagation(format!(
                    "step size underflow ({h:e} s) at t = {} s",
                    self.t
                )));
            }
            let remaining = (t_bound - self.t).abs();
            let last = h >= remaining;
            if last {
                h = remaining;
            }
            let h = self.direction * h;

            let t = self.t;
            let y = &self.y;
            let k1 = self.f;
            let k2 = rhs(t + C2 * h, &(y + h * A21 * k1))?;
            let k3 = rhs(t + C3 * h, &(y + h * (A31 * k1 + A32 * k2)))?;
            let k4 = rhs(t + C4 * h, &(y + h * (A41 * k1 + A42 * k2 + A43 * k3)))?;
            let k5 = rhs(
                t + C5 * h,
                &(y + h * (A51 * k1 + A52 * k2 + A53 * k3 + A54 * k4)),
            )?;
            let k6 = rhs(
                t + h,
                &(y + h * (A61 * k1 + A62 * k2 + A63 * k3 + A64 * k4 + A65 * k5)),
            )?;
            let y1 = y + h * (A71 * k1 + A73 * k3 + A74 * k4 + A75 * k5 + A76 * k6);
            let t1 = if last { t_bound } else { t + h };
            let k7 = rhs(t1, &y1)?;

            if !y1.iter().all(|x| x.is_finite()) {
                return Err(OrbitError::Propagation(format!(
                    "non-finite state after step at t = {t} s"
                )));
            }

            let err_vec = h * (E1 * k1 + E3 * k3 + E4 * k4 + E5 * k5 + E6 * k6 + E7 * k7);
            let err = error_norm(&err_vec, y, &y1, params);

            let mut factor = if err == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };

            if err <= 1.0 {
                if reject_streak {
                    factor = factor.min(1.0);
                }
                let rcont2 = y1 - y;
                let rcont3 = h * k1 - rcont2;
                let rcont4 = rcont2 - h * k7 - rcont3;
                let rcont5 = h * (D1 * k1 + D3 * k3 + D4 * k4 + D5 * k5 + D6 * k6 + D7 * k7);
                let dense = DenseStep {
                    t0: t,
                    t1,
                    y1,
                    rcont: [*y, rcont2, rcont3, rcont4, rcont5],
                };

                trace!(t = t1, h, err, "step accepted");
                self.t = t1;
                self.y = y1;
                self.f = k7;
                self.steps += 1;
                // keep the proposed step when the last one was shortened to hit the bound
                self.h = if last {
                    self.h.abs().max(h.abs()) * self.direction
                } else {
                    h * factor
                };
                return Ok(dense);
            }

            trace!(t, h, err, "step rejected");
            self.rejected += 1;
            reject_streak = true;
            self.h = h * factor.min(1.0);
        }
    }
}

/// Starting step estimate (Hairer, *Solving ODE I*, II.4).
fn initial_step<F>(
    rhs: &F,
    t0: f64,
    y0: &State6,
    f0: &State6,
    direction: f64,
    params: &CowellParams,
) -> Result<f64, OrbitError>
where
    F: Fn(f64, &State6) -> Result<State6, OrbitError>,
{
    let zero = State6::zeros();
    let d0 = error_norm(y0, y0, &zero, params);
    let d1 = error_norm(f0, y0, &zero, params);

    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };

    let y1 = y0 + direction * h0 * f0;
    let f1 = rhs(t0 + direction * h0, &y1)?;
    let d2 = error_norm(&(f1 - f0), y0, &zero, params) / h0;

    let h1 = if d1.max(d2) <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(0.2)
    };

    Ok((100.0 * h0).min(h1).min(params.max_step).max(params.min_step))
}
