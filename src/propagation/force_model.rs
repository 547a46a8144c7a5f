//! # Force models
//!
//! Perturbing accelerations added to the central two-body term by the
//! [`crate::propagation::cowell`] propagator.
//!
//! A contributor is anything implementing [`ForceModel`]: the provided
//! [`J2Perturbation`], [`ExponentialDrag`], [`ThirdBody`] and [`EdelbaumThrust`] models, or any
//! closure `Fn(&CartesianState, Epoch) -> Vector3<f64> + Send + Sync`.
//! Contributors are evaluated in order and summed.
//!
//! Units are those of the propagated state. The Earth presets assume km and
//! seconds.

use std::f64::consts::FRAC_PI_2;

use hifitime::Epoch;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{EARTH_EQUATORIAL_RADIUS, J2_EARTH, MU_EARTH, SINGULARITY_TOLERANCE},
    orbit_errors::OrbitError,
    orbit_state::circular_velocity,
    orbit_type::cartesian::CartesianState,
};

/// Perturbing acceleration as a function of the state and epoch.
///
/// Implementations must be pure: the integrator calls them several times
/// per step, at trial states that may be rejected.
pub trait ForceModel: Send + Sync {
    fn acceleration(&self, state: &CartesianState, epoch: Epoch) -> Vector3<f64>;
}

impl<F> ForceModel for F
where
    F: Fn(&CartesianState, Epoch) -> Vector3<f64> + Send + Sync,
{
    fn acceleration(&self, state: &CartesianState, epoch: Epoch) -> Vector3<f64> {
        self(state, epoch)
    }
}

/// Source of a body's position relative to the central attractor.
pub trait EphemerisProvider: Send + Sync {
    fn position(&self, epoch: Epoch) -> Vector3<f64>;
}

impl<F> EphemerisProvider for F
where
    F: Fn(Epoch) -> Vector3<f64> + Send + Sync,
{
    fn position(&self, epoch: Epoch) -> Vector3<f64> {
        self(epoch)
    }
}

// -------------------------------------------------------------------------------------------------
// J2
// -------------------------------------------------------------------------------------------------

/// Oblateness (J2 zonal harmonic) of the central body.
///
/// ```text
/// a = −3/2 · J2 μ R² / r⁵ · [x(1 − 5z²/r²), y(1 − 5z²/r²), z(3 − 5z²/r²)]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct J2Perturbation {
    pub mu: f64,
    pub j2: f64,
    pub equatorial_radius: f64,
}

impl J2Perturbation {
    /// Earth values (km, s).
    pub fn earth() -> Self {
        J2Perturbation {
            mu: MU_EARTH,
            j2: J2_EARTH,
            equatorial_radius: EARTH_EQUATORIAL_RADIUS,
        }
    }
}

impl ForceModel for J2Perturbation {
    fn acceleration(&self, state: &CartesianState, _epoch: Epoch) -> Vector3<f64> {
        let r = &state.position;
        let r_mag = r.norm();
        let z2_r2 = (r.z / r_mag).powi(2);
        let factor = -1.5 * self.j2 * self.mu * self.equatorial_radius.powi(2) / r_mag.powi(5);

        Vector3::new(
            factor * r.x * (1.0 - 5.0 * z2_r2),
            factor * r.y * (1.0 - 5.0 * z2_r2),
            factor * r.z * (3.0 - 5.0 * z2_r2),
        )
    }
}

// -------------------------------------------------------------------------------------------------
// Drag
// -------------------------------------------------------------------------------------------------

/// Piecewise exponential atmosphere (Vallado, table 8-4):
/// `(base altitude km, base density kg/m³, scale height km)`.
const EXPONENTIAL_ATMOSPHERE: [(f64, f64, f64); 28] = [
    (0.0, 1.225, 7.249),
    (25.0, 3.899e-2, 6.349),
    (30.0, 1.774e-2, 6.682),
    (40.0, 3.972e-3, 7.554),
    (50.0, 1.057e-3, 8.382),
    (60.0, 3.206e-4, 7.714),
    (70.0, 8.770e-5, 6.549),
    (80.0, 1.905e-5, 5.799),
    (90.0, 3.396e-6, 5.382),
    (100.0, 5.297e-7, 5.877),
    (110.0, 9.661e-8, 7.263),
    (120.0, 2.438e-8, 9.473),
    (130.0, 8.484e-9, 12.636),
    (140.0, 3.845e-9, 16.149),
    (150.0, 2.070e-9, 22.523),
    (180.0, 5.464e-10, 29.740),
    (200.0, 2.789e-10, 37.105),
    (250.0, 7.248e-11, 45.546),
    (300.0, 2.418e-11, 53.628),
    (350.0, 9.518e-12, 53.298),
    (400.0, 3.725e-12, 58.515),
    (450.0, 1.585e-12, 60.828),
    (500.0, 6.967e-13, 63.822),
    (600.0, 1.454e-13, 71.835),
    (700.0, 3.614e-14, 88.667),
    (800.0, 1.170e-14, 124.64),
    (900.0, 5.245e-15, 181.05),
    (1000.0, 3.019e-15, 268.00),
];

/// Earth sidereal rotation rate (rad/s).
const EARTH_ROTATION_RATE: f64 = 7.292_115_146_706_979e-5;

/// Atmospheric drag with an exponential density profile.
///
/// `a = −½ ρ |v_rel| v_rel / B`, with `B = m / (C_D A)` the ballistic
/// coefficient (kg/m²), `ρ` in kg/m³ and `v_rel = v − ω × r` the velocity
/// relative to an atmosphere co-rotating about `+z`. The state is in km and
/// km/s; the acceleration is returned in km/s².
///
/// No density is applied below the surface or above `max_altitude`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialDrag {
    pub body_radius: f64,
    pub ballistic_coefficient: f64,
    pub rotation_rate: f64,
    pub max_altitude: f64,
}

impl ExponentialDrag {
    /// Earth atmosphere, co-rotating, for a spacecraft of ballistic coefficient `bc` (kg/m²).
    pub fn earth(ballistic_coefficient: f64) -> Self {
        ExponentialDrag {
            body_radius: EARTH_EQUATORIAL_RADIUS,
            ballistic_coefficient,
            rotation_rate: EARTH_ROTATION_RATE,
            max_altitude: 1000.0,
        }
    }

    /// Density (kg/m³) at `altitude` km.
    pub fn density(&self, altitude: f64) -> f64 {
        if altitude < 0.0 || altitude >= self.max_altitude {
            return 0.0;
        }
        let (h0, rho0, scale_height) = EXPONENTIAL_ATMOSPHERE
            .iter()
            .take_while(|(h, _, _)| *h <= altitude)
            .last()
            .copied()
            .unwrap_or(EXPONENTIAL_ATMOSPHERE[0]);
        rho0 * (-(altitude - h0) / scale_height).exp()
    }
}

impl ForceModel for ExponentialDrag {
    fn acceleration(&self, state: &CartesianState, _epoch: Epoch) -> Vector3<f64> {
        let r = &state.position;
        let rho = self.density(r.norm() - self.body_radius);
        if rho == 0.0 {
            return Vector3::zeros();
        }

        let omega = Vector3::new(0.0, 0.0, self.rotation_rate);
        let v_rel = state.velocity - omega.cross(r);
        let v_rel_mag = v_rel.norm();

        // ρ v² / B is in m/s² with v in m/s, hence the factor 1000 for km/s²
        -0.5 * rho * 1000.0 * v_rel_mag * v_rel / self.ballistic_coefficient
    }
}

// -------------------------------------------------------------------------------------------------
// Third body
// -------------------------------------------------------------------------------------------------

/// Point-mass third-body perturbation.
///
/// With `s` the third body's position relative to the central attractor:
/// `a = μ₃ · ((s − r)/|s − r|³ − s/|s|³)`.
#[derive(Debug, Clone)]
pub struct ThirdBody<E: EphemerisProvider> {
    pub mu: f64,
    pub ephemeris: E,
}

impl<E: EphemerisProvider> ThirdBody<E> {
    pub fn new(mu: f64, ephemeris: E) -> Self {
        ThirdBody { mu, ephemeris }
    }
}

impl<E: EphemerisProvider> ForceModel for ThirdBody<E> {
    fn acceleration(&self, state: &CartesianState, epoch: Epoch) -> Vector3<f64> {
        let s = self.ephemeris.position(epoch);
        let d = s - state.position;
        self.mu * (d / d.norm().powi(3) - s / s.norm().powi(3))
    }
}

// -------------------------------------------------------------------------------------------------
// Low thrust
// -------------------------------------------------------------------------------------------------

/// Edelbaum guidance for a combined change of semi-major axis and inclination.
///
/// Optimal constant-acceleration transfer between two circular orbits
/// `(a₀, i₀) → (a_f, i_f)` (Edelbaum 1961, in Kéchichian's 1997 form).
/// The thrust lies in the plane spanned by the velocity and the orbit normal,
/// at a yaw angle `β(t)` out of the orbital plane:
///
/// ```text
/// tan β₀   = sin(π/2·|Δi|) / (V₀/V_f − cos(π/2·|Δi|))
/// tan β(t) = V₀ sin β₀ / (V₀ cos β₀ − f·t)
/// Δv       = V₀ cos β₀ − V₀ sin β₀ / tan(π/2·|Δi| + β₀)
/// ```
///
/// The out-of-plane component flips sign each half orbit, towards the
/// requested inclination change, and vanishes when the inclination is kept.
/// A coplanar descent has `β = π`, thrusting against the velocity. The thrust is on from `start` for
/// `Δv / f` seconds and off outside that window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdelbaumThrust {
    thrust_acceleration: f64,
    initial_velocity: f64,
    initial_yaw: f64,
    inclination_change: f64,
    delta_v: f64,
    start: Epoch,
}

impl EdelbaumThrust {
    /// Build the guidance law for one transfer.
    ///
    /// Arguments
    /// ---------
    /// * `mu` – gravitational parameter.
    /// * `initial_sma`, `final_sma` – radii of the circular orbits.
    /// * `initial_inclination`, `final_inclination` – in radians.
    /// * `thrust_acceleration` – constant acceleration magnitude, in km/s² for km-based states.
    /// * `start` – epoch at which the thrust is switched on.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if `mu`, either radius or the
    ///   acceleration is not finite and positive, or an inclination is not finite.
    pub fn new(
        mu: f64,
        initial_sma: f64,
        final_sma: f64,
        initial_inclination: f64,
        final_inclination: f64,
        thrust_acceleration: f64,
        start: Epoch,
    ) -> Result<Self, OrbitError> {
        if !(thrust_acceleration.is_finite() && thrust_acceleration > 0.0) {
            return Err(OrbitError::InvalidArgument(format!(
                "thrust acceleration must be > 0, got {thrust_acceleration}"
            )));
        }
        if !(initial_inclination.is_finite() && final_inclination.is_finite()) {
            return Err(OrbitError::InvalidArgument(format!(
                "inclinations must be finite, got {initial_inclination} and {final_inclination}"
            )));
        }
        let v0 = circular_velocity(mu, initial_sma)?;
        let vf = circular_velocity(mu, final_sma)?;

        let inclination_change = final_inclination - initial_inclination;
        let half_turn = FRAC_PI_2 * inclination_change.abs();
        let initial_yaw = half_turn.sin().atan2(v0 / vf - half_turn.cos());
        let delta_v = if inclination_change == 0.0 {
            (vf - v0).abs()
        } else {
            v0 * initial_yaw.cos() - v0 * initial_yaw.sin() / (half_turn + initial_yaw).tan()
        };

        Ok(EdelbaumThrust {
            thrust_acceleration,
            initial_velocity: v0,
            initial_yaw,
            inclination_change,
            delta_v,
            start,
        })
    }

    /// Total velocity increment of the transfer.
    pub fn delta_v(&self) -> f64 {
        self.delta_v
    }

    /// Thrusting time `Δv / f`, in seconds.
    pub fn transfer_time(&self) -> f64 {
        self.delta_v / self.thrust_acceleration
    }

    pub fn start(&self) -> Epoch {
        self.start
    }

    /// Unsigned yaw angle `β` after `elapsed` seconds of thrust.
    pub fn yaw(&self, elapsed: f64) -> f64 {
        let v0 = self.initial_velocity;
        (v0 * self.initial_yaw.sin())
            .atan2(v0 * self.initial_yaw.cos() - self.thrust_acceleration * elapsed)
    }
}

impl ForceModel for EdelbaumThrust {
    fn acceleration(&self, state: &CartesianState, epoch: Epoch) -> Vector3<f64> {
        let elapsed = (epoch - self.start).to_seconds();
        if !(0.0..=self.transfer_time()).contains(&elapsed) {
            return Vector3::zeros();
        }

        let r = &state.position;
        let h = r.cross(&state.velocity);
        let h_norm = h.norm();
        let v_norm = state.velocity.norm();
        if h_norm == 0.0 || v_norm == 0.0 {
            return Vector3::zeros();
        }

        // cos of the argument of latitude, up to a positive factor; x axis when equatorial
        let node = Vector3::z().cross(&h);
        let along_node = if node.norm() > SINGULARITY_TOLERANCE * h_norm {
            r.dot(&node)
        } else {
            r.x
        };
        let side = along_node * self.inclination_change;
        let out_of_plane = if side == 0.0 { 0.0 } else { side.signum() };
        let yaw = self.yaw(elapsed);

        self.thrust_acceleration
            * (yaw.cos() * state.velocity / v_norm + out_of_plane * yaw.sin() * h / h_norm)
    }
}
