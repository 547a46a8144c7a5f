//! # Orbit propagation
//!
//! Two families of propagators share this module:
//!
//! - [`analytic`] – closed-form two-body propagation, exact up to the Kepler
//!   solver tolerance, for any conic.
//! - [`cowell`] – numerical integration of the perturbed equations of motion
//!   `r̈ = −μ r/|r|³ + Σ aᵢ` with the adaptive [`integrator`] and an ordered
//!   list of [`force_model::ForceModel`] contributors.
//!
//! Both return new owned [`crate::orbit_state::OrbitState`] values and never
//! mutate their input.

use serde::{Deserialize, Serialize};

/// Closed-form two-body propagation.
pub mod analytic;

/// Perturbed (Cowell) propagation and lazy trajectories.
pub mod cowell;

/// Perturbing accelerations.
pub mod force_model;

/// Adaptive Dormand–Prince 5(4) integrator.
pub mod integrator;

/// Method used by the analytic propagator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeplerMethod {
    /// Advance the mean anomaly and solve the regime's Kepler equation.
    MeanAnomaly,
    /// Universal-variable formulation with Lagrange coefficients, regular across `e = 1`.
    #[default]
    UniversalVariable,
}
