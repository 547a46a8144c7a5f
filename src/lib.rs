//! # orbitkit
//!
//! Orbital state representation, two-body and perturbed propagation, and the
//! Lambert boundary-value problem.
//!
//! * [`orbit_type`] – Cartesian, classical, equinoctial and modified
//!   equinoctial representations with lossless conversions.
//! * [`kepler`] – Kepler's equation for every conic regime and the
//!   universal-variable formulation.
//! * [`orbit_state`] – [`orbit_state::OrbitState`], a representation tagged
//!   with `μ`, epoch and frame.
//! * [`propagation`] – analytic two-body propagation and Cowell integration
//!   with pluggable [`propagation::force_model::ForceModel`]s.
//! * [`lambert`] – universal-variable Lambert solver, multi-revolution.
//!
//! Every fallible operation returns [`orbit_errors::OrbitError`].
//!
//! ```rust
//! use hifitime::Epoch;
//! use nalgebra::Vector3;
//! use orbitkit::orbit_state::{Frame, OrbitState};
//!
//! let state = OrbitState::from_vectors(
//!     398_600.0,
//!     Epoch::from_gregorian_utc_at_midnight(2025, 1, 1),
//!     Frame::new("GCRF"),
//!     Vector3::new(7000.0, 0.0, 0.0),
//!     Vector3::new(0.0, 7.546, 0.0),
//! )?;
//! let later = state.propagate(1200.0)?;
//! assert!(later.eccentricity()? < 1e-3);
//! # Ok::<(), orbitkit::orbit_errors::OrbitError>(())
//! ```

pub mod anomaly;
pub mod constants;
pub mod kepler;
pub mod lambert;
pub mod orbit_errors;
pub mod orbit_state;
pub mod orbit_type;
pub mod propagation;
pub mod ref_system;
