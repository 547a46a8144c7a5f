//! # Orbit state
//!
//! An [`OrbitState`] bundles everything needed to interpret a set of orbital
//! quantities:
//!
//! - the gravitational parameter `μ` of the attractor (must be `> 0`),
//! - the epoch at which the state is osculating ([`hifitime::Epoch`]),
//! - an opaque reference [`Frame`] token,
//! - exactly one active [`Representation`].
//!
//! States are immutable values. Every conversion and propagation returns a new
//! owned state; the epoch, frame and `μ` travel with it.
//!
//! ## Example
//!
//! ```rust, no_run
//! use hifitime::Epoch;
//! use nalgebra::Vector3;
//! use orbitkit::orbit_state::{Frame, OrbitState};
//!
//! let epoch = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
//! let state = OrbitState::from_vectors(
//!     398_600.4418,
//!     epoch,
//!     Frame::new("GCRF"),
//!     Vector3::new(7000.0, 0.0, 0.0),
//!     Vector3::new(0.0, 7.546, 0.0),
//! )?;
//!
//! let coe = state.to_classical()?;
//! println!("{coe}");
//! # Ok::<(), orbitkit::orbit_errors::OrbitError>(())
//! ```

use std::{fmt, sync::Arc};

use hifitime::Epoch;
use nalgebra::Vector3;

use crate::{
    constants::DPI,
    kepler::{KeplerParams, OrbitRegime},
    orbit_errors::OrbitError,
    orbit_type::{
        cartesian::CartesianState,
        classical_element::{ClassicalElements, SemiMajorAxis},
        equinoctial_element::EquinoctialElements,
        modified_equinoctial_element::ModifiedEquinoctialElements,
        Representation, RetrogradeFactor,
    },
    propagation::{analytic, KeplerMethod},
};

/// Opaque reference-frame token.
///
/// The crate never interprets the frame; it is carried along and compared for
/// equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame(Arc<str>);

impl Frame {
    pub fn new(name: &str) -> Self {
        Frame(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Circular orbit speed `√(μ/r)` at radius `r`.
///
/// Errors
/// ------
/// * [`OrbitError::InvalidArgument`] if `mu ≤ 0` or `radius ≤ 0`.
pub fn circular_velocity(mu: f64, radius: f64) -> Result<f64, OrbitError> {
    if !(mu.is_finite() && mu > 0.0) {
        return Err(OrbitError::InvalidArgument(format!(
            "gravitational parameter must be > 0, got {mu}"
        )));
    }
    if !(radius.is_finite() && radius > 0.0) {
        return Err(OrbitError::InvalidArgument(format!(
            "radius must be > 0, got {radius}"
        )));
    }
    Ok((mu / radius).sqrt())
}

/// An osculating orbit at an epoch, in one of four representations.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitState {
    mu: f64,
    epoch: Epoch,
    frame: Frame,
    repr: Representation,
}

impl OrbitState {
    /// Build a validated state from any representation.
    ///
    /// Arguments
    /// ---------
    /// * `mu`: gravitational parameter of the attractor.
    /// * `epoch`: osculating epoch.
    /// * `frame`: reference frame token.
    /// * `repr`: active representation, anything convertible into [`Representation`].
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if `mu ≤ 0` or the vectors are invalid.
    /// * [`OrbitError::InvalidElements`] if the elements are inconsistent.
    pub fn new(
        mu: f64,
        epoch: Epoch,
        frame: Frame,
        repr: impl Into<Representation>,
    ) -> Result<Self, OrbitError> {
        if !(mu.is_finite() && mu > 0.0) {
            return Err(OrbitError::InvalidArgument(format!(
                "gravitational parameter must be > 0, got {mu}"
            )));
        }
        let repr = repr.into();
        repr.validate()?;
        Ok(OrbitState {
            mu,
            epoch,
            frame,
            repr,
        })
    }

    /// Build from position and velocity vectors.
    pub fn from_vectors(
        mu: f64,
        epoch: Epoch,
        frame: Frame,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
    ) -> Result<Self, OrbitError> {
        Self::new(mu, epoch, frame, CartesianState::new(position, velocity))
    }

    /// Build from classical elements.
    pub fn from_classical(
        mu: f64,
        epoch: Epoch,
        frame: Frame,
        elements: ClassicalElements,
    ) -> Result<Self, OrbitError> {
        Self::new(mu, epoch, frame, elements)
    }

    /// Build from equinoctial elements.
    pub fn from_equinoctial(
        mu: f64,
        epoch: Epoch,
        frame: Frame,
        elements: EquinoctialElements,
    ) -> Result<Self, OrbitError> {
        Self::new(mu, epoch, frame, elements)
    }

    /// Build from modified equinoctial elements.
    pub fn from_modified_equinoctial(
        mu: f64,
        epoch: Epoch,
        frame: Frame,
        elements: ModifiedEquinoctialElements,
    ) -> Result<Self, OrbitError> {
        Self::new(mu, epoch, frame, elements)
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn representation(&self) -> &Representation {
        &self.repr
    }

    fn with_repr(&self, repr: Representation) -> Self {
        OrbitState {
            mu: self.mu,
            epoch: self.epoch,
            frame: self.frame.clone(),
            repr,
        }
    }

    /// Same orbit expressed as Cartesian vectors.
    pub fn to_cartesian(&self) -> Result<Self, OrbitError> {
        self.to_cartesian_with(&KeplerParams::default())
    }

    /// Same as [`Self::to_cartesian`] with explicit Kepler solver settings.
    pub fn to_cartesian_with(&self, params: &KeplerParams) -> Result<Self, OrbitError> {
        let cart = self.repr.to_cartesian(self.mu, params)?;
        Ok(self.with_repr(cart.into()))
    }

    /// Same orbit expressed as classical elements.
    pub fn to_classical(&self) -> Result<Self, OrbitError> {
        self.to_classical_with(&KeplerParams::default())
    }

    pub fn to_classical_with(&self, params: &KeplerParams) -> Result<Self, OrbitError> {
        let coe = self.repr.to_classical(self.mu, params)?;
        Ok(self.with_repr(coe.into()))
    }

    /// Same orbit expressed as equinoctial elements.
    ///
    /// Arguments
    /// ---------
    /// * `retrograde`: retrograde factor, auto-detected from the inclination when `None`.
    pub fn to_equinoctial(&self, retrograde: Option<RetrogradeFactor>) -> Result<Self, OrbitError> {
        self.to_equinoctial_with(retrograde, &KeplerParams::default())
    }

    pub fn to_equinoctial_with(
        &self,
        retrograde: Option<RetrogradeFactor>,
        params: &KeplerParams,
    ) -> Result<Self, OrbitError> {
        let eq = self.repr.to_equinoctial(self.mu, retrograde, params)?;
        Ok(self.with_repr(eq.into()))
    }

    /// Same orbit expressed as modified equinoctial elements.
    pub fn to_modified_equinoctial(
        &self,
        retrograde: Option<RetrogradeFactor>,
    ) -> Result<Self, OrbitError> {
        self.to_modified_equinoctial_with(retrograde, &KeplerParams::default())
    }

    pub fn to_modified_equinoctial_with(
        &self,
        retrograde: Option<RetrogradeFactor>,
        params: &KeplerParams,
    ) -> Result<Self, OrbitError> {
        let mee = self.repr.to_modified_equinoctial(self.mu, retrograde, params)?;
        Ok(self.with_repr(mee.into()))
    }

    /// Cartesian vectors of the state, whatever the active representation.
    pub fn cartesian(&self) -> Result<CartesianState, OrbitError> {
        self.repr.to_cartesian(self.mu, &KeplerParams::default())
    }

    /// Position and velocity as a tuple.
    pub fn rv(&self) -> Result<(Vector3<f64>, Vector3<f64>), OrbitError> {
        let c = self.cartesian()?;
        Ok((c.position, c.velocity))
    }

    fn classical(&self) -> Result<ClassicalElements, OrbitError> {
        self.repr.to_classical(self.mu, &KeplerParams::default())
    }

    /// Specific orbital energy `v²/2 − μ/r`.
    pub fn specific_energy(&self) -> Result<f64, OrbitError> {
        Ok(self.cartesian()?.specific_energy(self.mu))
    }

    /// Specific angular momentum vector `r × v`.
    pub fn angular_momentum(&self) -> Result<Vector3<f64>, OrbitError> {
        Ok(self.cartesian()?.angular_momentum())
    }

    pub fn eccentricity(&self) -> Result<f64, OrbitError> {
        Ok(self.classical()?.eccentricity)
    }

    /// Semi-major axis, [`SemiMajorAxis::Parabolic`] for a parabola.
    pub fn semi_major_axis(&self) -> Result<SemiMajorAxis, OrbitError> {
        Ok(self.classical()?.semi_major_axis)
    }

    /// Mean motion `n = √(μ/|a|³)`, or `2√(μ/p³)` for a parabola.
    pub fn mean_motion(&self) -> Result<f64, OrbitError> {
        let coe = self.classical()?;
        Ok(match coe.semi_major_axis {
            SemiMajorAxis::Finite(a) => (self.mu / a.abs().powi(3)).sqrt(),
            SemiMajorAxis::Parabolic { .. } => {
                2.0 * (self.mu / coe.semi_latus_rectum().powi(3)).sqrt()
            }
        })
    }

    /// Orbital period `2π/n`.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidElements`] for parabolic and hyperbolic orbits.
    pub fn period(&self) -> Result<f64, OrbitError> {
        let coe = self.classical()?;
        match (coe.regime(), coe.semi_major_axis) {
            (OrbitRegime::Elliptic, SemiMajorAxis::Finite(a)) => {
                Ok(DPI * (a.powi(3) / self.mu).sqrt())
            }
            _ => Err(OrbitError::InvalidElements(format!(
                "period is only defined for elliptic orbits, e = {}",
                coe.eccentricity
            ))),
        }
    }

    /// Two-body propagation by `dt` seconds with the default universal-variable method.
    ///
    /// See also
    /// --------
    /// * [`crate::propagation::analytic::propagate`] – method and tolerance selection.
    pub fn propagate(&self, dt: f64) -> Result<Self, OrbitError> {
        analytic::propagate(
            self,
            dt,
            KeplerMethod::UniversalVariable,
            &KeplerParams::default(),
        )
    }
}

impl fmt::Display for OrbitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Orbit state at {} in {} (mu = {})", self.epoch, self.frame, self.mu)?;
        write!(f, "{}", self.repr)
    }
}
