//! # Cowell propagation
//!
//! Direct integration of the perturbed equations of motion
//!
//! ```text
//! r̈ = −μ r/|r|³ + Σ aᵢ(state, epoch)
//! ```
//!
//! with the adaptive [`DormandPrince`] integrator. The perturbing
//! accelerations `aᵢ` come from an ordered list of [`ForceModel`]s; an empty
//! list is the pure two-body problem.
//!
//! ## Outputs
//!
//! * [`CowellPropagator::propagate_to`] – a single target epoch.
//! * [`CowellPropagator::ephemeris`] – a batch of epochs, collected eagerly.
//! * [`CowellPropagator::trajectory`] – a lazy [`Trajectory`] iterator that
//!   integrates only as far as the caller pulls, and reads intermediate
//!   epochs from the dense output of the steps already taken.
//!
//! ## Failure modes
//!
//! The propagation stops with [`OrbitError::Propagation`] as soon as the
//! radius drops below [`CowellParams::collision_radius`], the state stops
//! being finite, the step size falls under [`CowellParams::min_step`], or the
//! step budget is exhausted.

use hifitime::{Duration, Epoch};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    kepler::KeplerParams,
    orbit_errors::OrbitError,
    orbit_state::OrbitState,
    orbit_type::cartesian::CartesianState,
    propagation::{
        force_model::ForceModel,
        integrator::{DenseStep, DormandPrince, State6},
    },
};

/// Integration settings of the Cowell propagator.
///
/// Fields
/// ------
/// * `rtol`, `atol` – relative and absolute local error tolerances.
/// * `initial_step` – first step size in seconds, automatic when `None`.
/// * `min_step`, `max_step` – bounds on the step size magnitude (s).
/// * `max_steps` – budget of attempted steps per integration.
/// * `collision_radius` – radius under which the state is considered to have
///   hit the attractor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CowellParams {
    pub rtol: f64,
    pub atol: f64,
    pub initial_step: Option<f64>,
    pub min_step: f64,
    pub max_step: f64,
    pub max_steps: usize,
    pub collision_radius: f64,
}

impl Default for CowellParams {
    fn default() -> Self {
        CowellParams {
            rtol: 1e-10,
            atol: 1e-9,
            initial_step: None,
            min_step: 1e-8,
            max_step: 3600.0,
            max_steps: 500_000,
            collision_radius: 1e-3,
        }
    }
}

impl CowellParams {
    pub fn builder() -> CowellParamsBuilder {
        CowellParamsBuilder::new()
    }
}

/// Builder for [`CowellParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct CowellParamsBuilder {
    params: CowellParams,
}

impl CowellParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: CowellParams::default(),
        }
    }

    pub fn rtol(mut self, v: f64) -> Self {
        self.params.rtol = v;
        self
    }
    pub fn atol(mut self, v: f64) -> Self {
        self.params.atol = v;
        self
    }
    pub fn initial_step(mut self, v: f64) -> Self {
        self.params.initial_step = Some(v);
        self
    }
    pub fn min_step(mut self, v: f64) -> Self {
        self.params.min_step = v;
        self
    }
    pub fn max_step(mut self, v: f64) -> Self {
        self.params.max_step = v;
        self
    }
    pub fn max_steps(mut self, v: usize) -> Self {
        self.params.max_steps = v;
        self
    }
    pub fn collision_radius(mut self, v: f64) -> Self {
        self.params.collision_radius = v;
        self
    }

    /// Validate and return the parameters.
    ///
    /// Validation rules
    /// ----------------
    /// * `rtol ≥ 0`, `atol ≥ 0`, not both zero.
    /// * `0 < min_step ≤ max_step`.
    /// * `initial_step > 0` when given.
    /// * `max_steps ≥ 1`.
    /// * `collision_radius ≥ 0`.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] naming the first violated rule.
    pub fn build(self) -> Result<CowellParams, OrbitError> {
        let p = self.params;
        let non_negative = |x: f64| x.is_finite() && x >= 0.0;

        if !(non_negative(p.rtol) && non_negative(p.atol)) || (p.rtol == 0.0 && p.atol == 0.0) {
            return Err(OrbitError::InvalidArgument(
                "rtol and atol must be >= 0 and not both zero".into(),
            ));
        }
        if !(p.min_step > 0.0 && p.min_step <= p.max_step) {
            return Err(OrbitError::InvalidArgument(
                "step bounds must satisfy 0 < min_step <= max_step".into(),
            ));
        }
        if let Some(h) = p.initial_step {
            if !(h.is_finite() && h > 0.0) {
                return Err(OrbitError::InvalidArgument(
                    "initial_step must be finite and > 0".into(),
                ));
            }
        }
        if p.max_steps == 0 {
            return Err(OrbitError::InvalidArgument("max_steps must be >= 1".into()));
        }
        if !non_negative(p.collision_radius) {
            return Err(OrbitError::InvalidArgument(
                "collision_radius must be >= 0".into(),
            ));
        }
        Ok(p)
    }
}

/// Perturbed two-body propagator.
pub struct CowellPropagator {
    force_models: Vec<Box<dyn ForceModel>>,
    params: CowellParams,
}

impl Default for CowellPropagator {
    fn default() -> Self {
        Self::new(CowellParams::default())
    }
}

impl CowellPropagator {
    /// Propagator without any perturbation.
    pub fn new(params: CowellParams) -> Self {
        CowellPropagator {
            force_models: Vec::new(),
            params,
        }
    }

    /// Append a contributor; contributors are summed in insertion order.
    pub fn with_force_model(mut self, model: impl ForceModel + 'static) -> Self {
        self.force_models.push(Box::new(model));
        self
    }

    pub fn params(&self) -> &CowellParams {
        &self.params
    }

    pub fn force_model_count(&self) -> usize {
        self.force_models.len()
    }

    /// Right-hand side `ẏ = [v, a]` at `t` seconds after `start`.
    fn derivatives(
        &self,
        mu: f64,
        start: Epoch,
        t: f64,
        y: &State6,
    ) -> Result<State6, OrbitError> {
        let state = CartesianState::from_vector6(y);
        let r = &state.position;
        let r_norm = r.norm();

        if !r_norm.is_finite() || !state.velocity.iter().all(|v| v.is_finite()) {
            return Err(OrbitError::Propagation(format!(
                "non-finite state at t = {t} s"
            )));
        }
        if r_norm <= self.params.collision_radius {
            return Err(OrbitError::Propagation(format!(
                "radius {r_norm} below collision radius {} at t = {t} s",
                self.params.collision_radius
            )));
        }

        let epoch = start + Duration::from_seconds(t);
        let mut acc: Vector3<f64> = -mu / r_norm.powi(3) * r;
        for model in &self.force_models {
            acc += model.acceleration(&state, epoch);
        }

        Ok(State6::new(
            state.velocity.x,
            state.velocity.y,
            state.velocity.z,
            acc.x,
            acc.y,
            acc.z,
        ))
    }

    /// Integrate from `state` to `epoch`.
    ///
    /// Return
    /// ------
    /// * A Cartesian [`OrbitState`] at `epoch`, same frame and `μ`.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::Propagation`] on collision, non-finite state, step
    ///   size underflow or exhausted step budget.
    /// * Conversion errors of the initial representation.
    pub fn propagate_to(&self, state: &OrbitState, epoch: Epoch) -> Result<OrbitState, OrbitError> {
        let mu = state.mu();
        let start = state.epoch();
        let y0 = state
            .representation()
            .to_cartesian(mu, &KeplerParams::default())?
            .to_vector6();
        let t_end = (epoch - start).to_seconds();
        if t_end == 0.0 {
            return OrbitState::new(mu, start, state.frame().clone(), CartesianState::from_vector6(&y0));
        }

        let rhs = |t: f64, y: &State6| self.derivatives(mu, start, t, y);
        let mut integrator = DormandPrince::new(&rhs, 0.0, y0, t_end, &self.params)?;
        while integrator.time() != t_end {
            integrator.step(&rhs, t_end, &self.params)?;
        }

        let (accepted, rejected) = integrator.step_counts();
        debug!(t_end, accepted, rejected, "Cowell propagation done");

        OrbitState::new(
            mu,
            epoch,
            state.frame().clone(),
            CartesianState::from_vector6(integrator.state()),
        )
    }

    /// States at every epoch of `epochs`, in one integration pass.
    ///
    /// Errors
    /// ------
    /// * [`OrbitError::InvalidArgument`] if the epochs are not monotonic in
    ///   the integration direction.
    /// * Any error of [`Self::propagate_to`].
    pub fn ephemeris(
        &self,
        state: &OrbitState,
        epochs: &[Epoch],
    ) -> Result<Vec<OrbitState>, OrbitError> {
        self.trajectory(state, epochs.iter().copied())?.collect()
    }

    /// Lazy trajectory sampled at `epochs`.
    ///
    /// Nothing is integrated until the first item is pulled. The integration
    /// direction is set by the first epoch different from the initial one.
    ///
    /// Errors
    /// ------
    /// * Conversion errors of the initial representation.
    pub fn trajectory<I>(
        &self,
        state: &OrbitState,
        epochs: I,
    ) -> Result<Trajectory<'_, I::IntoIter>, OrbitError>
    where
        I: IntoIterator<Item = Epoch>,
    {
        let mu = state.mu();
        let y0 = state
            .representation()
            .to_cartesian(mu, &KeplerParams::default())?
            .to_vector6();
        Ok(Trajectory {
            propagator: self,
            initial: state.clone(),
            y0,
            epochs: epochs.into_iter(),
            integrator: None,
            last_step: None,
            last_t: 0.0,
            finished: false,
        })
    }
}

/// Lazy, resumable sampled trajectory of a [`CowellPropagator`].
///
/// Yields one `Result<OrbitState, OrbitError>` per requested epoch. After an
/// error the sequence ends. Cloning a trajectory snapshots the integrator:
/// both copies continue independently from the same point.
#[derive(Clone)]
pub struct Trajectory<'a, I> {
    propagator: &'a CowellPropagator,
    initial: OrbitState,
    y0: State6,
    epochs: I,
    integrator: Option<DormandPrince>,
    last_step: Option<DenseStep>,
    last_t: f64,
    finished: bool,
}

impl<I> Trajectory<'_, I> {
    fn output(&self, epoch: Epoch, y: &State6) -> Result<OrbitState, OrbitError> {
        OrbitState::new(
            self.initial.mu(),
            epoch,
            self.initial.frame().clone(),
            CartesianState::from_vector6(y),
        )
    }

    fn sample(&mut self, t: f64) -> Result<State6, OrbitError> {
        let direction = match &self.integrator {
            Some(integrator) => integrator.direction(),
            None if t == 0.0 => return Ok(self.y0),
            None => t.signum(),
        };

        if (t - self.last_t) * direction < 0.0 {
            return Err(OrbitError::InvalidArgument(format!(
                "epochs must be monotonic in the integration direction ({} s requested after {} s)",
                t, self.last_t
            )));
        }

        let propagator = self.propagator;
        let mu = self.initial.mu();
        let start = self.initial.epoch();
        let rhs = |tau: f64, y: &State6| propagator.derivatives(mu, start, tau, y);
        let params = &propagator.params;

        if self.integrator.is_none() {
            self.integrator = Some(DormandPrince::new(&rhs, 0.0, self.y0, direction, params)?);
        }

        if t == 0.0 {
            return Ok(self.y0);
        }

        loop {
            if let Some(step) = &self.last_step {
                if step.contains(t) {
                    return Ok(step.interpolate(t));
                }
            }
            let Some(integrator) = self.integrator.as_mut() else {
                return Err(OrbitError::Propagation("integrator not started".into()));
            };
            let step = integrator.step(&rhs, direction * f64::INFINITY, params)?;
            self.last_step = Some(step);
        }
    }
}

impl<I> Iterator for Trajectory<'_, I>
where
    I: Iterator<Item = Epoch>,
{
    type Item = Result<OrbitState, OrbitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let epoch = self.epochs.next()?;
        let t = (epoch - self.initial.epoch()).to_seconds();

        let result = self.sample(t).and_then(|y| self.output(epoch, &y));
        match result {
            Ok(_) => self.last_t = t,
            Err(_) => self.finished = true,
        }
        Some(result)
    }
}
