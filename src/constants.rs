//! # Constants and type definitions for orbitkit
//!
//! This module centralizes the **physical constants** and **default numerical
//! tolerances** used throughout the crate.
//!
//! ## Units
//!
//! The crate never tags quantities with units. Every routine works in whatever
//! consistent system the caller picks. The constants below are given in
//! **km**, **km/s**, **km³/s²** and **seconds**, which is the convention used in
//! the tests and benches.

// -------------------------------------------------------------------------------------------------
// Angles
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

// -------------------------------------------------------------------------------------------------
// Gravitational parameters and body constants
// -------------------------------------------------------------------------------------------------

/// Earth gravitational parameter μ (km³/s²)
pub const MU_EARTH: f64 = 398_600.441_8;

/// Sun gravitational parameter μ (km³/s²)
pub const MU_SUN: f64 = 1.327_124_400_18e11;

/// Moon gravitational parameter μ (km³/s²)
pub const MU_MOON: f64 = 4_902.800_066;

/// Earth equatorial radius (km, WGS84)
pub const EARTH_EQUATORIAL_RADIUS: f64 = 6_378.137;

/// Earth second zonal harmonic J2 (unitless)
pub const J2_EARTH: f64 = 1.082_626_68e-3;

// -------------------------------------------------------------------------------------------------
// Numerical thresholds
// -------------------------------------------------------------------------------------------------

/// Eccentricity band around 1 inside which an orbit is treated as parabolic
pub const PARABOLIC_TOLERANCE: f64 = 1e-9;

/// Threshold below which eccentricity or sin(i) are considered zero
/// (circular / equatorial singularities)
pub const SINGULARITY_TOLERANCE: f64 = 1e-11;

/// Slack allowed on cosine arguments before inverse-trig calls
pub const TRIG_DOMAIN_SLACK: f64 = 1e-10;
