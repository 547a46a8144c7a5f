//! # Closed-form anomaly conversions
//!
//! Conversions between the true anomaly ν and the regime-specific auxiliary
//! anomalies, and from those to the mean anomaly:
//!
//! | regime     | auxiliary anomaly | mean anomaly            |
//! |------------|-------------------|-------------------------|
//! | elliptic   | E (eccentric)     | `M = E − e·sin E`       |
//! | hyperbolic | F (hyperbolic)    | `M = e·sinh F − F`      |
//! | parabolic  | D = tan(ν/2)      | `M = D + D³/3` (Barker) |
//!
//! None of these functions iterate. The inverse direction (mean → auxiliary)
//! requires solving Kepler's equation and lives in [`crate::kepler`].
//!
//! The elliptic helpers return angles in (−π, π]; callers who track revolutions
//! must add the 2π multiples back themselves.

/// True anomaly → eccentric anomaly (elliptic, `0 ≤ e < 1`).
pub fn true_to_eccentric(nu: f64, ecc: f64) -> f64 {
    2.0 * (((1.0 - ecc) / (1.0 + ecc)).sqrt() * (nu / 2.0).tan()).atan()
}

/// Eccentric anomaly → true anomaly (elliptic, `0 ≤ e < 1`).
pub fn eccentric_to_true(ecc_anomaly: f64, ecc: f64) -> f64 {
    2.0 * (((1.0 + ecc) / (1.0 - ecc)).sqrt() * (ecc_anomaly / 2.0).tan()).atan()
}

/// True anomaly → hyperbolic anomaly (`e > 1`).
///
/// `nu` must lie strictly inside the asymptotes, `|ν| < acos(−1/e)`.
pub fn true_to_hyperbolic(nu: f64, ecc: f64) -> f64 {
    2.0 * (((ecc - 1.0) / (ecc + 1.0)).sqrt() * (nu / 2.0).tan()).atanh()
}

/// Hyperbolic anomaly → true anomaly (`e > 1`).
pub fn hyperbolic_to_true(hyp_anomaly: f64, ecc: f64) -> f64 {
    2.0 * (((ecc + 1.0) / (ecc - 1.0)).sqrt() * (hyp_anomaly / 2.0).tanh()).atan()
}

/// True anomaly → parabolic anomaly `D = tan(ν/2)`.
pub fn true_to_parabolic(nu: f64) -> f64 {
    (nu / 2.0).tan()
}

/// Parabolic anomaly → true anomaly.
pub fn parabolic_to_true(d: f64) -> f64 {
    2.0 * d.atan()
}

/// Kepler's equation for the ellipse, `M = E − e·sin E`.
pub fn eccentric_to_mean(ecc_anomaly: f64, ecc: f64) -> f64 {
    ecc_anomaly - ecc * ecc_anomaly.sin()
}

/// Kepler's equation for the hyperbola, `M = e·sinh F − F`.
pub fn hyperbolic_to_mean(hyp_anomaly: f64, ecc: f64) -> f64 {
    ecc * hyp_anomaly.sinh() - hyp_anomaly
}

/// Barker's equation, `M = D + D³/3`.
pub fn parabolic_to_mean(d: f64) -> f64 {
    d + d.powi(3) / 3.0
}

/// Inverse of Barker's equation, closed form.
///
/// With `B = 3M/2` and `A = (B + √(1 + B²))^(2/3)`, the parabolic anomaly is
/// `D = 2AB / (1 + A + A²)`. This form avoids the cancellation of the
/// usual cube-root difference for small `M`.
pub fn mean_to_parabolic(mean_anomaly: f64) -> f64 {
    let b = 1.5 * mean_anomaly;
    let a = (b.abs() + (1.0 + b * b).sqrt()).powf(2.0 / 3.0);
    b.signum() * 2.0 * a * b.abs() / (1.0 + a + a * a)
}

/// Flight path angle γ, measured from the local horizontal.
///
/// `tan γ = e·sin ν / (1 + e·cos ν)`, valid for every conic.
pub fn flight_path_angle(nu: f64, ecc: f64) -> f64 {
    (ecc * nu.sin()).atan2(1.0 + ecc * nu.cos())
}
