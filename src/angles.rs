//! # Angle arithmetic
//!
//! Small numeric helpers used everywhere sky coordinates are differenced or
//! orientations are composed:
//!
//! - [`wrap_angle_diff`](crate::angles::wrap_angle_diff) – seam-safe subtraction of two angles,
//! - [`troll`](crate::angles::troll) – spacecraft roll (`PA_V3`) expressed at an aperture
//!   located at `(V2, V3)` in the focal plane.
//!
//! All public angles are in degrees unless the name says otherwise; V2/V3
//! positions are in arcseconds.

use crate::constants::{ArcSec, Degree, Radian, RADEG, RADSEC};

/// Subtract two angles and bring the result into `(-180, 180]` degrees.
///
/// This keeps differences across the 0/360 seam small: `wrap_angle_diff(359.5, 0.5)`
/// is `-1.0`, not `359.0`.
///
/// Arguments
/// ---------
/// * `a`: minuend, in degrees
/// * `b`: subtrahend, in degrees
///
/// Return
/// ------
/// * `a - b` wrapped into `(-180, 180]`
pub fn wrap_angle_diff(a: Degree, b: Degree) -> Degree {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Compute the roll angle at an aperture from the roll angle of the V1 axis.
///
/// `PA_V3` is the position angle of the V3 axis measured at V1. An aperture
/// sitting at `(v2, v3)` sees a slightly different orientation because the
/// position angle changes across the field on the sphere. The correction
/// depends on the declination of the pointing.
///
/// Arguments
/// ---------
/// * `roll`: position angle of V3 at the V1 axis, in degrees
/// * `dec`: declination of the target, in degrees
/// * `v2`, `v3`: aperture position in the V2/V3 frame, in arcseconds
///
/// Return
/// ------
/// * the roll angle at the aperture, in degrees. An aperture on the V1 axis
///   returns `roll` unchanged.
pub fn troll(roll: Degree, dec: Degree, v2: ArcSec, v3: ArcSec) -> Degree {
    let v2: Radian = v2 * RADSEC;
    let v3: Radian = v3 * RADSEC;

    let (s2, s3) = (v2.sin(), v3.sin());
    let sin_rho = (s2 * s2 + s3 * s3 - s2 * s2 * s3 * s3).sqrt();
    if sin_rho == 0.0 {
        return roll;
    }
    let roll = roll * RADEG;
    let dec = dec * RADEG;
    let rho = sin_rho.min(1.0).asin();

    let mut beta = (s3 / sin_rho).clamp(-1.0, 1.0).asin();
    if v2 < 0.0 {
        beta = std::f64::consts::PI - beta;
    }
    let mut gamma = (s2 / sin_rho).clamp(-1.0, 1.0).asin();
    if v3 < 0.0 {
        gamma = std::f64::consts::PI - gamma;
    }

    let a = std::f64::consts::FRAC_PI_2 + roll - beta;
    let b = (a.sin() * dec.cos()).atan2(dec.sin() * sin_rho - dec.cos() * rho.cos() * a.cos());

    (std::f64::consts::PI - (gamma + b)) / RADEG
}
