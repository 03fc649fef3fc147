//! # Chip WCS composition
//!
//! Project one chip of a multi-chip exposure into the reference tangent plane
//! and derive its new linear WCS.
//!
//! ## Steps
//!
//! 1. **Offset in V2/V3** – distance and direction of the chip's `(V2REF, V3REF)`
//!    from the reference chip's, converted to reference pixels and rotated by the
//!    reference chip's `THETA`:
//!
//!    ```text
//!    off = hypot(ΔV2, ΔV3) / PSCALE_ref
//!    θ   = atan2(p00·ΔV2, p11·ΔV3) + THETA_ref      (θ = THETA_ref when ΔV3 = 0)
//!    dX  = off · sin θ,   dY = off · cos θ
//!    ```
//!
//! 2. **Anchor** – `CRVAL` is the sky position of `(dX, dY)` in the tangent plane,
//!    `CRPIX` the chip's reference pixel.
//!
//! 3. **CD matrix** – the chip's linear distortion terms, scaled to reference pixels
//!    and rotated by `THETA - THETA_ref`, give two unit steps in the tangent plane.
//!    Their sky positions, differenced against `CRVAL`, are the CD columns.
//!
//! 4. **Velocity aberration** – with a factor `VAfac ≠ 1`, `CRVAL` is pushed away
//!    from the reference chip's position and every CD term is scaled by `VAfac`.

use nalgebra::{Matrix2, Vector2};

use crate::{
    angles::wrap_angle_diff,
    constants::{Degree, RADEG},
    distortion::DistortionModel,
    makewcs_errors::MakeWcsError,
    parity::ParityMatrix,
    wcs::{LinearWcs, TangentPlaneWcs},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChipWcsComposer {
    parity: ParityMatrix,
}

impl ChipWcsComposer {
    pub fn new(parity: ParityMatrix) -> Self {
        ChipWcsComposer { parity }
    }

    /// Position of the chip's reference pixel in tangent-plane pixels.
    ///
    /// Arguments
    /// ---------
    /// * `chip`: distortion model of the chip to place
    /// * `reference`: distortion model of the reference chip
    ///
    /// Return
    /// ------
    /// * `(dX, dY)` relative to the tangent-plane origin
    pub fn tangent_plane_offset(
        &self,
        chip: &DistortionModel,
        reference: &DistortionModel,
    ) -> (f64, f64) {
        let dv2 = chip.v2ref - reference.v2ref;
        let dv3 = chip.v3ref - reference.v3ref;
        let off = dv2.hypot(dv3) / reference.pscale;

        let mut theta = if chip.v3ref == reference.v3ref {
            0.0
        } else {
            (self.parity[(0, 0)] * dv2).atan2(self.parity[(1, 1)] * dv3)
        };
        theta += reference.theta_or_zero() * RADEG;

        (off * theta.sin(), off * theta.cos())
    }

    /// New linear WCS of a chip, before velocity aberration.
    pub fn compose_unaberrated(
        &self,
        chip: &DistortionModel,
        reference: &DistortionModel,
        frame: &TangentPlaneWcs,
    ) -> Result<LinearWcs, MakeWcsError> {
        if chip.order < 1 {
            return Err(MakeWcsError::MissingMetadata(
                "distortion model has no linear terms".into(),
            ));
        }

        let (dx, dy) = self.tangent_plane_offset(chip, reference);
        let crval = frame.xy2rd(dx, dy);

        let dtheta = match chip.theta {
            Some(theta) if theta != 0.0 => theta - reference.theta_or_zero(),
            _ => 0.0,
        };

        // linear terms, in reference pixels
        let del_xx = chip.fx[(1, 1)] / reference.pscale;
        let del_yx = chip.fy[(1, 1)] / reference.pscale;
        let del_xy = chip.fx[(1, 0)] / reference.pscale;
        let del_yy = chip.fy[(1, 0)] / reference.pscale;

        let (sin_r, cos_r) = (dtheta * RADEG).sin_cos();
        let d_xx = cos_r * del_xx - sin_r * del_yx;
        let d_yx = sin_r * del_xx + cos_r * del_yx;
        let d_xy = cos_r * del_xy - sin_r * del_yy;
        let d_yy = sin_r * del_xy + cos_r * del_yy;

        let (a, b) = frame.xy2rd(dx + d_xx, dy + d_yx);
        let (c, d) = frame.xy2rd(dx + d_xy, dy + d_yy);

        let cos_dec = (crval.1 * RADEG).cos();
        let cd = Matrix2::new(
            wrap_angle_diff(a, crval.0) * cos_dec,
            wrap_angle_diff(c, crval.0) * cos_dec,
            wrap_angle_diff(b, crval.1),
            wrap_angle_diff(d, crval.1),
        );

        Ok(LinearWcs::new(crval, (chip.xref, chip.yref), cd))
    }

    /// New linear WCS of a chip.
    ///
    /// Arguments
    /// ---------
    /// * `chip`: distortion model of the chip
    /// * `reference`: distortion model of the reference chip
    /// * `frame`: tangent plane built on the reference chip
    /// * `va_factor`: velocity-aberration scale, `1.0` when not applicable
    ///
    /// Return
    /// ------
    /// * the chip's `CRVAL`, `CRPIX` and CD matrix
    pub fn compose(
        &self,
        chip: &DistortionModel,
        reference: &DistortionModel,
        frame: &TangentPlaneWcs,
        va_factor: f64,
    ) -> Result<LinearWcs, MakeWcsError> {
        if !va_factor.is_finite() || va_factor <= 0.0 {
            return Err(MakeWcsError::InvalidKeyword {
                key: "VAFACTOR".into(),
                value: va_factor.to_string(),
            });
        }
        let wcs = self.compose_unaberrated(chip, reference, frame)?;
        Ok(apply_velocity_aberration(&wcs, frame.crval(), va_factor))
    }
}

/// Scale a WCS about an anchor position for velocity aberration.
///
/// `CRVAL` moves to `anchor + VAfac · (CRVAL - anchor)` (seam-safe per axis) and the
/// CD matrix is multiplied by `VAfac`. A factor of exactly `1.0` returns the input.
pub fn apply_velocity_aberration(
    wcs: &LinearWcs,
    anchor: Vector2<Degree>,
    va_factor: f64,
) -> LinearWcs {
    if va_factor == 1.0 {
        return *wcs;
    }
    let crval = Vector2::new(
        anchor.x + va_factor * wrap_angle_diff(wcs.crval.x, anchor.x),
        anchor.y + va_factor * wrap_angle_diff(wcs.crval.y, anchor.y),
    );
    LinearWcs {
        crval,
        crpix: wcs.crpix,
        cd: wcs.cd * va_factor,
    }
}
