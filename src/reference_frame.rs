//! # Reference tangent plane
//!
//! Every chip of an exposure is projected onto one tangent plane defined by
//! the reference chip. Its orientation comes from the spacecraft roll
//! (`PA_V3`), corrected to the reference chip's focal-plane position with
//! [`troll`], plus the chip's own rotation `THETA`. Its scale is the
//! reference chip's `PSCALE` and its anchor is the sky position of the
//! reference pixel `(XREF, YREF)` under the chip's current WCS.
//!
//! ```text
//! pv    = troll(PA_V3, δ, V2REF, V3REF) + THETA
//! scale = PSCALE / 3600
//! CD    = scale · [[ p00·cos pv, -p00·sin pv ],
//!                  [ p11·sin pv,  p11·cos pv ]]
//! ```

use nalgebra::Matrix2;

use crate::{
    angles::troll,
    constants::{Degree, ARCSEC_PER_DEG, RADEG},
    distortion::DistortionModel,
    makewcs_errors::MakeWcsError,
    parity::ParityMatrix,
    wcs::{LinearWcs, TangentPlaneWcs},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrameBuilder {
    parity: ParityMatrix,
}

impl ReferenceFrameBuilder {
    pub fn new(parity: ParityMatrix) -> Self {
        ReferenceFrameBuilder { parity }
    }

    /// Orientation of the reference chip on the sky, in degrees.
    ///
    /// Arguments
    /// ---------
    /// * `pa_v3`: spacecraft roll, in degrees
    /// * `dec`: declination of the reference chip, in degrees
    /// * `model`: distortion model of the reference chip
    pub fn orientation(&self, pa_v3: Degree, dec: Degree, model: &DistortionModel) -> Degree {
        troll(pa_v3, dec, model.v2ref, model.v3ref) + model.theta_or_zero()
    }

    /// CD matrix of a frame with orientation `pv` (degrees) and scale `pscale` (arcsec/pixel).
    pub fn cd_matrix(&self, pv: Degree, pscale: f64) -> Matrix2<f64> {
        let scale = pscale / ARCSEC_PER_DEG;
        let (sin_pv, cos_pv) = (pv * RADEG).sin_cos();
        let p00 = self.parity[(0, 0)];
        let p11 = self.parity[(1, 1)];
        Matrix2::new(
            p00 * cos_pv * scale,
            p00 * -sin_pv * scale,
            p11 * sin_pv * scale,
            p11 * cos_pv * scale,
        )
    }

    /// Build the tangent plane of an exposure.
    ///
    /// Arguments
    /// ---------
    /// * `pa_v3`: spacecraft roll (`PA_V3`), in degrees
    /// * `reference_wcs`: current WCS of the reference chip; its `CRVAL2` is the
    ///   declination used by the roll correction
    /// * `model`: distortion model of the reference chip
    ///
    /// Return
    /// ------
    /// * the tangent plane, or [`MakeWcsError::InvalidKeyword`] when the roll or
    ///   the reference WCS is not finite
    pub fn build(
        &self,
        pa_v3: Degree,
        reference_wcs: &LinearWcs,
        model: &DistortionModel,
    ) -> Result<TangentPlaneWcs, MakeWcsError> {
        if !pa_v3.is_finite() {
            return Err(MakeWcsError::InvalidKeyword {
                key: "PA_V3".into(),
                value: pa_v3.to_string(),
            });
        }
        if reference_wcs.crval.iter().any(|v| !v.is_finite()) {
            return Err(MakeWcsError::InvalidKeyword {
                key: "CRVAL".into(),
                value: format!("{:?}", reference_wcs.crval),
            });
        }

        let dec = reference_wcs.crval.y;
        let pv = self.orientation(pa_v3, dec, model);
        let crval = reference_wcs.xy2rd(model.xref, model.yref);

        Ok(TangentPlaneWcs::new(crval, self.cd_matrix(pv, model.pscale)))
    }
}

#[cfg(test)]
mod reference_frame_test {
    use super::*;
    use crate::parity::{flip_y_parity, identity_parity};
    use approx::assert_relative_eq;

    #[test]
    fn test_unrotated_frame_is_diagonal() {
        let model = DistortionModel::linear(0.05, (512.0, 512.0), (0.0, 0.0)).unwrap();
        let current = LinearWcs::new((30.0, 0.0), (512.0, 512.0), Matrix2::identity() * 1e-5);
        let frame = ReferenceFrameBuilder::new(identity_parity())
            .build(0.0, &current, &model)
            .unwrap();

        let scale = 0.05 / 3600.0;
        assert_eq!(*frame.cd(), Matrix2::new(scale, 0.0, 0.0, scale));
        assert_relative_eq!(frame.crval().x, 30.0, epsilon = 1e-12);
        assert_eq!(frame.as_linear().crpix.x, 0.0);
    }

    #[test]
    fn test_parity_flips_rows() {
        let builder = ReferenceFrameBuilder::new(flip_y_parity());
        let cd = builder.cd_matrix(90.0, 3600.0);
        assert_relative_eq!(cd[(0, 0)], 0.0, epsilon = 1e-15);
        assert_relative_eq!(cd[(0, 1)], -1.0, epsilon = 1e-15);
        assert_relative_eq!(cd[(1, 0)], -1.0, epsilon = 1e-15);
        assert_relative_eq!(cd[(1, 1)], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_theta_adds_to_orientation() {
        let mut model = DistortionModel::linear(0.1, (0.0, 0.0), (0.0, 0.0)).unwrap();
        model.theta = Some(12.5);
        let builder = ReferenceFrameBuilder::new(identity_parity());
        assert_eq!(builder.orientation(100.0, 45.0, &model), 112.5);
    }

    #[test]
    fn test_crval_follows_reference_pixel() {
        let model = DistortionModel::linear(0.05, (600.0, 400.0), (0.0, 0.0)).unwrap();
        let current = LinearWcs::new(
            (10.0, 20.0),
            (500.0, 500.0),
            Matrix2::new(-1e-5, 0.0, 0.0, 1e-5),
        );
        let frame = ReferenceFrameBuilder::new(identity_parity())
            .build(0.0, &current, &model)
            .unwrap();
        let (ra, dec) = current.xy2rd(600.0, 400.0);
        assert_eq!(frame.crval().x, ra);
        assert_eq!(frame.crval().y, dec);
    }

    #[test]
    fn test_invalid_roll() {
        let model = DistortionModel::linear(0.05, (0.0, 0.0), (0.0, 0.0)).unwrap();
        let current = LinearWcs::new((0.0, 0.0), (0.0, 0.0), Matrix2::identity());
        let err = ReferenceFrameBuilder::new(identity_parity())
            .build(f64::NAN, &current, &model)
            .unwrap_err();
        assert!(err.is_missing_metadata());
    }
}
