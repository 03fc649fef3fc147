//! # Linear tangent-plane WCS
//!
//! [`LinearWcs`](crate::wcs::LinearWcs) is the immutable value behind the `CRVAL`, `CRPIX` and
//! `CD` keywords of an image extension: a gnomonic (TAN) projection with a
//! 2×2 linear transform from pixel offsets to intermediate world coordinates.
//!
//! ```text
//! (ξ, η) = CD · (pixel - CRPIX)           degrees in the tangent plane
//! (α, δ) = TAN⁻¹(ξ, η) about CRVAL         sky position
//! ```
//!
//! Two wrappers give the pipeline stages their own types:
//!
//! * [`TangentPlaneWcs`](crate::wcs::TangentPlaneWcs) – the shared frame built on the reference
//!   chip, always anchored at `CRPIX = (0, 0)`,
//! * [`ChipWcs`](crate::wcs::ChipWcs) – the new WCS of one chip plus its SIP terms.

use nalgebra::{Matrix2, Vector2};

use crate::{
    constants::{Degree, Pixel, RADEG},
    sip::SipCoefficients,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearWcs {
    /// `(CRVAL1, CRVAL2)`: right ascension and declination of the reference pixel, in degrees.
    pub crval: Vector2<Degree>,
    /// `(CRPIX1, CRPIX2)`
    pub crpix: Vector2<Pixel>,
    /// `[[CD1_1, CD1_2], [CD2_1, CD2_2]]`, degrees per pixel.
    pub cd: Matrix2<f64>,
}

impl LinearWcs {
    pub fn new(crval: (Degree, Degree), crpix: (Pixel, Pixel), cd: Matrix2<f64>) -> Self {
        LinearWcs {
            crval: Vector2::new(crval.0, crval.1),
            crpix: Vector2::new(crpix.0, crpix.1),
            cd,
        }
    }

    /// Pixel → sky.
    ///
    /// Arguments
    /// ---------
    /// * `x`, `y`: pixel position
    ///
    /// Return
    /// ------
    /// * `(ra, dec)` in degrees, `ra` in `[0, 360)`
    pub fn xy2rd(&self, x: Pixel, y: Pixel) -> (Degree, Degree) {
        let iwc = self.cd * (Vector2::new(x, y) - self.crpix);
        let xi = iwc.x * RADEG;
        let eta = iwc.y * RADEG;
        let ra0 = self.crval.x * RADEG;
        let dec0 = self.crval.y * RADEG;

        let denom = dec0.cos() - eta * dec0.sin();
        let ra = xi.atan2(denom) + ra0;
        let dec = (eta * dec0.cos() + dec0.sin()).atan2((denom * denom + xi * xi).sqrt());

        ((ra / RADEG).rem_euclid(360.0), dec / RADEG)
    }

    /// Sky → pixel.
    ///
    /// Return
    /// ------
    /// * the pixel position, or `None` when the CD matrix is singular or the
    ///   point lies on the far side of the tangent plane
    pub fn rd2xy(&self, ra: Degree, dec: Degree) -> Option<(Pixel, Pixel)> {
        let ra0 = self.crval.x * RADEG;
        let dec0 = self.crval.y * RADEG;
        let (ra, dec) = (ra * RADEG, dec * RADEG);
        let dra = ra - ra0;

        let bottom = dec.sin() * dec0.sin() + dec.cos() * dec0.cos() * dra.cos();
        if bottom <= 0.0 {
            return None;
        }
        let xi = dec.cos() * dra.sin() / bottom / RADEG;
        let eta = (dec.sin() * dec0.cos() - dec.cos() * dec0.sin() * dra.cos()) / bottom / RADEG;

        let pixel = self.cd.try_inverse()? * Vector2::new(xi, eta) + self.crpix;
        Some((pixel.x, pixel.y))
    }

    /// Pixel scale in degrees per pixel, from the determinant of the CD matrix.
    pub fn pixel_scale(&self) -> Degree {
        self.cd.determinant().abs().sqrt()
    }
}

/// Tangent plane shared by every chip of an exposure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentPlaneWcs(LinearWcs);

impl TangentPlaneWcs {
    pub fn new(crval: (Degree, Degree), cd: Matrix2<f64>) -> Self {
        TangentPlaneWcs(LinearWcs::new(crval, (0.0, 0.0), cd))
    }

    pub fn crval(&self) -> Vector2<Degree> {
        self.0.crval
    }

    pub fn cd(&self) -> &Matrix2<f64> {
        &self.0.cd
    }

    /// Tangent-plane pixel offset → sky.
    pub fn xy2rd(&self, x: Pixel, y: Pixel) -> (Degree, Degree) {
        self.0.xy2rd(x, y)
    }

    pub fn as_linear(&self) -> &LinearWcs {
        &self.0
    }
}

/// New WCS of a chip, ready to be written to its header.
#[derive(Debug, Clone, PartialEq)]
pub struct ChipWcs {
    pub wcs: LinearWcs,
    /// Higher-order distortion, absent when it could not be derived or was not requested.
    pub sip: Option<SipCoefficients>,
}

#[cfg(test)]
mod wcs_test {
    use super::*;
    use approx::assert_relative_eq;

    fn wcs() -> LinearWcs {
        let scale = 0.05 / 3600.0;
        let pv = 30.0 * RADEG;
        LinearWcs::new(
            (150.0, 2.2),
            (2048.0, 1024.0),
            Matrix2::new(
                -pv.cos() * scale,
                pv.sin() * scale,
                pv.sin() * scale,
                pv.cos() * scale,
            ),
        )
    }

    #[test]
    fn test_reference_pixel_maps_to_crval() {
        let (ra, dec) = wcs().xy2rd(2048.0, 1024.0);
        assert_relative_eq!(ra, 150.0, epsilon = 1e-12);
        assert_relative_eq!(dec, 2.2, epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let w = wcs();
        for (x, y) in [(0.0, 0.0), (4096.0, 2048.0), (100.5, 1900.25)] {
            let (ra, dec) = w.xy2rd(x, y);
            let (px, py) = w.rd2xy(ra, dec).unwrap();
            assert_relative_eq!(px, x, epsilon = 1e-6);
            assert_relative_eq!(py, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_ra_wraps_at_zero() {
        let w = LinearWcs::new((0.0, 0.0), (0.0, 0.0), Matrix2::new(-1e-3, 0.0, 0.0, 1e-3));
        let (ra, _) = w.xy2rd(10.0, 0.0);
        assert_relative_eq!(ra, 359.99, epsilon = 1e-9);
        let (ra, _) = w.xy2rd(-10.0, 0.0);
        assert_relative_eq!(ra, 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_singular_cd() {
        let w = LinearWcs::new((10.0, 10.0), (0.0, 0.0), Matrix2::zeros());
        assert_eq!(w.rd2xy(10.0, 10.0), None);
        assert_eq!(w.pixel_scale(), 0.0);
    }

    #[test]
    fn test_pixel_scale() {
        assert_relative_eq!(wcs().pixel_scale(), 0.05 / 3600.0, max_relative = 1e-12);
    }
}
