//! # SIP coefficients
//!
//! The linear part of a distortion model goes into the CD matrix; the terms
//! of total order two and above are stored as SIP `A_p_q` / `B_p_q` keywords.
//! They are obtained by applying the inverse of the model's local Jacobian
//! to the higher-order V2/V3 coefficients, so that they are expressed in
//! pixels:
//!
//! ```text
//! a = fx[1][1]/3600   b = fx[1][0]/3600   c = fy[1][1]/3600   d = fy[1][0]/3600
//! det = (a·d - b·c) · PSCALE
//! A_m_(n-m) = PSCALE/3600 · (d·fx[n][m] - b·fy[n][m]) / det
//! B_m_(n-m) = PSCALE/3600 · (a·fy[n][m] - c·fx[n][m]) / det      2 ≤ n ≤ order, m ≤ n
//! ```
//!
//! `A_p_q` multiplies `u^p · v^q` where `(u, v)` is the offset from `CRPIX`.

use crate::{
    constants::ARCSEC_PER_DEG,
    distortion::{CoefficientGrid, DistortionModel},
    makewcs_errors::MakeWcsError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SipCoefficients {
    /// Value of `A_ORDER` and `B_ORDER`.
    pub order: usize,
    /// `a[(p, q)]` is `A_p_q`, zero where no term is defined.
    pub a: CoefficientGrid,
    /// `b[(p, q)]` is `B_p_q`.
    pub b: CoefficientGrid,
}

impl SipCoefficients {
    /// Defined terms as `(p, q, A_p_q, B_p_q)`, ordered by total order then by `p`.
    pub fn terms(&self) -> impl Iterator<Item = (usize, usize, f64, f64)> + '_ {
        (2..=self.order).flat_map(move |n| {
            (0..=n).map(move |p| (p, n - p, self.a[(p, n - p)], self.b[(p, n - p)]))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.order < 2
    }

    /// `("A_p_q", value)` and `("B_p_q", value)` pairs for every defined term.
    pub fn keywords(&self) -> Vec<(String, f64)> {
        self.terms()
            .flat_map(|(p, q, a, b)| [(format!("A_{p}_{q}"), a), (format!("B_{p}_{q}"), b)])
            .collect()
    }
}

/// Convert the higher-order terms of a distortion model to SIP coefficients.
///
/// Argument
/// --------
/// * `model`: the chip's distortion model; its `PSCALE` and order are used
///
/// Return
/// ------
/// * the SIP coefficients with `A_ORDER = B_ORDER = order`, or
///   [`MakeWcsError::DegenerateJacobian`] when the linear terms are not invertible
pub fn convert_to_sip(model: &DistortionModel) -> Result<SipCoefficients, MakeWcsError> {
    let order = model.order;
    let (fx, fy) = (&model.fx, &model.fy);
    let pscale = model.pscale;

    if order < 1 {
        return Err(MakeWcsError::MissingMetadata(
            "distortion model has no linear terms".into(),
        ));
    }

    let f = pscale / ARCSEC_PER_DEG;
    let a = fx[(1, 1)] / ARCSEC_PER_DEG;
    let b = fx[(1, 0)] / ARCSEC_PER_DEG;
    let c = fy[(1, 1)] / ARCSEC_PER_DEG;
    let d = fy[(1, 0)] / ARCSEC_PER_DEG;
    let det = (a * d - b * c) * pscale;
    if det == 0.0 || !det.is_finite() {
        return Err(MakeWcsError::DegenerateJacobian(det));
    }

    let size = order + 1;
    let mut sip_a = CoefficientGrid::zeros(size, size);
    let mut sip_b = CoefficientGrid::zeros(size, size);
    for n in 2..=order {
        for m in 0..=n {
            sip_a[(m, n - m)] = f * (d * fx[(n, m)] - b * fy[(n, m)]) / det;
            sip_b[(m, n - m)] = f * (a * fy[(n, m)] - c * fx[(n, m)]) / det;
        }
    }

    Ok(SipCoefficients {
        order,
        a: sip_a,
        b: sip_b,
    })
}

#[cfg(test)]
mod sip_test {
    use super::*;
    use crate::distortion::distortion_test::cubic_model;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_model_has_no_terms() {
        let model = DistortionModel::linear(0.05, (0.0, 0.0), (0.0, 0.0)).unwrap();
        let sip = convert_to_sip(&model).unwrap();
        assert_eq!(sip.order, 1);
        assert!(sip.is_empty());
        assert_eq!(sip.terms().count(), 0);
        assert!(sip.keywords().is_empty());
    }

    #[test]
    fn test_cubic_model_terms() {
        let model = cubic_model();
        let sip = convert_to_sip(&model).unwrap();
        assert_eq!(sip.order, 3);
        // 3 second-order and 4 third-order terms
        assert_eq!(sip.terms().count(), 7);
        assert_eq!(sip.keywords().len(), 14);
        assert_eq!(sip.keywords()[0].0, "A_0_2");
        assert_eq!(sip.keywords()[1].0, "B_0_2");
        assert_eq!(sip.keywords().last().unwrap().0, "B_3_0");
    }

    #[test]
    fn test_scale_only_model() {
        // with a pure scale Jacobian the SIP terms are the coefficients in pixels
        let mut model = DistortionModel::linear(0.05, (0.0, 0.0), (0.0, 0.0)).unwrap();
        let mut fx = CoefficientGrid::zeros(3, 3);
        let mut fy = CoefficientGrid::zeros(3, 3);
        fx.view_mut((0, 0), (2, 2)).copy_from(&model.fx);
        fy.view_mut((0, 0), (2, 2)).copy_from(&model.fy);
        fx[(2, 2)] = 1e-6; // x^2 in V2
        fy[(2, 0)] = 2e-6; // y^2 in V3
        model.fx = fx;
        model.fy = fy;
        model.order = 2;

        let sip = convert_to_sip(&model).unwrap();
        assert_relative_eq!(sip.a[(2, 0)], 1e-6 / 0.05, max_relative = 1e-12);
        assert_relative_eq!(sip.b[(0, 2)], 2e-6 / 0.05, max_relative = 1e-12);
        assert_eq!(sip.a[(0, 2)], 0.0);
        assert_eq!(sip.b[(1, 1)], 0.0);
    }

    #[test]
    fn test_degenerate_jacobian() {
        let mut model = cubic_model();
        model.fx[(1, 0)] = 0.0;
        model.fx[(1, 1)] = 0.0;
        assert_eq!(
            convert_to_sip(&model),
            Err(MakeWcsError::DegenerateJacobian(0.0))
        );
    }
}
