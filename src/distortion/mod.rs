//! # Polynomial distortion models
//!
//! A [`DistortionModel`](crate::distortion::DistortionModel) maps pixel offsets from a chip's
//! reference pixel `(XREF, YREF)` to offsets in the V2/V3 focal plane (arcseconds):
//!
//! ```text
//! ΔV2 = Σ fx[i][j] · x^j · y^(i-j)      0 ≤ j ≤ i ≤ order
//! ΔV3 = Σ fy[i][j] · x^j · y^(i-j)
//! ```
//!
//! Only the lower triangle (`j ≤ i`) of each coefficient grid is populated.
//! With this layout `fx[1][1]` and `fy[1][1]` are the derivatives along x and
//! `fx[1][0]`, `fy[1][0]` the derivatives along y.
//!
//! ## Submodules
//!
//! * [`shift`] – re-expansion of the coefficients about another reference pixel,
//! * [`repository`] – lookup of a model for a chip, filter pair and date, with
//!   optional offset-table corrections.

pub mod repository;
pub mod shift;

use nalgebra::DMatrix;

use crate::{
    constants::{ArcSec, Degree, Pixel},
    makewcs_errors::MakeWcsError,
};

/// Square coefficient grid of size `(order + 1) × (order + 1)`.
pub type CoefficientGrid = DMatrix<f64>;

/// Immutable per-chip distortion solution.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionModel {
    /// V2 coefficients.
    pub fx: CoefficientGrid,
    /// V3 coefficients.
    pub fy: CoefficientGrid,
    /// Polynomial order.
    pub order: usize,
    /// Reference pixel of the solution.
    pub xref: Pixel,
    pub yref: Pixel,
    /// V2/V3 position of the reference pixel (arcsec).
    pub v2ref: ArcSec,
    pub v3ref: ArcSec,
    /// Pixel scale at the reference pixel (arcsec/pixel).
    pub pscale: ArcSec,
    /// Rotation of the chip relative to V2/V3, when the solution defines one.
    pub theta: Option<Degree>,
}

impl DistortionModel {
    /// Build and validate a distortion model.
    ///
    /// Arguments
    /// ---------
    /// * `fx`, `fy`: coefficient grids, both `(order + 1)` square
    /// * `order`: polynomial order
    /// * `reference_pixel`: `(XREF, YREF)`
    /// * `v2v3ref`: `(V2REF, V3REF)` in arcseconds
    /// * `pscale`: pixel scale in arcsec/pixel, strictly positive
    /// * `theta`: optional chip rotation in degrees
    ///
    /// Return
    /// ------
    /// * the model, or [`MakeWcsError::MissingMetadata`] when the grids are not
    ///   square, not lower triangular, or the scale is not positive
    pub fn new(
        fx: CoefficientGrid,
        fy: CoefficientGrid,
        order: usize,
        reference_pixel: (Pixel, Pixel),
        v2v3ref: (ArcSec, ArcSec),
        pscale: ArcSec,
        theta: Option<Degree>,
    ) -> Result<Self, MakeWcsError> {
        let size = order + 1;
        for (name, grid) in [("fx", &fx), ("fy", &fy)] {
            if grid.nrows() != size || grid.ncols() != size {
                return Err(MakeWcsError::MissingMetadata(format!(
                    "{name} coefficient grid is {}x{}, expected {size}x{size} for order {order}",
                    grid.nrows(),
                    grid.ncols()
                )));
            }
            let upper = (0..size).any(|i| ((i + 1)..size).any(|j| grid[(i, j)] != 0.0));
            if upper {
                return Err(MakeWcsError::MissingMetadata(format!(
                    "{name} coefficient grid has terms above the diagonal"
                )));
            }
        }
        if !(pscale > 0.0) {
            return Err(MakeWcsError::MissingMetadata(format!(
                "PSCALE must be positive, got {pscale}"
            )));
        }

        Ok(DistortionModel {
            fx,
            fy,
            order,
            xref: reference_pixel.0,
            yref: reference_pixel.1,
            v2ref: v2v3ref.0,
            v3ref: v2v3ref.1,
            pscale,
            theta,
        })
    }

    /// A first order model: pure scale, no rotation, no higher-order terms.
    pub fn linear(
        pscale: ArcSec,
        reference_pixel: (Pixel, Pixel),
        v2v3ref: (ArcSec, ArcSec),
    ) -> Result<Self, MakeWcsError> {
        let mut fx = CoefficientGrid::zeros(2, 2);
        let mut fy = CoefficientGrid::zeros(2, 2);
        fx[(1, 1)] = pscale;
        fy[(1, 0)] = pscale;
        DistortionModel::new(fx, fy, 1, reference_pixel, v2v3ref, pscale, None)
    }

    /// Chip rotation, with an absent `THETA` read as zero.
    pub fn theta_or_zero(&self) -> Degree {
        self.theta.unwrap_or(0.0)
    }

    /// Evaluate the polynomial at a pixel offset from the reference pixel.
    ///
    /// Return
    /// ------
    /// * `(ΔV2, ΔV3)` in arcseconds
    pub fn evaluate(&self, x: Pixel, y: Pixel) -> (ArcSec, ArcSec) {
        (
            eval_grid(&self.fx, self.order, x, y),
            eval_grid(&self.fy, self.order, x, y),
        )
    }

    /// The same model with `(XREF, YREF)` moved by `(dx, dy)`, for a pixel frame
    /// offset from the one the model was calibrated in (`LTV1/LTV2` of a subarray).
    pub fn in_pixel_frame(&self, dx: Pixel, dy: Pixel) -> DistortionModel {
        DistortionModel {
            xref: self.xref + dx,
            yref: self.yref + dy,
            ..self.clone()
        }
    }

    /// The same model re-expanded about the pixel `(xref + x_shift, yref + y_shift)`.
    ///
    /// The constant term produced by [`shift::shift_coefficients`] is folded
    /// into `(V2REF, V3REF)`, so every pixel keeps its absolute V2/V3 position.
    pub fn recentered(&self, x_shift: Pixel, y_shift: Pixel) -> DistortionModel {
        let (mut fx, mut fy) =
            shift::shift_coefficients(&self.fx, &self.fy, x_shift, y_shift, self.order);
        let dv2 = fx[(0, 0)] + x_shift;
        let dv3 = fy[(0, 0)] + y_shift;
        fx[(0, 0)] = 0.0;
        fy[(0, 0)] = 0.0;
        DistortionModel {
            fx,
            fy,
            xref: self.xref + x_shift,
            yref: self.yref + y_shift,
            v2ref: self.v2ref + dv2,
            v3ref: self.v3ref + dv3,
            ..self.clone()
        }
    }
}

/// `Σ grid[i][j] · x^j · y^(i-j)` over the lower triangle.
pub fn eval_grid(grid: &CoefficientGrid, order: usize, x: f64, y: f64) -> f64 {
    let mut sum = 0.0;
    for i in 0..=order {
        for j in 0..=i {
            sum += grid[(i, j)] * x.powi(j as i32) * y.powi((i - j) as i32);
        }
    }
    sum
}
