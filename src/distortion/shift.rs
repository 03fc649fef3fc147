//! Re-expansion of a distortion polynomial about a new origin.
//!
//! A subarray readout does not share the pixel origin the coefficients were
//! calibrated against. Shifting the coefficients by `(xs, ys)`, the new
//! center minus the old reference position, gives a polynomial `P'` with
//!
//! ```text
//! P'(x, y) = P(x + xs, y + ys) - xs      (x grid)
//! Q'(x, y) = Q(x + xs, y + ys) - ys      (y grid)
//! ```
//!
//! The `- xs`, `- ys` terms land in the constant coefficients;
//! [`DistortionModel::recentered`](crate::distortion::DistortionModel::recentered)
//! folds the whole constant back into `V2REF/V3REF`.

use itertools::iproduct;

use super::CoefficientGrid;

/// Number of combinations `C(n, k)`, zero outside `0 ≤ k ≤ n`.
pub fn combin(n: i32, k: i32) -> f64 {
    if k < 0 || n < 0 || k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * f64::from(n - i) / f64::from(i + 1))
}

/// Shift the pair of coefficient grids to a new reference position.
///
/// Each term `(m, n)`, `m ≥ n`, of the result collects every input term
/// `(i, j)` with `i ≥ m`, `j ≥ n` and `i - j ≥ m - n`, weighted by
/// `C(j, n) · C(i-j, m-n) · xs^(j-n) · ys^((i-j)-(m-n))`.
///
/// Arguments
/// ---------
/// * `cx`, `cy`: input grids, `(order + 1)` square
/// * `xs`, `ys`: new center minus old reference position, in pixels
/// * `order`: polynomial order
///
/// Return
/// ------
/// * the shifted `(cx', cy')`
pub fn shift_coefficients(
    cx: &CoefficientGrid,
    cy: &CoefficientGrid,
    xs: f64,
    ys: f64,
    order: usize,
) -> (CoefficientGrid, CoefficientGrid) {
    let k = order + 1;
    let mut cxs = CoefficientGrid::zeros(k, k);
    let mut cys = CoefficientGrid::zeros(k, k);

    for (m, n) in iproduct!(0..k, 0..k).filter(|(m, n)| m >= n) {
        for i in m..k {
            for j in n..=(i - (m - n)) {
                let weight = combin(j as i32, n as i32)
                    * combin((i - j) as i32, (m - n) as i32)
                    * xs.powi((j - n) as i32)
                    * ys.powi(((i - j) - (m - n)) as i32);
                cxs[(m, n)] += cx[(i, j)] * weight;
                cys[(m, n)] += cy[(i, j)] * weight;
            }
        }
    }
    cxs[(0, 0)] -= xs;
    cys[(0, 0)] -= ys;

    (cxs, cys)
}

#[cfg(test)]
mod shift_test {
    use super::*;
    use crate::distortion::{distortion_test::cubic_model, eval_grid};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn assert_grid_close(a: &CoefficientGrid, b: &CoefficientGrid, tol: f64) {
        for i in 0..a.nrows() {
            for j in 0..a.ncols() {
                assert_relative_eq!(a[(i, j)], b[(i, j)], epsilon = tol, max_relative = tol);
            }
        }
    }

    #[test]
    fn test_combin() {
        assert_eq!(combin(0, 0), 1.0);
        assert_eq!(combin(5, 0), 1.0);
        assert_eq!(combin(5, 2), 10.0);
        assert_eq!(combin(6, 3), 20.0);
        assert_eq!(combin(3, 4), 0.0);
        assert_eq!(combin(3, -1), 0.0);
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let model = cubic_model();
        let (fx, fy) = shift_coefficients(&model.fx, &model.fy, 0.0, 0.0, model.order);
        assert_eq!(fx, model.fx);
        assert_eq!(fy, model.fy);
    }

    #[test]
    fn test_shift_is_taylor_reexpansion() {
        let model = cubic_model();
        let (xs, ys) = (37.5, -12.25);
        let (fx, fy) = shift_coefficients(&model.fx, &model.fy, xs, ys, model.order);

        for (x, y) in [(0.0, 0.0), (100.0, -40.0), (-250.0, 310.0)] {
            assert_relative_eq!(
                eval_grid(&fx, model.order, x, y),
                eval_grid(&model.fx, model.order, x + xs, y + ys) - xs,
                epsilon = 1e-9
            );
            assert_relative_eq!(
                eval_grid(&fy, model.order, x, y),
                eval_grid(&model.fy, model.order, x + xs, y + ys) - ys,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_shift_keeps_triangular_layout() {
        let model = cubic_model();
        let (fx, _) = shift_coefficients(&model.fx, &model.fy, 10.0, 20.0, model.order);
        for i in 0..fx.nrows() {
            for j in (i + 1)..fx.ncols() {
                assert_eq!(fx[(i, j)], 0.0);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_shifts_compose(
            x1 in -200.0f64..200.0,
            y1 in -200.0f64..200.0,
            x2 in -200.0f64..200.0,
            y2 in -200.0f64..200.0,
        ) {
            let model = cubic_model();
            let (ax, ay) = shift_coefficients(&model.fx, &model.fy, x1, y1, 3);
            let (twice_x, twice_y) = shift_coefficients(&ax, &ay, x2, y2, 3);
            let (once_x, once_y) = shift_coefficients(&model.fx, &model.fy, x1 + x2, y1 + y2, 3);
            assert_grid_close(&twice_x, &once_x, 1e-9);
            assert_grid_close(&twice_y, &once_y, 1e-9);
        }
    }
}
