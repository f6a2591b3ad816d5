use serde::{Deserialize, Serialize};

/// Brown-Conrady ("plumb bob") lens distortion with three radial and two
/// tangential coefficients.
///
/// The coefficients act on normalized image coordinates, i.e. after the
/// intrinsic matrix has been removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    /// First radial coefficient.
    pub k1: f64,
    /// Second radial coefficient.
    pub k2: f64,
    /// First tangential coefficient.
    pub p1: f64,
    /// Second tangential coefficient.
    pub p2: f64,
    /// Third radial coefficient.
    pub k3: f64,
}

/// Termination criteria for the iterative undistortion solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UndistortParams {
    /// Maximum number of fixed-point iterations per point.
    pub max_iterations: usize,
    /// Stop once the update in normalized coordinates is below this value.
    pub epsilon: f64,
}

impl Default for UndistortParams {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            epsilon: 1e-12,
        }
    }
}

impl Distortion {
    /// Distortion free lens.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build from a vector ordered `[k1, k2, p1, p2, k3]`.
    pub fn from_opencv_vec(v: [f64; 5]) -> Self {
        Self {
            k1: v[0],
            k2: v[1],
            p1: v[2],
            p2: v[3],
            k3: v[4],
        }
    }

    /// OpenCV ordered vector of coefficients `[k1, k2, p1, p2, k3]`.
    pub fn opencv_vec(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Returns `true` if the lens has (numerically) no distortion.
    pub fn is_linear(&self) -> bool {
        self.opencv_vec().iter().map(|c| c * c).sum::<f64>() < 1e-16
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.opencv_vec().iter().all(|c| c.is_finite())
    }

    /// Coefficients of the same lens seen through a reflection `x -> -x` of
    /// the normalized plane.
    pub(crate) fn mirrored_x(&self) -> Self {
        Self {
            p2: -self.p2,
            ..*self
        }
    }

    /// Coefficients of the same lens seen through a reflection `y -> -y` of
    /// the normalized plane.
    pub(crate) fn mirrored_y(&self) -> Self {
        Self {
            p1: -self.p1,
            ..*self
        }
    }

    fn radial_and_tangential(&self, x: f64, y: f64) -> (f64, f64, f64) {
        let r2 = x * x + y * y;
        let radial = 1.0 + ((self.k3 * r2 + self.k2) * r2 + self.k1) * r2;
        let xy_2 = 2.0 * x * y;
        let delta_x = self.p1 * xy_2 + self.p2 * (r2 + 2.0 * x * x);
        let delta_y = self.p1 * (r2 + 2.0 * y * y) + self.p2 * xy_2;
        (radial, delta_x, delta_y)
    }

    /// Apply the distortion to a normalized, undistorted point.
    pub fn distort_normalized(&self, x: f64, y: f64) -> (f64, f64) {
        let (radial, delta_x, delta_y) = self.radial_and_tangential(x, y);
        (x * radial + delta_x, y * radial + delta_y)
    }

    /// Remove the distortion from a normalized, distorted point.
    ///
    /// Returns the undistorted point and whether the iteration converged.
    pub fn undistort_normalized(
        &self,
        xd: f64,
        yd: f64,
        params: &UndistortParams,
    ) -> ((f64, f64), bool) {
        if self.is_linear() {
            return ((xd, yd), true);
        }

        let (mut x, mut y) = (xd, yd);
        for _ in 0..params.max_iterations {
            let (radial, delta_x, delta_y) = self.radial_and_tangential(x, y);
            let x_next = (xd - delta_x) / radial;
            let y_next = (yd - delta_y) / radial;
            let step = (x_next - x).abs().max((y_next - y).abs());
            x = x_next;
            y = y_next;
            if step < params.epsilon {
                return ((x, y), true);
            }
        }
        ((x, y), false)
    }
}
