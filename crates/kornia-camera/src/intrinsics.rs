use nalgebra::{Matrix3, Point2};

use crate::distortion::{Distortion, UndistortParams};
use crate::error::{CameraError, CameraResult};

/// Intrinsic parameters of a pinhole camera: focal lengths, principal point,
/// skew and lens distortion.
///
/// The intrinsic matrix is
///
/// ```text
/// K = | fx  skew  cx |
///     |  0   fy   cy |
///     |  0    0    1 |
/// ```
///
/// Skew multiplies the distorted normalized `y` coordinate, so a pixel is
/// `u = fx * x' + skew * y' + cx`, `v = fy * y' + cy`.
#[derive(Debug, Clone, PartialEq)]
pub struct Intrinsics {
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    skew: f64,
    distortion: Distortion,
}

impl Intrinsics {
    /// Create validated intrinsics.
    ///
    /// # Errors
    ///
    /// [`CameraError::InvalidParameter`] if any value is not finite or a focal
    /// length is not strictly positive.
    pub fn new(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        skew: f64,
        distortion: Distortion,
    ) -> CameraResult<Self> {
        if !(fx > 0.0 && fy > 0.0) {
            return Err(CameraError::InvalidParameter(format!(
                "focal lengths must be positive, got fx = {fx}, fy = {fy}"
            )));
        }
        let intrinsics = Self::from_parts(fx, fy, cx, cy, skew, distortion);
        if !intrinsics.is_finite() {
            return Err(CameraError::InvalidParameter(
                "intrinsic parameters must be finite".to_string(),
            ));
        }
        Ok(intrinsics)
    }

    /// Pinhole intrinsics with zero skew and no distortion.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> CameraResult<Self> {
        Self::new(fx, fy, cx, cy, 0.0, Distortion::zero())
    }

    /// Create intrinsics from a 3x3 intrinsic matrix.
    ///
    /// The matrix is normalized by its bottom-right entry and must then have
    /// the form `[[fx, skew, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn from_matrix(k: &Matrix3<f64>, distortion: Distortion) -> CameraResult<Self> {
        let k22 = k[(2, 2)];
        if !k22.is_normal() {
            return Err(CameraError::InvalidParameter(format!(
                "intrinsic matrix cannot be normalized, K[2][2] = {k22}"
            )));
        }
        let k = k / k22;
        let lower = [k[(1, 0)], k[(2, 0)], k[(2, 1)]];
        if lower.iter().any(|v| v.abs() > 1e-12 * k.amax()) {
            return Err(CameraError::InvalidParameter(
                "intrinsic matrix must be upper triangular".to_string(),
            ));
        }
        Self::new(
            k[(0, 0)],
            k[(1, 1)],
            k[(0, 2)],
            k[(1, 2)],
            k[(0, 1)],
            distortion,
        )
    }

    /// Unvalidated construction for derived cameras, which may carry a
    /// reflected (negative) focal length.
    pub(crate) fn from_parts(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        skew: f64,
        distortion: Distortion,
    ) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew,
            distortion,
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy, self.skew]
            .iter()
            .all(|v| v.is_finite())
            && self.distortion.is_finite()
    }

    /// Focal length along x in pixels.
    pub fn fx(&self) -> f64 {
        self.fx
    }

    /// Focal length along y in pixels.
    pub fn fy(&self) -> f64 {
        self.fy
    }

    /// Principal point x coordinate in pixels.
    pub fn cx(&self) -> f64 {
        self.cx
    }

    /// Principal point y coordinate in pixels.
    pub fn cy(&self) -> f64 {
        self.cy
    }

    /// Pixel skew.
    pub fn skew(&self) -> f64 {
        self.skew
    }

    /// Lens distortion coefficients.
    pub fn distortion(&self) -> &Distortion {
        &self.distortion
    }

    /// Returns `true` if the lens has non-zero distortion.
    pub fn is_distorted(&self) -> bool {
        !self.distortion.is_linear()
    }

    /// The 3x3 intrinsic matrix `K`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        )
    }

    /// Closed form inverse of the intrinsic matrix.
    pub fn inverse_matrix(&self) -> Matrix3<f64> {
        let (fx, fy, cx, cy, s) = (self.fx, self.fy, self.cx, self.cy, self.skew);
        Matrix3::new(
            1.0 / fx,
            -s / (fx * fy),
            (s * cy - cx * fy) / (fx * fy),
            0.0,
            1.0 / fy,
            -cy / fy,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Map a pixel to normalized image coordinates, i.e. apply `K^-1`.
    pub fn pixel_to_normalized(&self, pixel: &Point2<f64>) -> (f64, f64) {
        let y = (pixel.y - self.cy) / self.fy;
        let x = (pixel.x - self.cx - self.skew * y) / self.fx;
        (x, y)
    }

    /// Map normalized image coordinates to a pixel, i.e. apply `K`.
    pub fn normalized_to_pixel(&self, x: f64, y: f64) -> Point2<f64> {
        Point2::new(self.fx * x + self.skew * y + self.cx, self.fy * y + self.cy)
    }

    /// Apply the lens distortion to undistorted (rectified) pixel coordinates.
    ///
    /// With zero distortion this is the identity up to the `K^-1`/`K` round
    /// trip.
    pub fn distort(&self, undistorted: &[Point2<f64>]) -> Vec<Point2<f64>> {
        undistorted
            .iter()
            .map(|pixel| {
                let (x, y) = self.pixel_to_normalized(pixel);
                let (xd, yd) = self.distortion.distort_normalized(x, y);
                self.normalized_to_pixel(xd, yd)
            })
            .collect()
    }

    /// Remove the lens distortion from observed pixel coordinates, using the
    /// default termination criteria.
    pub fn undistort(&self, distorted: &[Point2<f64>]) -> Vec<Point2<f64>> {
        self.undistort_with(distorted, &UndistortParams::default())
    }

    /// Remove the lens distortion from observed pixel coordinates.
    ///
    /// The inverse is iterative, so `distort(undistort(p))` reproduces `p`
    /// only approximately.
    pub fn undistort_with(
        &self,
        distorted: &[Point2<f64>],
        params: &UndistortParams,
    ) -> Vec<Point2<f64>> {
        let mut not_converged = 0usize;
        let undistorted = distorted
            .iter()
            .map(|pixel| {
                let (xd, yd) = self.pixel_to_normalized(pixel);
                let ((x, y), converged) = self.distortion.undistort_normalized(xd, yd, params);
                if !converged {
                    not_converged += 1;
                }
                self.normalized_to_pixel(x, y)
            })
            .collect();

        if not_converged > 0 {
            log::warn!(
                "undistortion did not converge for {} of {} points after {} iterations",
                not_converged,
                distorted.len(),
                params.max_iterations
            );
        }
        undistorted
    }
}
