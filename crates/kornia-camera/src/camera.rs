use nalgebra::{Matrix3, Matrix3x4, Point2, Point3, UnitQuaternion, Vector3};

use crate::distortion::{Distortion, UndistortParams};
use crate::error::{CameraError, CameraResult};
use crate::extrinsics::{matrix3_from_rows, matrix3_to_rows, Extrinsics};
use crate::intrinsics::Intrinsics;
use crate::linalg::{compose_projection_matrix, decompose_projection_matrix};
use crate::record::{CameraRecord, ExtrinsicsRecord, ProjectionRecord, RotationRecord};

/// Relative tolerance when comparing a record's projection matrix with the
/// one implied by its parameters.
const RECORD_PMAT_TOL: f64 = 1e-6;

/// A pinhole camera: intrinsics, pose and image metadata.
///
/// Values are immutable; derived cameras (see [`CameraModel::mirror`],
/// [`CameraModel::flip`] and [`CameraModel::with_view`]) are new values.
///
/// Example:
///
/// ```
/// use kornia_camera::{CameraModel, Extrinsics, Intrinsics};
/// use nalgebra::Point3;
///
/// let intrinsics = Intrinsics::pinhole(500.0, 500.0, 320.0, 240.0).unwrap();
/// let cam = CameraModel::from_parameters(640, 480, intrinsics, Extrinsics::identity(), "cam")
///     .unwrap();
/// let uv = cam.project_3d_to_pixel(&[Point3::new(0.0, 0.0, 5.0)], false);
/// assert_eq!((uv[0].x, uv[0].y), (320.0, 240.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    name: String,
    width: usize,
    height: usize,
    intrinsics: Intrinsics,
    extrinsics: Extrinsics,
    pmat: Matrix3x4<f64>,
}

fn check_image_size(width: usize, height: usize) -> CameraResult<()> {
    if width == 0 || height == 0 {
        return Err(CameraError::InvalidParameter(format!(
            "image size must be at least 1x1, got {width}x{height}"
        )));
    }
    Ok(())
}

fn pmat_from_rows(rows: &[[f64; 4]; 3]) -> Matrix3x4<f64> {
    Matrix3x4::from_fn(|i, j| rows[i][j])
}

fn pmat_to_rows(pmat: &Matrix3x4<f64>) -> [[f64; 4]; 3] {
    let mut rows = [[0.0; 4]; 3];
    for (i, row) in rows.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = pmat[(i, j)];
        }
    }
    rows
}

/// Whether two projection matrices agree up to a non-zero scale factor.
fn same_up_to_scale(a: &Matrix3x4<f64>, b: &Matrix3x4<f64>, tol: f64) -> bool {
    let (na, nb) = (a.norm(), b.norm());
    if !(na.is_normal() && nb.is_normal()) {
        return false;
    }
    let (a, b) = (a / na, b / nb);
    // pick the sign from the dot product
    let b = if a.dot(&b) < 0.0 { -b } else { b };
    (a - b).amax() <= tol
}

impl CameraModel {
    /// Assemble a camera from already validated parts.
    pub(crate) fn from_parts(
        name: String,
        width: usize,
        height: usize,
        intrinsics: Intrinsics,
        extrinsics: Extrinsics,
    ) -> Self {
        let pmat = compose_projection_matrix(
            &intrinsics.matrix(),
            extrinsics.rotation(),
            extrinsics.translation(),
        );
        Self {
            name,
            width,
            height,
            intrinsics,
            extrinsics,
            pmat,
        }
    }

    /// Create a camera from explicit intrinsic and extrinsic parameters.
    ///
    /// # Errors
    ///
    /// [`CameraError::InvalidParameter`] if the image size is zero.
    pub fn from_parameters(
        width: usize,
        height: usize,
        intrinsics: Intrinsics,
        extrinsics: Extrinsics,
        name: impl Into<String>,
    ) -> CameraResult<Self> {
        check_image_size(width, height)?;
        Ok(Self::from_parts(
            name.into(),
            width,
            height,
            intrinsics,
            extrinsics,
        ))
    }

    /// Create an undistorted camera from a 3x4 projection matrix.
    ///
    /// The matrix is decomposed as described in
    /// [`decompose_projection_matrix`]. The resulting camera projects every
    /// point to the same pixel as `pmat`, but its intrinsic matrix is scaled
    /// so that `K[(2, 2)] == 1`.
    ///
    /// # Errors
    ///
    /// [`CameraError::InvalidParameter`] if the matrix is not finite, its
    /// left 3x3 block is rank deficient, or the image size is zero.
    pub fn from_projection_matrix(
        pmat: &Matrix3x4<f64>,
        width: usize,
        height: usize,
        name: impl Into<String>,
    ) -> CameraResult<Self> {
        check_image_size(width, height)?;
        let (k, rotation, translation) = decompose_projection_matrix(pmat)?;
        let intrinsics = Intrinsics::from_matrix(&k, Distortion::zero())?;
        let extrinsics = Extrinsics::from_matrix(rotation, translation)?;
        Ok(Self::from_parts(
            name.into(),
            width,
            height,
            intrinsics,
            extrinsics,
        ))
    }

    /// Create a camera from a [`ProjectionRecord`].
    pub fn from_projection_record(record: &ProjectionRecord) -> CameraResult<Self> {
        Self::from_projection_matrix(
            &pmat_from_rows(&record.pmat),
            record.width,
            record.height,
            record.name.clone(),
        )
    }

    /// Create a camera from a full parameter [`CameraRecord`].
    ///
    /// # Errors
    ///
    /// [`CameraError::InvalidParameter`] if any parameter is invalid, the
    /// rectification matrix is not the identity, or the record's projection
    /// matrix disagrees with its intrinsic and extrinsic parameters.
    pub fn from_record(record: &CameraRecord) -> CameraResult<Self> {
        check_image_size(record.width, record.height)?;

        if let Some(rect) = &record.rectification_matrix {
            let rect = matrix3_from_rows(rect);
            if (rect - Matrix3::identity()).amax() > 1e-9 {
                return Err(CameraError::InvalidParameter(
                    "stereo rectification is not supported, rectification_matrix must be identity"
                        .to_string(),
                ));
            }
        }

        let intrinsics = Intrinsics::from_matrix(
            &matrix3_from_rows(&record.intrinsic_matrix),
            Distortion::from_opencv_vec(record.distortion),
        )?;
        let extrinsics = Extrinsics::from_record(&ExtrinsicsRecord {
            translation: record.translation,
            rotation: record.rotation.clone(),
        })?;
        let camera = Self::from_parts(
            record.name.clone(),
            record.width,
            record.height,
            intrinsics,
            extrinsics,
        );

        if let Some(pmat) = &record.projection_matrix {
            if !same_up_to_scale(&pmat_from_rows(pmat), &camera.pmat, RECORD_PMAT_TOL) {
                return Err(CameraError::InvalidParameter(format!(
                    "projection_matrix of camera '{}' disagrees with its parameters",
                    record.name
                )));
            }
        }
        Ok(camera)
    }

    /// Create a simple undistorted camera from a horizontal field of view and
    /// a look-at pose.
    ///
    /// The principal point is the image center and `fx == fy`. `up` defaults
    /// to `+Z`.
    ///
    /// # Errors
    ///
    /// [`CameraError::InvalidParameter`] if `fov_x_degrees` is not in
    /// `(0, 180)` or the image size is zero, and
    /// [`CameraError::DegenerateGeometry`] for a degenerate pose.
    pub fn from_pose(
        fov_x_degrees: f64,
        eye: &Point3<f64>,
        lookat: &Point3<f64>,
        up: Option<&Vector3<f64>>,
        width: usize,
        height: usize,
    ) -> CameraResult<Self> {
        if !(fov_x_degrees > 0.0 && fov_x_degrees < 180.0) {
            return Err(CameraError::InvalidParameter(format!(
                "horizontal field of view must be in (0, 180) degrees, got {fov_x_degrees}"
            )));
        }
        check_image_size(width, height)?;

        let cx = width as f64 / 2.0;
        let cy = height as f64 / 2.0;
        let f = cx / (fov_x_degrees.to_radians() / 2.0).tan();
        let intrinsics = Intrinsics::pinhole(f, f, cx, cy)?;
        let up = up.copied().unwrap_or_else(Vector3::z);

        Self::from_parts(
            "simple".to_string(),
            width,
            height,
            intrinsics,
            Extrinsics::identity(),
        )
        .with_view(eye, lookat, &up)
    }

    /// Camera name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Intrinsic parameters.
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Extrinsic parameters.
    pub fn extrinsics(&self) -> &Extrinsics {
        &self.extrinsics
    }

    /// Focal length along x in pixels.
    pub fn fx(&self) -> f64 {
        self.intrinsics.fx()
    }

    /// Focal length along y in pixels.
    pub fn fy(&self) -> f64 {
        self.intrinsics.fy()
    }

    /// Principal point x coordinate in pixels.
    pub fn cx(&self) -> f64 {
        self.intrinsics.cx()
    }

    /// Principal point y coordinate in pixels.
    pub fn cy(&self) -> f64 {
        self.intrinsics.cy()
    }

    /// Pixel skew.
    pub fn skew(&self) -> f64 {
        self.intrinsics.skew()
    }

    /// The 3x3 intrinsic matrix `K`.
    pub fn intrinsic_matrix(&self) -> Matrix3<f64> {
        self.intrinsics.matrix()
    }

    /// Lens distortion coefficients.
    pub fn distortion(&self) -> &Distortion {
        self.intrinsics.distortion()
    }

    /// Returns `true` if the lens has non-zero distortion.
    pub fn is_distorted(&self) -> bool {
        self.intrinsics.is_distorted()
    }

    /// World-to-camera rotation.
    pub fn rotation(&self) -> &Matrix3<f64> {
        self.extrinsics.rotation()
    }

    /// World-to-camera translation.
    pub fn translation(&self) -> &Vector3<f64> {
        self.extrinsics.translation()
    }

    /// World-to-camera rotation as a unit quaternion.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.extrinsics.quaternion()
    }

    /// Optical center in world coordinates.
    pub fn camera_center(&self) -> Point3<f64> {
        self.extrinsics.camera_center()
    }

    /// The 3x4 projection matrix `K [R | t]`.
    pub fn pmat(&self) -> &Matrix3x4<f64> {
        &self.pmat
    }

    /// Owned copy of the projection matrix.
    pub fn to_projection_matrix(&self) -> Matrix3x4<f64> {
        self.pmat
    }

    /// Export the projection matrix with the image metadata.
    pub fn to_projection_record(&self) -> ProjectionRecord {
        ProjectionRecord {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            pmat: pmat_to_rows(&self.pmat),
        }
    }

    /// Export the full parameter record. The rotation is written as a matrix.
    ///
    /// # Errors
    ///
    /// [`CameraError::UnsupportedOperation`] for a camera with a reflected
    /// (non-positive) focal length, such as one returned by
    /// [`CameraModel::flip`], since [`CameraModel::from_record`] could not
    /// read it back.
    pub fn to_record(&self) -> CameraResult<CameraRecord> {
        if !(self.fx() > 0.0 && self.fy() > 0.0) {
            return Err(CameraError::UnsupportedOperation(format!(
                "camera '{}' has a reflected focal length (fx = {}, fy = {})",
                self.name,
                self.fx(),
                self.fy()
            )));
        }
        Ok(CameraRecord {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            intrinsic_matrix: matrix3_to_rows(&self.intrinsics.matrix()),
            distortion: self.intrinsics.distortion().opencv_vec(),
            rectification_matrix: None,
            projection_matrix: Some(pmat_to_rows(&self.pmat)),
            rotation: RotationRecord::Matrix(matrix3_to_rows(self.extrinsics.rotation())),
            translation: (*self.extrinsics.translation()).into(),
        })
    }

    /// Export the pose-only record.
    pub fn extrinsics_record(&self) -> ExtrinsicsRecord {
        self.extrinsics.to_record()
    }

    /// Remove the lens distortion from observed pixel coordinates.
    pub fn undistort(&self, distorted: &[Point2<f64>]) -> Vec<Point2<f64>> {
        self.intrinsics.undistort(distorted)
    }

    /// Remove the lens distortion with explicit termination criteria.
    pub fn undistort_with(
        &self,
        distorted: &[Point2<f64>],
        params: &UndistortParams,
    ) -> Vec<Point2<f64>> {
        self.intrinsics.undistort_with(distorted, params)
    }

    /// Apply the lens distortion to undistorted pixel coordinates.
    pub fn distort(&self, undistorted: &[Point2<f64>]) -> Vec<Point2<f64>> {
        self.intrinsics.distort(undistorted)
    }

    /// Transform world points into the camera frame.
    pub fn project_3d_to_camera_frame(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points
            .iter()
            .map(|p| self.extrinsics.world_to_camera(p))
            .collect()
    }

    /// Project camera frame points to pixels, optionally through the lens
    /// distortion.
    ///
    /// Points on the `z == 0` plane of the camera frame map to non-finite
    /// pixels.
    pub fn project_camera_frame_to_pixel(
        &self,
        points: &[Point3<f64>],
        distorted: bool,
    ) -> Vec<Point2<f64>> {
        let distortion = self.intrinsics.distortion();
        points
            .iter()
            .map(|p| {
                let (x, y) = (p.x / p.z, p.y / p.z);
                let (x, y) = if distorted {
                    distortion.distort_normalized(x, y)
                } else {
                    (x, y)
                };
                self.intrinsics.normalized_to_pixel(x, y)
            })
            .collect()
    }

    /// Project world points to pixels, optionally through the lens distortion.
    pub fn project_3d_to_pixel(&self, points: &[Point3<f64>], distorted: bool) -> Vec<Point2<f64>> {
        let camera_frame = self.project_3d_to_camera_frame(points);
        self.project_camera_frame_to_pixel(&camera_frame, distorted)
    }

    /// Back-project pixels to unit ray directions in the world frame.
    ///
    /// Every ray starts at [`CameraModel::camera_center`]. If `distorted` is
    /// set the pixels are undistorted first.
    pub fn project_pixel_to_3d_ray(
        &self,
        pixels: &[Point2<f64>],
        distorted: bool,
    ) -> Vec<Vector3<f64>> {
        let rectified;
        let pixels = if distorted {
            rectified = self.intrinsics.undistort(pixels);
            &rectified[..]
        } else {
            pixels
        };

        pixels
            .iter()
            .map(|pixel| {
                let (x, y) = self.intrinsics.pixel_to_normalized(pixel);
                self.extrinsics
                    .camera_to_world_direction(&Vector3::new(x, y, 1.0))
                    .normalize()
            })
            .collect()
    }

    /// Back-project pixels to world points at `distance` from the camera
    /// center along their rays.
    pub fn project_pixel_to_3d(
        &self,
        pixels: &[Point2<f64>],
        distance: f64,
        distorted: bool,
    ) -> Vec<Point3<f64>> {
        let center = self.camera_center();
        self.project_pixel_to_3d_ray(pixels, distorted)
            .into_iter()
            .map(|ray| center + ray * distance)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn simple_camera() -> CameraResult<CameraModel> {
        let intrinsics = Intrinsics::pinhole(500.0, 500.0, 320.0, 240.0)?;
        CameraModel::from_parameters(640, 480, intrinsics, Extrinsics::identity(), "cam")
    }

    #[test]
    fn test_concrete_scenario() -> CameraResult<()> {
        let cam = simple_camera()?;
        let uv = cam.project_3d_to_pixel(&[Point3::new(0.0, 0.0, 5.0)], false);
        assert_eq!(uv.len(), 1);
        assert_eq!(uv[0], Point2::new(320.0, 240.0));
        Ok(())
    }

    #[test]
    fn test_optical_axis_hits_principal_point() -> CameraResult<()> {
        let intrinsics = Intrinsics::new(
            516.4,
            516.1,
            339.2,
            227.4,
            0.7,
            Distortion::from_opencv_vec([-0.33, 0.14, 0.003, -0.004, 0.0]),
        )?;
        let cam =
            CameraModel::from_parameters(659, 494, intrinsics, Extrinsics::identity(), "cam")?;
        let points: Vec<_> = (1..=20)
            .map(|i| Point3::new(0.0, 0.0, 0.1 + i as f64 * 0.5))
            .collect();
        for uv in cam.project_3d_to_pixel(&points, false) {
            assert_relative_eq!(uv.x, cam.cx(), epsilon = 1e-12);
            assert_relative_eq!(uv.y, cam.cy(), epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_zero_image_size() -> CameraResult<()> {
        let intrinsics = Intrinsics::pinhole(500.0, 500.0, 320.0, 240.0)?;
        let res = CameraModel::from_parameters(0, 480, intrinsics, Extrinsics::identity(), "cam");
        assert!(matches!(res, Err(CameraError::InvalidParameter(_))));
        Ok(())
    }

    #[test]
    fn test_problem_pmat() -> CameraResult<()> {
        // DLT estimate with a negative determinant and a non-unit scale
        let pmat = Matrix3x4::new(
            -1.70677031e+03,
            -4.10373295e+03,
            -3.88568028e+02,
            6.89034515e+02,
            -6.19019195e+02,
            -1.01292091e+03,
            -2.67534989e+03,
            4.51847857e+02,
            -4.52548832e+00,
            -3.78900498e+00,
            -7.35860226e-01,
            1.00000000e+00,
        );
        let cam = CameraModel::from_projection_matrix(&pmat, 848, 480, "camera")?;
        assert!(cam.fx() > 0.0 && cam.fy() > 0.0);
        assert_relative_eq!(cam.intrinsic_matrix()[(2, 2)], 1.0);

        let verts = [
            Point3::new(0.042306, 0.015338, 0.036328),
            Point3::new(0.03323, 0.030344, 0.041542),
            Point3::new(0.036396, 0.026464, 0.052408),
        ];
        let actual = cam.project_3d_to_pixel(&verts, false);
        for (p, uv) in verts.iter().zip(actual.iter()) {
            let h = pmat * p.to_homogeneous();
            assert_relative_eq!(uv.x, h.x / h.z, max_relative = 1e-8);
            assert_relative_eq!(uv.y, h.y / h.z, max_relative = 1e-8);
        }
        Ok(())
    }

    #[test]
    fn test_projection_record_roundtrip() -> CameraResult<()> {
        let extrinsics = Extrinsics::from_axis_angle(
            &Vector3::new(0.1, 1.0, 0.2),
            0.4,
            Vector3::new(0.3, -0.2, 2.0),
        )?;
        let intrinsics = Intrinsics::new(510.0, 505.0, 330.0, 250.0, 0.5, Distortion::zero())?;
        let cam = CameraModel::from_parameters(640, 480, intrinsics, extrinsics, "cam")?;

        let cam2 = CameraModel::from_projection_record(&cam.to_projection_record())?;
        assert_eq!(cam2.name(), "cam");
        assert_relative_eq!(*cam2.pmat(), *cam.pmat(), max_relative = 1e-9);
        Ok(())
    }

    #[test]
    fn test_record_roundtrip_and_validation() -> CameraResult<()> {
        let extrinsics = Extrinsics::from_axis_angle(
            &Vector3::new(1.0, 0.0, 0.3),
            -0.3,
            Vector3::new(0.0, 0.5, 3.0),
        )?;
        let intrinsics = Intrinsics::new(
            520.0,
            515.0,
            320.0,
            240.0,
            0.0,
            Distortion::from_opencv_vec([-0.2, 0.05, 0.001, 0.002, 0.0]),
        )?;
        let cam = CameraModel::from_parameters(640, 480, intrinsics, extrinsics, "cam")?;

        let record = cam.to_record()?;
        let cam2 = CameraModel::from_record(&record)?;
        assert_eq!(cam2, cam);

        let mut bad_rect = record.clone();
        bad_rect.rectification_matrix = Some([[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        let res = CameraModel::from_record(&bad_rect);
        assert!(matches!(res, Err(CameraError::InvalidParameter(_))));

        let mut identity_rect = record.clone();
        identity_rect.rectification_matrix =
            Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(CameraModel::from_record(&identity_rect).is_ok());

        // a scaled projection matrix still agrees
        let mut scaled = record.clone();
        scaled.projection_matrix = Some(pmat_to_rows(&(cam.to_projection_matrix() * -2.0)));
        assert!(CameraModel::from_record(&scaled).is_ok());

        let mut bad_pmat = record;
        if let Some(p) = bad_pmat.projection_matrix.as_mut() {
            p[0][3] += 50.0;
        }
        let res = CameraModel::from_record(&bad_pmat);
        assert!(matches!(res, Err(CameraError::InvalidParameter(_))));
        Ok(())
    }

    #[test]
    fn test_pixel_to_3d_at_distance() -> CameraResult<()> {
        let cam = simple_camera()?;
        let pts = cam.project_pixel_to_3d(&[Point2::new(320.0, 240.0)], 2.5, false);
        assert_relative_eq!(pts[0], Point3::new(0.0, 0.0, 2.5), epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_from_pose() -> CameraResult<()> {
        let eye = Point3::new(0.0, 0.0, 5.0);
        let lookat = Point3::new(0.0, 1.0, 5.0);
        let cam = CameraModel::from_pose(90.0, &eye, &lookat, None, 640, 480)?;
        assert_eq!(cam.name(), "simple");
        assert_relative_eq!(cam.fx(), 320.0, epsilon = 1e-9);
        assert_relative_eq!(cam.camera_center(), eye, epsilon = 1e-12);

        let uv = cam.project_3d_to_pixel(&[Point3::new(0.0, 10.0, 5.0)], false);
        assert_relative_eq!(uv[0], Point2::new(320.0, 240.0), epsilon = 1e-9);

        let res = CameraModel::from_pose(180.0, &eye, &lookat, None, 640, 480);
        assert!(matches!(res, Err(CameraError::InvalidParameter(_))));
        Ok(())
    }

    #[test]
    fn test_flipped_camera_has_no_record() -> CameraResult<()> {
        let cam = simple_camera()?;
        let flipped = cam.flip()?;
        let res = flipped.to_record();
        assert!(matches!(res, Err(CameraError::UnsupportedOperation(_))));

        // the projection matrix still describes the flipped camera
        let rebuilt = CameraModel::from_projection_record(&flipped.to_projection_record())?;
        let p = [Point3::new(0.3, -0.2, 4.0)];
        assert_relative_eq!(
            rebuilt.project_3d_to_pixel(&p, false)[0],
            flipped.project_3d_to_pixel(&p, false)[0],
            epsilon = 1e-6
        );
        Ok(())
    }
}
