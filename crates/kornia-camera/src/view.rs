use std::str::FromStr;

use nalgebra::{Matrix3, Point3, Vector3};

use crate::camera::CameraModel;
use crate::error::{CameraError, CameraResult};
use crate::extrinsics::Extrinsics;
use crate::intrinsics::Intrinsics;
use crate::linalg::{PARALLEL_TOL, RANK_TOL};

/// Image axis to reflect about in [`CameraModel::mirror`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAxis {
    /// Left-right reflection, `u' = width - u`.
    LeftRight,
    /// Up-down reflection, `v' = height - v`.
    UpDown,
}

impl FromStr for MirrorAxis {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lr" => Ok(MirrorAxis::LeftRight),
            "ud" => Ok(MirrorAxis::UpDown),
            _ => Err(CameraError::InvalidParameter(format!(
                "unknown mirror axis '{s}', expected 'lr' or 'ud'"
            ))),
        }
    }
}

/// A look-at pose: optical center, a point on the optical axis and the image
/// up direction, all in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    /// Optical center.
    pub eye: Point3<f64>,
    /// Point one unit along the optical axis.
    pub lookat: Point3<f64>,
    /// Unit up direction, orthogonal to the optical axis.
    pub up: Vector3<f64>,
}

/// Reverses the camera y and z axes.
fn reflect_yz() -> Matrix3<f64> {
    Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0))
}

/// Reverses the camera x and z axes.
fn reflect_xz() -> Matrix3<f64> {
    Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, -1.0))
}

impl CameraModel {
    /// Camera whose image is the reflection of this one about `axis`.
    ///
    /// For every world point the mirrored camera yields `u' = width - u`
    /// (left-right) or `v' = height - v` (up-down), with or without lens
    /// distortion. The camera center is kept; the optical axis is reversed and
    /// the focal lengths stay positive.
    pub fn mirror(&self, axis: MirrorAxis) -> CameraResult<Self> {
        let intr = self.intrinsics();
        let (d, intrinsics) = match axis {
            MirrorAxis::LeftRight => (
                reflect_yz(),
                Intrinsics::from_parts(
                    intr.fx(),
                    intr.fy(),
                    self.width() as f64 - intr.cx(),
                    intr.cy(),
                    -intr.skew(),
                    intr.distortion().mirrored_x(),
                ),
            ),
            MirrorAxis::UpDown => (
                reflect_xz(),
                Intrinsics::from_parts(
                    intr.fx(),
                    intr.fy(),
                    intr.cx(),
                    self.height() as f64 - intr.cy(),
                    -intr.skew(),
                    intr.distortion().mirrored_y(),
                ),
            ),
        };
        if !intrinsics.is_finite() {
            return Err(CameraError::DegenerateGeometry(
                "mirrored intrinsics are not finite".to_string(),
            ));
        }
        let name = format!("{}_mirror", self.name());
        Ok(Self::from_parts(
            name,
            self.width(),
            self.height(),
            intrinsics,
            self.extrinsics().premultiplied(&d),
        ))
    }

    /// Projective dual camera: same center, opposite viewing direction, and
    /// the same pixel for every world point.
    ///
    /// The dual carries a negative `fx`, so it is only reachable through this
    /// method and has no parameter record. Its projection matrix can still be
    /// exported with [`CameraModel::to_projection_record`].
    ///
    /// # Errors
    ///
    /// [`CameraError::UnsupportedOperation`] if the projection matrix is not
    /// finite or its left 3x3 block is singular.
    pub fn flip(&self) -> CameraResult<Self> {
        let pmat = self.pmat();
        let m = pmat.fixed_view::<3, 3>(0, 0);
        let scale = m.amax();
        if pmat.iter().any(|v| !v.is_finite())
            || scale == 0.0
            || m.determinant().abs() <= RANK_TOL * scale.powi(3)
        {
            return Err(CameraError::UnsupportedOperation(format!(
                "camera '{}' has no finite projective dual",
                self.name()
            )));
        }

        let intr = self.intrinsics();
        let intrinsics = Intrinsics::from_parts(
            -intr.fx(),
            intr.fy(),
            intr.cx(),
            intr.cy(),
            intr.skew(),
            intr.distortion().mirrored_x(),
        );
        let name = format!("{}_flip", self.name());
        Ok(Self::from_parts(
            name,
            self.width(),
            self.height(),
            intrinsics,
            self.extrinsics().premultiplied(&reflect_yz()),
        ))
    }

    /// Same intrinsics, re-posed so that the camera sits at `eye`, looks at
    /// `lookat` and has `up` pointing up in the image.
    ///
    /// # Errors
    ///
    /// [`CameraError::DegenerateGeometry`] if `eye == lookat`, `up` is zero or
    /// `up` is parallel to the viewing direction.
    pub fn with_view(
        &self,
        eye: &Point3<f64>,
        lookat: &Point3<f64>,
        up: &Vector3<f64>,
    ) -> CameraResult<Self> {
        let forward = (lookat - eye)
            .try_normalize(0.0)
            .filter(|v| v.iter().all(|c| c.is_finite()))
            .ok_or_else(|| {
                CameraError::DegenerateGeometry(format!(
                    "eye {eye} and lookat {lookat} do not define a viewing direction"
                ))
            })?;
        let up = up
            .try_normalize(0.0)
            .filter(|v| v.iter().all(|c| c.is_finite()))
            .ok_or_else(|| {
                CameraError::DegenerateGeometry("up vector must be non-zero".to_string())
            })?;

        let side = forward.cross(&up);
        if side.norm() <= PARALLEL_TOL {
            return Err(CameraError::DegenerateGeometry(format!(
                "up vector {up} is parallel to the viewing direction {forward}"
            )));
        }
        let right = side.normalize();
        let true_up = right.cross(&forward);

        let rotation = Matrix3::from_rows(&[
            right.transpose(),
            (-true_up).transpose(),
            forward.transpose(),
        ]);
        let extrinsics = Extrinsics::from_camera_center(rotation, eye)?;

        Ok(Self::from_parts(
            self.name().to_string(),
            self.width(),
            self.height(),
            self.intrinsics().clone(),
            extrinsics,
        ))
    }

    /// The look-at pose of this camera, the inverse of
    /// [`CameraModel::with_view`].
    pub fn get_view(&self) -> View {
        let eye = self.camera_center();
        let ext = self.extrinsics();
        let forward = ext.camera_to_world_direction(&Vector3::z());
        let up = -ext.camera_to_world_direction(&Vector3::y());
        View {
            eye,
            lookat: eye + forward,
            up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::Distortion;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn camera() -> CameraResult<CameraModel> {
        let intrinsics = Intrinsics::new(
            516.4,
            516.1,
            339.2,
            227.4,
            0.3,
            Distortion::from_opencv_vec([-0.33, 0.14, 0.003, -0.004, 0.0]),
        )?;
        let extrinsics = Extrinsics::from_axis_angle(
            &Vector3::new(0.2, 1.0, 0.1),
            0.3,
            Vector3::new(0.1, -0.3, 1.5),
        )?;
        CameraModel::from_parameters(659, 494, intrinsics, extrinsics, "cam")
    }

    #[test]
    fn test_mirror_axis_from_str() {
        assert_eq!("lr".parse::<MirrorAxis>(), Ok(MirrorAxis::LeftRight));
        assert_eq!("ud".parse::<MirrorAxis>(), Ok(MirrorAxis::UpDown));
        assert!(matches!(
            "xy".parse::<MirrorAxis>(),
            Err(CameraError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_mirror_keeps_center() -> CameraResult<()> {
        let cam = camera()?;
        for axis in [MirrorAxis::LeftRight, MirrorAxis::UpDown] {
            let mirrored = cam.mirror(axis)?;
            assert_relative_eq!(mirrored.camera_center(), cam.camera_center(), epsilon = 1e-12);
            assert!(mirrored.fx() > 0.0 && mirrored.fy() > 0.0);
        }
        Ok(())
    }

    #[test]
    fn test_mirror_left_right_pixel() -> CameraResult<()> {
        let cam = camera()?;
        let mirrored = cam.mirror(MirrorAxis::LeftRight)?;
        let p = [Point3::new(0.2, -0.1, 3.0)];
        for distorted in [false, true] {
            let uv = cam.project_3d_to_pixel(&p, distorted)[0];
            let uv_m = mirrored.project_3d_to_pixel(&p, distorted)[0];
            assert_relative_eq!(uv_m, Point2::new(659.0 - uv.x, uv.y), epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_flip_same_pixels() -> CameraResult<()> {
        let cam = camera()?;
        let flipped = cam.flip()?;
        assert_relative_eq!(flipped.camera_center(), cam.camera_center(), epsilon = 1e-12);
        assert!((flipped.rotation() - cam.rotation()).amax() > 0.1);

        let view = cam.get_view();
        let flipped_view = flipped.get_view();
        assert_relative_eq!(
            flipped_view.lookat - flipped_view.eye,
            view.eye - view.lookat,
            epsilon = 1e-12
        );

        let pts = [Point3::new(0.04, 0.015, 0.03), Point3::new(1.0, 2.0, 3.0)];
        for distorted in [false, true] {
            let expected = cam.project_3d_to_pixel(&pts, distorted);
            let actual = flipped.project_3d_to_pixel(&pts, distorted);
            for (a, b) in expected.iter().zip(actual.iter()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn test_flip_rejects_unrepresentable_pmat() -> CameraResult<()> {
        // fx * tx overflows the last column of the projection matrix
        let intrinsics = Intrinsics::new(1e308, 1e308, 320.0, 240.0, 0.0, Distortion::zero())?;
        let extrinsics = Extrinsics::from_matrix(Matrix3::identity(), Vector3::new(10.0, 0.0, 1.0))?;
        let cam = CameraModel::from_parameters(640, 480, intrinsics, extrinsics, "huge")?;
        assert!(cam.pmat().iter().any(|v| !v.is_finite()));
        assert!(matches!(cam.flip(), Err(CameraError::UnsupportedOperation(_))));

        // the focal block underflows to a singular matrix
        let intrinsics = Intrinsics::new(1e-300, 1e-300, 320.0, 240.0, 0.0, Distortion::zero())?;
        let cam = CameraModel::from_parameters(640, 480, intrinsics, Extrinsics::identity(), "tiny")?;
        assert!(matches!(cam.flip(), Err(CameraError::UnsupportedOperation(_))));
        Ok(())
    }

    #[test]
    fn test_view_roundtrip() -> CameraResult<()> {
        let cam = camera()?;
        let eye = Point3::new(10.0, 20.0, 30.0);
        let lookat = Point3::new(11.0, 20.0, 30.0);
        let up = Vector3::new(0.0, -1.0, 0.0);
        let view = cam.with_view(&eye, &lookat, &up)?.get_view();
        assert_relative_eq!(view.eye, eye, epsilon = 1e-12);
        assert_relative_eq!(view.lookat, lookat, epsilon = 1e-12);
        assert_relative_eq!(view.up, up, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_view_degenerate() -> CameraResult<()> {
        let cam = camera()?;
        let eye = Point3::new(0.0, 0.0, 5.0);
        let lookat = Point3::new(0.0, 1.0, 5.0);

        let res = cam.with_view(&eye, &lookat, &Vector3::new(0.0, -1.0, 0.0));
        assert!(matches!(res, Err(CameraError::DegenerateGeometry(_))));

        let res = cam.with_view(&eye, &lookat, &Vector3::zeros());
        assert!(matches!(res, Err(CameraError::DegenerateGeometry(_))));

        let res = cam.with_view(&eye, &eye, &Vector3::z());
        assert!(matches!(res, Err(CameraError::DegenerateGeometry(_))));
        Ok(())
    }
}
