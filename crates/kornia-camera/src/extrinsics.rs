use nalgebra::{Matrix3, Point3, Quaternion, UnitQuaternion, Vector3};

use crate::error::{CameraError, CameraResult};
use crate::linalg::{is_rotation_matrix, ROTATION_TOL};
use crate::record::{ExtrinsicsRecord, RotationRecord};
use crate::transforms;

/// Pose of a camera in the world frame.
///
/// The rotation and translation map **world** coordinates into the
/// **camera** frame: `p_cam = R * p_world + t`.
#[derive(Debug, Clone, PartialEq)]
pub struct Extrinsics {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl Extrinsics {
    /// Camera at the world origin looking along +Z.
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Create extrinsics from a world-to-camera rotation matrix and translation.
    ///
    /// # Errors
    ///
    /// [`CameraError::InvalidParameter`] if the rotation is not orthonormal with
    /// determinant +1, or if the translation is not finite.
    pub fn from_matrix(rotation: Matrix3<f64>, translation: Vector3<f64>) -> CameraResult<Self> {
        if !is_rotation_matrix(&rotation, ROTATION_TOL) {
            return Err(CameraError::InvalidParameter(format!(
                "rotation is not orthonormal with determinant +1: {rotation}"
            )));
        }
        if translation.iter().any(|v| !v.is_finite()) {
            return Err(CameraError::InvalidParameter(
                "translation must be finite".to_string(),
            ));
        }
        Ok(Self {
            rotation,
            translation,
        })
    }

    /// Create extrinsics from a world-to-camera quaternion and translation.
    pub fn from_quaternion(
        quaternion: &Quaternion<f64>,
        translation: Vector3<f64>,
    ) -> CameraResult<Self> {
        let rotation = transforms::quaternion_to_rotation_matrix(quaternion)?;
        Self::from_matrix(rotation, translation)
    }

    /// Create extrinsics from a world-to-camera axis-angle rotation and translation.
    pub fn from_axis_angle(
        axis: &Vector3<f64>,
        angle: f64,
        translation: Vector3<f64>,
    ) -> CameraResult<Self> {
        let rotation = transforms::axis_angle_to_rotation_matrix(axis, angle)?;
        Self::from_matrix(rotation, translation)
    }

    /// Create extrinsics from a world-to-camera rotation and the camera center
    /// in world coordinates.
    pub fn from_camera_center(
        rotation: Matrix3<f64>,
        center: &Point3<f64>,
    ) -> CameraResult<Self> {
        let translation = -(rotation * center.coords);
        Self::from_matrix(rotation, translation)
    }

    /// Parse the extrinsics-only interchange record.
    pub fn from_record(record: &ExtrinsicsRecord) -> CameraResult<Self> {
        let translation = Vector3::from(record.translation);
        match &record.rotation {
            RotationRecord::Matrix(m) => Self::from_matrix(matrix3_from_rows(m), translation),
            RotationRecord::Quaternion { x, y, z, w } => {
                Self::from_quaternion(&Quaternion::new(*w, *x, *y, *z), translation)
            }
        }
    }

    /// Export the extrinsics-only interchange record, with the rotation as a
    /// quaternion.
    pub fn to_record(&self) -> ExtrinsicsRecord {
        let q = self.quaternion();
        ExtrinsicsRecord {
            translation: self.translation.into(),
            rotation: RotationRecord::Quaternion {
                x: q.i,
                y: q.j,
                z: q.k,
                w: q.w,
            },
        }
    }

    /// World-to-camera rotation matrix.
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// World-to-camera translation.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// World-to-camera rotation as a unit quaternion.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        transforms::rotation_matrix_to_quaternion(&self.rotation)
    }

    /// World-to-camera rotation as a unit axis and an angle in radians.
    pub fn axis_angle(&self) -> (Vector3<f64>, f64) {
        transforms::rotation_matrix_to_axis_angle(&self.rotation)
    }

    /// Position of the optical center in world coordinates, `-R^T t`.
    pub fn camera_center(&self) -> Point3<f64> {
        Point3::from(-(self.rotation.transpose() * self.translation))
    }

    /// Transform a world point into the camera frame.
    pub fn world_to_camera(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    /// Transform a camera frame point into the world frame.
    pub fn camera_to_world(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.transpose() * (point.coords - self.translation))
    }

    /// Rotate a camera frame direction into the world frame.
    pub fn camera_to_world_direction(&self, direction: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * direction
    }

    /// Left-multiply rotation and translation by `d`, which keeps the camera
    /// center fixed. `d` must be a proper rotation.
    pub(crate) fn premultiplied(&self, d: &Matrix3<f64>) -> Self {
        Self {
            rotation: d * self.rotation,
            translation: d * self.translation,
        }
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::identity()
    }
}

pub(crate) fn matrix3_from_rows(rows: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| rows[i][j])
}

pub(crate) fn matrix3_to_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    let mut rows = [[0.0; 3]; 3];
    for (i, row) in rows.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = m[(i, j)];
        }
    }
    rows
}
