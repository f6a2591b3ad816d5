use nalgebra::{Matrix3, Quaternion, Rotation3, Unit, UnitQuaternion, Vector3};

use crate::error::{CameraError, CameraResult};

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. It does not need to be normalized.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The rotation matrix, or an error if the axis has zero length.
///
/// Example:
///
/// ```
/// use kornia_camera::transforms::axis_angle_to_rotation_matrix;
/// use nalgebra::{Matrix3, Vector3};
///
/// let axis = Vector3::new(1.0, 0.0, 0.0);
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// let expected = Matrix3::new(1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0);
/// assert!((rotation - expected).norm() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &Vector3<f64>,
    angle: f64,
) -> CameraResult<Matrix3<f64>> {
    let magnitude = axis.norm();
    if !magnitude.is_finite() || magnitude < 1e-10 || !angle.is_finite() {
        return Err(CameraError::InvalidParameter(
            "cannot compute rotation matrix from a zero or non-finite axis".to_string(),
        ));
    }
    let axis = Unit::new_normalize(*axis);
    Ok(Rotation3::from_axis_angle(&axis, angle).into_inner())
}

/// Recover a unit axis and an angle in `[0, pi]` from a rotation matrix.
///
/// PRECONDITION: `rotation` is orthonormal with a positive determinant.
///
/// The identity rotation has no defined axis; the x axis is returned together
/// with a zero angle.
pub fn rotation_matrix_to_axis_angle(rotation: &Matrix3<f64>) -> (Vector3<f64>, f64) {
    match Rotation3::from_matrix_unchecked(*rotation).axis_angle() {
        Some((axis, angle)) => (axis.into_inner(), angle),
        None => (Vector3::x(), 0.0),
    }
}

/// Convert a quaternion to a rotation matrix.
///
/// The quaternion is normalized first, so only its direction matters. A zero
/// quaternion is rejected.
pub fn quaternion_to_rotation_matrix(quaternion: &Quaternion<f64>) -> CameraResult<Matrix3<f64>> {
    let norm = quaternion.norm();
    if !norm.is_finite() || norm < 1e-10 {
        return Err(CameraError::InvalidParameter(format!(
            "quaternion must have a finite, non-zero norm, got {norm}"
        )));
    }
    let unit = UnitQuaternion::from_quaternion(*quaternion);
    Ok(unit.to_rotation_matrix().into_inner())
}

/// Convert a rotation matrix to a unit quaternion.
///
/// PRECONDITION: `rotation` is orthonormal with a positive determinant.
pub fn rotation_matrix_to_quaternion(rotation: &Matrix3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*rotation))
}
