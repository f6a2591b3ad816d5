use nalgebra::{Matrix3, Matrix3x4, Vector3};

use crate::error::{CameraError, CameraResult};

/// Maximum deviation of `R^T R` from identity (and of `det R` from one) for a
/// matrix to be accepted as a rotation.
pub const ROTATION_TOL: f64 = 1e-6;

/// Minimum norm of `forward x up` (both unit length) for a view basis.
pub const PARALLEL_TOL: f64 = 1e-9;

/// Relative threshold below which the left 3x3 block of a projection matrix
/// is considered rank deficient.
pub const RANK_TOL: f64 = 1e-12;

/// Check that a matrix is a proper rotation: orthonormal with determinant +1.
pub fn is_rotation_matrix(m: &Matrix3<f64>, tol: f64) -> bool {
    if m.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let err = (m.transpose() * m - Matrix3::identity()).amax();
    err <= tol && (m.determinant() - 1.0).abs() <= tol
}

/// Split a finite projection matrix `P = K [R | t]`.
///
/// Normalization, applied in this order:
/// 1. if the left block `M` has a negative determinant, `P` is negated;
/// 2. `M = K R` with `K` upper triangular, obtained from the QR factorization
///    of `M^-1`;
/// 3. signs are moved between `K` and `R` so that `K` has a positive diagonal;
/// 4. `K` is scaled so that `K[(2, 2)] == 1` and `t = K^-1 p4` with the
///    un-normalized `K`.
///
/// The returned camera reproduces the projective mapping of `P` but not
/// necessarily its scale.
pub fn decompose_projection_matrix(
    pmat: &Matrix3x4<f64>,
) -> CameraResult<(Matrix3<f64>, Matrix3<f64>, Vector3<f64>)> {
    if pmat.iter().any(|v| !v.is_finite()) {
        return Err(CameraError::InvalidParameter(
            "projection matrix contains non-finite values".to_string(),
        ));
    }

    let mut m: Matrix3<f64> = pmat.fixed_view::<3, 3>(0, 0).into_owned();
    let mut p4: Vector3<f64> = pmat.column(3).into_owned();

    let scale = m.amax();
    let det = m.determinant();
    if scale == 0.0 || det.abs() <= RANK_TOL * scale.powi(3) {
        return Err(CameraError::InvalidParameter(format!(
            "projection matrix left 3x3 block is rank deficient (det = {det:e})"
        )));
    }

    if det < 0.0 {
        log::debug!("negating projection matrix with negative determinant {det:e}");
        m = -m;
        p4 = -p4;
    }

    let m_inv = m.try_inverse().ok_or_else(|| {
        CameraError::InvalidParameter("projection matrix left 3x3 block is singular".to_string())
    })?;

    // M^-1 = Q U  =>  M = U^-1 Q^T
    let qr = m_inv.qr();
    let mut rotation = qr.q().transpose();
    let mut k = qr.r().try_inverse().ok_or_else(|| {
        CameraError::InvalidParameter("triangular factor is not invertible".to_string())
    })?;

    // move the signs of the diagonal of K into R
    for i in 0..3 {
        if k[(i, i)] < 0.0 {
            k.column_mut(i).neg_mut();
            rotation.row_mut(i).neg_mut();
        }
    }

    let k22 = k[(2, 2)];
    if !k22.is_normal() {
        return Err(CameraError::InvalidParameter(format!(
            "projection matrix cannot be normalized, K[2][2] = {k22:e}"
        )));
    }

    let translation = k.try_inverse().ok_or_else(|| {
        CameraError::InvalidParameter("intrinsic factor is not invertible".to_string())
    })? * p4;

    let k = k / k22;
    // the lower triangle is zero up to round-off; make it exact
    let k = Matrix3::new(
        k[(0, 0)],
        k[(0, 1)],
        k[(0, 2)],
        0.0,
        k[(1, 1)],
        k[(1, 2)],
        0.0,
        0.0,
        1.0,
    );

    if !is_rotation_matrix(&rotation, ROTATION_TOL) {
        return Err(CameraError::InvalidParameter(
            "decomposed rotation is not a proper rotation".to_string(),
        ));
    }

    Ok((k, rotation, translation))
}

/// Compose a projection matrix `K [R | t]`.
pub fn compose_projection_matrix(
    k: &Matrix3<f64>,
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
) -> Matrix3x4<f64> {
    let mut rt = Matrix3x4::zeros();
    rt.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    rt.set_column(3, translation);
    k * rt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::axis_angle_to_rotation_matrix;
    use approx::assert_relative_eq;

    #[test]
    fn test_is_rotation_matrix() {
        assert!(is_rotation_matrix(&Matrix3::identity(), ROTATION_TOL));
        // reflection is orthonormal but improper
        let reflection = Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, 1.0));
        assert!(!is_rotation_matrix(&reflection, ROTATION_TOL));
        let scaled = Matrix3::identity() * 2.0;
        assert!(!is_rotation_matrix(&scaled, ROTATION_TOL));
    }

    #[test]
    fn test_decompose_recovers_parameters() -> Result<(), Box<dyn std::error::Error>> {
        let k = Matrix3::new(520.0, 1.5, 320.0, 0.0, 510.0, 240.0, 0.0, 0.0, 1.0);
        let rotation = axis_angle_to_rotation_matrix(&Vector3::new(0.2, 1.0, -0.3), 0.7)?;
        let translation = Vector3::new(0.1, -0.2, 3.0);
        let pmat = compose_projection_matrix(&k, &rotation, &translation);

        let (k2, rotation2, translation2) = decompose_projection_matrix(&pmat)?;
        assert_relative_eq!(k2, k, epsilon = 1e-8);
        assert_relative_eq!(rotation2, rotation, epsilon = 1e-10);
        assert_relative_eq!(translation2, translation, epsilon = 1e-10);

        // scaled and negated pmat describes the same camera
        let (k3, rotation3, translation3) = decompose_projection_matrix(&(pmat * -3.5))?;
        assert_relative_eq!(k3, k, epsilon = 1e-8);
        assert_relative_eq!(rotation3, rotation, epsilon = 1e-10);
        assert_relative_eq!(translation3, translation, epsilon = 1e-10);
        Ok(())
    }

    #[test]
    fn test_decompose_rank_deficient() {
        let pmat = Matrix3x4::new(1.0, 2.0, 3.0, 4.0, 2.0, 4.0, 6.0, 8.0, 0.0, 0.0, 1.0, 1.0);
        let res = decompose_projection_matrix(&pmat);
        assert!(matches!(res, Err(CameraError::InvalidParameter(_))));

        let res = decompose_projection_matrix(&Matrix3x4::zeros());
        assert!(matches!(res, Err(CameraError::InvalidParameter(_))));
    }

    #[test]
    fn test_decompose_non_finite() {
        let mut pmat = Matrix3x4::identity();
        pmat[(0, 3)] = f64::NAN;
        let res = decompose_projection_matrix(&pmat);
        assert!(matches!(res, Err(CameraError::InvalidParameter(_))));
    }
}
