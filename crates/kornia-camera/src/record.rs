use serde::{Deserialize, Serialize};

/// Minimal interchange form of a camera: a raw projection matrix plus image
/// metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRecord {
    /// Camera name.
    pub name: String,
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Row-major 3x4 projection matrix.
    pub pmat: [[f64; 4]; 3],
}

/// A rotation as carried by interchange records, either a row-major matrix
/// or a quaternion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RotationRecord {
    /// Row-major 3x3 rotation matrix.
    Matrix([[f64; 3]; 3]),
    /// Quaternion with scalar part `w`.
    Quaternion {
        /// i component.
        x: f64,
        /// j component.
        y: f64,
        /// k component.
        z: f64,
        /// Scalar component.
        w: f64,
    },
}

/// Pose-only interchange record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicsRecord {
    /// World-to-camera translation.
    pub translation: [f64; 3],
    /// World-to-camera rotation.
    pub rotation: RotationRecord,
}

/// Full parameter record of a camera.
///
/// Matrices are row-major. A missing rectification matrix means identity; a
/// present projection matrix must agree with `K [R | t]` up to scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    /// Camera name.
    pub name: String,
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// 3x3 intrinsic matrix `K`.
    pub intrinsic_matrix: [[f64; 3]; 3],
    /// Distortion coefficients `[k1, k2, p1, p2, k3]`.
    pub distortion: [f64; 5],
    /// Stereo rectification matrix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rectification_matrix: Option<[[f64; 3]; 3]>,
    /// 3x4 projection matrix `K [R | t]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_matrix: Option<[[f64; 4]; 3]>,
    /// World-to-camera rotation.
    pub rotation: RotationRecord,
    /// World-to-camera translation.
    pub translation: [f64; 3],
}
