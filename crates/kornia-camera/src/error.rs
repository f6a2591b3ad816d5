/// Error types for camera construction and geometric operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CameraError {
    /// Malformed input to a constructor (non-orthonormal rotation, non-positive
    /// dimensions or focal lengths, rank-deficient projection matrix).
    #[error("Invalid camera parameter: {0}")]
    InvalidParameter(String),

    /// The requested geometric construction has no valid solution.
    #[error("Degenerate camera geometry: {0}")]
    DegenerateGeometry(String),

    /// The operation is not defined for this camera configuration.
    #[error("Unsupported camera operation: {0}")]
    UnsupportedOperation(String),
}

/// Result type for camera operations.
pub type CameraResult<T> = Result<T, CameraError>;
