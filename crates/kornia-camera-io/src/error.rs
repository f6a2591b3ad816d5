use kornia_camera::CameraError;

/// An error type for the camera io module.
#[derive(thiserror::Error, Debug)]
pub enum CameraIoError {
    /// Error to read or write the file.
    #[error("Failed to manipulate the file. {0}")]
    Io(#[from] std::io::Error),

    /// Error to encode or decode JSON.
    #[error("Failed to (de)serialize JSON. {0}")]
    Json(#[from] serde_json::Error),

    /// Error to encode or decode YAML.
    #[error("Failed to (de)serialize YAML. {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The file content does not describe a valid camera.
    #[error("Invalid camera. {0}")]
    Camera(#[from] CameraError),

    /// A matrix has the wrong shape or number of values.
    #[error("Matrix '{name}' must be {expected_rows}x{expected_cols}, got {rows}x{cols} with {len} values")]
    BadMatrixSize {
        /// Field name of the matrix.
        name: String,
        /// Expected number of rows.
        expected_rows: usize,
        /// Expected number of columns.
        expected_cols: usize,
        /// Declared number of rows.
        rows: usize,
        /// Declared number of columns.
        cols: usize,
        /// Number of values present.
        len: usize,
    },

    /// Only the `plumb_bob` distortion model is supported.
    #[error("Unsupported distortion model: {0}")]
    UnknownDistortionModel(String),

    /// Parse error
    #[error("Parse error {0}")]
    Parse(String),
}
