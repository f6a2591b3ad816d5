#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for the camera io module.
pub mod error;

/// JSON camera and projection records.
pub mod json;

/// Plain text projection matrices.
pub mod pmat_txt;

/// ROS `camera_info` YAML intrinsics.
pub mod ros;

pub use error::CameraIoError;
