#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Camera model and the projection pipeline.
pub mod camera;

/// Brown-Conrady lens distortion.
pub mod distortion;

/// Error types for the camera module.
pub mod error;

/// Camera pose.
pub mod extrinsics;

/// Intrinsic camera parameters.
pub mod intrinsics;

/// Linear algebra utilities.
pub mod linalg;

/// Interchange records.
pub mod record;

/// Rotation representation conversions.
pub mod transforms;

/// Derived cameras: mirror, flip and look-at views.
pub mod view;

pub use camera::CameraModel;
pub use distortion::{Distortion, UndistortParams};
pub use error::{CameraError, CameraResult};
pub use extrinsics::Extrinsics;
pub use intrinsics::Intrinsics;
pub use record::{CameraRecord, ExtrinsicsRecord, ProjectionRecord, RotationRecord};
pub use view::{MirrorAxis, View};
