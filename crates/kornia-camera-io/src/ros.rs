//! ROS `camera_info` YAML intrinsics files, as written by the ROS camera
//! calibrator.
//!
//! The files carry no pose, so cameras read from them sit at the world origin.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use kornia_camera::{CameraModel, CameraRecord, RotationRecord};
use serde::{Deserialize, Serialize};

use crate::error::CameraIoError;

/// The only distortion model understood by this crate.
pub const PLUMB_BOB: &str = "plumb_bob";

/// A row-major matrix as stored in `camera_info` files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosMatrix {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Row-major values.
    pub data: Vec<f64>,
}

impl RosMatrix {
    fn from_rows<const C: usize>(rows: &[[f64; C]]) -> Self {
        Self {
            rows: rows.len(),
            cols: C,
            data: rows.iter().flatten().copied().collect(),
        }
    }

    fn check_size(&self, name: &str, rows: usize, cols: usize) -> Result<(), CameraIoError> {
        if self.rows != rows || self.cols != cols || self.data.len() != rows * cols {
            return Err(CameraIoError::BadMatrixSize {
                name: name.to_string(),
                expected_rows: rows,
                expected_cols: cols,
                rows: self.rows,
                cols: self.cols,
                len: self.data.len(),
            });
        }
        Ok(())
    }

    fn to_3x3(&self, name: &str) -> Result<[[f64; 3]; 3], CameraIoError> {
        self.check_size(name, 3, 3)?;
        let mut m = [[0.0; 3]; 3];
        for (row, chunk) in m.iter_mut().zip(self.data.chunks_exact(3)) {
            row.copy_from_slice(chunk);
        }
        Ok(m)
    }
}

/// Layout of a ROS `camera_info` YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosCameraInfo {
    /// Image width in pixels.
    pub image_width: usize,
    /// Image height in pixels.
    pub image_height: usize,
    /// Camera name.
    pub camera_name: String,
    /// 3x3 intrinsic matrix.
    pub camera_matrix: RosMatrix,
    /// Distortion model name, `plumb_bob`.
    pub distortion_model: String,
    /// 1x5 distortion coefficients `[k1, k2, p1, p2, k3]`.
    pub distortion_coefficients: RosMatrix,
    /// 3x3 stereo rectification matrix.
    pub rectification_matrix: RosMatrix,
    /// 3x4 projection matrix of the rectified image.
    pub projection_matrix: RosMatrix,
}

impl RosCameraInfo {
    /// Intrinsics of `camera` in `camera_info` layout.
    ///
    /// The rectified projection is `[K | 0]`, since no stereo rectification is
    /// modelled. Fails like [`CameraModel::to_record`] for a flipped camera.
    pub fn from_camera(camera: &CameraModel) -> Result<Self, CameraIoError> {
        let record = camera.to_record()?;
        let k = record.intrinsic_matrix;
        let projection = k.map(|[a, b, c]| [a, b, c, 0.0]);
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

        Ok(Self {
            image_width: record.width,
            image_height: record.height,
            camera_name: record.name,
            camera_matrix: RosMatrix::from_rows(&k),
            distortion_model: PLUMB_BOB.to_string(),
            distortion_coefficients: RosMatrix::from_rows(&[record.distortion]),
            rectification_matrix: RosMatrix::from_rows(&identity),
            projection_matrix: RosMatrix::from_rows(&projection),
        })
    }

    /// Camera at the world origin with these intrinsics.
    pub fn to_camera(&self) -> Result<CameraModel, CameraIoError> {
        if self.distortion_model != PLUMB_BOB {
            return Err(CameraIoError::UnknownDistortionModel(
                self.distortion_model.clone(),
            ));
        }
        self.distortion_coefficients
            .check_size("distortion_coefficients", 1, 5)?;
        self.projection_matrix.check_size("projection_matrix", 3, 4)?;

        let mut distortion = [0.0; 5];
        distortion.copy_from_slice(&self.distortion_coefficients.data);

        let record = CameraRecord {
            name: self.camera_name.clone(),
            width: self.image_width,
            height: self.image_height,
            intrinsic_matrix: self.camera_matrix.to_3x3("camera_matrix")?,
            distortion,
            rectification_matrix: Some(self.rectification_matrix.to_3x3("rectification_matrix")?),
            projection_matrix: None,
            rotation: RotationRecord::Matrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            translation: [0.0; 3],
        };
        Ok(CameraModel::from_record(&record)?)
    }
}

/// Write the intrinsics of a camera as a ROS `camera_info` YAML file.
///
/// The pose of the camera is not stored.
pub fn write_intrinsics_yaml(
    path: impl AsRef<Path>,
    camera: &CameraModel,
) -> Result<(), CameraIoError> {
    let path = path.as_ref();
    log::debug!("writing intrinsics of '{}' to {}", camera.name(), path.display());
    let info = RosCameraInfo::from_camera(camera)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(&mut writer, &info)?;
    writer.flush()?;
    Ok(())
}

/// Read a camera at the world origin from a ROS `camera_info` YAML file.
pub fn read_intrinsics_yaml(path: impl AsRef<Path>) -> Result<CameraModel, CameraIoError> {
    let path = path.as_ref();
    log::debug!("reading intrinsics from {}", path.display());
    from_ros_yaml(BufReader::new(File::open(path)?))
}

/// Parse a camera at the world origin from ROS `camera_info` YAML.
pub fn from_ros_yaml(reader: impl Read) -> Result<CameraModel, CameraIoError> {
    let info: RosCameraInfo = serde_yaml::from_reader(reader)?;
    info.to_camera()
}
