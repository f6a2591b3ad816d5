use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use kornia_camera::{CameraModel, CameraRecord, ProjectionRecord};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CameraIoError;

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CameraIoError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CameraIoError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write the full parameter record of a camera as pretty JSON.
///
/// # Arguments
///
/// * `path` - The path to the output file.
/// * `camera` - The camera to write.
///
/// Cameras without a parameter record (see [`CameraModel::to_record`]) are
/// rejected before the file is created.
pub fn write_camera(path: impl AsRef<Path>, camera: &CameraModel) -> Result<(), CameraIoError> {
    let path = path.as_ref();
    log::debug!("writing camera '{}' to {}", camera.name(), path.display());
    let record = camera.to_record()?;
    write_json(path, &record)
}

/// Read a camera from a JSON parameter record.
///
/// # Arguments
///
/// * `path` - The path to the JSON file.
///
/// # Returns
///
/// The camera, validated as in [`CameraModel::from_record`].
pub fn read_camera(path: impl AsRef<Path>) -> Result<CameraModel, CameraIoError> {
    let path = path.as_ref();
    let record: CameraRecord = read_json(path)?;
    log::debug!("read camera '{}' from {}", record.name, path.display());
    Ok(CameraModel::from_record(&record)?)
}

/// Write the projection matrix of a camera with its image metadata.
pub fn write_projection(
    path: impl AsRef<Path>,
    camera: &CameraModel,
) -> Result<(), CameraIoError> {
    let path = path.as_ref();
    log::debug!("writing projection of '{}' to {}", camera.name(), path.display());
    write_json(path, &camera.to_projection_record())
}

/// Read an undistorted camera from a JSON projection record.
pub fn read_projection(path: impl AsRef<Path>) -> Result<CameraModel, CameraIoError> {
    let record: ProjectionRecord = read_json(path.as_ref())?;
    Ok(CameraModel::from_projection_record(&record)?)
}
