use std::{fs, path::Path};

use nalgebra::Matrix3x4;

use crate::error::CameraIoError;

/// Write a projection matrix as three lines of four whitespace separated
/// numbers.
pub fn write_pmat(path: impl AsRef<Path>, pmat: &Matrix3x4<f64>) -> Result<(), CameraIoError> {
    let path = path.as_ref();
    log::debug!("writing projection matrix to {}", path.display());
    let mut contents = String::new();
    for row in pmat.row_iter() {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        contents.push_str(&line);
        contents.push('\n');
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Read a projection matrix written by [`write_pmat`].
///
/// Blank lines and lines starting with `#` are ignored.
pub fn read_pmat(path: impl AsRef<Path>) -> Result<Matrix3x4<f64>, CameraIoError> {
    let path = path.as_ref();
    log::debug!("reading projection matrix from {}", path.display());
    let contents = fs::read_to_string(path)?;
    parse_pmat(&contents)
}

fn parse_pmat(contents: &str) -> Result<Matrix3x4<f64>, CameraIoError> {
    let rows = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.split_whitespace()
                .map(|v| {
                    v.parse::<f64>()
                        .map_err(|e| CameraIoError::Parse(format!("invalid value '{v}': {e}")))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let cols = rows.first().map_or(0, |row| row.len());
    if rows.len() != 3 || rows.iter().any(|row| row.len() != 4) {
        return Err(CameraIoError::BadMatrixSize {
            name: "pmat".to_string(),
            expected_rows: 3,
            expected_cols: 4,
            rows: rows.len(),
            cols,
            len: rows.iter().map(Vec::len).sum(),
        });
    }
    Ok(Matrix3x4::from_fn(|i, j| rows[i][j]))
}
