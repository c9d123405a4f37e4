use ndarray::{Array1, Array2};

use super::model::{Calibration, Metadata, MetadataValue, MAX_DETECTOR_SIDE};
use crate::error::{Result, SifError};

/// Spectrograph family whose calibration is stored as `PixelCalibration`.
pub const MECHELLE: &str = "Mechelle";

/// Resolve the pixel → wavelength calibration described by `metadata`.
///
/// Priority: per-frame coefficients (`Calibration_data_for_frame_1..N`),
/// then the shared `Calibration_data`, then Mechelle `PixelCalibration`.
/// Mechelle coefficients are returned raw unless `evaluate_pixel_calibration`
/// is set. `Ok(None)` means the file carries no calibration.
pub fn resolve(metadata: &Metadata, evaluate_pixel_calibration: bool) -> Result<Option<Calibration>> {
    let (width, _) = metadata.int_pair("DetectorDimensions")?;
    let width = usize::try_from(width)
        .ok()
        .filter(|_| width <= MAX_DETECTOR_SIDE)
        .ok_or_else(|| {
            SifError::MissingField(format!(
                "DetectorDimensions (width within 0..={MAX_DETECTOR_SIDE}, found {width})"
            ))
        })?;

    if metadata.contains_key("Calibration_data_for_frame_1") {
        let frames = usize::try_from(metadata.int("NumberOfFrames")?).unwrap_or(0);
        // every key must exist before the table is allocated
        let rows = (1..=frames)
            .map(|frame| metadata.float_list(&format!("Calibration_data_for_frame_{frame}")))
            .collect::<Result<Vec<_>>>()?;
        let mut table = Array2::zeros((rows.len(), width));
        for (mut row, coefficients) in table.rows_mut().into_iter().zip(rows) {
            row.assign(&evaluate_polynomial(coefficients, width));
        }
        return Ok(Some(Calibration::PerFrame(table)));
    }

    if let Some(coefficients) = metadata
        .get("Calibration_data")
        .and_then(MetadataValue::as_float_list)
    {
        return Ok(Some(Calibration::Shared(evaluate_polynomial(coefficients, width))));
    }

    let mechelle = metadata.spectrograph().is_some_and(|s| s.contains(MECHELLE));
    if let Some(coefficients) = metadata
        .get("PixelCalibration")
        .and_then(MetadataValue::as_float_list)
        .filter(|_| mechelle)
    {
        let calibration = if evaluate_pixel_calibration {
            Calibration::Shared(evaluate_polynomial(coefficients, width))
        } else {
            Calibration::Raw(coefficients.to_vec())
        };
        return Ok(Some(calibration));
    }

    Ok(None)
}

/// Evaluate `c0 + c1·x + c2·x² + …` at pixel positions `1..=width`.
///
/// Coefficients are stored lowest degree first.
pub fn evaluate_polynomial(coefficients: &[f64], width: usize) -> Array1<f64> {
    (1..=width)
        .map(|pixel| {
            let x = pixel as f64;
            coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
        })
        .collect()
}
