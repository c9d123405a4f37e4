use ndarray::{s, Array2, Axis};

use super::model::Calibration;
use super::DecodedFile;
use crate::error::{Result, SifError};

/// What to do when a frame's sample count differs from the calibration
/// length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Fail with [`SifError::ShapeMismatch`].
    #[default]
    Reject,
    /// Pair the calibration with the last row of the first frame, the slice
    /// older tooling used for stacked multi-track captures. Reported in
    /// [`CalibratedSpectrum::resliced`].
    LastRowOfFirstFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub calibration: usize,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSpectrum {
    pub frame: usize,
    pub wavelengths: Vec<f64>,
    pub counts: Vec<f64>,
}

/// Calibrated frames of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedSpectrum {
    pub frames: Vec<FrameSpectrum>,
    /// Set when [`MismatchPolicy::LastRowOfFirstFrame`] had to re-slice.
    pub resliced: Option<ShapeMismatch>,
}

impl CalibratedSpectrum {
    /// `(n, 2)` array of `(wavelength, count)` rows, frames one after another.
    pub fn pairs(&self) -> Array2<f64> {
        let points: Vec<[f64; 2]> = self
            .frames
            .iter()
            .flat_map(|f| f.wavelengths.iter().zip(&f.counts).map(|(&w, &c)| [w, c]))
            .collect();
        Array2::from_shape_fn((points.len(), 2), |(i, j)| points[i][j])
    }
}

impl DecodedFile {
    /// Pair each decoded frame with its wavelength row.
    pub fn calibrated_spectrum(&self, policy: MismatchPolicy) -> Result<CalibratedSpectrum> {
        let calibration = self.calibration.as_ref().ok_or(SifError::NoCalibration)?;
        let (_, rows, cols) = self.pixels.dim();

        let mut frames = Vec::with_capacity(self.frame_count());
        for (frame, pixels) in self.pixels.axis_iter(Axis(0)).enumerate() {
            let wavelengths = calibration
                .wavelengths_for_frame(frame)
                .ok_or(SifError::NoCalibration)?;
            if wavelengths.len() != rows * cols {
                let mismatch = ShapeMismatch {
                    calibration: wavelengths.len(),
                    samples: rows * cols,
                };
                return self.reslice(calibration, mismatch, policy);
            }
            frames.push(FrameSpectrum {
                frame,
                wavelengths,
                counts: pixels.iter().map(|&v| f64::from(v)).collect(),
            });
        }
        Ok(CalibratedSpectrum {
            frames,
            resliced: None,
        })
    }

    fn reslice(
        &self,
        calibration: &Calibration,
        mismatch: ShapeMismatch,
        policy: MismatchPolicy,
    ) -> Result<CalibratedSpectrum> {
        let rejected = SifError::ShapeMismatch {
            calibration: mismatch.calibration,
            samples: mismatch.samples,
        };
        let (frames, rows, _) = self.pixels.dim();
        if policy == MismatchPolicy::Reject || frames == 0 || rows == 0 {
            return Err(rejected);
        }

        let counts: Vec<f64> = self
            .pixels
            .slice(s![0, rows - 1, ..])
            .iter()
            .map(|&v| f64::from(v))
            .collect();
        let wavelengths = calibration
            .wavelengths_for_frame(0)
            .ok_or(SifError::NoCalibration)?;
        if wavelengths.len() != counts.len() {
            return Err(SifError::ShapeMismatch {
                calibration: wavelengths.len(),
                samples: counts.len(),
            });
        }

        log::warn!(
            "calibration has {} points but frames have {} samples; \
             using the last row of the first frame",
            mismatch.calibration,
            mismatch.samples
        );
        Ok(CalibratedSpectrum {
            frames: vec![FrameSpectrum {
                frame: 0,
                wavelengths,
                counts,
            }],
            resliced: Some(mismatch),
        })
    }
}
