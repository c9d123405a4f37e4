use thiserror::Error;

/// Everything that can go wrong while decoding a SIF file.
///
/// Header-level failures (`Format`, `Io`) abort the whole decode. Only
/// `Truncated` has a recoverable counterpart, see
/// [`DecodeOptions::tolerate_corruption`](crate::DecodeOptions).
#[derive(Error, Debug)]
pub enum SifError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error at byte {offset}: {message}")]
    Format { offset: u64, message: String },

    #[error(
        "The file might be corrupt: the header declares {expected} frames \
         but only {found} could be read"
    )]
    Truncated { expected: usize, found: usize },

    #[error("Pixel cube shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Missing metadata field: {0}")]
    MissingField(String),

    #[error("Calibration has {calibration} points but a frame has {samples} samples")]
    ShapeMismatch { calibration: usize, samples: usize },

    #[error("No evaluated wavelength calibration available")]
    NoCalibration,
}

impl SifError {
    pub(crate) fn format(offset: u64, message: impl Into<String>) -> Self {
        SifError::Format {
            offset,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SifError>;
