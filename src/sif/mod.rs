//! SIF decoding: header tokenizing, pixel tiles, wavelength calibration.
//!
//! Architecture:
//! ```text
//!   .sif byte stream
//!        │
//!        ▼
//!   ┌──────────┐   ┌──────────┐
//!   │  cursor   │──▶│ version  │  line skips, spectrograph name
//!   └──────────┘   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  header   │  Metadata record + tile descriptors
//!   └──────────┘
//!        │                   │
//!        ▼                   ▼
//!   ┌──────────┐   ┌─────────────┐
//!   │  pixels   │   │ calibration │  reads Metadata only
//!   └──────────┘   └─────────────┘
//!        │                   │
//!        └────────┬──────────┘
//!                 ▼
//!          DecodedFile ──▶ spectrum (wavelength, count) pairs
//! ```

pub mod calibration;
pub mod cursor;
pub mod header;
pub mod model;
pub mod pixels;
pub mod spectrum;
pub mod version;
pub mod writer;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use ndarray::Array3;

use self::cursor::TokenCursor;
use self::model::{Calibration, Metadata};
use self::pixels::Corruption;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Accept a file whose last frames are cut short, returning the frames
    /// that could be read and a [`Corruption`] report.
    pub tolerate_corruption: bool,
    /// Evaluate Mechelle `PixelCalibration` coefficients as a polynomial
    /// instead of returning them raw.
    pub evaluate_pixel_calibration: bool,
}

impl DecodeOptions {
    pub fn tolerate_corruption(mut self, yes: bool) -> Self {
        self.tolerate_corruption = yes;
        self
    }

    pub fn evaluate_pixel_calibration(mut self, yes: bool) -> Self {
        self.evaluate_pixel_calibration = yes;
        self
    }
}

// ---------------------------------------------------------------------------
// DecodedFile
// ---------------------------------------------------------------------------

/// Everything decoded from one SIF file.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    /// `[frame][row][col]` raw counts.
    pub pixels: Array3<f32>,
    pub metadata: Metadata,
    pub calibration: Option<Calibration>,
    /// Set when truncation was tolerated.
    pub corruption: Option<Corruption>,
}

impl DecodedFile {
    pub fn frame_count(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn is_corrupt(&self) -> bool {
        self.corruption.is_some()
    }

    pub fn into_parts(self) -> (Array3<f32>, Metadata, Option<Calibration>, Option<Corruption>) {
        (self.pixels, self.metadata, self.calibration, self.corruption)
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Open and decode the SIF file at `path`. The file is closed before this
/// returns, whatever the outcome.
pub fn decode<P: AsRef<Path>>(path: P, options: &DecodeOptions) -> Result<DecodedFile> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let decoded = decode_reader(file, options)?;
    log::info!(
        "Decoded {} frame(s) of {:?} from {}",
        decoded.frame_count(),
        &decoded.pixels.dim(),
        path.display()
    );
    Ok(decoded)
}

/// Decode from an open stream. Pass `&mut stream` to keep ownership of it.
pub fn decode_reader<R: Read + Seek>(reader: R, options: &DecodeOptions) -> Result<DecodedFile> {
    let mut cursor = TokenCursor::new(BufReader::new(reader));
    let header = header::read_header(&mut cursor)?;

    let mut stream = cursor.into_inner();
    let (pixels, corruption) = pixels::read_pixels(
        &mut stream,
        &header.tiles,
        header.geometry,
        options.tolerate_corruption,
    )?;

    let calibration = calibration::resolve(&header.metadata, options.evaluate_pixel_calibration)?;
    if calibration.is_none() {
        log::debug!("no wavelength calibration in header");
    }

    Ok(DecodedFile {
        pixels,
        metadata: header.metadata,
        calibration,
        corruption,
    })
}
