//! Decoder for Andor Technology Multi-Channel (`.sif`) files written by
//! CCD/ICCD spectroscopy cameras.
//!
//! ```no_run
//! use rusty_sif::{decode, DecodeOptions, MismatchPolicy};
//!
//! let file = decode("capture.sif", &DecodeOptions::default())?;
//! println!("{:?}", file.metadata.get("ExposureTime"));
//! let spectrum = file.calibrated_spectrum(MismatchPolicy::Reject)?;
//! for row in spectrum.pairs().rows() {
//!     println!("{} {}", row[0], row[1]);
//! }
//! # Ok::<(), rusty_sif::SifError>(())
//! ```

pub mod error;
pub mod export;
pub mod sif;

pub use error::{Result, SifError};
pub use sif::model::{Calibration, Metadata, MetadataValue, TileDescriptor};
pub use sif::pixels::Corruption;
pub use sif::spectrum::{CalibratedSpectrum, FrameSpectrum, MismatchPolicy, ShapeMismatch};
pub use sif::{decode, decode_reader, DecodeOptions, DecodedFile};
