//! Writes synthetic SIF files laid out the way the decoder reads them.
//!
//! Only the fields the decoder looks at carry meaningful values; everything
//! else is filler of the right shape.

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use super::calibration::MECHELLE;
use super::header::SIGNATURE;
use super::version;

/// Calibration line written when no coefficients are given: not numeric, so
/// the decoder drops it.
const UNCALIBRATED_LINE: &[u8] = b"\x01 \x00 \x01 \x00 \x01 \x00";

/// One readout region in detector coordinates (1-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubImage {
    pub x0: i64,
    pub y1: i64,
    pub x1: i64,
    pub y0: i64,
    pub xbin: i64,
    pub ybin: i64,
}

impl SubImage {
    /// The whole detector, unbinned.
    pub fn full(width: i64, height: i64) -> Self {
        Self {
            x0: 1,
            y1: height,
            x1: width,
            y0: 1,
            xbin: 1,
            ybin: 1,
        }
    }

    fn width(&self) -> i64 {
        (1 + self.x1 - self.x0) / self.xbin
    }

    fn height(&self) -> i64 {
        (1 + self.y1 - self.y0) / self.ybin
    }
}

#[derive(Debug, Clone)]
pub struct SifBuilder {
    version: i64,
    calibration_version: i64,
    experiment_time: i64,
    temperature: f64,
    exposure_time: f64,
    detector_type: String,
    detector_dimensions: (i64, i64),
    original_filename: String,
    user_text: Vec<u8>,
    spectrograph: String,
    calibration: Option<Vec<f64>>,
    raman_wavelength: Option<f64>,
    subimages: Vec<SubImage>,
    timestamps: Option<Vec<i64>>,
    post_timestamp_flag: Option<i64>,
    frames: Vec<Vec<f32>>,
}

impl SifBuilder {
    /// A single unbinned full-detector subimage, newest format version.
    pub fn new(width: i64, height: i64) -> Self {
        Self {
            version: 65567,
            calibration_version: 65539,
            experiment_time: 1_540_956_289,
            temperature: -60.0,
            exposure_time: 0.1,
            detector_type: "DU420_OE".to_string(),
            detector_dimensions: (width, height),
            original_filename: "C:\\data\\capture.sif".to_string(),
            user_text: Vec::new(),
            spectrograph: "SR-303i".to_string(),
            calibration: None,
            raman_wavelength: None,
            subimages: vec![SubImage::full(width, height)],
            timestamps: None,
            post_timestamp_flag: None,
            frames: Vec::new(),
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn calibration_version(mut self, version: i64) -> Self {
        self.calibration_version = version;
        self
    }

    pub fn exposure_time(mut self, seconds: f64) -> Self {
        self.exposure_time = seconds;
        self
    }

    pub fn detector_type(mut self, name: &str) -> Self {
        self.detector_type = name.to_string();
        self
    }

    pub fn original_filename(mut self, name: &str) -> Self {
        self.original_filename = name.to_string();
        self
    }

    pub fn spectrograph(mut self, name: &str) -> Self {
        self.spectrograph = name.to_string();
        self
    }

    /// Coefficients (lowest degree first) for the calibration line. For
    /// Mechelle spectrographs this is the `PixelCalibration` line.
    pub fn calibration(mut self, coefficients: &[f64]) -> Self {
        self.calibration = Some(coefficients.to_vec());
        self
    }

    /// Embed one calibration per frame in the user text.
    pub fn per_frame_calibration(mut self, rows: &[Vec<f64>]) -> Self {
        let lines: Vec<String> = rows
            .iter()
            .enumerate()
            .map(|(i, coefficients)| {
                let joined: Vec<String> = coefficients.iter().map(|c| c.to_string()).collect();
                format!("Calibration data for frame {}: {}", i + 1, joined.join(","))
            })
            .collect();
        self.user_text = lines.join("\n").into_bytes();
        self
    }

    pub fn user_text(mut self, text: &[u8]) -> Self {
        self.user_text = text.to_vec();
        self
    }

    pub fn raman_wavelength(mut self, nm: f64) -> Self {
        self.raman_wavelength = Some(nm);
        self
    }

    pub fn subimages(mut self, subimages: Vec<SubImage>) -> Self {
        self.subimages = subimages;
        self
    }

    pub fn timestamps(mut self, timestamps: Vec<i64>) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    pub fn post_timestamp_flag(mut self, flag: i64) -> Self {
        self.post_timestamp_flag = Some(flag);
        self
    }

    /// Append one frame of raw samples (row-major).
    pub fn frame(mut self, samples: Vec<f32>) -> Self {
        self.frames.push(samples);
        self
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let frames = self.frames.len();

        w.write_all(SIGNATURE)?;
        w.write_all(b"65538 1\n")?;

        // acquisition line
        write!(
            w,
            "{} 0 0 1 {} {} ",
            self.version, self.experiment_time, self.temperature
        )?;
        w.write_all(b"0 0 0 0 0 ")?;
        write!(w, "0 {0} {0} {0} 1 ", self.exposure_time)?;
        w.write_all(b"\0 ")?;
        write!(w, "{} 0.000001 0 1 0 0 0 0 ", self.exposure_time)?;
        for _ in 0..16 {
            w.write_all(b"0 ")?;
        }
        w.write_all(b"500 0 0\n")?;

        writeln!(w, "{}", self.detector_type)?;
        let (width, height) = self.detector_dimensions;
        writeln!(w, "{width} {height} {}", self.original_filename.len())?;
        w.write_all(self.original_filename.as_bytes())?;
        w.write_all(b" \n")?;
        writeln!(w, "65538 {}", self.user_text.len())?;
        w.write_all(&self.user_text)?;
        w.write_all(b"\n")?;
        w.write_all(b"65538 ")?;
        w.write_all(&[0u8; 8])?;
        w.write_all(b"0 0\n")?;

        self.write_version_block(w)?;
        self.write_calibration(w)?;

        for axis in ["Wavelength", "Counts", "Pixel number"] {
            write!(w, "{}\n{axis}", axis.len())?;
        }

        let last = self.subimages.last().copied().unwrap_or(SubImage::full(width, height));
        let image_length = last.width() * last.height() * self.subimages.len() as i64;
        write!(w, "65541 1 {height} {width} 1 ")?;
        writeln!(
            w,
            "{frames} {} {} {image_length}",
            self.subimages.len(),
            image_length * frames as i64
        )?;
        for s in &self.subimages {
            writeln!(
                w,
                "65538 {} {} {} {} {} {} {image_length} {image_length}",
                s.x0, s.y1, s.x1, s.y0, s.ybin, s.xbin
            )?;
        }

        for frame in 0..frames {
            let stamp = self
                .timestamps
                .as_ref()
                .and_then(|t| t.get(frame).copied())
                .unwrap_or(frame as i64 * 100);
            writeln!(w, "{stamp}")?;
        }
        if let Some(flag) = self.post_timestamp_flag {
            writeln!(w, "{flag}")?;
            if flag == 1 && version::has_flag_block(self.version) {
                for frame in 0..frames {
                    writeln!(w, "{}", 1_000_000 + frame)?;
                }
            }
        }

        for samples in &self.frames {
            for &sample in samples {
                w.write_f32::<LittleEndian>(sample)?;
            }
        }
        Ok(())
    }

    fn write_version_block<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let Some(rule) = version::lookup(self.version) else {
            return Ok(());
        };
        for _ in 0..rule.skip_lines {
            w.write_all(b"65538 0 0 0\n")?;
        }
        if rule.spectrograph_line {
            writeln!(w, "65539 {} 0", self.spectrograph)?;
            for _ in 0..rule.trailing_lines {
                w.write_all(b"65538 0 0 0\n")?;
            }
        }
        Ok(())
    }

    fn write_calibration<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{} ", self.calibration_version)?;
        if version::calibration_skip_lines(self.calibration_version) > 0 {
            w.write_all(b"\n")?;
        }
        match &self.calibration {
            Some(coefficients) => {
                let joined: Vec<String> = coefficients.iter().map(|c| c.to_string()).collect();
                w.write_all(joined.join(" ").as_bytes())?;
            }
            None if self.spectrograph.contains(MECHELLE) => {}
            None => w.write_all(UNCALIBRATED_LINE)?,
        }
        w.write_all(b"\n")?;

        w.write_all(b"0 1 0 0\n0 1 0 0\n")?;
        match self.raman_wavelength {
            Some(nm) => writeln!(w, "{nm}")?,
            None => w.write_all(b"\n")?,
        }
        w.write_all(b"422\n13\n13\n")
    }
}
