use std::fmt;

use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::error::{Result, SifError};

// ---------------------------------------------------------------------------
// MetadataValue – a single field of the header record
// ---------------------------------------------------------------------------

/// A dynamically-typed header value.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Float(f64),
    String(String),
    /// `(width, height)` style integer tuples.
    IntPair(i64, i64),
    /// `ShutterTime` (open, close).
    FloatPair(f64, f64),
    FloatList(Vec<f64>),
    Tiles(Vec<TileDescriptor>),
    /// A field that is present but deliberately cleared.
    Null,
}

// -- Manual Eq so NaN fields (RamanExWavelength) compare bit-for-bit --

impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        use MetadataValue::*;
        fn same(a: f64, b: f64) -> bool {
            a.to_bits() == b.to_bits()
        }
        match (self, other) {
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => same(*a, *b),
            (String(a), String(b)) => a == b,
            (IntPair(a0, a1), IntPair(b0, b1)) => a0 == b0 && a1 == b1,
            (FloatPair(a0, a1), FloatPair(b0, b1)) => same(*a0, *b0) && same(*a1, *b1),
            (FloatList(a), FloatList(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same(*x, *y))
            }
            (Tiles(a), Tiles(b)) => a == b,
            (Null, Null) => true,
            _ => false,
        }
    }
}

impl Eq for MetadataValue {}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::IntPair(a, b) => write!(f, "({a}, {b})"),
            MetadataValue::FloatPair(a, b) => write!(f, "({a}, {b})"),
            MetadataValue::FloatList(v) => write!(f, "{v:?}"),
            MetadataValue::Tiles(t) => write!(f, "<{} tiles>", t.len()),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float_list(&self) -> Option<&[f64]> {
        match self {
            MetadataValue::FloatList(v) => Some(v),
            _ => None,
        }
    }

    /// Single-cell values: integers, floats and strings.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            MetadataValue::Integer(_) | MetadataValue::Float(_) | MetadataValue::String(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Metadata – the ordered header record
// ---------------------------------------------------------------------------

/// Header fields keyed by name, in the order they were read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata {
    fields: IndexMap<String, MetadataValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. A replaced field keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.fields.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn require(&self, key: &str) -> Result<&MetadataValue> {
        self.get(key)
            .ok_or_else(|| SifError::MissingField(key.to_string()))
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        self.require(key)?
            .as_i64()
            .ok_or_else(|| SifError::MissingField(format!("{key} (integer)")))
    }

    pub fn int_pair(&self, key: &str) -> Result<(i64, i64)> {
        match self.require(key)? {
            MetadataValue::IntPair(a, b) => Ok((*a, *b)),
            _ => Err(SifError::MissingField(format!("{key} (integer pair)"))),
        }
    }

    pub fn float_list(&self, key: &str) -> Result<&[f64]> {
        self.require(key)?
            .as_float_list()
            .ok_or_else(|| SifError::MissingField(format!("{key} (number list)")))
    }

    pub fn spectrograph(&self) -> Option<&str> {
        self.get("spectrograph").and_then(MetadataValue::as_str)
    }
}

// ---------------------------------------------------------------------------
// Frame geometry and tiles
// ---------------------------------------------------------------------------

/// Raw sample encoding of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleEncoding {
    /// 32-bit IEEE float, little-endian.
    F32Le,
}

impl SampleEncoding {
    pub fn sample_size(self) -> usize {
        match self {
            SampleEncoding::F32Le => 4,
        }
    }
}

/// Largest detector width or height accepted from a header.
pub const MAX_DETECTOR_SIDE: i64 = 1 << 20;

/// Per-subimage readout size after binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    pub subimages: usize,
}

impl FrameGeometry {
    /// Rows in one frame: all subimages stacked. `None` on overflow.
    pub fn total_height(&self) -> Option<usize> {
        self.height.checked_mul(self.subimages)
    }

    pub fn samples_per_frame(&self) -> Option<usize> {
        self.width.checked_mul(self.total_height()?)
    }

    /// Bytes of one frame in `encoding`, as a file offset stride.
    pub fn frame_bytes(&self, encoding: SampleEncoding) -> Option<u64> {
        let bytes = self.samples_per_frame()?.checked_mul(encoding.sample_size())?;
        u64::try_from(bytes).ok()
    }
}

/// Where one frame's raw pixel block lives in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileDescriptor {
    pub frame: usize,
    pub offset: u64,
    pub width: usize,
    /// Rows of the whole frame (subimage height × subimage count).
    pub height: usize,
    pub encoding: SampleEncoding,
}

impl TileDescriptor {
    /// `None` when the tile is too large to address.
    pub fn byte_len(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.encoding.sample_size())
    }
}

// ---------------------------------------------------------------------------
// Calibration table
// ---------------------------------------------------------------------------

/// Pixel → wavelength calibration resolved from the header.
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    /// One wavelength per detector column, shared by every frame.
    Shared(Array1<f64>),
    /// `[frame][pixel]` wavelengths.
    PerFrame(Array2<f64>),
    /// Mechelle `PixelCalibration` coefficients, not evaluated.
    Raw(Vec<f64>),
}

impl Calibration {
    /// Wavelength row used for `frame`, if this calibration is evaluated.
    pub fn wavelengths_for_frame(&self, frame: usize) -> Option<Vec<f64>> {
        match self {
            Calibration::Shared(row) => Some(row.to_vec()),
            Calibration::PerFrame(table) if frame < table.nrows() => {
                Some(table.row(frame).to_vec())
            }
            Calibration::PerFrame(_) | Calibration::Raw(_) => None,
        }
    }
}
