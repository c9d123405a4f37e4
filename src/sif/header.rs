use std::io::{BufRead, Seek};

use super::calibration::MECHELLE;
use super::cursor::{parse_number, TokenCursor};
use super::model::{
    FrameGeometry, Metadata, MetadataValue, SampleEncoding, TileDescriptor, MAX_DETECTOR_SIDE,
};
use super::pixels::locate_tiles;
use super::version;
use crate::error::{Result, SifError};

/// First bytes of every SIF file.
pub const SIGNATURE: &[u8; 36] = b"Andor Technology Multi-Channel File\n";

/// User text starting with this carries one calibration line per frame.
const FRAME_CALIBRATION_MARKER: &[u8] = b"Calibration data for";
const FRAME_CALIBRATION_WINDOW: usize = 20;

/// Everything the header tells us before the pixel data starts.
#[derive(Debug, Clone)]
pub struct Header {
    pub metadata: Metadata,
    pub geometry: FrameGeometry,
    pub frames: usize,
    /// Byte offset of the first frame's pixel block.
    pub data_offset: u64,
    pub tiles: Vec<TileDescriptor>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse the header, leaving the cursor somewhere at or before the pixel
/// data (the tiles carry absolute offsets).
pub fn read_header<R: BufRead + Seek>(cursor: &mut TokenCursor<R>) -> Result<Header> {
    let signature = cursor.read_fixed(SIGNATURE.len())?;
    if signature != SIGNATURE {
        return Err(SifError::format(0, "not a SIF file (signature mismatch)"));
    }
    cursor.skip_line()?;

    let mut md = Metadata::new();
    let version = read_acquisition(cursor, &mut md)?;
    let user_text = read_detector(cursor, &mut md)?;

    let spectrograph = version::skip_version_block(cursor, version)?;
    md.insert("spectrograph", MetadataValue::String(spectrograph.clone()));

    let raw_calibration = read_calibration(cursor, &mut md, &spectrograph)?;
    read_axes(cursor, &mut md)?;
    let (geometry, frames) = read_geometry(cursor, &mut md)?;
    read_timestamps(cursor, &mut md, frames)?;
    let data_offset = read_post_timestamp_flag(cursor, version, frames)?;

    let tiles = locate_tiles(data_offset, geometry, frames)?;
    let rows = geometry
        .total_height()
        .ok_or_else(|| SifError::format(data_offset, "frame height overflows"))?;
    md.insert("size", MetadataValue::IntPair(geometry.width as i64, rows as i64));
    md.insert("tile", MetadataValue::Tiles(tiles.clone()));
    md.insert("offset", MetadataValue::Integer(data_offset as i64));

    apply_user_text(&mut md, &user_text, frames, raw_calibration)?;

    log::debug!(
        "SifVersion {version}: {frames} frame(s) of {}x{} ({} subimage(s)), pixel data at byte {data_offset}",
        geometry.width,
        rows,
        geometry.subimages,
    );

    Ok(Header {
        metadata: md,
        geometry,
        frames,
        data_offset,
        tiles,
    })
}

// ---------------------------------------------------------------------------
// Header sections, in file order
// ---------------------------------------------------------------------------

/// Third line: version, timings, gain, grating. Returns `SifVersion`.
fn read_acquisition<R: BufRead + Seek>(c: &mut TokenCursor<R>, md: &mut Metadata) -> Result<i64> {
    use MetadataValue::{Float, Integer};

    let version = c.read_int()?;
    md.insert("SifVersion", Integer(version));
    c.skip_words(3)?;
    md.insert("ExperimentTime", Integer(c.read_int()?));
    md.insert("DetectorTemperature", Float(c.read_float()?));
    c.skip_bytes(10)?;
    c.skip_word()?;
    md.insert("ExposureTime", Float(c.read_float()?));
    md.insert("CycleTime", Float(c.read_float()?));
    md.insert("AccumulatedCycleTime", Float(c.read_float()?));
    md.insert("AccumulatedCycles", Integer(c.read_int()?));
    // NUL, space
    c.skip_bytes(2)?;
    md.insert("StackCycleTime", Float(c.read_float()?));
    md.insert("PixelReadoutTime", Float(c.read_float()?));
    c.skip_words(2)?;
    md.insert("GainDAC", Float(c.read_float()?));
    c.skip_words(2)?;
    md.insert("GateWidth", Float(c.read_float()?));
    c.skip_words(16)?;
    md.insert("GratingBlaze", Float(c.read_float()?));
    c.read_word(b'\n')?;
    Ok(version)
}

/// Detector type and size, original file name, user text, shutter times.
/// Returns the raw user text for [`apply_user_text`].
fn read_detector<R: BufRead + Seek>(c: &mut TokenCursor<R>, md: &mut Metadata) -> Result<Vec<u8>> {
    let detector_type = c.read_line()?;
    md.insert(
        "DetectorType",
        MetadataValue::String(String::from_utf8_lossy(&detector_type).trim().to_string()),
    );

    let offset = c.position()?;
    let width = c.read_int()?;
    let height = c.read_int()?;
    for side in [width, height] {
        if !(0..=MAX_DETECTOR_SIDE).contains(&side) {
            return Err(SifError::format(
                offset,
                format!("detector dimension {side} outside 0..={MAX_DETECTOR_SIDE}"),
            ));
        }
    }
    md.insert("DetectorDimensions", MetadataValue::IntPair(width, height));

    let filename = c.read_length_prefixed()?;
    md.insert(
        "OriginalFilename",
        MetadataValue::String(String::from_utf8_lossy(&filename).into_owned()),
    );
    c.skip_bytes(2)?;

    c.skip_word()?;
    let user_text = c.read_length_prefixed()?;
    c.skip_bytes(1)?;

    c.read_int()?;
    c.skip_bytes(8)?;
    let open = c.read_float()?;
    let close = c.read_float()?;
    md.insert("ShutterTime", MetadataValue::FloatPair(open, close));
    Ok(user_text)
}

/// `SifCalbVersion` and the calibration line that follows it.
///
/// For Mechelle spectrographs the line is stored as `PixelCalibration`
/// straight away. Otherwise the raw line is returned and resolved later,
/// once the user text has been checked for per-frame calibrations.
fn read_calibration<R: BufRead + Seek>(
    c: &mut TokenCursor<R>,
    md: &mut Metadata,
    spectrograph: &str,
) -> Result<Option<Vec<u8>>> {
    let calibration_version = c.read_int()?;
    md.insert("SifCalbVersion", MetadataValue::Integer(calibration_version));
    c.skip_lines(version::calibration_skip_lines(calibration_version))?;

    let offset = c.position()?;
    let line = c.read_line()?;
    let raw = if spectrograph.contains(MECHELLE) {
        let coefficients = parse_float_tokens(&line, offset)?;
        md.insert("PixelCalibration", MetadataValue::FloatList(coefficients));
        None
    } else {
        // placeholder keeps the field's position in the record
        md.insert("Calibration_data", MetadataValue::Null);
        Some(line)
    };

    c.skip_lines(2)?;
    let raman_offset = c.position()?;
    let raman = c.read_line()?;
    let raman = parse_number::<f64>(&raman, raman_offset, "Raman excitation wavelength")
        .unwrap_or(f64::NAN);
    md.insert("RamanExWavelength", MetadataValue::Float(raman));
    c.skip_lines(3)?;
    Ok(raw)
}

fn read_axes<R: BufRead + Seek>(c: &mut TokenCursor<R>, md: &mut Metadata) -> Result<()> {
    for key in ["FrameAxis", "DataType", "ImageAxis"] {
        let text = c.read_length_prefixed()?;
        md.insert(key, MetadataValue::String(String::from_utf8_lossy(&text).into_owned()));
    }
    Ok(())
}

/// Outer bounding box, frame/subimage counts and the subimage lines.
fn read_geometry<R: BufRead + Seek>(
    c: &mut TokenCursor<R>,
    md: &mut Metadata,
) -> Result<(FrameGeometry, usize)> {
    c.skip_word()?;
    // outer box: x0 y1 x1 y0
    c.skip_words(4)?;

    let offset = c.position()?;
    let frames = c.read_int()?;
    let subimages = c.read_int()?;
    md.insert("NumberOfFrames", MetadataValue::Integer(frames));
    md.insert("NumberOfSubImages", MetadataValue::Integer(subimages));
    md.insert("TotalLength", MetadataValue::Integer(c.read_int()?));
    md.insert("ImageLength", MetadataValue::Integer(c.read_int()?));
    let frames = non_negative(frames, offset, "NumberOfFrames")?;

    // Every subimage has the same readout size; the last one wins.
    let mut last = None;
    for _ in 0..subimages.max(0) {
        c.skip_word()?;
        let offset = c.position()?;
        let line = c.read_line()?;
        last = Some(parse_subimage(&line, offset)?);
    }
    let Some(sub) = last else {
        return Err(SifError::format(offset, "header declares no subimages"));
    };
    md.insert("xbin", MetadataValue::Integer(sub.xbin));
    md.insert("ybin", MetadataValue::Integer(sub.ybin));

    let geometry = FrameGeometry {
        width: sub.width,
        height: sub.height,
        subimages: non_negative(subimages, offset, "NumberOfSubImages")?,
    };
    if geometry.frame_bytes(SampleEncoding::F32Le).is_none() {
        return Err(SifError::format(offset, "subimage geometry overflows the frame size"));
    }
    Ok((geometry, frames))
}

struct SubImage {
    width: usize,
    height: usize,
    xbin: i64,
    ybin: i64,
}

/// `x0 y1 x1 y0 ybin xbin ...`; anything past the sixth field is ignored.
fn parse_subimage(line: &[u8], offset: u64) -> Result<SubImage> {
    let fields = tokens(line)
        .take(6)
        .map(|t| parse_number::<i64>(t, offset, "subimage field"))
        .collect::<Result<Vec<_>>>()?;
    let [x0, y1, x1, y0, ybin, xbin] = fields[..] else {
        return Err(SifError::format(offset, "subimage line needs six fields"));
    };
    if xbin == 0 || ybin == 0 {
        return Err(SifError::format(offset, "subimage binning is zero"));
    }
    // (1 + hi - lo) / bin, refusing to wrap on corrupt coordinates
    let extent = |hi: i64, lo: i64, bin: i64, what: &str| {
        hi.checked_sub(lo)
            .and_then(|d| d.checked_add(1))
            .and_then(|d| d.checked_div(bin))
            .ok_or_else(|| SifError::format(offset, format!("{what} overflows")))
            .and_then(|v| non_negative(v, offset, what))
    };
    Ok(SubImage {
        width: extent(x1, x0, xbin, "subimage width")?,
        height: extent(y1, y0, ybin, "subimage height")?,
        xbin,
        ybin,
    })
}

fn read_timestamps<R: BufRead + Seek>(
    c: &mut TokenCursor<R>,
    md: &mut Metadata,
    frames: usize,
) -> Result<()> {
    c.skip_whitespace()?;
    for frame in 0..frames {
        let offset = c.position()?;
        let line = c.read_line()?;
        let stamp = parse_number::<i64>(&line, offset, "frame timestamp")?;
        md.insert(format!("timestamp_of_{frame}"), MetadataValue::Integer(stamp));
    }
    Ok(())
}

/// Probe the optional flag line after the timestamps and return the offset
/// at which pixel data starts.
fn read_post_timestamp_flag<R: BufRead + Seek>(
    c: &mut TokenCursor<R>,
    version: i64,
    frames: usize,
) -> Result<u64> {
    let mark = c.mark()?;
    let line = c.read_line()?;
    match parse_number::<i64>(&line, mark.offset(), "flag") {
        Ok(0) => c.position(),
        Ok(1) if version::has_flag_block(version) => {
            c.skip_lines(frames)?;
            c.position()
        }
        _ => {
            c.rewind(mark)?;
            Ok(mark.offset())
        }
    }
}

/// Split per-frame calibrations out of the user text, or settle the generic
/// `Calibration_data` field.
fn apply_user_text(
    md: &mut Metadata,
    user_text: &[u8],
    frames: usize,
    raw_calibration: Option<Vec<u8>>,
) -> Result<()> {
    let head = &user_text[..user_text.len().min(FRAME_CALIBRATION_WINDOW)];
    let per_frame = head
        .windows(FRAME_CALIBRATION_MARKER.len())
        .any(|w| w == FRAME_CALIBRATION_MARKER);

    if per_frame {
        let lines: Vec<&[u8]> = user_text.split(|&b| b == b'\n').collect();
        for frame in 0..frames {
            let key = format!("Calibration_data_for_frame_{}", frame + 1);
            let line = lines.get(frame).ok_or_else(|| {
                SifError::format(0, format!("user text has no calibration line for frame {}", frame + 1))
            })?;
            let coefficients = line.get(key.len() + 2..).unwrap_or_default();
            let coefficients = trim(coefficients)
                .split(|&b| b == b',')
                .map(|t| parse_number::<f64>(t, 0, "calibration coefficient"))
                .collect::<Result<Vec<_>>>()?;
            md.insert(key, MetadataValue::FloatList(coefficients));
        }
        md.insert("Calibration_data", MetadataValue::Null);
    } else if let Some(raw) = raw_calibration {
        match parse_float_tokens(&raw, 0) {
            Ok(coefficients) => md.insert("Calibration_data", MetadataValue::FloatList(coefficients)),
            Err(_) => {
                md.remove("Calibration_data");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tokens(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(|b| b.is_ascii_whitespace()).filter(|t| !t.is_empty())
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn parse_float_tokens(line: &[u8], offset: u64) -> Result<Vec<f64>> {
    tokens(line)
        .map(|t| parse_number::<f64>(t, offset, "calibration coefficient"))
        .collect()
}

fn non_negative(value: i64, offset: u64, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| SifError::format(offset, format!("{what} is negative ({value})")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sif::writer::{SifBuilder, SubImage as WrittenSubImage};
    use std::io::Cursor;

    fn header_of(builder: &SifBuilder) -> Result<Header> {
        let mut cursor = TokenCursor::new(Cursor::new(builder.to_bytes().unwrap()));
        read_header(&mut cursor)
    }

    #[test]
    fn rejects_foreign_signature() {
        let mut bytes = SifBuilder::new(4, 1).frame(vec![0.0; 4]).to_bytes().unwrap();
        bytes[0] = b'X';
        let mut cursor = TokenCursor::new(Cursor::new(bytes));
        let err = read_header(&mut cursor).unwrap_err();
        assert!(matches!(err, SifError::Format { offset: 0, .. }), "{err}");
    }

    #[test]
    fn acquisition_fields() {
        let header = header_of(
            &SifBuilder::new(8, 2)
                .exposure_time(0.25)
                .detector_type("DU420_BU2")
                .original_filename("run_07.sif")
                .frame(vec![0.0; 16]),
        )
        .unwrap();
        let md = &header.metadata;
        assert_eq!(md.get("SifVersion"), Some(&MetadataValue::Integer(65567)));
        assert_eq!(md.get("ExposureTime"), Some(&MetadataValue::Float(0.25)));
        assert_eq!(md.get("DetectorType"), Some(&MetadataValue::String("DU420_BU2".into())));
        assert_eq!(md.get("DetectorDimensions"), Some(&MetadataValue::IntPair(8, 2)));
        assert_eq!(md.get("OriginalFilename"), Some(&MetadataValue::String("run_07.sif".into())));
        assert_eq!(md.get("NumberOfFrames"), Some(&MetadataValue::Integer(1)));
        assert_eq!(md.get("size"), Some(&MetadataValue::IntPair(8, 2)));
        assert_eq!(header.geometry, FrameGeometry { width: 8, height: 2, subimages: 1 });
    }

    #[test]
    fn spectrograph_name_for_65559() {
        let header = header_of(
            &SifBuilder::new(4, 1)
                .version(65559)
                .spectrograph("SR-303i")
                .frame(vec![0.0; 4]),
        )
        .unwrap();
        assert_eq!(header.metadata.spectrograph(), Some("SR-303i"));
    }

    #[test]
    fn unknown_version_is_unchecked() {
        let header = header_of(&SifBuilder::new(4, 1).version(65561).frame(vec![0.0; 4])).unwrap();
        assert_eq!(header.metadata.spectrograph(), Some(version::UNCHECKED_SPECTROGRAPH));
    }

    #[test]
    fn binned_subimages_define_size() {
        let header = header_of(
            &SifBuilder::new(16, 8)
                .subimages(vec![
                    WrittenSubImage { x0: 1, y1: 4, x1: 16, y0: 1, xbin: 2, ybin: 2 },
                    WrittenSubImage { x0: 1, y1: 8, x1: 16, y0: 5, xbin: 2, ybin: 2 },
                ])
                .frame(vec![0.0; 16]),
        )
        .unwrap();
        assert_eq!(header.geometry, FrameGeometry { width: 8, height: 2, subimages: 2 });
        assert_eq!(header.metadata.get("size"), Some(&MetadataValue::IntPair(8, 4)));
        assert_eq!(header.metadata.get("xbin"), Some(&MetadataValue::Integer(2)));
    }

    #[test]
    fn calibration_line_becomes_coefficients() {
        let header = header_of(&SifBuilder::new(4, 1).calibration(&[500.0, 0.5]).frame(vec![0.0; 4]))
            .unwrap();
        assert_eq!(
            header.metadata.get("Calibration_data"),
            Some(&MetadataValue::FloatList(vec![500.0, 0.5]))
        );
    }

    #[test]
    fn non_numeric_calibration_line_is_dropped() {
        let header = header_of(&SifBuilder::new(4, 1).frame(vec![0.0; 4])).unwrap();
        assert!(!header.metadata.contains_key("Calibration_data"));
    }

    #[test]
    fn calibration_version_65540_skips_a_line() {
        let header = header_of(
            &SifBuilder::new(4, 1)
                .calibration_version(65540)
                .calibration(&[1.0, 2.0, 3.0])
                .frame(vec![0.0; 4]),
        )
        .unwrap();
        assert_eq!(
            header.metadata.get("Calibration_data"),
            Some(&MetadataValue::FloatList(vec![1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn per_frame_calibration_from_user_text() {
        let header = header_of(
            &SifBuilder::new(4, 1)
                .calibration(&[9.0, 9.0])
                .per_frame_calibration(&[vec![0.0, 1.0], vec![100.0, 2.0]])
                .frame(vec![0.0; 4])
                .frame(vec![0.0; 4]),
        )
        .unwrap();
        let md = &header.metadata;
        assert_eq!(md.float_list("Calibration_data_for_frame_1").unwrap(), &[0.0, 1.0]);
        assert_eq!(md.float_list("Calibration_data_for_frame_2").unwrap(), &[100.0, 2.0]);
        assert_eq!(md.get("Calibration_data"), Some(&MetadataValue::Null));
    }

    #[test]
    fn mechelle_reads_pixel_calibration() {
        let header = header_of(
            &SifBuilder::new(4, 1)
                .spectrograph("Mechelle5000")
                .calibration(&[200.0, 0.1, 1e-5])
                .frame(vec![0.0; 4]),
        )
        .unwrap();
        let md = &header.metadata;
        assert_eq!(md.float_list("PixelCalibration").unwrap(), &[200.0, 0.1, 1e-5]);
        assert!(!md.contains_key("Calibration_data"));
    }

    #[test]
    fn missing_raman_wavelength_is_nan() {
        let header = header_of(&SifBuilder::new(4, 1).frame(vec![0.0; 4])).unwrap();
        let raman = header.metadata.get("RamanExWavelength").and_then(MetadataValue::as_f64);
        assert!(raman.is_some_and(f64::is_nan));

        let header =
            header_of(&SifBuilder::new(4, 1).raman_wavelength(785.0).frame(vec![0.0; 4])).unwrap();
        assert_eq!(header.metadata.get("RamanExWavelength"), Some(&MetadataValue::Float(785.0)));
    }

    #[test]
    fn timestamps_are_zero_indexed() {
        let header = header_of(
            &SifBuilder::new(2, 1)
                .timestamps(vec![11, 22, 33])
                .frame(vec![0.0; 2])
                .frame(vec![0.0; 2])
                .frame(vec![0.0; 2]),
        )
        .unwrap();
        let md = &header.metadata;
        assert_eq!(md.get("timestamp_of_0"), Some(&MetadataValue::Integer(11)));
        assert_eq!(md.get("timestamp_of_2"), Some(&MetadataValue::Integer(33)));
        assert!(!md.contains_key("timestamp_of_3"));
    }

    fn offset_with_flag(version: i64, flag: Option<i64>) -> (u64, u64) {
        let base = SifBuilder::new(2, 1).version(version).frame(vec![1.0, 2.0]).frame(vec![3.0, 4.0]);
        let plain = header_of(&base).unwrap().data_offset;
        let flagged = match flag {
            Some(flag) => base.post_timestamp_flag(flag),
            None => base,
        };
        (plain, header_of(&flagged).unwrap().data_offset)
    }

    #[test]
    fn flag_zero_is_consumed() {
        let (plain, flagged) = offset_with_flag(65567, Some(0));
        assert_eq!(flagged, plain + 2);
    }

    #[test]
    fn other_flag_values_leave_offset_before_flag() {
        let (plain, flagged) = offset_with_flag(65567, Some(2));
        assert_eq!(flagged, plain);
    }

    #[test]
    fn flag_one_consumes_per_frame_block_on_65567() {
        let bytes = SifBuilder::new(2, 1)
            .post_timestamp_flag(1)
            .frame(vec![1.0, 2.0])
            .frame(vec![3.0, 4.0])
            .to_bytes()
            .unwrap();
        let header = read_header(&mut TokenCursor::new(Cursor::new(bytes.clone()))).unwrap();
        // data offset lands exactly on the pixel block
        assert_eq!(header.data_offset as usize, bytes.len() - 2 * 2 * 4);
    }

    #[test]
    fn flag_one_elsewhere_leaves_offset_before_flag() {
        let bytes = SifBuilder::new(2, 1)
            .version(65566)
            .post_timestamp_flag(1)
            .frame(vec![1.0, 2.0])
            .to_bytes()
            .unwrap();
        let header = read_header(&mut TokenCursor::new(Cursor::new(bytes.clone()))).unwrap();
        assert_eq!(header.data_offset as usize, bytes.len() - 2 * 4 - 2);
    }

    #[test]
    fn tiles_follow_data_offset() {
        let header = header_of(
            &SifBuilder::new(3, 2).frame(vec![0.0; 6]).frame(vec![0.0; 6]).frame(vec![0.0; 6]),
        )
        .unwrap();
        let offsets: Vec<_> = header.tiles.iter().map(|t| t.offset - header.data_offset).collect();
        assert_eq!(offsets, vec![0, 24, 48]);
        assert_eq!(header.metadata.get("tile"), Some(&MetadataValue::Tiles(header.tiles.clone())));
    }

    #[test]
    fn truncated_header_is_a_format_error() {
        let bytes = SifBuilder::new(4, 1).frame(vec![0.0; 4]).to_bytes().unwrap();
        let mut cursor = TokenCursor::new(Cursor::new(bytes[..120].to_vec()));
        assert!(matches!(read_header(&mut cursor), Err(SifError::Format { .. })));
    }

    /// A 4x1 capture with its subimage line swapped for `line`.
    fn with_subimage_line(line: &str) -> Vec<u8> {
        let bytes = SifBuilder::new(4, 1).frame(vec![0.0; 4]).to_bytes().unwrap();
        let written = b"65538 1 1 4 1 1 1 4 4\n";
        let at = bytes.windows(written.len()).position(|w| w == written).unwrap();
        [&bytes[..at], line.as_bytes(), &bytes[at + written.len()..]].concat()
    }

    #[test]
    fn patched_subimage_line_still_decodes() {
        let bytes = with_subimage_line("65538 1 1 2 1 1 1 4 4\n");
        let header = read_header(&mut TokenCursor::new(Cursor::new(bytes))).unwrap();
        assert_eq!(header.geometry.width, 2);
    }

    #[test]
    fn oversized_subimage_is_a_format_error() {
        let bytes = with_subimage_line("65538 1 4294967296 4294967296 1 1 1 4 4\n");
        let err = read_header(&mut TokenCursor::new(Cursor::new(bytes))).unwrap_err();
        assert!(matches!(err, SifError::Format { .. }), "{err}");
    }

    #[test]
    fn subimage_extent_overflow_is_a_format_error() {
        let bytes = with_subimage_line("65538 1 1 9223372036854775807 0 1 1 4 4\n");
        let err = read_header(&mut TokenCursor::new(Cursor::new(bytes))).unwrap_err();
        assert!(matches!(err, SifError::Format { .. }), "{err}");

        let bytes = with_subimage_line("65538 -9223372036854775808 1 -1 1 1 -1 4 4\n");
        let err = read_header(&mut TokenCursor::new(Cursor::new(bytes))).unwrap_err();
        assert!(matches!(err, SifError::Format { .. }), "{err}");
    }

    #[test]
    fn absurd_detector_dimensions_are_a_format_error() {
        let err = header_of(&SifBuilder::new(1 << 40, 1)).unwrap_err();
        assert!(matches!(err, SifError::Format { .. }), "{err}");
        let err = header_of(&SifBuilder::new(4, -1)).unwrap_err();
        assert!(matches!(err, SifError::Format { .. }), "{err}");
    }
}
