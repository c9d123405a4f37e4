use std::io::{Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian};
use ndarray::Array3;

use super::model::{FrameGeometry, SampleEncoding, TileDescriptor};
use crate::error::{Result, SifError};

/// Reported when a truncated file was accepted with fewer frames than its
/// header declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corruption {
    pub expected_frames: usize,
    pub decoded_frames: usize,
}

// ---------------------------------------------------------------------------
// Tile locator
// ---------------------------------------------------------------------------

/// One tile per frame, back to back from `base`.
///
/// Fails when a frame stride or tile offset does not fit in a file offset.
pub fn locate_tiles(
    base: u64,
    geometry: FrameGeometry,
    frames: usize,
) -> Result<Vec<TileDescriptor>> {
    let encoding = SampleEncoding::F32Le;
    let overflow = || SifError::format(base, "frame geometry overflows the file offset range");
    let stride = geometry.frame_bytes(encoding).ok_or_else(overflow)?;
    let height = geometry.total_height().ok_or_else(overflow)?;

    (0..frames)
        .map(|frame| {
            let offset = (frame as u64)
                .checked_mul(stride)
                .and_then(|o| o.checked_add(base))
                .ok_or_else(overflow)?;
            Ok(TileDescriptor {
                frame,
                offset,
                width: geometry.width,
                height,
                encoding,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pixel decoder
// ---------------------------------------------------------------------------

/// Read every tile into a `[frame][row][col]` cube.
///
/// A tile that ends early fails the decode with [`SifError::Truncated`],
/// unless `tolerate_truncation` is set: then reading stops and the cube holds
/// the frames read so far.
pub fn read_pixels<R: Read + Seek>(
    reader: &mut R,
    tiles: &[TileDescriptor],
    geometry: FrameGeometry,
    tolerate_truncation: bool,
) -> Result<(Array3<f32>, Option<Corruption>)> {
    let expected = tiles.len();
    let mut samples = Vec::new();
    let mut decoded = 0;
    let mut corruption = None;

    for tile in tiles {
        reader.seek(SeekFrom::Start(tile.offset))?;
        match read_tile(reader, tile)? {
            Some(frame) => {
                samples.extend_from_slice(&frame);
                decoded += 1;
            }
            None if tolerate_truncation => {
                log::warn!(
                    "The file might be corrupt: the header declares {expected} frames \
                     but only {decoded} could be read"
                );
                corruption = Some(Corruption {
                    expected_frames: expected,
                    decoded_frames: decoded,
                });
                break;
            }
            None => {
                return Err(SifError::Truncated {
                    expected,
                    found: decoded,
                })
            }
        }
    }

    let height = geometry
        .total_height()
        .ok_or_else(|| SifError::format(0, "frame height overflows"))?;
    let shape = (decoded, height, geometry.width);
    let cube = Array3::from_shape_vec(shape, samples)?;
    Ok((cube, corruption))
}

/// Samples of one tile, or `None` if the stream ends inside it.
fn read_tile<R: Read>(reader: &mut R, tile: &TileDescriptor) -> Result<Option<Vec<f32>>> {
    let len = tile
        .byte_len()
        .ok_or_else(|| SifError::format(tile.offset, "tile size overflows"))?;
    let mut bytes = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() < len {
        return Ok(None);
    }
    let mut frame = vec![0f32; tile.width * tile.height];
    match tile.encoding {
        SampleEncoding::F32Le => LittleEndian::read_f32_into(&bytes, &mut frame),
    }
    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn le_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    const GEOMETRY: FrameGeometry = FrameGeometry {
        width: 3,
        height: 1,
        subimages: 2,
    };

    #[test]
    fn tile_offsets_advance_by_frame_size() {
        let tiles = locate_tiles(100, GEOMETRY, 3).unwrap();
        let offsets: Vec<_> = tiles.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![100, 124, 148]);
        assert!(tiles.iter().all(|t| t.width == 3 && t.height == 2));
        assert_eq!(tiles[2].frame, 2);
    }

    #[test]
    fn tile_offsets_past_u64_are_rejected() {
        let wide = FrameGeometry {
            width: 1 << 20,
            height: 1 << 20,
            subimages: 1 << 10,
        };
        assert!(matches!(
            locate_tiles(0, wide, 1 << 20),
            Err(SifError::Format { .. })
        ));
        assert!(matches!(
            locate_tiles(u64::MAX, GEOMETRY, 2),
            Err(SifError::Format { offset: u64::MAX, .. })
        ));
    }

    #[test]
    fn reads_frames_row_major() {
        let mut data = vec![0xAA; 7];
        data.extend(le_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        data.extend(le_bytes(&[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]));
        let tiles = locate_tiles(7, GEOMETRY, 2).unwrap();

        let (cube, corruption) = read_pixels(&mut Cursor::new(data), &tiles, GEOMETRY, false).unwrap();
        assert_eq!(cube.dim(), (2, 2, 3));
        assert_eq!(cube[[0, 1, 0]], 4.0);
        assert_eq!(cube[[1, 0, 2]], 9.0);
        assert!(corruption.is_none());
    }

    #[test]
    fn short_frame_fails_by_default() {
        let mut data = le_bytes(&[1.0; 6]);
        data.extend(le_bytes(&[2.0; 5]));
        let tiles = locate_tiles(0, GEOMETRY, 2).unwrap();
        let err = read_pixels(&mut Cursor::new(data), &tiles, GEOMETRY, false).unwrap_err();
        assert!(matches!(err, SifError::Truncated { expected: 2, found: 1 }), "{err}");
    }

    #[test]
    fn short_frame_is_dropped_when_tolerated() {
        let mut data = le_bytes(&[1.0; 6]);
        data.extend(le_bytes(&[2.0; 6]));
        data.pop();
        let tiles = locate_tiles(0, GEOMETRY, 2).unwrap();
        let (cube, corruption) = read_pixels(&mut Cursor::new(data), &tiles, GEOMETRY, true).unwrap();
        assert_eq!(cube.dim(), (1, 2, 3));
        assert_eq!(
            corruption,
            Some(Corruption { expected_frames: 2, decoded_frames: 1 })
        );
    }
}
