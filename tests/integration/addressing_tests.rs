//! Strip and tile addressing tests.
//!
//! Tests verify:
//! - Unit counts, spans and decoded sizes for strips and tiles
//! - Edge strips and edge tiles
//! - Codec and predictor dispatch through the registry
//! - Bounds and allocation checks on unit access

use tiffnav::format::tiff::Field;
use tiffnav::{
    AddressingMode, ByteOrder, Codec, CodecError, CodecRegistry, Limits, MemoryStream,
    Navigator, OpenOptions, PlanarConfig, Predictor, TiffError, TiffWriter, UnitLayout, Value,
};

use super::test_utils::{default_image, entry, pattern, strip_image, tiled_image, RawTiff};

fn open(data: Vec<u8>) -> Navigator<MemoryStream> {
    let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();
    nav.read_next_directory().unwrap().unwrap();
    nav
}

fn open_limited(data: Vec<u8>, limits: Limits) -> Navigator<MemoryStream> {
    let options = OpenOptions::default().limits(limits);
    let mut nav = Navigator::open_with_options(MemoryStream::from_vec(data), options).unwrap();
    nav.read_next_directory().unwrap().unwrap();
    nav
}

/// Classic file with one stripped directory: `blobs` become the strips and
/// `fields` are written alongside the unit tables.
fn strips_with(blobs: &[Vec<u8>], fields: Vec<Field>) -> Vec<u8> {
    let mut writer =
        TiffWriter::new(MemoryStream::new(), ByteOrder::LittleEndian, AddressingMode::Narrow)
            .unwrap();
    let mut offsets = Vec::new();
    let mut counts = Vec::new();
    for blob in blobs {
        offsets.push(writer.write_blob(blob).unwrap() as u32);
        counts.push(blob.len() as u32);
    }
    let mut fields = fields;
    fields.push(Field::new(273, Value::Long(offsets)));
    fields.push(Field::new(279, Value::Long(counts)));
    writer.write_directory(&fields).unwrap();
    writer.into_inner().into_inner()
}

fn gray_fields(width: u32, height: u32, rows_per_strip: u32) -> Vec<Field> {
    vec![
        Field::new(256, Value::Long(vec![width])),
        Field::new(257, Value::Long(vec![height])),
        Field::new(258, Value::Short(vec![8])),
        Field::new(278, Value::Long(vec![rows_per_strip])),
    ]
}

// =============================================================================
// Strips
// =============================================================================

#[test]
fn test_strip_units_both_modes() {
    for mode in [AddressingMode::Narrow, AddressingMode::Wide] {
        let mut nav = open(strip_image(mode, 16, 16, 4));
        let addressing = nav.addressing().unwrap();

        assert_eq!(addressing.layout, UnitLayout::Strips);
        assert_eq!(addressing.mode, mode);
        assert_eq!(addressing.unit_count().unwrap(), 4);
        assert_eq!(addressing.table_len(), 4);
        assert_eq!(addressing.strip_size().unwrap(), 64);
        assert_eq!(addressing.image_size().unwrap(), 256);

        let registry = CodecRegistry::new();
        for strip in 0..4 {
            let raw = nav.read_raw_unit(&addressing, strip).unwrap();
            assert_eq!(raw.len(), 64);
            assert_eq!(addressing.unit_compressed_size(strip).unwrap(), 64);

            let decoded = nav.read_decoded_unit(&addressing, strip, &registry).unwrap();
            for (i, &byte) in decoded.iter().enumerate() {
                let (x, y) = (i as u64 % 16, strip * 4 + i as u64 / 16);
                assert_eq!(byte, pattern(x, y));
            }
        }
    }
}

#[test]
fn test_last_strip_is_short() {
    let mut nav = open(strip_image(AddressingMode::Narrow, 10, 10, 4));
    let addressing = nav.addressing().unwrap();

    assert_eq!(addressing.unit_count().unwrap(), 3);
    assert_eq!(addressing.strip_rows(0).unwrap(), 4);
    assert_eq!(addressing.strip_rows(2).unwrap(), 2);
    assert_eq!(addressing.unit_uncompressed_size(0).unwrap(), 40);
    assert_eq!(addressing.unit_uncompressed_size(2).unwrap(), 20);

    let decoded = nav
        .read_decoded_unit(&addressing, 2, &CodecRegistry::new())
        .unwrap();
    assert_eq!(decoded.len(), 20);
    assert_eq!(decoded[0], pattern(0, 8));
    assert_eq!(decoded[19], pattern(9, 9));

    assert_eq!(addressing.compute_strip(9, 0).unwrap(), 2);
    assert!(matches!(
        addressing.compute_strip(10, 0),
        Err(TiffError::OutOfRangeReference { offset: 10, .. })
    ));
}

#[test]
fn test_rows_per_strip_clamped_to_height() {
    let mut nav = open(strip_image(AddressingMode::Narrow, 8, 5, 1000));
    let addressing = nav.addressing().unwrap();
    assert_eq!(addressing.rows_per_strip, 5);
    assert_eq!(addressing.unit_count().unwrap(), 1);
    assert_eq!(addressing.strip_size().unwrap(), 40);
}

#[test]
fn test_default_strip_geometry_resolves() {
    // 2000-byte rows: four rows fill a default strip
    let mut nav = open(default_image(AddressingMode::Narrow, UnitLayout::Strips, 2000, 18));
    let addressing = nav.addressing().unwrap();

    assert_eq!(addressing.rows_per_strip, 4);
    assert_eq!(addressing.unit_count().unwrap(), 5);
    assert_eq!(addressing.strip_rows(4).unwrap(), 2);
    assert_eq!(addressing.compute_strip(17, 0).unwrap(), 4);

    let decoded = nav
        .read_decoded_unit(&addressing, 4, &CodecRegistry::new())
        .unwrap();
    assert_eq!(decoded.len(), 4000);
    assert_eq!(decoded[0], pattern(0, 16));
    assert_eq!(decoded[3999], pattern(1999, 17));
}

#[test]
fn test_unit_table_length_checked() {
    // 4x8 image in 2-row strips needs four strips
    for (strips, readable) in [(3u8, 3u64), (5, 4)] {
        let blobs: Vec<Vec<u8>> = (0..strips).map(|i| vec![i; 8]).collect();
        let data = strips_with(&blobs, gray_fields(4, 8, 2));

        let mut nav = open(data.clone());
        let addressing = nav.addressing().unwrap();
        assert_eq!(addressing.unit_count().unwrap(), 4);
        assert_eq!(addressing.table_len(), strips as usize);
        for unit in 0..readable {
            assert_eq!(nav.read_raw_unit(&addressing, unit).unwrap().to_vec(), vec![unit as u8; 8]);
        }
        assert!(matches!(
            addressing.unit_span(readable),
            Err(TiffError::OutOfRangeReference { .. })
        ));

        let strict = OpenOptions::default().strict(true);
        let mut nav = Navigator::open_with_options(MemoryStream::from_vec(data), strict).unwrap();
        nav.read_next_directory().unwrap().unwrap();
        assert!(matches!(
            nav.addressing(),
            Err(TiffError::MalformedDirectory { reason, .. }) if reason.contains("StripOffsets")
        ));
    }

    // Matching tables pass in strict mode
    let blobs: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 8]).collect();
    let strict = OpenOptions::default().strict(true);
    let data = strips_with(&blobs, gray_fields(4, 8, 2));
    let mut nav = Navigator::open_with_options(MemoryStream::from_vec(data), strict).unwrap();
    nav.read_next_directory().unwrap().unwrap();
    assert_eq!(nav.addressing().unwrap().unit_count().unwrap(), 4);
}

#[test]
fn test_separate_planes() {
    // Three 4x4 planes, two strips each
    let blobs: Vec<Vec<u8>> = (0..6u8).map(|i| vec![i; 8]).collect();
    let mut fields = gray_fields(4, 4, 2);
    fields.push(Field::new(277, Value::Short(vec![3])));
    fields.push(Field::new(284, Value::Short(vec![2])));
    let mut nav = open(strips_with(&blobs, fields));
    let addressing = nav.addressing().unwrap();

    assert_eq!(addressing.planar, PlanarConfig::Separate);
    assert_eq!(addressing.planes(), 3);
    assert_eq!(addressing.strips_per_plane().unwrap(), 2);
    assert_eq!(addressing.unit_count().unwrap(), 6);
    assert_eq!(addressing.scanline_size().unwrap(), 4);
    assert_eq!(addressing.image_size().unwrap(), 48);

    assert_eq!(addressing.compute_strip(3, 2).unwrap(), 5);
    assert!(addressing.compute_strip(0, 3).is_err());
    assert_eq!(nav.read_raw_unit(&addressing, 5).unwrap().to_vec(), vec![5u8; 8]);
}

#[test]
fn test_missing_unit_table() {
    let data = RawTiff::narrow(8)
        .directory(8, &[entry(256, 3, 1, 4), entry(257, 3, 1, 4)], 0)
        .build();
    let mut nav = open(data);
    let addressing = nav.addressing().unwrap();

    assert_eq!(addressing.table_len(), 0);
    assert_eq!(addressing.unit_count().unwrap(), 1);
    assert!(matches!(
        addressing.unit_span(0),
        Err(TiffError::OutOfRangeReference { offset: 0, size: 0, .. })
    ));
}

#[test]
fn test_missing_dimensions() {
    let data = RawTiff::narrow(8)
        .directory(8, &[entry(256, 3, 1, 4)], 0)
        .build();
    let mut nav = open(data);
    assert_eq!(
        nav.addressing().unwrap_err(),
        TiffError::MissingTag("ImageLength")
    );
}

#[test]
fn test_byte_count_beyond_stream() {
    // One strip of 1000 bytes claimed at offset 8 of a tiny file
    let data = RawTiff::narrow(8)
        .directory(
            8,
            &[
                entry(256, 3, 1, 10),
                entry(257, 3, 1, 100),
                entry(273, 4, 1, 8),
                entry(279, 4, 1, 1000),
            ],
            0,
        )
        .build();
    let mut nav = open(data);
    let addressing = nav.addressing().unwrap();

    assert!(matches!(
        addressing.unit_span(0),
        Err(TiffError::OutOfRangeReference { offset: 8, length: 1000, .. })
    ));
    assert!(nav.read_raw_unit(&addressing, 0).is_err());
}

// =============================================================================
// Tiles
// =============================================================================

#[test]
fn test_tiles_with_edges() {
    for mode in [AddressingMode::Narrow, AddressingMode::Wide] {
        let mut nav = open(tiled_image(mode, 40, 24, 16));
        let addressing = nav.addressing().unwrap();

        assert!(addressing.is_tiled());
        assert_eq!(addressing.tiles_across().unwrap(), (3, 2, 1));
        assert_eq!(addressing.unit_count().unwrap(), 6);
        assert_eq!(addressing.tile_size().unwrap(), 256);
        assert_eq!(addressing.tile_row_size().unwrap(), 16);

        assert_eq!(addressing.tile_dimensions(0).unwrap(), (16, 16, 1));
        assert_eq!(addressing.tile_dimensions(2).unwrap(), (8, 16, 1));
        assert_eq!(addressing.tile_dimensions(5).unwrap(), (8, 8, 1));
        // Edge tiles are still stored full size
        assert_eq!(addressing.unit_uncompressed_size(5).unwrap(), 256);

        assert_eq!(addressing.compute_tile(0, 0, 0, 0).unwrap(), 0);
        assert_eq!(addressing.compute_tile(17, 3, 0, 0).unwrap(), 1);
        assert_eq!(addressing.compute_tile(39, 23, 0, 0).unwrap(), 5);
        assert!(addressing.compute_tile(40, 0, 0, 0).is_err());

        let decoded = nav
            .read_decoded_unit(&addressing, 4, &CodecRegistry::new())
            .unwrap();
        assert_eq!(decoded.len(), 256);
        assert_eq!(decoded[0], pattern(16, 16));
        assert_eq!(decoded[7 * 16 + 15], pattern(31, 23));
        // Row 8 of the bottom tiles lies below the image
        assert_eq!(decoded[8 * 16], 0);
    }
}

#[test]
fn test_default_tile_geometry_resolves() {
    let mut nav = open(default_image(AddressingMode::Wide, UnitLayout::Tiles, 300, 260));
    let addressing = nav.addressing().unwrap();

    assert_eq!((addressing.tile_width, addressing.tile_length), (256, 256));
    assert_eq!(addressing.tiles_across().unwrap(), (2, 2, 1));
    assert_eq!(addressing.tile_dimensions(3).unwrap(), (44, 4, 1));
    assert_eq!(addressing.compute_tile(299, 259, 0, 0).unwrap(), 3);

    let decoded = nav
        .read_decoded_unit(&addressing, 3, &CodecRegistry::new())
        .unwrap();
    assert_eq!(decoded.len(), 256 * 256);
    assert_eq!(decoded[0], pattern(256, 256));
}

#[test]
fn test_zero_tile_dimension() {
    let data = RawTiff::narrow(8)
        .directory(
            8,
            &[
                entry(256, 3, 1, 64),
                entry(257, 3, 1, 64),
                entry(322, 3, 1, 0),
                entry(323, 3, 1, 16),
            ],
            0,
        )
        .build();
    let mut nav = open(data);
    let addressing = nav.addressing().unwrap();

    assert!(addressing.is_tiled());
    assert!(matches!(
        addressing.unit_count(),
        Err(TiffError::InvalidGeometry(_))
    ));
    assert!(addressing.tile_size().is_err());
    assert!(addressing.unit_span(0).is_err());
}

// =============================================================================
// Limits
// =============================================================================

#[test]
fn test_image_size_above_cumulative_limit() {
    let limits = Limits::default().with_max_cumulative_alloc(200);
    let mut nav = open_limited(strip_image(AddressingMode::Narrow, 16, 16, 4), limits);
    let addressing = nav.addressing().unwrap();

    assert_eq!(
        addressing.image_size().unwrap_err(),
        TiffError::AllocationLimitExceeded {
            requested: 256,
            limit: 200
        }
    );
}

#[test]
fn test_unit_above_single_limit() {
    // 256-byte strips; the directory table itself stays under the limit
    let limits = Limits::default().with_max_single_alloc(200);
    let mut nav = open_limited(strip_image(AddressingMode::Narrow, 32, 32, 8), limits);
    let addressing = nav.addressing().unwrap();

    assert!(matches!(
        nav.read_raw_unit(&addressing, 0),
        Err(TiffError::AllocationLimitExceeded { requested: 256, limit: 200 })
    ));
    assert!(matches!(
        nav.read_decoded_unit(&addressing, 0, &CodecRegistry::new()),
        Err(TiffError::AllocationLimitExceeded { .. })
    ));
}

// =============================================================================
// Codecs
// =============================================================================

/// Undo 8-bit horizontal differencing.
struct Accumulate;

impl Predictor for Accumulate {
    fn transform(
        &self,
        row: &[u8],
        _row_width: usize,
        sample_width: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let mut out = row.to_vec();
        for i in sample_width..out.len() {
            out[i] = out[i].wrapping_add(out[i - sample_width]);
        }
        Ok(out)
    }
}

/// Expands each (count, byte) pair into `count` copies of `byte`.
struct RunLength;

impl Codec for RunLength {
    fn decode(&self, compressed: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
        if compressed.len() % 2 != 0 {
            return Err(CodecError::Corrupt("odd run-length input".to_string()));
        }
        let mut out = Vec::with_capacity(expected_size);
        for pair in compressed.chunks(2) {
            out.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
        }
        Ok(out)
    }
}

#[test]
fn test_unsupported_compression_and_predictor() {
    let mut fields = gray_fields(4, 1, 1);
    fields.push(Field::new(259, Value::Short(vec![5])));
    let mut nav = open(strips_with(&[vec![0; 4]], fields));
    let addressing = nav.addressing().unwrap();

    assert_eq!(addressing.compression, 5);
    assert_eq!(
        nav.read_decoded_unit(&addressing, 0, &CodecRegistry::new())
            .unwrap_err(),
        TiffError::UnsupportedCompression(5)
    );
    // Raw access does not need a codec
    assert_eq!(nav.read_raw_unit(&addressing, 0).unwrap().len(), 4);

    let mut fields = gray_fields(4, 1, 1);
    fields.push(Field::new(317, Value::Short(vec![2])));
    let mut nav = open(strips_with(&[vec![0; 4]], fields));
    let addressing = nav.addressing().unwrap();
    assert_eq!(
        nav.read_decoded_unit(&addressing, 0, &CodecRegistry::new())
            .unwrap_err(),
        TiffError::UnsupportedPredictor(2)
    );
}

#[test]
fn test_custom_codec_and_predictor() {
    // Two rows of four pixels, differenced, then run-length coded
    let mut fields = gray_fields(4, 2, 2);
    fields.push(Field::new(259, Value::Short(vec![32773])));
    fields.push(Field::new(317, Value::Short(vec![2])));
    let encoded = vec![1, 10, 3, 1, 1, 20, 3, 2];
    let mut nav = open(strips_with(&[encoded], fields));
    let addressing = nav.addressing().unwrap();

    let mut registry = CodecRegistry::new();
    registry.register_codec(32773, RunLength);
    registry.register_predictor(2, Accumulate);

    let decoded = nav.read_decoded_unit(&addressing, 0, &registry).unwrap();
    assert_eq!(decoded, vec![10, 11, 12, 13, 20, 22, 24, 26]);
}

#[test]
fn test_codec_errors_name_the_unit() {
    let mut fields = gray_fields(4, 2, 1);
    fields.push(Field::new(259, Value::Short(vec![32773])));
    let mut nav = open(strips_with(&[vec![4, 1], vec![4, 1, 9]], fields));
    let addressing = nav.addressing().unwrap();

    let mut registry = CodecRegistry::new();
    registry.register_codec(32773, RunLength);

    assert_eq!(nav.read_decoded_unit(&addressing, 0, &registry).unwrap(), vec![1; 4]);
    assert!(matches!(
        nav.read_decoded_unit(&addressing, 1, &registry),
        Err(TiffError::Codec { unit: 1, source: CodecError::Corrupt(_) })
    ));
}

#[test]
fn test_short_payload_is_size_mismatch() {
    // A 4x4 strip needs 16 bytes; only 10 are stored
    let mut nav = open(strips_with(&[vec![7; 10]], gray_fields(4, 4, 4)));
    let addressing = nav.addressing().unwrap();

    assert_eq!(
        nav.read_decoded_unit(&addressing, 0, &CodecRegistry::new())
            .unwrap_err(),
        TiffError::Codec {
            unit: 0,
            source: CodecError::SizeMismatch {
                expected: 16,
                actual: 10
            }
        }
    );
}
