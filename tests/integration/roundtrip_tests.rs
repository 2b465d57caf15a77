//! Writer to navigator round-trip tests.
//!
//! Every field written through [`TiffWriter`] must come back with the same
//! tag, type, count and value, in both byte orders and both addressing modes,
//! whether it is stored inline or at an offset.

use tiffnav::format::tiff::Field;
use tiffnav::{
    AddressingMode, ByteOrder, FieldType, MemoryStream, Navigator, TiffError, TiffWriter, Value,
};

const ORDERS: [ByteOrder; 2] = [ByteOrder::LittleEndian, ByteOrder::BigEndian];
const MODES: [AddressingMode; 2] = [AddressingMode::Narrow, AddressingMode::Wide];

/// One field of every storage type, some small enough to be inline and some not.
fn every_type() -> Vec<Field> {
    let values = vec![
        Value::Byte(vec![0, 127, 255]),
        Value::ascii("tiffnav round trip"),
        Value::Short(vec![1, 65535]),
        Value::Long(vec![0xDEAD_BEEF]),
        Value::Rational(vec![(72, 1), (300, 2)]),
        Value::SByte(vec![-128, 0, 127]),
        Value::Undefined(vec![1, 2, 3, 4, 5, 6, 7, 8, 9]),
        Value::SShort(vec![-32768, 32767, -1]),
        Value::SLong(vec![i32::MIN, -1]),
        Value::SRational(vec![(-1, 3)]),
        Value::Float(vec![1.5, -0.25, f32::MAX]),
        Value::Double(vec![std::f64::consts::PI]),
        Value::Ifd(vec![0]),
        Value::Long8(vec![u64::MAX, 1 << 40]),
        Value::SLong8(vec![i64::MIN]),
        Value::Ifd8(vec![0, 0]),
    ];
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| Field::new(65000 + i as u16, value))
        .collect()
}

fn write(order: ByteOrder, mode: AddressingMode, directories: &[Vec<Field>]) -> Vec<u8> {
    let mut writer = TiffWriter::new(MemoryStream::new(), order, mode).unwrap();
    for fields in directories {
        writer.write_directory(fields).unwrap();
    }
    writer.into_inner().into_inner()
}

#[test]
fn test_every_type_round_trips() {
    for order in ORDERS {
        for mode in MODES {
            let fields = every_type();
            let data = write(order, mode, &[fields.clone()]);

            let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();
            assert_eq!(nav.byte_order(), order);
            assert_eq!(nav.mode(), mode);

            let dir = nav.read_next_directory().unwrap().unwrap().clone();
            assert_eq!(dir.len(), fields.len());

            for field in &fields {
                let entry = dir.get(field.tag).unwrap();
                assert_eq!(entry.field_type, field.value.field_type(), "tag {}", field.tag);
                assert_eq!(entry.count, field.value.count(), "tag {}", field.tag);
                assert_eq!(
                    nav.read_value(entry).unwrap(),
                    field.value,
                    "{:?} {:?} tag {}",
                    order,
                    mode,
                    field.tag
                );
            }
        }
    }
}

#[test]
fn test_multi_string_text_round_trips() {
    // Two strings, the second with a byte that is not UTF-8
    let text = Value::Ascii(b"scanner\0lot \xB5\0".to_vec());
    let short = Value::Ascii(b"a\0b\0".to_vec());
    for order in ORDERS {
        for mode in MODES {
            let fields = vec![
                Field::new(65000, text.clone()),
                Field::new(65001, short.clone()),
            ];
            let data = write(order, mode, &[fields]);
            let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();
            let dir = nav.read_next_directory().unwrap().unwrap().clone();

            let read = nav.field_value(65000).unwrap().unwrap();
            assert_eq!(read, text);
            assert_eq!(dir.get(65000).unwrap().count, 14);
            assert_eq!(
                read.strings().unwrap(),
                vec!["scanner".to_string(), "lot \u{FFFD}".to_string()]
            );
            assert_eq!(nav.field_value(65001).unwrap(), Some(short.clone()));
            assert!(dir.get(65001).unwrap().is_inline);

            // Writing the value back keeps the entry count
            let again = write(order, mode, &[vec![Field::new(65000, read)]]);
            let mut nav = Navigator::open(MemoryStream::from_vec(again)).unwrap();
            let dir = nav.read_next_directory().unwrap().unwrap().clone();
            assert_eq!(dir.get(65000).unwrap().count, 14);
            assert_eq!(nav.field_value(65000).unwrap(), Some(text.clone()));
        }
    }
}

#[test]
fn test_inline_threshold_depends_on_mode() {
    // Eight bytes: inline in BigTIFF, at an offset in classic TIFF
    let fields = vec![Field::new(65000, Value::Undefined(vec![9; 8]))];
    for (mode, inline) in [(AddressingMode::Narrow, false), (AddressingMode::Wide, true)] {
        let data = write(ByteOrder::LittleEndian, mode, &[fields.clone()]);
        let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();
        let dir = nav.read_next_directory().unwrap().unwrap().clone();
        let entry = dir.get(65000).unwrap();

        assert_eq!(entry.is_inline, inline);
        assert_eq!(entry.value_byte_size(), 8);
        assert_eq!(nav.read_value(entry).unwrap(), fields[0].value);
    }
}

#[test]
fn test_fields_are_written_sorted() {
    let fields = vec![
        Field::new(305, Value::ascii("tiffnav")),
        Field::new(256, Value::Short(vec![4])),
        Field::new(257, Value::Short(vec![4])),
    ];
    let data = write(ByteOrder::BigEndian, AddressingMode::Narrow, &[fields]);
    let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();
    let dir = nav.read_next_directory().unwrap().unwrap();
    assert_eq!(dir.tag_ids().collect::<Vec<_>>(), vec![256, 257, 305]);
}

#[test]
fn test_chain_round_trips() {
    for order in ORDERS {
        for mode in MODES {
            let directories: Vec<Vec<Field>> = (1..=3u16)
                .map(|i| vec![Field::new(256, Value::Short(vec![i * 100]))])
                .collect();
            let data = write(order, mode, &directories);
            let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();

            let mut widths = Vec::new();
            while nav.read_next_directory().unwrap().is_some() {
                widths.push(nav.field_u64(256).unwrap().unwrap());
            }
            assert_eq!(widths, vec![100, 200, 300]);
            assert_eq!(nav.current_index(), Some(2));
            assert!(nav.is_last_directory());
        }
    }
}

#[test]
fn test_sub_directories_round_trip() {
    for mode in MODES {
        let mut writer = TiffWriter::new(MemoryStream::new(), ByteOrder::LittleEndian, mode).unwrap();
        let exif = writer
            .write_sub_directory(&[Field::new(36864, Value::Undefined(b"0230".to_vec()))])
            .unwrap();
        let reduced: Vec<u64> = (1..=2u16)
            .map(|i| {
                writer
                    .write_sub_directory(&[Field::new(256, Value::Short(vec![i]))])
                    .unwrap()
            })
            .collect();

        let sub_ifds = match mode {
            AddressingMode::Narrow => Value::Ifd(reduced.iter().map(|&o| o as u32).collect()),
            AddressingMode::Wide => Value::Ifd8(reduced.clone()),
        };
        writer
            .write_directory(&[
                Field::new(256, Value::Short(vec![8])),
                Field::new(330, sub_ifds),
                Field::new(34665, Value::Long(vec![exif as u32])),
            ])
            .unwrap();
        let data = writer.into_inner().into_inner();

        let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();
        nav.read_next_directory().unwrap();
        assert_eq!(nav.count_directories(), 1);
        assert_eq!(nav.sub_directory_offsets().unwrap(), reduced);

        let exif_dir = nav.exif_directory().unwrap().unwrap();
        let version = nav.read_value(exif_dir.get(36864).unwrap()).unwrap();
        assert_eq!(version, Value::Undefined(b"0230".to_vec()));

        let second = nav.sub_directory(330, 1).unwrap().unwrap();
        assert_eq!(second.offset(), reduced[1]);
        assert_eq!(
            nav.read_value(second.get(256).unwrap()).unwrap(),
            Value::Short(vec![2])
        );
        assert!(nav.gps_directory().unwrap().is_none());
    }
}

#[test]
fn test_writer_rejects_bad_directories() {
    let mut writer =
        TiffWriter::new(MemoryStream::new(), ByteOrder::LittleEndian, AddressingMode::Narrow)
            .unwrap();
    assert!(matches!(
        writer.write_directory(&[]),
        Err(TiffError::InvalidTagValue { .. })
    ));
    assert_eq!(
        writer
            .write_directory(&[
                Field::new(256, Value::Short(vec![1])),
                Field::new(256, Value::Short(vec![2])),
            ])
            .unwrap_err(),
        TiffError::DuplicateTag(256)
    );
    assert_eq!(writer.directory_count(), 0);
}

#[test]
fn test_value_accessors() {
    let fields = every_type();
    assert_eq!(fields[1].value.field_type(), FieldType::Ascii);
    assert_eq!(fields[1].value.count(), 19);
    assert_eq!(fields[1].value.as_str(), Some("tiffnav round trip"));
    assert_eq!(fields[13].value.first_u64(), Some(u64::MAX));
    assert!(fields[9].value.first_u64().is_none());
}
