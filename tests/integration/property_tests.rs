//! Randomized tests over arbitrary input.
//!
//! Navigation over random bytes must end without panicking, chains of any
//! shape yield each directory at most once, and every unit span handed out
//! lies inside the stream.

use arbtest::arbitrary::Unstructured;
use tiffnav::format::tiff::Field;
use tiffnav::{
    AddressingMode, ByteOrder, CodecRegistry, MemoryStream, Navigator, TiffError, TiffWriter,
    Value,
};

use super::test_utils::{entry, RawTiff};

/// Walk the whole chain, touching every unit of every directory.
fn exercise(data: Vec<u8>) -> usize {
    let size = data.len() as u64;
    let Ok(mut nav) = Navigator::open(MemoryStream::from_vec(data)) else {
        return 0;
    };
    let registry = CodecRegistry::new();

    let mut seen = 0;
    loop {
        match nav.read_next_directory() {
            Ok(Some(_)) => seen += 1,
            _ => break,
        }
        let Ok(addressing) = nav.addressing() else {
            continue;
        };
        let units = addressing.unit_count().unwrap_or(0).min(64);
        for unit in 0..units {
            if let Ok((offset, length)) = addressing.unit_span(unit) {
                assert!(offset + length <= size);
            }
            let _ = nav.read_decoded_unit(&addressing, unit, &registry);
        }
        let _ = nav.sub_directory_offsets();
        let _ = nav.exif_directory();
    }
    seen
}

fn header(u: &mut Unstructured<'_>, first: u64) -> arbtest::arbitrary::Result<RawTiff> {
    let order = if u.arbitrary()? {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    };
    let mode = if u.arbitrary()? {
        AddressingMode::Narrow
    } else {
        AddressingMode::Wide
    };
    Ok(RawTiff::new(order, mode, first))
}

#[test]
fn test_random_bytes_after_header() {
    arbtest::arbtest(|u| {
        let first = u.int_in_range(0..=96u64)?;
        let body: Vec<u8> = u.arbitrary()?;
        let data = header(u, first)?.bytes_at(16, &body).build();

        let max = data.len();
        assert!(exercise(data) <= max);
        Ok(())
    });
}

#[test]
fn test_random_chains_visit_each_directory_once() {
    arbtest::arbtest(|u| {
        let n = u.int_in_range(1..=16usize)?;
        // Single-entry classic directories, 24 bytes apart
        let offset = |i: usize| 8 + 24 * i as u64;

        let mut tiff = RawTiff::narrow(offset(0));
        for i in 0..n {
            let next = match u.int_in_range(0..=n)? {
                0 => 0,
                target => offset(target - 1),
            };
            tiff = tiff.directory(offset(i), &[entry(256, 3, 1, i as u64)], next);
        }
        let data = tiff.build();

        let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();
        let mut calls = 0;
        while nav.read_next_directory().unwrap().is_some() {
            calls += 1;
            assert!(calls <= n);
        }
        assert!(nav.stop_reason().is_some());
        assert_eq!(nav.count_directories(), calls);
        Ok(())
    });
}

#[test]
fn test_random_unit_tables_stay_in_bounds() {
    arbtest::arbtest(|u| {
        // At least two strips so both tables are stored at an offset
        let strips = u.int_in_range(2..=8u64)?;
        let width = u.int_in_range(1..=32u64)?;
        let height = u.int_in_range(1..=32u64)?;
        let rows_per_strip = u.int_in_range(1..=32u64)?;

        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for _ in 0..strips {
            offsets.push(u.int_in_range(0..=400u64)?);
            counts.push(u.int_in_range(0..=400u64)?);
        }

        let data = RawTiff::narrow(8)
            .directory(
                8,
                &[
                    entry(256, 3, 1, width),
                    entry(257, 3, 1, height),
                    entry(273, 4, strips, 100),
                    entry(278, 3, 1, rows_per_strip),
                    entry(279, 4, strips, 200),
                ],
                0,
            )
            .words_at(100, &offsets)
            .words_at(200, &counts)
            .pad_to(300)
            .build();
        let size = data.len() as u64;

        let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();
        nav.read_next_directory().unwrap();
        let addressing = nav.addressing().unwrap();

        for unit in 0..strips + 2 {
            match addressing.unit_span(unit) {
                Ok((offset, length)) => {
                    assert!(offset + length <= size);
                    assert_eq!(nav.read_raw_unit(&addressing, unit).unwrap().len() as u64, length);
                }
                Err(e) => assert!(matches!(e, TiffError::OutOfRangeReference { .. })),
            }
        }
        Ok(())
    });
}

#[test]
fn test_random_fields_round_trip() {
    arbtest::arbtest(|u| {
        let shorts: Vec<u16> = u.arbitrary()?;
        let longs: Vec<u64> = u.arbitrary()?;
        let signed: Vec<i32> = u.arbitrary()?;
        let text: Vec<u8> = u.arbitrary()?;

        let mut fields = vec![Field::new(256, Value::Short(vec![1]))];
        if !shorts.is_empty() {
            fields.push(Field::new(65000, Value::Short(shorts)));
        }
        if !longs.is_empty() {
            fields.push(Field::new(65001, Value::Long8(longs)));
        }
        if !signed.is_empty() {
            fields.push(Field::new(65002, Value::SLong(signed)));
        }
        // Any bytes, embedded NULs included
        fields.push(Field::new(65003, Value::Ascii(text)));

        let order = if u.arbitrary()? {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        };
        let mut writer = TiffWriter::new(MemoryStream::new(), order, AddressingMode::Wide).unwrap();
        writer.write_directory(&fields).unwrap();
        let data = writer.into_inner().into_inner();

        let mut nav = Navigator::open(MemoryStream::from_vec(data)).unwrap();
        nav.read_next_directory().unwrap();
        for field in &fields {
            assert_eq!(nav.field_value(field.tag).unwrap().as_ref(), Some(&field.value));
        }
        Ok(())
    });
}
