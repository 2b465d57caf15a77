//! Block cache integration tests.
//!
//! Tests verify:
//! - Navigation through the cache matches navigation without it, for any
//!   block size
//! - Repeated traversal is served from cache
//! - Writes through the cache are visible to later reads
//! - Closing the navigator closes the whole stream stack

use std::fs::File;
use std::sync::atomic::Ordering;

use tiffnav::format::tiff::Field;
use tiffnav::{
    AddressingMode, ByteOrder, CachedStream, Directory, MemoryStream, Navigator, ReaderStream,
    Stream, TiffWriter, Value,
};

use super::test_utils::{tiled_image, TrackingStream};

/// Every main-chain directory plus the raw bytes of every unit.
fn snapshot<S: Stream>(nav: &mut Navigator<S>) -> (Vec<Directory>, Vec<Vec<u8>>) {
    let mut directories = Vec::new();
    let mut units = Vec::new();
    while let Some(dir) = nav.read_next_directory().unwrap() {
        directories.push(dir.clone());
        let addressing = nav.addressing().unwrap();
        for unit in 0..addressing.unit_count().unwrap() {
            units.push(nav.read_raw_unit(&addressing, unit).unwrap().to_vec());
        }
    }
    (directories, units)
}

#[test]
fn test_cached_navigation_matches_uncached() {
    let data = tiled_image(AddressingMode::Wide, 40, 40, 16);
    let expected = snapshot(&mut Navigator::open(MemoryStream::from_vec(data.clone())).unwrap());

    for block_size in [1, 7, 64, 4096] {
        let stream = CachedStream::with_capacity(MemoryStream::from_vec(data.clone()), block_size, 8);
        let mut nav = Navigator::open(stream).unwrap();
        assert_eq!(snapshot(&mut nav), expected, "block size {}", block_size);
    }
}

#[test]
fn test_repeated_traversal_hits_cache() {
    let data = tiled_image(AddressingMode::Narrow, 32, 32, 16);
    let tracking = TrackingStream::new(data);
    let reads = tracking.reads();

    let stream = CachedStream::with_capacity(tracking, 256, 64);
    let mut nav = Navigator::open(stream).unwrap();

    assert_eq!(nav.enumerate_all(10).count(), 1);
    let after_first = reads.load(Ordering::SeqCst);
    let misses = nav.stream().misses();

    for _ in 0..5 {
        assert_eq!(nav.enumerate_all(10).count(), 1);
    }
    assert_eq!(reads.load(Ordering::SeqCst), after_first);
    assert_eq!(nav.stream().misses(), misses);
    assert!(nav.stream().hits() >= 5);
}

#[test]
fn test_writes_through_cache_are_visible() {
    let stream = CachedStream::with_capacity(MemoryStream::new(), 16, 4);
    let mut writer = TiffWriter::new(stream, ByteOrder::BigEndian, AddressingMode::Narrow).unwrap();
    for width in [10u16, 20, 30] {
        writer
            .write_directory(&[Field::new(256, Value::Short(vec![width]))])
            .unwrap();
    }

    // Header and next-pointer patches pass through to the inner stream
    let mut nav = Navigator::open(writer.into_inner()).unwrap();
    let mut widths = Vec::new();
    while nav.read_next_directory().unwrap().is_some() {
        widths.push(nav.field_u64(256).unwrap().unwrap());
    }
    assert_eq!(widths, vec![10, 20, 30]);
}

#[test]
fn test_close_reaches_inner_stream() {
    let tracking = TrackingStream::new(tiled_image(AddressingMode::Narrow, 16, 16, 16));
    let closed = tracking.closed();

    let nav = Navigator::open(CachedStream::new(tracking)).unwrap();
    assert!(!closed.load(Ordering::SeqCst));
    nav.close().unwrap();
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn test_file_backed_stream() {
    let data = tiled_image(AddressingMode::Narrow, 48, 16, 16);
    let path = std::env::temp_dir().join(format!("tiffnav-cache-{}.tif", std::process::id()));
    std::fs::write(&path, &data).unwrap();

    let file = File::open(&path).unwrap();
    let reader = ReaderStream::new(file, path.display().to_string()).unwrap();
    assert_eq!(reader.size(), data.len() as u64);

    let mut nav = Navigator::open(CachedStream::with_capacity(reader, 64, 4)).unwrap();
    let expected = snapshot(&mut Navigator::open(MemoryStream::from_vec(data)).unwrap());
    assert_eq!(snapshot(&mut nav), expected);

    nav.close().unwrap();
    std::fs::remove_file(&path).unwrap();
}
