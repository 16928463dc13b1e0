// tests/test_image.rs — Integration tests for the container and the wire
// codec, driven through the public API only.
//
// File fixtures are written byte-by-byte so the on-disk layout under test
// is spelled out in the test, not derived from the code being tested.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use edgewise::image::{Image, ImageError};
use edgewise::wire::{from_wire, to_wire};

// ===== Fixture helpers =====

/// Serialize a header + word list big-endian, the format's natural order.
fn file_bytes(d1: u32, d2: u32, words: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + words.len() * 4);
    bytes.extend_from_slice(&d1.to_be_bytes());
    bytes.extend_from_slice(&d2.to_be_bytes());
    for &w in words {
        bytes.extend_from_slice(&w.to_be_bytes());
    }
    bytes
}

fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

// ===== Codec =====

#[test]
fn codec_involution() {
    for x in [0u32, 1, 0x0000_00FF, 0x1234_5678, 0xFFFF_FFFF, 0x8000_0001] {
        assert_eq!(from_wire(to_wire(x)), x);
    }
}

#[test]
fn codec_is_big_endian() {
    let raw = u32::from_ne_bytes([0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(from_wire(raw), 0xDEAD_BEEF);
    assert_eq!(to_wire(0xDEAD_BEEF).to_ne_bytes(), [0xDE, 0xAD, 0xBE, 0xEF]);
}

// ===== Wide files (d1 >= d2): natural order =====

#[test]
fn load_wide_file_row_major() {
    let dir = TempDir::new().unwrap();
    // 3 wide, 2 tall:
    //   [11, 22, 33]
    //   [44, 55, 66]
    let path = write_fixture(&dir, "wide.data", &file_bytes(3, 2, &[11, 22, 33, 44, 55, 66]));

    let img = Image::load(&path).unwrap();
    assert_eq!(img.width(), 3);
    assert_eq!(img.height(), 2);
    assert!(!img.is_transposed());
    assert_eq!(img.pixels(), &[11, 22, 33, 44, 55, 66]);
    assert_eq!(img.get(2, 1), 66);
}

#[test]
fn save_wide_is_byte_exact() {
    let dir = TempDir::new().unwrap();
    let img = Image::from_vec(3, 2, vec![0x01020304, 0, 0xFFFFFFFF, 7, 8, 9]);
    let path = dir.path().join("out.data");
    img.save(&path).unwrap();

    let expected = file_bytes(3, 2, &[0x01020304, 0, 0xFFFFFFFF, 7, 8, 9]);
    assert_eq!(fs::read(&path).unwrap(), expected);
}

#[test]
fn round_trip_wide() {
    let dir = TempDir::new().unwrap();
    let original = file_bytes(4, 4, &(0u32..16).map(|i| i * 0x01010101).collect::<Vec<_>>());
    let src = write_fixture(&dir, "sq.data", &original);
    let dst = dir.path().join("sq2.data");

    Image::load(&src).unwrap().save(&dst).unwrap();
    assert_eq!(fs::read(&dst).unwrap(), original);
}

// ===== Tall files (d1 < d2): orientation normalization =====

#[test]
fn load_tall_file_transposes() {
    let dir = TempDir::new().unwrap();
    // Declared 2×3 (tall): the body is the row-major raster of a 2-wide,
    // 3-tall image:
    //   [w0, w1]
    //   [w2, w3]
    //   [w4, w5]
    let words = [10u32, 11, 20, 21, 30, 31];
    let path = write_fixture(&dir, "tall.data", &file_bytes(2, 3, &words));

    let img = Image::load(&path).unwrap();
    // Normalized to wide: width 3, height 2, transposed raster.
    assert_eq!(img.width(), 3);
    assert_eq!(img.height(), 2);
    assert!(img.is_transposed());
    // loaded(row r, col c) == tall(row c, col r)
    assert_eq!(img.get(0, 0), 10);
    assert_eq!(img.get(0, 1), 11);
    assert_eq!(img.get(1, 0), 20);
    assert_eq!(img.get(1, 1), 21);
    assert_eq!(img.get(2, 0), 30);
    assert_eq!(img.get(2, 1), 31);
}

#[test]
fn round_trip_tall_is_byte_exact() {
    let dir = TempDir::new().unwrap();
    // 3×5 (tall) with distinct words everywhere.
    let words: Vec<u32> = (0..15).map(|i| 0xA000_0000 + i).collect();
    let original = file_bytes(3, 5, &words);
    let src = write_fixture(&dir, "tall.data", &original);
    let dst = dir.path().join("tall2.data");

    let img = Image::load(&src).unwrap();
    assert!(img.is_transposed());
    assert_eq!(img.width(), 5);
    assert_eq!(img.height(), 3);
    img.save(&dst).unwrap();
    assert_eq!(fs::read(&dst).unwrap(), original);
}

#[test]
fn square_file_is_not_transposed() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "sq.data", &file_bytes(2, 2, &[1, 2, 3, 4]));
    let img = Image::load(&path).unwrap();
    assert!(!img.is_transposed());
    assert_eq!(img.pixels(), &[1, 2, 3, 4]);
}

// ===== Malformed input =====

#[test]
fn truncated_header_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "short.data", &[0, 0, 0, 2, 0, 0]);
    let err = Image::load(&path).unwrap_err();
    assert!(matches!(err, ImageError::Truncated { .. }), "got {err}");
}

#[test]
fn truncated_body_fails() {
    let dir = TempDir::new().unwrap();
    // Declares 3×2 = 6 words, carries 4.
    let path = write_fixture(&dir, "trunc.data", &file_bytes(3, 2, &[1, 2, 3, 4]));
    let err = Image::load(&path).unwrap_err();
    match err {
        ImageError::Truncated { d1, d2, .. } => {
            assert_eq!((d1, d2), (3, 2));
        }
        other => panic!("expected Truncated, got {other}"),
    }
}

#[test]
fn truncated_tall_body_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "trunc_tall.data", &file_bytes(2, 3, &[1, 2, 3]));
    let err = Image::load(&path).unwrap_err();
    assert!(matches!(err, ImageError::Truncated { .. }), "got {err}");
}

#[test]
fn zero_dimension_fails() {
    let dir = TempDir::new().unwrap();
    for (d1, d2) in [(0u32, 5u32), (5, 0), (0, 0)] {
        let path = write_fixture(&dir, "zero.data", &file_bytes(d1, d2, &[]));
        let err = Image::load(&path).unwrap_err();
        assert!(
            matches!(err, ImageError::ZeroDimension { .. }),
            "({d1},{d2}): got {err}"
        );
    }
}

#[test]
fn oversized_declaration_fails() {
    let dir = TempDir::new().unwrap();
    // u32::MAX × u32::MAX words cannot exist; must fail before allocating.
    let path = write_fixture(&dir, "huge.data", &file_bytes(u32::MAX, u32::MAX, &[1, 2]));
    let err = Image::load(&path).unwrap_err();
    assert!(matches!(err, ImageError::Truncated { .. }), "got {err}");
}

#[test]
fn missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = Image::load(dir.path().join("absent.data")).unwrap_err();
    assert!(matches!(err, ImageError::Io { .. }), "got {err}");
}

#[test]
fn save_into_missing_directory_is_io_error() {
    let dir = TempDir::new().unwrap();
    let img = Image::from_vec(1, 1, vec![0]);
    let err = img
        .save(dir.path().join("no/such/dir/out.data"))
        .unwrap_err();
    assert!(matches!(err, ImageError::Io { .. }), "got {err}");
}

// ===== Reload invariant =====

#[test]
fn load_replaces_buffer_entirely() {
    // Loading a second, smaller file must not keep any trace of the first.
    let dir = TempDir::new().unwrap();
    let big = write_fixture(&dir, "big.data", &file_bytes(4, 4, &[9; 16]));
    let small = write_fixture(&dir, "small.data", &file_bytes(2, 1, &[1, 2]));

    let a = Image::load(&big).unwrap();
    assert_eq!(a.pixels().len(), 16);
    let b = Image::load(&small).unwrap();
    assert_eq!(b.pixels(), &[1, 2]);
    assert_eq!(b.width(), 2);
    assert_eq!(b.height(), 1);
}
