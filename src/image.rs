// image.rs — Image container with binary load/save and orientation
// normalization.
//
// FILE FORMAT (fixed-width, big-endian, no magic, no version tag):
//
//   offset 0:  d1  (u32, big-endian)
//   offset 4:  d2  (u32, big-endian)
//   offset 8:  d1 * d2 pixel words (u32 each, big-endian)
//
// The writer always stores the declared major dimension first, so the body
// is the row-major raster of a d1-wide, d2-tall image. On load we normalize
// to a "wide" raster (width >= height): when d1 < d2 the body is transposed
// during the read and the `transposed` flag records that, letting `save`
// emit a byte stream identical to a file that was never loaded.
//
// The pixel buffer is reallocated fresh on every load and exclusively owned
// by the Image — nothing aliases it across calls.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::wire::{from_wire, to_wire};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from loading or saving an image file.
#[derive(Debug)]
pub enum ImageError {
    /// The file could not be opened, read, or written.
    Io { path: PathBuf, source: io::Error },
    /// The header declares a zero dimension; the raster would be empty.
    ZeroDimension { path: PathBuf, d1: u32, d2: u32 },
    /// The file is shorter than its declared header + body size, or
    /// declares more pixel data than the address space can hold.
    Truncated { path: PathBuf, d1: u32, d2: u32 },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Io { path, source } => {
                write!(f, "i/o error on {}: {source}", path.display())
            }
            ImageError::ZeroDimension { path, d1, d2 } => write!(
                f,
                "{}: header declares a zero dimension ({d1}×{d2})",
                path.display()
            ),
            ImageError::Truncated { path, d1, d2 } => write!(
                f,
                "{}: file shorter than declared size ({d1}×{d2} pixel words)",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// A raster of packed 32-bit RGBA pixels, stored row-major with
/// `width >= height` after a successful load (see the orientation notes in
/// the header of this file).
pub struct Image {
    /// Row-major pixel words; length == width * height.
    pixels: Vec<u32>,
    width: u32,
    height: u32,
    /// True when storage was transposed relative to the file's natural
    /// order. `save` uses this to invert the transform exactly.
    transposed: bool,
}

impl Image {
    // --- Constructors ---

    /// Build an image from an existing pixel vector, row-major, untransposed.
    ///
    /// # Panics
    /// Panics if `pixels.len() != width * height`.
    pub fn from_vec(width: u32, height: u32, pixels: Vec<u32>) -> Self {
        assert_eq!(
            pixels.len(),
            width as usize * height as usize,
            "pixel count ({}) must equal width * height ({width}×{height})",
            pixels.len(),
        );
        Image {
            pixels,
            width,
            height,
            transposed: false,
        }
    }

    /// Internal constructor that preserves an orientation flag, used when a
    /// filter pass rebuilds an image from a device readback.
    pub(crate) fn from_vec_oriented(
        width: u32,
        height: u32,
        transposed: bool,
        pixels: Vec<u32>,
    ) -> Self {
        let mut img = Self::from_vec(width, height, pixels);
        img.transposed = transposed;
        img
    }

    // --- Accessors ---

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn is_transposed(&self) -> bool {
        self.transposed
    }

    /// The pixel buffer, row-major, length `width * height`.
    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Pixel at column `x`, row `y`.
    ///
    /// # Panics
    /// Panics if `(x, y)` is out of bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for image {}×{}",
            self.width,
            self.height,
        );
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Release the pixel buffer and reset dimensions to zero. Idempotent.
    pub fn clear(&mut self) {
        self.pixels = Vec::new();
        self.width = 0;
        self.height = 0;
        self.transposed = false;
    }

    // --- Load ---

    /// Load an image from the binary format.
    ///
    /// # Errors
    /// `ImageError::Io` if the file cannot be opened or read,
    /// `ImageError::ZeroDimension` / `ImageError::Truncated` on malformed
    /// input. Malformed input fails deterministically — the body length is
    /// validated word-by-word, never read out of bounds.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);

        let d1 = read_word(&mut reader, path, 0, 0)?;
        let d2 = read_word(&mut reader, path, d1, 0)?;
        if d1 == 0 || d2 == 0 {
            return Err(ImageError::ZeroDimension {
                path: path.to_path_buf(),
                d1,
                d2,
            });
        }

        let word_count = d1 as u64 * d2 as u64;
        if word_count > (usize::MAX as u64) / 4 {
            // The declared body cannot fit in the address space; treat it
            // the same as a short file — the read would fail either way.
            return Err(ImageError::Truncated {
                path: path.to_path_buf(),
                d1,
                d2,
            });
        }

        let mut pixels = vec![0u32; word_count as usize];
        let (width, height, transposed) = if d1 >= d2 {
            // Natural order: the file body is already the wide raster.
            for slot in pixels.iter_mut() {
                *slot = read_word(&mut reader, path, d1, d2)?;
            }
            (d1, d2, false)
        } else {
            // Tall file: the body is the row-major raster of a d1-wide,
            // d2-tall image. Transpose while reading so the stored buffer
            // is the row-major raster of the d2-wide, d1-tall image.
            for col in 0..d2 {
                for row in 0..d1 {
                    pixels[(row as u64 * d2 as u64 + col as u64) as usize] =
                        read_word(&mut reader, path, d1, d2)?;
                }
            }
            (d2, d1, true)
        };

        Ok(Image {
            pixels,
            width,
            height,
            transposed,
        })
    }

    // --- Save ---

    /// Write the image in the binary format, undoing the orientation
    /// normalization so the byte stream matches a file that was never
    /// loaded (modulo pixel content changes).
    ///
    /// # Errors
    /// `ImageError::Io` if the file cannot be created or written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageError> {
        let path = path.as_ref();
        let io_err = |source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);

        if self.transposed {
            // Header order reverses the load-time swap; the body walks the
            // wide raster column-major, reproducing the tall file's
            // row-major order.
            write_word(&mut writer, self.height).map_err(io_err)?;
            write_word(&mut writer, self.width).map_err(io_err)?;
            for col in 0..self.width {
                for row in 0..self.height {
                    let word = self.pixels[row as usize * self.width as usize + col as usize];
                    write_word(&mut writer, word).map_err(io_err)?;
                }
            }
        } else {
            write_word(&mut writer, self.width).map_err(io_err)?;
            write_word(&mut writer, self.height).map_err(io_err)?;
            for &word in &self.pixels {
                write_word(&mut writer, word).map_err(io_err)?;
            }
        }

        writer.flush().map_err(io_err)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Image {{ {}×{}, transposed: {} }}",
            self.width, self.height, self.transposed
        )?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(8) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:08X}", self.get(x, y))?;
            }
            if self.width > 8 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Word-level i/o
// ---------------------------------------------------------------------------

/// Read one big-endian word. A short read maps to `Truncated`, anything
/// else to `Io`.
fn read_word<R: Read>(reader: &mut R, path: &Path, d1: u32, d2: u32) -> Result<u32, ImageError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(|source| {
        if source.kind() == ErrorKind::UnexpectedEof {
            ImageError::Truncated {
                path: path.to_path_buf(),
                d1,
                d2,
            }
        } else {
            ImageError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    Ok(from_wire(u32::from_ne_bytes(buf)))
}

/// Write one word in big-endian wire order.
fn write_word<W: Write>(writer: &mut W, word: u32) -> io::Result<()> {
    writer.write_all(&to_wire(word).to_ne_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_layout() {
        // 3×2, row-major:
        //   [10, 20, 30]
        //   [40, 50, 60]
        let img = Image::from_vec(3, 2, vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 2);
        assert!(!img.is_transposed());
        assert_eq!(img.get(0, 0), 10);
        assert_eq!(img.get(2, 0), 30);
        assert_eq!(img.get(0, 1), 40);
        assert_eq!(img.get(2, 1), 60);
    }

    #[test]
    #[should_panic(expected = "pixel count")]
    fn test_from_vec_length_mismatch() {
        let _ = Image::from_vec(3, 2, vec![0; 5]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_get_out_of_bounds() {
        let img = Image::from_vec(2, 2, vec![0; 4]);
        img.get(2, 0);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut img = Image::from_vec(2, 2, vec![1, 2, 3, 4]);
        img.clear();
        assert_eq!(img.width(), 0);
        assert_eq!(img.height(), 0);
        assert!(img.pixels().is_empty());
        img.clear();
        assert_eq!(img.width(), 0);
        assert!(!img.is_transposed());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Image::load("/nonexistent/edge.data").unwrap_err();
        assert!(matches!(err, ImageError::Io { .. }), "got {err}");
    }
}
