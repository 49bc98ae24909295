use core::{fmt, num::TryFromIntError};

/// An error from the `scanraster` crate.
///
/// Programming mistakes (a band index out of range, a buffer of the wrong
/// length, a row past the bottom of the image) are not reported through this
/// type, they panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterError {
  /// Failed to parse the data given.
  Parse,

  /// The allocator couldn't give us enough space.
  ///
  /// This mostly shows up when an interlaced image has to be held in memory
  /// all at once.
  Alloc,

  /// The image is too large.
  ///
  /// PNG decoding limits the width and height of images it will open (17,000
  /// by default, see `OpenOptions`) to prevent accidental out-of-memory
  /// problems.
  DimensionsTooLarge,

  /// The declared width and/or height of this image is 0.
  WidthOrHeightZero,

  /// A checked math operation failed.
  CheckedMath,

  /// The data is well formed but uses something this crate can't handle.
  Unsupported,

  /// The pixel data ended before the image did.
  Truncated,

  /// The pixel data is structurally invalid.
  Corrupt,

  /// A chunk's declared CRC doesn't match its contents.
  ChecksumMismatch,
}
impl From<alloc::collections::TryReserveError> for RasterError {
  #[inline]
  fn from(_: alloc::collections::TryReserveError) -> Self {
    Self::Alloc
  }
}
impl From<TryFromIntError> for RasterError {
  #[inline]
  fn from(_: TryFromIntError) -> Self {
    Self::CheckedMath
  }
}
impl fmt::Display for RasterError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Parse => "failed to parse image data",
      Self::Alloc => "allocation failed",
      Self::DimensionsTooLarge => "image dimensions are too large",
      Self::WidthOrHeightZero => "image width or height is zero",
      Self::CheckedMath => "size computation overflowed",
      Self::Unsupported => "unsupported image layout",
      Self::Truncated => "pixel data is truncated",
      Self::Corrupt => "pixel data is corrupt",
      Self::ChecksumMismatch => "chunk checksum mismatch",
    })
  }
}
impl core::error::Error for RasterError {}

/// Result alias used throughout the crate.
pub type RasterResult<T> = Result<T, RasterError>;
