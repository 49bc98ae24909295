use crate::{RasterError, RasterResult};

/// The fixed shape of an open raster.
///
/// These come from the image header before any row is decoded and they never
/// change for the lifetime of the dataset. Everything the cache needs to size
/// its buffers is derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageParams {
  width: u32,
  height: u32,
  band_count: usize,
  bit_depth: u8,
  interlaced: bool,
}
impl ImageParams {
  /// Validates and bundles up the image parameters.
  ///
  /// ## Failure
  /// * `width` or `height` of 0.
  /// * A `band_count` of 0, or a `bit_depth` other than 1, 2, 4, 8, or 16.
  /// * A row or whole image size that doesn't fit in `usize`.
  pub fn new(
    width: u32, height: u32, band_count: usize, bit_depth: u8, interlaced: bool,
  ) -> RasterResult<Self> {
    if width == 0 || height == 0 {
      return Err(RasterError::WidthOrHeightZero);
    }
    if band_count == 0 || ![1, 2, 4, 8, 16].contains(&bit_depth) {
      return Err(RasterError::Unsupported);
    }
    let out = Self { width, height, band_count, bit_depth, interlaced };
    out.try_image_bytes()?;
    Ok(out)
  }

  /// Width in pixels.
  #[inline]
  #[must_use]
  pub const fn width(&self) -> u32 {
    self.width
  }

  /// Height in pixels (the number of scanlines).
  #[inline]
  #[must_use]
  pub const fn height(&self) -> u32 {
    self.height
  }

  /// Number of bands (samples per pixel).
  #[inline]
  #[must_use]
  pub const fn band_count(&self) -> usize {
    self.band_count
  }

  /// Bits per sample as stored in the source.
  #[inline]
  #[must_use]
  pub const fn bit_depth(&self) -> u8 {
    self.bit_depth
  }

  /// If the source can only be decoded as a whole image.
  #[inline]
  #[must_use]
  pub const fn is_interlaced(&self) -> bool {
    self.interlaced
  }

  /// Bytes per sample once decoded: 2 for 16-bit data, otherwise 1.
  ///
  /// Depths below 8 are unpacked to one byte per sample.
  #[inline]
  #[must_use]
  pub const fn sample_size(&self) -> usize {
    if self.bit_depth == 16 {
      2
    } else {
      1
    }
  }

  /// Bytes between the start of one pixel and the next.
  #[inline]
  #[must_use]
  pub const fn pixel_stride(&self) -> usize {
    self.band_count * self.sample_size()
  }

  /// Bytes in one decoded scanline of all bands.
  #[inline]
  #[must_use]
  pub const fn row_bytes(&self) -> usize {
    // `new` already proved this can't overflow
    self.pixel_stride() * (self.width as usize)
  }

  /// Bytes in one band's worth of a scanline.
  #[inline]
  #[must_use]
  pub const fn band_row_bytes(&self) -> usize {
    self.sample_size() * (self.width as usize)
  }

  /// Bytes needed to hold the entire decoded image.
  #[inline]
  #[must_use]
  pub const fn image_bytes(&self) -> usize {
    self.row_bytes() * (self.height as usize)
  }

  fn try_image_bytes(&self) -> RasterResult<usize> {
    self
      .pixel_stride_checked()
      .and_then(|stride| stride.checked_mul(self.width as usize))
      .and_then(|row| row.checked_mul(self.height as usize))
      .ok_or(RasterError::CheckedMath)
  }

  fn pixel_stride_checked(&self) -> Option<usize> {
    self.band_count.checked_mul(self.sample_size())
  }
}

#[test]
fn test_image_params_sizes() {
  let p = ImageParams::new(5, 3, 3, 16, false).unwrap();
  assert_eq!(p.sample_size(), 2);
  assert_eq!(p.pixel_stride(), 6);
  assert_eq!(p.row_bytes(), 30);
  assert_eq!(p.band_row_bytes(), 10);
  assert_eq!(p.image_bytes(), 90);

  let p = ImageParams::new(7, 2, 1, 4, true).unwrap();
  assert_eq!(p.sample_size(), 1);
  assert_eq!(p.row_bytes(), 7);
  assert!(p.is_interlaced());
}

#[test]
fn test_image_params_rejects_bad_shapes() {
  assert_eq!(ImageParams::new(0, 3, 1, 8, false), Err(RasterError::WidthOrHeightZero));
  assert_eq!(ImageParams::new(3, 0, 1, 8, false), Err(RasterError::WidthOrHeightZero));
  assert_eq!(ImageParams::new(3, 3, 0, 8, false), Err(RasterError::Unsupported));
  assert_eq!(ImageParams::new(3, 3, 1, 12, false), Err(RasterError::Unsupported));
  assert_eq!(
    ImageParams::new(u32::MAX, u32::MAX, usize::MAX / 2, 16, false),
    Err(RasterError::CheckedMath)
  );
}
