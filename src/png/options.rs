use super::FilterType;

/// Settings for opening a PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenOptions {
  /// The largest width or height that will be accepted.
  ///
  /// Defaults to 17,000. Interlaced images are held entirely in memory, so
  /// this is what stops a tiny malicious file from asking for gigabytes.
  pub max_dimension: u32,

  /// How samples of less than 8 bits are widened to a byte.
  ///
  /// * `false` (the default): the value is unpacked as-is, so 1-bit data is
  ///   0 or 1.
  /// * `true`: the bits are replicated across the byte, so 1-bit data is 0 or
  ///   255 and 4-bit `0xA` becomes `0xAA`.
  ///
  /// Palette images always unpack as-is, since their values are indexes.
  pub expand_low_bit_depth: bool,

  /// Check every chunk's CRC, failing with
  /// [`ChecksumMismatch`](crate::RasterError::ChecksumMismatch) on a bad
  /// one.
  ///
  /// Off by default: a bad CRC on an otherwise decodable image is ignored.
  pub verify_crc: bool,
}
impl Default for OpenOptions {
  fn default() -> Self {
    Self { max_dimension: 17_000, expand_low_bit_depth: false, verify_crc: false }
  }
}
impl OpenOptions {
  /// Same as `default`.
  #[inline]
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets [`max_dimension`](Self::max_dimension).
  #[inline]
  #[must_use]
  pub const fn max_dimension(mut self, max_dimension: u32) -> Self {
    self.max_dimension = max_dimension;
    self
  }

  /// Sets [`expand_low_bit_depth`](Self::expand_low_bit_depth).
  #[inline]
  #[must_use]
  pub const fn expand_low_bit_depth(mut self, expand: bool) -> Self {
    self.expand_low_bit_depth = expand;
    self
  }

  /// Sets [`verify_crc`](Self::verify_crc).
  #[inline]
  #[must_use]
  pub const fn verify_crc(mut self, verify: bool) -> Self {
    self.verify_crc = verify;
    self
  }
}

/// Settings for writing a PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteOptions {
  /// Store the image with Adam7 interlacing.
  pub interlaced: bool,
  /// Zlib compression level, 0 (store) through 10. Default 6.
  pub compression_level: u8,
  /// The filter applied to every line.
  pub filter: FilterType,
  /// Largest payload of a single `IDAT` chunk. Default 32 KiB.
  pub max_idat_len: usize,
}
impl Default for WriteOptions {
  fn default() -> Self {
    Self { interlaced: false, compression_level: 6, filter: FilterType::Paeth, max_idat_len: 1 << 15 }
  }
}
impl WriteOptions {
  /// Same as `default`.
  #[inline]
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets [`interlaced`](Self::interlaced).
  #[inline]
  #[must_use]
  pub const fn interlaced(mut self, interlaced: bool) -> Self {
    self.interlaced = interlaced;
    self
  }

  /// Sets [`compression_level`](Self::compression_level), clamped to 10.
  #[inline]
  #[must_use]
  pub const fn compression_level(mut self, level: u8) -> Self {
    self.compression_level = if level > 10 { 10 } else { level };
    self
  }

  /// Sets [`filter`](Self::filter).
  #[inline]
  #[must_use]
  pub const fn filter(mut self, filter: FilterType) -> Self {
    self.filter = filter;
    self
  }

  /// Sets [`max_idat_len`](Self::max_idat_len). A length of 0 is treated as 1.
  #[inline]
  #[must_use]
  pub const fn max_idat_len(mut self, len: usize) -> Self {
    self.max_idat_len = if len == 0 { 1 } else { len };
    self
  }
}
