use alloc::vec::Vec;

use super::{is_png_header_correct, OpenOptions, PngChunkType, PngRawChunkIter};
use crate::{ColorInterp, ImageParams, RasterError, RasterResult};

/// The types of color that PNG supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PngColorType {
  /// Greyscale
  Y = 0,
  /// Red, Green, Blue
  RGB = 2,
  /// Index into a palette.
  Index = 3,
  /// Greyscale + Alpha
  YA = 4,
  /// Red, Green, Blue, Alpha
  RGBA = 6,
}
impl PngColorType {
  /// The number of channels (bands) in this type of color.
  #[inline]
  #[must_use]
  pub const fn channel_count(self) -> usize {
    match self {
      Self::Y => 1,
      Self::RGB => 3,
      Self::Index => 1,
      Self::YA => 2,
      Self::RGBA => 4,
    }
  }

  /// The color type used to store `band_count` bands, if there is one.
  #[inline]
  #[must_use]
  pub const fn for_band_count(band_count: usize) -> Option<Self> {
    Some(match band_count {
      1 => Self::Y,
      2 => Self::YA,
      3 => Self::RGB,
      4 => Self::RGBA,
      _ => return None,
    })
  }

  /// If `bit_depth` is allowed with this color type.
  #[inline]
  #[must_use]
  pub const fn allows_bit_depth(self, bit_depth: u8) -> bool {
    match self {
      Self::Y => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
      Self::Index => matches!(bit_depth, 1 | 2 | 4 | 8),
      Self::RGB | Self::YA | Self::RGBA => matches!(bit_depth, 8 | 16),
    }
  }

  /// What each band of this color type means.
  #[must_use]
  pub fn color_interps(self) -> Vec<ColorInterp> {
    use ColorInterp::*;
    match self {
      Self::Y => [Gray].to_vec(),
      Self::YA => [Gray, Alpha].to_vec(),
      Self::Index => [PaletteIndex].to_vec(),
      Self::RGB => [Red, Green, Blue].to_vec(),
      Self::RGBA => [Red, Green, Blue, Alpha].to_vec(),
    }
  }
}
impl TryFrom<u8> for PngColorType {
  type Error = RasterError;
  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Ok(match value {
      0 => PngColorType::Y,
      2 => PngColorType::RGB,
      3 => PngColorType::Index,
      4 => PngColorType::YA,
      6 => PngColorType::RGBA,
      _ => return Err(RasterError::Parse),
    })
  }
}

/// Everything from the front of a PNG that's needed before decoding rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PngHeader {
  /// width in pixels
  pub width: u32,
  /// height in pixels
  pub height: u32,
  /// bits per channel
  pub bit_depth: u8,
  /// pixel color type
  pub color_type: PngColorType,
  /// if the image data is stored interlaced.
  pub is_interlaced: bool,
  /// Offset of the first `IDAT` chunk in the PNG bytes.
  ///
  /// Restarting the decoder rewinds to here.
  pub idat_offset: usize,
}
impl PngHeader {
  /// Parses the header of the PNG `bytes`.
  ///
  /// ## Failure
  /// * [`Parse`](RasterError::Parse): bad signature, no `IHDR`, a malformed
  ///   `IHDR`, or no `IDAT`.
  /// * [`WidthOrHeightZero`](RasterError::WidthOrHeightZero) /
  ///   [`DimensionsTooLarge`](RasterError::DimensionsTooLarge).
  /// * [`ChecksumMismatch`](RasterError::ChecksumMismatch) when
  ///   `verify_crc` is set and a chunk before the image data is damaged.
  pub fn parse(bytes: &[u8], options: &OpenOptions) -> RasterResult<Self> {
    if !is_png_header_correct(bytes) {
      return Err(RasterError::Parse);
    }
    let mut ihdr: Option<IhdrFields> = None;
    let mut idat_offset: Option<usize> = None;
    for chunk in PngRawChunkIter::new(bytes) {
      if options.verify_crc && chunk.actual_crc() != chunk.declared_crc {
        return Err(RasterError::ChecksumMismatch);
      }
      match chunk.type_ {
        // duplicate headers are ignored, the first one wins
        PngChunkType::IHDR if ihdr.is_none() => ihdr = Some(IhdrFields::parse(chunk.data)?),
        PngChunkType::IDAT => {
          idat_offset = Some(chunk.offset);
          break;
        }
        PngChunkType::IEND => break,
        _ => (),
      }
    }
    let ihdr = ihdr.ok_or(RasterError::Parse)?;
    let idat_offset = idat_offset.ok_or(RasterError::Parse)?;
    if ihdr.width == 0 || ihdr.height == 0 {
      return Err(RasterError::WidthOrHeightZero);
    }
    if ihdr.width > options.max_dimension || ihdr.height > options.max_dimension {
      return Err(RasterError::DimensionsTooLarge);
    }
    Ok(Self {
      width: ihdr.width,
      height: ihdr.height,
      bit_depth: ihdr.bit_depth,
      color_type: ihdr.color_type,
      is_interlaced: ihdr.is_interlaced,
      idat_offset,
    })
  }

  /// The decoded image's parameters.
  pub fn params(&self) -> RasterResult<ImageParams> {
    ImageParams::new(
      self.width,
      self.height,
      self.color_type.channel_count(),
      self.bit_depth,
      self.is_interlaced,
    )
  }

  /// Bits per pixel as stored.
  #[inline]
  #[must_use]
  pub const fn bits_per_pixel(&self) -> usize {
    (self.bit_depth as usize) * self.color_type.channel_count()
  }

  /// Packed bytes (not counting the filter byte) in a line `width` pixels
  /// wide.
  ///
  /// Pixels of less than 8 bits can leave a partial byte on the end, so this
  /// rounds up.
  #[inline]
  #[must_use]
  pub const fn packed_line_bytes(&self, width: u32) -> usize {
    (self.bits_per_pixel() * (width as usize) + 7) / 8
  }

  /// The byte distance the filters look back: one whole pixel, or one byte
  /// for pixels smaller than a byte.
  #[inline]
  #[must_use]
  pub const fn filter_chunk_size(&self) -> usize {
    let bytes = self.bits_per_pixel() / 8;
    if bytes == 0 {
      1
    } else {
      bytes
    }
  }
}

struct IhdrFields {
  width: u32,
  height: u32,
  bit_depth: u8,
  color_type: PngColorType,
  is_interlaced: bool,
}
impl IhdrFields {
  fn parse(data: &[u8]) -> RasterResult<Self> {
    match data {
      [w0, w1, w2, w3, h0, h1, h2, h3, bit_depth, color_type, compression_method, filter_method, interlace_method] =>
      {
        if *compression_method != 0 || *filter_method != 0 {
          return Err(RasterError::Parse);
        }
        let color_type = PngColorType::try_from(*color_type)?;
        if !color_type.allows_bit_depth(*bit_depth) {
          return Err(RasterError::Parse);
        }
        Ok(Self {
          width: u32::from_be_bytes([*w0, *w1, *w2, *w3]),
          height: u32::from_be_bytes([*h0, *h1, *h2, *h3]),
          bit_depth: *bit_depth,
          color_type,
          is_interlaced: match interlace_method {
            0 => false,
            1 => true,
            _ => return Err(RasterError::Parse),
          },
        })
      }
      _ => Err(RasterError::Parse),
    }
  }
}
