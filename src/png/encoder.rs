use alloc::vec::Vec;

use miniz_oxide::deflate::compress_to_vec_zlib;

use super::{filter_line, png_crc, Adam7Pass, PngColorType, WriteOptions, ADAM7, PNG_SIGNATURE};
use crate::{scatter_band, DatasetHandle, ImageParams, RasterError, RasterResult, RowDecoder};

/// Builds a PNG file out of pixel-interleaved rows.
///
/// Rows are given top to bottom in the same layout a [`RowDecoder`] produces:
/// 8-bit samples, or 16-bit samples stored big-endian. The image is held in
/// memory until [`finish`](Self::finish), since Adam7 output needs every row
/// before the first pass can be written.
#[derive(Debug, Clone)]
pub struct PngWriter {
  params: ImageParams,
  color_type: PngColorType,
  options: WriteOptions,
  image: Vec<u8>,
  rows_written: u32,
}
impl PngWriter {
  /// Starts a new image.
  ///
  /// ## Failure
  /// * [`Unsupported`](RasterError::Unsupported) unless `band_count` is 1
  ///   through 4 and `bit_depth` is 8 or 16.
  /// * [`Alloc`](RasterError::Alloc) if the image buffer can't be reserved.
  pub fn new(
    width: u32, height: u32, band_count: usize, bit_depth: u8, options: WriteOptions,
  ) -> RasterResult<Self> {
    let color_type = PngColorType::for_band_count(band_count).ok_or(RasterError::Unsupported)?;
    if bit_depth != 8 && bit_depth != 16 {
      return Err(RasterError::Unsupported);
    }
    let params = ImageParams::new(width, height, band_count, bit_depth, options.interlaced)?;
    let mut image = Vec::new();
    image.try_reserve_exact(params.image_bytes())?;
    Ok(Self { params, color_type, options, image, rows_written: 0 })
  }

  /// The shape of the image being written.
  #[inline]
  #[must_use]
  pub fn params(&self) -> &ImageParams {
    &self.params
  }

  /// Appends the next row.
  ///
  /// ## Panics
  /// * If `row` isn't exactly one row long, or every row was already written.
  pub fn write_row(&mut self, row: &[u8]) {
    assert_eq!(row.len(), self.params.row_bytes(), "row has the wrong length");
    assert!(self.rows_written < self.params.height(), "every row has already been written");
    self.image.extend_from_slice(row);
    self.rows_written += 1;
  }

  /// Compresses the image and returns the complete PNG bytes.
  ///
  /// ## Failure
  /// * [`Truncated`](RasterError::Truncated) if fewer than `height` rows were
  ///   written.
  pub fn finish(self) -> RasterResult<Vec<u8>> {
    if self.rows_written != self.params.height() {
      return Err(RasterError::Truncated);
    }
    let filtered = self.filtered_stream()?;
    let zlib = compress_to_vec_zlib(&filtered, self.options.compression_level);
    ldebug!(
      "png writer: {}x{} {:?}, {} filtered bytes deflated to {}",
      self.params.width(),
      self.params.height(),
      self.color_type,
      filtered.len(),
      zlib.len()
    );

    // struct literals can skip the setter's clamp
    let idat_len = self.options.max_idat_len.max(1);
    let idat_count = zlib.len().div_ceil(idat_len).max(1);
    let mut png = Vec::new();
    png.try_reserve(PNG_SIGNATURE.len() + 25 + zlib.len() + 12 * idat_count + 12)?;
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &self.ihdr_data())?;
    for idat in zlib.chunks(idat_len) {
      write_chunk(&mut png, b"IDAT", idat)?;
    }
    write_chunk(&mut png, b"IEND", &[])?;
    Ok(png)
  }

  fn ihdr_data(&self) -> [u8; 13] {
    let mut data = [0_u8; 13];
    data[0..4].copy_from_slice(&self.params.width().to_be_bytes());
    data[4..8].copy_from_slice(&self.params.height().to_be_bytes());
    data[8] = self.params.bit_depth();
    data[9] = self.color_type as u8;
    // compression and filter method are always 0
    data[12] = u8::from(self.options.interlaced);
    data
  }

  /// All the filtered lines, one reduced image after another when interlaced.
  fn filtered_stream(&self) -> RasterResult<Vec<u8>> {
    let (width, height) = (self.params.width(), self.params.height());
    let stride = self.params.pixel_stride();
    let row_bytes = self.params.row_bytes();
    let passes: &[Adam7Pass] = if self.options.interlaced { &ADAM7 } else { &[Adam7Pass::FULL] };

    let mut out = Vec::new();
    out.try_reserve(self.params.image_bytes() + 7 * height as usize + height as usize)?;
    let mut line: Vec<u8> = Vec::new();
    let mut prev: Vec<u8> = Vec::new();
    line.try_reserve_exact(row_bytes)?;
    prev.try_reserve_exact(row_bytes)?;
    for pass in passes {
      let (reduced_width, reduced_height) = pass.reduced_dimensions(width, height);
      if reduced_width == 0 || reduced_height == 0 {
        continue;
      }
      let line_len = reduced_width as usize * stride;
      prev.clear();
      prev.resize(line_len, 0);
      for reduced_y in 0..reduced_height {
        line.clear();
        for reduced_x in 0..reduced_width {
          let (x, y) = pass.full_pos(reduced_x, reduced_y);
          let start = y as usize * row_bytes + x as usize * stride;
          line.extend_from_slice(&self.image[start..start + stride]);
        }
        let filtered_start = out.len();
        out.resize(filtered_start + line_len + 1, 0);
        filter_line(self.options.filter, &line, &prev, stride, &mut out[filtered_start..]);
        core::mem::swap(&mut line, &mut prev);
      }
    }
    Ok(out)
  }
}

fn write_chunk(png: &mut Vec<u8>, type_: &[u8; 4], data: &[u8]) -> RasterResult<()> {
  let len = u32::try_from(data.len())?;
  png.try_reserve(12 + data.len())?;
  png.extend_from_slice(&len.to_be_bytes());
  png.extend_from_slice(type_);
  png.extend_from_slice(data);
  let crc = png_crc(type_.iter().copied().chain(data.iter().copied()));
  png.extend_from_slice(&crc.to_be_bytes());
  Ok(())
}

/// Writes every band of `src` into a new PNG.
///
/// Each row is read band by band through [`Band::read_block`](crate::Band::read_block),
/// so any edits made with `write_block` on rows that are still cached show up
/// in the copy. 16-bit sources stay 16-bit, everything else is written as
/// 8-bit.
///
/// ## Failure
/// * [`Unsupported`](RasterError::Unsupported) for a source with more than 4
///   bands.
/// * Decode errors from reading the source.
pub fn create_copy<D: RowDecoder>(src: &DatasetHandle<D>, options: WriteOptions) -> RasterResult<Vec<u8>> {
  let params = src.params();
  let bit_depth = if params.bit_depth() == 16 { 16 } else { 8 };
  let mut writer =
    PngWriter::new(params.width(), params.height(), params.band_count(), bit_depth, options)?;
  let sample_size = params.sample_size();
  let mut row: Vec<u8> = Vec::new();
  row.try_reserve_exact(params.row_bytes())?;
  row.resize(params.row_bytes(), 0);
  let mut block: Vec<u8> = Vec::new();
  block.try_reserve_exact(params.band_row_bytes())?;
  block.resize(params.band_row_bytes(), 0);
  for y in 0..params.height() {
    for band in src.bands() {
      band.read_block(y, &mut block)?;
      scatter_band(&mut row, band.index(), params.band_count(), sample_size, &block);
    }
    writer.write_row(&row);
  }
  writer.finish()
}
