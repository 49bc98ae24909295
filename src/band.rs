use alloc::vec::Vec;

use crate::{ColorInterp, DatasetHandle, ImageParams, RasterResult, RowDecoder};

/// Copies one band's samples out of pixel-interleaved `row` into `out`.
///
/// `band` is 1-based. Each sample is `sample_size` bytes.
///
/// ## Panics
/// * If `band` is 0 or more than `band_count`.
/// * If `out` doesn't hold exactly one sample per pixel of `row`.
pub fn gather_band(row: &[u8], band: usize, band_count: usize, sample_size: usize, out: &mut [u8]) {
  check_band_layout(row.len(), band, band_count, sample_size, out.len());
  if band_count == 1 {
    out.copy_from_slice(row);
  } else {
    gather_strided(row, band, band_count, sample_size, out);
  }
}

/// Copies one band's samples from `input` into pixel-interleaved `row`,
/// leaving the other bands alone.
///
/// This is the mirror of [`gather_band`], with the same panics.
pub fn scatter_band(row: &mut [u8], band: usize, band_count: usize, sample_size: usize, input: &[u8]) {
  check_band_layout(row.len(), band, band_count, sample_size, input.len());
  if band_count == 1 {
    row.copy_from_slice(input);
  } else {
    scatter_strided(row, band, band_count, sample_size, input);
  }
}

#[track_caller]
fn check_band_layout(row_len: usize, band: usize, band_count: usize, sample_size: usize, band_len: usize) {
  assert!((1..=band_count).contains(&band), "band {band} is outside 1..={band_count}");
  assert!(sample_size == 1 || sample_size == 2, "sample size must be 1 or 2, got {sample_size}");
  let pixel_stride = band_count * sample_size;
  assert_eq!(row_len % pixel_stride, 0, "row isn't a whole number of pixels");
  assert_eq!(band_len, row_len / band_count, "band buffer has the wrong length");
}

fn gather_strided(row: &[u8], band: usize, band_count: usize, sample_size: usize, out: &mut [u8]) {
  let pixel_stride = band_count * sample_size;
  let offset = (band - 1) * sample_size;
  for (pixel, sample) in row.chunks_exact(pixel_stride).zip(out.chunks_exact_mut(sample_size)) {
    sample.copy_from_slice(&pixel[offset..offset + sample_size]);
  }
}

fn scatter_strided(row: &mut [u8], band: usize, band_count: usize, sample_size: usize, input: &[u8]) {
  let pixel_stride = band_count * sample_size;
  let offset = (band - 1) * sample_size;
  for (pixel, sample) in row.chunks_exact_mut(pixel_stride).zip(input.chunks_exact(sample_size)) {
    pixel[offset..offset + sample_size].copy_from_slice(sample);
  }
}

/// One band of an open dataset.
///
/// A band holds a handle back to its dataset and reads through the
/// dataset's scanline cache. It never has decode state of its own, so any
/// number of bands (of the same or different index) can exist at once.
///
/// Blocks are whole scanlines: block `row` is the band's samples for that
/// row, `width * sample_size` bytes. 16-bit samples are big-endian in the
/// byte-oriented calls, see [`read_block_u16`](Self::read_block_u16) for
/// native values.
#[derive(Debug)]
pub struct Band<D> {
  dataset: DatasetHandle<D>,
  index: usize,
}
impl<D> Clone for Band<D> {
  fn clone(&self) -> Self {
    Self { dataset: self.dataset.clone(), index: self.index }
  }
}

impl<D: RowDecoder> Band<D> {
  pub(crate) fn new(dataset: DatasetHandle<D>, index: usize) -> Self {
    Self { dataset, index }
  }

  /// The 1-based band number.
  #[inline]
  #[must_use]
  pub fn index(&self) -> usize {
    self.index
  }

  /// The dataset this band belongs to.
  #[inline]
  #[must_use]
  pub fn dataset(&self) -> &DatasetHandle<D> {
    &self.dataset
  }

  /// The dataset's image parameters.
  #[must_use]
  pub fn params(&self) -> ImageParams {
    self.dataset.params()
  }

  /// Bytes in one block of this band.
  #[must_use]
  pub fn block_bytes(&self) -> usize {
    self.params().band_row_bytes()
  }

  /// What this band's samples mean.
  #[must_use]
  pub fn color_interpretation(&self) -> ColorInterp {
    self.dataset.color_interpretation(self.index)
  }

  /// Reads this band's samples for `row` into `out`.
  ///
  /// ## Panics
  /// * If `row` is past the bottom of the image.
  /// * If `out` isn't exactly [`block_bytes`](Self::block_bytes) long.
  ///
  /// ## Failure
  /// * Decode or allocation errors from loading the row.
  pub fn read_block(&self, row: u32, out: &mut [u8]) -> RasterResult<()> {
    let index = self.index;
    self.dataset.with_cache_mut(|cache| {
      let params = *cache.params();
      let line = cache.load_row(row)?;
      gather_band(line, index, params.band_count(), params.sample_size(), out);
      Ok(())
    })
  }

  /// Writes `input` over this band's samples for `row` in the cached buffer.
  ///
  /// The row is loaded first (so the other bands keep their decoded values).
  /// The edit lives in the cache only; it's gone once the row is evicted or
  /// the cache is flushed. To keep it, copy the dataset out with
  /// `png::create_copy` (or your own writer) while the row is still cached.
  ///
  /// ## Panics
  /// * Same as [`read_block`](Self::read_block).
  pub fn write_block(&self, row: u32, input: &[u8]) -> RasterResult<()> {
    let index = self.index;
    self.dataset.with_cache_mut(|cache| {
      let params = *cache.params();
      let line = cache.load_row_mut(row)?;
      scatter_band(line, index, params.band_count(), params.sample_size(), input);
      Ok(())
    })
  }

  /// Reads a 16-bit band's samples for `row` as native `u16` values.
  ///
  /// ## Panics
  /// * If the dataset isn't 16-bit, or `out` isn't `width` long.
  pub fn read_block_u16(&self, row: u32, out: &mut [u16]) -> RasterResult<()> {
    assert_eq!(self.params().sample_size(), 2, "band {} is not 16-bit", self.index);
    self.read_block(row, bytemuck::cast_slice_mut(out))?;
    for v in out.iter_mut() {
      *v = u16::from_be(*v);
    }
    Ok(())
  }

  /// Writes native `u16` values over a 16-bit band's samples for `row`.
  ///
  /// ## Panics
  /// * If the dataset isn't 16-bit, or `input` isn't `width` long.
  pub fn write_block_u16(&self, row: u32, input: &[u16]) -> RasterResult<()> {
    assert_eq!(self.params().sample_size(), 2, "band {} is not 16-bit", self.index);
    let mut big_endian: Vec<u16> = Vec::new();
    big_endian.try_reserve_exact(input.len())?;
    big_endian.extend(input.iter().map(|v| v.to_be()));
    self.write_block(row, bytemuck::cast_slice(big_endian.as_slice()))
  }
}
