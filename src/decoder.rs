use crate::{ImageParams, RasterResult};

/// A strictly forward source of decoded scanlines.
///
/// This is the single sequential decoder behind a dataset. It only knows the
/// static [`ImageParams`]; deciding *when* to decode, restart, or buffer is
/// the [`ScanlineCache`](crate::ScanlineCache)'s job.
///
/// All rows are produced in pixel-interleaved order: every band's sample for
/// pixel 0, then every band's sample for pixel 1, and so on. Samples are
/// [`sample_size`](ImageParams::sample_size) bytes each, 16-bit samples in
/// big-endian byte order.
///
/// A freshly constructed decoder must already be positioned at row 0, the
/// same as if `restart` had just been called.
pub trait RowDecoder {
  /// The shape of the image being decoded.
  fn params(&self) -> &ImageParams;

  /// Throws away all decoder state and rewinds the source to the start of the
  /// pixel data, so that the next row produced is row 0.
  ///
  /// Can be called at any time, including before any row was read.
  fn restart(&mut self) -> RasterResult<()>;

  /// Decodes exactly one row into `dest`.
  ///
  /// ## Panics
  /// * If `dest` is not exactly [`row_bytes`](ImageParams::row_bytes) long.
  /// * If every row of the image has already been produced since the last
  ///   restart.
  ///
  /// ## Failure
  /// * Truncated or corrupt data. This is never retried, and after it the
  ///   decoder must be restarted before it can be trusted again.
  fn decode_next_row(&mut self, dest: &mut [u8]) -> RasterResult<()>;

  /// Decodes every pass of an interlaced image, leaving `dest` holding the
  /// full image in top to bottom order.
  ///
  /// ## Panics
  /// * If `dest` is not exactly [`image_bytes`](ImageParams::image_bytes)
  ///   long.
  /// * If the decoder isn't sitting at a fresh restart.
  ///
  /// ## Failure
  /// * Same as [`decode_next_row`](RowDecoder::decode_next_row).
  fn decode_whole_image(&mut self, dest: &mut [u8]) -> RasterResult<()>;
}
