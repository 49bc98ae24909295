#![forbid(unsafe_code)]

//! Module for working with PNG data.
//!
//! * [Portable Network Graphics Specification (Second Edition)][png-spec]
//!
//! [png-spec]: https://www.w3.org/TR/2003/REC-PNG-20031110/
//!
//! ## Reading
//!
//! Call [`open_png`] (or [`PngDataset::open`](crate::DatasetHandle::open))
//! with the PNG bytes. Only the chunks before the image data are parsed up
//! front. Pixel data is decoded lazily as bands are read:
//!
//! * Progressive (non-interlaced) images keep a single decoded row. Reading
//!   rows in increasing order decodes each row once. Going back up the image
//!   rewinds to the first `IDAT` chunk and decodes forward again.
//! * Adam7 interlaced images are decoded all at once into memory on the first
//!   access, since no row is complete until the last pass.
//!
//! Decoded samples are laid out like this:
//!
//! * Bit depths 1, 2, and 4 have each sample unpacked into its own byte (see
//!   [`OpenOptions::expand_low_bit_depth`]).
//! * Bit depth 8 has one byte per sample.
//! * Bit depth 16 has two big-endian bytes per sample.
//!
//! Palette images are given as their indexes, the palette isn't applied.
//!
//! ## Parsing Errors
//!
//! Chunks other than `IHDR` and `IDAT` are skipped without a look, and CRCs
//! are only checked when [`OpenOptions::verify_crc`] is set. Anything that
//! stops the pixel data from being decoded is an error though: a zlib stream
//! that ends early is [`Truncated`](crate::RasterError::Truncated), and bad
//! zlib data or an unknown filter type is
//! [`Corrupt`](crate::RasterError::Corrupt).
//!
//! ## Writing
//!
//! There's no updating a PNG in place. [`PngWriter`] builds a new file from
//! rows, and [`create_copy`] copies every band of an open dataset into one.

mod chunks;
pub use chunks::*;

mod decoder;
pub use decoder::*;

mod encoder;
pub use encoder::*;

mod filter;
pub use filter::*;

mod header;
pub use header::*;

pub mod interlace;
pub use interlace::{Adam7Pass, ADAM7};

mod options;
pub use options::*;

use crate::DatasetHandle;
use crate::RasterResult;

/// An open PNG.
pub type PngDataset<B> = DatasetHandle<PngRowDecoder<B>>;

impl<B: AsRef<[u8]>> DatasetHandle<PngRowDecoder<B>> {
  /// Same as [`open_png`].
  pub fn open(bytes: B, options: OpenOptions) -> RasterResult<Self> {
    open_png(bytes, options)
  }
}

/// Opens the PNG `bytes` as a dataset.
///
/// This parses the header, and sets the color interpretation of each band
/// from the color type. No pixel data is decoded yet.
///
/// ## Failure
/// * Anything [`PngHeader::parse`] reports.
/// * [`Alloc`](crate::RasterError::Alloc) if the line buffers can't be
///   allocated.
pub fn open_png<B: AsRef<[u8]>>(bytes: B, options: OpenOptions) -> RasterResult<PngDataset<B>> {
  let header = PngHeader::parse(bytes.as_ref(), &options)?;
  ldebug!(
    "opened png: {}x{} {:?} at {} bits, interlaced: {}",
    header.width,
    header.height,
    header.color_type,
    header.bit_depth,
    header.is_interlaced
  );
  let decoder = PngRowDecoder::with_header(bytes, header, &options)?;
  Ok(DatasetHandle::with_color_interps(decoder, header.color_type.color_interps()))
}
