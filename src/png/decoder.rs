use alloc::{boxed::Box, vec::Vec};
use core::ops::Range;

use bitfrob::u8_replicate_bits;
use miniz_oxide::{
  inflate::stream::{inflate, InflateState},
  DataFormat, MZError, MZFlush, MZStatus,
};

use super::{unfilter_line, Adam7Pass, OpenOptions, PngChunkType, PngColorType, PngHeader, PngRawChunkIter, ADAM7};
use crate::{ImageParams, RasterError, RasterResult, RowDecoder};

/// The zlib stream spread across a PNG's `IDAT` chunks, inflated on demand.
///
/// Only offsets into the PNG bytes are stored, the bytes themselves are
/// passed in on each call.
struct IdatStream {
  inflater: Box<InflateState>,
  first_idat: usize,
  /// offset of the next chunk to look at for more input
  next_chunk: usize,
  /// unconsumed part of the current `IDAT` payload
  input: Range<usize>,
  /// a non-`IDAT` chunk was found after the data, no more input exists
  exhausted: bool,
  ended: bool,
  verify_crc: bool,
}
impl IdatStream {
  fn new(first_idat: usize, verify_crc: bool) -> Self {
    Self {
      inflater: InflateState::new_boxed(DataFormat::Zlib),
      first_idat,
      next_chunk: first_idat,
      input: 0..0,
      exhausted: false,
      ended: false,
      verify_crc,
    }
  }

  fn rewind(&mut self) {
    *self = Self::new(self.first_idat, self.verify_crc);
  }

  /// Moves `input` to the next non-empty `IDAT` payload.
  fn advance_chunk(&mut self, bytes: &[u8]) -> RasterResult<()> {
    while self.input.is_empty() && !self.exhausted {
      match PngRawChunkIter::from_offset(bytes, self.next_chunk).next() {
        Some(chunk) if chunk.type_ == PngChunkType::IDAT => {
          if self.verify_crc && chunk.actual_crc() != chunk.declared_crc {
            return Err(RasterError::ChecksumMismatch);
          }
          self.input = chunk.data_range();
          self.next_chunk = chunk.end();
        }
        // image data chunks must be consecutive, anything else ends them
        _ => self.exhausted = true,
      }
    }
    Ok(())
  }

  /// Inflates exactly `out.len()` bytes.
  fn fill(&mut self, bytes: &[u8], out: &mut [u8]) -> RasterResult<()> {
    let mut written = 0;
    while written < out.len() {
      if self.ended {
        return Err(RasterError::Truncated);
      }
      self.advance_chunk(bytes)?;
      let result =
        inflate(&mut self.inflater, &bytes[self.input.clone()], &mut out[written..], MZFlush::None);
      self.input.start += result.bytes_consumed;
      written += result.bytes_written;
      let stalled = result.bytes_consumed == 0 && result.bytes_written == 0;
      match result.status {
        Ok(MZStatus::StreamEnd) => self.ended = true,
        Ok(_) | Err(MZError::Buf) if stalled => {
          return Err(if self.input.is_empty() {
            RasterError::Truncated
          } else {
            RasterError::Corrupt
          });
        }
        Ok(_) | Err(MZError::Buf) => (),
        Err(_) => return Err(RasterError::Corrupt),
      }
    }
    Ok(())
  }
}

/// Decodes PNG scanlines one at a time out of in-memory PNG bytes.
///
/// * Rows are unfiltered as they come out of the zlib stream, so only the
///   current and previous filter line are kept.
/// * Samples of less than 8 bits are unpacked to one byte each.
/// * 16-bit samples stay big-endian.
/// * Restarting rewinds to the first `IDAT` chunk and starts a fresh zlib
///   stream; the header is never parsed again.
pub struct PngRowDecoder<B> {
  bytes: B,
  header: PngHeader,
  params: ImageParams,
  expand_low_bit_depth: bool,
  stream: IdatStream,
  /// filter byte + packed line, sized for the full width
  filtered: Vec<u8>,
  /// previous unfiltered packed line of the current (reduced) image
  previous: Vec<u8>,
  next_row: u32,
  fresh: bool,
}
impl<B> core::fmt::Debug for PngRowDecoder<B> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("PngRowDecoder")
      .field("header", &self.header)
      .field("next_row", &self.next_row)
      .field("fresh", &self.fresh)
      .finish_non_exhaustive()
  }
}

impl<B: AsRef<[u8]>> PngRowDecoder<B> {
  /// Parses the header of `bytes` and gets ready to decode row 0.
  pub fn new(bytes: B, options: &OpenOptions) -> RasterResult<Self> {
    let header = PngHeader::parse(bytes.as_ref(), options)?;
    Self::with_header(bytes, header, options)
  }

  /// Gets ready to decode row 0 of `bytes` using an already parsed header.
  pub fn with_header(bytes: B, header: PngHeader, options: &OpenOptions) -> RasterResult<Self> {
    let params = header.params()?;
    let line_len =
      header.packed_line_bytes(header.width).checked_add(1).ok_or(RasterError::CheckedMath)?;
    let mut filtered = Vec::new();
    filtered.try_reserve_exact(line_len)?;
    filtered.resize(line_len, 0);
    let mut previous = Vec::new();
    previous.try_reserve_exact(line_len - 1)?;
    previous.resize(line_len - 1, 0);
    Ok(Self {
      bytes,
      header,
      params,
      expand_low_bit_depth: options.expand_low_bit_depth && header.color_type != PngColorType::Index,
      stream: IdatStream::new(header.idat_offset, options.verify_crc),
      filtered,
      previous,
      next_row: 0,
      fresh: true,
    })
  }

  /// The parsed header.
  #[inline]
  #[must_use]
  pub fn header(&self) -> &PngHeader {
    &self.header
  }

  /// The PNG bytes being decoded.
  #[inline]
  #[must_use]
  pub fn bytes(&self) -> &B {
    &self.bytes
  }

  /// Inflates and unfilters the next line of a (reduced) image `width`
  /// pixels wide. The packed result is left in `self.previous`.
  fn next_packed_line(&mut self, width: u32) -> RasterResult<usize> {
    let packed_len = self.header.packed_line_bytes(width);
    let line = &mut self.filtered[..packed_len + 1];
    self.stream.fill(self.bytes.as_ref(), line)?;
    let (filter, packed) = line.split_first_mut().ok_or(RasterError::Corrupt)?;
    unfilter_line(*filter, packed, &self.previous[..packed_len], self.header.filter_chunk_size())?;
    self.previous[..packed_len].copy_from_slice(packed);
    Ok(packed_len)
  }
}

/// Widens packed samples to `sample_size` bytes each.
fn expand_samples(packed: &[u8], bit_depth: u8, replicate: bool, out: &mut [u8]) {
  match bit_depth {
    8 | 16 => out.copy_from_slice(&packed[..out.len()]),
    _ => {
      let bits = bit_depth as usize;
      let mask = (1_u8 << bit_depth) - 1;
      for (i, sample) in out.iter_mut().enumerate() {
        let bit = i * bits;
        let v = (packed[bit / 8] >> (8 - bits - bit % 8)) & mask;
        *sample = if replicate { u8_replicate_bits(bits as u32, v) } else { v };
      }
    }
  }
}

impl<B: AsRef<[u8]>> RowDecoder for PngRowDecoder<B> {
  fn params(&self) -> &ImageParams {
    &self.params
  }

  fn restart(&mut self) -> RasterResult<()> {
    self.stream.rewind();
    self.previous.fill(0);
    self.next_row = 0;
    self.fresh = true;
    Ok(())
  }

  fn decode_next_row(&mut self, dest: &mut [u8]) -> RasterResult<()> {
    assert!(!self.header.is_interlaced, "interlaced images can only be decoded whole");
    assert!(self.next_row < self.header.height, "every row has already been decoded");
    assert_eq!(dest.len(), self.params.row_bytes());
    self.fresh = false;
    let packed_len = self.next_packed_line(self.header.width)?;
    expand_samples(&self.previous[..packed_len], self.header.bit_depth, self.expand_low_bit_depth, dest);
    self.next_row += 1;
    Ok(())
  }

  fn decode_whole_image(&mut self, dest: &mut [u8]) -> RasterResult<()> {
    assert!(self.header.is_interlaced, "progressive images are decoded row by row");
    assert!(self.fresh, "a whole image decode must start from a fresh restart");
    assert_eq!(dest.len(), self.params.image_bytes());
    self.fresh = false;
    let (width, height) = (self.header.width, self.header.height);
    let stride = self.params.pixel_stride();
    let row_bytes = self.params.row_bytes();
    let mut reduced: Vec<u8> = Vec::new();
    reduced.try_reserve_exact(row_bytes)?;
    reduced.resize(row_bytes, 0);
    for pass in ADAM7 {
      let (reduced_width, reduced_height) = pass.reduced_dimensions(width, height);
      if reduced_width == 0 || reduced_height == 0 {
        continue;
      }
      ltrace!("adam7 pass {:?}: {}x{}", pass, reduced_width, reduced_height);
      // every reduced image starts with an implied zero line above it
      self.previous.fill(0);
      let samples = &mut reduced[..reduced_width as usize * stride];
      for reduced_y in 0..reduced_height {
        let packed_len = self.next_packed_line(reduced_width)?;
        expand_samples(&self.previous[..packed_len], self.header.bit_depth, self.expand_low_bit_depth, samples);
        scatter_reduced_line(pass, reduced_y, samples, stride, row_bytes, dest);
      }
    }
    self.next_row = height;
    Ok(())
  }
}

fn scatter_reduced_line(
  pass: Adam7Pass, reduced_y: u32, samples: &[u8], stride: usize, row_bytes: usize, dest: &mut [u8],
) {
  for (reduced_x, pixel) in samples.chunks_exact(stride).enumerate() {
    let (x, y) = pass.full_pos(reduced_x as u32, reduced_y);
    let start = y as usize * row_bytes + x as usize * stride;
    dest[start..start + stride].copy_from_slice(pixel);
  }
}

#[test]
fn test_expand_samples() {
  let mut out = [0_u8; 10];
  expand_samples(&[0b1011_0001, 0b1100_0000], 1, false, &mut out);
  assert_eq!(out, [1, 0, 1, 1, 0, 0, 0, 1, 1, 1]);
  expand_samples(&[0b1011_0001, 0b1100_0000], 1, true, &mut out);
  assert_eq!(out, [255, 0, 255, 255, 0, 0, 0, 255, 255, 255]);

  let mut out = [0_u8; 3];
  expand_samples(&[0b1110_0100, 0b1000_0000], 2, false, &mut out);
  assert_eq!(out, [3, 2, 1]);
  expand_samples(&[0xA5, 0xF0], 4, true, &mut out);
  assert_eq!(out, [0xAA, 0x55, 0xFF]);

  let mut out = [0_u8; 4];
  expand_samples(&[1, 2, 3, 4, 99], 16, false, &mut out);
  assert_eq!(out, [1, 2, 3, 4]);
}
