use core::fmt::{Debug, Write};
use core::ops::Range;

/// The four byte tag naming a chunk.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PngChunkType(pub [u8; 4]);
#[allow(nonstandard_style)]
impl PngChunkType {
  /// Image header
  pub const IHDR: Self = Self(*b"IHDR");
  /// Palette
  pub const PLTE: Self = Self(*b"PLTE");
  /// Image data
  pub const IDAT: Self = Self(*b"IDAT");
  /// Image end
  pub const IEND: Self = Self(*b"IEND");
}
impl Debug for PngChunkType {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    for b in self.0 {
      f.write_char(b as char)?;
    }
    Ok(())
  }
}

/// An unparsed chunk from a PNG, along with where it sits in the bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PngRawChunk<'b> {
  /// Offset of the chunk's length field from the start of the PNG bytes.
  pub offset: usize,
  /// The chunk's type.
  pub type_: PngChunkType,
  /// The chunk's payload.
  pub data: &'b [u8],
  /// The CRC written in the file.
  pub declared_crc: u32,
}
impl Debug for PngRawChunk<'_> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("PngRawChunk")
      .field("offset", &self.offset)
      .field("type_", &self.type_)
      .field("data", &(&self.data[..self.data.len().min(12)], self.data.len()))
      .field("declared_crc", &self.declared_crc)
      .finish()
  }
}
impl PngRawChunk<'_> {
  /// The CRC computed over the chunk's type and data.
  #[must_use]
  pub fn actual_crc(&self) -> u32 {
    png_crc(self.type_.0.iter().copied().chain(self.data.iter().copied()))
  }

  /// Where the payload sits within the full PNG bytes.
  #[inline]
  #[must_use]
  pub fn data_range(&self) -> Range<usize> {
    let start = self.offset + 8;
    start..start + self.data.len()
  }

  /// Offset of whatever follows this chunk.
  #[inline]
  #[must_use]
  pub fn end(&self) -> usize {
    self.offset + 12 + self.data.len()
  }
}

/// Checks if the PNG's initial 8 bytes are correct.
///
/// * If this is the case, the rest of the bytes are very likely PNG data.
/// * If this is *not* the case, the rest of the bytes are very likely *not* PNG
///   data.
#[inline]
#[must_use]
pub const fn is_png_header_correct(bytes: &[u8]) -> bool {
  matches!(bytes, [137, 80, 78, 71, 13, 10, 26, 10, ..])
}

/// Length of the PNG signature.
pub const PNG_SIGNATURE_LEN: usize = 8;

/// The PNG signature bytes.
pub const PNG_SIGNATURE: [u8; PNG_SIGNATURE_LEN] = [137, 80, 78, 71, 13, 10, 26, 10];

/// An iterator that produces successive raw chunks from PNG bytes.
///
/// Stops at the first chunk that doesn't fit in the remaining bytes. It never
/// panics, no matter what bytes it's given.
#[derive(Debug, Clone)]
pub struct PngRawChunkIter<'b> {
  bytes: &'b [u8],
  pos: usize,
}
impl<'b> PngRawChunkIter<'b> {
  /// Pass the full PNG bytes, it will skip the PNG signature automatically.
  ///
  /// The signature isn't checked, use [`is_png_header_correct`] for that.
  #[inline]
  pub const fn new(bytes: &'b [u8]) -> Self {
    Self::from_offset(bytes, PNG_SIGNATURE_LEN)
  }

  /// Starts iterating at `offset`, which should be the start of a chunk.
  #[inline]
  pub const fn from_offset(bytes: &'b [u8], offset: usize) -> Self {
    Self { bytes, pos: offset }
  }
}
impl<'b> Iterator for PngRawChunkIter<'b> {
  type Item = PngRawChunk<'b>;
  fn next(&mut self) -> Option<Self::Item> {
    let offset = self.pos;
    let rest = self.bytes.get(offset..)?;
    let (len_bytes, rest) = try_split::<4>(rest)?;
    let (type_bytes, rest) = try_split::<4>(rest)?;
    let chunk_len = u32::from_be_bytes(len_bytes) as usize;
    let data = rest.get(..chunk_len)?;
    let (crc_bytes, _) = try_split::<4>(&rest[chunk_len..])?;
    let chunk = PngRawChunk {
      offset,
      type_: PngChunkType(type_bytes),
      data,
      declared_crc: u32::from_be_bytes(crc_bytes),
    };
    self.pos = chunk.end();
    Some(chunk)
  }
}

#[inline]
fn try_split<const N: usize>(bytes: &[u8]) -> Option<([u8; N], &[u8])> {
  if bytes.len() >= N {
    let (head, tail) = bytes.split_at(N);
    Some((head.try_into().ok()?, tail))
  } else {
    None
  }
}

const CRC_TABLE: [u32; 256] = make_crc_table();

const fn make_crc_table() -> [u32; 256] {
  let mut out = [0; 256];
  let mut n = 0;
  while n < 256 {
    let mut c = n as u32;
    let mut k = 0;
    while k < 8 {
      c = if (c & 1) != 0 { 0xEDB8_8320_u32 ^ (c >> 1) } else { c >> 1 };
      k += 1;
    }
    out[n] = c;
    n += 1;
  }
  out
}

/// The CRC-32 used by PNG chunks.
#[must_use]
pub fn png_crc(iter: impl Iterator<Item = u8>) -> u32 {
  let crc = iter.fold(u32::MAX, |crc, byte| {
    CRC_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
  });
  crc ^ u32::MAX
}

#[test]
fn test_png_crc_known_values() {
  // the IEND chunk always has this CRC
  assert_eq!(png_crc(b"IEND".iter().copied()), 0xAE42_6082);
  assert_eq!(png_crc(b"123456789".iter().copied()), 0xCBF4_3926);
}

#[test]
fn test_raw_chunk_iter() {
  let mut png = alloc::vec::Vec::from(PNG_SIGNATURE);
  png.extend_from_slice(&[0, 0, 0, 2]);
  png.extend_from_slice(b"abCD");
  png.extend_from_slice(&[7, 8]);
  png.extend_from_slice(&[1, 2, 3, 4]);
  png.extend_from_slice(&[0, 0, 0, 0]);
  png.extend_from_slice(b"IEND");
  png.extend_from_slice(&0xAE42_6082_u32.to_be_bytes());
  // a truncated trailing chunk is ignored
  png.extend_from_slice(&[0, 0, 0, 9, b'I']);

  let chunks: alloc::vec::Vec<_> = PngRawChunkIter::new(&png).collect();
  assert_eq!(chunks.len(), 2);
  assert_eq!(chunks[0].offset, 8);
  assert_eq!(chunks[0].type_, PngChunkType(*b"abCD"));
  assert_eq!(chunks[0].data, &[7, 8]);
  assert_eq!(chunks[0].declared_crc, 0x0102_0304);
  assert_eq!(chunks[0].data_range(), 16..18);
  assert_eq!(chunks[1].offset, chunks[0].end());
  assert_eq!(chunks[1].type_, PngChunkType::IEND);
  assert_eq!(chunks[1].actual_crc(), chunks[1].declared_crc);
}
