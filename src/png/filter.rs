use crate::{RasterError, RasterResult};

/// The per-line filters PNG uses to make pixel data compress better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum FilterType {
  /// Bytes are stored as-is.
  None = 0,
  /// Difference from the byte one pixel to the left.
  Sub = 1,
  /// Difference from the byte directly above.
  Up = 2,
  /// Difference from the mean of left and above.
  Average = 3,
  /// Difference from whichever of left, above, or upper-left is the best
  /// predictor.
  Paeth = 4,
}
impl TryFrom<u8> for FilterType {
  type Error = RasterError;
  #[inline]
  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Ok(match value {
      0 => Self::None,
      1 => Self::Sub,
      2 => Self::Up,
      3 => Self::Average,
      4 => Self::Paeth,
      _ => return Err(RasterError::Corrupt),
    })
  }
}

#[inline]
#[must_use]
const fn paeth_predict(a: u8, b: u8, c: u8) -> u8 {
  let a_ = a as i32;
  let b_ = b as i32;
  let c_ = c as i32;
  let p: i32 = a_ + b_ - c_;
  let pa = (p - a_).abs();
  let pb = (p - b_).abs();
  let pc = (p - c_).abs();
  // The order of these tests is fixed by the PNG spec.
  if pa <= pb && pa <= pc {
    a
  } else if pb <= pc {
    b
  } else {
    c
  }
}

/// Reverses the filter on one `line` in place.
///
/// * `prev` is the previous line of the same (reduced) image, already
///   unfiltered, or all zeros for the first line.
/// * `bpp` is the filter distance in bytes (see
///   [`filter_chunk_size`](super::PngHeader::filter_chunk_size)).
///
/// ## Failure
/// * [`Corrupt`](RasterError::Corrupt) for a filter byte that isn't 0..=4.
pub fn unfilter_line(filter: u8, line: &mut [u8], prev: &[u8], bpp: usize) -> RasterResult<()> {
  debug_assert_eq!(line.len(), prev.len());
  match FilterType::try_from(filter)? {
    FilterType::None => (),
    FilterType::Sub => {
      for i in bpp..line.len() {
        line[i] = line[i].wrapping_add(line[i - bpp]);
      }
    }
    FilterType::Up => {
      line.iter_mut().zip(prev.iter()).for_each(|(x, b)| *x = x.wrapping_add(*b));
    }
    FilterType::Average => {
      for i in 0..line.len() {
        let a = if i >= bpp { line[i - bpp] } else { 0 };
        line[i] = line[i].wrapping_add(((a as u16 + prev[i] as u16) / 2) as u8);
      }
    }
    FilterType::Paeth => {
      for i in 0..line.len() {
        let (a, c) = if i >= bpp { (line[i - bpp], prev[i - bpp]) } else { (0, 0) };
        line[i] = line[i].wrapping_add(paeth_predict(a, prev[i], c));
      }
    }
  }
  Ok(())
}

/// Applies `filter` to the raw `line`, writing the filter byte followed by
/// the filtered bytes into `out`.
///
/// `out` must be one byte longer than `line`. `prev` is the previous raw
/// line, or all zeros for the first one.
pub fn filter_line(filter: FilterType, line: &[u8], prev: &[u8], bpp: usize, out: &mut [u8]) {
  debug_assert_eq!(line.len(), prev.len());
  debug_assert_eq!(line.len() + 1, out.len());
  let (f, out) = out.split_at_mut(1);
  f[0] = filter as u8;
  for i in 0..line.len() {
    let a = if i >= bpp { line[i - bpp] } else { 0 };
    let b = prev[i];
    let c = if i >= bpp { prev[i - bpp] } else { 0 };
    let predicted = match filter {
      FilterType::None => 0,
      FilterType::Sub => a,
      FilterType::Up => b,
      FilterType::Average => ((a as u16 + b as u16) / 2) as u8,
      FilterType::Paeth => paeth_predict(a, b, c),
    };
    out[i] = line[i].wrapping_sub(predicted);
  }
}
