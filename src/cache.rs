use alloc::vec::Vec;
use core::ops::Range;

use crate::{ImageParams, RasterError, RasterResult, RowDecoder};

/// What the cache is currently holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheState {
  /// No buffer. The next access will have to decode.
  Empty,
  /// Progressive image, exactly one row is buffered.
  SingleRowCached {
    /// The row held in the buffer.
    row: u32,
  },
  /// Interlaced image, every row is buffered.
  WholeImageCached,
}

/// Counters for the work the cache has asked its decoder to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CacheStats {
  /// Calls to [`RowDecoder::restart`].
  pub restarts: u32,
  /// Calls to [`RowDecoder::decode_next_row`].
  pub rows_decoded: u32,
  /// Calls to [`RowDecoder::decode_whole_image`].
  pub whole_image_decodes: u32,
}

/// The two buffering strategies. Which one is used is fixed by the image's
/// interlace flag when the cache is built.
#[derive(Debug)]
enum Strategy {
  Progressive {
    /// empty until first use, then reused for every row
    line: Vec<u8>,
    /// which row `line` holds, if any
    line_row: Option<u32>,
    /// `None` until the first row after a restart is decoded
    last_row_read: Option<u32>,
  },
  Interlaced {
    /// `Some` only while it holds a complete decode
    image: Option<Vec<u8>>,
    /// a whole-image decode has consumed the stream since the last restart
    decoded_once: bool,
  },
}

/// A forward-only scanline cache in front of a [`RowDecoder`].
///
/// Callers ask for any row in any order with
/// [`ensure_row_available`](Self::ensure_row_available) and then look at it
/// with [`row`](Self::row) or [`row_mut`](Self::row_mut).
///
/// * **Progressive** images keep one row. Going forward decodes (and throws
///   away) every row in between. Going backward restarts the decoder and
///   decodes forward from row 0.
/// * **Interlaced** images keep the whole image, decoded on first access.
///
/// The cache never holds more than that: the decoder can't move backward, so
/// holding an arbitrary range would need either unbounded memory or an
/// eviction policy that still has to restart on every miss.
#[derive(Debug)]
pub struct ScanlineCache<D> {
  decoder: D,
  params: ImageParams,
  strategy: Strategy,
  /// a decode failed part way, the decoder position can't be trusted
  needs_restart: bool,
  stats: CacheStats,
}

impl<D: RowDecoder> ScanlineCache<D> {
  /// Wraps a freshly constructed (or freshly restarted) decoder.
  pub fn new(decoder: D) -> Self {
    let params = *decoder.params();
    let strategy = if params.is_interlaced() {
      Strategy::Interlaced { image: None, decoded_once: false }
    } else {
      Strategy::Progressive { line: Vec::new(), line_row: None, last_row_read: None }
    };
    Self { decoder, params, strategy, needs_restart: false, stats: CacheStats::default() }
  }

  /// The shape of the image.
  #[inline]
  #[must_use]
  pub fn params(&self) -> &ImageParams {
    &self.params
  }

  /// The decoder this cache drives.
  #[inline]
  #[must_use]
  pub fn decoder(&self) -> &D {
    &self.decoder
  }

  /// Work done so far.
  #[inline]
  #[must_use]
  pub fn stats(&self) -> CacheStats {
    self.stats
  }

  /// The current buffering state.
  #[must_use]
  pub fn state(&self) -> CacheState {
    match &self.strategy {
      Strategy::Progressive { line_row: Some(row), .. } => CacheState::SingleRowCached { row: *row },
      Strategy::Interlaced { image: Some(_), .. } => CacheState::WholeImageCached,
      _ => CacheState::Empty,
    }
  }

  /// The rows that can be served right now without decoding.
  ///
  /// This is `buffer_start_row..buffer_start_row + buffer_row_count`.
  #[must_use]
  pub fn buffered_rows(&self) -> Range<u32> {
    match self.state() {
      CacheState::Empty => 0..0,
      CacheState::SingleRowCached { row } => row..row + 1,
      CacheState::WholeImageCached => 0..self.params.height(),
    }
  }

  /// The highest row the decoder has produced since its last restart.
  ///
  /// `None` means the stream hasn't produced anything yet, or that a decode
  /// failed and the next access will restart it.
  #[must_use]
  pub fn last_row_read(&self) -> Option<u32> {
    if self.needs_restart {
      return None;
    }
    match &self.strategy {
      Strategy::Progressive { last_row_read, .. } => *last_row_read,
      Strategy::Interlaced { decoded_once: true, .. } => Some(self.params.height() - 1),
      Strategy::Interlaced { decoded_once: false, .. } => None,
    }
  }

  /// Makes `target_row` servable from the buffer.
  ///
  /// If it already is, this does nothing at all. Otherwise the decoder is
  /// driven forward, or restarted and driven forward, until it is.
  ///
  /// ## Panics
  /// * If `target_row` is not less than the image height.
  ///
  /// ## Failure
  /// * [`RasterError::Alloc`] if the buffer can't be allocated. The old
  ///   buffer is untouched in that case.
  /// * Decode errors from the decoder. After one of those the buffer is
  ///   dropped and the next access restarts the decoder first.
  pub fn ensure_row_available(&mut self, target_row: u32) -> RasterResult<()> {
    assert!(
      target_row < self.params.height(),
      "row {target_row} is outside an image of height {}",
      self.params.height()
    );
    if self.buffered_rows().contains(&target_row) {
      return Ok(());
    }
    let Self { decoder, params, strategy, needs_restart, stats } = self;
    let outcome = match strategy {
      Strategy::Interlaced { image, decoded_once } => {
        load_whole_image(decoder, params, stats, *needs_restart, image, decoded_once)
      }
      Strategy::Progressive { line, line_row, last_row_read } => load_single_row(
        decoder,
        params,
        stats,
        *needs_restart,
        target_row,
        line,
        line_row,
        last_row_read,
      ),
    };
    match outcome {
      Ok(()) => {
        self.needs_restart = false;
        Ok(())
      }
      Err(RasterError::Alloc) => Err(RasterError::Alloc),
      Err(e) => {
        lwarn!("decode failed while loading row {}: {}", target_row, e);
        self.needs_restart = true;
        match &mut self.strategy {
          Strategy::Progressive { line_row, .. } => *line_row = None,
          Strategy::Interlaced { image, .. } => *image = None,
        }
        Err(e)
      }
    }
  }

  /// The buffered bytes for `row`, if it's currently buffered.
  #[must_use]
  pub fn row(&self, row: u32) -> Option<&[u8]> {
    let row_bytes = self.params.row_bytes();
    match &self.strategy {
      Strategy::Progressive { line, line_row: Some(r), .. } if *r == row => Some(line.as_slice()),
      Strategy::Interlaced { image: Some(image), .. } => {
        let start = (row as usize).checked_mul(row_bytes)?;
        image.get(start..start.checked_add(row_bytes)?)
      }
      _ => None,
    }
  }

  /// The buffered bytes for `row`, mutably, if it's currently buffered.
  ///
  /// Edits stay in the buffer: the decoder never sees them, and they're lost
  /// the moment the row is evicted.
  #[must_use]
  pub fn row_mut(&mut self, row: u32) -> Option<&mut [u8]> {
    let row_bytes = self.params.row_bytes();
    match &mut self.strategy {
      Strategy::Progressive { line, line_row: Some(r), .. } if *r == row => {
        Some(line.as_mut_slice())
      }
      Strategy::Interlaced { image: Some(image), .. } => {
        let start = (row as usize).checked_mul(row_bytes)?;
        image.get_mut(start..start.checked_add(row_bytes)?)
      }
      _ => None,
    }
  }

  /// [`ensure_row_available`](Self::ensure_row_available) then
  /// [`row`](Self::row).
  pub fn load_row(&mut self, row: u32) -> RasterResult<&[u8]> {
    self.ensure_row_available(row)?;
    self.row(row).ok_or(RasterError::Corrupt)
  }

  /// [`ensure_row_available`](Self::ensure_row_available) then
  /// [`row_mut`](Self::row_mut).
  pub fn load_row_mut(&mut self, row: u32) -> RasterResult<&mut [u8]> {
    self.ensure_row_available(row)?;
    self.row_mut(row).ok_or(RasterError::Corrupt)
  }

  /// Frees the buffer, putting the cache back in [`CacheState::Empty`].
  ///
  /// The decoder keeps its position, so a progressive image that next asks
  /// for a later row carries on forward without a restart.
  pub fn flush(&mut self) {
    ldebug!("flushing scanline cache ({:?})", self.state());
    match &mut self.strategy {
      Strategy::Progressive { line, line_row, .. } => {
        *line = Vec::new();
        *line_row = None;
      }
      Strategy::Interlaced { image, .. } => *image = None,
    }
  }

  /// Restarts the decoder right now.
  ///
  /// Buffered rows stay valid (they're still the right pixels), only the
  /// decode cursor goes back to its "not started" state. This is how a
  /// caller explicitly recovers after a decode error.
  pub fn restart(&mut self) -> RasterResult<()> {
    restart_decoder(&mut self.decoder, &mut self.stats)?;
    self.needs_restart = false;
    match &mut self.strategy {
      Strategy::Progressive { last_row_read, .. } => *last_row_read = None,
      Strategy::Interlaced { decoded_once, .. } => *decoded_once = false,
    }
    Ok(())
  }
}

fn restart_decoder<D: RowDecoder>(decoder: &mut D, stats: &mut CacheStats) -> RasterResult<()> {
  ldebug!("restarting decoder");
  stats.restarts += 1;
  decoder.restart()
}

fn alloc_zeroed(len: usize) -> RasterResult<Vec<u8>> {
  let mut v = Vec::new();
  v.try_reserve_exact(len)?;
  v.resize(len, 0);
  Ok(v)
}

fn load_whole_image<D: RowDecoder>(
  decoder: &mut D, params: &ImageParams, stats: &mut CacheStats, needs_restart: bool,
  image: &mut Option<Vec<u8>>, decoded_once: &mut bool,
) -> RasterResult<()> {
  // allocate before touching the decoder so that running out of memory
  // leaves everything as it was.
  let mut buffer = alloc_zeroed(params.image_bytes())?;
  if *decoded_once || needs_restart {
    // the passes have already been consumed, only a restart gets them back
    restart_decoder(decoder, stats)?;
  }
  ldebug!(
    "decoding whole interlaced image {}x{} ({} bytes)",
    params.width(),
    params.height(),
    buffer.len()
  );
  stats.whole_image_decodes += 1;
  *decoded_once = true;
  decoder.decode_whole_image(&mut buffer)?;
  *image = Some(buffer);
  Ok(())
}

#[allow(clippy::too_many_arguments)]
fn load_single_row<D: RowDecoder>(
  decoder: &mut D, params: &ImageParams, stats: &mut CacheStats, needs_restart: bool,
  target_row: u32, line: &mut Vec<u8>, line_row: &mut Option<u32>,
  last_row_read: &mut Option<u32>,
) -> RasterResult<()> {
  if line.is_empty() {
    *line = alloc_zeroed(params.row_bytes())?;
  }
  if needs_restart || last_row_read.map_or(false, |last| target_row <= last) {
    restart_decoder(decoder, stats)?;
    *last_row_read = None;
  }
  // the buffer is about to be overwritten
  *line_row = None;
  let mut next = last_row_read.map_or(0, |last| last + 1);
  while next <= target_row {
    ltrace!("decoding row {}", next);
    stats.rows_decoded += 1;
    decoder.decode_next_row(line)?;
    *last_row_read = Some(next);
    next += 1;
  }
  *line_row = Some(target_row);
  Ok(())
}
