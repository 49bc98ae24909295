use alloc::{rc::Rc, vec::Vec};
use core::cell::RefCell;

use crate::{Band, CacheState, CacheStats, ImageParams, RasterResult, RowDecoder, ScanlineCache};

/// What the samples of a band mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ColorInterp {
  /// Nothing is known about the band.
  #[default]
  Undefined,
  /// Greyscale intensity.
  Gray,
  /// Opacity.
  Alpha,
  /// Index into a color palette.
  PaletteIndex,
  /// Red channel.
  Red,
  /// Green channel.
  Green,
  /// Blue channel.
  Blue,
}

/// An open raster: one decoder, one scanline cache, and what the bands mean.
#[derive(Debug)]
pub struct Dataset<D> {
  cache: ScanlineCache<D>,
  color_interps: Vec<ColorInterp>,
}

/// A shared handle to an open [`Dataset`].
///
/// Every [`Band`] holds one of these, so the dataset (and its decoder) lives
/// as long as any band does. Cloning the handle doesn't copy the dataset.
///
/// The handle is deliberately `!Send` and `!Sync`: the cache is unsynchronized
/// mutable state. Calls are also not re-entrant, so don't call back into the
/// same dataset from inside [`with_cache_mut`](Self::with_cache_mut).
#[derive(Debug)]
pub struct DatasetHandle<D>(Rc<RefCell<Dataset<D>>>);
impl<D> Clone for DatasetHandle<D> {
  fn clone(&self) -> Self {
    Self(Rc::clone(&self.0))
  }
}

impl<D: RowDecoder> DatasetHandle<D> {
  /// Opens a dataset over `decoder`, with every band [`ColorInterp::Undefined`].
  pub fn new(decoder: D) -> Self {
    Self::with_color_interps(decoder, Vec::new())
  }

  /// Opens a dataset over `decoder` with the given per-band meanings.
  ///
  /// Entry `i` is for band `i + 1`. Missing entries are `Undefined`.
  pub fn with_color_interps(decoder: D, color_interps: Vec<ColorInterp>) -> Self {
    let cache = ScanlineCache::new(decoder);
    Self(Rc::new(RefCell::new(Dataset { cache, color_interps })))
  }

  /// The image parameters.
  #[must_use]
  pub fn params(&self) -> ImageParams {
    *self.0.borrow().cache.params()
  }

  /// Number of bands.
  #[must_use]
  pub fn band_count(&self) -> usize {
    self.params().band_count()
  }

  /// Gets band `index` (1-based), or `None` if there's no such band.
  #[must_use]
  pub fn band(&self, index: usize) -> Option<Band<D>> {
    if (1..=self.band_count()).contains(&index) {
      Some(Band::new(self.clone(), index))
    } else {
      None
    }
  }

  /// All the bands, in order.
  pub fn bands(&self) -> impl Iterator<Item = Band<D>> + '_ {
    (1..=self.band_count()).map(move |index| Band::new(self.clone(), index))
  }

  /// What band `index` (1-based) means.
  #[must_use]
  pub fn color_interpretation(&self, index: usize) -> ColorInterp {
    let ds = self.0.borrow();
    index.checked_sub(1).and_then(|i| ds.color_interps.get(i)).copied().unwrap_or_default()
  }

  /// Current cache state.
  #[must_use]
  pub fn cache_state(&self) -> CacheState {
    self.0.borrow().cache.state()
  }

  /// Work the cache has done so far.
  #[must_use]
  pub fn cache_stats(&self) -> CacheStats {
    self.0.borrow().cache.stats()
  }

  /// Drops the cached rows to reclaim their memory.
  ///
  /// Any edits made with [`Band::write_block`] are lost.
  pub fn flush_cache(&self) {
    self.0.borrow_mut().cache.flush();
  }

  /// Explicitly restarts the decoder, see [`ScanlineCache::restart`].
  pub fn restart(&self) -> RasterResult<()> {
    self.0.borrow_mut().cache.restart()
  }

  /// Runs `op` with the dataset's cache.
  ///
  /// ## Panics
  /// * If called from inside another `with_cache_mut` on the same dataset.
  pub fn with_cache_mut<R>(&self, op: impl FnOnce(&mut ScanlineCache<D>) -> R) -> R {
    op(&mut self.0.borrow_mut().cache)
  }

  /// Runs `op` with the dataset's decoder.
  pub fn with_decoder<R>(&self, op: impl FnOnce(&D) -> R) -> R {
    op(self.0.borrow().cache.decoder())
  }
}
