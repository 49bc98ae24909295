#![no_std]
#![cfg_attr(docs_rs, feature(doc_cfg))]
#![warn(missing_docs)]

//! Random-access raster bands over a strictly sequential scanline decoder.
//!
//! Image decoders like zlib-compressed PNG can only hand out rows in
//! increasing order, while raster APIs want "band 2 of row 37, then band 1 of
//! row 3". This crate sits between the two:
//!
//! * A [`RowDecoder`] produces pixel-interleaved rows, one after the other,
//!   and can be restarted from the top of the image.
//! * The [`ScanlineCache`] keeps the smallest buffer that can serve the
//!   caller: a single row for progressive images, or the entire image for
//!   interlaced ones (which can't be decoded row by row at all).
//! * A [`Band`] reads and writes a single band's samples out of the cached
//!   rows by striding over the interleaved layout.
//!
//! With the `png` feature (on by default) the [`png`] module provides the PNG
//! implementation of all of this, along with a writer so that edited data can
//! be serialized again.
//!
//! ## Costs
//!
//! * Progressive images: asking for a row earlier than the last one decoded
//!   rewinds the decoder to row 0 and decodes forward again. Skipped rows are
//!   decoded and thrown away.
//! * Interlaced images: the first access decodes the whole image into memory,
//!   after that every row is served from that buffer.
//!
//! Reading rows top to bottom is always the cheap path.

extern crate alloc;

#[cfg(target_pointer_width = "16")]
compile_error!("this crate assumes 32-bit or bigger pointers!");

#[macro_use]
mod log;

mod error;
pub use error::*;

mod params;
pub use params::*;

mod decoder;
pub use decoder::*;

mod cache;
pub use cache::*;

mod band;
pub use band::*;

mod dataset;
pub use dataset::*;

#[cfg(feature = "png")]
#[cfg_attr(docs_rs, doc(cfg(feature = "png")))]
pub mod png;
