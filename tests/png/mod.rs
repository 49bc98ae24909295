use miniz_oxide::deflate::compress_to_vec_zlib;
use scanraster::{
  png::{
    create_copy, filter_line, open_png, png_crc, Adam7Pass, FilterType, OpenOptions, PngChunkType,
    PngDataset, PngRawChunkIter, PngWriter, WriteOptions, ADAM7, PNG_SIGNATURE,
  },
  CacheState, ColorInterp, ImageParams, RasterError,
};
use walkdir::WalkDir;

const FILTERS: [FilterType; 5] =
  [FilterType::None, FilterType::Sub, FilterType::Up, FilterType::Average, FilterType::Paeth];

/// Decoded image bytes where every byte depends on its position.
fn pattern(params: &ImageParams) -> Vec<u8> {
  let row_bytes = params.row_bytes();
  (0..params.image_bytes()).map(|i| ((i / row_bytes) * 31 + (i % row_bytes) * 7 + 3) as u8).collect()
}

fn encode(image: &[u8], params: &ImageParams, opts: WriteOptions) -> Vec<u8> {
  let mut w =
    PngWriter::new(params.width(), params.height(), params.band_count(), params.bit_depth(), opts)
      .unwrap();
  for row in image.chunks_exact(params.row_bytes()) {
    w.write_row(row);
  }
  w.finish().unwrap()
}

/// One band's samples of row `y` out of a full decoded image.
fn expected_block(image: &[u8], params: &ImageParams, y: u32, band: usize) -> Vec<u8> {
  let row = &image[y as usize * params.row_bytes()..][..params.row_bytes()];
  let ss = params.sample_size();
  row.chunks_exact(params.pixel_stride()).flat_map(|px| px[(band - 1) * ss..band * ss].to_vec()).collect()
}

fn chunk(out: &mut Vec<u8>, type_: &[u8; 4], data: &[u8]) {
  out.extend_from_slice(&(data.len() as u32).to_be_bytes());
  out.extend_from_slice(type_);
  out.extend_from_slice(data);
  out.extend_from_slice(&png_crc(type_.iter().copied().chain(data.iter().copied())).to_be_bytes());
}

fn assemble(ihdr: &[u8], zlib: &[u8]) -> Vec<u8> {
  let mut png = Vec::from(PNG_SIGNATURE);
  chunk(&mut png, b"IHDR", ihdr);
  chunk(&mut png, b"IDAT", zlib);
  chunk(&mut png, b"IEND", &[]);
  png
}

/// Rewrites `png` with its zlib stream passed through `op`, as a single `IDAT`.
fn rebuild_idat(png: &[u8], op: impl FnOnce(Vec<u8>) -> Vec<u8>) -> Vec<u8> {
  let chunks: Vec<_> = PngRawChunkIter::new(png).collect();
  let ihdr = chunks.iter().find(|c| c.type_ == PngChunkType::IHDR).unwrap().data;
  let zlib: Vec<u8> =
    chunks.iter().filter(|c| c.type_ == PngChunkType::IDAT).flat_map(|c| c.data.to_vec()).collect();
  assemble(ihdr, &op(zlib))
}

/// Builds a sub-byte depth PNG by hand, since the writer only does 8 and 16.
fn low_depth_png(
  width: u32, height: u32, depth: u8, color_type: u8, interlaced: bool, value: impl Fn(u32, u32) -> u8,
) -> Vec<u8> {
  let passes: &[Adam7Pass] = if interlaced { &ADAM7 } else { &[Adam7Pass::FULL] };
  let depth_ = depth as usize;
  let mut filtered = Vec::new();
  for pass in passes {
    let (rw, rh) = pass.reduced_dimensions(width, height);
    if rw == 0 || rh == 0 {
      continue;
    }
    let line_len = (rw as usize * depth_ + 7) / 8;
    let mut prev = vec![0; line_len];
    for ry in 0..rh {
      let mut line = vec![0_u8; line_len];
      for rx in 0..rw {
        let (x, y) = pass.full_pos(rx, ry);
        let bit = rx as usize * depth_;
        line[bit / 8] |= value(x, y) << (8 - depth_ - bit % 8);
      }
      let mut out = vec![0; line_len + 1];
      filter_line(FilterType::Sub, &line, &prev, 1, &mut out);
      filtered.extend_from_slice(&out);
      prev = line;
    }
  }
  let mut ihdr = Vec::new();
  ihdr.extend_from_slice(&width.to_be_bytes());
  ihdr.extend_from_slice(&height.to_be_bytes());
  ihdr.extend_from_slice(&[depth, color_type, 0, 0, u8::from(interlaced)]);
  assemble(&ihdr, &compress_to_vec_zlib(&filtered, 6))
}

/// Opens `bytes` and reads every band of every row, ignoring errors.
fn read_everything(bytes: &[u8]) {
  if let Ok(ds) = open_png(bytes, OpenOptions::default().max_dimension(512)) {
    let mut block = vec![0; ds.params().band_row_bytes()];
    for y in 0..ds.params().height() {
      for band in ds.bands() {
        let _ = band.read_block(y, &mut block);
      }
    }
  }
}

#[test]
fn test_PngRawChunkIter_no_panics() {
  // iter ALL files in the test folder, even non-png files shouldn't panic it.
  for entry in WalkDir::new("tests/").into_iter().filter_map(|e| e.ok()) {
    println!("{}", entry.path().display());
    let v = match std::fs::read(entry.path()) {
      Ok(v) => v,
      Err(e) => {
        println!("Error reading file: {e:?}");
        continue;
      }
    };
    for _ in PngRawChunkIter::new(&v) {
      //
    }
    read_everything(&v);
  }
  // even totally random data should never panic the iterator!
  for _ in 0..10 {
    let v = super::rand_bytes(1024);
    for _ in PngRawChunkIter::new(&v) {
      //
    }
    read_everything(&v);
  }
}

/// Reads every band of every row of a fixture, bottom up, and compares each
/// sample against `sample(x, y, band)`.
fn check_fixture(bytes: &[u8], interlaced: bool, sample: impl Fn(u32, u32, usize) -> u16) -> PngDataset<&[u8]> {
  let ds = open_png(bytes, OpenOptions::default().verify_crc(true)).unwrap();
  let params = ds.params();
  assert_eq!(params.is_interlaced(), interlaced);
  let width = params.width() as usize;
  for y in (0..params.height()).rev() {
    for band in ds.bands() {
      let expected: Vec<u16> = (0..params.width()).map(|x| sample(x, y, band.index())).collect();
      let got: Vec<u16> = if params.sample_size() == 2 {
        let mut v = vec![0_u16; width];
        band.read_block_u16(y, &mut v).unwrap();
        v
      } else {
        let mut v = vec![0_u8; width];
        band.read_block(y, &mut v).unwrap();
        v.into_iter().map(u16::from).collect()
      };
      assert_eq!(got, expected, "row {y} band {}", band.index());
    }
  }
  ds
}

#[test]
fn test_fixture_files() {
  let ds = check_fixture(include_bytes!("rgb8_progressive.png"), false, |x, y, band| {
    (match band {
      1 => x * 30,
      2 => y * 40,
      _ => (x + y) * 17,
    } % 256) as u16
  });
  assert_eq!(ds.color_interpretation(1), ColorInterp::Red);
  assert_eq!(ds.cache_stats().restarts, 4);

  let ds = check_fixture(include_bytes!("graya16_adam7.png"), true, |x, y, band| {
    if band == 1 {
      (x * 1000 + y * 37) as u16
    } else {
      (65535 - x * y * 100) as u16
    }
  });
  assert_eq!(ds.color_interpretation(2), ColorInterp::Alpha);
  assert_eq!(ds.cache_stats().whole_image_decodes, 1);

  let ds = check_fixture(include_bytes!("gray2_progressive.png"), false, |x, y, _| ((x + 2 * y) % 4) as u16);
  assert_eq!(ds.params().bit_depth(), 2);
  assert_eq!(ds.color_interpretation(1), ColorInterp::Gray);

  let ds = check_fixture(include_bytes!("palette4_adam7.png"), true, |x, y, _| ((3 * x + y) % 16) as u16);
  assert_eq!(ds.params().bit_depth(), 4);
  assert_eq!(ds.color_interpretation(1), ColorInterp::PaletteIndex);
}

#[test]
fn test_damaged_png_no_panics() {
  let params = ImageParams::new(11, 9, 3, 8, false).unwrap();
  let image = pattern(&params);
  for interlaced in [false, true] {
    let png = encode(&image, &params, WriteOptions::default().interlaced(interlaced).max_idat_len(40));
    for _ in 0..40 {
      let mut damaged = png.clone();
      for r in super::rand_bytes(6).chunks_exact(3) {
        let at = (usize::from(r[0]) << 8 | usize::from(r[1])) % damaged.len();
        damaged[at] ^= r[2] | 1;
      }
      read_everything(&damaged);
    }
    // cut off at every length
    for len in (0..png.len()).step_by(7) {
      read_everything(&png[..len]);
    }
  }
}

#[test]
fn test_every_layout_reads_back() {
  for interlaced in [false, true] {
    for band_count in 1..=4 {
      for bit_depth in [8, 16] {
        for filter in FILTERS {
          let params = ImageParams::new(13, 7, band_count, bit_depth, interlaced).unwrap();
          let image = pattern(&params);
          let opts =
            WriteOptions::default().interlaced(interlaced).filter(filter).max_idat_len(23);
          let png = encode(&image, &params, opts);
          let ds = open_png(png.as_slice(), OpenOptions::default().verify_crc(true)).unwrap();
          assert_eq!(ds.params(), params);
          let mut block = vec![0; params.band_row_bytes()];
          for y in [6, 0, 3, 3, 1, 5, 2, 4] {
            for band in ds.bands() {
              band.read_block(y, &mut block).unwrap();
              assert_eq!(
                block,
                expected_block(&image, &params, y, band.index()),
                "{params:?} {filter:?} row {y} band {}",
                band.index()
              );
            }
          }
        }
      }
    }
  }
}

#[test]
fn test_progressive_scenario() {
  // 4 rows, 2 bands, 1 byte per sample
  let params = ImageParams::new(3, 4, 2, 8, false).unwrap();
  let image = pattern(&params);
  let ds = PngDataset::open(encode(&image, &params, WriteOptions::default()), OpenOptions::default())
    .unwrap();
  let (b1, b2) = (ds.band(1).unwrap(), ds.band(2).unwrap());
  let mut block = [0_u8; 3];
  b1.read_block(0, &mut block).unwrap();
  b2.read_block(0, &mut block).unwrap();
  assert_eq!(block.as_slice(), expected_block(&image, &params, 0, 2));
  for y in 1..4 {
    b1.read_block(y, &mut block).unwrap();
  }
  let stats = ds.cache_stats();
  assert_eq!((stats.rows_decoded, stats.restarts), (4, 0));

  b1.read_block(1, &mut block).unwrap();
  assert_eq!(block.as_slice(), expected_block(&image, &params, 1, 1));
  let stats = ds.cache_stats();
  assert_eq!((stats.rows_decoded, stats.restarts), (6, 1));
  assert_eq!(ds.cache_state(), CacheState::SingleRowCached { row: 1 });
}

#[test]
fn test_interlaced_scenario() {
  let params = ImageParams::new(5, 100, 1, 8, true).unwrap();
  let image = pattern(&params);
  let ds = open_png(encode(&image, &params, WriteOptions::default().interlaced(true)), OpenOptions::default())
    .unwrap();
  let band = ds.band(1).unwrap();
  let mut block = [0_u8; 5];
  band.read_block(50, &mut block).unwrap();
  assert_eq!(block.as_slice(), expected_block(&image, &params, 50, 1));
  assert_eq!(ds.cache_state(), CacheState::WholeImageCached);
  let stats = ds.cache_stats();
  assert_eq!((stats.whole_image_decodes, stats.restarts), (1, 0));

  // served from the buffer
  band.read_block(10, &mut block).unwrap();
  assert_eq!(block.as_slice(), expected_block(&image, &params, 10, 1));
  assert_eq!(ds.cache_stats().whole_image_decodes, 1);

  ds.flush_cache();
  assert_eq!(ds.cache_state(), CacheState::Empty);
  band.read_block(10, &mut block).unwrap();
  assert_eq!(block.as_slice(), expected_block(&image, &params, 10, 1));
  let stats = ds.cache_stats();
  assert_eq!((stats.whole_image_decodes, stats.restarts), (2, 1));
}

#[test]
fn test_restart_gives_identical_rows() {
  for filter in FILTERS {
    let params = ImageParams::new(17, 20, 3, 8, false).unwrap();
    let png = encode(&pattern(&params), &params, WriteOptions::default().filter(filter));
    let mut first = vec![0; 17];
    open_png(png.as_slice(), OpenOptions::default()).unwrap().band(2).unwrap().read_block(3, &mut first).unwrap();

    let ds = open_png(png.as_slice(), OpenOptions::default()).unwrap();
    let band = ds.band(2).unwrap();
    let mut again = vec![0; 17];
    band.read_block(15, &mut again).unwrap();
    band.read_block(3, &mut again).unwrap();
    assert_eq!(again, first);
    assert_eq!(ds.cache_stats().restarts, 1);
  }
}

#[test]
fn test_flush_keeps_decoder_position() {
  let params = ImageParams::new(4, 10, 1, 8, false).unwrap();
  let ds = open_png(encode(&pattern(&params), &params, WriteOptions::default()), OpenOptions::default())
    .unwrap();
  let band = ds.band(1).unwrap();
  let mut block = [0_u8; 4];
  band.read_block(5, &mut block).unwrap();
  assert_eq!(ds.cache_stats().rows_decoded, 6);
  ds.flush_cache();
  band.read_block(6, &mut block).unwrap();
  assert_eq!(ds.cache_stats().rows_decoded, 7);
  assert_eq!(ds.cache_stats().restarts, 0);
  ds.flush_cache();
  band.read_block(6, &mut block).unwrap();
  assert_eq!(ds.cache_stats().rows_decoded, 14);
  assert_eq!(ds.cache_stats().restarts, 1);
}

#[test]
fn test_u16_blocks() {
  for interlaced in [false, true] {
    let params = ImageParams::new(6, 5, 2, 16, interlaced).unwrap();
    let image = pattern(&params);
    let ds = open_png(encode(&image, &params, WriteOptions::default().interlaced(interlaced)), OpenOptions::default())
      .unwrap();
    let band = ds.band(2).unwrap();
    let mut values = [0_u16; 6];
    band.read_block_u16(4, &mut values).unwrap();
    let expected: Vec<u16> = expected_block(&image, &params, 4, 2)
      .chunks_exact(2)
      .map(|b| u16::from_be_bytes([b[0], b[1]]))
      .collect();
    assert_eq!(values.as_slice(), expected);

    let edit = [0x0102, 0xFFFF, 0, 1000, 40_000, 7];
    band.write_block_u16(4, &edit).unwrap();
    band.read_block_u16(4, &mut values).unwrap();
    assert_eq!(values, edit);
    // the other band is untouched
    let mut raw = [0_u8; 12];
    ds.band(1).unwrap().read_block(4, &mut raw).unwrap();
    assert_eq!(raw.as_slice(), expected_block(&image, &params, 4, 1));
  }
}

#[test]
fn test_low_bit_depths() {
  for depth in [1_u8, 2, 4] {
    let max = (1_u32 << depth) - 1;
    let value = |x: u32, y: u32| ((x * 3 + y) % (max + 1)) as u8;
    for interlaced in [false, true] {
      let png = low_depth_png(11, 6, depth, 0, interlaced, value);
      for expand in [false, true] {
        let ds = open_png(png.as_slice(), OpenOptions::default().expand_low_bit_depth(expand)).unwrap();
        assert_eq!(ds.params().bit_depth(), depth);
        assert_eq!(ds.params().band_row_bytes(), 11);
        let mut block = [0_u8; 11];
        for y in (0..6).rev() {
          ds.band(1).unwrap().read_block(y, &mut block).unwrap();
          let expected: Vec<u8> = (0..11)
            .map(|x| {
              let v = u32::from(value(x, y));
              (if expand { v * (255 / max) } else { v }) as u8
            })
            .collect();
          assert_eq!(block.as_slice(), expected, "depth {depth} interlaced {interlaced} expand {expand} row {y}");
        }
      }
    }
  }
}

#[test]
fn test_palette_indexes_are_never_scaled() {
  let png = low_depth_png(5, 2, 4, 3, false, |x, y| (x + y * 5) as u8);
  let ds = open_png(png, OpenOptions::default().expand_low_bit_depth(true)).unwrap();
  assert_eq!(ds.color_interpretation(1), ColorInterp::PaletteIndex);
  let mut block = [0_u8; 5];
  ds.band(1).unwrap().read_block(1, &mut block).unwrap();
  assert_eq!(block, [5, 6, 7, 8, 9]);
}

#[test]
fn test_truncated_data() {
  for interlaced in [false, true] {
    let params = ImageParams::new(16, 16, 1, 8, interlaced).unwrap();
    let image = pattern(&params);
    let opts = WriteOptions::default().interlaced(interlaced).compression_level(0);
    let png = rebuild_idat(&encode(&image, &params, opts), |zlib| zlib[..zlib.len() / 2].to_vec());
    let ds = open_png(png, OpenOptions::default()).unwrap();
    let band = ds.band(1).unwrap();
    let mut block = [0_u8; 16];
    assert_eq!(band.read_block(15, &mut block), Err(RasterError::Truncated));
    assert_eq!(ds.cache_state(), CacheState::Empty);
    if interlaced {
      // no row is complete until the last pass
      assert_eq!(band.read_block(0, &mut block), Err(RasterError::Truncated));
    } else {
      // the next access restarts and the early rows are still there
      band.read_block(0, &mut block).unwrap();
      assert_eq!(block.as_slice(), expected_block(&image, &params, 0, 1));
    }
    assert_eq!(ds.cache_stats().restarts, 1);
  }
}

#[test]
fn test_corrupt_data() {
  let params = ImageParams::new(4, 1, 1, 8, false).unwrap();
  let png = encode(&[1, 2, 3, 4], &params, WriteOptions::default());
  let mut block = [0_u8; 4];

  // reserved deflate block type
  let bad_zlib = rebuild_idat(&png, |_| vec![0x78, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]);
  let ds = open_png(bad_zlib, OpenOptions::default()).unwrap();
  assert_eq!(ds.band(1).unwrap().read_block(0, &mut block), Err(RasterError::Corrupt));

  let bad_filter = rebuild_idat(&png, |_| compress_to_vec_zlib(&[9, 1, 2, 3, 4], 6));
  let ds = open_png(bad_filter, OpenOptions::default()).unwrap();
  assert_eq!(ds.band(1).unwrap().read_block(0, &mut block), Err(RasterError::Corrupt));
}

#[test]
fn test_idat_crc_checked_while_decoding() {
  let params = ImageParams::new(16, 16, 1, 8, false).unwrap();
  let image = pattern(&params);
  let mut png = encode(&image, &params, WriteOptions::default().compression_level(0).max_idat_len(16));
  let idat_ends: Vec<usize> = PngRawChunkIter::new(&png)
    .filter(|c| c.type_ == PngChunkType::IDAT)
    .map(|c| c.end())
    .collect();
  assert!(idat_ends.len() > 2);
  png[idat_ends[1] - 1] ^= 0xFF;

  let mut block = [0_u8; 16];
  let ds = open_png(png.as_slice(), OpenOptions::default().verify_crc(true)).unwrap();
  assert_eq!(ds.band(1).unwrap().read_block(0, &mut block), Err(RasterError::ChecksumMismatch));

  let ds = open_png(png.as_slice(), OpenOptions::default()).unwrap();
  for y in 0..16 {
    ds.band(1).unwrap().read_block(y, &mut block).unwrap();
    assert_eq!(block.as_slice(), expected_block(&image, &params, y, 1));
  }
}

#[test]
fn test_create_copy_keeps_cached_edits() {
  let params = ImageParams::new(6, 5, 4, 8, true).unwrap();
  let image = pattern(&params);
  let ds = open_png(encode(&image, &params, WriteOptions::default().interlaced(true)), OpenOptions::default())
    .unwrap();
  assert_eq!(ds.color_interpretation(4), ColorInterp::Alpha);
  ds.band(2).unwrap().write_block(3, &[200; 6]).unwrap();

  let copy = create_copy(&ds, WriteOptions::default().filter(FilterType::Up)).unwrap();
  let copied = open_png(copy, OpenOptions::default().verify_crc(true)).unwrap();
  assert!(!copied.params().is_interlaced());
  assert_eq!(copied.band_count(), 4);
  let mut block = [0_u8; 6];
  for y in 0..5 {
    for band in copied.bands() {
      band.read_block(y, &mut block).unwrap();
      if y == 3 && band.index() == 2 {
        assert_eq!(block, [200; 6]);
      } else {
        assert_eq!(block.as_slice(), expected_block(&image, &params, y, band.index()));
      }
    }
  }
}

#[test]
fn test_create_copy_of_16_bit_and_low_depth() {
  let params = ImageParams::new(7, 3, 2, 16, false).unwrap();
  let image = pattern(&params);
  let ds = open_png(encode(&image, &params, WriteOptions::default()), OpenOptions::default()).unwrap();
  let copy = create_copy(&ds, WriteOptions::default().interlaced(true)).unwrap();
  let copied = open_png(copy, OpenOptions::default()).unwrap();
  assert_eq!(copied.params().bit_depth(), 16);
  assert!(copied.params().is_interlaced());
  let mut block = [0_u8; 14];
  for y in 0..3 {
    copied.band(2).unwrap().read_block(y, &mut block).unwrap();
    assert_eq!(block.as_slice(), expected_block(&image, &params, y, 2));
  }

  // 1-bit data comes out of the copy as 8-bit
  let png = low_depth_png(9, 2, 1, 0, false, |x, y| ((x + y) % 2) as u8);
  let ds = open_png(png, OpenOptions::default().expand_low_bit_depth(true)).unwrap();
  let copied = open_png(create_copy(&ds, WriteOptions::default()).unwrap(), OpenOptions::default()).unwrap();
  assert_eq!(copied.params().bit_depth(), 8);
  let mut block = [0_u8; 9];
  copied.band(1).unwrap().read_block(1, &mut block).unwrap();
  assert_eq!(block, [255, 0, 255, 0, 255, 0, 255, 0, 255]);
}

#[test]
fn test_band_lookup() {
  let params = ImageParams::new(2, 2, 3, 8, false).unwrap();
  let ds = open_png(encode(&pattern(&params), &params, WriteOptions::default()), OpenOptions::default())
    .unwrap();
  assert!(ds.band(0).is_none());
  assert!(ds.band(4).is_none());
  assert_eq!(ds.bands().count(), 3);
  assert_eq!(ds.color_interpretation(0), ColorInterp::Undefined);
  assert_eq!(ds.color_interpretation(2), ColorInterp::Green);
}

#[test]
#[should_panic]
fn test_read_past_the_bottom_panics() {
  let params = ImageParams::new(2, 2, 1, 8, false).unwrap();
  let ds = open_png(encode(&pattern(&params), &params, WriteOptions::default()), OpenOptions::default())
    .unwrap();
  let mut block = [0_u8; 2];
  let _ = ds.band(1).unwrap().read_block(2, &mut block);
}
