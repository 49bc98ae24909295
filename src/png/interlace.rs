//! Adam7 interlacing.
//!
//! The PNG interlacing scheme stores a full image as 7 "reduced images",
//! each made of the pixels at one position of this 8x8 pattern:
//!
//! ```text
//! 1 6 4 6 2 6 4 6
//! 7 7 7 7 7 7 7 7
//! 5 6 5 6 5 6 5 6
//! 7 7 7 7 7 7 7 7
//! 3 6 4 6 3 6 4 6
//! 7 7 7 7 7 7 7 7
//! 5 6 5 6 5 6 5 6
//! 7 7 7 7 7 7 7 7
//! ```
//!
//! No row of the full image is final until the 7th pass, which is why an
//! interlaced image can only be decoded as a whole.

/// Where one reduced image's pixels land in the full image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Adam7Pass {
  /// x of the reduced image's first pixel
  pub x0: u32,
  /// y of the reduced image's first pixel
  pub y0: u32,
  /// full image x distance between reduced pixels
  pub dx: u32,
  /// full image y distance between reduced rows
  pub dy: u32,
}
impl Adam7Pass {
  /// The non-interlaced "pass" that covers every pixel.
  pub const FULL: Self = Self { x0: 0, y0: 0, dx: 1, dy: 1 };

  /// Size of this pass's reduced image for a full image of the given size.
  ///
  /// Either value can be 0, in which case the pass has no pixels.
  #[inline]
  #[must_use]
  pub const fn reduced_dimensions(&self, full_width: u32, full_height: u32) -> (u32, u32) {
    (span(full_width, self.x0, self.dx), span(full_height, self.y0, self.dy))
  }

  /// Converts a reduced image location into the full image location.
  #[inline]
  #[must_use]
  pub const fn full_pos(&self, reduced_x: u32, reduced_y: u32) -> (u32, u32) {
    (self.x0 + reduced_x * self.dx, self.y0 + reduced_y * self.dy)
  }
}

#[inline]
const fn span(full: u32, start: u32, step: u32) -> u32 {
  if full > start {
    (full - start).div_ceil(step)
  } else {
    0
  }
}

/// The seven passes, in storage order.
pub const ADAM7: [Adam7Pass; 7] = [
  Adam7Pass { x0: 0, y0: 0, dx: 8, dy: 8 },
  Adam7Pass { x0: 4, y0: 0, dx: 8, dy: 8 },
  Adam7Pass { x0: 0, y0: 4, dx: 4, dy: 8 },
  Adam7Pass { x0: 2, y0: 0, dx: 4, dy: 4 },
  Adam7Pass { x0: 0, y0: 2, dx: 2, dy: 4 },
  Adam7Pass { x0: 1, y0: 0, dx: 2, dy: 2 },
  Adam7Pass { x0: 0, y0: 1, dx: 1, dy: 2 },
];

/// The size of each of the 7 reduced images.
#[must_use]
pub fn reduced_image_dimensions(full_width: u32, full_height: u32) -> [(u32, u32); 7] {
  ADAM7.map(|pass| pass.reduced_dimensions(full_width, full_height))
}

#[test]
fn test_reduced_image_dimensions() {
  assert_eq!(reduced_image_dimensions(0, 0), [(0, 0); 7]);
  let widths = |w: u32| reduced_image_dimensions(w, 0).map(|(w, _)| w);
  let heights = |h: u32| reduced_image_dimensions(0, h).map(|(_, h)| h);
  let expected_w: [[u32; 8]; 7] = [
    [1, 1, 1, 1, 1, 1, 1, 1],
    [0, 0, 0, 0, 1, 1, 1, 1],
    [1, 1, 1, 1, 2, 2, 2, 2],
    [0, 0, 1, 1, 1, 1, 2, 2],
    [1, 1, 2, 2, 3, 3, 4, 4],
    [0, 1, 1, 2, 2, 3, 3, 4],
    [1, 2, 3, 4, 5, 6, 7, 8],
  ];
  let expected_h: [[u32; 8]; 7] = [
    [1, 1, 1, 1, 1, 1, 1, 1],
    [1, 1, 1, 1, 1, 1, 1, 1],
    [0, 0, 0, 0, 1, 1, 1, 1],
    [1, 1, 1, 1, 2, 2, 2, 2],
    [0, 0, 1, 1, 1, 1, 2, 2],
    [1, 1, 2, 2, 3, 3, 4, 4],
    [0, 1, 1, 2, 2, 3, 3, 4],
  ];
  for pass in 0..7 {
    for (i, size) in (1..=8).enumerate() {
      assert_eq!(widths(size)[pass], expected_w[pass][i], "pass {} w:{size}", pass + 1);
      assert_eq!(heights(size)[pass], expected_h[pass][i], "pass {} h:{size}", pass + 1);
    }
  }
  assert_eq!(
    reduced_image_dimensions(8, 8),
    [(1, 1), (1, 1), (2, 1), (2, 2), (4, 2), (4, 4), (8, 4)]
  );
}

#[test]
fn test_passes_cover_every_pixel_once() {
  let (w, h) = (13_u32, 11_u32);
  let mut seen = alloc::vec![0_u8; (w * h) as usize];
  for pass in ADAM7 {
    let (rw, rh) = pass.reduced_dimensions(w, h);
    for ry in 0..rh {
      for rx in 0..rw {
        let (x, y) = pass.full_pos(rx, ry);
        assert!(x < w && y < h);
        seen[(y * w + x) as usize] += 1;
      }
    }
  }
  assert!(seen.iter().all(|&n| n == 1));
}

#[test]
fn test_reduced_dimensions_near_u32_max() {
  let dims = reduced_image_dimensions(u32::MAX, u32::MAX);
  assert_eq!(dims[0], (u32::MAX / 8 + 1, u32::MAX / 8 + 1));
  assert_eq!(dims[6], (u32::MAX, u32::MAX / 2));
  let total: u64 = dims.iter().map(|&(w, h)| u64::from(w) * u64::from(h)).sum();
  assert_eq!(total, u64::from(u32::MAX) * u64::from(u32::MAX));
}
