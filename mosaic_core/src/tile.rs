// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Horizontal tile windows.
//!
//! Each connected output shows one vertical strip of the mosaic canvas.
//! Strips are laid out left to right in output order, so the left edge of a
//! tile is the sum of the widths of the tiles before it:
//!
//! ```text
//!  0            1920               3200
//!  ├─── tile 0 ───┼──── tile 1 ─────┤
//!  │  1920 wide   │    1280 wide    │
//! ```
//!
//! A [`TileWindow`] also carries a *logical* window,
//! `[logical_index * width, (logical_index + 1) * width)`, which is what the
//! output's renderer sees as its device-space bounds.

use alloc::vec::Vec;

use kurbo::Rect;

use crate::layer::{Layer, TileConstraints, TileLayer};

/// The slice of the mosaic canvas assigned to one output for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileWindow {
    /// Position of this tile among the tiles presented this frame.
    pub ordinal: u32,
    /// Number of tiles presented this frame.
    pub total: u32,
    /// Left edge on the canvas.
    pub source_left: i32,
    /// Right edge on the canvas.
    pub source_right: i32,
    /// Left edge of the logical window.
    pub device_left: u32,
    /// Right edge of the logical window.
    pub device_right: u32,
}

impl TileWindow {
    /// Creates the window for a tile starting at `source_left` on the canvas.
    #[must_use]
    pub fn new(source_left: i32, width: u32, logical_index: u32, ordinal: u32, total: u32) -> Self {
        let device_left = logical_index.saturating_mul(width);
        Self {
            ordinal,
            total,
            source_left,
            source_right: source_left.saturating_add_unsigned(width),
            device_left,
            device_right: device_left.saturating_add(width),
        }
    }

    /// Returns `true` when a layer with this display frame belongs to the
    /// tile.
    ///
    /// A frame is rejected when its right edge is at or left of
    /// `source_left`, or its left edge is strictly right of `source_right`.
    /// A frame that only touches the low boundary is therefore excluded.
    #[must_use]
    pub fn accepts(&self, frame: &Rect) -> bool {
        let left = f64::from(self.source_left);
        let right = f64::from(self.source_right);
        !(frame.x1 <= left || frame.x0 > right)
    }

    /// Constraints stamped onto every layer assigned to this tile.
    #[must_use]
    pub fn constraints(&self) -> TileConstraints {
        TileConstraints {
            device_left: self.device_left,
            device_right: self.device_right,
            source_left: self.source_left,
            source_right: self.source_right,
            remaining_displays: self.total.saturating_sub(self.ordinal),
        }
    }

    /// Appends every layer accepted by this tile to `out`, in input order,
    /// with this tile's constraints applied.
    pub fn assign<'a, I>(&self, layers: I, out: &mut Vec<TileLayer>)
    where
        I: IntoIterator<Item = &'a Layer>,
    {
        let constraints = self.constraints();
        out.extend(
            layers
                .into_iter()
                .filter(|layer| self.accepts(&layer.display_frame))
                .map(|layer| TileLayer {
                    layer: layer.clone(),
                    constraints,
                }),
        );
    }
}

/// Lays out tiles left to right.
///
/// `tiles` yields `(width, logical_index)` for each tile in presentation
/// order. The returned windows accumulate widths into their left edges.
pub fn layout<I>(tiles: I) -> impl Iterator<Item = TileWindow>
where
    I: IntoIterator<Item = (u32, u32)>,
    I::IntoIter: ExactSizeIterator,
{
    let tiles = tiles.into_iter();
    let total = u32::try_from(tiles.len()).unwrap_or(u32::MAX);
    let mut left = 0_i32;
    tiles.zip(0_u32..).map(move |((width, logical_index), ordinal)| {
        let window = TileWindow::new(left, width, logical_index, ordinal, total);
        left = window.source_right;
        window
    })
}
