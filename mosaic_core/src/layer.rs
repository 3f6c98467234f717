// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layers submitted to the mosaic and the constraints stamped onto them.
//!
//! A [`Layer`] is positioned on the whole mosaic canvas. When a layer is
//! assigned to a tile it is wrapped in a [`TileLayer`] carrying that tile's
//! [`TileConstraints`], which tell the renderer which part of the layer the
//! output shows.

use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

use kurbo::Rect;

/// Identifies a layer across frames.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LayerId(pub u64);

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}

/// Opaque content handle owned by the buffer collaborator.
pub type LayerContent = Arc<dyn Any + Send + Sync>;

/// A layer positioned on the mosaic canvas.
#[derive(Clone)]
pub struct Layer {
    /// Stable identity.
    pub id: LayerId,
    /// Where the layer lands on the canvas, in canvas pixels.
    pub display_frame: Rect,
    /// Buffer or other content, passed through to outputs untouched.
    pub content: Option<LayerContent>,
}

impl Layer {
    /// Creates a layer without content.
    #[must_use]
    pub const fn new(id: LayerId, display_frame: Rect) -> Self {
        Self {
            id,
            display_frame,
            content: None,
        }
    }

    /// Attaches a content handle.
    #[must_use]
    pub fn with_content(mut self, content: LayerContent) -> Self {
        self.content = Some(content);
        self
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("display_frame", &self.display_frame)
            .field("content", &self.content.is_some())
            .finish()
    }
}

/// Per-tile constraints attached to an assigned layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct TileConstraints {
    /// Left edge of the tile in the output's logical window.
    pub device_left: u32,
    /// Right edge of the tile in the output's logical window.
    pub device_right: u32,
    /// Left edge of the tile on the mosaic canvas.
    pub source_left: i32,
    /// Right edge of the tile on the mosaic canvas.
    pub source_right: i32,
    /// Number of tiles from this one to the last, inclusive.
    ///
    /// A value of 1 means this is the last tile the layer can touch.
    pub remaining_displays: u32,
}

/// A layer assigned to one tile.
#[derive(Clone, Debug)]
pub struct TileLayer {
    /// The canvas layer.
    pub layer: Layer,
    /// Constraints of the tile it was assigned to.
    pub constraints: TileConstraints,
}
