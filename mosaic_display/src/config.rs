// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Controller configuration.

/// Which registered tiles receive each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TileDispatch {
    /// Every registered tile, left to right.
    #[default]
    AllTiles,
    /// Only the leftmost registered tile.
    ///
    /// Reproduces controllers that stop after the first tile. Every other
    /// output keeps showing its previous frame.
    FirstTileOnly,
}

/// How tile presentation is ordered within one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PresentPipeline {
    /// Dispatch a tile and wait for it before dispatching the next one.
    #[default]
    Sequential,
    /// Dispatch every tile, then wait for all of them.
    Barrier,
}

/// Configuration for a [`MosaicController`](crate::MosaicController).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct MosaicConfig {
    /// Which tiles are presented per frame.
    pub tile_dispatch: TileDispatch,
    /// Ordering of tile presentation within a frame.
    pub pipeline: PresentPipeline,
}

impl MosaicConfig {
    /// Every tile, presented one after another.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tile_dispatch: TileDispatch::AllTiles,
            pipeline: PresentPipeline::Sequential,
        }
    }

    /// Only the first tile, for hosts relying on single-tile presentation.
    #[must_use]
    pub const fn single_tile() -> Self {
        Self {
            tile_dispatch: TileDispatch::FirstTileOnly,
            pipeline: PresentPipeline::Sequential,
        }
    }

    /// Every tile, dispatched together and joined with a barrier.
    #[must_use]
    pub const fn concurrent() -> Self {
        Self {
            tile_dispatch: TileDispatch::AllTiles,
            pipeline: PresentPipeline::Barrier,
        }
    }

    /// Number of tiles to present out of `registered`.
    #[must_use]
    pub(crate) fn tiles_per_frame(&self, registered: usize) -> usize {
        match self.tile_dispatch {
            TileDispatch::AllTiles => registered,
            TileDispatch::FirstTileOnly => registered.min(1),
        }
    }
}
