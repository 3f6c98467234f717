// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types and state machines for multi-output mosaic displays.
//!
//! `mosaic_core` holds the pieces of a mosaic display that carry no platform
//! or threading concerns: the data model for physical outputs and layers,
//! the derivation of the composite mode, the horizontal tile windows that
//! partition the canvas, and the vsync aggregation state machine. It is
//! `no_std` compatible (with `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   per-output vblank ──► VsyncAggregator::observe() ──► averaged vsync
//!                               ▲
//!   hotplug ────────────────────┴─ VsyncAggregator::topology_changed()
//!
//!   Present(layers) ──► TileWindow::new() per output
//!                          │
//!                          ▼
//!                    TileWindow::assign() ──► Vec<TileLayer> ──► output
//! ```
//!
//! **[`output`]**: Output identity, power modes, and display attributes.
//!
//! **[`mode`]**: [`CompositeMode`](mode::CompositeMode): the aggregate
//! width, height, refresh, and density of the whole mosaic.
//!
//! **[`layer`]**: Layers submitted to the mosaic and the per-tile
//! constraints stamped onto them.
//!
//! **[`tile`]**: [`TileWindow`](tile::TileWindow): which slice of the
//! canvas one output shows, and which layers touch it.
//!
//! **[`vsync`]**: [`VsyncAggregator`](vsync::VsyncAggregator): turns one
//! timestamp per connected output into one logical vsync per cycle.
//!
//! **[`callback`]**: Function-value callback types shared by the controller
//! and backends.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod callback;
pub mod layer;
pub mod mode;
pub mod output;
pub mod tile;
pub mod vsync;
