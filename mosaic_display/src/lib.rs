// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Multi-output mosaic display controller.
//!
//! A [`MosaicController`] presents several physical outputs upstream as one
//! wide logical display:
//!
//! - layers are split into horizontal tiles, one per connected output, and
//!   each tile is composed and submitted by its own [`TileWorker`],
//! - per-output vblanks are folded into one averaged vsync per cycle,
//! - per-output hotplug events are folded into one "any connected" signal.
//!
//! Physical outputs are supplied by the host through the [`PhysicalOutput`]
//! trait; buffer allocation, mode setting, and page-flip submission live
//! behind it.
//!
//! # Threading
//!
//! ```text
//!   vblank threads ──► fan-in ──┐
//!   hotplug monitor ─► fan-in ──┼──► controller state (one mutex)
//!   present caller ─────────────┘         │
//!          │                              ▼
//!          └──► TileWorker threads ──► PhysicalOutput::present()
//! ```
//!
//! Upstream callbacks are never invoked while the controller's state mutex is
//! held, so a callback may call back into the controller.

mod config;
mod controller;
mod fence;
mod output;
mod signal;
mod worker;

#[cfg(test)]
mod test_support;

pub use config::{MosaicConfig, PresentPipeline, TileDispatch};
pub use controller::{DISPLAY_NAME, MosaicController};
pub use fence::Fence;
pub use output::{PhysicalOutput, PresentError, output_mode};
pub use signal::CompletionSignal;
pub use worker::{TileWorker, WorkerError};

pub use mosaic_core::callback::{
    HotPlugCallback, IdleHook, RefreshCallback, UploadCallback, VsyncCallback,
};
pub use mosaic_core::layer::{Layer, LayerId, TileConstraints, TileLayer};
pub use mosaic_core::mode::CompositeMode;
pub use mosaic_core::output::{
    DisplayAttribute, DisplayId, OutputId, OutputMode, PowerMode, UnsupportedAttribute,
};
pub use mosaic_core::vsync::VsyncAggregationState;
