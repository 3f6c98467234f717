// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Linux DRM backend for mosaic vsync timing.
//!
//! Each physical output runs a [`VblankEventLoop`] on its own thread. The
//! loop blocks on the output's DRM file descriptor, decodes page-flip
//! completion events into nanosecond timestamps, and forwards them to the
//! registered [`VsyncCallback`](mosaic_core::callback::VsyncCallback):
//!
//! ```text
//!  DRM fd ──read()──► event::decode ──► FlipComplete ──► time::flip_timestamp
//!                                                             │
//!  wait_vblank(RELATIVE, 1) ◄── arm next ◄────────────────────┤
//!                                                             ▼
//!                                                  callback(display, ns)
//! ```
//!
//! The DRM device is abstracted by [`DrmDevice`] so the loop can be driven by
//! a scripted device; [`DrmCard`] is the implementation backed by a
//! `/dev/dri/card*` node.

mod device;
mod error;
mod event;
mod request;
mod time;
mod vblank;

pub use device::{DrmCard, DrmDevice};
pub use error::VblankError;
pub use event::{DecodeError, DrmEvent, Events, FlipEvent, decode};
pub use request::VblankRequest;
pub use time::{FrameInterval, flip_timestamp};
pub use vblank::VblankEventLoop;
