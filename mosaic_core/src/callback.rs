// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Callback types for display events.
//!
//! Each event kind is a single shared function value. Callbacks may be
//! invoked from any thread (vblank threads, hotplug monitors, presentation
//! workers), so they must be `Send + Sync`.

use alloc::sync::Arc;

use crate::output::DisplayId;

/// Receives `(display, timestamp_ns)` for each vsync.
pub type VsyncCallback = Arc<dyn Fn(DisplayId, i64) + Send + Sync>;

/// Receives `display` when the consumer should redraw.
pub type RefreshCallback = Arc<dyn Fn(DisplayId) + Send + Sync>;

/// Receives `(display, connected)` on connection changes.
pub type HotPlugCallback = Arc<dyn Fn(DisplayId, bool) + Send + Sync>;

/// Invoked by an output once pixel uploads for a submitted frame have been
/// synchronized.
pub type UploadCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked by a vblank loop on every iteration so the owning queue can detect
/// a quiescent period.
pub type IdleHook = Arc<dyn Fn() + Send + Sync>;
