// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display output identification, power modes, and attributes.
//!
//! [`OutputId`] is a lightweight handle identifying one physical output in
//! the mosaic. [`DisplayId`] is the logical id an upstream consumer assigns
//! when it registers callbacks; it is echoed back on every notification.

use core::fmt;

/// Identifies a physical output by its position in the mosaic.
///
/// Outputs are numbered in registration order, which is also the
/// left-to-right order of their tiles on the canvas.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OutputId(pub u32);

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputId({})", self.0)
    }
}

/// Logical display id assigned by the upstream consumer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DisplayId(pub u32);

impl fmt::Debug for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayId({})", self.0)
    }
}

/// Power state of an output or of the whole mosaic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PowerMode {
    /// Panel off, no scanout.
    #[default]
    Off,
    /// Low-power ambient mode.
    Doze,
    /// Fully on.
    On,
    /// Low-power mode with scanout suspended.
    DozeSuspend,
}

impl PowerMode {
    /// Returns `true` when frames should be presented.
    #[inline]
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

/// A queryable display attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisplayAttribute {
    /// Horizontal resolution in pixels.
    Width,
    /// Vertical resolution in pixels.
    Height,
    /// Refresh period in nanoseconds.
    RefreshRate,
    /// Horizontal density in dots per 1000 inches.
    DpiX,
    /// Vertical density in dots per 1000 inches.
    DpiY,
    /// Config group of the active mode.
    ConfigGroup,
}

/// Returned when an attribute is not reported by a display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("display attribute {0:?} is not supported")]
pub struct UnsupportedAttribute(pub DisplayAttribute);

impl UnsupportedAttribute {
    /// Value written by hosts that expect an integer out-parameter.
    pub const SENTINEL: i32 = -1;
}

/// Snapshot of one output's attributes at a given config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct OutputMode {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Refresh attribute as reported by the output.
    pub refresh: i32,
    /// Horizontal density.
    pub dpi_x: i32,
    /// Vertical density.
    pub dpi_y: i32,
}
