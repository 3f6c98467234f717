// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The physical output contract.

use std::io;

use mosaic_core::callback::{HotPlugCallback, RefreshCallback, UploadCallback, VsyncCallback};
use mosaic_core::layer::TileLayer;
use mosaic_core::output::{
    DisplayAttribute, DisplayId, OutputMode, PowerMode, UnsupportedAttribute,
};

use crate::fence::Fence;

/// Errors reported by [`PhysicalOutput::present`].
#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    /// The output refused the frame (e.g. an atomic test commit failed).
    #[error("output rejected the frame: {0}")]
    Rejected(String),
    /// The submission failed at the OS level.
    #[error("frame submission failed")]
    Io(#[from] io::Error),
}

/// A single hardware display owned by a mosaic.
///
/// Implementations wrap the platform's mode-setting and page-flip machinery.
/// Every method except [`present`](Self::present) must be non-blocking.
/// Methods take `&self`; implementations are shared between the controller,
/// its tile workers, and event threads, and use interior mutability.
///
/// Callbacks handed to the `register_*` methods may be invoked from any
/// thread. Implementations must not hold internal locks while invoking them,
/// because the mosaic calls back into the output (e.g. [`is_connected`]) from
/// inside its handlers.
///
/// [`is_connected`]: Self::is_connected
pub trait PhysicalOutput: Send + Sync {
    /// Submits `layers` for scanout and returns the frame's release fence,
    /// if the output produced one.
    ///
    /// # Errors
    ///
    /// Returns [`PresentError`] when the frame could not be submitted.
    fn present(
        &self,
        layers: &[TileLayer],
        upload: Option<&UploadCallback>,
    ) -> Result<Option<Fence>, PresentError>;

    /// Returns an attribute of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedAttribute`] when the output cannot report it.
    fn display_attribute(
        &self,
        config: u32,
        attribute: DisplayAttribute,
    ) -> Result<i32, UnsupportedAttribute>;

    /// Switches to `config`.
    fn set_active_config(&self, config: u32) -> bool;

    /// Changes the power state.
    fn set_power_mode(&self, mode: PowerMode) -> bool;

    /// Returns `true` while a sink is attached.
    fn is_connected(&self) -> bool;

    /// Width of the active mode, in pixels.
    fn width(&self) -> u32;

    /// Height of the active mode, in pixels.
    fn height(&self) -> u32;

    /// Hardware pipe driving this output.
    fn display_pipe(&self) -> u32;

    /// Position of this output within the host's logical display layout.
    fn logical_index(&self) -> u32;

    /// Routes this output's vblanks to `callback`, tagged with `display`.
    fn register_vsync_callback(&self, callback: VsyncCallback, display: DisplayId);

    /// Routes this output's refresh requests to `callback`.
    fn register_refresh_callback(&self, callback: RefreshCallback, display: DisplayId);

    /// Routes this output's connection changes to `callback`.
    fn register_hotplug_callback(&self, callback: HotPlugCallback, display: DisplayId);

    /// Enables or disables vblank delivery.
    fn vsync_control(&self, enabled: bool);

    /// Returns `true` if a plane can scan out `format` (a fourcc code).
    fn check_plane_format(&self, format: u32) -> bool {
        let _ = format;
        false
    }
}

/// Reads `output`'s attributes at `config`.
///
/// Attributes the output cannot report are treated as zero.
#[must_use]
pub fn output_mode(output: &dyn PhysicalOutput, config: u32) -> OutputMode {
    let read = |attribute| output.display_attribute(config, attribute).unwrap_or(0);
    OutputMode {
        width: output.width(),
        height: output.height(),
        refresh: read(DisplayAttribute::RefreshRate),
        dpi_x: read(DisplayAttribute::DpiX),
        dpi_y: read(DisplayAttribute::DpiY),
    }
}
