// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory outputs for exercising the controller and workers.

use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use kurbo::Rect;
use mosaic_core::callback::{HotPlugCallback, RefreshCallback, UploadCallback, VsyncCallback};
use mosaic_core::layer::{Layer, LayerId, TileLayer};
use mosaic_core::output::{DisplayAttribute, DisplayId, PowerMode, UnsupportedAttribute};
use parking_lot::Mutex;
use rustix::event::{PollFd, PollFlags, poll};

use crate::fence::Fence;
use crate::output::{PhysicalOutput, PresentError};

pub(crate) fn layer(id: u64, x0: f64, x1: f64) -> Layer {
    Layer::new(LayerId(id), Rect::new(x0, 0.0, x1, 100.0))
}

#[derive(Default)]
struct FakeState {
    connected: bool,
    width: u32,
    height: u32,
    refresh: i32,
    dpi: i32,
    logical_index: u32,
    display_pipe: u32,
    active_config: Option<u32>,
    power_mode: PowerMode,
    vsync_enabled: bool,
    fences: bool,
    fail_present: bool,
    presented: Vec<Vec<TileLayer>>,
    fence_peers: Vec<OwnedFd>,
    vsync: Option<(VsyncCallback, DisplayId)>,
    refresh_cb: Option<(RefreshCallback, DisplayId)>,
    hotplug: Option<(HotPlugCallback, DisplayId)>,
    plane_formats: Vec<u32>,
}

/// Output that records submissions and lets tests inject events.
///
/// Callbacks are cloned out of the state lock before they run, matching the
/// [`PhysicalOutput`] contract.
#[derive(Default)]
pub(crate) struct FakeOutput {
    state: Mutex<FakeState>,
}

impl FakeOutput {
    pub(crate) fn new(width: u32, height: u32, refresh: i32) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                connected: true,
                width,
                height,
                refresh,
                dpi: 160,
                ..FakeState::default()
            }),
        })
    }

    pub(crate) fn with_logical_index(self: Arc<Self>, index: u32) -> Arc<Self> {
        self.state.lock().logical_index = index;
        self
    }

    pub(crate) fn with_pipe(self: Arc<Self>, pipe: u32) -> Arc<Self> {
        self.state.lock().display_pipe = pipe;
        self
    }

    pub(crate) fn with_dpi(self: Arc<Self>, dpi: i32) -> Arc<Self> {
        self.state.lock().dpi = dpi;
        self
    }

    pub(crate) fn with_plane_format(self: Arc<Self>, format: u32) -> Arc<Self> {
        self.state.lock().plane_formats.push(format);
        self
    }

    pub(crate) fn set_fences(&self, enabled: bool) {
        self.state.lock().fences = enabled;
    }

    pub(crate) fn set_fail_present(&self, fail: bool) {
        self.state.lock().fail_present = fail;
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    pub(crate) fn presented(&self) -> Vec<Vec<TileLayer>> {
        self.state.lock().presented.clone()
    }

    pub(crate) fn active_config(&self) -> Option<u32> {
        self.state.lock().active_config
    }

    pub(crate) fn power_mode(&self) -> PowerMode {
        self.state.lock().power_mode
    }

    pub(crate) fn vsync_enabled(&self) -> bool {
        self.state.lock().vsync_enabled
    }

    /// Number of fences handed out whose descriptors are still open.
    pub(crate) fn live_fences(&self) -> usize {
        let state = self.state.lock();
        let zero = rustix::time::Timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        state
            .fence_peers
            .iter()
            .filter(|peer| {
                let mut fds = [PollFd::new(*peer, PollFlags::IN)];
                let ready = poll(&mut fds, Some(&zero)).unwrap();
                ready == 0
            })
            .count()
    }

    /// Changes the connection state and reports it like a hotplug monitor.
    pub(crate) fn plug(&self, connected: bool) {
        let hotplug = {
            let mut state = self.state.lock();
            state.connected = connected;
            state.hotplug.clone()
        };
        if let Some((callback, display)) = hotplug {
            callback(display, connected);
        }
    }

    /// Reports a vblank at `timestamp` if vsync is enabled.
    pub(crate) fn vblank(&self, timestamp: i64) {
        let vsync = {
            let state = self.state.lock();
            state.vsync.clone().filter(|_| state.vsync_enabled)
        };
        if let Some((callback, display)) = vsync {
            callback(display, timestamp);
        }
    }

    pub(crate) fn request_refresh(&self) {
        let refresh = self.state.lock().refresh_cb.clone();
        if let Some((callback, display)) = refresh {
            callback(display);
        }
    }

    fn make_fence(state: &mut FakeState) -> Result<Fence, PresentError> {
        let (ours, theirs) = UnixStream::pair()?;
        state.fence_peers.push(OwnedFd::from(ours));
        Ok(Fence::from_fd(OwnedFd::from(theirs)))
    }
}

impl PhysicalOutput for FakeOutput {
    fn present(
        &self,
        layers: &[TileLayer],
        upload: Option<&UploadCallback>,
    ) -> Result<Option<Fence>, PresentError> {
        let fence = {
            let mut state = self.state.lock();
            if state.fail_present {
                return Err(PresentError::Rejected("test commit failed".into()));
            }
            state.presented.push(layers.to_vec());
            if state.fences {
                Some(Self::make_fence(&mut state)?)
            } else {
                None
            }
        };
        if let Some(upload) = upload {
            upload();
        }
        Ok(fence)
    }

    fn display_attribute(
        &self,
        _config: u32,
        attribute: DisplayAttribute,
    ) -> Result<i32, UnsupportedAttribute> {
        let state = self.state.lock();
        match attribute {
            DisplayAttribute::Width => Ok(i32::try_from(state.width).unwrap_or(i32::MAX)),
            DisplayAttribute::Height => Ok(i32::try_from(state.height).unwrap_or(i32::MAX)),
            DisplayAttribute::RefreshRate => Ok(state.refresh),
            DisplayAttribute::DpiX | DisplayAttribute::DpiY => Ok(state.dpi),
            DisplayAttribute::ConfigGroup => Err(UnsupportedAttribute(attribute)),
        }
    }

    fn set_active_config(&self, config: u32) -> bool {
        self.state.lock().active_config = Some(config);
        true
    }

    fn set_power_mode(&self, mode: PowerMode) -> bool {
        self.state.lock().power_mode = mode;
        true
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn width(&self) -> u32 {
        self.state.lock().width
    }

    fn height(&self) -> u32 {
        self.state.lock().height
    }

    fn display_pipe(&self) -> u32 {
        self.state.lock().display_pipe
    }

    fn logical_index(&self) -> u32 {
        self.state.lock().logical_index
    }

    fn register_vsync_callback(&self, callback: VsyncCallback, display: DisplayId) {
        self.state.lock().vsync = Some((callback, display));
    }

    fn register_refresh_callback(&self, callback: RefreshCallback, display: DisplayId) {
        self.state.lock().refresh_cb = Some((callback, display));
    }

    fn register_hotplug_callback(&self, callback: HotPlugCallback, display: DisplayId) {
        self.state.lock().hotplug = Some((callback, display));
    }

    fn vsync_control(&self, enabled: bool) {
        self.state.lock().vsync_enabled = enabled;
    }

    fn check_plane_format(&self, format: u32) -> bool {
        self.state.lock().plane_formats.contains(&format)
    }
}
