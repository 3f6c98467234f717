// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The mosaic controller.
//!
//! [`MosaicController`] owns a fixed, ordered set of physical outputs and
//! presents them upstream as one display. It keeps one [`TileWorker`] per
//! connected output, folds per-output vblanks into one averaged vsync per
//! aggregation cycle, and folds per-output hotplug events into one aggregate
//! connection state.
//!
//! # Locking
//!
//! All mutable state sits behind one mutex. Notifications are computed while
//! it is held and delivered after it is released, under a re-entrant
//! delivery gate taken before the state lock. The gate keeps deliveries in
//! the order their state changes happened, and lets a callback call back
//! into the controller from the delivering thread.
//!
//! Frames are serialized by a separate frame lock, held for the whole of
//! [`present`](MosaicController::present). Workers are only created and
//! retired while it is held, so a worker never exits mid-frame.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use mosaic_core::callback::{HotPlugCallback, RefreshCallback, UploadCallback, VsyncCallback};
use mosaic_core::layer::Layer;
use mosaic_core::mode::{CompositeMode, preferred_output};
use mosaic_core::output::{
    DisplayAttribute, DisplayId, OutputId, PowerMode, UnsupportedAttribute,
};
use mosaic_core::tile::{self, TileWindow};
use mosaic_core::vsync::{VsyncAggregationState, VsyncAggregator};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, error, trace};

use crate::config::{MosaicConfig, PresentPipeline};
use crate::fence::Fence;
use crate::output::{PhysicalOutput, output_mode};
use crate::worker::TileWorker;

/// Name reported by [`MosaicController::display_name`].
pub const DISPLAY_NAME: &str = "Mosaic";

struct ControllerState {
    active_config: u32,
    mode: CompositeMode,
    power_mode: PowerMode,
    display_id: DisplayId,
    vsync_enabled: bool,
    vsync: VsyncAggregator,
    /// Aggregate connection state last reported upstream.
    connected: bool,
    topology_dirty: bool,
    workers: BTreeMap<OutputId, Arc<TileWorker>>,
    vsync_callback: Option<VsyncCallback>,
    refresh_callback: Option<RefreshCallback>,
    hotplug_callback: Option<HotPlugCallback>,
}

struct Shared {
    outputs: Vec<Arc<dyn PhysicalOutput>>,
    config: MosaicConfig,
    state: Mutex<ControllerState>,
    delivery: ReentrantMutex<()>,
    frame: Mutex<()>,
}

/// Presents several physical outputs as one wide logical display.
///
/// Cloning is cheap and yields another handle to the same controller.
#[derive(Clone)]
pub struct MosaicController {
    shared: Arc<Shared>,
}

impl fmt::Debug for MosaicController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("MosaicController")
            .field("outputs", &self.shared.outputs.len())
            .field("config", &self.shared.config)
            .field("mode", &state.mode)
            .field("power_mode", &state.power_mode)
            .field("workers", &state.workers.len())
            .finish_non_exhaustive()
    }
}

impl MosaicController {
    /// Creates a controller over `outputs`, in left-to-right tile order.
    ///
    /// The composite mode is derived for config 0, and vsync aggregation
    /// starts with the outputs connected now. Tile workers are created by
    /// the first [`present`](Self::present).
    #[must_use]
    pub fn new(outputs: Vec<Arc<dyn PhysicalOutput>>, config: MosaicConfig) -> Self {
        let mode = CompositeMode::from_outputs(outputs.iter().map(|o| output_mode(o.as_ref(), 0)));
        let connected = count_connected(&outputs);
        let mut vsync = VsyncAggregator::new();
        vsync.topology_changed(connected, false);

        debug!(outputs = outputs.len(), connected, ?config, "mosaic created");
        Self {
            shared: Arc::new(Shared {
                outputs,
                config,
                state: Mutex::new(ControllerState {
                    active_config: 0,
                    mode,
                    power_mode: PowerMode::Off,
                    display_id: DisplayId::default(),
                    vsync_enabled: false,
                    vsync,
                    connected: connected > 0,
                    topology_dirty: true,
                    workers: BTreeMap::new(),
                    vsync_callback: None,
                    refresh_callback: None,
                    hotplug_callback: None,
                }),
                delivery: ReentrantMutex::new(()),
                frame: Mutex::new(()),
            }),
        }
    }

    /// Returns the configuration this controller was created with.
    #[must_use]
    pub fn config(&self) -> MosaicConfig {
        self.shared.config
    }

    /// Applies `config` to every output and recomputes the composite mode.
    ///
    /// Every owned output contributes, connected or not.
    pub fn set_active_config(&self, config: u32) {
        let outputs = &self.shared.outputs;
        for output in outputs {
            output.set_active_config(config);
        }
        let mode =
            CompositeMode::from_outputs(outputs.iter().map(|o| output_mode(o.as_ref(), config)));

        let mut state = self.shared.state.lock();
        state.active_config = config;
        state.mode = mode;
        debug!(config, ?mode, "active config applied");
    }

    /// Returns the config last applied with
    /// [`set_active_config`](Self::set_active_config).
    #[must_use]
    pub fn active_config(&self) -> u32 {
        self.shared.state.lock().active_config
    }

    /// Reports the synthetic configs of the mosaic.
    ///
    /// There is always exactly one, index 0. It is written to the first slot
    /// of `configs` when a non-empty buffer is given. Returns the count.
    pub fn display_configs(&self, configs: Option<&mut [u32]>) -> u32 {
        if let Some(first) = configs.and_then(|configs| configs.first_mut()) {
            *first = 0;
        }
        1
    }

    /// Two-phase query for [`DISPLAY_NAME`].
    ///
    /// Without a buffer, returns the length of the name. With a buffer, copies
    /// as much of the name as fits in `capacity - 1` bytes, NUL-terminates it,
    /// and returns the number of name bytes copied.
    pub fn display_name(&self, name: Option<&mut [u8]>) -> usize {
        let Some(buffer) = name else {
            return DISPLAY_NAME.len();
        };
        let Some(capacity) = buffer.len().checked_sub(1) else {
            return 0;
        };

        let copied = DISPLAY_NAME.len().min(capacity);
        buffer[..copied].copy_from_slice(&DISPLAY_NAME.as_bytes()[..copied]);
        buffer[copied] = 0;
        copied
    }

    /// Returns an attribute of the composite mode.
    ///
    /// `config` is ignored: the mosaic exposes a single synthetic config.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedAttribute`] for attributes other than width,
    /// height, refresh, and the two densities. Hosts that need a numeric
    /// value use [`UnsupportedAttribute::SENTINEL`].
    pub fn display_attribute(
        &self,
        _config: u32,
        attribute: DisplayAttribute,
    ) -> Result<i32, UnsupportedAttribute> {
        self.shared.state.lock().mode.attribute(attribute)
    }

    /// Returns the cached composite mode.
    #[must_use]
    pub fn composite_mode(&self) -> CompositeMode {
        self.shared.state.lock().mode
    }

    /// Width of the mosaic canvas.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.shared.state.lock().mode.width
    }

    /// Height of the mosaic canvas.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.shared.state.lock().mode.height
    }

    /// Index of the output with the highest refresh.
    #[must_use]
    pub fn preferred_output(&self) -> usize {
        self.shared.state.lock().mode.preferred_output
    }

    /// Sets the power mode of the mosaic and every output.
    pub fn set_power_mode(&self, mode: PowerMode) {
        self.shared.state.lock().power_mode = mode;
        for output in &self.shared.outputs {
            output.set_power_mode(mode);
        }
        debug!(?mode, "power mode set");
    }

    /// Returns the power mode last set.
    #[must_use]
    pub fn power_mode(&self) -> PowerMode {
        self.shared.state.lock().power_mode
    }

    /// Returns `true` if any owned output is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.outputs.iter().any(|output| output.is_connected())
    }

    /// Hardware pipe of the first output.
    #[must_use]
    pub fn display_pipe(&self) -> Option<u32> {
        self.shared.outputs.first().map(|output| output.display_pipe())
    }

    /// Returns `true` if the first output can scan out `format`.
    #[must_use]
    pub fn check_plane_format(&self, format: u32) -> bool {
        self.shared
            .outputs
            .first()
            .is_some_and(|output| output.check_plane_format(format))
    }

    /// Presents `layers` across the connected outputs.
    ///
    /// Does nothing unless the power mode is [`PowerMode::On`]. Otherwise the
    /// worker set is reconciled with the current connection state, and each
    /// tile selected by [`MosaicConfig::tile_dispatch`] is presented in
    /// left-to-right order. Tiles that fail to dispatch are logged and keep
    /// their previous frame.
    ///
    /// No retire fence is produced: the return value is always `None`.
    pub fn present(&self, layers: &[Layer], upload: Option<UploadCallback>) -> Option<Fence> {
        let shared = &self.shared;
        if !shared.state.lock().power_mode.is_on() {
            trace!("present skipped: mosaic is not powered on");
            return None;
        }

        let _frame = shared.frame.lock();
        let workers = shared.reconcile();

        let tiles: Vec<(u32, u32)> = workers
            .iter()
            .map(|(output, _)| (output.width(), output.logical_index()))
            .collect();
        let windows: Vec<TileWindow> = tile::layout(tiles).collect();
        let count = shared.config.tiles_per_frame(workers.len());
        let layers: Arc<[Layer]> = Arc::from(layers);

        let frame = workers
            .iter()
            .zip(windows)
            .take(count)
            .map(|((_, worker), window)| (worker, window));
        match shared.config.pipeline {
            PresentPipeline::Sequential => {
                for (worker, window) in frame {
                    if dispatch(worker, window, &layers, upload.as_ref()) {
                        worker.wait();
                    }
                }
            }
            PresentPipeline::Barrier => {
                let dispatched: Vec<&Arc<TileWorker>> = frame
                    .filter(|(worker, window)| dispatch(worker, *window, &layers, upload.as_ref()))
                    .map(|(worker, _)| worker)
                    .collect();
                for worker in dispatched {
                    worker.wait();
                }
            }
        }

        // TODO: merge the workers' release fences into a sync_file retire
        // fence once `Fence` can wrap a merged descriptor.
        None
    }

    /// Registers the upstream vsync callback, tagged with `display`.
    ///
    /// Replaces any previous registration and routes every output's vblanks
    /// into the aggregator.
    pub fn register_vsync_callback(&self, callback: VsyncCallback, display: DisplayId) {
        {
            let mut state = self.shared.state.lock();
            state.display_id = display;
            state.vsync_callback = Some(callback);
        }

        let weak = Arc::downgrade(&self.shared);
        let fan_in: VsyncCallback = Arc::new(move |_, timestamp| {
            if let Some(shared) = Weak::upgrade(&weak) {
                shared.vsync_update(timestamp);
            }
        });
        for output in &self.shared.outputs {
            output.register_vsync_callback(Arc::clone(&fan_in), DisplayId(output.display_pipe()));
        }
    }

    /// Registers the upstream refresh callback, tagged with `display`.
    pub fn register_refresh_callback(&self, callback: RefreshCallback, display: DisplayId) {
        {
            let mut state = self.shared.state.lock();
            state.display_id = display;
            state.refresh_callback = Some(callback);
        }

        let weak = Arc::downgrade(&self.shared);
        let fan_in: RefreshCallback = Arc::new(move |_| {
            if let Some(shared) = Weak::upgrade(&weak) {
                shared.refresh_update();
            }
        });
        for output in &self.shared.outputs {
            output.register_refresh_callback(Arc::clone(&fan_in), DisplayId(output.display_pipe()));
        }
    }

    /// Registers the upstream hotplug callback, tagged with `display`.
    pub fn register_hotplug_callback(&self, callback: HotPlugCallback, display: DisplayId) {
        {
            let mut state = self.shared.state.lock();
            state.display_id = display;
            state.hotplug_callback = Some(callback);
        }

        let weak = Arc::downgrade(&self.shared);
        let fan_in: HotPlugCallback = Arc::new(move |_, connected| {
            if let Some(shared) = Weak::upgrade(&weak) {
                shared.hotplug_update(connected);
            }
        });
        for output in &self.shared.outputs {
            output.register_hotplug_callback(Arc::clone(&fan_in), DisplayId(output.display_pipe()));
        }
    }

    /// Enables or disables vsync delivery.
    ///
    /// Requesting the current state does nothing. A change drops any partial
    /// aggregation cycle and is forwarded to every output.
    pub fn vsync_control(&self, enabled: bool) {
        {
            let mut state = self.shared.state.lock();
            if state.vsync_enabled == enabled {
                return;
            }
            state.vsync_enabled = enabled;
            state.vsync.restart_cycle();
        }

        debug!(enabled, "vsync control changed");
        for output in &self.shared.outputs {
            output.vsync_control(enabled);
        }
    }

    /// Feeds one output's vblank timestamp into the aggregator.
    ///
    /// Called by the fan-in registered with each output; hosts that route
    /// vblanks themselves may call it directly.
    pub fn vsync_update(&self, timestamp: i64) {
        self.shared.vsync_update(timestamp);
    }

    /// Handles one output's connection change.
    pub fn hotplug_update(&self, connected: bool) {
        self.shared.hotplug_update(connected);
    }

    /// Forwards one output's refresh request upstream.
    pub fn refresh_update(&self) {
        self.shared.refresh_update();
    }

    /// Returns a snapshot of the vsync aggregation counters.
    #[must_use]
    pub fn vsync_state(&self) -> VsyncAggregationState {
        self.shared.state.lock().vsync.state()
    }

    /// Number of live tile workers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.state.lock().workers.len()
    }
}

impl Shared {
    /// Brings the worker set in line with connection state if a hotplug was
    /// seen since the last frame, and returns the workers in tile order.
    fn reconcile(&self) -> Vec<(Arc<dyn PhysicalOutput>, Arc<TileWorker>)> {
        let mut retired = Vec::new();
        let workers = {
            let mut state = self.state.lock();
            if state.topology_dirty {
                let mut complete = true;
                let mut refreshes = Vec::new();
                for (index, output) in self.outputs.iter().enumerate() {
                    let id = output_id(index);
                    if output.is_connected() {
                        if !state.workers.contains_key(&id) {
                            match TileWorker::spawn(Arc::clone(output), id) {
                                Ok(worker) => {
                                    debug!(?id, "tile worker created");
                                    state.workers.insert(id, Arc::new(worker));
                                }
                                Err(err) => {
                                    error!(?id, %err, "tile worker unavailable");
                                    complete = false;
                                }
                            }
                        }
                        let refresh = output
                            .display_attribute(state.active_config, DisplayAttribute::RefreshRate)
                            .unwrap_or(0);
                        refreshes.push((index, refresh));
                    } else if let Some(worker) = state.workers.remove(&id) {
                        debug!(?id, "tile worker retired");
                        retired.push(worker);
                    }
                }
                if let Some(index) = preferred_output(refreshes) {
                    state.mode.preferred_output = index;
                }
                state.topology_dirty = !complete;
            }
            self.outputs
                .iter()
                .enumerate()
                .filter_map(|(index, output)| {
                    let worker = state.workers.get(&output_id(index))?;
                    Some((Arc::clone(output), Arc::clone(worker)))
                })
                .collect()
        };

        for worker in retired {
            worker.exit();
        }
        workers
    }

    fn vsync_update(&self, timestamp: i64) {
        let _delivery = self.delivery.lock();
        let averaged = {
            let mut state = self.state.lock();
            if !state.vsync_enabled {
                return;
            }
            let Some(callback) = state.vsync_callback.clone() else {
                return;
            };
            let display_id = state.display_id;
            state
                .vsync
                .observe(timestamp)
                .map(|average| (callback, display_id, average))
        };

        if let Some((callback, display_id, average)) = averaged {
            trace!(display = ?display_id, timestamp = average, "vsync");
            callback(display_id, average);
        }
    }

    fn hotplug_update(&self, connected: bool) {
        let _delivery = self.delivery.lock();
        let (display_id, flushed, notify) = {
            let mut state = self.state.lock();
            state.topology_dirty = true;
            let total = count_connected(&self.outputs);
            let display_id = state.display_id;

            let flush = state.vsync_enabled && state.vsync_callback.is_some();
            let flushed = state
                .vsync
                .topology_changed(total, flush)
                .and_then(|average| {
                    let callback = state.vsync_callback.clone()?;
                    Some((callback, average))
                });

            let notify = if state.connected == connected {
                None
            } else if let Some(callback) = state.hotplug_callback.clone() {
                if !connected && state.connected && total > 0 {
                    debug!(total, "output dropped; mosaic stays connected");
                    None
                } else {
                    state.connected = connected;
                    Some(callback)
                }
            } else {
                None
            };
            debug!(connected, total, "hotplug");
            (display_id, flushed, notify)
        };

        if let Some((callback, average)) = flushed {
            debug!(
                display = ?display_id,
                timestamp = average,
                "flushing vsync cycle cut short by hotplug"
            );
            callback(display_id, average);
        }
        if let Some(callback) = notify {
            debug!(display = ?display_id, connected, "mosaic connection changed");
            callback(display_id, connected);
        }
    }

    fn refresh_update(&self) {
        let _delivery = self.delivery.lock();
        let refresh = {
            let state = self.state.lock();
            if !state.connected || !state.power_mode.is_on() {
                return;
            }
            state
                .refresh_callback
                .clone()
                .map(|callback| (callback, state.display_id))
        };
        if let Some((callback, display)) = refresh {
            callback(display);
        }
    }
}

fn dispatch(
    worker: &TileWorker,
    window: TileWindow,
    layers: &Arc<[Layer]>,
    upload: Option<&UploadCallback>,
) -> bool {
    match worker.present(window, Arc::clone(layers), upload.cloned()) {
        Ok(()) => true,
        Err(err) => {
            error!(output_id = ?worker.output_id(), %err, "tile dispatch failed");
            false
        }
    }
}

fn count_connected(outputs: &[Arc<dyn PhysicalOutput>]) -> u32 {
    let count = outputs.iter().filter(|output| output.is_connected()).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn output_id(index: usize) -> OutputId {
    OutputId(u32::try_from(index).unwrap_or(u32::MAX))
}
