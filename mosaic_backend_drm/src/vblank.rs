// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-output vblank event loop.

use std::fmt;
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mosaic_core::callback::{IdleHook, VsyncCallback};
use mosaic_core::output::{DisplayId, PowerMode};
use parking_lot::Mutex;
use rustix::event::{EventfdFlags, PollFd, PollFlags, eventfd, poll};
use rustix::io::Errno;
use tracing::{debug, error, trace, warn};

use crate::device::DrmDevice;
use crate::error::VblankError;
use crate::event::{DrmEvent, FlipEvent, decode};
use crate::request::VblankRequest;
use crate::time::FrameInterval;

/// Room for 32 vblank records per read.
const EVENT_BUFFER_LEN: usize = 1024;

struct Target {
    callback: Option<VsyncCallback>,
    display: DisplayId,
    enabled: bool,
    interval: FrameInterval,
}

struct Inner {
    device: Arc<dyn DrmDevice>,
    pipe: u32,
    request: VblankRequest,
    target: Mutex<Target>,
    idle: Mutex<Option<IdleHook>>,
}

struct Runner {
    waker: Arc<OwnedFd>,
    thread: JoinHandle<()>,
}

/// Forwards one output's page-flip completions as vsync timestamps.
///
/// The loop runs on its own thread while the output is powered on. Each
/// iteration runs the idle hook, waits for the DRM descriptor (or a stop
/// request), forwards any flip completions, and then arms the next vblank.
///
/// The vsync callback is invoked after the loop's target lock is released,
/// so it may call back into the same loop.
pub struct VblankEventLoop {
    inner: Arc<Inner>,
    runner: Mutex<Option<Runner>>,
}

impl fmt::Debug for VblankEventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VblankEventLoop")
            .field("pipe", &self.inner.pipe)
            .field("request", &self.inner.request)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl VblankEventLoop {
    /// Binds a loop to `device`, requesting vblanks on hardware `pipe`.
    ///
    /// The loop is created stopped and with vsync disabled.
    #[must_use]
    pub fn init(device: Arc<dyn DrmDevice>, pipe: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                device,
                pipe,
                request: VblankRequest::next(pipe),
                target: Mutex::new(Target {
                    callback: None,
                    display: DisplayId::default(),
                    enabled: false,
                    interval: FrameInterval::new(),
                }),
                idle: Mutex::new(None),
            }),
            runner: Mutex::new(None),
        }
    }

    /// Installs the hook run at the top of every loop iteration.
    pub fn set_idle_hook(&self, hook: IdleHook) {
        *self.inner.idle.lock() = Some(hook);
    }

    /// Starts the loop for [`PowerMode::On`] and stops it otherwise.
    ///
    /// A loop that fails to start is logged; the output then runs without
    /// vsync.
    pub fn set_power_mode(&self, mode: PowerMode) {
        if !mode.is_on() {
            self.stop();
            return;
        }
        if let Err(err) = self.start() {
            error!(pipe = self.inner.pipe, %err, "vblank loop unavailable");
        }
    }

    /// Starts the loop thread if it is not running.
    ///
    /// # Errors
    ///
    /// Returns [`VblankError`] if the stop waker or the thread cannot be
    /// created.
    pub fn start(&self) -> Result<(), VblankError> {
        let mut runner = self.runner.lock();
        if runner.is_some() {
            return Ok(());
        }

        let waker = Arc::new(
            eventfd(0, EventfdFlags::CLOEXEC | EventfdFlags::NONBLOCK)
                .map_err(|err| VblankError::Waker(err.into()))?,
        );
        let thread = {
            let inner = Arc::clone(&self.inner);
            let waker = Arc::clone(&waker);
            thread::Builder::new()
                .name(format!("mosaic-vblank-{}", self.inner.pipe))
                .spawn(move || inner.run(&waker))
                .map_err(VblankError::Start)?
        };

        debug!(pipe = self.inner.pipe, "vblank loop started");
        *runner = Some(Runner { waker, thread });
        Ok(())
    }

    /// Stops the loop thread and waits for it to exit.
    pub fn stop(&self) {
        let Some(runner) = self.runner.lock().take() else {
            return;
        };
        if let Err(err) = rustix::io::write(&*runner.waker, &1_u64.to_ne_bytes()) {
            error!(pipe = self.inner.pipe, %err, "failed to wake vblank loop");
        }
        if runner.thread.join().is_err() {
            error!(pipe = self.inner.pipe, "vblank loop panicked");
        }
        debug!(pipe = self.inner.pipe, "vblank loop stopped");
    }

    /// Returns `true` while the loop thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.runner.lock().is_some()
    }

    /// Sets the callback and the display id it is invoked with.
    pub fn register_callback(&self, callback: VsyncCallback, display: DisplayId) {
        let mut target = self.inner.target.lock();
        target.callback = Some(callback);
        target.display = display;
        target.interval.reset();
    }

    /// Enables or disables forwarding. Requesting the current state does
    /// nothing.
    pub fn vsync_control(&self, enabled: bool) {
        let mut target = self.inner.target.lock();
        if target.enabled == enabled {
            return;
        }
        target.enabled = enabled;
        target.interval.reset();
        trace!(pipe = self.inner.pipe, enabled, "vblank forwarding changed");
    }

    /// Returns `true` while flip completions are forwarded.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.target.lock().enabled
    }
}

impl Drop for VblankEventLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn run(&self, waker: &OwnedFd) {
        let mut buf = [0_u8; EVENT_BUFFER_LEN];
        loop {
            let idle = self.idle.lock().clone();
            if let Some(idle) = idle {
                idle();
            }

            let device = self.device.event_fd();
            let mut fds = [
                PollFd::from_borrowed_fd(device, PollFlags::IN),
                PollFd::new(waker, PollFlags::IN),
            ];
            if after_poll(self.pipe, poll(&mut fds, None)) == AfterPoll::Retry {
                continue;
            }
            if fds[1].revents().contains(PollFlags::IN) {
                break;
            }
            if fds[0].revents().contains(PollFlags::IN) {
                self.dispatch(&mut buf);
            }

            if let Err(err) = self.device.wait_vblank(&self.request) {
                trace!(pipe = self.pipe, %err, "vblank request failed");
            }
        }
    }

    fn dispatch(&self, buf: &mut [u8]) {
        let len = match self.device.read_events(buf) {
            Ok(len) => len,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return,
            Err(err) => {
                error!(pipe = self.pipe, %err, "failed to read DRM events");
                return;
            }
        };

        for event in decode(&buf[..len]) {
            match event {
                Ok(DrmEvent::FlipComplete(flip)) => self.handle_flip(&flip),
                Ok(_) => {}
                Err(err) => warn!(pipe = self.pipe, %err, "discarding malformed DRM events"),
            }
        }
    }

    fn handle_flip(&self, flip: &FlipEvent) {
        let timestamp = flip.timestamp();
        let mut target = self.target.lock();
        if let Some(delta) = target.interval.observe(timestamp) {
            trace!(
                pipe = self.pipe,
                crtc = ?flip.crtc(),
                frame_time_us = delta / 1_000,
                "page flip"
            );
        }
        if !target.enabled {
            return;
        }
        let Some(callback) = target.callback.clone() else {
            return;
        };
        let display = target.display;
        drop(target);
        callback(display, timestamp);
    }
}

/// What an iteration does once `poll` returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AfterPoll {
    /// Interrupted before anything happened; poll again.
    Retry,
    /// Handle whatever is ready, then arm the next vblank.
    Proceed,
}

/// Failed polls still proceed: the blocking vblank wait is what paces the
/// loop, so skipping it would spin.
fn after_poll(pipe: u32, polled: rustix::io::Result<usize>) -> AfterPoll {
    match polled {
        Ok(0) => {
            error!(pipe, "vblank poll returned nothing ready");
            AfterPoll::Proceed
        }
        Ok(_) => AfterPoll::Proceed,
        Err(Errno::INTR) => AfterPoll::Retry,
        Err(err) => {
            error!(pipe, %err, "vblank poll failed");
            AfterPoll::Proceed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::flip;
    use std::io;
    use std::os::fd::{AsFd, BorrowedFd};
    use std::os::unix::net::UnixDatagram;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct FakeDrm {
        events: UnixDatagram,
        armed: AtomicUsize,
    }

    impl DrmDevice for FakeDrm {
        fn event_fd(&self) -> BorrowedFd<'_> {
            self.events.as_fd()
        }

        fn read_events(&self, buf: &mut [u8]) -> io::Result<usize> {
            self.events.recv(buf)
        }

        fn wait_vblank(&self, _request: &VblankRequest) -> Result<(), VblankError> {
            self.armed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fake() -> (Arc<FakeDrm>, UnixDatagram) {
        let (events, kernel) = UnixDatagram::pair().unwrap();
        events.set_nonblocking(true).unwrap();
        let device = Arc::new(FakeDrm {
            events,
            armed: AtomicUsize::new(0),
        });
        (device, kernel)
    }

    fn recording(
        event_loop: &VblankEventLoop,
        display: DisplayId,
    ) -> mpsc::Receiver<(DisplayId, i64)> {
        let (sender, receiver) = mpsc::channel();
        event_loop.register_callback(
            Arc::new(move |display, timestamp| {
                let _ = sender.send((display, timestamp));
            }),
            display,
        );
        receiver
    }

    fn flip_event(tv_sec: u32, tv_usec: u32) -> FlipEvent {
        FlipEvent {
            user_data: 0,
            tv_sec,
            tv_usec,
            sequence: 0,
            crtc_id: 0,
        }
    }

    #[test]
    fn flip_completion_reaches_the_callback() {
        let (device, kernel) = fake();
        let event_loop = VblankEventLoop::init(device.clone(), 1);
        let seen = recording(&event_loop, DisplayId(4));
        event_loop.vsync_control(true);
        event_loop.set_power_mode(PowerMode::On);
        assert!(event_loop.is_running());

        kernel.send(&flip(2, 500, 31)).unwrap();
        assert_eq!(
            seen.recv_timeout(TIMEOUT).unwrap(),
            (DisplayId(4), 2_000_500_000)
        );

        event_loop.set_power_mode(PowerMode::Off);
        assert!(!event_loop.is_running());
    }

    #[test]
    fn only_flip_completions_are_forwarded() {
        let (device, kernel) = fake();
        let event_loop = VblankEventLoop::init(device, 0);
        let seen = recording(&event_loop, DisplayId(0));
        event_loop.vsync_control(true);
        event_loop.start().unwrap();

        let mut vblank = flip(1, 0, 0);
        vblank[0..4].copy_from_slice(&1_u32.to_ne_bytes());
        let mut buf = vblank;
        buf.extend(flip(3, 0, 0));
        kernel.send(&buf).unwrap();

        assert_eq!(seen.recv_timeout(TIMEOUT).unwrap().1, 3_000_000_000);
        event_loop.stop();
        assert!(seen.try_recv().is_err(), "the vblank record is ignored");
    }

    #[test]
    fn idle_hook_runs_every_iteration_and_next_vblank_is_armed() {
        let (device, kernel) = fake();
        let event_loop = VblankEventLoop::init(device.clone(), 0);
        let (sender, idle) = mpsc::channel();
        event_loop.set_idle_hook(Arc::new(move || {
            let _ = sender.send(());
        }));
        event_loop.start().unwrap();

        idle.recv_timeout(TIMEOUT).unwrap();
        kernel.send(&flip(1, 0, 0)).unwrap();
        idle.recv_timeout(TIMEOUT).unwrap();
        assert!(
            device.armed.load(Ordering::SeqCst) >= 1,
            "the iteration that handled the flip armed the next vblank"
        );
        event_loop.stop();
    }

    #[test]
    fn loop_restarts_after_power_cycle() {
        let (device, kernel) = fake();
        let event_loop = VblankEventLoop::init(device, 0);
        let seen = recording(&event_loop, DisplayId(1));
        event_loop.vsync_control(true);

        event_loop.set_power_mode(PowerMode::On);
        event_loop.set_power_mode(PowerMode::Doze);
        assert!(!event_loop.is_running());
        event_loop.set_power_mode(PowerMode::On);
        event_loop.set_power_mode(PowerMode::On);

        kernel.send(&flip(5, 0, 0)).unwrap();
        assert_eq!(seen.recv_timeout(TIMEOUT).unwrap().1, 5_000_000_000);
    }

    #[test]
    fn disabled_or_unregistered_loop_drops_flips() {
        let (device, _kernel) = fake();
        let event_loop = VblankEventLoop::init(device, 0);
        event_loop.vsync_control(true);
        event_loop.inner.handle_flip(&flip_event(1, 0));

        let seen = recording(&event_loop, DisplayId(0));
        event_loop.vsync_control(false);
        event_loop.inner.handle_flip(&flip_event(2, 0));
        assert!(seen.try_recv().is_err());

        event_loop.vsync_control(true);
        event_loop.inner.handle_flip(&flip_event(3, 0));
        assert_eq!(seen.try_recv().unwrap(), (DisplayId(0), 3_000_000_000));
    }

    #[test]
    fn state_changes_reset_the_frame_interval() {
        let (device, _kernel) = fake();
        let event_loop = VblankEventLoop::init(device, 0);
        let last = || event_loop.inner.target.lock().interval.last();

        event_loop.inner.handle_flip(&flip_event(1, 0));
        assert_eq!(last(), Some(1_000_000_000), "tracked even while disabled");

        event_loop.vsync_control(true);
        assert_eq!(last(), None);
        event_loop.inner.handle_flip(&flip_event(2, 0));

        event_loop.vsync_control(true);
        assert_eq!(last(), Some(2_000_000_000), "no change, no reset");

        let _seen = recording(&event_loop, DisplayId(0));
        assert_eq!(last(), None);
    }

    #[test]
    fn failed_poll_still_arms_the_next_vblank() {
        assert_eq!(after_poll(0, Ok(1)), AfterPoll::Proceed);
        assert_eq!(after_poll(0, Err(Errno::INTR)), AfterPoll::Retry);
        assert_eq!(
            after_poll(0, Err(Errno::INVAL)),
            AfterPoll::Proceed,
            "a persistent failure must not skip the pacing wait"
        );
        assert_eq!(after_poll(0, Ok(0)), AfterPoll::Proceed);
    }

    #[test]
    fn callback_may_reconfigure_its_own_loop() {
        let (device, kernel) = fake();
        let event_loop = Arc::new(VblankEventLoop::init(device, 0));
        let (sender, seen) = mpsc::channel();
        let handle = Arc::downgrade(&event_loop);
        event_loop.register_callback(
            Arc::new(move |display, timestamp| {
                if let Some(event_loop) = handle.upgrade() {
                    event_loop.vsync_control(false);
                }
                let _ = sender.send((display, timestamp));
            }),
            DisplayId(2),
        );
        event_loop.vsync_control(true);
        event_loop.start().unwrap();

        kernel.send(&flip(1, 0, 0)).unwrap();
        assert_eq!(
            seen.recv_timeout(TIMEOUT).unwrap(),
            (DisplayId(2), 1_000_000_000),
            "the callback returned from vsync_control"
        );
        assert!(!event_loop.is_enabled());
        event_loop.stop();
    }

    /// A connected output whose vsync comes from a [`VblankEventLoop`].
    struct LoopOutput {
        pipe: u32,
        vblank: VblankEventLoop,
    }

    impl LoopOutput {
        fn new(pipe: u32) -> (Arc<Self>, UnixDatagram) {
            let (device, kernel) = fake();
            let output = Arc::new(Self {
                pipe,
                vblank: VblankEventLoop::init(device, pipe),
            });
            (output, kernel)
        }
    }

    impl mosaic_display::PhysicalOutput for LoopOutput {
        fn present(
            &self,
            _layers: &[mosaic_display::TileLayer],
            _upload: Option<&mosaic_display::UploadCallback>,
        ) -> Result<Option<mosaic_display::Fence>, mosaic_display::PresentError> {
            Ok(None)
        }

        fn display_attribute(
            &self,
            _config: u32,
            attribute: mosaic_display::DisplayAttribute,
        ) -> Result<i32, mosaic_display::UnsupportedAttribute> {
            use mosaic_display::DisplayAttribute as Attr;
            match attribute {
                Attr::Width => Ok(1920),
                Attr::Height => Ok(1080),
                Attr::RefreshRate => Ok(16_666_667),
                Attr::DpiX | Attr::DpiY => Ok(160_000),
                Attr::ConfigGroup => Err(mosaic_display::UnsupportedAttribute(attribute)),
            }
        }

        fn set_active_config(&self, _config: u32) -> bool {
            true
        }

        fn set_power_mode(&self, mode: PowerMode) -> bool {
            self.vblank.set_power_mode(mode);
            true
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn width(&self) -> u32 {
            1920
        }

        fn height(&self) -> u32 {
            1080
        }

        fn display_pipe(&self) -> u32 {
            self.pipe
        }

        fn logical_index(&self) -> u32 {
            self.pipe
        }

        fn register_vsync_callback(&self, callback: VsyncCallback, display: DisplayId) {
            self.vblank.register_callback(callback, display);
        }

        fn register_refresh_callback(
            &self,
            _callback: mosaic_display::RefreshCallback,
            _display: DisplayId,
        ) {
        }

        fn register_hotplug_callback(
            &self,
            _callback: mosaic_display::HotPlugCallback,
            _display: DisplayId,
        ) {
        }

        fn vsync_control(&self, enabled: bool) {
            self.vblank.vsync_control(enabled);
        }
    }

    #[test]
    fn mosaic_vsync_callback_may_disable_vsync_from_a_vblank_thread() {
        let (left, left_kernel) = LoopOutput::new(0);
        let (right, right_kernel) = LoopOutput::new(1);
        let outputs: Vec<Arc<dyn mosaic_display::PhysicalOutput>> =
            vec![left.clone(), right.clone()];
        let mosaic =
            mosaic_display::MosaicController::new(outputs, mosaic_display::MosaicConfig::new());

        let (sender, seen) = mpsc::channel();
        let handle = mosaic.clone();
        mosaic.register_vsync_callback(
            Arc::new(move |display, timestamp| {
                handle.vsync_control(false);
                let _ = sender.send((display, timestamp));
            }),
            DisplayId(7),
        );
        mosaic.vsync_control(true);
        mosaic.set_power_mode(PowerMode::On);
        assert!(left.vblank.is_running() && right.vblank.is_running());

        left_kernel.send(&flip(1, 0, 0)).unwrap();
        right_kernel.send(&flip(3, 0, 0)).unwrap();
        assert_eq!(
            seen.recv_timeout(TIMEOUT).unwrap(),
            (DisplayId(7), 2_000_000_000),
            "one averaged vsync, delivered after vsync_control returned"
        );
        assert!(!left.vblank.is_enabled());
        assert!(!right.vblank.is_enabled());

        mosaic.set_power_mode(PowerMode::Off);
        assert!(!left.vblank.is_running() && !right.vblank.is_running());
    }

    #[test]
    fn dropping_a_running_loop_stops_it() {
        let (device, _kernel) = fake();
        let event_loop = VblankEventLoop::init(device.clone(), 0);
        event_loop.start().unwrap();
        drop(event_loop);
        assert_eq!(Arc::strong_count(&device), 1, "the loop thread released the device");
    }
}
