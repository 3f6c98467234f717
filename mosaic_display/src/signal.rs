// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `eventfd`-backed completion signal.

use std::io;
use std::os::fd::OwnedFd;

use rustix::event::{EventfdFlags, PollFd, PollFlags, eventfd, poll};

/// One-shot completion signal shared between a worker and its waiter.
///
/// Signals raised before the waiter arrives are not lost: the `eventfd`
/// counter stays readable until [`wait`](Self::wait) drains it. Several
/// signals raised before one wait collapse into a single wakeup.
#[derive(Debug)]
pub struct CompletionSignal {
    fd: OwnedFd,
}

impl CompletionSignal {
    /// Creates an unsignaled signal.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the `eventfd` cannot be created.
    pub fn new() -> io::Result<Self> {
        let fd = eventfd(0, EventfdFlags::CLOEXEC | EventfdFlags::NONBLOCK)?;
        Ok(Self { fd })
    }

    /// Raises the signal.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the counter cannot be written.
    pub fn signal(&self) -> io::Result<()> {
        rustix::io::write(&self.fd, &1_u64.to_ne_bytes())?;
        Ok(())
    }

    /// Blocks until the signal is raised, then clears it.
    ///
    /// # Errors
    ///
    /// Returns the OS error when `poll` fails or reports nothing ready. The
    /// signal may still be raised afterwards.
    pub fn wait(&self) -> io::Result<()> {
        let mut fds = [PollFd::new(&self.fd, PollFlags::IN)];
        let ready = poll(&mut fds, None)?;
        if ready == 0 {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "poll returned with no ready descriptors",
            ));
        }

        if fds[0].revents().contains(PollFlags::IN) {
            let mut counter = [0_u8; 8];
            match rustix::io::read(&self.fd, &mut counter[..]) {
                Ok(_) | Err(rustix::io::Errno::AGAIN) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Returns `true` if the signal is currently raised, without clearing it.
    ///
    /// # Errors
    ///
    /// Returns the OS error if `poll` fails.
    pub fn is_raised(&self) -> io::Result<bool> {
        let mut fds = [PollFd::new(&self.fd, PollFlags::IN)];
        let zero = rustix::time::Timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let ready = poll(&mut fds, Some(&zero))?;
        Ok(ready > 0 && fds[0].revents().contains(PollFlags::IN))
    }
}
