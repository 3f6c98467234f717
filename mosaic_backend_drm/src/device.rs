// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DRM device access.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;

use crate::error::VblankError;
use crate::request::VblankRequest;

/// The operations a [`VblankEventLoop`](crate::VblankEventLoop) needs from a
/// DRM device.
pub trait DrmDevice: Send + Sync {
    /// Descriptor polled for readable events.
    fn event_fd(&self) -> BorrowedFd<'_>;

    /// Reads pending event records into `buf`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns the OS error from `read`.
    fn read_events(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Arms the next vblank notification.
    ///
    /// # Errors
    ///
    /// Returns [`VblankError::Ioctl`] if the request is rejected.
    fn wait_vblank(&self, request: &VblankRequest) -> Result<(), VblankError>;
}

/// A DRM card node such as `/dev/dri/card0`.
#[derive(Debug)]
pub struct DrmCard {
    fd: OwnedFd,
}

impl DrmCard {
    /// Opens the card at `path` for reading and writing.
    ///
    /// # Errors
    ///
    /// Returns [`VblankError::Open`] if the node cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VblankError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| VblankError::Open {
                path: path.to_owned(),
                source,
            })?;
        Ok(Self {
            fd: OwnedFd::from(file),
        })
    }

    /// Wraps an already-open card descriptor.
    #[must_use]
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self { fd }
    }
}

impl AsFd for DrmCard {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl DrmDevice for DrmCard {
    fn event_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    fn read_events(&self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(rustix::io::read(&self.fd, buf)?)
    }

    fn wait_vblank(&self, request: &VblankRequest) -> Result<(), VblankError> {
        request.wait(self.fd.as_fd())
    }
}
