// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Relative vblank wait requests.

#![expect(unsafe_code, reason = "DRM_IOCTL_WAIT_VBLANK has no safe wrapper")]

use std::io;
use std::mem::size_of;
use std::os::fd::{AsRawFd, BorrowedFd};

use crate::error::VblankError;

/// `DRM_VBLANK_RELATIVE`: the sequence is relative to the current count.
const VBLANK_RELATIVE: u32 = 0x0000_0001;
/// `DRM_VBLANK_HIGH_CRTC_SHIFT`.
const VBLANK_HIGH_CRTC_SHIFT: u32 = 1;
/// `DRM_VBLANK_HIGH_CRTC_MASK`.
const VBLANK_HIGH_CRTC_MASK: u32 = 0x0000_003e;

/// A request to wait for the next vblank on one CRTC pipe.
///
/// The pipe index is packed into the high-CRTC bits of the request type, so
/// pipes 0 through 31 can be addressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VblankRequest {
    kind: u32,
    sequence: u32,
}

impl VblankRequest {
    /// Waits one vblank past the current one on `pipe`.
    #[must_use]
    pub const fn next(pipe: u32) -> Self {
        let high_crtc = (pipe << VBLANK_HIGH_CRTC_SHIFT) & VBLANK_HIGH_CRTC_MASK;
        Self {
            kind: VBLANK_RELATIVE | high_crtc,
            sequence: 1,
        }
    }

    /// The encoded `drm_vblank_seq_type`.
    #[must_use]
    pub const fn kind(&self) -> u32 {
        self.kind
    }

    /// Number of vblanks to wait, relative to the current count.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Blocks until the requested vblank on `fd`.
    ///
    /// The reply carries the vblank time, but page-flip events are the source
    /// of timestamps, so it is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`VblankError::Ioctl`] if the ioctl fails.
    pub fn wait(&self, fd: BorrowedFd<'_>) -> Result<(), VblankError> {
        let mut arg = WaitVblank {
            request: WaitVblankRequest {
                kind: self.kind,
                sequence: self.sequence,
                signal: 0,
            },
        };
        // SAFETY: `arg` is a live `drm_wait_vblank` union matching the size
        // encoded in the request number, and `fd` is a valid open descriptor.
        let ret = unsafe { libc::ioctl(fd.as_raw_fd(), WAIT_VBLANK, &raw mut arg) };
        if ret < 0 {
            return Err(VblankError::Ioctl(io::Error::last_os_error()));
        }
        Ok(())
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
struct WaitVblankRequest {
    kind: u32,
    sequence: u32,
    signal: libc::c_ulong,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code, reason = "written by the kernel, never read")]
struct WaitVblankReply {
    kind: u32,
    sequence: u32,
    tval_sec: libc::c_long,
    tval_usec: libc::c_long,
}

/// `union drm_wait_vblank`.
#[repr(C)]
#[allow(dead_code, reason = "the reply arm sizes the union")]
union WaitVblank {
    request: WaitVblankRequest,
    reply: WaitVblankReply,
}

/// `DRM_IOWR(0x3a, union drm_wait_vblank)`.
const WAIT_VBLANK: libc::Ioctl = iowr(b'd', 0x3a, size_of::<WaitVblank>());

const fn iowr(group: u8, number: u8, size: usize) -> libc::Ioctl {
    const READ_WRITE: u32 = 3;
    let request = (READ_WRITE << 30) | ((size as u32) << 16) | ((group as u32) << 8) | number as u32;
    request as libc::Ioctl
}
