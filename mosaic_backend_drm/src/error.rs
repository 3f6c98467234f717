// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend error type.

use std::io;
use std::path::PathBuf;

/// Errors from the DRM vblank backend.
#[derive(Debug, thiserror::Error)]
pub enum VblankError {
    /// The DRM device node could not be opened.
    #[error("failed to open DRM device {}", path.display())]
    Open {
        /// Path of the device node.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The stop waker could not be created.
    #[error("failed to create vblank loop waker")]
    Waker(#[source] io::Error),
    /// The event loop thread could not be started.
    #[error("failed to start vblank event loop")]
    Start(#[source] io::Error),
    /// `DRM_IOCTL_WAIT_VBLANK` failed.
    #[error("vblank wait request failed")]
    Ioctl(#[source] io::Error),
}
