// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decoding of DRM event records.
//!
//! A `read()` on a DRM file descriptor returns zero or more packed records,
//! each starting with a `drm_event` header:
//!
//! ```text
//!  0        4        8               16       20       24       28       32
//!  ├ type ──┼ length ┼── user_data ───┼ tv_sec ┼ tv_usec┼ seq ───┼ crtc_id┤
//!  └ header ┘        └────────────── drm_event_vblank body ───────────────┘
//! ```
//!
//! `length` covers the header and is used to step to the next record, so
//! record kinds this module does not understand are skipped. Fields are in
//! native byte order.

use std::fmt;

/// `DRM_EVENT_VBLANK`.
const EVENT_VBLANK: u32 = 0x01;
/// `DRM_EVENT_FLIP_COMPLETE`.
const EVENT_FLIP_COMPLETE: u32 = 0x02;
/// `DRM_EVENT_CRTC_SEQUENCE`.
const EVENT_CRTC_SEQUENCE: u32 = 0x03;

const HEADER_LEN: usize = 8;
const VBLANK_EVENT_LEN: usize = 32;

/// Body of a vblank or page-flip completion record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlipEvent {
    /// Opaque value supplied with the request.
    pub user_data: u64,
    /// Seconds part of the completion time.
    pub tv_sec: u32,
    /// Microseconds part of the completion time.
    pub tv_usec: u32,
    /// Vblank sequence number.
    pub sequence: u32,
    /// CRTC that completed, or 0 from kernels that predate the field.
    pub crtc_id: u32,
}

impl FlipEvent {
    /// The CRTC id, when the kernel reported one.
    ///
    /// Kernels without `page_flip_handler2` support leave the field zero.
    #[must_use]
    pub fn crtc(&self) -> Option<u32> {
        (self.crtc_id != 0).then_some(self.crtc_id)
    }

    /// Completion time in nanoseconds.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        crate::time::flip_timestamp(self.tv_sec, self.tv_usec)
    }

    fn parse(body: &[u8]) -> Self {
        Self {
            user_data: u64::from_ne_bytes(field(body, 8)),
            tv_sec: u32::from_ne_bytes(field(body, 16)),
            tv_usec: u32::from_ne_bytes(field(body, 20)),
            sequence: u32::from_ne_bytes(field(body, 24)),
            crtc_id: u32::from_ne_bytes(field(body, 28)),
        }
    }
}

/// One decoded DRM event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrmEvent {
    /// A vblank requested with `DRM_VBLANK_EVENT`.
    Vblank(FlipEvent),
    /// A page flip completed.
    FlipComplete(FlipEvent),
    /// A `DRM_IOCTL_CRTC_QUEUE_SEQUENCE` event.
    CrtcSequence,
    /// A record of a kind this module does not decode.
    Other {
        /// The record's `type` field.
        kind: u32,
    },
}

/// A record that could not be decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Fewer bytes remain than a record header or its stated length.
    #[error("truncated DRM event: {available} bytes left, {needed} needed")]
    Truncated {
        /// Bytes needed to decode the record.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },
    /// A record's length is shorter than its kind requires.
    #[error("DRM event of type {kind} has invalid length {length}")]
    BadLength {
        /// The record's `type` field.
        kind: u32,
        /// The record's `length` field.
        length: usize,
    },
}

/// Iterator over the records in a buffer read from a DRM file descriptor.
///
/// Yields one error and then stops if a record is malformed.
#[derive(Clone)]
pub struct Events<'a> {
    buf: &'a [u8],
}

impl fmt::Debug for Events<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("remaining", &self.buf.len())
            .finish()
    }
}

/// Decodes the records in `buf`.
#[must_use]
pub fn decode(buf: &[u8]) -> Events<'_> {
    Events { buf }
}

impl Iterator for Events<'_> {
    type Item = Result<DrmEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        let result = next_record(self.buf);
        self.buf = match &result {
            Ok((_, length)) => &self.buf[*length..],
            Err(_) => &[],
        };
        Some(result.map(|(event, _)| event))
    }
}

fn next_record(buf: &[u8]) -> Result<(DrmEvent, usize), DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: HEADER_LEN,
            available: buf.len(),
        });
    }
    let kind = u32::from_ne_bytes(field(buf, 0));
    let length = usize::try_from(u32::from_ne_bytes(field(buf, 4))).unwrap_or(usize::MAX);
    if length < HEADER_LEN {
        return Err(DecodeError::BadLength { kind, length });
    }
    if buf.len() < length {
        return Err(DecodeError::Truncated {
            needed: length,
            available: buf.len(),
        });
    }

    let record = &buf[..length];
    let event = match kind {
        EVENT_VBLANK | EVENT_FLIP_COMPLETE => {
            if length < VBLANK_EVENT_LEN {
                return Err(DecodeError::BadLength { kind, length });
            }
            let body = FlipEvent::parse(record);
            if kind == EVENT_VBLANK {
                DrmEvent::Vblank(body)
            } else {
                DrmEvent::FlipComplete(body)
            }
        }
        EVENT_CRTC_SEQUENCE => DrmEvent::CrtcSequence,
        kind => DrmEvent::Other { kind },
    };
    Ok((event, length))
}

fn field<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0_u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}
