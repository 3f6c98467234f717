// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composite mode derivation.
//!
//! The mosaic reports itself upstream as a single display whose attributes
//! are derived from its physical outputs:
//!
//! - width is the sum of output widths (tiles sit side by side),
//! - height is the tallest output,
//! - refresh and densities are integer means,
//! - the preferred output is the one with the highest refresh.
//!
//! The derivation is a pure function of the per-output [`OutputMode`]s, so
//! recomputing it for a fixed topology and config always yields the same
//! value.

use crate::output::{DisplayAttribute, OutputMode, UnsupportedAttribute};

/// Aggregate attributes of the whole mosaic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct CompositeMode {
    /// Sum of output widths.
    pub width: u32,
    /// Maximum output height.
    pub height: u32,
    /// Mean refresh attribute.
    pub refresh: i32,
    /// Mean horizontal density.
    pub dpi_x: i32,
    /// Mean vertical density.
    pub dpi_y: i32,
    /// Index of the output with the highest refresh.
    pub preferred_output: usize,
}

impl CompositeMode {
    /// The mode of a mosaic with no outputs: all zero.
    pub const EMPTY: Self = Self {
        width: 0,
        height: 0,
        refresh: 0,
        dpi_x: 0,
        dpi_y: 0,
        preferred_output: 0,
    };

    /// Derives the composite mode from per-output modes, in output order.
    ///
    /// Means use integer division after summing all samples. An empty input
    /// yields [`CompositeMode::EMPTY`].
    #[must_use]
    pub fn from_outputs<I>(modes: I) -> Self
    where
        I: IntoIterator<Item = OutputMode>,
    {
        let mut width = 0_u32;
        let mut height = 0_u32;
        let mut refresh = 0_i64;
        let mut dpi_x = 0_i64;
        let mut dpi_y = 0_i64;
        let mut count = 0_i64;
        let mut preferred = PreferredOutput::default();

        for (index, mode) in modes.into_iter().enumerate() {
            width = width.saturating_add(mode.width);
            height = height.max(mode.height);
            refresh += i64::from(mode.refresh);
            dpi_x += i64::from(mode.dpi_x);
            dpi_y += i64::from(mode.dpi_y);
            preferred.observe(index, mode.refresh);
            count += 1;
        }

        if count == 0 {
            return Self::EMPTY;
        }

        Self {
            width,
            height,
            refresh: mean(refresh, count),
            dpi_x: mean(dpi_x, count),
            dpi_y: mean(dpi_y, count),
            preferred_output: preferred.index,
        }
    }

    /// Returns the value of `attribute` for the mosaic.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedAttribute`] for anything other than width,
    /// height, refresh, and the two densities.
    pub fn attribute(&self, attribute: DisplayAttribute) -> Result<i32, UnsupportedAttribute> {
        match attribute {
            DisplayAttribute::Width => Ok(saturating_i32(self.width)),
            DisplayAttribute::Height => Ok(saturating_i32(self.height)),
            DisplayAttribute::RefreshRate => Ok(self.refresh),
            DisplayAttribute::DpiX => Ok(self.dpi_x),
            DisplayAttribute::DpiY => Ok(self.dpi_y),
            DisplayAttribute::ConfigGroup => Err(UnsupportedAttribute(attribute)),
        }
    }
}

/// Picks the preferred output from `(index, refresh)` pairs.
///
/// The preferred output is the last one whose refresh is strictly greater
/// than every refresh seen before it. Returns `None` when no pair has a
/// positive refresh.
#[must_use]
pub fn preferred_output<I>(refreshes: I) -> Option<usize>
where
    I: IntoIterator<Item = (usize, i32)>,
{
    let mut preferred = PreferredOutput::default();
    let mut found = false;
    for (index, refresh) in refreshes {
        found |= preferred.observe(index, refresh);
    }
    found.then_some(preferred.index)
}

#[derive(Default)]
struct PreferredOutput {
    index: usize,
    max_refresh: i32,
}

impl PreferredOutput {
    fn observe(&mut self, index: usize, refresh: i32) -> bool {
        if refresh > self.max_refresh {
            self.max_refresh = refresh;
            self.index = index;
            true
        } else {
            false
        }
    }
}

fn mean(sum: i64, count: i64) -> i32 {
    i32::try_from(sum / count).unwrap_or(if sum < 0 { i32::MIN } else { i32::MAX })
}

fn saturating_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
