//! # Sigma Parameters
//!
//! Normalized filter-strength controls mapped into the driver's native
//! value range. The stored driver value is a single atomic scalar: the
//! control path overwrites it, the render path samples it when filling the
//! next parameter buffer. There is deliberately no lock and no ordering
//! guarantee beyond atomicity; a value changed mid-frame applies to
//! whichever parameter-buffer fill happens after the store.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::vaproc::ValueRange;

/// A closed, non-degenerate float interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Affine map of `value` from this range into `out`. A degenerate
    /// input range fails closed to `out.min` instead of dividing by zero.
    pub fn map_to(&self, value: f32, out: Range) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return out.min;
        }
        (value - self.min) * (out.max - out.min) / span + out.min
    }
}

impl From<ValueRange> for Range {
    fn from(range: ValueRange) -> Self {
        Self { min: range.min, max: range.max }
    }
}

/// An `f32` stored as its bit pattern in an `AtomicU32`, so concurrent
/// store/load can never observe a torn value.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// One filter-strength control: the externally visible normalized range,
/// an optional perceptual adaptation range, the driver-reported native
/// range, and the current driver value.
///
/// The adaptation range narrows the usable normalized sub-range before the
/// affine mapping so the result matches the reference software filter's
/// perceptual scale (contrast and saturation use it, the rest pass
/// through).
#[derive(Debug)]
pub struct SigmaParameter {
    control_range: Range,
    adapt_range: Option<Range>,
    drv_range: Range,
    value: AtomicF32,
}

impl SigmaParameter {
    pub fn new(
        control_range: Range,
        adapt_range: Option<Range>,
        drv_range: Range,
        initial: f32,
    ) -> Self {
        let param = Self {
            control_range,
            adapt_range,
            drv_range,
            value: AtomicF32::new(drv_range.min),
        };
        param.set_normalized(initial);
        param
    }

    /// Clamp, adapt, map and atomically publish a new normalized value.
    /// This is the only write path once a session is open.
    pub fn set_normalized(&self, value: f32) {
        let mut sigma = self.control_range.clamp(value);
        if let Some(adapt) = self.adapt_range {
            sigma = self.control_range.map_to(sigma, adapt);
        }
        let drv = self.control_range.map_to(sigma, self.drv_range);
        self.value.store(drv);
    }

    /// Latest driver-native value. Always within the driver-reported range.
    pub fn driver_value(&self) -> f32 {
        self.value.load()
    }

    pub fn control_range(&self) -> Range {
        self.control_range
    }
}
