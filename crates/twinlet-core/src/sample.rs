//! Sample type abstraction for f32/f64 signal processing.
//!
//! Pd renders `t_sample` (f32) blocks while Max renders 64-bit blocks. An
//! external writes one generic `process` and is monomorphized for each host.

use std::ops::{Add, Mul, Sub};

/// Trait for audio sample types (f32, f64).
///
/// Only the operations an inner DSP loop commonly needs are provided.
pub trait Sample:
    Copy
    + Default
    + PartialOrd
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
{
    /// Zero value (0.0).
    const ZERO: Self;

    /// Unit value (1.0).
    const ONE: Self;

    /// Convert from f64 (control values arrive as f64).
    fn from_f64(value: f64) -> Self;

    /// Convert to f64.
    fn to_f64(self) -> f64;

    /// Clamp value between min and max.
    fn clamp(self, min: Self, max: Self) -> Self {
        if self < min {
            min
        } else if self > max {
            max
        } else {
            self
        }
    }
}

impl Sample for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Sample for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self
    }
}

/// Sample precision a host renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 32-bit floating point samples (Pd `t_sample`)
    Float32,
    /// 64-bit floating point samples (Max `perform64`)
    Float64,
}
