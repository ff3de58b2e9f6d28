// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Scalar types the sort network can order.
//!
//! Each type encodes:
//!
//! - A [`ScalarType`] tag, used to pick kernels and query backend capabilities
//! - Padding sentinels for ascending and descending sorts
//! - Its encoding as a 32-bit GPU word
//!
//! # Available Types
//!
//! | Rust type | [`ScalarType`] | Ascending sentinel | GPU word |
//! |-----------|----------------|--------------------|----------|
//! | `f32`     | `Float`        | `f32::INFINITY`    | `f32`    |
//! | [`f16`]   | `Half`         | `f16::INFINITY`    | `f32`    |
//! | `u32`     | `UInt`         | `u32::MAX`         | `u32`    |
//! | `u16`     | `UShort`       | `u16::MAX`         | `u32`    |
//! | `i32`     | `Int`          | `i32::MAX`         | `i32`    |
//! | `i16`     | `Short`        | `i16::MAX`         | `i32`    |
//!
//! WGSL has no 16-bit storage types, so 16-bit scalars are widened into a 32-bit word of the same
//! signedness.  Widening preserves order, and narrowing it back is exact.
//!
//! # Examples
//!
//! ```
//! use bitonic_sort::scalar::{ScalarType, SortScalar};
//!
//! assert_eq!(<u16 as SortScalar>::SCALAR_TYPE, ScalarType::UShort);
//! assert_eq!(<u16 as SortScalar>::MAXIMUM, u16::MAX);
//! ```

/*
The trait is sealed for the same reason pixel formats are: the GPU backend has to know how to
store the type in a word and how to compare it in WGSL.  A scalar without a defined maximum can't
implement the trait at all, so "no padding sentinel" is a compile error instead of a runtime one.
 */

use crate::scalar::sealed::GpuWord;
use std::fmt::Debug;

pub use half::f16;

/// Sealed traits for scalar type safety.
pub(crate) mod sealed {
    /// Conversion to and from the 32-bit word the GPU backend stores.
    pub trait GpuWord: Copy {
        /// WGSL type of the stored word.
        const WORD: super::GpuScalar;
        fn to_word(self) -> u32;
        fn from_word(word: u32) -> Self;
    }
}

/// The six scalar types kernels are generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Float,
    Half,
    UInt,
    UShort,
    Int,
    Short,
}

impl ScalarType {
    /// Short name, used in kernel labels.
    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::Float => "float",
            ScalarType::Half => "half",
            ScalarType::UInt => "uint",
            ScalarType::UShort => "ushort",
            ScalarType::Int => "int",
            ScalarType::Short => "short",
        }
    }

    /// Size of one element in host memory.
    pub const fn byte_size(self) -> usize {
        match self {
            ScalarType::Float | ScalarType::UInt | ScalarType::Int => 4,
            ScalarType::Half | ScalarType::UShort | ScalarType::Short => 2,
        }
    }

    /// The word this type is stored as on the GPU.
    pub const fn gpu_scalar(self) -> GpuScalar {
        match self {
            ScalarType::Float | ScalarType::Half => GpuScalar::F32,
            ScalarType::UInt | ScalarType::UShort => GpuScalar::U32,
            ScalarType::Int | ScalarType::Short => GpuScalar::I32,
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A 32-bit WGSL scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuScalar {
    F32,
    U32,
    I32,
}

impl GpuScalar {
    pub const fn wgsl_name(self) -> &'static str {
        match self {
            GpuScalar::F32 => "f32",
            GpuScalar::U32 => "u32",
            GpuScalar::I32 => "i32",
        }
    }
}

/// A scalar that can be sorted by the bitonic network.
///
/// This trait is sealed; it is implemented for `f32`, [`f16`], `u32`, `u16`, `i32` and `i16`.
///
/// Floats are compared with `>`/`<` on every backend, matching what the GPU does.  `NaN` is never
/// out of order with anything, so sorting data that contains `NaN` produces an unspecified
/// permutation.
pub trait SortScalar:
    GpuWord + PartialOrd + Debug + Send + Sync + 'static
{
    const SCALAR_TYPE: ScalarType;
    /// Sentinel for ascending sorts.  No real value sorts after it.
    const MAXIMUM: Self;
    /// Sentinel for descending sorts.  No real value sorts before it.
    const LOWEST: Self;
}

impl GpuWord for f32 {
    const WORD: GpuScalar = GpuScalar::F32;
    fn to_word(self) -> u32 {
        self.to_bits()
    }
    fn from_word(word: u32) -> Self {
        f32::from_bits(word)
    }
}
impl SortScalar for f32 {
    const SCALAR_TYPE: ScalarType = ScalarType::Float;
    const MAXIMUM: Self = f32::INFINITY;
    const LOWEST: Self = f32::NEG_INFINITY;
}

impl GpuWord for f16 {
    const WORD: GpuScalar = GpuScalar::F32;
    fn to_word(self) -> u32 {
        self.to_f32().to_bits()
    }
    fn from_word(word: u32) -> Self {
        f16::from_f32(f32::from_bits(word))
    }
}
impl SortScalar for f16 {
    const SCALAR_TYPE: ScalarType = ScalarType::Half;
    const MAXIMUM: Self = f16::INFINITY;
    const LOWEST: Self = f16::NEG_INFINITY;
}

impl GpuWord for u32 {
    const WORD: GpuScalar = GpuScalar::U32;
    fn to_word(self) -> u32 {
        self
    }
    fn from_word(word: u32) -> Self {
        word
    }
}
impl SortScalar for u32 {
    const SCALAR_TYPE: ScalarType = ScalarType::UInt;
    const MAXIMUM: Self = u32::MAX;
    const LOWEST: Self = u32::MIN;
}

impl GpuWord for u16 {
    const WORD: GpuScalar = GpuScalar::U32;
    fn to_word(self) -> u32 {
        self as u32
    }
    fn from_word(word: u32) -> Self {
        word as u16
    }
}
impl SortScalar for u16 {
    const SCALAR_TYPE: ScalarType = ScalarType::UShort;
    const MAXIMUM: Self = u16::MAX;
    const LOWEST: Self = u16::MIN;
}

impl GpuWord for i32 {
    const WORD: GpuScalar = GpuScalar::I32;
    fn to_word(self) -> u32 {
        self as u32
    }
    fn from_word(word: u32) -> Self {
        word as i32
    }
}
impl SortScalar for i32 {
    const SCALAR_TYPE: ScalarType = ScalarType::Int;
    const MAXIMUM: Self = i32::MAX;
    const LOWEST: Self = i32::MIN;
}

impl GpuWord for i16 {
    const WORD: GpuScalar = GpuScalar::I32;
    fn to_word(self) -> u32 {
        self as i32 as u32
    }
    fn from_word(word: u32) -> Self {
        word as i32 as i16
    }
}
impl SortScalar for i16 {
    const SCALAR_TYPE: ScalarType = ScalarType::Short;
    const MAXIMUM: Self = i16::MAX;
    const LOWEST: Self = i16::MIN;
}
