// Unsigned index widths for the state offset array.
// Origin: compact-fst.h:121-124 (Unsigned parameter)

use std::fmt::Debug;

use bytemuck::Pod;

/// An unsigned integer type used to address the element array.
pub trait CompactIndex: Pod + Debug + Eq + Ord + Send + Sync {
    /// Width in bits, recorded in the FST type string when not 32.
    const BITS: u32;

    /// Converts an offset, or `None` when it does not fit.
    fn from_usize(n: usize) -> Option<Self>;

    fn to_usize(self) -> usize;
}

impl CompactIndex for u32 {
    const BITS: u32 = 32;

    #[inline]
    fn from_usize(n: usize) -> Option<Self> {
        u32::try_from(n).ok()
    }

    #[inline]
    fn to_usize(self) -> usize {
        self as usize
    }
}

impl CompactIndex for u64 {
    const BITS: u32 = 64;

    #[inline]
    fn from_usize(n: usize) -> Option<Self> {
        Some(n as u64)
    }

    #[inline]
    fn to_usize(self) -> usize {
        self as usize
    }
}
