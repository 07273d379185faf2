//! Compact, memory-mappable representation of weighted FSTs.
//!
//! A compact FST stores each arc as a small plain-old-data element chosen by
//! a [`Compactor`]. Elements live in one contiguous array, optionally indexed
//! by a per-state offset array, and are unpacked back into arcs on demand.
//! The arrays can be written aligned and later borrowed straight from a
//! memory mapping.
//!
//! # Architecture
//!
//! - [`compactor`] -- The `Compactor` strategy trait and arc field flags
//! - [`compactors`] -- Stock compactors and their packed element types
//! - [`index`] -- Offset array widths (`u32`, `u64`)
//! - [`store`] -- The element and offset arrays, their construction and I/O
//! - [`compact_fst`] -- `CompactFst`: the `Fst` view, file format, direct writes
//! - [`iter`] -- Zero-copy arc iteration with label seeking
//! - [`cache`] -- Byte-bounded per-instance cache of expanded states
//! - [`info`] -- Summary statistics and string extraction

pub mod cache;
pub mod compact_fst;
pub mod compactor;
pub mod compactors;
pub mod index;
pub mod info;
pub mod iter;
pub mod store;

pub use cache::CacheOptions;
pub use compact_fst::CompactFst;
pub use compactor::{ArcFlags, Arity, Compactor};
pub use compactors::{
    AcceptorCompactor, StringCompactor, UnweightedAcceptorCompactor, UnweightedCompactor,
    WeightedStringCompactor,
};
pub use index::CompactIndex;
pub use info::{FstInfo, info, string_labels};
pub use iter::ArcIterator;
pub use store::CompactStore;

use wfst_core::TropicalWeight;

pub type CompactStringFst<W, U = u32> = CompactFst<W, StringCompactor, U>;
pub type CompactWeightedStringFst<W, U = u32> = CompactFst<W, WeightedStringCompactor, U>;
pub type CompactAcceptorFst<W, U = u32> = CompactFst<W, AcceptorCompactor, U>;
pub type CompactUnweightedFst<W, U = u32> = CompactFst<W, UnweightedCompactor, U>;
pub type CompactUnweightedAcceptorFst<W, U = u32> = CompactFst<W, UnweightedAcceptorCompactor, U>;

/// Compact FSTs over the tropical semiring with 32-bit offsets.
pub type StdCompactStringFst = CompactStringFst<TropicalWeight>;
pub type StdCompactWeightedStringFst = CompactWeightedStringFst<TropicalWeight>;
pub type StdCompactAcceptorFst = CompactAcceptorFst<TropicalWeight>;
pub type StdCompactUnweightedFst = CompactUnweightedFst<TropicalWeight>;
pub type StdCompactUnweightedAcceptorFst = CompactUnweightedAcceptorFst<TropicalWeight>;
