//! Shared building blocks for weighted finite-state transducers.
//!
//! This crate holds the vocabulary every FST representation in the workspace
//! speaks: state and label identifiers, semiring weights, arcs, property bits,
//! symbol tables, the [`Fst`] inspection trait, and the binary I/O primitives
//! used by on-disk formats.
//!
//! # Architecture
//!
//! - [`semiring`] -- Weight algebras (`TropicalWeight`, `LogWeight`)
//! - [`arc`] -- The `(ilabel, olabel, weight, nextstate)` transition record
//! - [`properties`] -- Property bits and their computation from an FST
//! - [`symbols`] -- Label-to-string tables and their binary format
//! - [`fst`] -- The inspection trait shared by all FST types
//! - [`vector`] -- A mutable, heap-allocated FST used as a construction source
//! - [`config`] -- Explicit weight text formatting options
//! - [`io`] -- Position-tracking readers/writers, aligned I/O, borrowed regions
//! - [`header`] -- The framed FST file header

pub mod arc;
pub mod config;
pub mod fst;
pub mod header;
pub mod io;
pub mod properties;
pub mod semiring;
pub mod symbols;
pub mod vector;

pub use arc::Arc;
pub use config::WeightConfig;
pub use fst::Fst;
pub use semiring::{LogWeight, Semiring, TropicalWeight};
pub use symbols::SymbolTable;
pub use vector::VectorFst;

/// State identifier. States of an FST are numbered `0..num_states`.
pub type StateId = i32;

/// Arc label. Zero is epsilon, [`NO_LABEL`] marks superfinal arcs.
pub type Label = i32;

/// Sentinel for "no state" (empty machines, superfinal arcs).
pub const NO_STATE: StateId = -1;

/// Sentinel for "no label", used to encode final weights as pseudo-arcs.
pub const NO_LABEL: Label = -1;

/// The epsilon label.
pub const EPSILON: Label = 0;

/// Error type for FST construction, validation and serialization.
#[derive(Debug, thiserror::Error)]
pub enum FstError {
    #[error("compactor incompatible with FST: {0}")]
    IncompatibleCompactor(String),
    #[error("ill-formed input container: {0}")]
    IllFormedInput(String),
    #[error("alignment failed: {0}")]
    Alignment(String),
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    #[error("short write")]
    ShortWrite,
    #[error("bad header: {0}")]
    BadHeader(String),
    #[error("source FST is in an error state")]
    PropagatedError,
    #[error("invalid symbol table: {0}")]
    InvalidSymbolTable(String),
    #[error("invalid weight: {0}")]
    InvalidWeight(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
