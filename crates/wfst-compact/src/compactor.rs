// Compactor contract: how an arc is packed into a fixed-size element and
// recovered from it.
// Origin: compact-fst.h:36-121

use std::fmt::Debug;
use std::io::Write;
use std::ops::{BitAnd, BitOr, Not};

use bytemuck::Pod;
use wfst_core::io::{ByteSource, FstWriter};
use wfst_core::properties::test_properties;
use wfst_core::{Arc, Fst, FstError, Semiring, StateId};

/// Number of packed entries per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Every state owns exactly `k` entries, superfinal entry included.
    Fixed(usize),
    /// States own any number of entries, addressed through an offset array.
    Variable,
}

impl Arity {
    pub const fn fixed(self) -> Option<usize> {
        match self {
            Arity::Fixed(k) => Some(k),
            Arity::Variable => None,
        }
    }

    pub const fn is_variable(self) -> bool {
        matches!(self, Arity::Variable)
    }
}

/// Selects which arc fields an unpack must produce.
///
/// Fields outside the selection are left unspecified (in practice: labels
/// [`NO_LABEL`](wfst_core::NO_LABEL), weight `One`, next state
/// [`NO_STATE`](wfst_core::NO_STATE)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArcFlags(u32);

impl ArcFlags {
    pub const NONE: ArcFlags = ArcFlags(0);
    pub const ILABEL: ArcFlags = ArcFlags(0x01);
    pub const OLABEL: ArcFlags = ArcFlags(0x02);
    pub const WEIGHT: ArcFlags = ArcFlags(0x04);
    pub const NEXTSTATE: ArcFlags = ArcFlags(0x08);
    /// Every arc field.
    pub const VALUE: ArcFlags = ArcFlags(0x0f);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: ArcFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: ArcFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ArcFlags {
    type Output = ArcFlags;

    fn bitor(self, rhs: ArcFlags) -> ArcFlags {
        ArcFlags(self.0 | rhs.0)
    }
}

impl BitAnd for ArcFlags {
    type Output = ArcFlags;

    fn bitand(self, rhs: ArcFlags) -> ArcFlags {
        ArcFlags(self.0 & rhs.0)
    }
}

impl Not for ArcFlags {
    type Output = ArcFlags;

    fn not(self) -> ArcFlags {
        ArcFlags(!self.0 & Self::VALUE.0)
    }
}

/// Strategy for packing the arcs of an FST into plain-old-data elements.
///
/// `pack` and `unpack` are pure: `unpack(s, &pack(s, a), ArcFlags::VALUE)`
/// returns `a` for every arc `a` of an FST this compactor accepts, and
/// superfinal arcs round-trip the same way.
pub trait Compactor<W: Semiring>: Clone + Default + Debug + Send + Sync + 'static {
    /// Packed representation of one arc.
    type Element: Pod + Send + Sync;

    /// Identifier written into the FST type string.
    const TAG: &'static str;

    const ARITY: Arity;

    /// Properties guaranteed by every FST this compactor accepts.
    const PROPERTIES: u64;

    fn pack(&self, s: StateId, arc: &Arc<W>) -> Self::Element;

    fn unpack(&self, s: StateId, element: &Self::Element, flags: ArcFlags) -> Arc<W>;

    fn properties(&self) -> u64 {
        Self::PROPERTIES
    }

    /// Whether `fst` can be packed by this compactor.
    fn is_compatible<F: Fst<W>>(&self, fst: &F) -> bool {
        test_properties(fst, Self::PROPERTIES) == Self::PROPERTIES
    }

    /// First-pass hook of the direct write path: sees every arc (superfinal
    /// arcs included) before the compactor payload is written. Stateless
    /// compactors ignore it.
    fn prepare(&mut self, _s: StateId, _arc: &Arc<W>) {}

    /// Persists compactor state. Stock compactors have none.
    fn write<Wr: Write>(&self, _w: &mut FstWriter<Wr>) -> Result<(), FstError> {
        Ok(())
    }

    fn read<S: ByteSource>(_src: &mut S) -> Result<Self, FstError> {
        Ok(Self::default())
    }
}
