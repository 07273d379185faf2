// Stock compactors and their packed element types.
// Origin: compact-fst.h:1215-1445
//
// Elements that embed a weight are `repr(C, packed)` so that no padding can
// exist whatever the weight's size; their `Pod` impls rely on that.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use wfst_core::properties::{ACCEPTOR, STRING, UNWEIGHTED};
use wfst_core::{Arc, Label, NO_LABEL, NO_STATE, Semiring, StateId};

use crate::compactor::{ArcFlags, Arity, Compactor};

/// `(label, weight)`, the element of [`WeightedStringCompactor`].
#[repr(C, packed)]
pub struct WeightedLabel<W> {
    pub label: Label,
    pub weight: W,
}

/// `(label, nextstate)`, the element of [`UnweightedAcceptorCompactor`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct LabelState {
    pub label: Label,
    pub nextstate: StateId,
}

/// `((label, weight), nextstate)`, the element of [`AcceptorCompactor`].
#[repr(C, packed)]
pub struct WeightedLabelState<W> {
    pub label: Label,
    pub weight: W,
    pub nextstate: StateId,
}

/// `((ilabel, olabel), nextstate)`, the element of [`UnweightedCompactor`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct LabelPairState {
    pub ilabel: Label,
    pub olabel: Label,
    pub nextstate: StateId,
}

impl<W: Semiring> Clone for WeightedLabel<W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W: Semiring> Copy for WeightedLabel<W> {}

// SAFETY: packed layout has no padding; both fields are Pod.
unsafe impl<W: Semiring> Zeroable for WeightedLabel<W> {}
unsafe impl<W: Semiring> Pod for WeightedLabel<W> {}

impl<W: Semiring> PartialEq for WeightedLabel<W> {
    fn eq(&self, other: &Self) -> bool {
        let (l1, w1) = (self.label, self.weight);
        let (l2, w2) = (other.label, other.weight);
        l1 == l2 && w1 == w2
    }
}

impl<W: Semiring> fmt::Debug for WeightedLabel<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, weight) = (self.label, self.weight);
        f.debug_struct("WeightedLabel")
            .field("label", &label)
            .field("weight", &weight)
            .finish()
    }
}

impl<W: Semiring> Clone for WeightedLabelState<W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W: Semiring> Copy for WeightedLabelState<W> {}

// SAFETY: packed layout has no padding; every field is Pod.
unsafe impl<W: Semiring> Zeroable for WeightedLabelState<W> {}
unsafe impl<W: Semiring> Pod for WeightedLabelState<W> {}

impl<W: Semiring> PartialEq for WeightedLabelState<W> {
    fn eq(&self, other: &Self) -> bool {
        let (l1, w1, n1) = (self.label, self.weight, self.nextstate);
        let (l2, w2, n2) = (other.label, other.weight, other.nextstate);
        l1 == l2 && w1 == w2 && n1 == n2
    }
}

impl<W: Semiring> fmt::Debug for WeightedLabelState<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, weight, nextstate) = (self.label, self.weight, self.nextstate);
        f.debug_struct("WeightedLabelState")
            .field("label", &label)
            .field("weight", &weight)
            .field("nextstate", &nextstate)
            .finish()
    }
}

/// Next state of a string element: the following state, or none for the
/// terminator.
#[inline]
fn string_next(s: StateId, label: Label) -> StateId {
    if label == NO_LABEL { NO_STATE } else { s + 1 }
}

/// Unweighted string acceptors: one label per state, implicit next state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringCompactor;

impl<W: Semiring> Compactor<W> for StringCompactor {
    type Element = Label;

    const TAG: &'static str = "string";
    const ARITY: Arity = Arity::Fixed(1);
    const PROPERTIES: u64 = STRING | ACCEPTOR | UNWEIGHTED;

    #[inline]
    fn pack(&self, _s: StateId, arc: &Arc<W>) -> Label {
        arc.ilabel
    }

    #[inline]
    fn unpack(&self, s: StateId, label: &Label, _flags: ArcFlags) -> Arc<W> {
        Arc::new(*label, *label, W::one(), string_next(s, *label))
    }
}

/// Weighted string acceptors: one `(label, weight)` per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightedStringCompactor;

impl<W: Semiring> Compactor<W> for WeightedStringCompactor {
    type Element = WeightedLabel<W>;

    const TAG: &'static str = "weighted_string";
    const ARITY: Arity = Arity::Fixed(1);
    const PROPERTIES: u64 = STRING | ACCEPTOR;

    #[inline]
    fn pack(&self, _s: StateId, arc: &Arc<W>) -> WeightedLabel<W> {
        WeightedLabel {
            label: arc.ilabel,
            weight: arc.weight,
        }
    }

    #[inline]
    fn unpack(&self, s: StateId, element: &WeightedLabel<W>, flags: ArcFlags) -> Arc<W> {
        let label = element.label;
        let weight = if flags.contains(ArcFlags::WEIGHT) {
            element.weight
        } else {
            W::one()
        };
        Arc::new(label, label, weight, string_next(s, label))
    }
}

/// Unweighted acceptors with any out-degree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnweightedAcceptorCompactor;

impl<W: Semiring> Compactor<W> for UnweightedAcceptorCompactor {
    type Element = LabelState;

    const TAG: &'static str = "unweighted_acceptor";
    const ARITY: Arity = Arity::Variable;
    const PROPERTIES: u64 = ACCEPTOR | UNWEIGHTED;

    #[inline]
    fn pack(&self, _s: StateId, arc: &Arc<W>) -> LabelState {
        LabelState {
            label: arc.ilabel,
            nextstate: arc.nextstate,
        }
    }

    #[inline]
    fn unpack(&self, _s: StateId, element: &LabelState, _flags: ArcFlags) -> Arc<W> {
        Arc::new(element.label, element.label, W::one(), element.nextstate)
    }
}

/// Weighted acceptors with any out-degree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptorCompactor;

impl<W: Semiring> Compactor<W> for AcceptorCompactor {
    type Element = WeightedLabelState<W>;

    const TAG: &'static str = "acceptor";
    const ARITY: Arity = Arity::Variable;
    const PROPERTIES: u64 = ACCEPTOR;

    #[inline]
    fn pack(&self, _s: StateId, arc: &Arc<W>) -> WeightedLabelState<W> {
        WeightedLabelState {
            label: arc.ilabel,
            weight: arc.weight,
            nextstate: arc.nextstate,
        }
    }

    #[inline]
    fn unpack(&self, _s: StateId, element: &WeightedLabelState<W>, flags: ArcFlags) -> Arc<W> {
        let label = element.label;
        let weight = if flags.contains(ArcFlags::WEIGHT) {
            element.weight
        } else {
            W::one()
        };
        Arc::new(label, label, weight, element.nextstate)
    }
}

/// Unweighted transducers with any out-degree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnweightedCompactor;

impl<W: Semiring> Compactor<W> for UnweightedCompactor {
    type Element = LabelPairState;

    const TAG: &'static str = "unweighted";
    const ARITY: Arity = Arity::Variable;
    const PROPERTIES: u64 = UNWEIGHTED;

    #[inline]
    fn pack(&self, _s: StateId, arc: &Arc<W>) -> LabelPairState {
        LabelPairState {
            ilabel: arc.ilabel,
            olabel: arc.olabel,
            nextstate: arc.nextstate,
        }
    }

    #[inline]
    fn unpack(&self, _s: StateId, element: &LabelPairState, _flags: ArcFlags) -> Arc<W> {
        Arc::new(element.ilabel, element.olabel, W::one(), element.nextstate)
    }
}

const _: () = assert!(size_of::<LabelState>() == 8);
const _: () = assert!(size_of::<LabelPairState>() == 12);
const _: () = assert!(size_of::<WeightedLabel<wfst_core::TropicalWeight>>() == 8);
const _: () = assert!(size_of::<WeightedLabelState<wfst_core::TropicalWeight>>() == 12);
