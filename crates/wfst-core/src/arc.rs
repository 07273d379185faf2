// Transition record.
// Origin: arc.h

use crate::semiring::Semiring;
use crate::{Label, NO_LABEL, NO_STATE, StateId};

/// A transition `(ilabel, olabel, weight, nextstate)`.
///
/// Final weights are represented as *superfinal* arcs with both labels set to
/// [`NO_LABEL`] and `nextstate == NO_STATE`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc<W> {
    pub ilabel: Label,
    pub olabel: Label,
    pub weight: W,
    pub nextstate: StateId,
}

impl<W: Semiring> Arc<W> {
    pub fn new(ilabel: Label, olabel: Label, weight: W, nextstate: StateId) -> Self {
        Self {
            ilabel,
            olabel,
            weight,
            nextstate,
        }
    }

    /// The pseudo-arc carrying a final weight.
    pub fn superfinal(weight: W) -> Self {
        Self::new(NO_LABEL, NO_LABEL, weight, NO_STATE)
    }

    #[inline]
    pub fn is_superfinal(&self) -> bool {
        self.ilabel == NO_LABEL && self.olabel == NO_LABEL && self.nextstate == NO_STATE
    }
}
