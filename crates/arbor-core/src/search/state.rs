//! Per-batch-element beam bookkeeping for one run.

use crate::beam::Beam;

/// The three mutually exclusive beam lists of one batch element.
///
/// A beam lives in exactly one list at any time, or in none once pruning
/// dropped it. The state exists for the duration of a single run; nothing
/// survives between runs.
#[derive(Debug, Default)]
pub(crate) struct ElementState {
    /// Beams still being expanded.
    pub alive: Vec<Beam>,
    /// Naturally completed beams.
    pub finished: Vec<Beam>,
    /// Beams cut off by the length cap.
    pub too_long: Vec<Beam>,
}

impl ElementState {
    /// Start an element from its seed beam.
    pub fn seeded(beam: Beam) -> Self {
        Self {
            alive: vec![beam],
            finished: Vec::new(),
            too_long: Vec::new(),
        }
    }

    /// Whether this element has no further search work.
    pub fn is_done(&self) -> bool {
        self.alive.is_empty()
    }

    /// Drain every element's alive beams into one flat list plus the
    /// parallel owner-index map used to route children back.
    pub fn flatten(state: &mut [ElementState]) -> (Vec<Beam>, Vec<usize>) {
        let total: usize = state.iter().map(|el| el.alive.len()).sum();
        let mut beams = Vec::with_capacity(total);
        let mut owners = Vec::with_capacity(total);
        for (idx, element) in state.iter_mut().enumerate() {
            for beam in element.alive.drain(..) {
                beams.push(beam);
                owners.push(idx);
            }
        }
        (beams, owners)
    }
}
