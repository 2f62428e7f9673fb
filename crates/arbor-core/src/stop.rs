//! Stop rules: predicates deciding when a beam is naturally complete.

use crate::beam::Beam;

/// Trait for completion predicates.
///
/// Called once per alive beam per round; implementations must be pure with
/// respect to the beam (no side effects expected).
pub trait StopRule: Send + Sync {
    /// True when the beam is a finished output.
    fn is_finished(&self, beam: &Beam) -> bool;
}

/// Stop when the last token is an end-of-sequence marker.
#[derive(Debug, Clone, Copy)]
pub struct EosStop {
    eos_token_id: u32,
}

impl EosStop {
    /// Create a rule matching the given end-of-sequence token.
    pub fn new(eos_token_id: u32) -> Self {
        Self { eos_token_id }
    }
}

impl StopRule for EosStop {
    fn is_finished(&self, beam: &Beam) -> bool {
        beam.last_token() == self.eos_token_id
    }
}

/// Stop when the decoded tokens end with any of the given sequences.
///
/// Useful for multi-token terminators (chat turn markers, code fences).
/// Only the decoded suffix is matched; the seed prefix never terminates a
/// beam.
#[derive(Debug, Clone)]
pub struct StopSequences {
    sequences: Vec<Vec<u32>>,
}

impl StopSequences {
    /// Create a rule from terminator token sequences. Empty sequences are
    /// ignored.
    pub fn new(sequences: Vec<Vec<u32>>) -> Self {
        Self {
            sequences: sequences.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }
}

impl StopRule for StopSequences {
    fn is_finished(&self, beam: &Beam) -> bool {
        let decoded = beam.decoded_tokens();
        self.sequences.iter().any(|s| decoded.ends_with(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eos_matches_last_token_only() {
        let rule = EosStop::new(9);
        let mut beam = Beam::from_tokens(vec![9]).unwrap();
        // Seed ending in EOS still counts: the predicate sees the last token.
        assert!(rule.is_finished(&beam));

        beam.push(3, -0.5);
        assert!(!rule.is_finished(&beam));

        beam.push(9, -0.1);
        assert!(rule.is_finished(&beam));
    }

    #[test]
    fn stop_sequences_match_decoded_suffix() {
        let rule = StopSequences::new(vec![vec![7, 8], vec![42]]);

        let mut beam = Beam::from_tokens(vec![7, 8]).unwrap();
        // The terminator lives in the seed, not the decoded suffix.
        assert!(!rule.is_finished(&beam));

        beam.push(7, -0.5);
        assert!(!rule.is_finished(&beam));
        beam.push(8, -0.5);
        assert!(rule.is_finished(&beam));
    }

    #[test]
    fn empty_sequences_are_ignored() {
        let rule = StopSequences::new(vec![Vec::new()]);
        let mut beam = Beam::from_tokens(vec![1]).unwrap();
        beam.push(2, -0.1);
        assert!(!rule.is_finished(&beam));
    }
}
