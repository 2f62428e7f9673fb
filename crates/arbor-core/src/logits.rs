//! Logit processors applied between decoding and sampling.
//!
//! Each processor transforms one beam's logit row in place. Processors run
//! in registration order, before the sampler sees the row. They shape which
//! candidates get proposed; the log-probabilities recorded on beams are
//! taken from the unfiltered model distribution.

use crate::beam::Beam;

/// Trait for logit transformations applied before sampling.
pub trait LogitsProcessor: Send + Sync {
    /// Transform the logit row of `beam` in place. The row has vocabulary
    /// length and contains raw (unnormalized) logits.
    fn process(&self, logits: &mut [f32], beam: &Beam);
}

/// Forbid a fixed set of tokens by forcing their logits to negative
/// infinity.
#[derive(Debug, Clone)]
pub struct BanTokens {
    token_ids: Vec<u32>,
}

impl BanTokens {
    /// Ban the given token ids. Ids outside the vocabulary are ignored.
    pub fn new(token_ids: Vec<u32>) -> Self {
        Self { token_ids }
    }
}

impl LogitsProcessor for BanTokens {
    fn process(&self, logits: &mut [f32], _beam: &Beam) {
        for &id in &self.token_ids {
            if let Some(logit) = logits.get_mut(id as usize) {
                *logit = f32::NEG_INFINITY;
            }
        }
    }
}

/// Repetition penalty (CTRL-style).
///
/// Divides positive logits and multiplies negative logits of every token
/// already decoded by the beam, discouraging repeats. A penalty of 1.0 is a
/// no-op.
#[derive(Debug, Clone, Copy)]
pub struct RepetitionPenalty {
    penalty: f32,
}

impl RepetitionPenalty {
    /// Create a penalty processor. Values above 1.0 discourage repeats.
    pub fn new(penalty: f32) -> Self {
        Self { penalty }
    }
}

impl LogitsProcessor for RepetitionPenalty {
    fn process(&self, logits: &mut [f32], beam: &Beam) {
        if self.penalty == 1.0 {
            return;
        }
        for &token_id in beam.decoded_tokens() {
            if let Some(logit) = logits.get_mut(token_id as usize) {
                if *logit > 0.0 {
                    *logit /= self.penalty;
                } else {
                    *logit *= self.penalty;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beam_with_decoded(tokens: &[u32]) -> Beam {
        let mut beam = Beam::from_tokens(vec![0]).unwrap();
        for &t in tokens {
            beam.push(t, -0.5);
        }
        beam
    }

    #[test]
    fn ban_tokens_forces_neg_infinity() {
        let processor = BanTokens::new(vec![1, 3, 99]);
        let beam = beam_with_decoded(&[]);
        let mut logits = vec![0.5; 4];

        processor.process(&mut logits, &beam);

        assert_eq!(logits[0], 0.5);
        assert_eq!(logits[1], f32::NEG_INFINITY);
        assert_eq!(logits[2], 0.5);
        assert_eq!(logits[3], f32::NEG_INFINITY);
    }

    #[test]
    fn repetition_penalty_targets_decoded_tokens() {
        let processor = RepetitionPenalty::new(2.0);
        let beam = beam_with_decoded(&[1, 2]);
        let mut logits = vec![4.0, 4.0, -4.0, 4.0];

        processor.process(&mut logits, &beam);

        assert_eq!(logits[0], 4.0);
        assert_eq!(logits[1], 2.0);
        assert_eq!(logits[2], -8.0);
        assert_eq!(logits[3], 4.0);
    }

    #[test]
    fn repetition_penalty_ignores_seed_tokens() {
        let processor = RepetitionPenalty::new(2.0);
        let beam = Beam::from_tokens(vec![0, 1]).unwrap();
        let mut logits = vec![4.0, 4.0];

        processor.process(&mut logits, &beam);

        assert_eq!(logits, vec![4.0, 4.0]);
    }

    #[test]
    fn unit_penalty_is_a_no_op() {
        let processor = RepetitionPenalty::new(1.0);
        let beam = beam_with_decoded(&[0]);
        let mut logits = vec![3.0, -3.0];

        processor.process(&mut logits, &beam);

        assert_eq!(logits, vec![3.0, -3.0]);
    }
}
