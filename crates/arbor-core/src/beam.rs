//! Beam entity: one candidate sequence tracked during search.

use crate::error::{ArborError, Result};

/// Why a beam left the alive set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop rule matched (natural completion).
    Done,
    /// The length cap was reached before completion.
    Length,
}

/// A single candidate sequence with its score-relevant state.
///
/// A beam owns its full token history plus the per-token log-probability
/// contributions of every token the engine appended. Tokens belonging to the
/// seed prefix carry no log-probabilities; scoring only considers decoded
/// tokens.
///
/// Cloning a beam deep-copies the token and log-prob history. The cache slot
/// is inherited on purpose: a freshly cloned child's cache content is its
/// parent's row until the next reorder.
#[derive(Debug, Clone)]
pub struct Beam {
    /// Full token history, seed prefix first. Never empty.
    token_ids: Vec<u32>,
    /// Log-probability of each decoded token, in append order.
    log_probs: Vec<f32>,
    /// Length of the seed prefix supplied at creation.
    initial_length: usize,
    /// Slot in the external incremental cache, if one was assigned.
    cache_slot: Option<usize>,
    /// Set once, when the beam leaves the alive set.
    stop_reason: Option<StopReason>,
}

impl Beam {
    /// Create a beam from a seed token sequence.
    ///
    /// Fails on an empty sequence: a beam must hold at least one token so
    /// the decoder always has an input position.
    pub fn from_tokens(token_ids: Vec<u32>) -> Result<Self> {
        if token_ids.is_empty() {
            return Err(ArborError::InvalidConfig(
                "beam cannot be created from an empty token sequence".into(),
            ));
        }
        let initial_length = token_ids.len();
        Ok(Self {
            token_ids,
            log_probs: Vec::new(),
            initial_length,
            cache_slot: None,
            stop_reason: None,
        })
    }

    /// Create a beam that already carries decoded history.
    ///
    /// `initial_length` marks where the seed prefix ends; `log_probs` must
    /// hold one entry per token past that point.
    pub fn with_history(
        token_ids: Vec<u32>,
        log_probs: Vec<f32>,
        initial_length: usize,
    ) -> Result<Self> {
        if token_ids.is_empty() {
            return Err(ArborError::InvalidConfig(
                "beam cannot be created from an empty token sequence".into(),
            ));
        }
        if initial_length > token_ids.len() {
            return Err(ArborError::InvalidConfig(format!(
                "initial length {} exceeds token count {}",
                initial_length,
                token_ids.len()
            )));
        }
        if log_probs.len() != token_ids.len() - initial_length {
            return Err(ArborError::InvalidConfig(format!(
                "expected {} log-probs for {} decoded tokens, got {}",
                token_ids.len() - initial_length,
                token_ids.len() - initial_length,
                log_probs.len()
            )));
        }
        Ok(Self {
            token_ids,
            log_probs,
            initial_length,
            cache_slot: None,
            stop_reason: None,
        })
    }

    /// Total sequence length, seed included.
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    /// Always false for a constructed beam; present for completeness.
    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Number of tokens generated by the engine (past the seed).
    pub fn decoded_len(&self) -> usize {
        self.token_ids.len() - self.initial_length
    }

    /// Length of the seed prefix.
    pub fn initial_length(&self) -> usize {
        self.initial_length
    }

    /// The most recently appended token.
    pub fn last_token(&self) -> u32 {
        self.token_ids[self.token_ids.len() - 1]
    }

    /// Full token history.
    pub fn token_ids(&self) -> &[u32] {
        &self.token_ids
    }

    /// Tokens generated by the engine, excluding the seed.
    pub fn decoded_tokens(&self) -> &[u32] {
        &self.token_ids[self.initial_length..]
    }

    /// Per-token log-probabilities of the decoded tokens.
    pub fn log_probs(&self) -> &[f32] {
        &self.log_probs
    }

    /// Cumulative log-probability over decoded tokens.
    pub fn total_log_prob(&self) -> f64 {
        self.log_probs.iter().map(|&p| f64::from(p)).sum()
    }

    /// Append one token and its log-probability, mutating in place.
    pub fn push(&mut self, token_id: u32, log_prob: f32) {
        self.token_ids.push(token_id);
        self.log_probs.push(log_prob);
    }

    /// Slot in the external incremental cache, if assigned.
    pub fn cache_slot(&self) -> Option<usize> {
        self.cache_slot
    }

    pub(crate) fn set_cache_slot(&mut self, slot: usize) {
        self.cache_slot = Some(slot);
    }

    /// Why this beam left the alive set, once it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub(crate) fn mark_stopped(&mut self, reason: StopReason) {
        debug_assert!(self.stop_reason.is_none(), "stop reason set twice");
        self.stop_reason = Some(reason);
    }
}
