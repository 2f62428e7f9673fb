//! Engine configuration and fail-fast validation.

use crate::error::{ArborError, Result};
use serde::{Deserialize, Serialize};

/// Policy deciding when a batch element's search may end before all of its
/// beams individually complete.
///
/// All three only apply once at least `beam_width` finished beams exist for
/// the element; before that the search always continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCondition {
    /// Abandon remaining alive beams only when even a beam whose every
    /// remaining token were predicted with probability 1.0 could not beat
    /// the worst kept finished beam. Most conservative.
    MaxScore,
    /// Abandon remaining alive beams when the best alive beam, scored at
    /// its current length, cannot beat the worst kept finished beam.
    ///
    /// Deliberately compares without length projection, unlike
    /// [`StopCondition::MaxScore`]; the asymmetry is part of the contract.
    EstimatedScore,
    /// Abandon remaining alive beams immediately. Cheapest, least accurate.
    MaxOutputs,
}

impl Default for StopCondition {
    fn default() -> Self {
        StopCondition::EstimatedScore
    }
}

/// Configuration for one beam-search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamSearchConfig {
    /// Token id used to left-pad full-context decode inputs.
    pub pad_token_id: u32,
    /// Absolute cap on total sequence length, seed included. Must be > 0.
    pub max_length: usize,
    /// Number of candidates retained per batch element each round. Must
    /// be >= 1.
    pub beam_width: usize,
    /// Early-termination policy.
    pub stop_condition: StopCondition,
    /// Optional tighter cap on generated tokens only. Must be > 0 if set.
    pub max_new_tokens: Option<usize>,
    /// Backfill shortfall in finished beams from the too-long list at
    /// output assembly.
    pub return_unfinished: bool,
}

impl Default for BeamSearchConfig {
    fn default() -> Self {
        Self {
            pad_token_id: 0,
            max_length: 256,
            beam_width: 4,
            stop_condition: StopCondition::default(),
            max_new_tokens: None,
            return_unfinished: false,
        }
    }
}

impl BeamSearchConfig {
    /// Validate the configuration. Called before any decode work; a
    /// violation means no partial work is performed.
    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(ArborError::InvalidConfig("max_length must be > 0".into()));
        }
        if self.beam_width < 1 {
            return Err(ArborError::InvalidConfig("beam_width must be >= 1".into()));
        }
        if self.max_new_tokens == Some(0) {
            return Err(ArborError::InvalidConfig(
                "max_new_tokens must be None or > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(BeamSearchConfig::default().validate().is_ok());
        assert_eq!(
            BeamSearchConfig::default().stop_condition,
            StopCondition::EstimatedScore
        );
    }

    #[test]
    fn zero_max_length_is_rejected() {
        let config = BeamSearchConfig {
            max_length: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_beam_width_is_rejected() {
        let config = BeamSearchConfig {
            beam_width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_new_tokens_is_rejected() {
        let config = BeamSearchConfig {
            max_new_tokens: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_new_tokens_may_be_unset() {
        let config = BeamSearchConfig {
            max_new_tokens: None,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
