//! # Arbor Core
//!
//! Batched beam-search decoding for autoregressive sequence generation.
//!
//! This crate provides:
//! - **Beam bookkeeping** with alive / finished / too-long lifecycle per
//!   batch element
//! - **Round-loop engine** with three selectable early-termination policies
//! - **Cache-slot coordination** keeping an external incremental cache
//!   aligned with a beam set that is reordered and pruned every round
//! - **Pluggable strategies** for stopping, scoring, sampling, logit
//!   processing and candidate vetting
//!
//! The model itself stays external: the engine drives a [`decode::Decoder`]
//! through one batched forward call per round and never touches weights,
//! devices or tokenization.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod beam;
pub mod decode;
pub mod error;
pub mod logits;
pub mod sample;
pub mod score;
pub mod search;
pub mod stop;

pub use error::{ArborError, Result};

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::beam::{Beam, StopReason};
    pub use crate::decode::{DecodeInput, DecodeOutput, Decoder};
    pub use crate::error::{ArborError, Result};
    pub use crate::logits::LogitsProcessor;
    pub use crate::sample::{GreedySampler, Sampler, StochasticSampler, TokenChoice};
    pub use crate::score::{LengthPenaltyScorer, LogLikelihoodScorer, Scorer};
    pub use crate::search::{
        BeamSearch, BeamSearchBuilder, BeamSearchConfig, Seed, StopCondition, UpdateHook,
    };
    pub use crate::stop::{EosStop, StopRule, StopSequences};
}
