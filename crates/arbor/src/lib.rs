//! # Arbor
//!
//! High-level API for batched beam-search generation.
//!
//! Arbor wraps the `arbor-core` engine behind a builder-style
//! [`Generator`]:
//! - **Beam search** with configurable width, length caps and three
//!   early-termination policies
//! - **Pluggable strategies** for stopping, scoring, sampling and logit
//!   processing
//! - **Streaming snapshots** of the current best outputs after every round
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use arbor::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut generator = Generator::builder()
//!         .eos_token(2)
//!         .beam_width(4)
//!         .max_new_tokens(64)
//!         .build()?;
//!
//!     // `model` implements arbor::Decoder.
//!     let results = generator.generate(&mut model, vec![prompt_tokens])?;
//!     for sequence in &results[0] {
//!         println!("{:?} ({:.3})", sequence.decoded, sequence.mean_log_prob());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Re-export core crate
pub use arbor_core::*;

mod generator;

pub use generator::{GeneratedSequence, Generator, GeneratorBuilder};

/// Commonly used types.
pub mod prelude {
    pub use crate::generator::{GeneratedSequence, Generator, GeneratorBuilder};
    pub use arbor_core::prelude::*;

    // Re-export useful external types
    pub use anyhow;
    pub use candle_core;
    pub use tracing;
}
