//! Beam-search demo over a toy Markov model.
//!
//! Run with: cargo run --example beam_demo

use anyhow::Result;
use arbor::prelude::*;
use candle_core::{Device, Tensor};

const VOCAB: usize = 8;
const EOS: u32 = 7;

/// Tiny hand-written transition table standing in for a real model.
///
/// Each row lists `(next_token, logit)` pairs for a last token; everything
/// else has probability zero.
struct MarkovDecoder {
    transitions: Vec<Vec<(u32, f32)>>,
}

impl MarkovDecoder {
    fn new() -> Self {
        Self {
            transitions: vec![
                /* 0 */ vec![(1, 0.0), (2, -0.4)],
                /* 1 */ vec![(2, 0.0), (3, -0.2), (EOS, -2.5)],
                /* 2 */ vec![(3, 0.0), (4, -0.7)],
                /* 3 */ vec![(4, 0.0), (EOS, -0.3)],
                /* 4 */ vec![(5, 0.0), (EOS, -0.1)],
                /* 5 */ vec![(6, 0.0), (EOS, -0.5)],
                /* 6 */ vec![(EOS, 0.0)],
                /* 7 */ vec![(EOS, 0.0)],
            ],
        }
    }
}

impl Decoder for MarkovDecoder {
    type Cache = ();

    fn decode(
        &mut self,
        input: &DecodeInput,
        _cache: Option<()>,
    ) -> arbor::Result<DecodeOutput<()>> {
        let ids = input.token_ids.to_vec2::<u32>()?;
        let mut flat = Vec::with_capacity(ids.len() * VOCAB);
        for row in &ids {
            let last = *row.last().unwrap() as usize;
            let mut logits = vec![f32::NEG_INFINITY; VOCAB];
            for &(next, logit) in &self.transitions[last] {
                logits[next as usize] = logit;
            }
            flat.extend(logits);
        }
        Ok(DecodeOutput {
            logits: Tensor::from_vec(flat, (ids.len(), VOCAB), &Device::Cpu)?,
            cache: None,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut generator = Generator::builder()
        .eos_token(EOS)
        .beam_width(3)
        .max_length(12)
        .stop_condition(StopCondition::EstimatedScore)
        .build()?;

    let prompts = vec![vec![0], vec![2]];
    let results = generator.generate(&mut MarkovDecoder::new(), prompts)?;

    for (i, sequences) in results.iter().enumerate() {
        println!("prompt {i}:");
        for sequence in sequences {
            println!(
                "  {:?}  mean log-prob {:.3}",
                sequence.tokens,
                sequence.mean_log_prob()
            );
        }
    }
    Ok(())
}
