//! Streaming snapshots: watch the best outputs improve round by round.
//!
//! Run with: cargo run --example streaming

use anyhow::Result;
use arbor::prelude::*;
use candle_core::{Device, Tensor};

const VOCAB: usize = 16;
const EOS: u32 = 15;

/// Counts upward from the last token, with EOS slowly gaining mass.
struct RampDecoder;

impl Decoder for RampDecoder {
    type Cache = ();

    fn decode(
        &mut self,
        input: &DecodeInput,
        _cache: Option<()>,
    ) -> arbor::Result<DecodeOutput<()>> {
        let ids = input.token_ids.to_vec2::<u32>()?;
        let mut flat = Vec::with_capacity(ids.len() * VOCAB);
        for row in &ids {
            let last = *row.last().unwrap();
            for t in 0..VOCAB as u32 {
                let logit = if t == last + 1 {
                    0.0
                } else if t == EOS {
                    -4.0 + last as f32 * 0.5
                } else {
                    f32::NEG_INFINITY
                };
                flat.push(logit);
            }
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
        .beam_width(2)
        .max_length(12)
        .return_unfinished(true)
        .build()?;

    let mut round = 0;
    let results = generator.generate_streaming(&mut RampDecoder, vec![vec![3]], |snapshot| {
        round += 1;
        let best = snapshot[0].first().map(|s| s.tokens.clone());
        println!("round {round}: best so far {best:?}");
    })?;

    println!("final: {:?}", results[0][0].tokens);
    Ok(())
}
