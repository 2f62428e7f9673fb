//! High-level generation front-end.

use anyhow::{bail, Result};
use arbor_core::beam::{Beam, StopReason};
use arbor_core::decode::Decoder;
use arbor_core::logits::LogitsProcessor;
use arbor_core::sample::Sampler;
use arbor_core::score::Scorer;
use arbor_core::search::{BeamSearch, BeamSearchConfig, Seed, StopCondition, UpdateHook};
use arbor_core::stop::{EosStop, StopRule};
use candle_core::Device;
use tracing::{debug, info_span};

/// One generated sequence, best-first within its batch element.
#[derive(Debug, Clone)]
pub struct GeneratedSequence {
    /// Full token history, prompt included.
    pub tokens: Vec<u32>,
    /// Generated tokens only.
    pub decoded: Vec<u32>,
    /// Cumulative log-probability over the generated tokens.
    pub log_prob: f64,
    /// How the sequence ended.
    pub reason: StopReason,
}

impl GeneratedSequence {
    fn from_beam(beam: Beam) -> Self {
        let reason = beam.stop_reason().unwrap_or(StopReason::Length);
        Self {
            tokens: beam.token_ids().to_vec(),
            decoded: beam.decoded_tokens().to_vec(),
            log_prob: beam.total_log_prob(),
            reason,
        }
    }

    /// Average log-probability per generated token.
    pub fn mean_log_prob(&self) -> f64 {
        self.log_prob / self.decoded.len().max(1) as f64
    }
}

/// Builder for creating a [`Generator`].
pub struct GeneratorBuilder {
    config: BeamSearchConfig,
    device: Device,
    stop_rule: Option<Box<dyn StopRule>>,
    scorer: Option<Box<dyn Scorer>>,
    sampler: Option<Box<dyn Sampler>>,
    update: Option<Box<dyn UpdateHook>>,
    processors: Vec<Box<dyn LogitsProcessor>>,
}

impl GeneratorBuilder {
    /// Create a new generator builder.
    pub fn new() -> Self {
        Self {
            config: BeamSearchConfig::default(),
            device: Device::Cpu,
            stop_rule: None,
            scorer: None,
            sampler: None,
            update: None,
            processors: Vec::new(),
        }
    }

    /// Stop on this end-of-sequence token.
    pub fn eos_token(mut self, eos_token_id: u32) -> Self {
        self.stop_rule = Some(Box::new(EosStop::new(eos_token_id)));
        self
    }

    /// Use a custom completion predicate instead of an EOS token.
    pub fn stop_rule(mut self, stop_rule: Box<dyn StopRule>) -> Self {
        self.stop_rule = Some(stop_rule);
        self
    }

    /// Number of candidates kept per batch element.
    pub fn beam_width(mut self, beam_width: usize) -> Self {
        self.config.beam_width = beam_width;
        self
    }

    /// Absolute cap on total sequence length.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.config.max_length = max_length;
        self
    }

    /// Cap on generated tokens past the prompt.
    pub fn max_new_tokens(mut self, max_new_tokens: usize) -> Self {
        self.config.max_new_tokens = Some(max_new_tokens);
        self
    }

    /// Token id used to left-pad full-context decode inputs.
    pub fn pad_token(mut self, pad_token_id: u32) -> Self {
        self.config.pad_token_id = pad_token_id;
        self
    }

    /// Early-termination policy.
    pub fn stop_condition(mut self, stop_condition: StopCondition) -> Self {
        self.config.stop_condition = stop_condition;
        self
    }

    /// Backfill short outputs with length-capped sequences.
    pub fn return_unfinished(mut self, return_unfinished: bool) -> Self {
        self.config.return_unfinished = return_unfinished;
        self
    }

    /// Replace the scoring function.
    pub fn scorer(mut self, scorer: Box<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Replace the sampling strategy.
    pub fn sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Replace the candidate update hook.
    pub fn update(mut self, update: Box<dyn UpdateHook>) -> Self {
        self.update = Some(update);
        self
    }

    /// Append a logit processor.
    pub fn logits_processor(mut self, processor: Box<dyn LogitsProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Device decode inputs are assembled on.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Build the generator.
    pub fn build(self) -> Result<Generator> {
        let Some(stop_rule) = self.stop_rule else {
            bail!("a stop rule (or eos_token) is required");
        };

        let mut builder = BeamSearch::builder(self.config)
            .stop_rule(stop_rule)
            .device(self.device);
        if let Some(scorer) = self.scorer {
            builder = builder.scorer(scorer);
        }
        if let Some(sampler) = self.sampler {
            builder = builder.sampler(sampler);
        }
        if let Some(update) = self.update {
            builder = builder.update(update);
        }
        for processor in self.processors {
            builder = builder.logits_processor(processor);
        }

        Ok(Generator {
            search: builder.build()?,
        })
    }
}

impl Default for GeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// High-level batched generation front-end.
///
/// One generator serves any number of sequential `generate` calls; all
/// per-run state lives inside the call.
pub struct Generator {
    search: BeamSearch,
}

impl Generator {
    /// Start building a generator.
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::new()
    }

    /// Generate completions for a batch of prompts.
    ///
    /// Returns one best-first result list per prompt, each at most
    /// `beam_width` long.
    pub fn generate<M: Decoder>(
        &mut self,
        decoder: &mut M,
        prompts: Vec<Vec<u32>>,
    ) -> Result<Vec<Vec<GeneratedSequence>>> {
        let span = info_span!("generate", batch = prompts.len());
        let _guard = span.enter();

        let seeds: Vec<Seed> = prompts.into_iter().map(Seed::from).collect();
        let outputs = self.search.run(decoder, seeds)?;

        debug!(
            results = outputs.iter().map(Vec::len).sum::<usize>(),
            "generation complete"
        );
        Ok(Self::convert(outputs))
    }

    /// Like [`Generator::generate`], invoking `on_round` with the current
    /// best outputs after every decode round.
    pub fn generate_streaming<M, F>(
        &mut self,
        decoder: &mut M,
        prompts: Vec<Vec<u32>>,
        mut on_round: F,
    ) -> Result<Vec<Vec<GeneratedSequence>>>
    where
        M: Decoder,
        F: FnMut(Vec<Vec<GeneratedSequence>>),
    {
        let span = info_span!("generate_streaming", batch = prompts.len());
        let _guard = span.enter();

        let seeds: Vec<Seed> = prompts.into_iter().map(Seed::from).collect();
        let outputs = self
            .search
            .run_streaming(decoder, seeds, |snapshot| on_round(Self::convert(snapshot)))?;
        Ok(Self::convert(outputs))
    }

    /// The engine configuration in effect.
    pub fn config(&self) -> &BeamSearchConfig {
        self.search.config()
    }

    fn convert(outputs: Vec<Vec<Beam>>) -> Vec<Vec<GeneratedSequence>> {
        outputs
            .into_iter()
            .map(|beams| beams.into_iter().map(GeneratedSequence::from_beam).collect())
            .collect()
    }
}
