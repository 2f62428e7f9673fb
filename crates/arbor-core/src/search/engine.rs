//! The beam-search round loop.

use std::cmp::Ordering;

use candle_core::{DType, Device, D};
use candle_nn::ops::log_softmax;
use tracing::{debug, trace};

use crate::beam::{Beam, StopReason};
use crate::decode::{check_logits_shape, DecodeInput, Decoder};
use crate::error::{ArborError, Result};
use crate::logits::LogitsProcessor;
use crate::sample::{GreedySampler, Sampler, TokenChoice};
use crate::score::{LogLikelihoodScorer, Scorer};
use crate::search::cache::CacheCoordinator;
use crate::search::config::{BeamSearchConfig, StopCondition};
use crate::search::state::ElementState;
use crate::search::{IdentityUpdate, UpdateHook};
use crate::stop::StopRule;

/// Initial state of one batch element: either a raw token sequence or a
/// pre-built beam carrying decoded history.
#[derive(Debug, Clone)]
pub enum Seed {
    /// Seed from a non-empty token sequence.
    Tokens(Vec<u32>),
    /// Seed from an existing beam.
    Beam(Beam),
}

impl From<Vec<u32>> for Seed {
    fn from(tokens: Vec<u32>) -> Self {
        Seed::Tokens(tokens)
    }
}

impl From<Beam> for Seed {
    fn from(beam: Beam) -> Self {
        Seed::Beam(beam)
    }
}

/// Batched beam-search engine.
///
/// Holds the configuration and the pluggable strategies; all per-run state
/// lives on the stack of [`BeamSearch::run`], so one engine can serve any
/// number of sequential runs.
pub struct BeamSearch {
    config: BeamSearchConfig,
    device: Device,
    stop_rule: Box<dyn StopRule>,
    scorer: Box<dyn Scorer>,
    sampler: Box<dyn Sampler>,
    update: Box<dyn UpdateHook>,
    processors: Vec<Box<dyn LogitsProcessor>>,
}

/// Builder for [`BeamSearch`].
///
/// A stop rule is required; everything else defaults to greedy sampling,
/// length-normalized log-likelihood scoring, no logit processors and the
/// identity update hook, on CPU.
pub struct BeamSearchBuilder {
    config: BeamSearchConfig,
    device: Device,
    stop_rule: Option<Box<dyn StopRule>>,
    scorer: Box<dyn Scorer>,
    sampler: Box<dyn Sampler>,
    update: Box<dyn UpdateHook>,
    processors: Vec<Box<dyn LogitsProcessor>>,
}

impl BeamSearchBuilder {
    fn new(config: BeamSearchConfig) -> Self {
        Self {
            config,
            device: Device::Cpu,
            stop_rule: None,
            scorer: Box::new(LogLikelihoodScorer),
            sampler: Box::new(GreedySampler),
            update: Box::new(IdentityUpdate),
            processors: Vec::new(),
        }
    }

    /// Set the completion predicate. Required.
    pub fn stop_rule(mut self, stop_rule: Box<dyn StopRule>) -> Self {
        self.stop_rule = Some(stop_rule);
        self
    }

    /// Replace the scoring function.
    pub fn scorer(mut self, scorer: Box<dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the sampling strategy.
    pub fn sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Replace the candidate update hook.
    pub fn update(mut self, update: Box<dyn UpdateHook>) -> Self {
        self.update = update;
        self
    }

    /// Append a logit processor; processors run in registration order.
    pub fn logits_processor(mut self, processor: Box<dyn LogitsProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Device decode inputs are assembled on.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Validate the configuration and produce the engine.
    pub fn build(self) -> Result<BeamSearch> {
        self.config.validate()?;
        let stop_rule = self
            .stop_rule
            .ok_or_else(|| ArborError::InvalidConfig("a stop rule is required".into()))?;
        Ok(BeamSearch {
            config: self.config,
            device: self.device,
            stop_rule,
            scorer: self.scorer,
            sampler: self.sampler,
            update: self.update,
            processors: self.processors,
        })
    }
}

impl BeamSearch {
    /// Start building an engine from a configuration.
    pub fn builder(config: BeamSearchConfig) -> BeamSearchBuilder {
        BeamSearchBuilder::new(config)
    }

    /// The engine's configuration.
    pub fn config(&self) -> &BeamSearchConfig {
        &self.config
    }

    /// Run one full generation job for the batch.
    ///
    /// Returns one result list per batch element, ranked best first, each
    /// at most `beam_width` long. An element with fewer completions than
    /// requested simply yields a shorter list.
    pub fn run<M: Decoder>(
        &mut self,
        decoder: &mut M,
        seeds: Vec<Seed>,
    ) -> Result<Vec<Vec<Beam>>> {
        self.run_inner(decoder, seeds, None)
    }

    /// Like [`BeamSearch::run`], handing the caller a snapshot of the
    /// current best outputs after every round for progressive consumption.
    pub fn run_streaming<M, F>(
        &mut self,
        decoder: &mut M,
        seeds: Vec<Seed>,
        mut on_round: F,
    ) -> Result<Vec<Vec<Beam>>>
    where
        M: Decoder,
        F: FnMut(Vec<Vec<Beam>>),
    {
        self.run_inner(decoder, seeds, Some(&mut on_round))
    }

    fn run_inner<M: Decoder>(
        &mut self,
        decoder: &mut M,
        seeds: Vec<Seed>,
        mut on_round: Option<&mut dyn FnMut(Vec<Vec<Beam>>)>,
    ) -> Result<Vec<Vec<Beam>>> {
        self.config.validate()?;

        let mut state = Vec::with_capacity(seeds.len());
        for (idx, seed) in seeds.into_iter().enumerate() {
            let beam = match seed {
                Seed::Tokens(tokens) => {
                    if tokens.is_empty() {
                        return Err(ArborError::EmptySeed(idx));
                    }
                    Beam::from_tokens(tokens)?
                }
                Seed::Beam(beam) => {
                    if beam.is_empty() {
                        return Err(ArborError::EmptySeed(idx));
                    }
                    beam
                }
            };
            state.push(ElementState::seeded(beam));
        }

        let batch = state.len();
        let width = self.config.beam_width;
        let single = width == 1;
        let mut coordinator: CacheCoordinator<M::Cache> = CacheCoordinator::new();
        let mut round = 0usize;

        self.filter_elements(&mut state);

        loop {
            let (beams, owners) = ElementState::flatten(&mut state);
            if beams.is_empty() {
                break;
            }
            round += 1;

            let incremental = coordinator.prepare(decoder, &beams)?;
            let input = if incremental {
                DecodeInput::incremental(&beams, &self.device)?
            } else {
                DecodeInput::full_context(&beams, self.config.pad_token_id, &self.device)?
            };
            trace!(round, beams = beams.len(), incremental, "decode round");

            let output = decoder.decode(&input, coordinator.take())?;
            coordinator.store(output.cache);
            let vocab = check_logits_shape(&output.logits, beams.len())?;

            let logits = output.logits.to_dtype(DType::F32)?;
            // Log-prob bookkeeping reads the unfiltered model distribution;
            // processors only shape which candidates get proposed.
            let log_prob_rows = log_softmax(&logits, D::Minus1)?.to_vec2::<f32>()?;
            let mut logit_rows = logits.to_vec2::<f32>()?;

            for (row, beam) in logit_rows.iter_mut().zip(beams.iter()) {
                for processor in &self.processors {
                    processor.process(row, beam);
                }
            }

            let mut candidates: Vec<Vec<Beam>> = (0..batch).map(|_| Vec::new()).collect();
            for (i, mut beam) in beams.into_iter().enumerate() {
                // Children inherit this slot: their cache content is the
                // parent's row until the next reorder.
                beam.set_cache_slot(i);
                let choices = self.sampler.sample(&logit_rows[i], width);
                let owner = owners[i];

                if single {
                    if let Some(choice) = choices.into_iter().find(TokenChoice::is_valid) {
                        let log_prob = Self::log_prob_of(&log_prob_rows[i], choice, vocab)?;
                        beam.push(choice.token_id, log_prob);
                        candidates[owner].push(beam);
                    }
                } else {
                    for choice in choices.into_iter().filter(TokenChoice::is_valid) {
                        let log_prob = Self::log_prob_of(&log_prob_rows[i], choice, vocab)?;
                        let mut child = beam.clone();
                        child.push(choice.token_id, log_prob);
                        candidates[owner].push(child);
                    }
                }
            }

            for (owner, element_candidates) in candidates.into_iter().enumerate() {
                state[owner].alive = self.prune(element_candidates);
            }

            self.filter_elements(&mut state);
            if let Some(observer) = on_round.as_deref_mut() {
                observer(state.iter().map(|el| self.assemble(el)).collect());
            }
        }

        debug!(rounds = round, batch, "beam search finished");
        Ok(state.iter().map(|el| self.assemble(el)).collect())
    }

    fn log_prob_of(log_probs: &[f32], choice: TokenChoice, vocab: usize) -> Result<f32> {
        log_probs
            .get(choice.token_id as usize)
            .copied()
            .ok_or_else(|| {
                ArborError::ShapeMismatch(format!(
                    "sampled token {} outside vocabulary of size {vocab}",
                    choice.token_id
                ))
            })
    }

    /// Score-sort candidates, vet them through the update hook in that
    /// order, and keep the first `beam_width` survivors.
    fn prune(&self, mut candidates: Vec<Beam>) -> Vec<Beam> {
        self.sort_desc(&mut candidates);
        let mut kept = Vec::with_capacity(self.config.beam_width);
        for candidate in candidates {
            if let Some(beam) = self.update.update(candidate) {
                kept.push(beam);
                if kept.len() >= self.config.beam_width {
                    break;
                }
            }
        }
        kept
    }

    /// Classify every alive beam, then decide per element whether further
    /// search can still improve its output.
    fn filter_elements(&self, state: &mut [ElementState]) {
        let width = self.config.beam_width;

        for (idx, element) in state.iter_mut().enumerate() {
            let alive = std::mem::take(&mut element.alive);
            for mut beam in alive {
                if self.stop_rule.is_finished(&beam) {
                    beam.mark_stopped(StopReason::Done);
                    element.finished.push(beam);
                } else if self.too_long(&beam) {
                    beam.mark_stopped(StopReason::Length);
                    element.too_long.push(beam);
                } else {
                    element.alive.push(beam);
                }
            }

            // Never abandon an element before it holds a full set of
            // finished candidates.
            if element.is_done() || element.finished.len() < width {
                continue;
            }

            let abandon = match self.config.stop_condition {
                StopCondition::MaxOutputs => true,
                StopCondition::EstimatedScore => {
                    let worst_finished = self.worst_finished(element);
                    let best_current = element
                        .alive
                        .iter()
                        .map(|b| self.scorer.score(b))
                        .fold(f64::NEG_INFINITY, f64::max);
                    worst_finished >= best_current
                }
                StopCondition::MaxScore => {
                    let worst_finished = self.worst_finished(element);
                    let max_decoded = self
                        .config
                        .max_length
                        .saturating_sub(element.alive[0].initial_length());
                    let horizon = self
                        .config
                        .max_new_tokens
                        .map_or(max_decoded, |m| m.min(max_decoded));
                    let best_possible = element
                        .alive
                        .iter()
                        .map(|b| self.scorer.projected_score(b, horizon))
                        .fold(f64::NEG_INFINITY, f64::max);
                    worst_finished >= best_possible
                }
            };

            if abandon {
                trace!(
                    element = idx,
                    finished = element.finished.len(),
                    abandoned = element.alive.len(),
                    "further search cannot improve element"
                );
                element.alive.clear();
            }
        }
    }

    fn worst_finished(&self, element: &ElementState) -> f64 {
        element
            .finished
            .iter()
            .map(|b| self.scorer.score(b))
            .fold(f64::INFINITY, f64::min)
    }

    fn too_long(&self, beam: &Beam) -> bool {
        if beam.len() >= self.config.max_length {
            return true;
        }
        match self.config.max_new_tokens {
            None => false,
            Some(max_new) => beam.decoded_len() >= max_new,
        }
    }

    /// Rank one element's output: finished beams, optionally backfilled
    /// from the too-long list, best first, at most `beam_width` entries.
    fn assemble(&self, element: &ElementState) -> Vec<Beam> {
        let width = self.config.beam_width;
        let mut outputs = element.finished.clone();

        if self.config.return_unfinished && outputs.len() < width {
            let mut spare = element.too_long.clone();
            self.sort_desc(&mut spare);
            let shortfall = width - outputs.len();
            outputs.extend(spare.into_iter().take(shortfall));
        }

        self.sort_desc(&mut outputs);
        outputs.truncate(width);
        outputs
    }

    fn sort_desc(&self, beams: &mut [Beam]) {
        beams.sort_by(|a, b| {
            self.scorer
                .score(b)
                .partial_cmp(&self.scorer.score(a))
                .unwrap_or(Ordering::Equal)
        });
    }
}
