//! Sampling strategies: turning a logit row into candidate next tokens.
//!
//! A sampler receives one post-filter logit row per alive beam and proposes
//! up to `width` candidate tokens. The contract is fixed-shape: exactly
//! `width` choices come back, with invalid slots marked by a
//! `f32::NEG_INFINITY` logit rather than omitted. The engine discards
//! invalid choices (probability zero after normalization).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

/// One proposed next token and the logit it was selected at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenChoice {
    /// Proposed token id.
    pub token_id: u32,
    /// Logit of the token in the (filtered) row it was sampled from.
    pub logit: f32,
}

impl TokenChoice {
    /// A padding slot: probability zero, to be discarded by the engine.
    pub fn invalid() -> Self {
        Self {
            token_id: 0,
            logit: f32::NEG_INFINITY,
        }
    }

    /// Whether this choice carries any probability mass.
    pub fn is_valid(&self) -> bool {
        self.logit != f32::NEG_INFINITY
    }
}

/// Trait for token sampling strategies.
pub trait Sampler: Send {
    /// Propose exactly `width` candidate tokens for one logit row.
    fn sample(&mut self, logits: &[f32], width: usize) -> Vec<TokenChoice>;
}

/// Deterministic top-`width` selection by logit.
///
/// With `width == 1` this is plain greedy decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySampler;

impl Sampler for GreedySampler {
    fn sample(&mut self, logits: &[f32], width: usize) -> Vec<TokenChoice> {
        let mut indexed: Vec<TokenChoice> = logits
            .iter()
            .enumerate()
            .map(|(i, &logit)| TokenChoice {
                token_id: i as u32,
                logit,
            })
            .collect();
        indexed.sort_by(|a, b| b.logit.partial_cmp(&a.logit).unwrap_or(Ordering::Equal));
        indexed.truncate(width);
        indexed.resize(width, TokenChoice::invalid());
        indexed
    }
}

/// Stochastic sampling with temperature, top-k and top-p truncation.
///
/// Draws `width` distinct tokens without replacement from the truncated,
/// renormalized distribution. A fixed seed makes runs reproducible.
#[derive(Debug)]
pub struct StochasticSampler {
    temperature: f32,
    top_k: usize,
    top_p: f32,
    rng: StdRng,
}

impl StochasticSampler {
    /// Create a sampler. `top_k == 0` and `top_p >= 1.0` disable the
    /// respective truncation; `temperature <= 0` degenerates to greedy.
    pub fn new(temperature: f32, top_k: usize, top_p: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            temperature,
            top_k,
            top_p,
            rng,
        }
    }
}

impl Sampler for StochasticSampler {
    fn sample(&mut self, logits: &[f32], width: usize) -> Vec<TokenChoice> {
        if self.temperature <= 0.0 {
            return GreedySampler.sample(logits, width);
        }

        // Candidate pool: finite-probability tokens, hottest first.
        let mut pool: Vec<(u32, f32)> = logits
            .iter()
            .enumerate()
            .filter(|(_, &l)| l != f32::NEG_INFINITY)
            .map(|(i, &l)| (i as u32, l))
            .collect();
        pool.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        if self.top_k > 0 {
            pool.truncate(self.top_k);
        }

        // Softmax over the pool at the configured temperature.
        let max_logit = pool.first().map(|&(_, l)| l).unwrap_or(0.0);
        let mut weights: Vec<f32> = pool
            .iter()
            .map(|&(_, l)| ((l - max_logit) / self.temperature).exp())
            .collect();
        let sum: f32 = weights.iter().sum();

        if self.top_p < 1.0 && sum > 0.0 {
            let mut cumulative = 0.0;
            let mut keep = 0;
            for &w in &weights {
                keep += 1;
                cumulative += w / sum;
                if cumulative >= self.top_p {
                    break;
                }
            }
            pool.truncate(keep);
            weights.truncate(keep);
        }

        // Draw without replacement.
        let mut choices = Vec::with_capacity(width);
        let mut total: f32 = weights.iter().sum();
        while choices.len() < width && !pool.is_empty() && total > 0.0 {
            let mut target = self.rng.gen::<f32>() * total;
            let mut picked = pool.len() - 1;
            for (i, &w) in weights.iter().enumerate() {
                if target < w {
                    picked = i;
                    break;
                }
                target -= w;
            }
            let (token_id, logit) = pool.remove(picked);
            total -= weights.remove(picked);
            choices.push(TokenChoice { token_id, logit });
        }
        choices.resize(width, TokenChoice::invalid());
        choices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_returns_top_width_in_order() {
        let logits = [0.1, 2.0, -1.0, 3.5, 1.0];
        let choices = GreedySampler.sample(&logits, 3);

        assert_eq!(choices.len(), 3);
        assert_eq!(choices[0].token_id, 3);
        assert_eq!(choices[1].token_id, 1);
        assert_eq!(choices[2].token_id, 4);
        assert!(choices.iter().all(TokenChoice::is_valid));
    }

    #[test]
    fn greedy_pads_small_vocab_with_invalid() {
        let logits = [1.0, 2.0];
        let choices = GreedySampler.sample(&logits, 4);

        assert_eq!(choices.len(), 4);
        assert!(choices[0].is_valid());
        assert!(choices[1].is_valid());
        assert!(!choices[2].is_valid());
        assert!(!choices[3].is_valid());
    }

    #[test]
    fn greedy_passes_through_masked_logits() {
        // A fully masked vocabulary yields width invalid choices.
        let logits = [f32::NEG_INFINITY; 4];
        let choices = GreedySampler.sample(&logits, 2);
        assert!(choices.iter().all(|c| !c.is_valid()));
    }

    #[test]
    fn stochastic_skips_masked_tokens() {
        let mut sampler = StochasticSampler::new(1.0, 0, 1.0, Some(7));
        let mut logits = vec![f32::NEG_INFINITY; 8];
        logits[3] = 1.0;
        logits[5] = 0.5;

        let choices = sampler.sample(&logits, 4);
        let valid: Vec<u32> = choices
            .iter()
            .filter(|c| c.is_valid())
            .map(|c| c.token_id)
            .collect();

        assert_eq!(valid.len(), 2);
        assert!(valid.contains(&3));
        assert!(valid.contains(&5));
        assert!(!choices[2].is_valid());
        assert!(!choices[3].is_valid());
    }

    #[test]
    fn stochastic_draws_without_replacement() {
        let mut sampler = StochasticSampler::new(1.0, 0, 1.0, Some(42));
        let logits = [1.0, 1.0, 1.0, 1.0];
        let choices = sampler.sample(&logits, 4);

        let mut ids: Vec<u32> = choices.iter().map(|c| c.token_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn stochastic_is_reproducible_with_seed() {
        let logits = [0.2, 1.3, -0.4, 2.2, 0.0];
        let a = StochasticSampler::new(0.8, 3, 0.95, Some(123)).sample(&logits, 2);
        let b = StochasticSampler::new(0.8, 3, 0.95, Some(123)).sample(&logits, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_temperature_is_greedy() {
        let logits = [0.0, 4.0, 2.0];
        let choices = StochasticSampler::new(0.0, 0, 1.0, Some(1)).sample(&logits, 2);
        assert_eq!(choices[0].token_id, 1);
        assert_eq!(choices[1].token_id, 2);
    }

    #[test]
    fn top_k_restricts_the_pool() {
        let mut sampler = StochasticSampler::new(1.0, 2, 1.0, Some(9));
        let logits = [5.0, 4.0, -10.0, -10.0];
        for _ in 0..20 {
            let choices = sampler.sample(&logits, 2);
            for c in choices.iter().filter(|c| c.is_valid()) {
                assert!(c.token_id < 2);
            }
        }
    }
}
