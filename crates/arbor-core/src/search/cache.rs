//! Cache-slot coordination between beam selection and the decoder.
//!
//! Beam selection discards and reorders candidates every round, so slot `i`
//! of the decoder's incremental cache must be rewritten to hold the history
//! of whichever beam now sits at flattened index `i`. The coordinator owns
//! the opaque cache handle between rounds, requests that reordering when
//! the handle is usable, and invalidates it when expansion has to fall back
//! to full-context re-encoding.

use crate::beam::Beam;
use crate::decode::Decoder;
use crate::error::{ArborError, Result};

/// Slot and length lists for one cache reorder request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    /// For each beam, the slot its history currently occupies.
    pub slots: Vec<usize>,
    /// For each beam, its pre-step decoded length (cached positions).
    pub lengths: Vec<usize>,
}

impl ReorderPlan {
    /// Build the plan for the current beam ordering, or `None` if any beam
    /// has never been through a decode step.
    pub fn for_beams(beams: &[Beam]) -> Option<Self> {
        let mut slots = Vec::with_capacity(beams.len());
        let mut lengths = Vec::with_capacity(beams.len());
        for beam in beams {
            slots.push(beam.cache_slot()?);
            lengths.push(beam.len() - 1);
        }
        Some(Self { slots, lengths })
    }
}

/// Owner of the opaque incremental cache handle across rounds.
#[derive(Debug)]
pub(crate) struct CacheCoordinator<C> {
    cache: Option<C>,
}

impl<C> CacheCoordinator<C> {
    pub fn new() -> Self {
        Self { cache: None }
    }

    /// Whether the incremental path can be used for these beams: a handle
    /// exists and every beam has a slot from a previous round.
    pub fn is_ready(&self, beams: &[Beam]) -> bool {
        self.cache.is_some() && beams.iter().all(|b| b.cache_slot().is_some())
    }

    /// Align the cache with the current beam ordering.
    ///
    /// Returns true when the incremental path is usable this round. When it
    /// is not, any stale handle is dropped so the decoder re-encodes from
    /// the full context.
    pub fn prepare<D>(&mut self, decoder: &mut D, beams: &[Beam]) -> Result<bool>
    where
        D: Decoder<Cache = C>,
    {
        if !self.is_ready(beams) {
            self.invalidate();
            return Ok(false);
        }
        let plan = ReorderPlan::for_beams(beams).ok_or_else(|| {
            ArborError::CacheReorder("beam lost its cache slot between rounds".into())
        })?;
        let cache = self.cache.take().ok_or_else(|| {
            ArborError::CacheReorder("cache handle vanished between rounds".into())
        })?;
        self.cache = Some(decoder.reorder_cache(cache, &plan.slots, &plan.lengths)?);
        Ok(true)
    }

    /// Hand the handle to the decoder for this round's forward step.
    pub fn take(&mut self) -> Option<C> {
        self.cache.take()
    }

    /// Store the handle the decoder returned.
    pub fn store(&mut self, cache: Option<C>) {
        self.cache = cache;
    }

    /// Drop the handle; the next round re-encodes from full context.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}
