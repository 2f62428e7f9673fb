//! Decoder contract and model-input assembly.
//!
//! The engine never runs a model itself; it hands a [`Decoder`] one batched
//! input per round and gets back next-token logits plus an opaque cache
//! handle. Two input forms exist:
//!
//! - **incremental**: one token per beam, valid only when the decoder's
//!   cache has been reordered to match the current beam ordering;
//! - **full-context**: the whole token history per beam, left-padded to the
//!   round's longest sequence.

use crate::beam::Beam;
use crate::error::{ArborError, Result};
use candle_core::{Device, Tensor};

/// Batched model input for one decode round.
///
/// `token_ids` and `positions` are `U32`; `mask` is `U8` with 1 marking a
/// real (non-pad) position. In the incremental form `token_ids` and
/// `positions` are `[batch, 1]` while `mask` spans the full cached length.
#[derive(Debug, Clone)]
pub struct DecodeInput {
    /// Token ids to feed, `[batch, steps]`.
    pub token_ids: Tensor,
    /// Position index of each fed token, `[batch, steps]`.
    pub positions: Tensor,
    /// Validity mask over the attended length, `[batch, len]`.
    pub mask: Tensor,
}

/// Decoder output for one round.
#[derive(Debug)]
pub struct DecodeOutput<C> {
    /// Next-token logits, `[batch, vocab]`.
    pub logits: Tensor,
    /// Updated cache handle; `None` if the decoder keeps no cache.
    pub cache: Option<C>,
}

/// External inference collaborator.
///
/// Implementations must accept the incremental single-token form whenever a
/// cache handle is passed back in, and the full-context padded form
/// otherwise.
pub trait Decoder {
    /// Opaque incremental-inference cache handle.
    type Cache;

    /// Run one forward step over the flattened round batch.
    fn decode(
        &mut self,
        input: &DecodeInput,
        cache: Option<Self::Cache>,
    ) -> Result<DecodeOutput<Self::Cache>>;

    /// Reorder/compact the cache so that slot `i` holds the history of the
    /// beam that previously lived in `slots[i]`, with `lengths[i]` cached
    /// positions.
    ///
    /// The default fails: a decoder that returns cache handles without
    /// implementing reordering is a missing collaborator, surfaced the
    /// moment the incremental path engages.
    fn reorder_cache(
        &mut self,
        _cache: Self::Cache,
        _slots: &[usize],
        _lengths: &[usize],
    ) -> Result<Self::Cache> {
        Err(ArborError::CacheReorder(
            "decoder returned a cache handle but does not implement reorder_cache".into(),
        ))
    }
}

impl DecodeInput {
    /// Build the full-context form: histories left-padded with
    /// `pad_token_id`, mask and positions derived from the padded ids.
    pub fn full_context(beams: &[Beam], pad_token_id: u32, device: &Device) -> Result<Self> {
        let batch = beams.len();
        let max_len = beams.iter().map(Beam::len).max().unwrap_or(0);

        let mut ids = Vec::with_capacity(batch * max_len);
        let mut positions = Vec::with_capacity(batch * max_len);
        let mut mask = Vec::with_capacity(batch * max_len);

        for beam in beams {
            let pad = max_len - beam.len();
            ids.extend(std::iter::repeat(pad_token_id).take(pad));
            ids.extend_from_slice(beam.token_ids());

            let row = &ids[ids.len() - max_len..];
            let mut running = 0u32;
            for &id in row {
                if id != pad_token_id {
                    mask.push(1u8);
                    positions.push(running);
                    running += 1;
                } else {
                    mask.push(0u8);
                    positions.push(0);
                }
            }
        }

        Ok(Self {
            token_ids: Tensor::from_vec(ids, (batch, max_len), device)?,
            positions: Tensor::from_vec(positions, (batch, max_len), device)?,
            mask: Tensor::from_vec(mask, (batch, max_len), device)?,
        })
    }

    /// Build the incremental form: last token and its position per beam,
    /// mask spanning the cached length of the longest beam.
    pub fn incremental(beams: &[Beam], device: &Device) -> Result<Self> {
        let batch = beams.len();
        let max_len = beams.iter().map(Beam::len).max().unwrap_or(0);

        let ids: Vec<u32> = beams.iter().map(Beam::last_token).collect();
        let positions: Vec<u32> = beams.iter().map(|b| (b.len() - 1) as u32).collect();

        let mut mask = Vec::with_capacity(batch * max_len);
        for beam in beams {
            mask.extend(std::iter::repeat(0u8).take(max_len - beam.len()));
            mask.extend(std::iter::repeat(1u8).take(beam.len()));
        }

        Ok(Self {
            token_ids: Tensor::from_vec(ids, (batch, 1), device)?,
            positions: Tensor::from_vec(positions, (batch, 1), device)?,
            mask: Tensor::from_vec(mask, (batch, max_len), device)?,
        })
    }
}

/// Check that a logits tensor is `[expected_rows, vocab]` with a non-empty
/// vocabulary.
pub(crate) fn check_logits_shape(logits: &Tensor, expected_rows: usize) -> Result<usize> {
    let (rows, vocab) = logits.dims2()?;
    if rows != expected_rows || vocab == 0 {
        return Err(ArborError::ShapeMismatch(format!(
            "expected logits [{expected_rows}, vocab > 0], got {:?}",
            logits.dims()
        )));
    }
    Ok(vocab)
}
