//! Systematic (block) sampling.
//!
//! Participants are numbered by an atomic store counter. Each run of
//! `magnitude * alternatives` consecutive participants forms a block in
//! which every alternative appears exactly `magnitude` times, in an order
//! fixed by `seed + block number`. Any process sharing the seed computes
//! the same block, so no coordination beyond the counter is needed.

use super::no_alternatives;
use crate::experiment::{Alternative, Experiment};
use crate::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::trace;

/// Assign the next participant slot of `experiment`.
///
/// # Errors
///
/// [`Error::Validation`](crate::Error::Validation) without alternatives;
/// store errors.
pub fn choose_alternative(experiment: &Experiment) -> Result<&Alternative> {
    let alternatives = experiment.alternatives();
    if alternatives.is_empty() {
        return Err(no_alternatives(experiment));
    }
    let index = experiment.next_cohorting_block_index()?;
    let slot = slot_for_index(
        alternatives.len(),
        experiment.cohorting_block_magnitude(),
        experiment.cohorting_block_seed(),
        index,
    );
    trace!(experiment = experiment.name(), index, slot, "systematic slot");
    Ok(&alternatives[slot])
}

/// Alternative index assigned to participant number `index`.
///
/// `alternatives` must be non-zero; a zero `magnitude` is treated as 1.
#[must_use]
pub fn slot_for_index(alternatives: usize, magnitude: usize, seed: u64, index: u64) -> usize {
    let block_length = (alternatives * magnitude.max(1)) as u64;
    let block_num = index / block_length;
    let offset = (index % block_length) as usize;
    block(alternatives, magnitude, seed, block_num)[offset]
}

/// The shuffled block `block_num`: alternative indices, each repeated
/// `magnitude` times.
#[must_use]
pub fn block(alternatives: usize, magnitude: usize, seed: u64, block_num: u64) -> Vec<usize> {
    let magnitude = magnitude.max(1);
    let mut block: Vec<usize> = (0..magnitude).flat_map(|_| 0..alternatives).collect();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(block_num));
    block.shuffle(&mut rng);
    block
}
