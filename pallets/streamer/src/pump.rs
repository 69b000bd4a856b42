//! Pump decision, sizing and allocation.
//!
//! Execution against sales and the router lives in the pallet; everything here
//! is pure so a block's pump can be replayed from its entropy alone.

use alloc::vec::Vec;
use sp_arithmetic::{Rounding, helpers_128bit::multiply_by_rational_with_rounding};

use crate::{
  random,
  types::{Balance, PumpDistr, PumpParams, PumpPressure, StreamId},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PumpError {
  /// The epoch is shorter than one block.
  ZeroTicks,
  /// More pumps requested than there are blocks in the epoch.
  TooManyPumps,
}

/// Domain separation for the two draws a stream makes per block.
#[derive(Clone, Copy)]
enum Draw {
  Decide = 0,
  Size = 1,
}

fn offset(stream_id: StreamId, draw: Draw) -> u64 {
  (stream_id << 1) | draw as u64
}

/// Number of blocks expected in an epoch of `epoch_secs` seconds.
pub fn ticks_per_epoch(epoch_secs: u64, block_time_ms: u64) -> u64 {
  if block_time_ms == 0 {
    return 0;
  }
  epoch_secs.saturating_mul(1_000) / block_time_ms
}

/// Whether `stream_id` pumps in this block: true with probability
/// `num_pumps / ticks`.
pub fn should_pump(
  entropy: &[u8; 32],
  stream_id: StreamId,
  num_pumps: u64,
  ticks: u64,
) -> Result<bool, PumpError> {
  if num_pumps == 0 {
    return Ok(false);
  }
  if ticks == 0 {
    return Err(PumpError::ZeroTicks);
  }
  if num_pumps > ticks {
    return Err(PumpError::TooManyPumps);
  }
  let r = random::uniform(entropy, offset(stream_id, Draw::Decide), u128::from(ticks))
    .ok_or(PumpError::ZeroTicks)?;
  Ok(r < u128::from(num_pumps))
}

/// Size of one pump, averaging `epoch_budget / num_pumps` and clamped to the
/// budget left in the epoch.
pub fn pump_amount(entropy: &[u8; 32], stream_id: StreamId, params: &PumpParams) -> Balance {
  let num_pumps = params.num_pumps;
  if num_pumps == 0 || params.epoch_budget < Balance::from(num_pumps) {
    return 0;
  }
  let offset = offset(stream_id, Draw::Size);
  let draw = match params.pump_distr {
    PumpDistr::Uniform => {
      let modulus = multiply_by_rational_with_rounding(
        params.epoch_budget,
        2,
        Balance::from(num_pumps),
        Rounding::Down,
      )
      .unwrap_or(Balance::MAX);
      random::uniform(entropy, offset, modulus).unwrap_or(0)
    }
    PumpDistr::Exponential => random::exponential(entropy, offset, params.epoch_budget, num_pumps),
  };
  draw.min(params.epoch_budget_left)
}

/// Keeps the `top_n` heaviest `(target, weight)` candidates, heaviest first.
/// Equal weights are ordered by ascending target id.
pub fn top_targets(mut candidates: Vec<(u64, u128)>, top_n: u32) -> Vec<(u64, u128)> {
  candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
  candidates.truncate(top_n as usize);
  candidates
}

/// Splits `amount` across `ranked` proportionally to weight, normalizing over
/// `ranked` only. Shares are floored and zero shares are dropped.
pub fn allocate(ranked: &[(u64, u128)], amount: Balance) -> Vec<PumpPressure> {
  let total = ranked
    .iter()
    .fold(0u128, |acc, (_, weight)| acc.saturating_add(*weight));
  if total == 0 {
    return Vec::new();
  }
  ranked
    .iter()
    .filter_map(|(target_id, weight)| {
      let pressure =
        multiply_by_rational_with_rounding(*weight, amount, total, Rounding::Down).unwrap_or(0);
      (pressure > 0).then_some(PumpPressure {
        target_id: *target_id,
        pressure,
      })
    })
    .collect()
}
