//! Deterministic samplers seeded from block entropy.
//!
//! Every draw is a pure function of `(entropy, offset)`, so re-executing a
//! block reproduces the same values. Callers pick distinct offsets for
//! independent draws within one block.

use frame::hashing::blake2_256;
use polkadot_sdk::sp_core::U256;
use sp_arithmetic::{Rounding, helpers_128bit::multiply_by_rational_with_rounding};

/// `ln(2)` in Q32 fixed point.
const LN2_Q32: u128 = 2_977_044_472;
const FRAC_BITS: u32 = 32;
const ONE_Q32: u128 = 1 << FRAC_BITS;

fn seed(entropy: &[u8; 32], offset: u64) -> U256 {
  let mut input = [0u8; 40];
  input[..32].copy_from_slice(entropy);
  input[32..].copy_from_slice(&offset.to_le_bytes());
  U256::from_big_endian(&blake2_256(&input))
}

/// Uniform draw in `[0, modulus)`. `None` when `modulus` is zero.
pub fn uniform(entropy: &[u8; 32], offset: u64, modulus: u128) -> Option<u128> {
  if modulus == 0 {
    return None;
  }
  Some((seed(entropy, offset) % U256::from(modulus)).low_u128())
}

/// Exponential draw with mean `numerator / denominator`, by inverse transform
/// of a uniform variable on `(0, 1]`.
///
/// Saturates at `u128::MAX`; returns zero when `denominator` is zero.
pub fn exponential(entropy: &[u8; 32], offset: u64, numerator: u128, denominator: u64) -> u128 {
  if denominator == 0 {
    return 0;
  }
  // u = (r + 1) / 2^64, so -log2(u) = 64 - log2(r + 1)
  let r = u128::from(seed(entropy, offset).low_u64());
  let neg_log2 = (64u128 << FRAC_BITS).saturating_sub(log2_q32(r + 1));
  let neg_ln = neg_log2.saturating_mul(LN2_Q32) >> FRAC_BITS;
  multiply_by_rational_with_rounding(
    numerator,
    neg_ln,
    u128::from(denominator) << FRAC_BITS,
    Rounding::Down,
  )
  .unwrap_or(u128::MAX)
}

/// Binary logarithm of `x >= 1` in Q32 fixed point.
fn log2_q32(x: u128) -> u128 {
  if x == 0 {
    return 0;
  }
  let int_part = 127 - x.leading_zeros();
  // Mantissa in [1, 2) as Q32
  let mut y = if int_part >= FRAC_BITS {
    x >> (int_part - FRAC_BITS)
  } else {
    x << (FRAC_BITS - int_part)
  };
  let mut frac: u128 = 0;
  for bit in (0..FRAC_BITS).rev() {
    y = (y * y) >> FRAC_BITS;
    if y >= 2 * ONE_Q32 {
      y >>= 1;
      frac |= 1 << bit;
    }
  }
  (u128::from(int_part) << FRAC_BITS) | frac
}

#[cfg(test)]
mod tests {
  use super::*;

  const ENTROPY: [u8; 32] = [7u8; 32];

  #[test]
  fn uniform_is_pinned_to_blake2_of_entropy_and_offset() {
    assert_eq!(uniform(&ENTROPY, 0, 1_000), Some(963));
    assert_eq!(uniform(&ENTROPY, 1, 1_000), Some(467));
    assert_eq!(uniform(&ENTROPY, 0, 14_400), Some(4_963));
    assert_eq!(uniform(&ENTROPY, 3, 14_400), Some(10_988));
  }

  #[test]
  fn uniform_respects_modulus() {
    assert_eq!(uniform(&ENTROPY, 0, 0), None);
    assert_eq!(uniform(&ENTROPY, 0, 1), Some(0));
    for offset in 0..200 {
      let v = uniform(&ENTROPY, offset, 17).unwrap();
      assert!(v < 17);
    }
  }

  #[test]
  fn log2_is_exact_on_powers_of_two() {
    assert_eq!(log2_q32(1), 0);
    assert_eq!(log2_q32(2), ONE_Q32);
    assert_eq!(log2_q32(1 << 20), 20 * ONE_Q32);
    assert_eq!(log2_q32(1 << 64), 64 * ONE_Q32);
  }

  #[test]
  fn log2_of_three_is_close() {
    // log2(3) * 2^32 = 6807362105.98...
    assert_eq!(log2_q32(3), 6_807_362_105);
  }

  #[test]
  fn exponential_is_pinned() {
    assert_eq!(exponential(&ENTROPY, 0, 1_000_000, 10), 118_476);
    assert_eq!(exponential(&ENTROPY, 2, 1_000_000, 10), 31_687);
  }

  #[test]
  fn exponential_mean_tracks_requested_mean() {
    let samples = 2_000u64;
    let total: u128 = (0..samples)
      .map(|offset| exponential(&ENTROPY, offset, 1_000_000, 10))
      .sum();
    let mean = total / u128::from(samples);
    assert!((90_000..110_000).contains(&mean), "mean {mean}");
  }

  #[test]
  fn exponential_handles_degenerate_inputs() {
    assert_eq!(exponential(&ENTROPY, 0, 1_000, 0), 0);
    assert_eq!(exponential(&ENTROPY, 0, 0, 10), 0);
  }
}
