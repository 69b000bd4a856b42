//! Epoch payout math for streams.

use alloc::vec::Vec;
use sp_arithmetic::{Rounding, helpers_128bit::multiply_by_rational_with_rounding};

use crate::types::{
  Balance, Coin, Coins, CoinsError, DistrInfo, DistrInfoError, DistrRecord, DistributionTarget,
  GaugeId, Stream,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DistributionError {
  NoRemainingEpochs,
  ZeroTotalWeight,
  EmptyPayout,
  Coins(CoinsError),
  Distr(DistrInfoError),
}

impl From<CoinsError> for DistributionError {
  fn from(e: CoinsError) -> Self {
    DistributionError::Coins(e)
  }
}

impl From<DistrInfoError> for DistributionError {
  fn from(e: DistrInfoError) -> Self {
    DistributionError::Distr(e)
  }
}

/// `floor(amount * weight / total_weight)`; zero when `total_weight` is zero.
pub fn gauge_share(amount: Balance, weight: u128, total_weight: u128) -> Balance {
  if total_weight == 0 {
    return 0;
  }
  multiply_by_rational_with_rounding(amount, weight, total_weight, Rounding::Down).unwrap_or(0)
}

/// Share of every asset in `payout` owed to one gauge record. Zero shares are
/// omitted.
pub fn gauge_rewards(payout: &Coins, record: &DistrRecord, total_weight: u128) -> Coins {
  let mut out = Coins::new();
  for coin in payout.iter() {
    let amount = gauge_share(coin.amount, record.weight, total_weight);
    // Assets of `out` are a subset of `payout`, so this cannot exceed the bound
    let _ = out.try_add(Coin::new(coin.asset, amount));
  }
  out
}

/// Starts a new epoch for `stream`: computes the payout of the epoch as
/// `floor(remaining / remaining_epochs)` per asset and records it in
/// `epoch_coins`. Pump streams also get a fresh epoch budget.
///
/// Sponsored gauge streams rebuild their table from `votes` first. On error the
/// stream is left untouched.
pub fn start_epoch<F>(stream: &mut Stream, votes: F) -> Result<Coins, DistributionError>
where
  F: FnOnce() -> Vec<(GaugeId, u128)>,
{
  let remaining_epochs = stream.remaining_epochs();
  if remaining_epochs == 0 {
    return Err(DistributionError::NoRemainingEpochs);
  }
  let payout = stream.remaining_coins()?.quo_floor(remaining_epochs);

  let mut next = stream.clone();
  match &mut next.distribute_to {
    DistributionTarget::Gauges(info) => {
      if next.sponsored {
        *info = DistrInfo::from_weights(votes())?;
      }
      if info.total_weight == 0 {
        return Err(DistributionError::ZeroTotalWeight);
      }
    }
    DistributionTarget::Pump(params) => {
      let budget = payout.iter().map(|c| c.amount).next().unwrap_or(0);
      params.epoch_budget = budget;
      params.epoch_budget_left = budget;
    }
  }
  if payout.is_empty() {
    return Err(DistributionError::EmptyPayout);
  }

  next.epoch_coins = payout.clone();
  *stream = next;
  Ok(payout)
}
