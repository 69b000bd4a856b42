//! Stream data model: coin bundles, gauge weight tables, epoch pointers and
//! pump parameters.

use alloc::vec::Vec;
use core::cmp::Ordering;
use frame::prelude::*;

pub use primitives::AssetKind;

pub type StreamId = u64;
pub type GaugeId = u64;
pub use primitives::Balance;

/// Maximum number of distinct assets a single coin bundle may hold.
pub type MaxCoins = ConstU32<16>;
/// Maximum number of gauge records in a weight table.
pub type MaxDistrRecords = ConstU32<512>;
/// Maximum length of an epoch identifier such as `b"day"`.
pub type MaxEpochIdentifierLen = ConstU32<32>;

pub type EpochIdentifier = BoundedVec<u8, MaxEpochIdentifierLen>;

/// Amount of a single asset.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct Coin {
  pub asset: AssetKind,
  pub amount: Balance,
}

impl Coin {
  pub fn new(asset: AssetKind, amount: Balance) -> Self {
    Self { asset, amount }
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoinsError {
  TooManyAssets,
  Overflow,
  Underflow,
}

/// Multi-asset bundle. Entries are sorted by asset, unique, and never zero.
#[derive(
  Clone,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct Coins(BoundedVec<Coin, MaxCoins>);

impl Coins {
  pub fn new() -> Self {
    Self::default()
  }

  /// Normalizes an arbitrary list: sorts, merges duplicates, drops zeros.
  pub fn try_from_vec(coins: Vec<Coin>) -> Result<Self, CoinsError> {
    let mut out = Self::new();
    for coin in coins {
      out.try_add(coin)?;
    }
    Ok(out)
  }

  pub fn single(asset: AssetKind, amount: Balance) -> Self {
    let mut out = Self::new();
    if amount > 0 {
      // A single entry always fits
      let _ = out.0.try_push(Coin::new(asset, amount));
    }
    out
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Coin> {
    self.0.iter()
  }

  pub fn amount_of(&self, asset: AssetKind) -> Balance {
    match self.0.binary_search_by(|c| c.asset.cmp(&asset)) {
      Ok(idx) => self.0[idx].amount,
      Err(_) => 0,
    }
  }

  pub fn try_add(&mut self, coin: Coin) -> Result<(), CoinsError> {
    if coin.amount == 0 {
      return Ok(());
    }
    match self.0.binary_search_by(|c| c.asset.cmp(&coin.asset)) {
      Ok(idx) => {
        let entry = &mut self.0[idx];
        entry.amount = entry
          .amount
          .checked_add(coin.amount)
          .ok_or(CoinsError::Overflow)?;
        Ok(())
      }
      Err(idx) => self
        .0
        .try_insert(idx, coin)
        .map_err(|_| CoinsError::TooManyAssets),
    }
  }

  pub fn try_add_all(&mut self, other: &Coins) -> Result<(), CoinsError> {
    for coin in other.iter() {
      self.try_add(*coin)?;
    }
    Ok(())
  }

  pub fn try_sub(&mut self, coin: Coin) -> Result<(), CoinsError> {
    if coin.amount == 0 {
      return Ok(());
    }
    let idx = self
      .0
      .binary_search_by(|c| c.asset.cmp(&coin.asset))
      .map_err(|_| CoinsError::Underflow)?;
    let left = self.0[idx]
      .amount
      .checked_sub(coin.amount)
      .ok_or(CoinsError::Underflow)?;
    if left == 0 {
      self.0.remove(idx);
    } else {
      self.0[idx].amount = left;
    }
    Ok(())
  }

  /// Component-wise `self - other`; fails if any component would go negative.
  pub fn checked_sub(&self, other: &Coins) -> Result<Coins, CoinsError> {
    let mut out = self.clone();
    for coin in other.iter() {
      out.try_sub(*coin)?;
    }
    Ok(out)
  }

  /// Floor-divides every component, omitting assets that round to zero.
  pub fn quo_floor(&self, divisor: u64) -> Coins {
    if divisor == 0 {
      return Coins::new();
    }
    let kept: Vec<Coin> = self
      .iter()
      .filter_map(|c| {
        let amount = c.amount / Balance::from(divisor);
        (amount > 0).then_some(Coin::new(c.asset, amount))
      })
      .collect();
    // Subset of a bounded, sorted list stays bounded and sorted
    Coins(BoundedVec::truncate_from(kept))
  }

  /// True when every component of `self` is at most the matching one in `other`.
  pub fn is_all_lte(&self, other: &Coins) -> bool {
    self.iter().all(|c| c.amount <= other.amount_of(c.asset))
  }
}

/// One weighted gauge entry of a distribution table.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct DistrRecord {
  pub gauge_id: GaugeId,
  pub weight: u128,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DistrInfoError {
  /// Gauge ids are not strictly increasing.
  UnsortedRecords,
  DuplicateGauge,
  ZeroTotalWeight,
  TooManyRecords,
  Overflow,
}

/// Weighted gauge table. Records are strictly increasing by gauge id and
/// `total_weight` is their sum.
#[derive(
  Clone,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct DistrInfo {
  pub records: BoundedVec<DistrRecord, MaxDistrRecords>,
  pub total_weight: u128,
}

impl DistrInfo {
  pub fn new(records: Vec<DistrRecord>) -> Result<Self, DistrInfoError> {
    let mut total_weight: u128 = 0;
    for (i, record) in records.iter().enumerate() {
      if i > 0 {
        match records[i - 1].gauge_id.cmp(&record.gauge_id) {
          Ordering::Less => {}
          Ordering::Equal => return Err(DistrInfoError::DuplicateGauge),
          Ordering::Greater => return Err(DistrInfoError::UnsortedRecords),
        }
      }
      total_weight = total_weight
        .checked_add(record.weight)
        .ok_or(DistrInfoError::Overflow)?;
    }
    if !records.is_empty() && total_weight == 0 {
      return Err(DistrInfoError::ZeroTotalWeight);
    }
    let records = BoundedVec::try_from(records).map_err(|_| DistrInfoError::TooManyRecords)?;
    Ok(Self {
      records,
      total_weight,
    })
  }

  /// Builds a table from an unordered `(gauge, weight)` list, e.g. a voting snapshot.
  pub fn from_weights(mut weights: Vec<(GaugeId, u128)>) -> Result<Self, DistrInfoError> {
    weights.sort_by_key(|(gauge_id, _)| *gauge_id);
    Self::new(
      weights
        .into_iter()
        .map(|(gauge_id, weight)| DistrRecord { gauge_id, weight })
        .collect(),
    )
  }

  /// Upserts `updates` into the table. A zero weight removes the gauge.
  ///
  /// `updates` must be strictly increasing by gauge id but, unlike a table,
  /// may consist of zero weights only.
  pub fn merge_updates(&self, updates: &[DistrRecord]) -> Result<Self, DistrInfoError> {
    for pair in updates.windows(2) {
      match pair[0].gauge_id.cmp(&pair[1].gauge_id) {
        Ordering::Less => {}
        Ordering::Equal => return Err(DistrInfoError::DuplicateGauge),
        Ordering::Greater => return Err(DistrInfoError::UnsortedRecords),
      }
    }
    let mut merged = Vec::with_capacity(self.records.len() + updates.len());
    let (mut i, mut j) = (0, 0);
    let (old, new) = (&self.records, updates);
    while i < old.len() || j < new.len() {
      let take_old = match (old.get(i), new.get(j)) {
        (Some(a), Some(b)) => match a.gauge_id.cmp(&b.gauge_id) {
          Ordering::Less => true,
          Ordering::Greater => false,
          Ordering::Equal => {
            i += 1;
            false
          }
        },
        (Some(_), None) => true,
        _ => false,
      };
      let record = if take_old {
        i += 1;
        old[i - 1]
      } else {
        j += 1;
        new[j - 1]
      };
      if record.weight > 0 {
        merged.push(record);
      }
    }
    Self::new(merged)
  }

  pub fn contains(&self, gauge_id: GaugeId) -> bool {
    self
      .records
      .binary_search_by_key(&gauge_id, |r| r.gauge_id)
      .is_ok()
  }
}

/// Persisted resumption point of the per-block distribution for one epoch
/// identifier. `(0, 0)` sits before every gauge, `(MAX, MAX)` after the last.
#[derive(
  Clone,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct EpochPointer {
  pub stream_id: StreamId,
  pub gauge_id: GaugeId,
  pub epoch_identifier: EpochIdentifier,
}

impl EpochPointer {
  pub const MIN_STREAM_ID: StreamId = 0;
  pub const MIN_GAUGE_ID: GaugeId = 0;
  pub const MAX_STREAM_ID: StreamId = StreamId::MAX;
  pub const MAX_GAUGE_ID: GaugeId = GaugeId::MAX;

  /// Pointer positioned before the first gauge.
  pub fn new(epoch_identifier: EpochIdentifier) -> Self {
    Self {
      stream_id: Self::MIN_STREAM_ID,
      gauge_id: Self::MIN_GAUGE_ID,
      epoch_identifier,
    }
  }

  pub fn set_to_first_gauge(&mut self) {
    self.stream_id = Self::MIN_STREAM_ID;
    self.gauge_id = Self::MIN_GAUGE_ID;
  }

  pub fn set_to_last_gauge(&mut self) {
    self.stream_id = Self::MAX_STREAM_ID;
    self.gauge_id = Self::MAX_GAUGE_ID;
  }

  pub fn is_exhausted(&self) -> bool {
    self.stream_id == Self::MAX_STREAM_ID && self.gauge_id == Self::MAX_GAUGE_ID
  }
}

#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum PumpDistr {
  Uniform,
  Exponential,
}

/// What a pump stream buys.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum PumpTarget {
  /// Rank voted gauges and spread pressure over the top sale targets.
  TopTargets,
  /// Buy a single asset through the trade router.
  Pool { token_out: AssetKind },
}

#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct PumpParams {
  /// How many of the highest-weighted targets share each pump.
  pub num_top_targets: u32,
  /// Expected number of pumps per epoch.
  pub num_pumps: u64,
  pub pump_distr: PumpDistr,
  pub epoch_budget: Balance,
  /// Never exceeds `epoch_budget`; reset only when an epoch starts.
  pub epoch_budget_left: Balance,
  pub target: PumpTarget,
}

/// Gauge table or pump parameters; a stream has exactly one.
#[derive(
  Clone,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum DistributionTarget {
  Gauges(DistrInfo),
  Pump(PumpParams),
}

impl DistributionTarget {
  /// Gauge records visited by the epoch pointer. Pump streams expose none.
  pub fn records(&self) -> &[DistrRecord] {
    match self {
      DistributionTarget::Gauges(info) => &info.records,
      DistributionTarget::Pump(_) => &[],
    }
  }
}

#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  Ord,
  PartialEq,
  PartialOrd,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum StreamStatus {
  Upcoming,
  Active,
  Finished,
}

#[derive(
  Clone,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct Stream {
  pub id: StreamId,
  pub distribute_to: DistributionTarget,
  pub coins: Coins,
  /// Unix seconds.
  pub start_time: u64,
  pub distr_epoch_identifier: EpochIdentifier,
  pub num_epochs_paid_over: u64,
  pub filled_epochs: u64,
  pub distributed_coins: Coins,
  /// Rebuild the gauge table from the voting snapshot every epoch.
  pub sponsored: bool,
  /// Payout of the epoch in progress. Empty when no epoch is in progress.
  pub epoch_coins: Coins,
}

impl Stream {
  pub fn remaining_coins(&self) -> Result<Coins, CoinsError> {
    self.coins.checked_sub(&self.distributed_coins)
  }

  pub fn remaining_epochs(&self) -> u64 {
    self.num_epochs_paid_over.saturating_sub(self.filled_epochs)
  }

  pub fn is_filled(&self) -> bool {
    self.filled_epochs >= self.num_epochs_paid_over
  }

  pub fn pump_params(&self) -> Option<&PumpParams> {
    match &self.distribute_to {
      DistributionTarget::Pump(params) => Some(params),
      DistributionTarget::Gauges(_) => None,
    }
  }

  pub fn pump_params_mut(&mut self) -> Option<&mut PumpParams> {
    match &mut self.distribute_to {
      DistributionTarget::Pump(params) => Some(params),
      DistributionTarget::Gauges(_) => None,
    }
  }
}

/// Pump amount allocated to one ranked target.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct PumpPressure {
  pub target_id: u64,
  pub pressure: Balance,
}

/// Merge-joins pressure lists that are each sorted by `target_id`.
///
/// Matching ids are summed and zero sums are dropped. The result is sorted by
/// `target_id` regardless of the order the lists are given in.
pub fn merge_ranked(lists: &[Vec<PumpPressure>]) -> Vec<PumpPressure> {
  lists
    .iter()
    .fold(Vec::new(), |acc, list| merge_two(&acc, list))
}

fn merge_two(lhs: &[PumpPressure], rhs: &[PumpPressure]) -> Vec<PumpPressure> {
  let mut out = Vec::with_capacity(lhs.len() + rhs.len());
  let (mut i, mut j) = (0, 0);
  while i < lhs.len() || j < rhs.len() {
    let next = match (lhs.get(i), rhs.get(j)) {
      (Some(a), Some(b)) => match a.target_id.cmp(&b.target_id) {
        Ordering::Less => {
          i += 1;
          *a
        }
        Ordering::Greater => {
          j += 1;
          *b
        }
        Ordering::Equal => {
          i += 1;
          j += 1;
          PumpPressure {
            target_id: a.target_id,
            pressure: a.pressure.saturating_add(b.pressure),
          }
        }
      },
      (Some(a), None) => {
        i += 1;
        *a
      }
      (None, Some(b)) => {
        j += 1;
        *b
      }
      (None, None) => break,
    };
    if next.pressure > 0 {
      out.push(next);
    }
  }
  out
}
