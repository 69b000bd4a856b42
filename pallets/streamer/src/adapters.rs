//! Adapter traits for the streamer pallet
//!
//! The pallet never touches balances, gauges, votes, sales or pools directly.
//! Each collaborator is reached through one narrow trait so runtimes can wire
//! in whatever pallets own those concerns.

use alloc::vec::Vec;
use frame::prelude::*;
use primitives::AssetKind;

use crate::types::{Balance, Coin, GaugeId};

/// Burning and balance queries on the module account.
pub trait AssetLedger<AccountId> {
  fn burn(who: &AccountId, asset: AssetKind, amount: Balance) -> Result<(), DispatchError>;

  fn balance(who: &AccountId, asset: AssetKind) -> Balance;
}

/// Reward gauges credited by gauge streams.
pub trait GaugeRegistry<AccountId> {
  fn gauge_exists(gauge_id: GaugeId) -> bool;

  /// Sale target a gauge votes for, if it is a pump-eligible gauge.
  fn pump_target_of(gauge_id: GaugeId) -> Option<u64>;

  /// Moves `coin` from `from` into the gauge's reward pool.
  fn add_rewards(from: &AccountId, gauge_id: GaugeId, coin: Coin) -> Result<(), DispatchError>;
}

/// Current `(gauge, weight)` distribution of governance votes.
pub trait VotingSnapshot {
  fn distribution() -> Vec<(GaugeId, u128)>;
}

/// State of the token sale backing a pump target.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SaleState {
  /// Sale still open, buying `token` with `accepted`.
  Open { accepted: AssetKind, token: AssetKind },
  /// Sale closed; its token now trades as `asset`.
  Settled { asset: AssetKind },
}

/// Bonding-curve token sales.
pub trait TokenSale<AccountId> {
  fn sale_of(target_id: u64) -> Option<SaleState>;

  /// Spends exactly `spend` of the accepted asset; returns tokens bought.
  fn buy_exact_spend(
    who: &AccountId,
    target_id: u64,
    spend: Balance,
    min_tokens: Balance,
  ) -> Result<Balance, DispatchError>;
}

/// AMM routing.
pub trait TradeRouter<AccountId> {
  fn swap_exact_in(
    who: &AccountId,
    asset_in: AssetKind,
    asset_out: AssetKind,
    amount_in: Balance,
    min_out: Balance,
  ) -> Result<Balance, DispatchError>;
}

/// Wall-clock duration of epoch identifiers.
pub trait EpochInfo {
  fn epoch_duration_secs(identifier: &[u8]) -> Option<u64>;
}

/// Epoch boundary notifications, implemented by the pallet and driven by
/// whichever pallet keeps the epoch clock. Returns the weight consumed so the
/// caller can account for it.
pub trait EpochHooks {
  fn after_epoch_end(epoch_identifier: &[u8]) -> Weight;
}

impl EpochHooks for () {
  fn after_epoch_end(_: &[u8]) -> Weight {
    Weight::zero()
  }
}

/// Per-block entropy, unpredictable before the block is built.
pub trait BlockEntropy {
  fn entropy() -> [u8; 32];
}

/// Entropy drawn from the parent block hash.
pub struct ParentHashEntropy<T>(PhantomData<T>);

impl<T: frame_system::Config> BlockEntropy for ParentHashEntropy<T> {
  fn entropy() -> [u8; 32] {
    let parent_hash = frame_system::Pallet::<T>::parent_hash();
    frame::hashing::blake2_256(parent_hash.as_ref())
  }
}

/// Epoch durations from the ecosystem's well-known identifiers.
pub struct WellKnownEpochs;

impl EpochInfo for WellKnownEpochs {
  fn epoch_duration_secs(identifier: &[u8]) -> Option<u64> {
    primitives::epochs::duration_secs(identifier)
  }
}

/// No-op `AssetLedger` for configurations without asset custody.
impl<AccountId> AssetLedger<AccountId> for () {
  fn burn(_: &AccountId, _: AssetKind, _: Balance) -> Result<(), DispatchError> {
    Ok(())
  }

  fn balance(_: &AccountId, _: AssetKind) -> Balance {
    0
  }
}

/// Empty registry: no gauge exists.
impl<AccountId> GaugeRegistry<AccountId> for () {
  fn gauge_exists(_: GaugeId) -> bool {
    false
  }

  fn pump_target_of(_: GaugeId) -> Option<u64> {
    None
  }

  fn add_rewards(_: &AccountId, _: GaugeId, _: Coin) -> Result<(), DispatchError> {
    Err(DispatchError::Other("GaugeRegistry not configured"))
  }
}

impl VotingSnapshot for () {
  fn distribution() -> Vec<(GaugeId, u128)> {
    Vec::new()
  }
}

/// No sales: every pump target is skipped.
impl<AccountId> TokenSale<AccountId> for () {
  fn sale_of(_: u64) -> Option<SaleState> {
    None
  }

  fn buy_exact_spend(
    _: &AccountId,
    _: u64,
    _: Balance,
    _: Balance,
  ) -> Result<Balance, DispatchError> {
    Err(DispatchError::Other("TokenSale not configured"))
  }
}

impl<AccountId> TradeRouter<AccountId> for () {
  fn swap_exact_in(
    _: &AccountId,
    _: AssetKind,
    _: AssetKind,
    _: Balance,
    _: Balance,
  ) -> Result<Balance, DispatchError> {
    Err(DispatchError::Other("TradeRouter not configured"))
  }
}
