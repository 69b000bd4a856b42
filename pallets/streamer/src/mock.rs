use crate as pallet_streamer;
use crate::{
  AssetLedger, BlockEntropy, GaugeRegistry, SaleState, TokenSale, TradeRouter, VotingSnapshot,
  WellKnownEpochs,
  types::{AssetKind, Balance, Coin, GaugeId},
};
use frame::prelude::*;
use polkadot_sdk::{
  frame_support::{
    PalletId, construct_runtime,
    traits::{ConstU32, ConstU64, Get, UnixTime},
  },
  frame_system::EnsureRoot,
  sp_runtime::{
    BuildStorage, DispatchError,
    traits::{BlakeTwo256, IdentityLookup},
  },
};

use alloc::{
  collections::{BTreeMap, BTreeSet},
  vec::Vec,
};
use core::{cell::RefCell, time::Duration};

type Block = polkadot_sdk::frame_system::mocking::MockBlock<Test>;
pub type AccountId = u64;

pub const X: AssetKind = AssetKind::Local(1);
pub const Y: AssetKind = AssetKind::Local(2);
pub const SALE_TOKEN: AssetKind = AssetKind::Local(101);
pub const SETTLED_TOKEN: AssetKind = AssetKind::Local(102);

pub const ENTROPY: [u8; 32] = [7u8; 32];
pub const GENESIS_TIME: u64 = 1_700_000_000;

/// Tokens an open sale mints per unit spent.
pub const SALE_PRICE_MULTIPLIER: Balance = 2;

construct_runtime!(
  pub enum Test {
    System: polkadot_sdk::frame_system,
    Streamer: pallet_streamer,
  }
);

impl polkadot_sdk::frame_system::Config for Test {
  type BaseCallFilter = polkadot_sdk::frame_support::traits::Everything;
  type BlockWeights = ();
  type BlockLength = ();
  type DbWeight = ();
  type RuntimeOrigin = RuntimeOrigin;
  type RuntimeCall = RuntimeCall;
  type Nonce = u64;
  type Hash = polkadot_sdk::sp_core::H256;
  type Hashing = BlakeTwo256;
  type AccountId = AccountId;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Block = Block;
  type RuntimeEvent = RuntimeEvent;
  type BlockHashCount = ConstU64<250>;
  type Version = ();
  type PalletInfo = PalletInfo;
  type AccountData = ();
  type OnNewAccount = ();
  type OnKilledAccount = ();
  type SystemWeightInfo = ();
  type SS58Prefix = ();
  type OnSetCode = ();
  type MaxConsumers = ConstU32<16>;
  type RuntimeTask = ();
  type ExtensionsWeightInfo = ();
  type SingleBlockMigrations = ();
  type MultiBlockMigrator = ();
  type PreInherents = ();
  type PostInherents = ();
  type PostTransactions = ();
}

thread_local! {
  static BALANCES: RefCell<BTreeMap<(AccountId, AssetKind), Balance>> =
    RefCell::new(BTreeMap::new());

  static BURNED: RefCell<BTreeMap<AssetKind, Balance>> = RefCell::new(BTreeMap::new());

  /// Registered gauges and the sale target each one votes for.
  static GAUGES: RefCell<BTreeMap<GaugeId, Option<u64>>> = RefCell::new(BTreeMap::new());

  /// Gauges whose reward pool rejects deposits.
  static FROZEN_GAUGES: RefCell<BTreeSet<GaugeId>> = RefCell::new(BTreeSet::new());

  static VOTES: RefCell<Vec<(GaugeId, u128)>> = RefCell::new(Vec::new());

  static SALES: RefCell<BTreeMap<u64, SaleState>> = RefCell::new(BTreeMap::new());

  /// `(asset_in, asset_out) -> (numerator, denominator)` swap rates.
  static RATES: RefCell<BTreeMap<(AssetKind, AssetKind), (Balance, Balance)>> =
    RefCell::new(BTreeMap::new());

  static NOW: RefCell<u64> = const { RefCell::new(GENESIS_TIME) };

  static BLOCK_ENTROPY: RefCell<[u8; 32]> = const { RefCell::new(ENTROPY) };
}

pub fn reset_mock_adapters() {
  BALANCES.with(|b| b.borrow_mut().clear());
  BURNED.with(|b| b.borrow_mut().clear());
  GAUGES.with(|g| g.borrow_mut().clear());
  FROZEN_GAUGES.with(|g| g.borrow_mut().clear());
  VOTES.with(|v| v.borrow_mut().clear());
  SALES.with(|s| s.borrow_mut().clear());
  RATES.with(|r| r.borrow_mut().clear());
  NOW.with(|n| *n.borrow_mut() = GENESIS_TIME);
  BLOCK_ENTROPY.with(|e| *e.borrow_mut() = ENTROPY);
}

pub fn balance_of(who: AccountId, asset: AssetKind) -> Balance {
  BALANCES.with(|b| b.borrow().get(&(who, asset)).copied().unwrap_or(0))
}

pub fn set_balance(who: AccountId, asset: AssetKind, amount: Balance) {
  BALANCES.with(|b| b.borrow_mut().insert((who, asset), amount));
}

pub fn fund_module(asset: AssetKind, amount: Balance) {
  let module = Streamer::account_id();
  set_balance(module, asset, balance_of(module, asset) + amount);
}

pub fn burned(asset: AssetKind) -> Balance {
  BURNED.with(|b| b.borrow().get(&asset).copied().unwrap_or(0))
}

pub fn gauge_account(gauge_id: GaugeId) -> AccountId {
  10_000 + gauge_id
}

pub fn gauge_rewards(gauge_id: GaugeId, asset: AssetKind) -> Balance {
  balance_of(gauge_account(gauge_id), asset)
}

pub fn add_gauge(gauge_id: GaugeId, pump_target: Option<u64>) {
  GAUGES.with(|g| g.borrow_mut().insert(gauge_id, pump_target));
}

pub fn remove_gauge(gauge_id: GaugeId) {
  GAUGES.with(|g| g.borrow_mut().remove(&gauge_id));
}

pub fn freeze_gauge(gauge_id: GaugeId) {
  FROZEN_GAUGES.with(|g| g.borrow_mut().insert(gauge_id));
}

pub fn set_votes(votes: Vec<(GaugeId, u128)>) {
  VOTES.with(|v| *v.borrow_mut() = votes);
}

pub fn set_sale(target_id: u64, state: SaleState) {
  SALES.with(|s| s.borrow_mut().insert(target_id, state));
}

pub fn set_rate(
  asset_in: AssetKind,
  asset_out: AssetKind,
  numerator: Balance,
  denominator: Balance,
) {
  RATES.with(|r| r.borrow_mut().insert((asset_in, asset_out), (numerator, denominator)));
}

pub fn set_now(secs: u64) {
  NOW.with(|n| *n.borrow_mut() = secs);
}

pub fn set_entropy(entropy: [u8; 32]) {
  BLOCK_ENTROPY.with(|e| *e.borrow_mut() = entropy);
}

fn debit(who: AccountId, asset: AssetKind, amount: Balance) -> Result<(), DispatchError> {
  let current = balance_of(who, asset);
  let left = current
    .checked_sub(amount)
    .ok_or(DispatchError::Other("InsufficientBalance"))?;
  set_balance(who, asset, left);
  Ok(())
}

fn credit(who: AccountId, asset: AssetKind, amount: Balance) {
  set_balance(who, asset, balance_of(who, asset) + amount);
}

pub struct MockLedger;
impl AssetLedger<AccountId> for MockLedger {
  fn burn(who: &AccountId, asset: AssetKind, amount: Balance) -> Result<(), DispatchError> {
    debit(*who, asset, amount)?;
    BURNED.with(|b| *b.borrow_mut().entry(asset).or_default() += amount);
    Ok(())
  }

  fn balance(who: &AccountId, asset: AssetKind) -> Balance {
    balance_of(*who, asset)
  }
}

pub struct MockGauges;
impl GaugeRegistry<AccountId> for MockGauges {
  fn gauge_exists(gauge_id: GaugeId) -> bool {
    GAUGES.with(|g| g.borrow().contains_key(&gauge_id))
  }

  fn pump_target_of(gauge_id: GaugeId) -> Option<u64> {
    GAUGES.with(|g| g.borrow().get(&gauge_id).copied().flatten())
  }

  fn add_rewards(from: &AccountId, gauge_id: GaugeId, coin: Coin) -> Result<(), DispatchError> {
    if FROZEN_GAUGES.with(|g| g.borrow().contains(&gauge_id)) {
      return Err(DispatchError::Other("GaugeFrozen"));
    }
    debit(*from, coin.asset, coin.amount)?;
    credit(gauge_account(gauge_id), coin.asset, coin.amount);
    Ok(())
  }
}

pub struct MockVotes;
impl VotingSnapshot for MockVotes {
  fn distribution() -> Vec<(GaugeId, u128)> {
    VOTES.with(|v| v.borrow().clone())
  }
}

pub struct MockRouter;
impl TradeRouter<AccountId> for MockRouter {
  fn swap_exact_in(
    who: &AccountId,
    asset_in: AssetKind,
    asset_out: AssetKind,
    amount_in: Balance,
    min_out: Balance,
  ) -> Result<Balance, DispatchError> {
    let (numerator, denominator) = RATES
      .with(|r| r.borrow().get(&(asset_in, asset_out)).copied())
      .ok_or(DispatchError::Other("NoPool"))?;
    let out = amount_in * numerator / denominator;
    if out < min_out {
      return Err(DispatchError::Other("Slippage"));
    }
    debit(*who, asset_in, amount_in)?;
    credit(*who, asset_out, out);
    Ok(out)
  }
}

pub struct MockSales;
impl TokenSale<AccountId> for MockSales {
  fn sale_of(target_id: u64) -> Option<SaleState> {
    SALES.with(|s| s.borrow().get(&target_id).copied())
  }

  fn buy_exact_spend(
    who: &AccountId,
    target_id: u64,
    spend: Balance,
    min_tokens: Balance,
  ) -> Result<Balance, DispatchError> {
    let Some(SaleState::Open { accepted, token }) = Self::sale_of(target_id) else {
      return Err(DispatchError::Other("SaleClosed"));
    };
    let bought = spend * SALE_PRICE_MULTIPLIER;
    if bought < min_tokens {
      return Err(DispatchError::Other("Slippage"));
    }
    debit(*who, accepted, spend)?;
    credit(*who, token, bought);
    Ok(bought)
  }
}

pub struct MockTime;
impl UnixTime for MockTime {
  fn now() -> Duration {
    Duration::from_secs(NOW.with(|n| *n.borrow()))
  }
}

pub struct MockEntropy;
impl BlockEntropy for MockEntropy {
  fn entropy() -> [u8; 32] {
    BLOCK_ENTROPY.with(|e| *e.borrow())
  }
}

pub struct StreamerPalletId;
impl Get<PalletId> for StreamerPalletId {
  fn get() -> PalletId {
    PalletId(*primitives::pallet_ids::STREAMER_PALLET_ID)
  }
}

#[cfg(feature = "runtime-benchmarks")]
pub struct MockBenchmarkHelper;
#[cfg(feature = "runtime-benchmarks")]
impl crate::BenchmarkHelper<AccountId> for MockBenchmarkHelper {
  fn fund(who: &AccountId, asset: AssetKind, amount: Balance) -> DispatchResult {
    credit(*who, asset, amount);
    Ok(())
  }

  fn create_gauge(gauge_id: GaugeId) -> DispatchResult {
    add_gauge(gauge_id, None);
    Ok(())
  }

  fn create_pool(asset_in: AssetKind, asset_out: AssetKind) -> DispatchResult {
    set_rate(asset_in, asset_out, 1, 1);
    Ok(())
  }
}

impl pallet_streamer::Config for Test {
  type AssetLedger = MockLedger;
  type GaugeRegistry = MockGauges;
  type VotingSnapshot = MockVotes;
  type TokenSale = MockSales;
  type TradeRouter = MockRouter;
  type EpochInfo = WellKnownEpochs;
  type Entropy = MockEntropy;
  type UnixTime = MockTime;
  type PalletId = StreamerPalletId;
  type ExpectedBlockTimeMs = ConstU64<{ primitives::params::EXPECTED_BLOCK_TIME_MS }>;
  type DefaultMaxIterationsPerBlock =
    ConstU64<{ primitives::params::STREAMER_MAX_ITERATIONS_PER_BLOCK }>;
  type MaxStreams = ConstU32<8>;
  type AdminOrigin = EnsureRoot<AccountId>;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = MockBenchmarkHelper;
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  let mut t = polkadot_sdk::frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();

  pallet_streamer::GenesisConfig::<Test>::default()
    .assimilate_storage(&mut t)
    .unwrap();

  let mut ext = polkadot_sdk::sp_io::TestExternalities::new(t);
  ext.execute_with(|| {
    System::set_block_number(1);
    reset_mock_adapters();
  });
  ext
}
