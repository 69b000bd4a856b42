//! Streamer Pallet
//!
//! Pays pooled assets out to weighted reward gauges one epoch at a time, and
//! spends pump streams on randomized buy pressure for the most voted sale
//! targets. Gauge crediting is spread over blocks behind a persisted epoch
//! pointer so that no block exceeds its iteration budget.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod adapters;
pub use adapters::{
  AssetLedger, BlockEntropy, EpochHooks, EpochInfo, GaugeRegistry, ParentHashEntropy, SaleState,
  TokenSale, TradeRouter, VotingSnapshot, WellKnownEpochs,
};

pub mod distribution;
pub mod iterator;
pub mod pagination;
pub mod pump;
pub mod random;
pub mod types;

pub mod weights;
pub use weights::WeightInfo;

#[cfg(test)]
mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub(crate) const LOG_TARGET: &str = "runtime::streamer";

/// Helper for benchmarking
#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId> {
  fn fund(
    who: &AccountId,
    asset: types::AssetKind,
    amount: types::Balance,
  ) -> polkadot_sdk::sp_runtime::DispatchResult;
  fn create_gauge(gauge_id: types::GaugeId) -> polkadot_sdk::sp_runtime::DispatchResult;
  /// Makes `asset_in` swappable into `asset_out` through the trade router
  fn create_pool(
    asset_in: types::AssetKind,
    asset_out: types::AssetKind,
  ) -> polkadot_sdk::sp_runtime::DispatchResult;
}

#[frame::pallet]
pub mod pallet {
  use super::{
    AssetLedger, BlockEntropy, EpochHooks, EpochInfo, GaugeRegistry, LOG_TARGET, SaleState,
    TokenSale, TradeRouter, VotingSnapshot, WeightInfo,
  };
  use crate::{
    distribution::{self, DistributionError},
    iterator::iterate_epoch_pointer,
    pagination::Step,
    pump::{self, PumpError},
    types::{
      AssetKind, Balance, Coin, Coins, CoinsError, DistrInfo, DistrInfoError, DistrRecord,
      DistributionTarget, EpochIdentifier, EpochPointer, GaugeId, MaxCoins, MaxDistrRecords,
      PumpDistr, PumpParams, PumpPressure, PumpTarget, Stream, StreamId, StreamStatus,
      merge_ranked,
    },
  };
  use alloc::{collections::BTreeMap, vec, vec::Vec};
  use frame::prelude::*;
  use polkadot_sdk::{
    frame_support::{
      PalletId,
      storage::with_storage_layer,
      traits::{EnsureOrigin, UnixTime},
    },
    sp_runtime::{DispatchError, traits::AccountIdConversion},
  };

  #[pallet::config]
  pub trait Config: frame_system::Config<RuntimeEvent: From<Event<Self>>> {
    /// Custody of stream funds and burning of pump proceeds
    type AssetLedger: AssetLedger<Self::AccountId>;

    /// Reward gauges and their pump targets
    type GaugeRegistry: GaugeRegistry<Self::AccountId>;

    /// Governance vote distribution used by sponsored and pump streams
    type VotingSnapshot: VotingSnapshot;

    type TokenSale: TokenSale<Self::AccountId>;

    type TradeRouter: TradeRouter<Self::AccountId>;

    /// Durations of epoch identifiers
    type EpochInfo: EpochInfo;

    /// Per-block randomness for pump decisions
    type Entropy: BlockEntropy;

    type UnixTime: UnixTime;

    /// The pallet ID holding every stream's funds
    #[pallet::constant]
    type PalletId: Get<PalletId>;

    /// Expected block interval, used to count blocks in an epoch
    #[pallet::constant]
    type ExpectedBlockTimeMs: Get<u64>;

    /// Default cap on gauge visits per block
    #[pallet::constant]
    type DefaultMaxIterationsPerBlock: Get<u64>;

    /// Maximum number of upcoming plus active streams
    #[pallet::constant]
    type MaxStreams: Get<u32>;

    /// Origin that can create and manage streams
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    /// Weight information for extrinsics and hooks
    type WeightInfo: WeightInfo;

    /// Helper for benchmarking
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: crate::BenchmarkHelper<Self::AccountId>;
  }

  #[pallet::pallet]
  pub struct Pallet<T>(PhantomData<T>);

  /// Id of the most recently created stream; ids start at 1
  #[pallet::storage]
  #[pallet::getter(fn last_stream_id)]
  pub type LastStreamId<T: Config> = StorageValue<_, StreamId, ValueQuery>;

  /// Every stream ever created, finished ones included
  #[pallet::storage]
  #[pallet::getter(fn stream)]
  pub type Streams<T: Config> = StorageMap<_, Blake2_128Concat, StreamId, Stream, OptionQuery>;

  /// Ids of streams waiting for their start time, ascending
  #[pallet::storage]
  #[pallet::getter(fn upcoming_streams)]
  pub type UpcomingStreams<T: Config> =
    StorageValue<_, BoundedVec<StreamId, T::MaxStreams>, ValueQuery>;

  /// Ids of streams paying out, ascending
  #[pallet::storage]
  #[pallet::getter(fn active_streams)]
  pub type ActiveStreams<T: Config> =
    StorageValue<_, BoundedVec<StreamId, T::MaxStreams>, ValueQuery>;

  /// Resumption point of gauge crediting per epoch identifier
  #[pallet::storage]
  #[pallet::getter(fn epoch_pointer)]
  pub type EpochPointers<T: Config> =
    StorageMap<_, Blake2_128Concat, EpochIdentifier, EpochPointer, OptionQuery>;

  /// Current cap on gauge visits per block (can be updated by governance)
  #[pallet::storage]
  #[pallet::getter(fn max_iterations_per_block)]
  pub type MaxIterationsPerBlock<T: Config> =
    StorageValue<_, u64, ValueQuery, T::DefaultMaxIterationsPerBlock>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    StreamCreated {
      stream_id: StreamId,
      coins: Coins,
      start_time: u64,
      epoch_identifier: EpochIdentifier,
      num_epochs_paid_over: u64,
      sponsored: bool,
    },
    PumpStreamCreated {
      stream_id: StreamId,
      coin: Coin,
      start_time: u64,
      epoch_identifier: EpochIdentifier,
      num_epochs_paid_over: u64,
      params: PumpParams,
    },
    StreamActivated {
      stream_id: StreamId,
    },
    /// All epochs of the stream have been paid out
    StreamFinished {
      stream_id: StreamId,
      distributed: Coins,
    },
    StreamTerminated {
      stream_id: StreamId,
      distributed: Coins,
    },
    DistributionReplaced {
      stream_id: StreamId,
      total_weight: u128,
    },
    DistributionUpdated {
      stream_id: StreamId,
      total_weight: u128,
    },
    /// A stream computed the payout of its new epoch
    EpochStarted {
      stream_id: StreamId,
      epoch_coins: Coins,
    },
    /// A stream could not start its epoch and sits it out
    EpochPayoutSkipped {
      stream_id: StreamId,
      error: DispatchError,
    },
    GaugeSkipped {
      stream_id: StreamId,
      gauge_id: GaugeId,
      error: DispatchError,
    },
    /// Epoch boundary processed; `distributed` is what the final drain of the
    /// previous epoch credited
    EpochDistributionStarted {
      epoch_identifier: EpochIdentifier,
      distributed: Coins,
    },
    EndBlockIterations {
      iterations: u64,
      max_iterations: u64,
    },
    Pumped {
      stream_id: StreamId,
      pumped: Balance,
      pressures: Vec<PumpPressure>,
      acquired: Vec<Coin>,
    },
    PumpTargetFailed {
      stream_id: StreamId,
      target_id: u64,
      error: DispatchError,
    },
    /// Everything the block's pumps acquired, burned in one batch
    Burned {
      coins: Vec<Coin>,
    },
    MaxIterationsUpdated {
      old_value: u64,
      new_value: u64,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    /// Stream must carry at least one positive coin
    ZeroCoins,
    TooManyAssets,
    UnknownEpochIdentifier,
    ZeroEpochs,
    /// Module account cannot cover all undistributed coins
    InsufficientModuleBalance,
    GaugeNotFound,
    UnsortedRecords,
    DuplicateGauge,
    ZeroTotalWeight,
    TooManyRecords,
    StreamNotFound,
    /// Stream is already finished
    StreamNotLive,
    NotGaugeStream,
    /// Sponsored streams follow the voting snapshot
    StreamIsSponsored,
    ZeroPumps,
    ZeroTopTargets,
    /// Pool pumps must buy a different asset than they spend
    PumpTokenMatchesBudget,
    /// Epoch is shorter than one block
    ZeroTicks,
    /// More pumps than blocks in an epoch
    TooManyPumps,
    TooManyStreams,
    SaleNotFound,
    NoRemainingEpochs,
    EmptyPayout,
    /// Crediting a gauge would exceed the stream's coins
    StreamBudgetExceeded,
    ArithmeticOverflow,
    ArithmeticUnderflow,
  }

  impl<T> From<CoinsError> for Error<T> {
    fn from(e: CoinsError) -> Self {
      match e {
        CoinsError::TooManyAssets => Error::<T>::TooManyAssets,
        CoinsError::Overflow => Error::<T>::ArithmeticOverflow,
        CoinsError::Underflow => Error::<T>::ArithmeticUnderflow,
      }
    }
  }

  impl<T> From<DistrInfoError> for Error<T> {
    fn from(e: DistrInfoError) -> Self {
      match e {
        DistrInfoError::UnsortedRecords => Error::<T>::UnsortedRecords,
        DistrInfoError::DuplicateGauge => Error::<T>::DuplicateGauge,
        DistrInfoError::ZeroTotalWeight => Error::<T>::ZeroTotalWeight,
        DistrInfoError::TooManyRecords => Error::<T>::TooManyRecords,
        DistrInfoError::Overflow => Error::<T>::ArithmeticOverflow,
      }
    }
  }

  impl<T> From<DistributionError> for Error<T> {
    fn from(e: DistributionError) -> Self {
      match e {
        DistributionError::NoRemainingEpochs => Error::<T>::NoRemainingEpochs,
        DistributionError::ZeroTotalWeight => Error::<T>::ZeroTotalWeight,
        DistributionError::EmptyPayout => Error::<T>::EmptyPayout,
        DistributionError::Coins(e) => e.into(),
        DistributionError::Distr(e) => e.into(),
      }
    }
  }

  impl<T> From<PumpError> for Error<T> {
    fn from(e: PumpError) -> Self {
      match e {
        PumpError::ZeroTicks => Error::<T>::ZeroTicks,
        PumpError::TooManyPumps => Error::<T>::TooManyPumps,
      }
    }
  }

  #[pallet::hooks]
  impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
    fn on_initialize(_n: BlockNumberFor<T>) -> Weight {
      let active = ActiveStreams::<T>::get();
      let mut targets: u64 = 0;
      if !active.is_empty() {
        let entropy = T::Entropy::entropy();
        let mut acquired: BTreeMap<AssetKind, Balance> = BTreeMap::new();
        for stream_id in active.iter() {
          targets = targets.saturating_add(Self::pump_stream(*stream_id, &entropy, &mut acquired));
        }
        Self::burn_acquired(acquired);
      }
      T::WeightInfo::pump_base(active.len() as u32)
        .saturating_add(T::WeightInfo::pump_target().saturating_mul(targets))
    }

    fn on_idle(_n: BlockNumberFor<T>, remaining_weight: Weight) -> Weight {
      let base = T::WeightInfo::distribute_base();
      if !remaining_weight.all_gte(base) {
        return Weight::zero();
      }
      let per_step = T::WeightInfo::distribute_gauge();
      let budget = MaxIterationsPerBlock::<T>::get()
        .min(Self::steps_within(remaining_weight.saturating_sub(base), per_step));
      let iterations = Self::distribute_pending(budget);
      base.saturating_add(per_step.saturating_mul(iterations))
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Create a stream paying `coins` out to gauges over `num_epochs_paid_over`
    /// epochs. Sponsored streams ignore `records` and follow the voting snapshot.
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::create_stream(records.len() as u32))]
    pub fn create_stream(
      origin: OriginFor<T>,
      coins: BoundedVec<Coin, MaxCoins>,
      records: BoundedVec<DistrRecord, MaxDistrRecords>,
      start_time: Option<u64>,
      epoch_identifier: EpochIdentifier,
      num_epochs_paid_over: u64,
      sponsored: bool,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      let coins = Coins::try_from_vec(coins.into_inner()).map_err(Error::<T>::from)?;
      let info = if sponsored {
        DistrInfo::from_weights(T::VotingSnapshot::distribution())
      } else {
        DistrInfo::new(records.into_inner())
      }
      .map_err(Error::<T>::from)?;
      if !sponsored {
        ensure!(info.total_weight > 0, Error::<T>::ZeroTotalWeight);
        Self::ensure_gauges_exist(&info.records)?;
      }

      let stream = Self::register_stream(
        coins,
        DistributionTarget::Gauges(info),
        start_time,
        epoch_identifier,
        num_epochs_paid_over,
        sponsored,
      )?;
      Self::deposit_event(Event::StreamCreated {
        stream_id: stream.id,
        coins: stream.coins,
        start_time: stream.start_time,
        epoch_identifier: stream.distr_epoch_identifier,
        num_epochs_paid_over: stream.num_epochs_paid_over,
        sponsored,
      });
      Ok(())
    }

    /// Create a single-asset stream that spends each epoch's budget on
    /// randomly timed pumps.
    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::create_pump_stream())]
    pub fn create_pump_stream(
      origin: OriginFor<T>,
      coin: Coin,
      start_time: Option<u64>,
      epoch_identifier: EpochIdentifier,
      num_epochs_paid_over: u64,
      num_pumps: u64,
      num_top_targets: u32,
      pump_distr: PumpDistr,
      target: PumpTarget,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      ensure!(coin.amount > 0, Error::<T>::ZeroCoins);
      ensure!(num_pumps > 0, Error::<T>::ZeroPumps);
      match target {
        PumpTarget::TopTargets => ensure!(num_top_targets > 0, Error::<T>::ZeroTopTargets),
        PumpTarget::Pool { token_out } => {
          ensure!(token_out != coin.asset, Error::<T>::PumpTokenMatchesBudget)
        }
      }
      let epoch_secs = T::EpochInfo::epoch_duration_secs(&epoch_identifier)
        .ok_or(Error::<T>::UnknownEpochIdentifier)?;
      let ticks = pump::ticks_per_epoch(epoch_secs, T::ExpectedBlockTimeMs::get());
      ensure!(ticks > 0, Error::<T>::ZeroTicks);
      ensure!(num_pumps <= ticks, Error::<T>::TooManyPumps);

      let params = PumpParams {
        num_top_targets,
        num_pumps,
        pump_distr,
        epoch_budget: 0,
        epoch_budget_left: 0,
        target,
      };
      let stream = Self::register_stream(
        Coins::single(coin.asset, coin.amount),
        DistributionTarget::Pump(params),
        start_time,
        epoch_identifier,
        num_epochs_paid_over,
        false,
      )?;
      Self::deposit_event(Event::PumpStreamCreated {
        stream_id: stream.id,
        coin,
        start_time: stream.start_time,
        epoch_identifier: stream.distr_epoch_identifier,
        num_epochs_paid_over: stream.num_epochs_paid_over,
        params,
      });
      Ok(())
    }

    /// Stop an upcoming or active stream. Undistributed coins stay on the
    /// module account.
    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::terminate_stream())]
    pub fn terminate_stream(origin: OriginFor<T>, stream_id: StreamId) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      let mut stream = Streams::<T>::get(stream_id).ok_or(Error::<T>::StreamNotFound)?;
      match Self::stream_status(stream_id) {
        Some(StreamStatus::Upcoming) => {
          UpcomingStreams::<T>::mutate(|ids| remove_id(ids, stream_id))
        }
        Some(StreamStatus::Active) => ActiveStreams::<T>::mutate(|ids| remove_id(ids, stream_id)),
        _ => return Err(Error::<T>::StreamNotLive.into()),
      }
      stream.epoch_coins = Coins::new();
      Streams::<T>::insert(stream_id, &stream);
      Self::deposit_event(Event::StreamTerminated {
        stream_id,
        distributed: stream.distributed_coins,
      });
      Ok(())
    }

    /// Replace the whole gauge table of a live, non-sponsored stream.
    #[pallet::call_index(3)]
    #[pallet::weight(T::WeightInfo::replace_stream_distribution(records.len() as u32))]
    pub fn replace_stream_distribution(
      origin: OriginFor<T>,
      stream_id: StreamId,
      records: BoundedVec<DistrRecord, MaxDistrRecords>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      let mut stream = Self::editable_stream(stream_id)?;
      let info = DistrInfo::new(records.into_inner()).map_err(Error::<T>::from)?;
      ensure!(info.total_weight > 0, Error::<T>::ZeroTotalWeight);
      Self::ensure_gauges_exist(&info.records)?;

      let total_weight = info.total_weight;
      stream.distribute_to = DistributionTarget::Gauges(info);
      Streams::<T>::insert(stream_id, &stream);
      Self::deposit_event(Event::DistributionReplaced {
        stream_id,
        total_weight,
      });
      Ok(())
    }

    /// Upsert gauge weights of a live, non-sponsored stream; a zero weight
    /// removes the gauge.
    #[pallet::call_index(4)]
    #[pallet::weight(T::WeightInfo::update_stream_distribution(records.len() as u32))]
    pub fn update_stream_distribution(
      origin: OriginFor<T>,
      stream_id: StreamId,
      records: BoundedVec<DistrRecord, MaxDistrRecords>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      let mut stream = Self::editable_stream(stream_id)?;
      let DistributionTarget::Gauges(current) = &stream.distribute_to else {
        return Err(Error::<T>::NotGaugeStream.into());
      };
      let added: Vec<DistrRecord> = records.iter().filter(|r| r.weight > 0).copied().collect();
      Self::ensure_gauges_exist(&added)?;
      let info = current.merge_updates(&records).map_err(Error::<T>::from)?;
      ensure!(info.total_weight > 0, Error::<T>::ZeroTotalWeight);

      let total_weight = info.total_weight;
      stream.distribute_to = DistributionTarget::Gauges(info);
      Streams::<T>::insert(stream_id, &stream);
      Self::deposit_event(Event::DistributionUpdated {
        stream_id,
        total_weight,
      });
      Ok(())
    }

    /// Update the per-block gauge visit cap (governance only)
    #[pallet::call_index(5)]
    #[pallet::weight(T::WeightInfo::set_max_iterations_per_block())]
    pub fn set_max_iterations_per_block(origin: OriginFor<T>, new_value: u64) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      let old_value = MaxIterationsPerBlock::<T>::get();
      MaxIterationsPerBlock::<T>::put(new_value);
      Self::deposit_event(Event::MaxIterationsUpdated {
        old_value,
        new_value,
      });
      Ok(())
    }
  }

  fn add_coin(into: &mut BTreeMap<AssetKind, Balance>, coin: Coin) {
    let entry = into.entry(coin.asset).or_default();
    *entry = entry.saturating_add(coin.amount);
  }

  fn remove_id<S: Get<u32>>(ids: &mut BoundedVec<StreamId, S>, stream_id: StreamId) {
    if let Ok(idx) = ids.binary_search(&stream_id) {
      ids.remove(idx);
    }
  }

  impl<T: Config> Pallet<T> {
    fn insert_id<S: Get<u32>>(
      ids: &mut BoundedVec<StreamId, S>,
      stream_id: StreamId,
    ) -> DispatchResult {
      if let Err(idx) = ids.binary_search(&stream_id) {
        ids
          .try_insert(idx, stream_id)
          .map_err(|_| Error::<T>::TooManyStreams)?;
      }
      Ok(())
    }

    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    fn now_secs() -> u64 {
      T::UnixTime::now().as_secs()
    }

    pub fn stream_status(stream_id: StreamId) -> Option<StreamStatus> {
      if !Streams::<T>::contains_key(stream_id) {
        return None;
      }
      if UpcomingStreams::<T>::get().binary_search(&stream_id).is_ok() {
        Some(StreamStatus::Upcoming)
      } else if ActiveStreams::<T>::get().binary_search(&stream_id).is_ok() {
        Some(StreamStatus::Active)
      } else {
        Some(StreamStatus::Finished)
      }
    }

    fn live_stream_ids() -> Vec<StreamId> {
      let mut ids = UpcomingStreams::<T>::get().into_inner();
      ids.extend(ActiveStreams::<T>::get());
      ids
    }

    /// Coins live streams have yet to pay out.
    pub fn module_to_distribute_coins() -> Result<Coins, DispatchError> {
      let mut total = Coins::new();
      for stream in Self::live_stream_ids().into_iter().filter_map(Streams::<T>::get) {
        let remaining = stream.remaining_coins().map_err(Error::<T>::from)?;
        total.try_add_all(&remaining).map_err(Error::<T>::from)?;
      }
      Ok(total)
    }

    /// Coins every stream, finished ones included, has paid out so far.
    pub fn module_distributed_coins() -> Result<Coins, DispatchError> {
      let mut total = Coins::new();
      for stream in Streams::<T>::iter_values() {
        total
          .try_add_all(&stream.distributed_coins)
          .map_err(Error::<T>::from)?;
      }
      Ok(total)
    }

    fn ensure_gauges_exist(records: &[DistrRecord]) -> DispatchResult {
      for record in records {
        ensure!(
          T::GaugeRegistry::gauge_exists(record.gauge_id),
          Error::<T>::GaugeNotFound
        );
      }
      Ok(())
    }

    fn editable_stream(stream_id: StreamId) -> Result<Stream, DispatchError> {
      let stream = Streams::<T>::get(stream_id).ok_or(Error::<T>::StreamNotFound)?;
      ensure!(
        Self::stream_status(stream_id) != Some(StreamStatus::Finished),
        Error::<T>::StreamNotLive
      );
      ensure!(
        matches!(stream.distribute_to, DistributionTarget::Gauges(_)),
        Error::<T>::NotGaugeStream
      );
      ensure!(!stream.sponsored, Error::<T>::StreamIsSponsored);
      Ok(stream)
    }

    /// Validates the common stream parameters, checks funding and stores the
    /// stream as upcoming.
    fn register_stream(
      coins: Coins,
      distribute_to: DistributionTarget,
      start_time: Option<u64>,
      epoch_identifier: EpochIdentifier,
      num_epochs_paid_over: u64,
      sponsored: bool,
    ) -> Result<Stream, DispatchError> {
      ensure!(!coins.is_empty(), Error::<T>::ZeroCoins);
      ensure!(num_epochs_paid_over > 0, Error::<T>::ZeroEpochs);
      ensure!(
        T::EpochInfo::epoch_duration_secs(&epoch_identifier).is_some(),
        Error::<T>::UnknownEpochIdentifier
      );
      let live = UpcomingStreams::<T>::get()
        .len()
        .saturating_add(ActiveStreams::<T>::get().len());
      ensure!(
        live < T::MaxStreams::get() as usize,
        Error::<T>::TooManyStreams
      );

      let account = Self::account_id();
      let committed = Self::module_to_distribute_coins()?;
      for coin in coins.iter() {
        let needed = committed
          .amount_of(coin.asset)
          .checked_add(coin.amount)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
        ensure!(
          T::AssetLedger::balance(&account, coin.asset) >= needed,
          Error::<T>::InsufficientModuleBalance
        );
      }

      let now = Self::now_secs();
      let stream_id = LastStreamId::<T>::get()
        .checked_add(1)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
      let stream = Stream {
        id: stream_id,
        distribute_to,
        coins,
        start_time: start_time.unwrap_or(now).max(now),
        distr_epoch_identifier: epoch_identifier,
        num_epochs_paid_over,
        filled_epochs: 0,
        distributed_coins: Coins::new(),
        sponsored,
        epoch_coins: Coins::new(),
      };
      UpcomingStreams::<T>::try_mutate(|ids| Self::insert_id(ids, stream_id))?;
      LastStreamId::<T>::put(stream_id);
      Streams::<T>::insert(stream_id, &stream);
      Ok(stream)
    }

    /// Closes the epoch `epoch_identifier` and opens the next one: finishes
    /// crediting the old epoch, counts it as filled, activates due streams
    /// and computes every matching stream's new payout. Returns the coins the
    /// final drain credited.
    pub fn after_epoch_end(epoch_identifier: &[u8]) -> Result<Coins, DispatchError> {
      Self::end_epoch(epoch_identifier).map(|(distributed, _)| distributed)
    }

    /// Weight of an epoch boundary over `streams` live streams whose final
    /// drain took `drained_steps` gauge steps.
    fn epoch_end_weight(streams: usize, drained_steps: u64) -> Weight {
      T::WeightInfo::after_epoch_end(streams as u32)
        .saturating_add(T::WeightInfo::distribute_gauge().saturating_mul(drained_steps))
    }

    /// [`Self::after_epoch_end`], also returning the steps of the final drain.
    fn end_epoch(epoch_identifier: &[u8]) -> Result<(Coins, u64), DispatchError> {
      let identifier = EpochIdentifier::try_from(epoch_identifier.to_vec())
        .map_err(|_| Error::<T>::UnknownEpochIdentifier)?;

      let mut distributed = Coins::new();
      let mut drained_steps: u64 = 0;
      if let Some(pointer) = EpochPointers::<T>::get(&identifier) {
        let snapshot = Self::gauge_snapshot();
        let (_, steps, credited) = Self::distribute_along(pointer, &snapshot, u64::MAX);
        distributed = credited;
        drained_steps = steps;
      }

      for stream_id in ActiveStreams::<T>::get() {
        let Some(mut stream) = Streams::<T>::get(stream_id) else {
          continue;
        };
        if stream.distr_epoch_identifier != identifier || stream.epoch_coins.is_empty() {
          continue;
        }
        stream.filled_epochs = stream.filled_epochs.saturating_add(1);
        stream.epoch_coins = Coins::new();
        Streams::<T>::insert(stream_id, &stream);
        if stream.is_filled() {
          ActiveStreams::<T>::mutate(|ids| remove_id(ids, stream_id));
          Self::deposit_event(Event::StreamFinished {
            stream_id,
            distributed: stream.distributed_coins,
          });
        }
      }

      let now = Self::now_secs();
      for stream_id in UpcomingStreams::<T>::get() {
        let due = Streams::<T>::get(stream_id).is_some_and(|s| s.start_time <= now);
        if !due {
          continue;
        }
        ActiveStreams::<T>::try_mutate(|ids| Self::insert_id(ids, stream_id))?;
        UpcomingStreams::<T>::mutate(|ids| remove_id(ids, stream_id));
        Self::deposit_event(Event::StreamActivated { stream_id });
      }

      for stream_id in ActiveStreams::<T>::get() {
        let Some(mut stream) = Streams::<T>::get(stream_id) else {
          continue;
        };
        if stream.distr_epoch_identifier != identifier {
          continue;
        }
        match distribution::start_epoch(&mut stream, T::VotingSnapshot::distribution) {
          Ok(epoch_coins) => {
            Streams::<T>::insert(stream_id, &stream);
            Self::deposit_event(Event::EpochStarted {
              stream_id,
              epoch_coins,
            });
          }
          Err(e) => {
            let error: DispatchError = Error::<T>::from(e).into();
            log::error!(
              target: LOG_TARGET,
              "stream {stream_id} skips epoch {:?}: {error:?}",
              identifier,
            );
            Self::deposit_event(Event::EpochPayoutSkipped { stream_id, error });
          }
        }
      }

      let mut pointer = EpochPointer::new(identifier.clone());
      pointer.set_to_first_gauge();
      EpochPointers::<T>::insert(&identifier, pointer);
      Self::deposit_event(Event::EpochDistributionStarted {
        epoch_identifier: identifier,
        distributed: distributed.clone(),
      });
      Ok((distributed, drained_steps))
    }

    /// Active gauge streams with an epoch in progress, ascending by id.
    fn gauge_snapshot() -> Vec<Stream> {
      ActiveStreams::<T>::get()
        .into_iter()
        .filter_map(Streams::<T>::get)
        .filter(|s| {
          matches!(s.distribute_to, DistributionTarget::Gauges(_)) && !s.epoch_coins.is_empty()
        })
        .collect()
    }

    fn steps_within(available: Weight, per_step: Weight) -> u64 {
      let by_time = available
        .ref_time()
        .checked_div(per_step.ref_time())
        .unwrap_or(u64::MAX);
      let by_proof = available
        .proof_size()
        .checked_div(per_step.proof_size())
        .unwrap_or(u64::MAX);
      by_time.min(by_proof)
    }

    /// Advances every unfinished epoch pointer within `budget` steps.
    fn distribute_pending(budget: u64) -> u64 {
      let pointers: Vec<EpochPointer> = EpochPointers::<T>::iter_values()
        .filter(|p| !p.is_exhausted())
        .collect();
      if pointers.is_empty() {
        return 0;
      }

      let snapshot = Self::gauge_snapshot();
      let mut iterations: u64 = 0;
      for pointer in pointers {
        let left = budget.saturating_sub(iterations);
        if left == 0 {
          break;
        }
        let key = pointer.epoch_identifier.clone();
        let (next, steps, _) = Self::distribute_along(pointer, &snapshot, left);
        EpochPointers::<T>::insert(&key, next);
        iterations = iterations.saturating_add(steps);
      }

      log::debug!(target: LOG_TARGET, "credited gauges in {iterations}/{budget} steps");
      Self::deposit_event(Event::EndBlockIterations {
        iterations,
        max_iterations: budget,
      });
      iterations
    }

    /// Credits gauges from `pointer` onwards and writes the credited totals
    /// back to their streams. A visit costs one step per paid asset; a visit
    /// that does not fit in what is left of `max_steps` is not made and the
    /// pointer stays on it.
    fn distribute_along(
      pointer: EpochPointer,
      snapshot: &[Stream],
      max_steps: u64,
    ) -> (EpochPointer, u64, Coins) {
      let account = Self::account_id();
      let mut credited: BTreeMap<StreamId, Coins> = BTreeMap::new();

      let mut consumed: u64 = 0;
      let (pointer, steps) =
        iterate_epoch_pointer(pointer, snapshot, max_steps, |(stream, record)| {
          let weight = (stream.epoch_coins.len() as u64).max(1);
          if weight > max_steps.saturating_sub(consumed) {
            return Step::stop(0);
          }
          consumed = consumed.saturating_add(weight);
          let already = credited.get(&stream.id).cloned().unwrap_or_default();
          let result = with_storage_layer(|| {
            let left = stream
              .remaining_coins()
              .and_then(|r| r.checked_sub(&already))
              .map_err(Error::<T>::from)?;
            Self::distribute_to_gauge(&account, stream, record, &left)
          });
          match result {
            Ok(rewards) => {
              let entry = credited.entry(stream.id).or_default();
              if let Err(e) = entry.try_add_all(&rewards) {
                log::error!(target: LOG_TARGET, "stream {} credit overflow: {e:?}", stream.id);
              }
            }
            Err(error) => {
              log::error!(
                target: LOG_TARGET,
                "stream {} skips gauge {}: {error:?}",
                stream.id,
                record.gauge_id,
              );
              Self::deposit_event(Event::GaugeSkipped {
                stream_id: stream.id,
                gauge_id: record.gauge_id,
                error,
              });
            }
          }
          Step::proceed(weight)
        });

      let mut total = Coins::new();
      for (stream_id, coins) in credited {
        if let Err(e) = total.try_add_all(&coins) {
          log::error!(target: LOG_TARGET, "epoch total overflow at stream {stream_id}: {e:?}");
        }
        Streams::<T>::mutate(stream_id, |maybe_stream| {
          if let Some(stream) = maybe_stream {
            if let Err(e) = stream.distributed_coins.try_add_all(&coins) {
              log::error!(target: LOG_TARGET, "stream {stream_id} distributed overflow: {e:?}");
            }
          }
        });
      }
      (pointer, steps, total)
    }

    fn distribute_to_gauge(
      account: &T::AccountId,
      stream: &Stream,
      record: DistrRecord,
      left: &Coins,
    ) -> Result<Coins, DispatchError> {
      ensure!(
        T::GaugeRegistry::gauge_exists(record.gauge_id),
        Error::<T>::GaugeNotFound
      );
      let DistributionTarget::Gauges(info) = &stream.distribute_to else {
        return Err(Error::<T>::NotGaugeStream.into());
      };
      let rewards = distribution::gauge_rewards(&stream.epoch_coins, &record, info.total_weight);
      ensure!(rewards.is_all_lte(left), Error::<T>::StreamBudgetExceeded);
      for coin in rewards.iter() {
        T::GaugeRegistry::add_rewards(account, record.gauge_id, *coin)?;
      }
      Ok(rewards)
    }

    /// Voting snapshot resolved to pump targets, heaviest `top_n` first.
    /// Gauges sharing a target pool their weight.
    fn ranked_targets(top_n: u32) -> Vec<(u64, u128)> {
      let mut by_target: BTreeMap<u64, u128> = BTreeMap::new();
      for (gauge_id, weight) in T::VotingSnapshot::distribution() {
        if let Some(target_id) = T::GaugeRegistry::pump_target_of(gauge_id) {
          let entry = by_target.entry(target_id).or_default();
          *entry = entry.saturating_add(weight);
        }
      }
      pump::top_targets(by_target.into_iter().collect(), top_n)
    }

    /// Runs one block's pump for `stream_id` and adds what it bought to
    /// `tick_acquired`. Returns the number of targets executed.
    fn pump_stream(
      stream_id: StreamId,
      entropy: &[u8; 32],
      tick_acquired: &mut BTreeMap<AssetKind, Balance>,
    ) -> u64 {
      let Some(mut stream) = Streams::<T>::get(stream_id) else {
        return 0;
      };
      let Some(params) = stream.pump_params().copied() else {
        return 0;
      };
      if stream.epoch_coins.is_empty() || params.epoch_budget_left == 0 {
        return 0;
      }
      let Some(asset) = stream.coins.iter().next().map(|c| c.asset) else {
        return 0;
      };
      let Some(epoch_secs) = T::EpochInfo::epoch_duration_secs(&stream.distr_epoch_identifier)
      else {
        log::error!(target: LOG_TARGET, "pump stream {stream_id} has an unknown epoch");
        return 0;
      };

      let ticks = pump::ticks_per_epoch(epoch_secs, T::ExpectedBlockTimeMs::get());
      match pump::should_pump(entropy, stream_id, params.num_pumps, ticks) {
        Ok(true) => {}
        Ok(false) => return 0,
        Err(e) => {
          log::error!(target: LOG_TARGET, "pump stream {stream_id} cannot decide: {e:?}");
          return 0;
        }
      }
      let amount = pump::pump_amount(entropy, stream_id, &params);
      if amount == 0 {
        return 0;
      }

      let account = Self::account_id();
      let mut spent: Balance = 0;
      let mut acquired: BTreeMap<AssetKind, Balance> = BTreeMap::new();
      let mut executed: u64 = 0;
      let pressures = match params.target {
        PumpTarget::TopTargets => {
          let pressures = pump::allocate(&Self::ranked_targets(params.num_top_targets), amount);
          for pressure in pressures.iter() {
            executed = executed.saturating_add(1);
            match with_storage_layer(|| Self::pump_target(&account, asset, pressure)) {
              Ok(coin) => {
                spent = spent.saturating_add(pressure.pressure);
                add_coin(&mut acquired, coin);
              }
              Err(error) => Self::pump_failed(stream_id, pressure.target_id, error),
            }
          }
          pressures
        }
        PumpTarget::Pool { token_out } => {
          executed = 1;
          match with_storage_layer(|| {
            T::TradeRouter::swap_exact_in(&account, asset, token_out, amount, 0)
          }) {
            Ok(out) => {
              spent = amount;
              add_coin(&mut acquired, Coin::new(token_out, out));
            }
            Err(error) => Self::pump_failed(stream_id, 0, error),
          }
          vec![]
        }
      };
      if spent == 0 {
        return executed;
      }

      if let Some(p) = stream.pump_params_mut() {
        p.epoch_budget_left = p.epoch_budget_left.saturating_sub(spent);
      }
      if let Err(e) = stream.distributed_coins.try_add(Coin::new(asset, spent)) {
        log::error!(target: LOG_TARGET, "pump stream {stream_id} distributed overflow: {e:?}");
      }
      Streams::<T>::insert(stream_id, &stream);
      for (token, amount) in acquired.iter() {
        add_coin(tick_acquired, Coin::new(*token, *amount));
      }
      Self::deposit_event(Event::Pumped {
        stream_id,
        pumped: spent,
        pressures,
        acquired: acquired
          .into_iter()
          .map(|(token, amount)| Coin::new(token, amount))
          .collect(),
      });
      executed
    }

    /// Buys one target's sale token with `pressure` of `asset`.
    fn pump_target(
      account: &T::AccountId,
      asset: AssetKind,
      pressure: &PumpPressure,
    ) -> Result<Coin, DispatchError> {
      match T::TokenSale::sale_of(pressure.target_id).ok_or(Error::<T>::SaleNotFound)? {
        SaleState::Settled { asset: token } => {
          let out = T::TradeRouter::swap_exact_in(account, asset, token, pressure.pressure, 0)?;
          Ok(Coin::new(token, out))
        }
        SaleState::Open { accepted, token } => {
          let spend = if accepted == asset {
            pressure.pressure
          } else {
            T::TradeRouter::swap_exact_in(account, asset, accepted, pressure.pressure, 0)?
          };
          let bought = T::TokenSale::buy_exact_spend(account, pressure.target_id, spend, 0)?;
          Ok(Coin::new(token, bought))
        }
      }
    }

    fn pump_failed(stream_id: StreamId, target_id: u64, error: DispatchError) {
      log::error!(
        target: LOG_TARGET,
        "pump stream {stream_id} failed on target {target_id}: {error:?}"
      );
      Self::deposit_event(Event::PumpTargetFailed {
        stream_id,
        target_id,
        error,
      });
    }

    fn burn_acquired(acquired: BTreeMap<AssetKind, Balance>) {
      let account = Self::account_id();
      let mut burned = Vec::new();
      for (asset, amount) in acquired {
        match T::AssetLedger::burn(&account, asset, amount) {
          Ok(()) => burned.push(Coin::new(asset, amount)),
          Err(error) => {
            log::error!(target: LOG_TARGET, "cannot burn {amount} of {asset:?}: {error:?}")
          }
        }
      }
      if !burned.is_empty() {
        Self::deposit_event(Event::Burned { coins: burned });
      }
    }

    /// Pressure every active top-target pump stream would put on each target
    /// if it spent its remaining epoch budget now, summed per target.
    pub fn pump_pressure() -> Vec<PumpPressure> {
      let lists: Vec<Vec<PumpPressure>> = ActiveStreams::<T>::get()
        .into_iter()
        .filter_map(Streams::<T>::get)
        .filter(|s| !s.epoch_coins.is_empty())
        .filter_map(|s| {
          let params = s.pump_params()?;
          if params.target != PumpTarget::TopTargets {
            return None;
          }
          let mut list = pump::allocate(
            &Self::ranked_targets(params.num_top_targets),
            params.epoch_budget_left,
          );
          list.sort_by_key(|p| p.target_id);
          Some(list)
        })
        .collect();
      merge_ranked(&lists)
    }
  }

  impl<T: Config> EpochHooks for Pallet<T> {
    fn after_epoch_end(epoch_identifier: &[u8]) -> Weight {
      let streams = Self::live_stream_ids().len();
      let drained_steps = match Self::end_epoch(epoch_identifier) {
        Ok((_, steps)) => steps,
        Err(error) => {
          log::error!(target: LOG_TARGET, "epoch end failed: {error:?}");
          0
        }
      };
      Self::epoch_end_weight(streams, drained_steps)
    }
  }

  /// Genesis configuration: ensures the pallet account is ED-free
  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    #[serde(skip)]
    pub _marker: core::marker::PhantomData<T>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      frame_system::Pallet::<T>::inc_providers(&Pallet::<T>::account_id());
    }
  }
}
