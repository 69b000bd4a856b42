extern crate alloc;

use crate::*;
use crate::types::{
  AssetKind, Coin, DistrRecord, EpochIdentifier, MaxCoins, MaxDistrRecords, PumpDistr, PumpTarget,
};
use alloc::vec::Vec;
use polkadot_sdk::frame_benchmarking::v2::*;
use polkadot_sdk::frame_support::{BoundedVec, traits::{Get, Hooks}};
use polkadot_sdk::frame_support::weights::Weight;
use polkadot_sdk::frame_system::RawOrigin;
use primitives::epochs::{DAY, HOUR};

const BUDGET_ASSET: AssetKind = AssetKind::Local(1);
const PUMP_TOKEN: AssetKind = AssetKind::Local(2);
const STREAM_AMOUNT: u128 = 1_000_000_000_000;

fn ident(id: &[u8]) -> EpochIdentifier {
  EpochIdentifier::truncate_from(id.to_vec())
}

fn coins(amount: u128) -> BoundedVec<Coin, MaxCoins> {
  BoundedVec::truncate_from(alloc::vec![Coin::new(BUDGET_ASSET, amount)])
}

/// Registers gauges `1..=n` and returns an equal-weight table over them.
fn gauges<T: Config>(n: u32) -> BoundedVec<DistrRecord, MaxDistrRecords> {
  let records: Vec<DistrRecord> = (1..=u64::from(n))
    .map(|gauge_id| {
      T::BenchmarkHelper::create_gauge(gauge_id).expect("Failed to create gauge");
      DistrRecord {
        gauge_id,
        weight: 1,
      }
    })
    .collect();
  BoundedVec::truncate_from(records)
}

fn fund<T: Config>(amount: u128) {
  T::BenchmarkHelper::fund(&Pallet::<T>::account_id(), BUDGET_ASSET, amount)
    .expect("Failed to fund streamer");
}

fn gauge_stream<T: Config>(records: BoundedVec<DistrRecord, MaxDistrRecords>) {
  fund::<T>(STREAM_AMOUNT);
  Pallet::<T>::create_stream(
    RawOrigin::Root.into(),
    coins(STREAM_AMOUNT),
    records,
    None,
    ident(DAY),
    4,
    false,
  )
  .expect("Failed to create stream");
}

#[benchmarks]
mod benches {
  use super::*;

  #[benchmark]
  fn create_stream(r: Linear<1, { MaxDistrRecords::get() }>) {
    let records = gauges::<T>(r);
    fund::<T>(STREAM_AMOUNT);

    #[extrinsic_call]
    create_stream(
      RawOrigin::Root,
      coins(STREAM_AMOUNT),
      records,
      None,
      ident(DAY),
      4,
      false,
    );

    assert_eq!(LastStreamId::<T>::get(), 1);
  }

  #[benchmark]
  fn create_pump_stream() {
    fund::<T>(STREAM_AMOUNT);

    #[extrinsic_call]
    create_pump_stream(
      RawOrigin::Root,
      Coin::new(BUDGET_ASSET, STREAM_AMOUNT),
      None,
      ident(HOUR),
      4,
      10,
      5,
      PumpDistr::Exponential,
      PumpTarget::TopTargets,
    );

    assert_eq!(LastStreamId::<T>::get(), 1);
  }

  #[benchmark]
  fn terminate_stream() {
    gauge_stream::<T>(gauges::<T>(1));

    #[extrinsic_call]
    terminate_stream(RawOrigin::Root, 1);

    assert!(UpcomingStreams::<T>::get().is_empty());
  }

  #[benchmark]
  fn replace_stream_distribution(r: Linear<1, { MaxDistrRecords::get() }>) {
    let records = gauges::<T>(r);
    gauge_stream::<T>(BoundedVec::truncate_from(alloc::vec![records[0]]));

    #[extrinsic_call]
    replace_stream_distribution(RawOrigin::Root, 1, records);
  }

  #[benchmark]
  fn update_stream_distribution(r: Linear<1, { MaxDistrRecords::get() }>) {
    let records = gauges::<T>(r);
    gauge_stream::<T>(BoundedVec::truncate_from(alloc::vec![records[0]]));
    let updates: Vec<DistrRecord> = records
      .iter()
      .map(|record| DistrRecord {
        gauge_id: record.gauge_id,
        weight: 2,
      })
      .collect();

    #[extrinsic_call]
    update_stream_distribution(RawOrigin::Root, 1, BoundedVec::truncate_from(updates));
  }

  #[benchmark]
  fn set_max_iterations_per_block() {
    #[extrinsic_call]
    set_max_iterations_per_block(RawOrigin::Root, 50);

    assert_eq!(MaxIterationsPerBlock::<T>::get(), 50);
  }

  #[benchmark]
  fn after_epoch_end(s: Linear<1, { T::MaxStreams::get() }>) {
    let records = gauges::<T>(1);
    for _ in 0..s {
      gauge_stream::<T>(records.clone());
    }

    #[block]
    {
      Pallet::<T>::after_epoch_end(DAY).expect("Failed to end epoch");
    }

    assert_eq!(ActiveStreams::<T>::get().len() as u32, s);
  }

  #[benchmark]
  fn distribute_base() {
    gauge_stream::<T>(gauges::<T>(1));
    Pallet::<T>::after_epoch_end(DAY).expect("Failed to end epoch");

    #[block]
    {
      Pallet::<T>::on_idle(
        polkadot_sdk::frame_system::Pallet::<T>::block_number(),
        T::WeightInfo::distribute_base(),
      );
    }
  }

  #[benchmark]
  fn distribute_gauge() {
    gauge_stream::<T>(gauges::<T>(1));
    Pallet::<T>::after_epoch_end(DAY).expect("Failed to end epoch");

    #[block]
    {
      Pallet::<T>::on_idle(
        polkadot_sdk::frame_system::Pallet::<T>::block_number(),
        Weight::from_parts(u64::MAX, u64::MAX),
      );
    }

    let pointer = EpochPointers::<T>::get(ident(DAY)).expect("pointer is set at epoch end");
    assert!(pointer.is_exhausted());
  }

  #[benchmark]
  fn pump_base(s: Linear<1, { T::MaxStreams::get() }>) {
    let records = gauges::<T>(1);
    for _ in 0..s {
      gauge_stream::<T>(records.clone());
    }
    Pallet::<T>::after_epoch_end(DAY).expect("Failed to end epoch");

    #[block]
    {
      Pallet::<T>::on_initialize(polkadot_sdk::frame_system::Pallet::<T>::block_number());
    }
  }

  #[benchmark]
  fn pump_target() {
    T::BenchmarkHelper::create_pool(BUDGET_ASSET, PUMP_TOKEN).expect("Failed to create pool");
    fund::<T>(STREAM_AMOUNT);
    let ticks = pump::ticks_per_epoch(
      primitives::epochs::HOUR_SECS,
      T::ExpectedBlockTimeMs::get(),
    );
    Pallet::<T>::create_pump_stream(
      RawOrigin::Root.into(),
      Coin::new(BUDGET_ASSET, STREAM_AMOUNT),
      None,
      ident(HOUR),
      4,
      ticks,
      0,
      PumpDistr::Uniform,
      PumpTarget::Pool {
        token_out: PUMP_TOKEN,
      },
    )
    .expect("Failed to create pump stream");
    Pallet::<T>::after_epoch_end(HOUR).expect("Failed to end epoch");

    #[block]
    {
      Pallet::<T>::on_initialize(polkadot_sdk::frame_system::Pallet::<T>::block_number());
    }
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
