#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use core::marker::PhantomData;
use polkadot_sdk::frame_support::{
  traits::Get,
  weights::{constants::RocksDbWeight, Weight},
};

pub trait WeightInfo {
  fn create_stream(r: u32) -> Weight;
  fn create_pump_stream() -> Weight;
  fn terminate_stream() -> Weight;
  fn replace_stream_distribution(r: u32) -> Weight;
  fn update_stream_distribution(r: u32) -> Weight;
  fn set_max_iterations_per_block() -> Weight;
  fn after_epoch_end(s: u32) -> Weight;
  fn distribute_base() -> Weight;
  fn distribute_gauge() -> Weight;
  fn pump_base(s: u32) -> Weight;
  fn pump_target() -> Weight;
}

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config + crate::Config> WeightInfo for SubstrateWeight<T> {
  fn create_stream(r: u32) -> Weight {
    let live = u64::from(T::MaxStreams::get());
    Weight::from_parts(30_000_000, 3000)
      .saturating_add(Weight::from_parts(150_000, 16).saturating_mul(u64::from(r)))
      .saturating_add(T::DbWeight::get().reads(live.saturating_add(u64::from(r)).saturating_add(4)))
      .saturating_add(T::DbWeight::get().writes(4))
  }

  fn create_pump_stream() -> Weight {
    let live = u64::from(T::MaxStreams::get());
    Weight::from_parts(25_000_000, 2500)
      .saturating_add(T::DbWeight::get().reads(live.saturating_add(4)))
      .saturating_add(T::DbWeight::get().writes(4))
  }

  fn terminate_stream() -> Weight {
    Weight::from_parts(18_000_000, 1500)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn replace_stream_distribution(r: u32) -> Weight {
    Weight::from_parts(20_000_000, 2000)
      .saturating_add(Weight::from_parts(150_000, 16).saturating_mul(u64::from(r)))
      .saturating_add(T::DbWeight::get().reads(u64::from(r).saturating_add(1)))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn update_stream_distribution(r: u32) -> Weight {
    Weight::from_parts(22_000_000, 2000)
      .saturating_add(Weight::from_parts(200_000, 16).saturating_mul(u64::from(r)))
      .saturating_add(T::DbWeight::get().reads(u64::from(r).saturating_add(1)))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn set_max_iterations_per_block() -> Weight {
    Weight::from_parts(8_000_000, 600)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn after_epoch_end(s: u32) -> Weight {
    let streams = u64::from(s);
    Weight::from_parts(40_000_000, 4000)
      .saturating_add(Weight::from_parts(3_000_000, 600).saturating_mul(streams))
      .saturating_add(T::DbWeight::get().reads(streams.saturating_mul(2).saturating_add(4)))
      .saturating_add(T::DbWeight::get().writes(streams.saturating_add(3)))
  }

  fn distribute_base() -> Weight {
    Weight::from_parts(10_000_000, 1000)
      .saturating_add(T::DbWeight::get().reads(2))
  }

  fn distribute_gauge() -> Weight {
    Weight::from_parts(15_000_000, 1200)
      .saturating_add(T::DbWeight::get().reads(2))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn pump_base(s: u32) -> Weight {
    let streams = u64::from(s);
    Weight::from_parts(5_000_000, 500)
      .saturating_add(Weight::from_parts(2_000_000, 300).saturating_mul(streams))
      .saturating_add(T::DbWeight::get().reads(streams.saturating_add(1)))
  }

  fn pump_target() -> Weight {
    Weight::from_parts(70_000_000, 2600)
      .saturating_add(T::DbWeight::get().reads(4))
      .saturating_add(T::DbWeight::get().writes(4))
  }
}

impl WeightInfo for () {
  fn create_stream(r: u32) -> Weight {
    Weight::from_parts(30_000_000u64.saturating_add(u64::from(r).saturating_mul(150_000)), 3000)
  }
  fn create_pump_stream() -> Weight { Weight::from_parts(25_000_000, 2500) }
  fn terminate_stream() -> Weight { Weight::from_parts(18_000_000, 1500) }
  fn replace_stream_distribution(r: u32) -> Weight {
    Weight::from_parts(20_000_000u64.saturating_add(u64::from(r).saturating_mul(150_000)), 2000)
  }
  fn update_stream_distribution(r: u32) -> Weight {
    Weight::from_parts(22_000_000u64.saturating_add(u64::from(r).saturating_mul(200_000)), 2000)
  }
  fn set_max_iterations_per_block() -> Weight { Weight::from_parts(8_000_000, 600) }
  fn after_epoch_end(s: u32) -> Weight {
    Weight::from_parts(40_000_000u64.saturating_add(u64::from(s).saturating_mul(3_000_000)), 4000)
  }
  fn distribute_base() -> Weight { Weight::from_parts(10_000_000, 1000) }
  fn distribute_gauge() -> Weight { Weight::from_parts(15_000_000, 1200) }
  fn pump_base(s: u32) -> Weight {
    Weight::from_parts(5_000_000u64.saturating_add(u64::from(s).saturating_mul(2_000_000)), 500)
  }
  fn pump_target() -> Weight { Weight::from_parts(70_000_000, 2600) }
}
