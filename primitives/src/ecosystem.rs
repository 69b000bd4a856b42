//! Ecosystem Constants
//!
//! System-level constants shared by runtime configurations: pallet ids,
//! epoch cadences and the defaults the streamer pallet is configured with.

/// Balance type alias for consistency across ecosystem
pub type Balance = u128;

/// Pallet identifiers for deriving pallet-owned accounts.
///
/// Used with `PalletId::into_account_truncating()` to derive module accounts.
pub mod pallet_ids {
  /// Streamer pallet ID (holds stream funds and pump proceeds)
  pub const STREAMER_PALLET_ID: &[u8; 8] = b"streamer";
}

/// Well-known epoch identifiers and their wall-clock durations.
pub mod epochs {
  pub const HOUR: &[u8] = b"hour";
  pub const DAY: &[u8] = b"day";
  pub const WEEK: &[u8] = b"week";

  pub const HOUR_SECS: u64 = 60 * 60;
  pub const DAY_SECS: u64 = 24 * HOUR_SECS;
  pub const WEEK_SECS: u64 = 7 * DAY_SECS;

  /// Duration in seconds of a well-known epoch identifier.
  pub fn duration_secs(identifier: &[u8]) -> Option<u64> {
    match identifier {
      HOUR => Some(HOUR_SECS),
      DAY => Some(DAY_SECS),
      WEEK => Some(WEEK_SECS),
      _ => None,
    }
  }
}

/// Ecosystem parameters shared by pallet configurations.
pub mod params {
  /// Expected block production interval in milliseconds (6s blocks).
  ///
  /// Pump decisions derive the number of blocks in an epoch from this value.
  pub const EXPECTED_BLOCK_TIME_MS: u64 = 6_000;

  /// Default cap on gauge visits the streamer performs in one block.
  pub const STREAMER_MAX_ITERATIONS_PER_BLOCK: u64 = 100;
}
