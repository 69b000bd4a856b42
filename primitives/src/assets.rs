use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

/// Asset identifier shared by every pallet that moves or prices tokens.
///
/// The derived `Ord` is relied upon: coin bundles keep their entries sorted by
/// `AssetKind`, so `Native` always sorts first, then `Local` ids, then `Foreign` ids.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Default,
  Encode,
  Eq,
  MaxEncodedLen,
  Ord,
  PartialEq,
  PartialOrd,
  TypeInfo,
  Serialize,
  Deserialize,
)]
pub enum AssetKind {
  /// Native token of the chain
  #[default]
  Native,
  /// Asset issued on this chain
  Local(u32),
  /// Asset bridged in from another consensus system
  Foreign(u32),
}
