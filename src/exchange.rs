//! Exchange traits (C2): compile-time `T -> (family, exchange kind)` dispatch.
//!
//! `exchange_traits<T>` in the C++ original is a template specialized per
//! basic type, falling through to the user type's `base_type` chain
//! otherwise. Rust has no partial specialization, so the family/kind lookup
//! is an ordinary trait implemented once per basic type, plus a blanket impl
//! that recurses through [`crate::convert::TypeConversion`] for everything
//! else.

use crate::convert::TypeConversion;
use crate::kind::ExchangeKind;

/// Dispatch tag distinguishing basic (wire-native) types from user types that
/// need a [`TypeConversion`] hop to reach a basic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
  Basic,
  User,
}

/// Implemented for every type the core can bind as an into/use target,
/// basic or user-defined. See module docs for the basic/user split.
pub trait Exchange {
  const FAMILY: Family;
  /// The wire-level kind this type ultimately maps to. For a user type this
  /// recurses through its `TypeConversion::Base` chain (invariant I6: the
  /// chain must terminate at a basic type).
  fn kind() -> ExchangeKind;
}

macro_rules! basic_exchange {
  ($ty:ty, $kind:expr) => {
    impl Exchange for $ty {
      const FAMILY: Family = Family::Basic;
      fn kind() -> ExchangeKind {
        $kind
      }
    }
  };
}

basic_exchange!(i8, ExchangeKind::Int8);
basic_exchange!(u8, ExchangeKind::UInt8);
basic_exchange!(i16, ExchangeKind::Int16);
basic_exchange!(u16, ExchangeKind::UInt16);
basic_exchange!(i32, ExchangeKind::Int32);
basic_exchange!(u32, ExchangeKind::UInt32);
basic_exchange!(i64, ExchangeKind::Int64);
basic_exchange!(u64, ExchangeKind::UInt64);
basic_exchange!(f64, ExchangeKind::Double);
basic_exchange!(char, ExchangeKind::Char);
basic_exchange!(String, ExchangeKind::StdString);
basic_exchange!(chrono::NaiveDateTime, ExchangeKind::StdTm);
basic_exchange!(crate::blob::Blob, ExchangeKind::Blob);
basic_exchange!(crate::rowid::RowId, ExchangeKind::RowId);

/// A user type `T` is `Exchange` by virtue of a `TypeConversion<T>` impl
/// whose base type is itself `Exchange` (possibly also a user type). This is
/// the "user type family" branch of §3's exchange-traits fingerprint;
/// the blanket impl is gated behind [`crate::convert::IsUserType`] so it does
/// not collide with the basic impls above (Rust forbids overlapping blanket
/// + concrete impls without specialization, so user types opt in explicitly
/// by implementing `TypeConversion` and marking themselves via the marker
/// trait rather than the compiler inferring "not basic").
pub trait UserExchange: TypeConversion {}

impl<T> Exchange for T
where
  T: UserExchange,
  T::Base: Exchange,
{
  const FAMILY: Family = Family::User;
  fn kind() -> ExchangeKind {
    <T::Base as Exchange>::kind()
  }
}
