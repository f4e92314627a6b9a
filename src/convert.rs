//! Type-conversion traits (C3): the recursive `T -> base_type` chain that
//! terminates at a basic exchange type (invariant I6).
//!
//! Mirrors `soci::type_conversion<T>` (`core/type-conversion-traits.h`):
//! `from_base` decodes base -> T (possibly raising on an unexpected null),
//! `to_base` encodes T -> base (possibly marking the indicator null).

use crate::error::Error;
use crate::kind::Indicator;

/// Implemented once per user type that needs to cross the wire as something
/// other than its own representation. `Base` may itself require a
/// `TypeConversion` impl, producing a finite chain (I6) that the
/// [`crate::exchange::Exchange`] blanket impl for [`crate::exchange::UserExchange`]
/// walks to find the terminal wire kind.
pub trait TypeConversion {
  type Base;

  /// Decode a value read back from the backend (`base_in`) into `Self`.
  /// `indicator_in` is `Indicator::Null` when the backend reported no value;
  /// implementations for types with no null representation of their own
  /// must raise rather than fabricate a value (matches the default
  /// `type_conversion<T>::from_base` in the C++ original, which throws
  /// `soci_error("Null value not allowed for this type")`).
  fn from_base(base_in: &Self::Base, indicator_in: Indicator) -> Result<Self, Error>
  where
    Self: Sized;

  /// Encode `self` into the wire representation `base_out`, optionally
  /// marking `indicator_out` null. Implementations for types with no null
  /// state leave the indicator untouched (it defaults to `Ok`).
  fn to_base(&self, base_out: &mut Self::Base, indicator_out: &mut Indicator);
}

/// Marker opting a `TypeConversion` impl into [`crate::exchange::Exchange`]
/// dispatch as a user type. See `exchange.rs` module docs for why this is a
/// separate trait rather than a blanket "not basic" inference.
impl<T> crate::exchange::UserExchange for T where T: TypeConversion {}

/// `Option<T>` is the canonical optional-like user type (§4.2): no
/// special-cased core logic, just a `TypeConversion` whose `to_base` sets
/// the indicator null on `None` and whose `from_base` yields `None` on a
/// null indicator instead of raising.
impl<T> TypeConversion for Option<T>
where
  T: Clone + Default,
{
  type Base = T;

  fn from_base(base_in: &T, indicator_in: Indicator) -> Result<Self, Error> {
    match indicator_in {
      Indicator::Null => Ok(None),
      Indicator::Ok | Indicator::Truncated => Ok(Some(base_in.clone())),
    }
  }

  fn to_base(&self, base_out: &mut T, indicator_out: &mut Indicator) {
    match self {
      Some(v) => {
        *base_out = v.clone();
        *indicator_out = Indicator::Ok;
      },
      None => {
        *base_out = T::default();
        *indicator_out = Indicator::Null;
      },
    }
  }
}
