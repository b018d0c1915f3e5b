use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "GHS";
pub const CURRENCY_SYMBOL: &str = "₵";

const PESEWAS_PER_CEDI: i64 = 100;

//--------------------------------------     Pesewas       ---------------------------------------------------------
/// A signed amount of money in the minor currency unit (1 cedi = 100 pesewas).
///
/// All balances, prices and ledger amounts are carried as whole pesewas so that arithmetic stays exact.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Pesewas(i64);

op!(binary Pesewas, Add, add);
op!(binary Pesewas, Sub, sub);
op!(inplace Pesewas, AddAssign, add_assign);
op!(inplace Pesewas, SubAssign, sub_assign);
op!(unary Pesewas, Neg, neg);

impl Sum for Pesewas {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented in pesewas: {0}")]
pub struct PesewasConversionError(String);

impl From<i64> for Pesewas {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Pesewas {
    type Error = PesewasConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(PesewasConversionError(format!("Value {value} is too large to convert to Pesewas")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

/// Parses a decimal cedi amount, e.g. `"12.5"` or `"-0.75"`, into pesewas. At most two decimal places are accepted.
impl FromStr for Pesewas {
    type Err = PesewasConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        let invalid = || PesewasConversionError(format!("'{s}' is not a valid cedi amount"));
        if whole.is_empty() || frac.len() > 2 || !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole = whole.parse::<i64>().map_err(|_| invalid())?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<i64>().map_err(|_| invalid())?,
        };
        let value = whole.checked_mul(PESEWAS_PER_CEDI).and_then(|v| v.checked_add(frac)).ok_or_else(invalid)?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Display for Pesewas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_cedi = PESEWAS_PER_CEDI.unsigned_abs();
        write!(f, "{sign}{CURRENCY_SYMBOL}{}.{:02}", abs / per_cedi, abs % per_cedi)
    }
}

impl Pesewas {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cedis(cedis: i64) -> Self {
        Self(cedis * PESEWAS_PER_CEDI)
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Line price for `quantity` units at this unit price. `None` if the result does not fit.
    pub fn checked_mul(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Sums the amounts, returning `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Option<Self> {
        amounts.into_iter().try_fold(Self::default(), Self::checked_add)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Pesewas::from(0).to_string(), "₵0.00");
        assert_eq!(Pesewas::from(5).to_string(), "₵0.05");
        assert_eq!(Pesewas::from_cedis(30).to_string(), "₵30.00");
        assert_eq!(Pesewas::from(-1_250).to_string(), "-₵12.50");
    }

    #[test]
    fn arithmetic() {
        let mut a = Pesewas::from_cedis(200);
        a -= Pesewas::from_cedis(60);
        assert_eq!(a, Pesewas::from_cedis(140));
        a += Pesewas::from_cedis(30);
        assert_eq!(a, Pesewas::from_cedis(170));
        assert_eq!(Pesewas::from_cedis(30).checked_mul(2), Some(Pesewas::from_cedis(60)));
        assert_eq!(-Pesewas::from(10), Pesewas::from(-10));
        let total: Pesewas = [10, 20, 30].into_iter().map(Pesewas::from).sum();
        assert_eq!(total, Pesewas::from(60));
        assert_eq!(Pesewas::from(-45).abs(), Pesewas::from(45));
    }

    #[test]
    fn overflow_is_reported() {
        let price = Pesewas::from(1 << 32);
        assert_eq!(price.checked_mul(1 << 32), None);
        assert_eq!(price.checked_mul(-(1 << 32)), None);
        assert_eq!(Pesewas::from(i64::MAX).checked_add(Pesewas::from(1)), None);
        let amounts = [Pesewas::from(i64::MAX - 10), Pesewas::from(5), Pesewas::from(6)];
        assert_eq!(Pesewas::checked_sum(amounts), None);
        assert_eq!(Pesewas::checked_sum(amounts[..2].to_vec()), Some(Pesewas::from(i64::MAX - 5)));
        assert_eq!(Pesewas::checked_sum(Vec::new()), Some(Pesewas::default()));
    }

    #[test]
    fn parse_cedi_amounts() {
        assert_eq!("30".parse::<Pesewas>().unwrap(), Pesewas::from(3_000));
        assert_eq!("12.5".parse::<Pesewas>().unwrap(), Pesewas::from(1_250));
        assert_eq!("-0.75".parse::<Pesewas>().unwrap(), Pesewas::from(-75));
        assert!("1.234".parse::<Pesewas>().is_err());
        assert!("abc".parse::<Pesewas>().is_err());
        assert!(".5".parse::<Pesewas>().is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(Pesewas::try_from(500u64).unwrap(), Pesewas::from(500));
        assert!(Pesewas::try_from(u64::MAX).is_err());
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&Pesewas::from(6_000)).unwrap();
        assert_eq!(json, "6000");
        let v: Pesewas = serde_json::from_str("-3000").unwrap();
        assert_eq!(v, Pesewas::from(-3_000));
    }
}
