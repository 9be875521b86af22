use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// An amount in integer minor units (hundredths of the currency unit).
///
/// Transaction amounts and budget limits are positive; wallet balances and
/// correction deltas may be negative. Balances are only ever moved by whole
/// minor units, so they never drift.
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!("10,5".parse::<Money>().unwrap(), Money::new(1050));
/// assert_eq!(Money::new(-5).to_string(), "-0.05");
/// assert!("12.345".parse::<Money>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

fn digits(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

impl FromStr for Money {
    type Err = EngineError;

    /// `1250`, `12.5`, `12,50`, `-3.00`: an optional sign, whole units and at
    /// most two decimals after `.` or `,`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| EngineError::InvalidAmount(format!("{reason}: {:?}", s.trim()));

        let raw = s.trim();
        let (negative, raw) = match raw.as_bytes().first() {
            Some(b'-') => (true, raw[1..].trim_start()),
            Some(b'+') => (false, raw[1..].trim_start()),
            Some(_) => (false, raw),
            None => return Err(fail("empty amount")),
        };

        let (whole, fraction) = match raw.split_once(['.', ',']) {
            Some((whole, fraction)) => (whole, fraction),
            None => (raw, ""),
        };
        let whole = digits(whole).ok_or_else(|| fail("invalid amount"))?;
        let fraction = match fraction.len() {
            0 => 0,
            1 => digits(fraction).ok_or_else(|| fail("invalid amount"))? * 10,
            2 => digits(fraction).ok_or_else(|| fail("invalid amount"))?,
            _ if digits(fraction).is_some() => return Err(fail("too many decimals")),
            _ => return Err(fail("invalid amount")),
        };

        let minor = whole
            .checked_mul(100)
            .and_then(|minor| minor.checked_add(fraction))
            .ok_or_else(|| fail("amount too large"))?;
        Ok(Money(if negative { -minor } else { minor }))
    }
}
