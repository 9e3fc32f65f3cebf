use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Signed money amount represented as **integer cents** (KES minor units).
///
/// Use this type for **all** monetary values in the engine (balances,
/// principals, ledger amounts) to avoid floating-point drift.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount = Money::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "KES 12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!("10".parse::<Money>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<Money>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<Money>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates an amount from whole shillings.
    #[must_use]
    pub const fn from_major(shillings: i64) -> Self {
        Self(shillings * 100)
    }

    /// Returns the raw value in cents.
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

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Applies simple (non-compounding) interest: `self × (1 + rate/100)`.
    ///
    /// The product is computed exactly in `i128` and rounded half away from
    /// zero to the nearest cent.
    pub fn with_interest(self, rate: InterestRate) -> ResultEngine<Money> {
        let numerator = i128::from(self.0) * (10_000 + i128::from(rate.basis_points()));
        let mut total = numerator / 10_000;
        let remainder = numerator % 10_000;
        if remainder.abs() * 2 >= 10_000 {
            total += numerator.signum();
        }
        i64::try_from(total)
            .map(Money)
            .map_err(|_| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Parses an amount delivered by a payment provider as a JSON number.
    ///
    /// The number goes through its decimal string form, never through `f64`
    /// arithmetic.
    pub fn from_json_number(value: &serde_json::Number) -> ResultEngine<Money> {
        let raw = value.to_string();
        let trimmed = match raw.split_once('.') {
            Some((whole, frac)) => {
                let frac = frac.trim_end_matches('0');
                if frac.is_empty() {
                    whole.to_string()
                } else {
                    format!("{whole}.{frac}")
                }
            }
            None => raw,
        };
        trimmed.parse()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "KES {sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
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

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_2(s, "amount").map(Money)
    }
}

/// Simple interest rate stored as **basis points** (hundredths of a percent).
///
/// `10%` is `1000`, `12.5%` is `1250`. Rates are applied once over the life of
/// a loan, never compounded per period.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct InterestRate(i64);

impl InterestRate {
    pub const ZERO: InterestRate = InterestRate(0);

    /// Builds a rate from basis points; negative rates are rejected.
    pub fn from_basis_points(bps: i64) -> ResultEngine<Self> {
        if bps < 0 {
            return Err(EngineError::InvalidAmount(
                "interest rate must be >= 0".to_string(),
            ));
        }
        Ok(Self(bps))
    }

    /// Builds a rate from a whole percentage.
    pub fn from_percent(percent: i64) -> ResultEngine<Self> {
        let bps = percent
            .checked_mul(100)
            .ok_or_else(|| EngineError::InvalidAmount("interest rate too large".to_string()))?;
        Self::from_basis_points(bps)
    }

    #[must_use]
    pub const fn basis_points(self) -> i64 {
        self.0
    }
}

impl fmt::Display for InterestRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for InterestRate {
    type Err = EngineError;

    /// Parses a percentage such as `10`, `12.5` or `7,25` (an optional
    /// trailing `%` is accepted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().trim_end_matches('%');
        Self::from_basis_points(parse_fixed_2(raw, "interest rate")?)
    }
}

/// Parses a decimal with at most two fractional digits into hundredths.
fn parse_fixed_2(s: &str, label: &str) -> ResultEngine<i64> {
    let empty = || EngineError::InvalidAmount(format!("empty {label}"));
    let invalid = || EngineError::InvalidAmount(format!("invalid {label}"));
    let overflow = || EngineError::InvalidAmount(format!("{label} too large"));

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(empty());
    }

    let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, trimmed)
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Err(empty());
    }

    let rest = rest.replace(',', ".");
    let mut parts = rest.split('.');
    let whole_str = parts.next().ok_or_else(invalid)?;
    let frac_str = parts.next();
    if parts.next().is_some() {
        return Err(invalid());
    }

    if whole_str.is_empty() || !whole_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let whole: i64 = whole_str.parse().map_err(|_| overflow())?;

    let frac: i64 = match frac_str {
        None | Some("") => 0,
        Some(frac) => {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            match frac.len() {
                1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                2 => frac.parse::<i64>().map_err(|_| invalid())?,
                _ => {
                    return Err(EngineError::InvalidAmount(format!(
                        "too many decimals in {label}"
                    )));
                }
            }
        }
    };

    let total = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(overflow)?;

    if negative {
        total.checked_neg().ok_or_else(overflow)
    } else {
        Ok(total)
    }
}
