use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

const CURRENCY_SYMBOL: &str = "₫";
const THOUSANDS_SEPARATOR: char = '.';
const INPUT_SCALE: u32 = 2;
// 28 significant digits fit in a Decimal; two of them go to the input scale.
const MAX_INPUT_DIGITS: usize = 26;

#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("amount `{0}` has too many digits")]
    AmountTooLarge(String),
    #[error("amount {0} must not be negative")]
    Negative(Decimal),
    #[error("the amounts add up to more than can be represented")]
    Overflow,
}

/// Rounds to whole currency units, halves away from zero. Never returns `-0`.
pub fn round_half_up(amount: Decimal) -> Decimal {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        Decimal::ZERO
    } else {
        rounded
    }
}

pub fn ensure_non_negative(amount: Decimal) -> Result<Decimal, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }
    Ok(amount)
}

/// Adds up amounts, failing instead of panicking when the sum leaves the decimal range.
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, MoneyError> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or(MoneyError::Overflow)
}

/// A currency amount that stays exact when divided between participants.
///
/// The value is the sum of `numerator / divisor` over the stored parts, where every divisor
/// is a participant count. Whole amounts live under divisor 1. Nothing is rounded until
/// [`ExactAmount::round_half_up`] collapses the parts over the lcm of their divisors.
#[derive(Clone, Debug, Default)]
pub struct ExactAmount {
    parts: BTreeMap<u64, Decimal>,
}

impl ExactAmount {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn whole(amount: Decimal) -> Self {
        Self::fraction(amount, 1)
    }

    /// `amount / participants`, or `None` when there is nobody to split between.
    pub fn share(amount: Decimal, participants: usize) -> Option<Self> {
        if participants == 0 {
            return None;
        }
        Some(Self::fraction(amount, participants as u64))
    }

    fn fraction(numerator: Decimal, divisor: u64) -> Self {
        let mut parts = BTreeMap::new();
        parts.insert(divisor, numerator);
        ExactAmount { parts }
    }

    pub fn try_add(&mut self, other: &ExactAmount) -> Result<(), MoneyError> {
        self.combine(other, Decimal::checked_add)
    }

    pub fn try_sub(&mut self, other: &ExactAmount) -> Result<(), MoneyError> {
        self.combine(other, Decimal::checked_sub)
    }

    fn combine(
        &mut self,
        other: &ExactAmount,
        op: fn(Decimal, Decimal) -> Option<Decimal>,
    ) -> Result<(), MoneyError> {
        for (&divisor, part) in &other.parts {
            let entry = self.parts.entry(divisor).or_insert(Decimal::ZERO);
            *entry = op(*entry, *part).ok_or(MoneyError::Overflow)?;
        }
        Ok(())
    }

    pub fn round_half_up(&self) -> Result<Decimal, MoneyError> {
        if let Some(rounded) = self
            .collapse()
            .and_then(|(numerator, divisor)| divide_half_up(numerator, divisor))
        {
            return Ok(rounded);
        }
        self.approximate()
            .map(round_half_up)
            .ok_or(MoneyError::Overflow)
    }

    pub fn is_zero(&self) -> bool {
        match self.collapse() {
            Some((numerator, _)) => numerator.is_zero(),
            None => self.approximate().is_some_and(|value| value.is_zero()),
        }
    }

    /// `(numerator, divisor)` over the lcm of all divisors, `None` if it leaves the decimal range.
    fn collapse(&self) -> Option<(Decimal, Decimal)> {
        let divisor = self
            .parts
            .keys()
            .try_fold(1u64, |acc, &divisor| lcm(acc, divisor))?;
        let numerator = self
            .parts
            .iter()
            .try_fold(Decimal::ZERO, |acc, (&part_divisor, part)| {
                let scaled = part.checked_mul(Decimal::from(divisor / part_divisor))?;
                acc.checked_add(scaled)
            })?;
        Some((numerator, Decimal::from(divisor)))
    }

    fn approximate(&self) -> Option<Decimal> {
        self.parts
            .iter()
            .try_fold(Decimal::ZERO, |acc, (&divisor, part)| {
                acc.checked_add(part.checked_div(Decimal::from(divisor))?)
            })
    }
}

impl From<Decimal> for ExactAmount {
    fn from(amount: Decimal) -> Self {
        ExactAmount::whole(amount)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: u64, b: u64) -> Option<u64> {
    (a / gcd(a, b)).checked_mul(b)
}

// Rounds numerator / divisor half-up without trusting the last digit of decimal division.
fn divide_half_up(numerator: Decimal, divisor: Decimal) -> Option<Decimal> {
    let magnitude = numerator.abs();
    let mut quotient = magnitude.checked_div(divisor)?.trunc();
    let mut remainder = magnitude.checked_sub(quotient.checked_mul(divisor)?)?;
    while remainder < Decimal::ZERO {
        quotient -= Decimal::ONE;
        remainder += divisor;
    }
    while remainder >= divisor {
        quotient += Decimal::ONE;
        remainder -= divisor;
    }
    if remainder * Decimal::TWO >= divisor {
        quotient += Decimal::ONE;
    }
    if numerator.is_sign_negative() {
        Some(round_half_up(-quotient))
    } else {
        Some(round_half_up(quotient))
    }
}

/// Formats a whole-unit amount for display: `1234567` becomes `1.234.567₫`.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = round_half_up(amount);
    let digits = rounded.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(THOUSANDS_SEPARATOR);
        }
        grouped.push(digit);
    }
    let sign = if rounded.is_sign_negative() { "-" } else { "" };
    format!("{sign}{grouped}{CURRENCY_SYMBOL}")
}

/// Reads a free-text amount by keeping only its digits. Empty input is zero.
pub fn parse_currency_input(value: &str) -> Result<Decimal, MoneyError> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > MAX_INPUT_DIGITS {
        return Err(MoneyError::AmountTooLarge(digits));
    }
    let mut amount = if significant.is_empty() {
        Decimal::ZERO
    } else {
        Decimal::from_str(significant).map_err(|_| MoneyError::AmountTooLarge(digits.clone()))?
    };
    amount.rescale(INPUT_SCALE);
    Ok(amount)
}
