//! Money type and monetary helpers.
//!
//! Amounts are integers in the currency's smallest unit. All percentage math
//! is integer math rounded half away from zero; no floating point is involved
//! anywhere a charged amount is computed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    INR,
}

impl Currency {
    /// Get the currency code (e.g., "USD").
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
            Currency::INR => "INR",
        }
    }

    /// Get the currency symbol (e.g., "$").
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "\u{20ac}",
            Currency::GBP => "\u{00a3}",
            Currency::JPY => "\u{00a5}",
            Currency::CAD => "CA$",
            Currency::AUD => "A$",
            Currency::INR => "\u{20b9}",
        }
    }

    /// Number of decimal places in the minor unit.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Parse a currency code string, case-insensitively.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "JPY" => Some(Currency::JPY),
            "CAD" => Some(Currency::CAD),
            "AUD" => Some(Currency::AUD),
            "INR" => Some(Currency::INR),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A monetary value with currency.
///
/// Amounts are stored in the smallest unit of the currency (e.g., cents for USD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Money {
    /// Amount in smallest currency unit (e.g., cents).
    pub amount_cents: i64,
    /// The currency.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money value from minor units.
    pub fn new(amount_cents: i64, currency: Currency) -> Self {
        Self {
            amount_cents,
            currency,
        }
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Check if this is zero.
    pub fn is_zero(&self) -> bool {
        self.amount_cents == 0
    }

    /// Check if this is positive.
    pub fn is_positive(&self) -> bool {
        self.amount_cents > 0
    }

    /// Check if this is negative.
    pub fn is_negative(&self) -> bool {
        self.amount_cents < 0
    }

    /// Format as a display string (e.g., "$1,234.56", "-$5.00", "¥1,200").
    pub fn display(&self) -> String {
        format!(
            "{}{}{}",
            self.sign(),
            self.currency.symbol(),
            self.unsigned_amount()
        )
    }

    fn sign(&self) -> &'static str {
        if self.is_negative() {
            "-"
        } else {
            ""
        }
    }

    fn unsigned_amount(&self) -> String {
        let places = self.currency.decimal_places();
        let scale = 10_u64.pow(places);
        let abs = self.amount_cents.unsigned_abs();
        let whole = group_thousands(abs / scale);
        if places == 0 {
            whole
        } else {
            format!("{}.{:0width$}", whole, abs % scale, width = places as usize)
        }
    }

    /// Try to add another Money value, returning None on currency mismatch or overflow.
    pub fn try_add(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        let sum = self.amount_cents.checked_add(other.amount_cents)?;
        Some(Money::new(sum, self.currency))
    }

    /// Try to subtract another Money value.
    pub fn try_subtract(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        let diff = self.amount_cents.checked_sub(other.amount_cents)?;
        Some(Money::new(diff, self.currency))
    }

    /// Try to multiply by a scalar.
    pub fn try_multiply(&self, factor: i64) -> Option<Money> {
        let product = self.amount_cents.checked_mul(factor)?;
        Some(Money::new(product, self.currency))
    }

    /// Multiply by a scalar, saturating at the `i64` bounds.
    pub fn saturating_multiply(&self, factor: i64) -> Money {
        Money::new(self.amount_cents.saturating_mul(factor), self.currency)
    }

    /// Add another amount of the same currency, saturating at the `i64` bounds.
    ///
    /// The caller guarantees matching currencies; the result keeps `self`'s.
    pub fn saturating_add(&self, other: &Money) -> Money {
        debug_assert_eq!(self.currency, other.currency);
        Money::new(
            self.amount_cents.saturating_add(other.amount_cents),
            self.currency,
        )
    }

    /// Sum an iterator of Money values, returning None on mismatch or overflow.
    pub fn try_sum<'a>(mut iter: impl Iterator<Item = &'a Money>, currency: Currency) -> Option<Money> {
        iter.try_fold(Money::zero(currency), |acc, m| acc.try_add(m))
    }

    /// `percent`% of this amount, rounded half away from zero.
    pub fn percent_of(&self, percent: u32) -> Money {
        let raw = i128::from(self.amount_cents) * i128::from(percent);
        let cents = div_round_half_away(raw, 100);
        Money::new(saturate_i64(cents), self.currency)
    }

    /// The smaller of two amounts (same currency assumed).
    pub fn min(self, other: Money) -> Money {
        if other.amount_cents < self.amount_cents {
            other
        } else {
            self
        }
    }

    /// Clamp a non-negative amount to `[0, ceiling]`.
    pub fn clamp_to(self, ceiling: Money) -> Money {
        let cents = self.amount_cents.max(0).min(ceiling.amount_cents.max(0));
        Money::new(cents, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Whole-percent markdown from `original` to `price`, for "x% off" badges.
///
/// Returns 0 when there is no markdown or the currencies differ.
pub fn discount_percent(original: Money, price: Money) -> u32 {
    if original.currency != price.currency
        || original.amount_cents <= 0
        || price.amount_cents >= original.amount_cents
    {
        return 0;
    }
    let saved = i128::from(original.amount_cents) - i128::from(price.amount_cents.max(0));
    let percent = div_round_half_away(saved * 100, i128::from(original.amount_cents));
    u32::try_from(percent).unwrap_or(100)
}

/// Integer division rounding half away from zero. `denominator` must be positive.
fn div_round_half_away(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator {
        quotient + numerator.signum()
    } else {
        quotient
    }
}

fn saturate_i64(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    #[test]
    fn test_money_display() {
        assert_eq!(usd(4999).display(), "$49.99");
        assert_eq!(usd(5).display(), "$0.05");
        assert_eq!(usd(123_456).display(), "$1,234.56");
        assert_eq!(usd(100_000_000).display(), "$1,000,000.00");
        assert_eq!(usd(-500).display(), "-$5.00");
        assert_eq!(Money::new(1200, Currency::JPY).display(), "\u{00a5}1,200");
    }

    #[test]
    fn test_money_checked_arithmetic() {
        assert_eq!(usd(1000).try_add(&usd(500)), Some(usd(1500)));
        assert_eq!(usd(1000).try_subtract(&usd(300)), Some(usd(700)));
        assert_eq!(usd(1000).try_multiply(3), Some(usd(3000)));
        assert_eq!(usd(i64::MAX).try_add(&usd(1)), None);
        assert_eq!(usd(i64::MAX).try_multiply(2), None);
    }

    #[test]
    fn test_money_currency_mismatch() {
        let eur = Money::new(1000, Currency::EUR);
        assert_eq!(usd(1000).try_add(&eur), None);
        assert_eq!(usd(1000).try_subtract(&eur), None);
    }

    #[test]
    fn test_money_try_sum() {
        let amounts = [usd(100), usd(250), usd(650)];
        assert_eq!(Money::try_sum(amounts.iter(), Currency::USD), Some(usd(1000)));

        let mixed = [usd(100), Money::new(100, Currency::GBP)];
        assert_eq!(Money::try_sum(mixed.iter(), Currency::USD), None);
    }

    #[test]
    fn test_money_saturating() {
        assert_eq!(usd(i64::MAX).saturating_multiply(2), usd(i64::MAX));
        assert_eq!(usd(i64::MAX).saturating_add(&usd(1)), usd(i64::MAX));
    }

    #[test]
    fn test_percent_of_rounds_half_away_from_zero() {
        assert_eq!(usd(10000).percent_of(10), usd(1000));
        assert_eq!(usd(1005).percent_of(10), usd(101)); // 100.5 -> 101
        assert_eq!(usd(1004).percent_of(10), usd(100)); // 100.4 -> 100
        assert_eq!(usd(-1005).percent_of(10), usd(-101));
        assert_eq!(usd(999).percent_of(0), usd(0));
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(discount_percent(usd(10000), usd(7500)), 25);
        assert_eq!(discount_percent(usd(3000), usd(2000)), 33);
        assert_eq!(discount_percent(usd(300), usd(100)), 67);
        assert_eq!(discount_percent(usd(1000), usd(1000)), 0);
        assert_eq!(discount_percent(usd(1000), usd(1200)), 0);
        assert_eq!(discount_percent(usd(0), usd(0)), 0);
        assert_eq!(discount_percent(Money::new(1000, Currency::EUR), usd(500)), 0);
    }

    #[test]
    fn test_clamp_and_min() {
        assert_eq!(usd(1500).clamp_to(usd(1000)), usd(1000));
        assert_eq!(usd(-5).clamp_to(usd(1000)), usd(0));
        assert_eq!(usd(300).min(usd(200)), usd(200));
    }

    #[test]
    fn test_currency_from_code() {
        assert_eq!(Currency::from_code("USD"), Some(Currency::USD));
        assert_eq!(Currency::from_code(" eur "), Some(Currency::EUR));
        assert_eq!(Currency::from_code("INVALID"), None);
    }
}
