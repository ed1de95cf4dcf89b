use crate::error::LedgerError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places in the smallest currency unit.
pub const MONEY_SCALE: u32 = 2;

/// Largest single amount the engine accepts: 10^15 currency units.
///
/// Sums of many such amounts stay far inside `Decimal`'s range, but every
/// addition is still checked.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

fn overflow(context: &str) -> LedgerError {
    LedgerError::InvalidAmount(format!("{context} exceeds the representable range"))
}

/// Rounds to the smallest currency unit, half-up.
///
/// This is the only rounding rule in the engine. Every place that divides or
/// scales money goes through here.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A strictly positive monetary amount expressible in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} is not strictly positive"
            )));
        }
        if value > MAX_AMOUNT {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} exceeds the maximum of {MAX_AMOUNT}"
            )));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(LedgerError::InvalidAmount(format!(
                "{value} has more than {MONEY_SCALE} decimal places"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// A running account balance. Never negative once committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.0
    }

    /// Fails with `InvalidAmount` instead of overflowing.
    pub fn credit(self, amount: Amount) -> Result<Self, LedgerError> {
        self.checked_add(Balance::from(amount))
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, LedgerError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| overflow("balance"))
    }

    /// Adds up balances, failing with `InvalidAmount` on overflow.
    pub fn try_sum(balances: impl IntoIterator<Item = Self>) -> Result<Self, LedgerError> {
        balances
            .into_iter()
            .try_fold(Balance::ZERO, Balance::checked_add)
    }

    /// Returns `None` when the debit would take the balance below zero.
    pub fn debit(self, amount: Amount) -> Option<Self> {
        if self.covers(amount) {
            Some(Self(self.0 - amount.0))
        } else {
            None
        }
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Share of a gross amount retained by the marketplace, in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value < Decimal::ZERO || value >= Decimal::ONE {
            return Err(LedgerError::InvalidCommissionRate(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Splits a gross amount into `(net, commission)`.
    ///
    /// The net share is rounded; the commission absorbs the remainder so that
    /// `net + commission == gross` holds exactly.
    pub fn split(&self, gross: Amount) -> Result<(Amount, Decimal), LedgerError> {
        let net = round_money(gross.value() * (Decimal::ONE - self.0));
        let net = Amount::new(net).map_err(|_| {
            LedgerError::InvalidAmount(format!(
                "net share of {gross} at commission {} rounds to zero",
                self.0
            ))
        })?;
        Ok((net, gross.value() - net.value()))
    }
}

impl TryFrom<Decimal> for CommissionRate {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommissionRate> for Decimal {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(2.675)), dec!(2.68));
        assert_eq!(round_money(dec!(10)), dec!(10));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(Amount::new(dec!(10.500)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(0.001)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_balance_debit_never_negative() {
        let balance = Balance::new(dec!(10));
        let five = Amount::new(dec!(5)).unwrap();
        let eleven = Amount::new(dec!(11)).unwrap();

        assert_eq!(balance.debit(five), Some(Balance::new(dec!(5))));
        assert_eq!(balance.debit(eleven), None);
        assert_eq!(balance.credit(five).unwrap(), Balance::new(dec!(15)));
    }

    #[test]
    fn test_balance_sum() {
        let total = Balance::try_sum([dec!(1.5), dec!(2.25), dec!(0.25)].map(Balance::new)).unwrap();
        assert_eq!(total, Balance::new(dec!(4.00)));
    }

    #[test]
    fn test_amount_cap() {
        assert_eq!(MAX_AMOUNT, dec!(1_000_000_000_000_000));
        assert!(Amount::new(MAX_AMOUNT).is_ok());
        assert!(matches!(
            Amount::new(dec!(1_000_000_000_000_000.01)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(50_000_000_000_000_000_000_000_000_000)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_balance_overflow_is_an_error() {
        let near_max = Balance::new(Decimal::MAX - dec!(1));
        assert!(matches!(
            near_max.credit(Amount::new(dec!(5)).unwrap()),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Balance::try_sum([near_max, near_max]),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_commission_rate_bounds() {
        assert!(CommissionRate::new(dec!(0)).is_ok());
        assert!(CommissionRate::new(dec!(0.999)).is_ok());
        assert!(matches!(
            CommissionRate::new(dec!(1)),
            Err(LedgerError::InvalidCommissionRate(_))
        ));
        assert!(matches!(
            CommissionRate::new(dec!(-0.1)),
            Err(LedgerError::InvalidCommissionRate(_))
        ));
    }

    #[test]
    fn test_commission_split_preserves_gross() {
        let rate = CommissionRate::new(dec!(0.15)).unwrap();
        let gross = Amount::new(dec!(33.33)).unwrap();
        let (net, commission) = rate.split(gross).unwrap();

        // 33.33 * 0.85 = 28.3305 -> 28.33
        assert_eq!(net.value(), dec!(28.33));
        assert_eq!(commission, dec!(5.00));
        assert_eq!(net.value() + commission, gross.value());
    }

    #[test]
    fn test_commission_split_rejects_zero_net() {
        let rate = CommissionRate::new(dec!(0.999)).unwrap();
        let gross = Amount::new(dec!(1)).unwrap();
        assert!(matches!(
            rate.split(gross),
            Err(LedgerError::InvalidAmount(_))
        ));
    }
}
