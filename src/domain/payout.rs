use super::earning::Earning;
use super::ids::{AccountId, EarningId, PayoutId};
use super::money::{Amount, MAX_AMOUNT};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutState {
    Pending,
    Paid,
}

impl fmt::Display for PayoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayoutState::Pending => f.write_str("pending"),
            PayoutState::Paid => f.write_str("paid"),
        }
    }
}

/// A batch settlement of a seller's earnings.
///
/// `total_amount` is fixed when the payout is created and is never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub id: PayoutId,
    pub account_id: AccountId,
    pub total_amount: Amount,
    pub earning_ids: Vec<EarningId>,
    pub state: PayoutState,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payout {
    /// Builds a pending payout over the given earnings, oldest first.
    ///
    /// Earnings are bundled while the total stays within [`MAX_AMOUNT`]; the
    /// rest are left for a later payout. `earning_ids` lists exactly the
    /// bundled ones. The earnings are not touched; reserving them is the
    /// caller's job.
    pub fn aggregate(
        id: PayoutId,
        account_id: AccountId,
        earnings: &[Earning],
    ) -> Result<Self, LedgerError> {
        let mut total = Decimal::ZERO;
        let mut earning_ids = Vec::new();
        for earning in earnings {
            match total.checked_add(earning.net_amount.value()) {
                Some(next) if next <= MAX_AMOUNT => {
                    total = next;
                    earning_ids.push(earning.id);
                }
                _ => break,
            }
        }
        let total_amount = Amount::new(total)
            .map_err(|_| LedgerError::NothingToPayout(account_id.to_string()))?;

        Ok(Self {
            id,
            account_id,
            total_amount,
            earning_ids,
            state: PayoutState::Pending,
            created_at: Utc::now(),
            paid_at: None,
        })
    }

    pub fn mark_paid(&mut self) -> Result<(), LedgerError> {
        match self.state {
            PayoutState::Pending => {
                self.state = PayoutState::Paid;
                self.paid_at = Some(Utc::now());
                Ok(())
            }
            PayoutState::Paid => Err(LedgerError::AlreadySettled(self.id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::earning::SellerShare;
    use crate::domain::ids::OrderId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_aggregate_sums_net_amounts() {
        let order = OrderId::new("o1");
        let earnings = vec![
            Earning::from_share(&order, &SellerShare::new("s1", "i1", dec!(100), dec!(0.1)))
                .unwrap(),
            Earning::from_share(&order, &SellerShare::new("s1", "i2", dec!(50.50), dec!(0)))
                .unwrap(),
        ];

        let payout = Payout::aggregate(PayoutId::new(), "s1".into(), &earnings).unwrap();
        assert_eq!(payout.total_amount.value(), dec!(140.50));
        assert_eq!(payout.earning_ids.len(), 2);
        assert_eq!(payout.state, PayoutState::Pending);
        assert!(payout.paid_at.is_none());
    }

    #[test]
    fn test_aggregate_stops_at_the_amount_cap() {
        let order = OrderId::new("o1");
        let earnings: Vec<_> = ["i1", "i2", "i3"]
            .into_iter()
            .map(|item| {
                Earning::from_share(&order, &SellerShare::new("s1", item, MAX_AMOUNT, dec!(0)))
                    .unwrap()
            })
            .collect();

        let payout = Payout::aggregate(PayoutId::new(), "s1".into(), &earnings).unwrap();
        assert_eq!(payout.total_amount.value(), MAX_AMOUNT);
        assert_eq!(payout.earning_ids, vec![earnings[0].id]);
    }

    #[test]
    fn test_aggregate_empty_is_nothing_to_payout() {
        assert!(matches!(
            Payout::aggregate(PayoutId::new(), "s1".into(), &[]),
            Err(LedgerError::NothingToPayout(_))
        ));
    }

    #[test]
    fn test_mark_paid_is_terminal() {
        let order = OrderId::new("o1");
        let earnings =
            vec![Earning::from_share(&order, &SellerShare::new("s1", "i1", dec!(10), dec!(0))).unwrap()];
        let mut payout = Payout::aggregate(PayoutId::new(), "s1".into(), &earnings).unwrap();

        payout.mark_paid().unwrap();
        assert!(payout.paid_at.is_some());
        assert!(matches!(
            payout.mark_paid(),
            Err(LedgerError::AlreadySettled(_))
        ));
    }
}
