use super::command_reader::Instruction;
use crate::application::engine::MarketplaceEngine;
use crate::error::{LedgerError, Result};

/// Runs one instruction against the engine.
///
/// `Settle` settles every pending payout of the account, oldest first.
/// `Decide` acts on the oldest pending withdrawal request.
pub async fn execute(engine: &MarketplaceEngine, instruction: Instruction) -> Result<()> {
    match instruction {
        Instruction::RecordOrder { order, shares } => {
            engine.record_order_earnings(&order, &shares).await?;
        }
        Instruction::CreatePayout(account) => {
            engine.create_payout(&account).await?;
        }
        Instruction::Settle(account) => {
            let pending = engine.payouts().pending_payouts(&account).await?;
            if pending.is_empty() {
                return Err(LedgerError::PayoutNotFound(format!(
                    "no pending payout for {account}"
                )));
            }
            for payout in pending {
                engine.mark_payout_paid(payout.id).await?;
            }
        }
        Instruction::Withdraw {
            account,
            amount,
            destination,
        } => {
            engine
                .request_withdrawal(&account, amount, &destination)
                .await?;
        }
        Instruction::Decide {
            account,
            approve,
            remarks,
        } => {
            let request = engine
                .withdrawals()
                .pending_withdrawals(&account)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    LedgerError::WithdrawalNotFound(format!("no pending request for {account}"))
                })?;
            engine
                .decide(request.id, approve, remarks.as_deref())
                .await?;
        }
        Instruction::Adjust {
            account,
            direction,
            amount,
            reference,
        } => {
            engine
                .adjust_balance(&account, direction, amount, &reference)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::ids::AccountId;
    use crate::domain::money::Balance;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use crate::interfaces::csv::command_reader::CommandReader;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn replay(data: &str) -> (MarketplaceEngine, Vec<Result<()>>) {
        let engine = MarketplaceEngine::new(
            Arc::new(InMemoryLedgerStore::new()),
            EngineConfig::default(),
        );
        let mut outcomes = Vec::new();
        for instruction in CommandReader::new(data.as_bytes()).instructions() {
            let outcome = match instruction {
                Ok(instruction) => execute(&engine, instruction).await,
                Err(e) => Err(e),
            };
            outcomes.push(outcome);
        }
        (engine, outcomes)
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let data = "op, account, order, item, amount, rate, reference, remarks\n\
                    earning, s1, o1, i1, 1500,,,\n\
                    earning, s1, o1, i2, 500,,,\n\
                    payout, s1,,,,,,\n\
                    settle, s1,,,,,,\n\
                    withdraw, s1,,, 500,, 0712345678,\n\
                    approve, s1,,,,,,\n\
                    withdraw, s1,,, 100,, 0712345678,\n\
                    reject, s1,,,,,, wrong number";
        let (engine, outcomes) = replay(data).await;

        assert!(outcomes.iter().all(Result::is_ok), "{outcomes:?}");
        let summary = engine.summary(&AccountId::new("s1")).await.unwrap();
        assert_eq!(summary.balance, Balance::new(dec!(1500)));
        assert_eq!(summary.withdrawn, Balance::new(dec!(500)));
        assert_eq!(summary.pending_withdrawals, Balance::ZERO);
    }

    #[tokio::test]
    async fn test_settle_and_decide_without_pending_work() {
        let data = "op, account, order, item, amount, rate, reference, remarks\n\
                    earning, s1, o1, i1, 10,,,\n\
                    settle, s1,,,,,,\n\
                    approve, s1,,,,,,";
        let (_, outcomes) = replay(data).await;

        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1], Err(LedgerError::PayoutNotFound(_))));
        assert!(matches!(outcomes[2], Err(LedgerError::WithdrawalNotFound(_))));
    }
}
