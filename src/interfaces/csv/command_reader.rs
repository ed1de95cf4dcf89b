use crate::domain::earning::SellerShare;
use crate::domain::ids::{AccountId, OrderId};
use crate::domain::ledger::Direction;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Earning,
    Payout,
    Settle,
    Withdraw,
    Approve,
    Reject,
    Credit,
    Debit,
}

/// One row of a command file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub op: CommandType,
    pub account: AccountId,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub rate: Option<Decimal>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// An engine call assembled from one or more command rows.
#[derive(Debug, PartialEq, Clone)]
pub enum Instruction {
    RecordOrder {
        order: OrderId,
        shares: Vec<SellerShare>,
    },
    CreatePayout(AccountId),
    /// Settle every pending payout of the account.
    Settle(AccountId),
    Withdraw {
        account: AccountId,
        amount: Decimal,
        destination: String,
    },
    /// Decide the oldest pending withdrawal request of the account.
    Decide {
        account: AccountId,
        approve: bool,
        remarks: Option<String>,
    },
    Adjust {
        account: AccountId,
        direction: Direction,
        amount: Decimal,
        reference: String,
    },
}

fn required_amount(command: &Command) -> Result<Decimal> {
    command
        .amount
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{:?} row without amount", command.op)))
}

impl TryFrom<Command> for Instruction {
    type Error = LedgerError;

    fn try_from(command: Command) -> Result<Self> {
        let instruction = match command.op {
            CommandType::Earning => {
                let order = command.order.clone().ok_or_else(|| {
                    LedgerError::InvalidCommand("earning row without order".to_string())
                })?;
                Instruction::RecordOrder {
                    shares: vec![share_from(&order, 0, command)],
                    order: OrderId::new(order),
                }
            }
            CommandType::Payout => Instruction::CreatePayout(command.account),
            CommandType::Settle => Instruction::Settle(command.account),
            CommandType::Withdraw => Instruction::Withdraw {
                amount: required_amount(&command)?,
                destination: command.reference.unwrap_or_default(),
                account: command.account,
            },
            CommandType::Approve | CommandType::Reject => Instruction::Decide {
                approve: command.op == CommandType::Approve,
                remarks: command.remarks,
                account: command.account,
            },
            CommandType::Credit | CommandType::Debit => Instruction::Adjust {
                direction: if command.op == CommandType::Credit {
                    Direction::Credit
                } else {
                    Direction::Debit
                },
                amount: required_amount(&command)?,
                reference: command
                    .reference
                    .unwrap_or_else(|| "admin-adjustment".to_string()),
                account: command.account,
            },
        };
        Ok(instruction)
    }
}

/// Missing amounts become zero so the engine rejects the whole order.
fn share_from(order: &str, index: usize, command: Command) -> SellerShare {
    SellerShare::new(
        command.account,
        command
            .item
            .unwrap_or_else(|| format!("{order}-{}", index + 1)),
        command.amount.unwrap_or(Decimal::ZERO),
        command.rate.unwrap_or(Decimal::ZERO),
    )
}

/// Reads engine commands from a CSV source.
///
/// This reader wraps `csv::Reader` and trims whitespace. Records may be
/// shorter than the header.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one result per row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }

    /// Lazily yields instructions, merging consecutive `earning` rows of the
    /// same order into one `RecordOrder`.
    pub fn instructions(self) -> Instructions<impl Iterator<Item = Result<Command>>> {
        Instructions {
            rows: self.commands(),
            lookahead: None,
        }
    }
}

pub struct Instructions<I: Iterator<Item = Result<Command>>> {
    rows: I,
    lookahead: Option<Result<Command>>,
}

impl<I: Iterator<Item = Result<Command>>> Iterator for Instructions<I> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        let command = match self.lookahead.take().or_else(|| self.rows.next())? {
            Ok(command) => command,
            Err(e) => return Some(Err(e)),
        };

        let instruction = match Instruction::try_from(command) {
            Ok(instruction) => instruction,
            Err(e) => return Some(Err(e)),
        };
        let Instruction::RecordOrder { order, mut shares } = instruction else {
            return Some(Ok(instruction));
        };

        loop {
            match self.rows.next() {
                Some(Ok(next))
                    if next.op == CommandType::Earning
                        && next.order.as_deref() == Some(order.as_str()) =>
                {
                    let index = shares.len();
                    shares.push(share_from(order.as_str(), index, next));
                }
                Some(other) => {
                    self.lookahead = Some(other);
                    break;
                }
                None => break,
            }
        }
        Some(Ok(Instruction::RecordOrder { order, shares }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn instructions(data: &str) -> Vec<Result<Instruction>> {
        CommandReader::new(data.as_bytes()).instructions().collect()
    }

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, account, order, item, amount, rate, reference, remarks\n\
                    payout, s1,,,,,,\n\
                    withdraw, s1,,, 500,, 0712345678,";
        let results = instructions(data);

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &Instruction::CreatePayout("s1".into())
        );
        assert_eq!(
            results[1].as_ref().unwrap(),
            &Instruction::Withdraw {
                account: "s1".into(),
                amount: dec!(500),
                destination: "0712345678".to_string(),
            }
        );
    }

    #[test]
    fn test_consecutive_earnings_form_one_order() {
        let data = "op, account, order, item, amount, rate, reference, remarks\n\
                    earning, s1, o1, i1, 100, 0.1,,\n\
                    earning, s2, o1, i2, 50,,,\n\
                    earning, s1, o2,, 10,,,\n\
                    payout, s1,,,,,,";
        let results = instructions(data);

        assert_eq!(results.len(), 3);
        match results[0].as_ref().unwrap() {
            Instruction::RecordOrder { order, shares } => {
                assert_eq!(order.as_str(), "o1");
                assert_eq!(shares.len(), 2);
                assert_eq!(shares[0].commission_rate, dec!(0.1));
                assert_eq!(shares[1].commission_rate, Decimal::ZERO);
            }
            other => panic!("unexpected {other:?}"),
        }
        match results[1].as_ref().unwrap() {
            Instruction::RecordOrder { order, shares } => {
                assert_eq!(order.as_str(), "o2");
                assert_eq!(shares[0].order_item_ref, "o2-1");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(results[2], Ok(Instruction::CreatePayout(_))));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "op, account, order, item, amount, rate, reference, remarks\n\
                    invalid, s1,,,,,,\n\
                    earning, s1,,, 10,,,\n\
                    credit, s1,,, 5,,,";
        let results = instructions(data);

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Err(LedgerError::Csv(_))));
        assert!(matches!(results[1], Err(LedgerError::InvalidCommand(_))));
        assert!(matches!(
            results[2],
            Ok(Instruction::Adjust {
                direction: Direction::Credit,
                ..
            })
        ));
    }

    #[test]
    fn test_bad_row_inside_order_is_not_swallowed() {
        let data = "op, account, order, item, amount, rate, reference, remarks\n\
                    earning, s1, o1, i1, 100,,,\n\
                    bogus, s1,,,,,,\n\
                    reject, s1,,,,,, doc mismatch";
        let results = instructions(data);

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Ok(Instruction::RecordOrder { .. })));
        assert!(results[1].is_err());
        assert_eq!(
            results[2].as_ref().unwrap(),
            &Instruction::Decide {
                account: "s1".into(),
                approve: false,
                remarks: Some("doc mismatch".to_string()),
            }
        );
    }
}
