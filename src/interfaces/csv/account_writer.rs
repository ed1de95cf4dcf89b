use crate::application::engine::AccountSummary;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct SummaryRow<'a> {
    account: &'a str,
    owner: &'a str,
    currency: &'a str,
    balance: String,
    unsettled: String,
    reserved: String,
    paid_out: String,
    pending_withdrawals: String,
    withdrawn: String,
}

impl<'a> From<&'a AccountSummary> for SummaryRow<'a> {
    fn from(summary: &'a AccountSummary) -> Self {
        Self {
            account: summary.account.as_str(),
            owner: &summary.owner,
            currency: &summary.currency,
            balance: summary.balance.to_string(),
            unsettled: summary.unsettled.to_string(),
            reserved: summary.reserved.to_string(),
            paid_out: summary.paid_out.to_string(),
            pending_withdrawals: summary.pending_withdrawals.to_string(),
            withdrawn: summary.withdrawn.to_string(),
        }
    }
}

/// Writes account summaries as CSV or JSON.
///
/// Amounts are printed without trailing zeros.
pub struct AccountWriter<W: Write> {
    inner: W,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_csv(&mut self, summaries: &[AccountSummary]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(&mut self.inner);
        if summaries.is_empty() {
            writer.write_record([
                "account",
                "owner",
                "currency",
                "balance",
                "unsettled",
                "reserved",
                "paid_out",
                "pending_withdrawals",
                "withdrawn",
            ])?;
        }
        for summary in summaries {
            writer.serialize(SummaryRow::from(summary))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_json(&mut self, summaries: &[AccountSummary]) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.inner, summaries)?;
        writeln!(self.inner)?;
        Ok(())
    }
}
