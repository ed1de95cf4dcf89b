use crate::domain::earning::Earning;
use crate::domain::ids::OrderId;
use crate::domain::ledger::LedgerEntry;
use crate::domain::payout::Payout;
use crate::domain::withdrawal::WithdrawalRequest;
use tokio::sync::broadcast;

/// Notifications emitted after a changeset has been committed.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    EarningsRecorded {
        order_id: OrderId,
        earnings: Vec<Earning>,
    },
    PayoutCreated(Payout),
    PayoutPaid {
        payout: Payout,
        entry: LedgerEntry,
    },
    WithdrawalRequested(WithdrawalRequest),
    WithdrawalApproved {
        request: WithdrawalRequest,
        entry: LedgerEntry,
    },
    WithdrawalRejected(WithdrawalRequest),
    EntryRecorded(LedgerEntry),
}

/// Fire-and-forget fan-out of [`LedgerEvent`]s.
///
/// Publishing never blocks and never fails: with no subscriber, or with a
/// lagging one, events are simply dropped for that receiver.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: LedgerEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}
