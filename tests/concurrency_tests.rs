use mktledger::domain::ids::{AccountId, EarningId};
use mktledger::domain::ledger::{Direction, Page, ReasonCode};
use mktledger::domain::money::Balance;
use mktledger::domain::withdrawal::WithdrawalState;
use mktledger::error::LedgerError;
use rust_decimal_macros::dec;
use std::collections::HashSet;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_payouts_claim_each_earning_once() {
    let engine = common::engine();
    let seller = AccountId::new("s1");
    for i in 0..20 {
        common::earn(&engine, &format!("o{i}"), "s1", dec!(10)).await;
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let seller = seller.clone();
            tokio::spawn(async move { engine.create_payout(&seller).await })
        })
        .collect();

    let mut created = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(payout) => created.push(payout),
            Err(LedgerError::NothingToPayout(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert!(!created.is_empty());
    let mut claimed: HashSet<EarningId> = HashSet::new();
    for payout in &created {
        for id in &payout.earning_ids {
            assert!(claimed.insert(*id), "earning {id} claimed twice");
        }
    }
    assert_eq!(claimed.len(), 20);
    let total = Balance::try_sum(created.iter().map(|p| Balance::from(p.total_amount))).unwrap();
    assert_eq!(total, Balance::new(dec!(200)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_payouts_with_nothing_new_in_between() {
    let engine = common::engine();
    let seller = AccountId::new("s1");
    common::earn(&engine, "o1", "s1", dec!(75)).await;

    let (a, b) = tokio::join!(
        {
            let engine = engine.clone();
            let seller = seller.clone();
            tokio::spawn(async move { engine.create_payout(&seller).await })
        },
        {
            let engine = engine.clone();
            let seller = seller.clone();
            tokio::spawn(async move { engine.create_payout(&seller).await })
        }
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].total_amount.value(), dec!(75));
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(LedgerError::NothingToPayout(_)))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_settlements_credit_once() {
    let engine = common::engine();
    let seller = AccountId::new("s1");
    common::earn(&engine, "o1", "s1", dec!(500)).await;
    let payout = engine.create_payout(&seller).await.unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.mark_payout_paid(payout.id).await })
        })
        .collect();

    let mut settled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => settled += 1,
            Err(LedgerError::AlreadySettled(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(settled, 1);
    assert_eq!(engine.get_balance(&seller).await.unwrap(), Balance::new(dec!(500)));
    let credits = engine
        .list_entries(&seller, Page::all())
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.reason == ReasonCode::PayoutSettlement)
        .count();
    assert_eq!(credits, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_decisions_on_one_request() {
    let engine = common::engine();
    let seller = AccountId::new("s1");
    common::fund(&engine, "o1", "s1", dec!(1000)).await;
    let request = engine
        .request_withdrawal(&seller, dec!(400), "0712345678")
        .await
        .unwrap();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    engine.decide(request.id, true, None).await
                } else {
                    engine.decide(request.id, false, Some("duplicate")).await
                }
            })
        })
        .collect();

    let mut decided = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(request) => decided.push(request),
            Err(LedgerError::AlreadyProcessed(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(decided.len(), 1);
    let expected = match decided[0].state {
        WithdrawalState::Approved => Balance::new(dec!(600)),
        WithdrawalState::Rejected => Balance::new(dec!(1000)),
        WithdrawalState::Pending => panic!("decision left the request pending"),
    };
    assert_eq!(engine.get_balance(&seller).await.unwrap(), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_never_overdraw() {
    let engine = common::engine();
    let seller = AccountId::new("s1");
    common::fund(&engine, "o1", "s1", dec!(1000)).await;

    let mut requests = Vec::new();
    for i in 0..5 {
        requests.push(
            engine
                .request_withdrawal(&seller, dec!(300), &format!("07000000{i}"))
                .await
                .unwrap(),
        );
    }

    let handles: Vec<_> = requests
        .iter()
        .map(|request| {
            let engine = engine.clone();
            let id = request.id;
            tokio::spawn(async move { engine.decide(id, true, None).await })
        })
        .collect();

    let mut approved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => approved += 1,
            Err(LedgerError::InsufficientBalance { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(approved, 3);
    assert_eq!(engine.get_balance(&seller).await.unwrap(), Balance::new(dec!(100)));
    assert_eq!(
        engine.withdrawals().pending_withdrawals(&seller).await.unwrap().len(),
        2
    );
    assert!(engine.reconcile(&seller).await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_debits_keep_a_total_order() {
    let engine = common::engine();
    let seller = AccountId::new("s1");
    common::fund(&engine, "o1", "s1", dec!(50)).await;

    let handles: Vec<_> = (0..80)
        .map(|i| {
            let engine = engine.clone();
            let seller = seller.clone();
            tokio::spawn(async move {
                engine
                    .adjust_balance(&seller, Direction::Debit, dec!(1), &format!("fee-{i}"))
                    .await
            })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }

    assert_eq!(ok, 50);
    assert_eq!(engine.get_balance(&seller).await.unwrap(), Balance::ZERO);
    let entries = engine.list_entries(&seller, Page::all()).await.unwrap();
    assert_eq!(entries.len(), 51);
    assert!(entries.windows(2).all(|w| w[1].sequence == w[0].sequence + 1));
}
