mod common;

use common::*;
use points_ledger::config::Config;
use points_ledger::domain::{Address, BlockHeight, TimeMs, TokenAmount};
use points_ledger::orchestration::SweepOutcome;
use points_ledger::{EventOutcome, IgnoreReason, ReconcileError};

fn applied(outcome: EventOutcome) -> usize {
    match outcome {
        EventOutcome::Applied { updates, .. } => updates.len(),
        other => panic!("expected applied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_one_token_for_one_hour_earns_one_point() {
    let h = setup(chain_at(150)).await;
    let holder = addr(1);

    h.dispatcher
        .dispatch(&token_transfer(0, Address::null(), holder.clone(), ONE_TOKEN))
        .await
        .unwrap();
    let outcome = h.dispatcher.tick(TimeMs::new(HOUR_MS)).await.unwrap();
    match outcome {
        SweepOutcome::Completed(report) => {
            assert_eq!(report.trackers_settled, 1);
            assert_eq!(report.accounts_credited, 1);
            assert_eq!(report.failures, 0);
        }
        SweepOutcome::Skipped => panic!("sweep skipped"),
    }

    let account = h.repo.get_account(&holder).await.unwrap().unwrap();
    assert_eq!(account.linear_points, d("1"));
    assert_eq!(account.boosted_points, d("1"));

    let tracker = h.repo.get_tracker(&holder).await.unwrap().unwrap();
    assert_eq!(tracker.last_settled_at, Some(TimeMs::new(HOUR_MS)));
}

#[tokio::test]
async fn test_second_settlement_at_same_time_earns_nothing() {
    let h = setup(chain_at(150)).await;
    let holder = addr(1);

    h.dispatcher
        .dispatch(&token_transfer(0, Address::null(), holder.clone(), ONE_TOKEN))
        .await
        .unwrap();
    h.dispatcher.tick(TimeMs::new(HOUR_MS)).await.unwrap();
    h.dispatcher.tick(TimeMs::new(HOUR_MS)).await.unwrap();

    let account = h.repo.get_account(&holder).await.unwrap().unwrap();
    assert_eq!(account.linear_points, d("1"));
}

#[tokio::test]
async fn test_transfer_settles_sender_before_moving_balance() {
    let h = setup(chain_at(150)).await;
    let x = addr(1);
    let y = addr(2);

    h.dispatcher
        .dispatch(&token_transfer(0, Address::null(), x.clone(), ONE_TOKEN))
        .await
        .unwrap();
    h.dispatcher.tick(TimeMs::new(HOUR_MS)).await.unwrap();

    let outcome = h
        .dispatcher
        .dispatch(&token_transfer(2 * HOUR_MS, x.clone(), y.clone(), ONE_TOKEN / 2))
        .await
        .unwrap();
    // Only X is credited; Y is new and has nothing pending.
    assert_eq!(applied(outcome), 1);

    let x_tracker = h.repo.get_tracker(&x).await.unwrap().unwrap();
    assert_eq!(x_tracker.balance, TokenAmount::new(ONE_TOKEN / 2));
    assert_eq!(x_tracker.last_settled_at, Some(TimeMs::new(2 * HOUR_MS)));
    let x_account = h.repo.get_account(&x).await.unwrap().unwrap();
    assert_eq!(x_account.linear_points, d("2"));

    let y_tracker = h.repo.get_tracker(&y).await.unwrap().unwrap();
    assert_eq!(y_tracker.balance, TokenAmount::new(ONE_TOKEN / 2));
    assert_eq!(y_tracker.last_settled_at, Some(TimeMs::new(2 * HOUR_MS)));
    assert!(h.repo.get_account(&y).await.unwrap().is_none());

    // Both halves accrue from here.
    h.dispatcher.tick(TimeMs::new(4 * HOUR_MS)).await.unwrap();
    assert_eq!(
        h.repo.get_account(&x).await.unwrap().unwrap().linear_points,
        d("3")
    );
    assert_eq!(
        h.repo.get_account(&y).await.unwrap().unwrap().linear_points,
        d("1")
    );
}

#[tokio::test]
async fn test_transfer_conserves_tracked_balance() {
    let h = setup(chain_at(150)).await;
    let (a, b) = (addr(1), addr(2));

    h.dispatcher
        .dispatch(&token_transfer(0, Address::null(), a.clone(), 3 * ONE_TOKEN))
        .await
        .unwrap();
    h.dispatcher
        .dispatch(&token_transfer(10, Address::null(), b.clone(), 7))
        .await
        .unwrap();

    let sum = |trackers: Vec<points_ledger::BalanceTracker>| {
        trackers
            .iter()
            .map(|t| t.balance.as_u128())
            .sum::<u128>()
    };
    let before = sum(
        h.repo
            .list_trackers(points_ledger::db::TrackerFilter::All)
            .await
            .unwrap(),
    );

    h.dispatcher
        .dispatch(&token_transfer(20, a.clone(), b.clone(), ONE_TOKEN + 1))
        .await
        .unwrap();
    let after = sum(
        h.repo
            .list_trackers(points_ledger::db::TrackerFilter::All)
            .await
            .unwrap(),
    );

    assert_eq!(before, after);
    assert_eq!(
        h.repo.get_tracker(&b).await.unwrap().unwrap().balance,
        TokenAmount::new(ONE_TOKEN + 8)
    );
}

#[tokio::test]
async fn test_overdraft_is_rejected_and_nothing_persists() {
    let h = setup(chain_at(150)).await;
    let (a, b) = (addr(1), addr(2));

    h.dispatcher
        .dispatch(&token_transfer(0, Address::null(), a.clone(), ONE_TOKEN))
        .await
        .unwrap();

    let result = h
        .dispatcher
        .dispatch(&token_transfer(HOUR_MS, a.clone(), b.clone(), 2 * ONE_TOKEN))
        .await;
    assert!(matches!(result, Err(ReconcileError::InvariantViolation(_))));

    // The sender's pending hour was not settled, and the recipient does not exist.
    let tracker = h.repo.get_tracker(&a).await.unwrap().unwrap();
    assert_eq!(tracker.balance, TokenAmount::new(ONE_TOKEN));
    assert_eq!(tracker.last_settled_at, Some(TimeMs::new(0)));
    assert!(h.repo.get_account(&a).await.unwrap().is_none());
    assert!(h.repo.get_tracker(&b).await.unwrap().is_none());
}

#[tokio::test]
async fn test_transfer_from_untracked_address_still_credits_recipient() {
    let h = setup(chain_at(150)).await;
    let (stranger, b) = (addr(9), addr(2));

    let outcome = h
        .dispatcher
        .dispatch(&token_transfer(0, stranger.clone(), b.clone(), ONE_TOKEN))
        .await
        .unwrap();
    assert_eq!(applied(outcome), 0);

    assert!(h.repo.get_tracker(&stranger).await.unwrap().is_none());
    assert_eq!(
        h.repo.get_tracker(&b).await.unwrap().unwrap().balance,
        TokenAmount::new(ONE_TOKEN)
    );
}

#[tokio::test]
async fn test_excluded_addresses_are_never_tracked() {
    let h = setup(chain_at(150)).await;
    let a = addr(1);

    let outcome = h
        .dispatcher
        .dispatch(&token_transfer(0, Address::null(), pool(), ONE_TOKEN))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        EventOutcome::Ignored {
            reason: IgnoreReason::Excluded
        }
    );

    // Tokens flowing out of the pool only touch the recipient.
    h.dispatcher
        .dispatch(&token_transfer(0, pool(), a.clone(), ONE_TOKEN))
        .await
        .unwrap();
    assert!(h.repo.get_tracker(&pool()).await.unwrap().is_none());
    assert!(h.repo.get_tracker(&Address::null()).await.unwrap().is_none());
    assert_eq!(
        h.repo.get_tracker(&a).await.unwrap().unwrap().balance,
        TokenAmount::new(ONE_TOKEN)
    );

    // And tokens flowing into it only touch the sender.
    h.dispatcher
        .dispatch(&token_transfer(HOUR_MS, a.clone(), pool(), ONE_TOKEN))
        .await
        .unwrap();
    assert!(h.repo.get_tracker(&pool()).await.unwrap().is_none());
    assert_eq!(
        h.repo.get_account(&a).await.unwrap().unwrap().linear_points,
        d("1")
    );
}

#[tokio::test]
async fn test_events_before_start_block_are_ignored() {
    let config = Config {
        token_start_block: BlockHeight::new(5_000),
        ..test_config()
    };
    let h = setup_with_config(chain_at(150), config).await;

    let outcome = h
        .dispatcher
        .dispatch(&token_transfer(0, Address::null(), addr(1), ONE_TOKEN))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        EventOutcome::Ignored {
            reason: IgnoreReason::BeforeStartHeight
        }
    );
    assert!(h.repo.get_tracker(&addr(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_self_transfer_only_settles() {
    let h = setup(chain_at(150)).await;
    let a = addr(1);

    h.dispatcher
        .dispatch(&token_transfer(0, Address::null(), a.clone(), ONE_TOKEN))
        .await
        .unwrap();
    h.dispatcher
        .dispatch(&token_transfer(HOUR_MS, a.clone(), a.clone(), ONE_TOKEN))
        .await
        .unwrap();

    let tracker = h.repo.get_tracker(&a).await.unwrap().unwrap();
    assert_eq!(tracker.balance, TokenAmount::new(ONE_TOKEN));
    assert_eq!(
        h.repo.get_account(&a).await.unwrap().unwrap().linear_points,
        d("1")
    );
}

#[tokio::test]
async fn test_out_of_order_time_never_reduces_points() {
    let h = setup(chain_at(150)).await;
    let a = addr(1);

    h.dispatcher
        .dispatch(&token_transfer(0, Address::null(), a.clone(), ONE_TOKEN))
        .await
        .unwrap();
    h.dispatcher.tick(TimeMs::new(2 * HOUR_MS)).await.unwrap();
    h.dispatcher.tick(TimeMs::new(HOUR_MS)).await.unwrap();

    let account = h.repo.get_account(&a).await.unwrap().unwrap();
    assert_eq!(account.linear_points, d("2"));
    let tracker = h.repo.get_tracker(&a).await.unwrap().unwrap();
    assert_eq!(tracker.last_settled_at, Some(TimeMs::new(2 * HOUR_MS)));
}

#[tokio::test]
async fn test_totals_track_every_credit_and_notifications_fire() {
    let h = setup(chain_at(150)).await;
    let mut notifications = h.dispatcher.subscribe();
    let (a, b) = (addr(1), addr(2));

    h.dispatcher
        .dispatch(&token_transfer(0, Address::null(), a.clone(), ONE_TOKEN))
        .await
        .unwrap();
    h.dispatcher
        .dispatch(&token_transfer(0, Address::null(), b.clone(), 2 * ONE_TOKEN))
        .await
        .unwrap();
    h.dispatcher.tick(TimeMs::new(HOUR_MS)).await.unwrap();

    let totals = h.repo.totals().await.unwrap();
    assert_eq!(totals.linear_points, d("3"));
    assert_eq!(totals.boosted_points, d("3"));
    assert_eq!(h.repo.recompute_totals().await.unwrap(), totals);

    let mut seen = Vec::new();
    while let Ok(update) = notifications.try_recv() {
        seen.push(update);
    }
    seen.sort_by(|x, y| x.address.cmp(&y.address));
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].address, a);
    assert_eq!(seen[0].new_linear_points, d("1"));
    assert_eq!(seen[1].new_boosted_points, d("2"));
}
