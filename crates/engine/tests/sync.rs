mod common;

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use chrono::Utc;
use engine::{
    CategoryDraft, Identity, Ledger, Money, Mutation, PullOutcome, PushOutcome, SyncEvent,
    SyncOutcome, TransactionDraft, TransactionFilter, TransactionKind, TransactionPatch,
    WalletDraft, WalletPatch, WalletType, defaults,
};

use common::{FakeRemote, coordinator, hook, remote_tx};

fn alice() -> Identity {
    Identity::user("alice")
}

#[tokio::test]
async fn pull_seeds_an_empty_remote_and_never_leaves_the_replica_empty() {
    let remote = FakeRemote::default();
    let sync = coordinator(remote.clone(), alice()).await;

    let outcome = sync.pull(&alice()).await.unwrap();

    assert!(matches!(
        outcome,
        PullOutcome::Adopted {
            wallets: 1,
            categories: 13,
            ..
        }
    ));
    assert_eq!(remote.with(|s| s.seed_calls), 1);
    let replica = sync.store().replica(&alice());
    let wallets = replica.wallets().await.unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].name, defaults::DEFAULT_WALLET_NAME);
    assert_eq!(replica.categories().await.unwrap().len(), 13);

    // Seeded now, a second pull does not seed again.
    sync.pull(&alice()).await.unwrap();
    assert_eq!(remote.with(|s| s.seed_calls), 1);
}

#[tokio::test]
async fn failed_seed_is_reported_and_the_pull_goes_on() {
    let remote = FakeRemote::default();
    remote.with(|s| s.seed_fails = true);
    let sync = coordinator(remote.clone(), alice()).await;
    let mut events = sync.events();

    let outcome = sync.pull(&alice()).await.unwrap();

    assert!(matches!(outcome, PullOutcome::Adopted { wallets: 0, .. }));
    assert!(matches!(
        events.try_recv().unwrap(),
        SyncEvent::SeedFailed { .. }
    ));
}

#[tokio::test]
async fn push_drops_rejected_writes_and_stops_on_transport_failure() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());
    let wallet = ledger.replica().wallets().await.unwrap()[0].clone();
    let category = ledger.replica().categories().await.unwrap()[0].clone();

    let mut created = Vec::new();
    for amount in [100, 200, 300] {
        created.push(
            ledger
                .create_transaction(TransactionDraft::expense(
                    Money::new(amount),
                    category.id,
                    wallet.id,
                    Utc::now(),
                ))
                .await
                .unwrap(),
        );
    }
    remote.with(|s| {
        s.rejected_ids.insert(created[1].id);
        s.unreachable_ids.insert(created[2].id);
    });
    let mut events = sync.events();

    let outcome = sync.push(&alice()).await.unwrap();

    assert_eq!(outcome, PushOutcome::Stalled { sent: 1, rejected: 1 });
    let queued = sync.queue().all().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].mutation.entity_id(), created[2].id);
    assert_eq!(queued[0].retry_count, 1);
    assert!(matches!(
        events.try_recv().unwrap(),
        SyncEvent::MutationRejected { label, .. } if label == "CREATE_TRANSACTION"
    ));
    assert!(matches!(
        events.try_recv().unwrap(),
        SyncEvent::PushStalled { retry_count: 1, .. }
    ));

    // Back online: the stuck head goes through on the next push.
    remote.with(|s| s.unreachable_ids.clear());
    assert_eq!(
        sync.push(&alice()).await.unwrap(),
        PushOutcome::Drained { sent: 1, rejected: 0 }
    );
    assert!(sync.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn push_preserves_enqueue_order_and_never_skips_a_stuck_head() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());

    let wallet = ledger
        .create_wallet(WalletDraft::new("Bank", WalletType::Bank))
        .await
        .unwrap();
    let category = ledger
        .create_category(CategoryDraft::new("Rent", TransactionKind::Expense, "home"))
        .await
        .unwrap();
    let tx = ledger
        .create_transaction(TransactionDraft::expense(
            Money::new(90_000),
            category.id,
            wallet.id,
            Utc::now(),
        ))
        .await
        .unwrap();
    ledger
        .update_transaction(tx.id, TransactionPatch::default().amount(Money::new(85_000)))
        .await
        .unwrap();

    remote.with(|s| {
        s.unreachable_ids.insert(category.id);
    });
    assert!(matches!(
        sync.push(&alice()).await.unwrap(),
        PushOutcome::Stalled { sent: 1, .. }
    ));
    assert_eq!(remote.written_labels(), vec!["CREATE_WALLET"]);

    remote.with(|s| s.unreachable_ids.clear());
    sync.push(&alice()).await.unwrap();
    assert_eq!(
        remote.written_labels(),
        vec![
            "CREATE_WALLET",
            "CREATE_CATEGORY",
            "CREATE_TRANSACTION",
            "UPDATE_TRANSACTION"
        ]
    );
    let remote_bank = remote.with(|s| s.wallets.iter().find(|w| w.id == wallet.id).cloned());
    assert_eq!(remote_bank.unwrap().balance, Money::new(-85_000));
}

#[tokio::test]
async fn replaying_a_create_twice_yields_one_entity() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());
    let wallet = ledger.replica().wallets().await.unwrap()[0].clone();
    let category = ledger.replica().categories().await.unwrap()[0].clone();

    let tx = ledger
        .create_transaction(TransactionDraft::expense(
            Money::new(1_500),
            category.id,
            wallet.id,
            Utc::now(),
        ))
        .await
        .unwrap();
    let record = sync.queue().peek().await.unwrap().unwrap();
    sync.queue()
        .enqueue(record.mutation.clone(), "alice")
        .await
        .unwrap();

    sync.push(&alice()).await.unwrap();

    assert_eq!(remote.with(|s| s.writes.len()), 2);
    assert_eq!(
        remote.with(|s| s.transactions.iter().filter(|t| t.id == tx.id).count()),
        1
    );
    assert_eq!(
        remote.with(|s| s.wallets[0].balance),
        Money::new(-1_500)
    );
}

#[tokio::test]
async fn pull_replaces_local_collections_with_the_snapshot() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    let replica = sync.store().replica(&alice());

    // Local-only data that the remote never heard of and that is not queued.
    let stray = replica
        .create_wallet(WalletDraft::new("Stray", WalletType::Cash))
        .await
        .unwrap();

    let (wallet, category) = remote.with(|s| (s.wallets[0].clone(), s.categories[0].clone()));
    let remote_txs: Vec<_> = (0..3)
        .map(|i| remote_tx(&wallet, &category, 100 * (i + 1), TransactionKind::Expense))
        .collect();
    remote.with(|s| s.transactions = remote_txs.clone());

    sync.pull(&alice()).await.unwrap();

    let wallets = replica.wallets().await.unwrap();
    assert!(wallets.iter().all(|w| w.id != stray.id));
    let remote_wallet_ids: Vec<_> = remote.with(|s| s.wallets.iter().map(|w| w.id).collect());
    assert_eq!(
        wallets.iter().map(|w| w.id).collect::<Vec<_>>(),
        remote_wallet_ids
    );
    let mut local_ids: Vec<_> = replica
        .transactions(&TransactionFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    let mut remote_ids: Vec<_> = remote_txs.iter().map(|t| t.id).collect();
    local_ids.sort();
    remote_ids.sort();
    assert_eq!(local_ids, remote_ids);
    assert_eq!(
        replica.categories().await.unwrap().len(),
        remote.with(|s| s.categories.len())
    );
}

#[tokio::test]
async fn queued_writes_are_replayed_on_top_of_the_snapshot() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());
    let wallet = ledger.replica().wallets().await.unwrap()[0].clone();
    let category = ledger.replica().categories().await.unwrap()[0].clone();

    let tx = ledger
        .create_transaction(TransactionDraft::expense(
            Money::new(4_200),
            category.id,
            wallet.id,
            Utc::now(),
        ))
        .await
        .unwrap();

    // Pull before the write was pushed.
    let outcome = sync.pull(&alice()).await.unwrap();
    assert!(matches!(outcome, PullOutcome::Adopted { replayed: 1, .. }));

    let replica = ledger.replica();
    assert!(replica.transaction(tx.id).await.unwrap().is_some());
    assert_eq!(
        replica.wallet(wallet.id).await.unwrap().unwrap().balance,
        Money::new(-4_200)
    );

    // Once pushed, the remote holds it and a pull changes nothing.
    sync.push(&alice()).await.unwrap();
    assert!(matches!(
        sync.pull(&alice()).await.unwrap(),
        PullOutcome::Adopted { replayed: 0, .. }
    ));
    assert_eq!(
        replica.wallet(wallet.id).await.unwrap().unwrap().balance,
        Money::new(-4_200)
    );
}

#[tokio::test]
async fn snapshot_of_a_stale_identity_is_discarded() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    let presence = sync.presence().clone();
    remote.with(|s| {
        s.on_snapshot = hook(async move {
            presence.set_identity(Some(Identity::user("bob")));
        });
    });
    let notified = Arc::new(AtomicUsize::new(0));
    let _sub = {
        let notified = Arc::clone(&notified);
        sync.notifier().subscribe(move |_| {
            notified.fetch_add(1, Ordering::SeqCst);
        })
    };

    let outcome = sync.pull(&alice()).await.unwrap();

    assert_eq!(outcome, PullOutcome::Discarded);
    assert!(sync.store().replica(&alice()).wallets().await.unwrap().is_empty());
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_pull_leaves_the_replica_untouched() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let before: Vec<_> = sync
        .store()
        .replica(&alice())
        .wallets()
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.id)
        .collect();

    remote.with(|s| {
        s.offline = true;
        s.wallets.clear();
    });
    let mut events = sync.events();
    assert_eq!(sync.pull(&alice()).await.unwrap(), PullOutcome::Failed);

    let after: Vec<_> = sync
        .store()
        .replica(&alice())
        .wallets()
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.id)
        .collect();
    assert_eq!(after, before);
    assert!(matches!(
        events.try_recv().unwrap(),
        SyncEvent::PullFailed { .. }
    ));
    assert!(sync.status().borrow().last_error.is_some());
}

#[tokio::test]
async fn notifier_fires_once_per_successful_pull() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    let notified = Arc::new(AtomicUsize::new(0));
    let sub = {
        let notified = Arc::clone(&notified);
        sync.notifier().subscribe(move |identity| {
            assert_eq!(identity, &Identity::user("alice"));
            notified.fetch_add(1, Ordering::SeqCst);
        })
    };

    sync.pull(&alice()).await.unwrap();
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    remote.with(|s| s.offline = true);
    sync.pull(&alice()).await.unwrap();
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    remote.with(|s| s.offline = false);
    sub.unsubscribe();
    sync.pull(&alice()).await.unwrap();
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn push_only_replays_the_acting_owner() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    let category = remote.with(|s| s.categories[0].clone());

    sync.queue()
        .enqueue(Mutation::CreateCategory(category.clone()), "bob")
        .await
        .unwrap();
    sync.queue()
        .enqueue(Mutation::UpdateCategory(category.clone()), "alice")
        .await
        .unwrap();

    sync.push(&alice()).await.unwrap();

    assert_eq!(
        remote.with(|s| s.writes.clone()),
        vec![(
            "alice".to_string(),
            "UPDATE_CATEGORY".to_string(),
            category.id
        )]
    );
    let left = sync.queue().all().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].owner, "bob");
}

#[tokio::test]
async fn guests_write_locally_and_never_enqueue() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), Identity::Guest).await;
    let ledger = Ledger::new(sync.clone());

    let wallets = ledger.replica().wallets().await.unwrap();
    let categories = ledger.replica().categories().await.unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(categories.len(), 13);

    ledger
        .create_transaction(TransactionDraft::expense(
            Money::new(1_000),
            categories[0].id,
            wallets[0].id,
            Utc::now(),
        ))
        .await
        .unwrap();

    assert!(sync.queue().is_empty().await.unwrap());
    assert_eq!(
        sync.sync(&Identity::Guest).await.unwrap(),
        SyncOutcome::Completed {
            push: PushOutcome::Skipped,
            pull: PullOutcome::Skipped
        }
    );
    assert_eq!(remote.with(|s| s.snapshot_calls), 0);
}

#[tokio::test]
async fn failed_local_write_enqueues_nothing() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());
    let wallet = ledger.replica().wallets().await.unwrap()[0].clone();

    let result = ledger
        .create_transaction(TransactionDraft::expense(
            Money::new(-5),
            uuid::Uuid::new_v4(),
            wallet.id,
            Utc::now(),
        ))
        .await;

    assert!(result.is_err());
    assert!(sync.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn offline_cycle_is_skipped_and_online_cycle_pushes_then_pulls() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.presence().set_online(false);

    assert_eq!(sync.sync(&alice()).await.unwrap(), SyncOutcome::Offline);
    assert_eq!(remote.with(|s| s.snapshot_calls), 0);

    sync.presence().set_online(true);
    let outcome = sync.sync(&alice()).await.unwrap();
    assert!(matches!(
        outcome,
        SyncOutcome::Completed {
            push: PushOutcome::Drained { .. },
            pull: PullOutcome::Adopted { .. }
        }
    ));
    assert!(sync.status().borrow().last_synced.is_some());
    assert!(!sync.status().borrow().syncing);
}

#[tokio::test]
async fn wipe_drops_local_data_and_queued_writes_of_one_identity() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());
    ledger
        .create_wallet(WalletDraft::new("Bank", WalletType::Bank))
        .await
        .unwrap();
    sync.queue()
        .enqueue(Mutation::DeleteBudget { id: uuid::Uuid::new_v4() }, "bob")
        .await
        .unwrap();

    ledger.wipe(&alice()).await.unwrap();

    assert!(sync.store().replica(&alice()).wallets().await.unwrap().is_empty());
    assert!(!sync.store().is_initialized(&alice()).await.unwrap());
    let left = sync.queue().all().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].owner, "bob");
}

#[tokio::test]
async fn queued_wallet_rename_keeps_the_fresher_remote_balance() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());
    let wallet = ledger.replica().wallets().await.unwrap()[0].clone();
    let salary = ledger
        .replica()
        .categories()
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.kind == TransactionKind::Income)
        .unwrap();

    // Renamed offline, while another device books an income on the wallet.
    ledger
        .update_wallet(wallet.id, WalletPatch::default().name("Dompet"))
        .await
        .unwrap();
    remote.with(|s| {
        s.unreachable_ids.insert(wallet.id);
        let income = remote_tx(&wallet, &salary, 10_000, TransactionKind::Income);
        s.apply(&Mutation::CreateTransaction(income));
    });

    let outcome = sync.sync(&alice()).await.unwrap();
    assert!(matches!(
        outcome,
        SyncOutcome::Completed {
            push: PushOutcome::Stalled { sent: 0, .. },
            pull: PullOutcome::Adopted { replayed: 1, .. }
        }
    ));
    let local = ledger.replica().wallet(wallet.id).await.unwrap().unwrap();
    assert_eq!(local.name, "Dompet");
    assert_eq!(local.balance, Money::new(10_000));

    remote.with(|s| s.unreachable_ids.clear());
    assert_eq!(
        sync.push(&alice()).await.unwrap(),
        PushOutcome::Drained { sent: 1, rejected: 0 }
    );
    let remote_wallet = remote.with(|s| s.wallets[0].clone());
    assert_eq!(remote_wallet.name, "Dompet");
    assert_eq!(remote_wallet.balance, Money::new(10_000));
}

#[tokio::test]
async fn queued_correction_sets_the_balance_on_both_sides() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());
    let wallet = ledger.replica().wallets().await.unwrap()[0].clone();

    ledger
        .correct_wallet_balance(wallet.id, Money::new(50_000), Some("recount".to_string()))
        .await
        .unwrap();

    // Not pushed yet: the pull reapplies the correction over the snapshot.
    sync.pull(&alice()).await.unwrap();
    assert_eq!(
        ledger.replica().wallet(wallet.id).await.unwrap().unwrap().balance,
        Money::new(50_000)
    );

    sync.push(&alice()).await.unwrap();
    assert_eq!(remote.with(|s| s.wallets[0].balance), Money::new(50_000));
}

#[tokio::test]
async fn push_started_during_a_pull_leaves_the_write_for_the_replay() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());
    let wallet = ledger.replica().wallets().await.unwrap()[0].clone();
    let category = ledger.replica().categories().await.unwrap()[0].clone();

    let tx = ledger
        .create_transaction(TransactionDraft::expense(
            Money::new(2_500),
            category.id,
            wallet.id,
            Utc::now(),
        ))
        .await
        .unwrap();

    let during_pull = Arc::new(Mutex::new(None));
    {
        let sync = sync.clone();
        let during_pull = Arc::clone(&during_pull);
        remote.with(|s| {
            s.on_snapshot = hook(async move {
                let outcome = sync.push(&alice()).await.unwrap();
                *during_pull.lock().unwrap() = Some(outcome);
            });
        });
    }

    let outcome = sync.pull(&alice()).await.unwrap();

    assert_eq!(*during_pull.lock().unwrap(), Some(PushOutcome::Busy));
    assert!(matches!(
        outcome,
        PullOutcome::Adopted {
            transactions: 0,
            replayed: 1,
            ..
        }
    ));
    let replica = ledger.replica();
    assert!(replica.transaction(tx.id).await.unwrap().is_some());
    assert_eq!(
        replica.wallet(wallet.id).await.unwrap().unwrap().balance,
        Money::new(-2_500)
    );

    assert_eq!(
        sync.push(&alice()).await.unwrap(),
        PushOutcome::Drained { sent: 1, rejected: 0 }
    );
    assert!(remote.with(|s| s.transactions.iter().any(|t| t.id == tx.id)));
}

#[tokio::test]
async fn identity_switch_stops_a_push_between_writes() {
    let remote = FakeRemote::seeded();
    let sync = coordinator(remote.clone(), alice()).await;
    sync.pull(&alice()).await.unwrap();
    let ledger = Ledger::new(sync.clone());
    let wallet = ledger.replica().wallets().await.unwrap()[0].clone();
    let category = ledger.replica().categories().await.unwrap()[0].clone();
    for amount in [100, 200, 300] {
        ledger
            .create_transaction(TransactionDraft::expense(
                Money::new(amount),
                category.id,
                wallet.id,
                Utc::now(),
            ))
            .await
            .unwrap();
    }

    let presence = sync.presence().clone();
    remote.with(|s| {
        s.on_write = hook(async move {
            presence.set_identity(Some(Identity::user("bob")));
        });
    });

    assert_eq!(
        sync.push(&alice()).await.unwrap(),
        PushOutcome::Interrupted { sent: 1, rejected: 0 }
    );
    assert_eq!(remote.with(|s| s.writes.len()), 1);
    let left = sync.queue().pending_for("alice").await.unwrap();
    assert_eq!(left.len(), 2);
    assert!(left.iter().all(|record| record.retry_count == 0));

    sync.presence().set_identity(Some(alice()));
    assert_eq!(
        sync.push(&alice()).await.unwrap(),
        PushOutcome::Drained { sent: 2, rejected: 0 }
    );
}
