mod common;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use common::{depository, fast_retry, user, World, ORIGIN_ROUTING, RECEIVER_ROUTING};
use paygate::config::OdfiConfig;
use paygate::cursor::{MicroDepositCursor, TransferCursor};
use paygate::limits::{LimitChecker, Limits};
use paygate::merge::{MemorySink, MergeWorker};
use paygate::micro_deposit::{MemoryAttempter, MicroDepositService, OdfiAccount};
use paygate::model::TransferStatus;
use paygate::repository::{DepositoryRepository, TransferRepository};
use paygate::rng::SeededRandom;
use paygate::secrets::Base64Keeper;
use paygate::transfers::TransferService;

fn worker(world: &World, sink: &Arc<MemorySink>) -> MergeWorker {
    MergeWorker::new(
        TransferCursor::new(world.repo.clone(), world.repo.clone(), 2),
        MicroDepositCursor::new(world.repo.clone(), 2),
        world.ach.clone(),
        sink.clone(),
        ORIGIN_ROUTING,
        Duration::from_secs(60),
    )
}

async fn submit_transfers(world: &World, n: usize) {
    let svc = TransferService::new(
        world.repo.clone(),
        world.repo.clone(),
        world.repo.clone(),
        world.repo.clone(),
        LimitChecker::new(world.repo.clone(), Limits::default()),
        world.ach.clone(),
        Arc::new(SeededRandom::new(3)),
        Arc::new(Base64Keeper),
        fast_retry(),
    );
    for i in 0..n {
        svc.submit(&user(), world.transfer("10.00"), &format!("key-{i}"))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_merge_claims_each_record_once() {
    let world = World::new().await;
    submit_transfers(&world, 3).await;

    let sink = Arc::new(MemorySink::new());
    let mut first = worker(&world, &sink);
    let merged = first.run_once().await.unwrap();
    assert_eq!(sink.files(), merged);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].routing_number, ORIGIN_ROUTING);
    assert!(merged[0].filename.ends_with(&format!("-{ORIGIN_ROUTING}-1.ach")));
    assert_eq!(merged[0].transfers.len(), 3);
    assert_eq!(merged[0].sources.len(), 3);
    assert!(merged[0].sources.iter().all(|s| !s.contents.is_empty()));

    for id in &merged[0].transfers {
        let t = world.repo.get_user_transfer(id, &user()).await.unwrap().unwrap();
        assert_eq!(t.status, TransferStatus::Processed);
        assert_eq!(t.merged_filename.as_deref(), Some(merged[0].filename.as_str()));
    }

    // a second pass, and a racing worker, find nothing left to claim
    assert!(first.run_once().await.unwrap().is_empty());
    assert!(worker(&world, &sink).run_once().await.unwrap().is_empty());
    assert_eq!(sink.files().len(), 1);
}

#[tokio::test]
async fn test_micro_deposits_merge_under_odfi_routing() {
    let world = World::new().await;
    submit_transfers(&world, 1).await;

    let keeper = Arc::new(Base64Keeper);
    let micro = MicroDepositService::new(
        world.repo.clone(),
        world.repo.clone(),
        Arc::new(MemoryAttempter::default()),
        world.ach.clone(),
        Arc::new(OdfiAccount::new(OdfiConfig::default(), keeper.clone(), None)),
        Arc::new(SeededRandom::new(5)),
        keeper,
        fast_retry(),
    );
    let dep = depository(RECEIVER_ROUTING, "555");
    world.repo.upsert_depository(&dep).await.unwrap();
    let deposits = micro.submit(&dep.id, &user()).await.unwrap();

    let sink = Arc::new(MemorySink::new());
    let merged = worker(&world, &sink).run_once().await.unwrap();
    // the default ODFI routing matches the originator depository's
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].transfers.len(), 1);
    assert_eq!(
        merged[0].micro_deposits,
        vec![(dep.id.clone(), deposits[0].file_id.clone())]
    );
    assert_eq!(merged[0].sources.len(), 2);
}

async fn assert_all_pending(world: &World) {
    let transfers = world
        .repo
        .get_user_transfers_since(&user(), Utc::now() - chrono::Duration::hours(1))
        .await
        .unwrap();
    assert!(!transfers.is_empty());
    for t in transfers {
        assert_eq!(t.status, TransferStatus::Pending);
        assert_eq!(t.merged_filename, None);
    }
}

#[tokio::test]
async fn test_failed_store_releases_claims() {
    let world = World::new().await;
    submit_transfers(&world, 3).await;
    let sink = Arc::new(MemorySink::new());
    sink.fail_stores(1);

    let mut w = worker(&world, &sink);
    let err = w.run_once().await.unwrap_err();
    assert_eq!(err.code(), "MERGE_STORE_FAILED");
    assert!(sink.files().is_empty());
    assert_all_pending(&world).await;

    // the same worker picks everything up again
    let merged = w.run_once().await.unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].transfers.len(), 3);
    assert_eq!(sink.files(), merged);
}

#[tokio::test]
async fn test_unavailable_contents_are_retried_next_pass() {
    let world = World::new().await;
    submit_transfers(&world, 3).await;
    world.ach.fail_contents(1);
    let sink = Arc::new(MemorySink::new());

    let mut w = worker(&world, &sink);
    let first = w.run_once().await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].transfers.len(), 2);

    let second = w.run_once().await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].transfers.len(), 1);
    assert!(!first[0].transfers.contains(&second[0].transfers[0]));
    assert_ne!(first[0].filename, second[0].filename);

    let transfers = world
        .repo
        .get_user_transfers_since(&user(), Utc::now() - chrono::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(transfers.len(), 3);
    assert!(transfers.iter().all(|t| t.status == TransferStatus::Processed));
    assert!(w.run_once().await.unwrap().is_empty());
}
