mod common;

use std::sync::Arc;

use common::{fast_retry, user, usd, World};
use paygate::limits::{LimitChecker, Limits};
use paygate::model::{DepositoryStatus, OriginatorId, TransferStatus};
use paygate::repository::{DepositoryRepository, TransferRepository};
use paygate::rng::SeededRandom;
use paygate::secrets::Base64Keeper;
use paygate::transfers::{TransferError, TransferService};
use paygate::ErrorKind;

fn service(world: &World, limits: Limits) -> TransferService {
    TransferService::new(
        world.repo.clone(),
        world.repo.clone(),
        world.repo.clone(),
        world.repo.clone(),
        LimitChecker::new(world.repo.clone(), limits),
        world.ach.clone(),
        Arc::new(SeededRandom::new(11)),
        Arc::new(Base64Keeper),
        fast_retry(),
    )
}

#[tokio::test]
async fn test_submit_persists_after_validation() {
    let world = World::new().await;
    let svc = service(&world, Limits::default());

    let t = svc
        .submit(&user(), world.transfer("25.00"), "idem-1")
        .await
        .unwrap();
    let file_id = t.file_id.clone().unwrap();
    assert!(world.ach.file(&file_id).is_some());
    assert!(t.trace_number.as_deref().unwrap().starts_with("12104288"));

    let stored = world
        .repo
        .get_user_transfer(&t.id, &user())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TransferStatus::Pending);
    assert_eq!(stored.file_id, Some(file_id));
}

#[tokio::test]
async fn test_rejected_file_persists_nothing() {
    let world = World::new().await;
    world.ach.set_reject_create(true);
    let svc = service(&world, Limits::default());

    let t = world.transfer("25.00");
    let err = svc.submit(&user(), t.clone(), "idem-2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::External);
    assert!(world.repo.get_user_transfer(&t.id, &user()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_validation_deletes_remote_file() {
    let world = World::new().await;
    world.ach.set_reject_validate(true);
    let svc = service(&world, Limits::default());

    let t = world.transfer("25.00");
    assert!(svc.submit(&user(), t.clone(), "idem-3").await.is_err());
    assert_eq!(world.ach.file_count(), 0);
    assert_eq!(world.ach.deleted().len(), 1);
    assert!(world.repo.get_user_transfer(&t.id, &user()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_limits_are_enforced() {
    let world = World::new().await;
    let svc = service(
        &world,
        Limits {
            previous_seven_days: Some(usd("500.00")),
            ..Limits::default()
        },
    );

    svc.submit(&user(), world.transfer("450.00"), "idem-4")
        .await
        .unwrap();
    let err = svc
        .submit(&user(), world.transfer("100.00"), "idem-5")
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Limit(_)));
    assert_eq!(err.to_string(), "over limit by USD 50.00");
    assert_eq!(world.ach.file_count(), 1);
}

#[tokio::test]
async fn test_missing_and_unverified_entities() {
    let world = World::new().await;
    let svc = service(&world, Limits::default());

    let mut t = world.transfer("1.00");
    t.originator = OriginatorId::from("nope");
    let err = svc.submit(&user(), t, "idem-6").await.unwrap_err();
    assert!(matches!(err, TransferError::OriginatorNotFound));

    world
        .repo
        .update_depository_status(&world.receiver_dep.id, DepositoryStatus::Rejected, chrono::Utc::now())
        .await
        .unwrap();
    let err = svc
        .submit(&user(), world.transfer("1.00"), "idem-7")
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::DepositoryNotVerified(_)));
    assert_eq!(world.ach.create_calls(), 0);
}

#[tokio::test]
async fn test_tombstoned_receiver_is_not_found() {
    use paygate::repository::ReceiverRepository;

    let world = World::new().await;
    world
        .repo
        .delete_receiver(&world.receiver.id, &user(), chrono::Utc::now())
        .await
        .unwrap();
    let svc = service(&world, Limits::default());
    let err = svc
        .submit(&user(), world.transfer("1.00"), "idem-8")
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::ReceiverNotFound));
}

#[tokio::test]
async fn test_created_is_stamped_after_validation() {
    let world = World::new().await;
    let svc = service(&world, Limits::default());

    let t = svc
        .submit(&user(), world.transfer("25.00"), "idem-stamp")
        .await
        .unwrap();
    let validated = world.ach.last_validated().unwrap();
    assert!(t.created >= validated);
    let stored = world
        .repo
        .get_user_transfer(&t.id, &user())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.created, t.created);
}
