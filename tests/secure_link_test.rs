mod common;

use chrono::{Duration, Utc};
use common::*;
use file_share_access::api::error::AppError;
use file_share_access::entities::prelude::*;
use file_share_access::models::Role;
use file_share_access::services::secure_link_service::SecureLinkService;
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn test_link_is_consumed_exactly_once() {
    let env = setup_env().await;
    let owner = create_user(&env.db, "owner@example.com", Role::User).await;
    let file = create_file(&env, &owner, "notes.txt", b"top secret").await;
    let links = env.gateway.links();

    let issued = links.issue(&file, &owner, Some(60)).await.unwrap();
    let ttl = issued.expires_at - Utc::now();
    assert!(ttl > Duration::minutes(59) && ttl <= Duration::minutes(60));

    let stream = env.gateway.fetch_via_link(&issued.id).await.unwrap();
    assert_eq!(stream.filename, "notes.txt");
    assert_eq!(stream.content_type, "text/plain");
    assert_eq!(read_all(stream.reader).await, b"top secret");

    let err = env.gateway.fetch_via_link(&issued.id).await.err().unwrap();
    assert!(matches!(err, AppError::AlreadyUsed));

    let stored = SecureLinks::find_by_id(issued.id.clone())
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_used);
    assert!(stored.used_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumes_have_one_winner() {
    let env = setup_pooled_env().await;
    let owner = create_user(&env.db, "owner@example.com", Role::User).await;
    let file = create_file(&env, &owner, "notes.txt", b"top secret").await;

    for _ in 0..10 {
        let issued = env.gateway.links().issue(&file, &owner, None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let links: SecureLinkService = env.gateway.links().clone();
            let id = issued.id.clone();
            handles.push(tokio::spawn(async move {
                links.consume(&id).await.map(|stream| stream.size)
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(size) => {
                    assert_eq!(size, 10);
                    winners += 1;
                }
                Err(e) => assert!(matches!(e, AppError::AlreadyUsed), "unexpected error: {}", e),
            }
        }
        assert_eq!(winners, 1);

        let stored = SecureLinks::find_by_id(issued.id.clone())
            .one(&env.db)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_used);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_losers_wait_for_slow_winner_then_see_used_link() {
    let env = setup_pooled_env().await;
    let owner = create_user(&env.db, "owner@example.com", Role::User).await;
    let file = create_file(&env, &owner, "notes.txt", b"top secret").await;
    let issued = env.gateway.links().issue(&file, &owner, None).await.unwrap();
    env.storage.set_read_delay(std::time::Duration::from_millis(300));

    let started = std::time::Instant::now();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let links = env.gateway.links().clone();
        let id = issued.id.clone();
        handles.push(tokio::spawn(async move {
            let result = links.consume(&id).await.map(|_| ());
            (result, started.elapsed())
        }));
    }

    let mut winners = 0;
    for handle in handles {
        let (result, elapsed) = handle.await.unwrap();
        match result {
            Ok(()) => winners += 1,
            Err(e) => {
                assert!(matches!(e, AppError::AlreadyUsed), "unexpected error: {}", e);
                // Only released once the winner finished opening the blob.
                assert!(elapsed >= std::time::Duration::from_millis(300));
            }
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_expired_link_is_rejected_even_if_unused() {
    let env = setup_env().await;
    let owner = create_user(&env.db, "owner@example.com", Role::User).await;
    let file = create_file(&env, &owner, "notes.txt", b"top secret").await;

    let expired = insert_link(&env.db, &file, Duration::minutes(-1), false).await;
    let err = env.gateway.fetch_via_link(&expired.id).await.err().unwrap();
    assert!(matches!(err, AppError::Expired));
    assert!(err.is_gone());

    // Expiry wins over use when both apply
    let both = insert_link(&env.db, &file, Duration::minutes(-1), true).await;
    let err = env.gateway.fetch_via_link(&both.id).await.err().unwrap();
    assert!(matches!(err, AppError::Expired));
}

#[tokio::test]
async fn test_unknown_link_is_not_found() {
    let env = setup_env().await;
    let err = env
        .gateway
        .fetch_via_link(&SecureLinkService::generate_token())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_storage_failure_leaves_link_unused() {
    let env = setup_env().await;
    let owner = create_user(&env.db, "owner@example.com", Role::User).await;
    let file = create_file(&env, &owner, "notes.txt", b"top secret").await;
    let issued = env.gateway.links().issue(&file, &owner, None).await.unwrap();

    env.storage.set_fail_reads(true);
    let err = env.gateway.fetch_via_link(&issued.id).await.err().unwrap();
    assert!(matches!(err, AppError::StorageFailure(_)));

    let stored = SecureLinks::find_by_id(issued.id.clone())
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_used);

    env.storage.set_fail_reads(false);
    let stream = env.gateway.fetch_via_link(&issued.id).await.unwrap();
    assert_eq!(read_all(stream.reader).await, b"top secret");
}

#[tokio::test]
async fn test_only_owner_issues_links_within_ttl_bounds() {
    let env = setup_env().await;
    let owner = create_user(&env.db, "owner@example.com", Role::User).await;
    let admin = create_user(&env.db, "root@example.com", Role::Admin).await;
    let alice = create_user(&env.db, "alice@example.com", Role::User).await;
    let file = create_file(&env, &owner, "notes.txt", b"top secret").await;
    let links = env.gateway.links();

    env.gateway
        .shares()
        .create_or_update_share(&file, &owner, "alice@example.com", "DOWNLOAD", None)
        .await
        .unwrap();

    for actor in [&alice, &admin] {
        let err = links.issue(&file, actor, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotOwner));
    }

    for ttl in [0, -5, env.config.max_secure_link_ttl_minutes + 1] {
        let err = links.issue(&file, &owner, Some(ttl)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    let issued = links.issue(&file, &owner, None).await.unwrap();
    assert_eq!(issued.id.len(), 43);
    assert_eq!(SecureLinks::find().count(&env.db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_sweep_respects_retention_window() {
    let env = setup_env().await;
    let owner = create_user(&env.db, "owner@example.com", Role::User).await;
    let file = create_file(&env, &owner, "notes.txt", b"top secret").await;

    let stale = insert_link(&env.db, &file, Duration::hours(-25), false).await;
    let stale_used = insert_link(&env.db, &file, Duration::hours(-26), true).await;
    let recent = insert_link(&env.db, &file, Duration::hours(-1), false).await;
    let active = insert_link(&env.db, &file, Duration::hours(1), false).await;

    let removed = env.gateway.links().sweep().await.unwrap();
    assert_eq!(removed, 2);

    for gone in [&stale, &stale_used] {
        assert!(
            SecureLinks::find_by_id(gone.id.clone())
                .one(&env.db)
                .await
                .unwrap()
                .is_none()
        );
    }
    for kept in [&recent, &active] {
        assert!(
            SecureLinks::find_by_id(kept.id.clone())
                .one(&env.db)
                .await
                .unwrap()
                .is_some()
        );
    }

    // Idempotent
    assert_eq!(env.gateway.links().sweep().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sweep_at_uses_supplied_clock() {
    let env = setup_env().await;
    let owner = create_user(&env.db, "owner@example.com", Role::User).await;
    let file = create_file(&env, &owner, "notes.txt", b"top secret").await;
    insert_link(&env.db, &file, Duration::hours(1), false).await;

    let links = env.gateway.links();
    assert_eq!(links.sweep_at(Utc::now()).await.unwrap(), 0);
    assert_eq!(
        links
            .sweep_at(Utc::now() + Duration::hours(26))
            .await
            .unwrap(),
        1
    );
}
