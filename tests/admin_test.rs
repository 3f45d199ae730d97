mod common;

use chrono::{Duration, Utc};
use common::*;
use file_share_access::api::error::AppError;
use file_share_access::models::{Actor, Role};

#[tokio::test]
async fn test_non_admins_are_refused_every_admin_operation() {
    let env = setup_env().await;
    let alice = create_user(&env.db, "alice@example.com", Role::User).await;
    let guest = create_user(&env.db, "guest@example.com", Role::Guest).await;
    let admin = env.gateway.admin();

    for actor in [&alice, &guest] {
        let err = admin.list_users(actor).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = admin.user_files(actor, &alice.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = admin.update_role(actor, &alice.id, "ADMIN").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    let stored = admin
        .list_users(&create_user(&env.db, "root@example.com", Role::Admin).await)
        .await
        .unwrap();
    let alice_row = stored.iter().find(|u| u.id == alice.id).unwrap();
    assert_eq!(alice_row.role, "USER");
}

#[tokio::test]
async fn test_role_change_takes_effect_on_next_request() {
    let env = setup_env().await;
    let root = create_user(&env.db, "root@example.com", Role::Admin).await;
    let alice = create_user(&env.db, "alice@example.com", Role::User).await;

    env.gateway
        .upload(&alice, "before.txt", Some("text/plain"), b"hello".to_vec())
        .await
        .unwrap();

    let updated = env
        .gateway
        .admin()
        .update_role(&root, &alice.id, "guest")
        .await
        .unwrap();
    assert_eq!(updated.role, "GUEST");

    let demoted = Actor::try_from(updated).unwrap();
    let err = env
        .gateway
        .upload(&demoted, "after.txt", Some("text/plain"), b"hello".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_role_update_validation() {
    let env = setup_env().await;
    let root = create_user(&env.db, "root@example.com", Role::Admin).await;
    let alice = create_user(&env.db, "alice@example.com", Role::User).await;
    let admin = env.gateway.admin();

    let err = admin.update_role(&root, &alice.id, "SUPERUSER").await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = admin.update_role(&root, &root.id, "USER").await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = admin.update_role(&root, "nobody", "USER").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_user_files_lists_only_that_owner_newest_first() {
    let env = setup_env().await;
    let root = create_user(&env.db, "root@example.com", Role::Admin).await;
    let alice = create_user(&env.db, "alice@example.com", Role::User).await;
    let bob = create_user(&env.db, "bob@example.com", Role::User).await;

    let now = Utc::now();
    let old = create_file_at(&env, &alice, "old.txt", b"1", now - Duration::hours(2)).await;
    let new = create_file_at(&env, &alice, "new.txt", b"2", now).await;
    create_file(&env, &bob, "bob.txt", b"3").await;

    let files = env.gateway.admin().user_files(&root, &alice.id).await.unwrap();
    let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec![new.id.as_str(), old.id.as_str()]);

    let err = env
        .gateway
        .admin()
        .user_files(&root, "nobody")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
