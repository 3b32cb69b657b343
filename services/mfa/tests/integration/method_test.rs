use bilten_mfa::domain::methods::{MethodStore, NewMethod};
use bilten_mfa::domain::repository::MethodCacheKey;
use bilten_mfa::domain::types::MethodKind;
use bilten_mfa::error::MfaServiceError;
use uuid::Uuid;

use crate::helpers::{
    MemoryMethodCache, MockMethodRepo, NullMethodCache, TEST_SECRET, test_method, test_user,
};

fn store(repo: MockMethodRepo) -> MethodStore<MockMethodRepo, NullMethodCache> {
    MethodStore::new(repo, NullMethodCache)
}

fn new_totp(user_id: Uuid) -> NewMethod {
    NewMethod {
        user_id,
        kind: MethodKind::Totp,
        secret: Some(TEST_SECRET.to_owned()),
        phone_number: None,
        is_active: true,
    }
}

#[tokio::test]
async fn should_require_secret_for_totp_and_phone_for_sms() {
    let user = test_user();
    let store = store(MockMethodRepo::empty());

    let result = store
        .create(NewMethod {
            secret: None,
            ..new_totp(user.id)
        })
        .await;
    assert!(matches!(result, Err(MfaServiceError::MissingSecret)));

    let result = store
        .create(NewMethod {
            user_id: user.id,
            kind: MethodKind::Sms,
            secret: None,
            phone_number: None,
            is_active: false,
        })
        .await;
    assert!(matches!(result, Err(MfaServiceError::MissingPhoneNumber)));

    // Email needs neither.
    store
        .create(NewMethod {
            user_id: user.id,
            kind: MethodKind::Email,
            secret: None,
            phone_number: None,
            is_active: false,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn should_reject_second_record_of_same_kind() {
    let user = test_user();
    let store = store(MockMethodRepo::empty());

    store.create(new_totp(user.id)).await.unwrap();
    let result = store.create(new_totp(user.id)).await;
    assert!(
        matches!(result, Err(MfaServiceError::DuplicateMethod(MethodKind::Totp))),
        "expected DuplicateMethod, got {result:?}"
    );
}

#[tokio::test]
async fn should_refuse_to_delete_active_method() {
    let user = test_user();
    let store = store(MockMethodRepo::empty());
    let method = store.create(new_totp(user.id)).await.unwrap();

    let result = store.delete(user.id, method.id).await;
    assert!(matches!(result, Err(MfaServiceError::MethodActive)));

    store.deactivate(method.id).await.unwrap();
    let deleted = store.delete(user.id, method.id).await.unwrap();
    assert_eq!(deleted.id, method.id);
    assert!(store.find_by_id(method.id).await.unwrap().is_none());
}

#[tokio::test]
async fn should_not_delete_another_users_method() {
    let user = test_user();
    let other = Uuid::new_v4();
    let store = store(MockMethodRepo::empty());
    let method = store.create(new_totp(user.id)).await.unwrap();

    let result = store.delete(other, method.id).await;
    assert!(
        matches!(result, Err(MfaServiceError::MethodNotFound)),
        "ownership mismatch reads as absence"
    );
}

#[tokio::test]
async fn should_list_active_kinds_sorted_and_deduped() {
    let user = test_user();
    let repo = MockMethodRepo::new(vec![
        test_method(user.id, MethodKind::Totp, true),
        test_method(user.id, MethodKind::Email, true),
        test_method(user.id, MethodKind::Sms, false),
    ]);
    let store = store(repo);

    let kinds = store.active_kinds(user.id).await.unwrap();
    assert_eq!(kinds, vec![MethodKind::Email, MethodKind::Totp]);
    assert!(store.has_active_mfa(user.id).await.unwrap());
}

#[tokio::test]
async fn should_aggregate_stats_per_kind() {
    let user = test_user();
    let repo = MockMethodRepo::new(vec![
        test_method(user.id, MethodKind::Totp, true),
        test_method(user.id, MethodKind::Sms, false),
        test_method(user.id, MethodKind::Email, true),
    ]);
    let store = store(repo);

    let stats = store.stats(user.id).await.unwrap();
    assert_eq!(stats.total_methods, 3);
    assert_eq!(stats.active_methods, 2);
    assert!(stats.has_totp);
    assert!(!stats.has_sms, "inactive SMS record does not count");
    assert!(stats.has_email);
    assert_eq!(stats.methods.len(), 3);
    let sms = stats
        .methods
        .iter()
        .find(|s| s.kind == MethodKind::Sms)
        .unwrap();
    assert_eq!(sms.total, 1);
    assert_eq!(sms.active, 0);
}

#[tokio::test]
async fn should_invalidate_cached_entries_on_delete() {
    let user = test_user();
    let cache = MemoryMethodCache::default();
    let store = MethodStore::new(MockMethodRepo::empty(), cache.clone());

    let method = store
        .create(NewMethod {
            is_active: false,
            ..new_totp(user.id)
        })
        .await
        .unwrap();

    // Create refreshed the single-record keys.
    assert!(cache.cached_method(&MethodCacheKey::ById(method.id)).is_some());

    // Warm a list entry, then delete.
    store.list_by_user(user.id, false).await.unwrap();
    assert!(
        cache
            .cached_list(&MethodCacheKey::UserMethods {
                user_id: user.id,
                active_only: false
            })
            .is_some()
    );

    store.delete(user.id, method.id).await.unwrap();

    assert!(cache.cached_method(&MethodCacheKey::ById(method.id)).is_none());
    assert!(
        cache
            .cached_method(&MethodCacheKey::ByUserAndKind(user.id, MethodKind::Totp))
            .is_none()
    );
    assert!(
        cache
            .cached_list(&MethodCacheKey::UserMethods {
                user_id: user.id,
                active_only: false
            })
            .is_none(),
        "stale list must not survive a delete"
    );
}
