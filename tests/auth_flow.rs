//! Integration tests for the authentication service over the in-memory
//! store.

use std::sync::Arc;

use gatehouse::auth::{AuthError, AuthService};
use gatehouse::store::{MemoryUserStore, UserQuery, UserStore};

fn service() -> Arc<AuthService> {
    Arc::new(AuthService::new(Arc::new(MemoryUserStore::new())))
}

#[tokio::test]
async fn register_login_session_logout_scenario() {
    let svc = service();

    let user = svc.register_user("a@x.com", "pw1").await.expect("register");
    assert_eq!(user.email, "a@x.com");

    // Same email again is rejected.
    let err = svc.register_user("a@x.com", "pw2").await.unwrap_err();
    assert!(matches!(err, AuthError::AlreadyRegistered(_)));

    // Wrong password fails, right one passes.
    assert!(!svc.valid_login("a@x.com", "wrong").await.unwrap());
    assert!(svc.valid_login("a@x.com", "pw1").await.unwrap());

    let token = svc
        .create_session("a@x.com")
        .await
        .unwrap()
        .expect("session for registered user");

    // The token resolves back to the same user.
    let found = svc
        .user_by_session_id(Some(token.as_str()))
        .await
        .unwrap()
        .expect("session resolves");
    assert_eq!(found.email, "a@x.com");
    assert_eq!(found.id, user.id);

    // After logout the token is dead.
    svc.destroy_session(found.id).await.unwrap();
    assert!(svc
        .user_by_session_id(Some(token.as_str()))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn login_unknown_email_is_false_not_an_error() {
    let svc = service();
    assert!(!svc.valid_login("nobody@x.com", "whatever").await.unwrap());
}

#[tokio::test]
async fn new_login_overwrites_previous_session() {
    let svc = service();
    svc.register_user("b@x.com", "pw").await.expect("register");

    let first = svc.create_session("b@x.com").await.unwrap().unwrap();
    let second = svc.create_session("b@x.com").await.unwrap().unwrap();
    assert_ne!(first, second);

    // Only the latest session resolves: one active session per user.
    assert!(svc.user_by_session_id(Some(first.as_str())).await.unwrap().is_none());
    assert!(svc
        .user_by_session_id(Some(second.as_str()))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn destroy_session_is_idempotent_and_swallows_unknown_ids() {
    let svc = service();
    let user = svc.register_user("c@x.com", "pw").await.expect("register");

    // No session yet; destroying is still fine, twice.
    svc.destroy_session(user.id).await.unwrap();
    svc.destroy_session(user.id).await.unwrap();

    // Unknown id is swallowed too.
    svc.destroy_session(uuid::Uuid::new_v4()).await.unwrap();
}

#[tokio::test]
async fn password_reset_flow() {
    let svc = service();
    svc.register_user("d@x.com", "old-pass").await.expect("register");

    let token = svc.reset_password_token("d@x.com").await.expect("token");
    svc.update_password(&token, "new-pass").await.expect("update");

    // Token is consumed: a second use fails.
    let err = svc.update_password(&token, "again").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidResetToken));

    // New password is live, old one is dead.
    assert!(svc.valid_login("d@x.com", "new-pass").await.unwrap());
    assert!(!svc.valid_login("d@x.com", "old-pass").await.unwrap());
}

#[tokio::test]
async fn reset_token_for_unknown_email_is_denied() {
    let svc = service();
    let err = svc.reset_password_token("ghost@x.com").await.unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound));
}

#[tokio::test]
async fn new_reset_token_overwrites_pending_one() {
    let svc = service();
    svc.register_user("e@x.com", "pw").await.expect("register");

    let first = svc.reset_password_token("e@x.com").await.unwrap();
    let second = svc.reset_password_token("e@x.com").await.unwrap();
    assert_ne!(first, second);

    let err = svc.update_password(&first, "np").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidResetToken));
    svc.update_password(&second, "np").await.expect("latest token works");
}

#[tokio::test]
async fn password_update_leaves_session_untouched() {
    let svc = service();
    svc.register_user("f@x.com", "pw").await.expect("register");

    let session = svc.create_session("f@x.com").await.unwrap().unwrap();
    let reset = svc.reset_password_token("f@x.com").await.unwrap();
    svc.update_password(&reset, "new-pw").await.expect("update");

    // Session and reset dimensions are orthogonal.
    let user = svc
        .user_by_session_id(Some(session.as_str()))
        .await
        .unwrap()
        .expect("session survives password update");
    assert!(user.reset_token.is_none());
}

#[tokio::test]
async fn invalid_reset_token_never_touches_a_user() {
    let svc = service();
    svc.register_user("g@x.com", "pw").await.expect("register");

    let err = svc
        .update_password("bogus-token", "hijacked")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidResetToken));
    assert!(svc.valid_login("g@x.com", "pw").await.unwrap());
}

#[tokio::test]
async fn concurrent_duplicate_registration_admits_one_success() {
    let svc = service();

    let mut handles = Vec::new();
    for i in 0..8 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.register_user("race@x.com", &format!("pw-{i}")).await
        }));
    }

    let mut successes = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.expect("task completes") {
            Ok(_) => successes += 1,
            Err(AuthError::AlreadyRegistered(_)) => duplicates += 1,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(duplicates, 7);
}

#[tokio::test]
async fn concurrent_session_and_reset_updates_do_not_lose_writes() {
    let store = Arc::new(MemoryUserStore::new());
    let svc = Arc::new(AuthService::new(store.clone()));
    let user = svc.register_user("h@x.com", "pw").await.expect("register");

    let a = {
        let svc = svc.clone();
        tokio::spawn(async move { svc.create_session("h@x.com").await })
    };
    let b = {
        let svc = svc.clone();
        tokio::spawn(async move { svc.reset_password_token("h@x.com").await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Both fields landed: neither update clobbered the other.
    let stored = store.find_by(UserQuery::Id(user.id)).await.unwrap();
    assert!(stored.session_id.is_some());
    assert!(stored.reset_token.is_some());
}
