//! Issue → validate → revoke → validate, end to end across the codec,
//! blacklist, and validator.

use bearer_token::{Subject, TokenSigner, peek_access_claims};
use chrono::Utc;
use gateway::auth::{TokenValidator, ValidateError};
use gateway::metrics::GatewayMetrics;
use gateway::store::{Blacklist, MemoryStore, Revocation};
use std::sync::Arc;
use std::time::Duration;

fn signer() -> Arc<TokenSigner> {
    Arc::new(TokenSigner::new(
        b"integration-access-key".as_slice(),
        b"integration-refresh-key".as_slice(),
        Duration::from_secs(21_600),
        Duration::from_secs(2_592_000),
        "boddle-platform".to_string(),
    ))
}

fn subject() -> Subject {
    Subject {
        user_id: 123,
        boddle_uid: "1f1e0a7c-2b58-4c2e-9f59-0d2f3a1b4c5d".to_string(),
        email: "t@example.com".to_string(),
        name: "Ada Lovelace".to_string(),
        meta_type: "Teacher".to_string(),
        meta_id: 456,
    }
}

#[tokio::test]
async fn revoked_token_fails_validation_until_removed() {
    let signer = signer();
    let blacklist = Blacklist::new(Arc::new(MemoryStore::new()));
    let metrics = Arc::new(GatewayMetrics::new());
    let validator = TokenValidator::new(
        signer.clone(),
        blacklist.clone(),
        metrics.clone(),
        None,
    );

    let now = Utc::now().timestamp();
    let pair = signer.issue_pair(&subject(), now).expect("issue pair");

    // Fresh token validates.
    let claims = validator
        .validate(&pair.access_token)
        .await
        .expect("fresh token validates");
    assert_eq!(claims.user_id, 123);
    assert_eq!(claims.exp - claims.iat, 21_600);

    // Logout-style revocation: peek the jti without trusting the signature.
    let peeked = peek_access_claims(&pair.access_token).expect("peek claims");
    blacklist
        .revoke(&peeked.jti, peeked.exp, now)
        .await
        .expect("revoke");
    assert_eq!(blacklist.is_revoked(&peeked.jti).await, Revocation::Yes);

    // Revoking again is a no-op, not an error.
    blacklist
        .revoke(&peeked.jti, peeked.exp, now)
        .await
        .expect("revoke twice");

    let result = validator.validate(&pair.access_token).await;
    assert!(matches!(result, Err(ValidateError::Revoked)));

    // The refresh token is untouched by access-token revocation.
    signer
        .verify_refresh(&pair.refresh_token, now, Duration::ZERO)
        .expect("refresh token still valid");

    // Test-harness removal restores the token.
    blacklist.remove(&peeked.jti).await.expect("remove");
    validator
        .validate(&pair.access_token)
        .await
        .expect("token validates after removal");
}

#[tokio::test]
async fn validation_failures_map_to_distinct_errors() {
    let signer = signer();
    let validator = TokenValidator::new(
        signer.clone(),
        Blacklist::new(Arc::new(MemoryStore::new())),
        Arc::new(GatewayMetrics::new()),
        None,
    );

    let stale = signer
        .issue_pair(&subject(), Utc::now().timestamp() - 100_000)
        .expect("issue stale pair");
    assert!(matches!(
        validator.validate(&stale.access_token).await,
        Err(ValidateError::Expired)
    ));

    assert!(matches!(
        validator.validate("garbage").await,
        Err(ValidateError::InvalidToken)
    ));

    // A token signed with a different key fails closed.
    let foreign = TokenSigner::new(
        b"some-other-access-key".as_slice(),
        b"some-other-refresh-key".as_slice(),
        Duration::from_secs(21_600),
        Duration::from_secs(2_592_000),
        "boddle-platform".to_string(),
    )
    .issue_pair(&subject(), Utc::now().timestamp())
    .expect("issue foreign pair");
    assert!(matches!(
        validator.validate(&foreign.access_token).await,
        Err(ValidateError::InvalidToken)
    ));
}
