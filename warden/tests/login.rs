#![cfg(feature = "sqlite")]

mod common;

use common::{EMAIL, PASSWORD, at, warden};
use warden::{TOKEN_TYPE, ValidationError, WardenError};

#[tokio::test]
async fn test_register_and_login() {
    let warden = warden().await;

    let account = warden.register(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(account.email, EMAIL);

    let login = warden.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(login.account_id, account.id);
    assert_eq!(login.token_type, TOKEN_TYPE);
    assert_ne!(login.access_token, login.refresh_token);

    let account_id = warden.verify_access_token(&login.access_token).unwrap();
    assert_eq!(account_id, account.id);

    let found = warden.get_account(&account.id).await.unwrap().unwrap();
    assert_eq!(found, account);
}

#[tokio::test]
async fn test_email_is_case_insensitive() {
    let warden = warden().await;
    let account = warden
        .register("User@Example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(account.email, "user@example.com");

    let login = warden.login("  USER@example.COM ", PASSWORD).await.unwrap();
    assert_eq!(login.account_id, account.id);
}

#[tokio::test]
async fn test_failures_are_indistinguishable() {
    let warden = warden().await;
    warden.register(EMAIL, PASSWORD).await.unwrap();

    let unknown = warden
        .login("nobody@example.com", PASSWORD)
        .await
        .unwrap_err();
    let wrong = warden.login(EMAIL, "Wrong#Horse1").await.unwrap_err();
    let empty = warden.login("", "").await.unwrap_err();

    assert!(matches!(unknown, WardenError::Unauthorized));
    assert!(matches!(wrong, WardenError::Unauthorized));
    assert!(matches!(empty, WardenError::Unauthorized));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn test_register_validation() {
    let warden = warden().await;

    assert!(matches!(
        warden.register("not-an-email", PASSWORD).await,
        Err(WardenError::Validation(ValidationError::InvalidEmail(_)))
    ));
    assert!(matches!(
        warden.register(EMAIL, "short").await,
        Err(WardenError::Validation(ValidationError::InvalidPassword(_)))
    ));
    assert!(matches!(
        warden.register(EMAIL, "alllowercase1!").await,
        Err(WardenError::Validation(ValidationError::InvalidPassword(_)))
    ));

    warden.register(EMAIL, PASSWORD).await.unwrap();
    assert!(matches!(
        warden.register("USER@example.com", PASSWORD).await,
        Err(WardenError::Validation(ValidationError::EmailUnavailable))
    ));
}

#[tokio::test]
async fn test_register_validation_reports_field() {
    let warden = warden().await;

    let error = warden.register("not-an-email", PASSWORD).await.unwrap_err();
    assert_eq!(error.field(), Some("email"));
    assert_eq!(error.to_string(), "Invalid email: unrecognized format");

    let error = warden.register(EMAIL, "short").await.unwrap_err();
    assert_eq!(error.field(), Some("password"));
    assert_eq!(
        error.to_string(),
        "Invalid password: must be at least 8 characters long"
    );

    let denied = warden.login(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(denied.field(), None);
}

#[tokio::test]
async fn test_access_token_expires_after_thirty_minutes() {
    let warden = warden().await;
    warden.register_at(EMAIL, PASSWORD, at(0)).await.unwrap();
    let login = warden.login_at(EMAIL, PASSWORD, at(0)).await.unwrap();

    assert_eq!(
        warden
            .verify_access_token_at(&login.access_token, at(30 * 60 - 1))
            .unwrap(),
        login.account_id
    );
    assert!(matches!(
        warden.verify_access_token_at(&login.access_token, at(30 * 60)),
        Err(WardenError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_tokens_are_not_interchangeable() {
    let warden = warden().await;
    warden.register(EMAIL, PASSWORD).await.unwrap();
    let login = warden.login(EMAIL, PASSWORD).await.unwrap();

    assert!(matches!(
        warden.verify_access_token(&login.refresh_token),
        Err(WardenError::Unauthorized)
    ));
    assert!(matches!(
        warden.refresh_access_token(&login.access_token).await,
        Err(WardenError::Unauthorized)
    ));
    assert!(matches!(
        warden.verify_access_token("not.a.token"),
        Err(WardenError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_delete_account() {
    let warden = warden().await;
    let account = warden.register(EMAIL, PASSWORD).await.unwrap();

    assert!(warden.delete_account(&account.id).await.unwrap());
    assert!(!warden.delete_account(&account.id).await.unwrap());
    assert!(warden.get_account(&account.id).await.unwrap().is_none());
    assert!(matches!(
        warden.login(EMAIL, PASSWORD).await,
        Err(WardenError::Unauthorized)
    ));
}
