use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    AccountId, Error,
    error::AuthError,
    repositories::AccountRepository,
    token::{SigningKey, TokenIssuer, TokenPair},
};

/// Token issuance plus the store-backed refresh check
///
/// Access-token validation is stateless. Refresh-token validation also confirms
/// through the repository that the account still exists and is not locked, so
/// a deleted or locked account cannot mint new access tokens.
pub struct TokenService<R: AccountRepository> {
    repository: Arc<R>,
    issuer: Arc<TokenIssuer>,
}

impl<R: AccountRepository> TokenService<R> {
    pub fn new(repository: Arc<R>, issuer: Arc<TokenIssuer>) -> Self {
        Self { repository, issuer }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Rotate the signing key. Tokens signed with the previous key stay valid.
    pub fn rotate_key(&self, key: SigningKey) -> Result<(), Error> {
        self.issuer.rotate(key)
    }

    pub fn issue_access(&self, account_id: &AccountId) -> Result<String, Error> {
        self.issuer.issue_access_at(account_id, Utc::now())
    }

    pub fn issue_refresh(&self, account_id: &AccountId) -> Result<String, Error> {
        self.issuer.issue_refresh_at(account_id, Utc::now())
    }

    pub fn issue_pair_at(&self, account_id: &AccountId, now: DateTime<Utc>) -> Result<TokenPair, Error> {
        self.issuer.issue_pair_at(account_id, now)
    }

    pub fn issue_access_at(&self, account_id: &AccountId, now: DateTime<Utc>) -> Result<String, Error> {
        self.issuer.issue_access_at(account_id, now)
    }

    pub fn validate_access(&self, token: &str) -> Result<AccountId, Error> {
        self.validate_access_at(token, Utc::now())
    }

    pub fn validate_access_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccountId, Error> {
        self.issuer.validate_access_at(token, now)
    }

    pub async fn validate_refresh(&self, token: &str) -> Result<AccountId, Error> {
        self.validate_refresh_at(token, Utc::now()).await
    }

    /// Validate a refresh token and confirm its account can still use it
    pub async fn validate_refresh_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountId, Error> {
        let account_id = self.issuer.validate_refresh_at(token, now)?;

        if !self
            .repository
            .account_exists_and_unlocked(&account_id, now)
            .await?
        {
            return Err(AuthError::AccountUnavailable.into());
        }

        Ok(account_id)
    }
}
