pub mod utilities;

use thiserror::Error;

use crate::token::TokenKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked")]
    AccountLocked,

    #[error("Account not found")]
    AccountNotFound,

    /// The account behind a refresh token was deleted or is locked.
    #[error("Account unavailable")]
    AccountUnavailable,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Wrong token type: expected {expected}, found {found}")]
    WrongType {
        expected: TokenKind,
        found: TokenKind,
    },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Email cannot be used for registration")]
    EmailUnavailable,

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl ValidationError {
    /// The input field the error refers to, if it maps onto one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::InvalidEmail(_) | ValidationError::EmailUnavailable => Some("email"),
            ValidationError::InvalidPassword(_) => Some("password"),
            ValidationError::MissingField(name) if name == "email" => Some("email"),
            ValidationError::MissingField(name) if name == "password" => Some("password"),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("JWT signing failed: {0}")]
    JwtSigning(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("No active signing key")]
    MissingSigningKey,

    #[error("Blocking task failed: {0}")]
    Task(String),
}

impl Error {
    /// Errors a caller must only ever see as a generic denial.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Token(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_token_error(&self) -> bool {
        matches!(self, Error::Token(_))
    }

    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Error::Crypto(_))
    }
}
