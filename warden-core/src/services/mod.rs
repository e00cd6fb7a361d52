//! Service layer for business logic
//!
//! This module contains concrete service implementations that encapsulate
//! registration, lockout, token and login logic. Every service is generic over
//! an [`crate::repositories::AccountRepository`].

pub mod account;
pub mod auth;
pub mod lockout;
pub mod token;

pub use account::AccountService;
pub use auth::{AuthService, LoginOutcome};
pub use lockout::LockoutService;
pub use token::TokenService;
