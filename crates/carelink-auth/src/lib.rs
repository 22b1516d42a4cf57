//! # carelink-auth
//!
//! Credential verification behind the [`IdentityResolver`] trait, plus the
//! role check each WebSocket endpoint applies to the resolved identity.
//!
//! - [`JwtIdentityResolver`]: HMAC-signed bearer tokens
//! - [`StaticIdentityResolver`]: fixed table, for tests and local runs

#![deny(unsafe_code)]

pub mod errors;
pub mod jwt;
pub mod resolver;

pub use errors::AuthError;
pub use jwt::{Claims, JwtIdentityResolver, Subject, TokenRequest};
pub use resolver::{AccessPolicy, IdentityResolver, StaticIdentityResolver, authorize};
