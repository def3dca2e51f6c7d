//! `mixbook-auth`: accounts, credentials and the token boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod hasher;
pub mod jwt;
pub mod permissions;
pub mod roles;

pub use account::{Account, AccountState};
pub use authorize::{AuthzError, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use hasher::{Argon2Hasher, CredentialHasher, HashError};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
pub use permissions::Permission;
pub use roles::Role;
