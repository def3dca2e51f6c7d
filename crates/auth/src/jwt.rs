//! HS256 token signing and verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token could not be decoded: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a bearer token and yields its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// Shared-secret (HS256) validator that can also mint tokens.
pub struct Hs256JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, claims: &JwtClaims) -> Result<String, TokenError> {
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time window is checked by `validate_claims` against the caller's clock.
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mixbook_core::TenantId;

    use crate::Role;

    #[test]
    fn issued_token_validates() {
        let jwt = Hs256JwtValidator::new("secret");
        let now = Utc::now();
        let claims = JwtClaims::for_account(&TenantId::new("acct1"), now, Duration::minutes(5))
            .with_roles(vec![Role::ADMIN]);

        let token = jwt.issue(&claims).unwrap();
        let decoded = jwt.validate(&token, now).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let claims = JwtClaims::for_account(&TenantId::new("acct1"), now, Duration::minutes(5));
        let token = Hs256JwtValidator::new("one").issue(&claims).unwrap();

        assert!(matches!(
            Hs256JwtValidator::new("two").validate(&token, now),
            Err(TokenError::Decode(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = Hs256JwtValidator::new("secret");
        let now = Utc::now();
        let claims = JwtClaims::for_account(&TenantId::new("acct1"), now, Duration::minutes(5));
        let token = jwt.issue(&claims).unwrap();

        assert!(matches!(
            jwt.validate(&token, now + Duration::minutes(6)),
            Err(TokenError::Claims(TokenValidationError::Expired))
        ));
    }
}
