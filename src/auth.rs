//! Bearer-token identity.
//!
//! Session management lives upstream; this service only verifies HS256
//! tokens it shares a secret with and reads the caller's id and role.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;
use crate::error::GatewayError;

/// Caller role carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular marketplace user.
    User,
    /// Moderator with access to `/admin` routes.
    Admin,
}

/// Token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: UserId,
    /// Caller role.
    pub role: Role,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

/// Verified caller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user.
    pub user_id: UserId,
    /// Authenticated role.
    pub role: Role,
}

impl Identity {
    /// Returns `true` for admins.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Signs and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Creates a verifier for the shared `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Verifies `token` and returns the caller identity.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] for a malformed, forged, or
    /// expired token.
    pub fn verify(&self, token: &str) -> Result<Identity, GatewayError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            GatewayError::Unauthorized("invalid or expired token".to_string())
        })?;
        Ok(Identity {
            user_id: data.claims.sub,
            role: data.claims.role,
        })
    }

    /// Issues a token for `user_id` valid until `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if signing fails.
    pub fn issue(
        &self,
        user_id: UserId,
        role: Role,
        expires_at: DateTime<Utc>,
    ) -> Result<String, GatewayError> {
        let claims = Claims {
            sub: user_id,
            role,
            exp: expires_at.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| GatewayError::Internal(format!("token signing failed: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn issued_token_verifies() {
        let verifier = TokenVerifier::new("secret");
        let user = UserId::new();
        let Ok(token) = verifier.issue(user, Role::Admin, Utc::now() + Duration::hours(1)) else {
            panic!("issue failed");
        };
        let Ok(identity) = verifier.verify(&token) else {
            panic!("verify failed");
        };
        assert_eq!(identity.user_id, user);
        assert!(identity.is_admin());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let Ok(token) =
            TokenVerifier::new("a").issue(UserId::new(), Role::User, Utc::now() + Duration::hours(1))
        else {
            panic!("issue failed");
        };
        assert!(matches!(
            TokenVerifier::new("b").verify(&token),
            Err(GatewayError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = TokenVerifier::new("secret");
        let Ok(token) = verifier.issue(UserId::new(), Role::User, Utc::now() - Duration::hours(2))
        else {
            panic!("issue failed");
        };
        assert!(verifier.verify(&token).is_err());
    }
}
