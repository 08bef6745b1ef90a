use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::User,
};

/// Decoded token payload. `user` carries the identity comment ownership is checked against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub user: UserClaims,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl User {
    pub fn from_claims(claims: Claims) -> Self {
        Self { email: claims.user.email, name: claims.user.name }
    }
}

pub trait Authenticator: Send + Sync {
    fn verify(&self, token: &str) -> AppResult<Claims>;
}

pub struct Hs256Authenticator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Authenticator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl Authenticator for Hs256Authenticator {
    fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        if data.claims.user.email.trim().is_empty() {
            return Err(AppError::Unauthorized("token carries no user email".to_string()));
        }
        Ok(data.claims)
    }
}

/// The caller of a route that requires a valid bearer token.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.auth.verify(token)?;
        Ok(Self(User::from_claims(claims)))
    }
}

fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing authorization header".to_string()))?;

    let header = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("authorization header is not valid text".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("expected a bearer token".to_string()))?;

    Ok(token)
}

#[cfg(test)]
pub(crate) mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    pub(crate) const SECRET: &str = "test-secret";

    pub(crate) fn mint(email: &str, name: &str, ttl_secs: i64) -> String {
        let claims = Claims {
            sub: email.to_string(),
            exp: jiff::Timestamp::now().as_second() + ttl_secs,
            user: UserClaims { email: email.to_string(), name: name.to_string() },
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
            .unwrap()
    }

    #[test]
    fn valid_token_resolves_to_user() {
        let auth = Hs256Authenticator::new(SECRET.as_bytes());
        let claims = auth.verify(&mint("ann@example.com", "Ann", 600)).unwrap();
        let user = User::from_claims(claims);
        assert_eq!(user, User { email: "ann@example.com".into(), name: "Ann".into() });
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let auth = Hs256Authenticator::new(SECRET.as_bytes());
        assert!(matches!(auth.verify(&mint("a@example.com", "A", -3600)), Err(AppError::Unauthorized(_))));

        let other = Hs256Authenticator::new(b"another-secret");
        assert!(matches!(other.verify(&mint("a@example.com", "A", 600)), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, "Token abc".parse().unwrap());
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }
}
