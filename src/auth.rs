use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::Id;
use crate::repo::{RepoError, UserRepo};
use crate::routes::AppState;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

/// The authenticated caller, resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Id,
    pub name: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl TryFrom<Claims> for Principal {
    type Error = ApiError;

    fn try_from(c: Claims) -> Result<Self, ApiError> {
        let user_id = c.sub.parse::<Id>().map_err(|_| ApiError::Unauthorized)?;
        Ok(Principal { user_id, name: c.name, role: c.role })
    }
}

/// HS256 signing material plus token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: i64,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }

    pub fn issue(&self, user_id: Id, name: &str, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(self.ttl_hours)).timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            name: name.to_string(),
            role,
            exp: usize::try_from(exp).unwrap_or(0),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

/// Extractor yielding the validated caller. The token proves identity only;
/// the role comes from the stored account so role changes apply at once.
/// Handlers that serve anonymous callers too take `Option<Auth>`.
pub struct Auth(pub Principal);

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let verified = verify_bearer(req, pl);
        Box::pin(async move {
            let (state, claimed) = verified?;
            let user = state.repo.get_user(claimed.user_id).await.map_err(|e| match e {
                RepoError::NotFound => {
                    tracing::debug!(user_id = claimed.user_id, "token for unknown user");
                    ApiError::Unauthorized
                }
                other => other.into(),
            })?;
            Ok(Auth(Principal { user_id: user.id, name: user.name, role: user.role }))
        })
    }
}

fn verify_bearer(req: &HttpRequest, pl: &mut Payload) -> Result<(web::Data<AppState>, Principal), ApiError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("AppState not registered".into()))?;
    let bearer = BearerAuth::from_request(req, pl)
        .into_inner()
        .map_err(|_| ApiError::Unauthorized)?;
    let claims = state.jwt.verify(bearer.token()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthorized
    })?;
    Ok((state, Principal::try_from(claims)?))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let keys = JwtKeys::new("unit-test-secret-that-is-long-enough!", 1);
        let token = keys.issue(7, "ada", Role::Admin).unwrap();
        let principal = Principal::try_from(keys.verify(&token).unwrap()).unwrap();
        assert_eq!(principal, Principal { user_id: 7, name: "ada".into(), role: Role::Admin });
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let a = JwtKeys::new("secret-a-secret-a-secret-a-secret-a", 1);
        let b = JwtKeys::new("secret-b-secret-b-secret-b-secret-b", 1);
        let token = a.issue(1, "x", Role::User).unwrap();
        assert!(b.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = JwtKeys::new("unit-test-secret-that-is-long-enough!", -2);
        let token = keys.issue(1, "x", Role::User).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("x", "not-a-phc-string"));
    }
}
