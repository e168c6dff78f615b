//! Accounts: registration, password login and role management.

use actix_web::web;
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, JwtKeys, Principal, Role};
use crate::content::is_valid_email;
use crate::error::ApiError;
use crate::models::{AuthResponse, Id, LoginInput, NewUser, RegisterInput, User, UserProfile};
use crate::policy::{self, Capability};
use crate::repo::{Repo, RepoError};

pub const MIN_PASSWORD_LEN: usize = 8;
const USER_NOT_FOUND: &str = "User not found";

fn issue(keys: &JwtKeys, user: &User) -> Result<AuthResponse, ApiError> {
    let token = keys
        .issue(user.id, &user.name, user.role)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;
    Ok(AuthResponse { token, user: UserProfile::from(user) })
}

/// Argon2 is CPU bound; keep it off the async workers.
async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> Result<T, ApiError> {
    web::block(f).await.map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))
}

pub async fn register(
    repo: &dyn Repo,
    keys: &JwtKeys,
    bootstrap_admins: &[String],
    input: RegisterInput,
) -> Result<AuthResponse, ApiError> {
    let name = input.name.trim().to_string();
    let email = input.email.trim().to_lowercase();
    if name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation("A valid email is required"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!("Password must be at least {MIN_PASSWORD_LEN} characters")));
    }
    if repo.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("An account with this email already exists".into()));
    }

    let password = input.password;
    let password_hash = blocking(move || hash_password(&password)).await??;
    let role = if bootstrap_admins.iter().any(|a| *a == email) { Role::Admin } else { Role::User };

    let user = repo
        .insert_user(NewUser { name, email, password_hash: Some(password_hash), role, image: String::new(), bio: String::new() })
        .await
        .map_err(|e| match e {
            RepoError::Conflict => ApiError::Conflict("An account with this email already exists".into()),
            other => other.into(),
        })?;
    info!(user_id = user.id, role = ?user.role, "user registered");
    issue(keys, &user)
}

pub async fn login(repo: &dyn Repo, keys: &JwtKeys, input: LoginInput) -> Result<AuthResponse, ApiError> {
    let email = input.email.trim().to_lowercase();
    let user = repo.find_user_by_email(&email).await?.ok_or(ApiError::Unauthorized)?;
    // accounts created through an external provider have no password
    let hash = user.password_hash.clone().ok_or(ApiError::Unauthorized)?;
    let password = input.password;
    if !blocking(move || verify_password(&password, &hash)).await? {
        warn!(user_id = user.id, "failed login");
        return Err(ApiError::Unauthorized);
    }
    info!(user_id = user.id, "user logged in");
    issue(keys, &user)
}

pub async fn me(repo: &dyn Repo, principal: Option<&Principal>) -> Result<UserProfile, ApiError> {
    let p = policy::require(principal, Capability::Authenticated)?;
    let user = repo.get_user(p.user_id).await.map_err(|e| ApiError::from_repo(e, USER_NOT_FOUND))?;
    Ok(UserProfile::from(&user))
}

pub async fn set_role(repo: &dyn Repo, principal: Option<&Principal>, user_id: Id, role: Role) -> Result<UserProfile, ApiError> {
    let admin = policy::require(principal, Capability::Admin)?;
    let user = repo.set_user_role(user_id, role).await.map_err(|e| ApiError::from_repo(e, USER_NOT_FOUND))?;
    info!(user_id, role = ?role, by = admin.user_id, "role changed");
    Ok(UserProfile::from(&user))
}
