//! Authorization policy: every guarded operation states the capability it
//! needs and asks [`require`] instead of inspecting roles itself.

use crate::auth::Principal;
use crate::error::ApiError;
use crate::models::{Id, Post, PostStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Authenticated,
    /// Caller must be the given owner.
    Owner(Id),
    Admin,
}

/// Check `principal` against `cap`, returning the principal on success.
pub fn require(principal: Option<&Principal>, cap: Capability) -> Result<&Principal, ApiError> {
    let p = principal.ok_or(ApiError::Unauthorized)?;
    match cap {
        Capability::Authenticated => Ok(p),
        Capability::Owner(owner) if p.user_id == owner => Ok(p),
        Capability::Owner(_) => Err(ApiError::forbidden("You are not authorized to modify this post")),
        Capability::Admin if p.is_admin() => Ok(p),
        Capability::Admin => Err(ApiError::forbidden("Admin access required")),
    }
}

/// Same as [`require`] but yields a plain boolean.
pub fn allows(principal: Option<&Principal>, cap: Capability) -> bool {
    require(principal, cap).is_ok()
}

/// Published posts are public; anything else is visible to its author and
/// to admins only.
pub fn can_see_post(principal: Option<&Principal>, post: &Post) -> bool {
    post.status.is_published()
        || allows(principal, Capability::Owner(post.author_id))
        || allows(principal, Capability::Admin)
}

/// Whether a listing may include posts in `status` (None = every status)
/// for posts of `author` (None = every author).
pub fn can_list(principal: Option<&Principal>, status: Option<PostStatus>, author: Option<Id>) -> bool {
    if status == Some(PostStatus::Published) || allows(principal, Capability::Admin) {
        return true;
    }
    matches!(author, Some(a) if allows(principal, Capability::Owner(a)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn user(id: Id) -> Principal {
        Principal { user_id: id, name: format!("u{id}"), role: Role::User }
    }

    fn admin() -> Principal {
        Principal { user_id: 99, name: "root".into(), role: Role::Admin }
    }

    #[test]
    fn anonymous_is_unauthorized() {
        assert!(matches!(require(None, Capability::Authenticated), Err(ApiError::Unauthorized)));
        assert!(matches!(require(None, Capability::Admin), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn owner_check() {
        let u = user(1);
        assert!(require(Some(&u), Capability::Owner(1)).is_ok());
        assert!(matches!(require(Some(&u), Capability::Owner(2)), Err(ApiError::Forbidden(_))));
        // ownership is not implied by the admin role
        assert!(!allows(Some(&admin()), Capability::Owner(1)));
    }

    #[test]
    fn admin_check() {
        assert!(allows(Some(&admin()), Capability::Admin));
        assert!(matches!(require(Some(&user(1)), Capability::Admin), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn listing_visibility() {
        assert!(can_list(None, Some(PostStatus::Published), None));
        assert!(!can_list(None, None, None));
        assert!(!can_list(Some(&user(1)), Some(PostStatus::Draft), None));
        assert!(can_list(Some(&user(1)), Some(PostStatus::Draft), Some(1)));
        assert!(!can_list(Some(&user(1)), None, Some(2)));
        assert!(can_list(Some(&admin()), None, None));
    }
}
