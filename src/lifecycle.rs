//! Post lifecycle: creation, replacement, deletion, public reads.

use chrono::Utc;
use tracing::info;

use crate::auth::Principal;
use crate::config::RepublishPolicy;
use crate::content::{normalize_tags, read_time, slugify, EXCERPT_MAX_CHARS};
use crate::error::ApiError;
use crate::models::{Id, NewPost, Post, PostInput, PostStatus, PostUpdate};
use crate::policy::{self, Capability};
use crate::repo::{Repo, RepoError};

pub const RELATED_LIMIT: u64 = 3;

pub const POST_NOT_FOUND: &str = "Blog post not found";
const REQUIRED_FIELDS: &str = "Title, content, excerpt, and category are required";
const DUPLICATE_TITLE: &str = "A blog with this title already exists";

/// Input after trimming and derivation, common to create and update.
struct Checked {
    title: String,
    content: String,
    excerpt: String,
    category: String,
    tags: Vec<String>,
    featured_image: String,
    status: PostStatus,
    is_featured: bool,
    read_time: i32,
}

fn check(input: PostInput) -> Result<Checked, ApiError> {
    let title = input.title.trim().to_string();
    let excerpt = input.excerpt.trim().to_string();
    let category = input.category.trim().to_string();
    if title.is_empty() || input.content.trim().is_empty() || excerpt.is_empty() || category.is_empty() {
        return Err(ApiError::validation(REQUIRED_FIELDS));
    }
    if excerpt.chars().count() > EXCERPT_MAX_CHARS {
        return Err(ApiError::validation(format!("Excerpt must be at most {EXCERPT_MAX_CHARS} characters")));
    }
    Ok(Checked {
        read_time: read_time(&input.content),
        title,
        content: input.content,
        excerpt,
        category,
        tags: normalize_tags(&input.tags),
        featured_image: input.featured_image.map(|s| s.trim().to_string()).unwrap_or_default(),
        status: input.status.unwrap_or_default(),
        is_featured: input.is_featured,
    })
}

fn slug_for(title: &str) -> Result<String, ApiError> {
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(ApiError::validation("Title must contain at least one letter or digit"));
    }
    Ok(slug)
}

fn duplicate_title(e: RepoError) -> ApiError {
    match e {
        RepoError::Conflict => ApiError::Conflict(DUPLICATE_TITLE.into()),
        other => ApiError::from_repo(other, POST_NOT_FOUND),
    }
}

pub async fn create_post(repo: &dyn Repo, principal: Option<&Principal>, input: PostInput) -> Result<Post, ApiError> {
    let author = policy::require(principal, Capability::Authenticated)?;
    let c = check(input)?;
    let slug = slug_for(&c.title)?;
    if repo.slug_exists(&slug, None).await? {
        return Err(ApiError::Conflict(DUPLICATE_TITLE.into()));
    }
    let published_at = c.status.is_published().then(Utc::now);
    let post = repo
        .insert_post(NewPost {
            title: c.title,
            slug,
            content: c.content,
            excerpt: c.excerpt,
            featured_image: c.featured_image,
            author_id: author.user_id,
            category: c.category,
            tags: c.tags,
            status: c.status,
            read_time: c.read_time,
            is_featured: c.is_featured,
            published_at,
        })
        .await
        // a concurrent create can still win the slug between check and insert
        .map_err(duplicate_title)?;
    info!(post_id = post.id, slug = %post.slug, author_id = author.user_id, "post created");
    Ok(post)
}

/// Loads the post and checks the caller owns it; `action` names the refused
/// operation in the 403 message.
async fn owned_post(repo: &dyn Repo, principal: Option<&Principal>, id: Id, action: &str) -> Result<Post, ApiError> {
    policy::require(principal, Capability::Authenticated)?;
    let post = repo.get_post(id).await.map_err(|e| ApiError::from_repo(e, POST_NOT_FOUND))?;
    if !policy::allows(principal, Capability::Owner(post.author_id)) {
        return Err(ApiError::forbidden(format!("You are not authorized to {action} this post")));
    }
    Ok(post)
}

pub async fn update_post(
    repo: &dyn Repo,
    principal: Option<&Principal>,
    id: Id,
    input: PostInput,
    republish: RepublishPolicy,
) -> Result<Post, ApiError> {
    let existing = owned_post(repo, principal, id, "edit").await?;
    let c = check(input)?;

    let slug = if c.title != existing.title {
        let slug = slug_for(&c.title)?;
        if repo.slug_exists(&slug, Some(id)).await? {
            return Err(ApiError::Conflict(DUPLICATE_TITLE.into()));
        }
        slug
    } else {
        existing.slug.clone()
    };

    let published_at = match (c.status, republish) {
        (PostStatus::Published, RepublishPolicy::Refresh) => Some(Utc::now()),
        (PostStatus::Published, RepublishPolicy::KeepFirst) => existing.published_at.or_else(|| Some(Utc::now())),
        (PostStatus::Draft, _) => existing.published_at,
    };

    let post = repo
        .update_post(
            id,
            PostUpdate {
                title: c.title,
                slug,
                content: c.content,
                excerpt: c.excerpt,
                featured_image: c.featured_image,
                category: c.category,
                tags: c.tags,
                status: c.status,
                read_time: c.read_time,
                is_featured: c.is_featured,
                published_at,
            },
        )
        .await
        .map_err(duplicate_title)?;
    info!(post_id = post.id, slug = %post.slug, status = ?post.status, "post updated");
    Ok(post)
}

pub async fn delete_post(repo: &dyn Repo, principal: Option<&Principal>, id: Id) -> Result<(), ApiError> {
    let post = owned_post(repo, principal, id, "delete").await?;
    repo.delete_post(post.id).await.map_err(|e| ApiError::from_repo(e, POST_NOT_FOUND))?;
    info!(post_id = post.id, slug = %post.slug, "post deleted");
    Ok(())
}

/// A post by id; unpublished posts are reported missing to anyone but their
/// author and admins.
pub async fn get_post(repo: &dyn Repo, principal: Option<&Principal>, id: Id) -> Result<Post, ApiError> {
    let post = repo.get_post(id).await.map_err(|e| ApiError::from_repo(e, POST_NOT_FOUND))?;
    if !policy::can_see_post(principal, &post) {
        return Err(ApiError::not_found(POST_NOT_FOUND));
    }
    Ok(post)
}

/// Public read of a published post. Every call counts as a view.
pub async fn view_post(repo: &dyn Repo, slug: &str) -> Result<Post, ApiError> {
    repo.record_view(slug).await.map_err(|e| ApiError::from_repo(e, POST_NOT_FOUND))
}

/// Published post by slug without touching the view counter.
pub async fn published_by_slug(repo: &dyn Repo, slug: &str) -> Result<Post, ApiError> {
    repo.get_post_by_slug(slug, Some(PostStatus::Published))
        .await
        .map_err(|e| ApiError::from_repo(e, POST_NOT_FOUND))
}

/// Up to three other published posts sharing the category or a tag.
pub async fn related_posts(repo: &dyn Repo, post: &Post) -> Result<Vec<Post>, ApiError> {
    Ok(repo.related_posts(post, RELATED_LIMIT).await?)
}
