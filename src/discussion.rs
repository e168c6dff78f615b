//! Comments on posts: one level of replies plus a per-user like toggle.

use std::collections::HashMap;

use tracing::info;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::models::{AuthorSummary, CommentInput, CommentView, Id, LikeOutcome, NewComment};
use crate::policy::{self, Capability};
use crate::repo::Repo;

pub const COMMENT_NOT_FOUND: &str = "Comment not found";
const POST_NOT_FOUND: &str = "Blog not found";
const PARENT_NOT_FOUND: &str = "Parent comment not found";

pub async fn add_comment(
    repo: &dyn Repo,
    principal: Option<&Principal>,
    post_id: Id,
    input: CommentInput,
) -> Result<CommentView, ApiError> {
    let author = policy::require(principal, Capability::Authenticated)?;
    let content = input.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Comment content is required"));
    }
    repo.get_post(post_id).await.map_err(|e| ApiError::from_repo(e, POST_NOT_FOUND))?;
    if let Some(parent_id) = input.parent_comment {
        let parent = repo.get_comment(parent_id).await.map_err(|e| ApiError::from_repo(e, PARENT_NOT_FOUND))?;
        if parent.post_id != post_id {
            return Err(ApiError::validation("Parent comment belongs to a different post"));
        }
    }
    // the post or parent may still vanish before the insert; the store rechecks
    let comment = repo
        .insert_comment(NewComment {
            content: content.to_string(),
            author_id: author.user_id,
            post_id,
            parent_comment: input.parent_comment,
        })
        .await
        .map_err(|e| ApiError::from_repo(e, POST_NOT_FOUND))?;
    info!(comment_id = comment.id, post_id, parent = ?comment.parent_comment, "comment added");
    let author = repo.get_users(&[comment.author_id]).await?.first().map(AuthorSummary::with_image);
    Ok(CommentView { comment, author })
}

/// Comments of a post, newest first, with their authors attached.
pub async fn list_comments(repo: &dyn Repo, post_id: Id) -> Result<Vec<CommentView>, ApiError> {
    let comments = repo.list_comments(post_id).await?;
    let mut ids: Vec<Id> = comments.iter().map(|c| c.author_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let authors: HashMap<Id, AuthorSummary> =
        repo.get_users(&ids).await?.iter().map(|u| (u.id, AuthorSummary::with_image(u))).collect();
    Ok(comments
        .into_iter()
        .map(|comment| {
            let author = authors.get(&comment.author_id).cloned();
            CommentView { comment, author }
        })
        .collect())
}

pub async fn toggle_like(repo: &dyn Repo, principal: Option<&Principal>, comment_id: Id) -> Result<LikeOutcome, ApiError> {
    let user = policy::require(principal, Capability::Authenticated)?;
    let outcome = repo
        .toggle_like(comment_id, user.user_id)
        .await
        .map_err(|e| ApiError::from_repo(e, COMMENT_NOT_FOUND))?;
    info!(comment_id, user_id = user.user_id, liked = outcome.liked, "comment like toggled");
    Ok(outcome)
}
