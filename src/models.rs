use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::content;

pub type Id = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub fn is_published(self) -> bool {
        matches!(self, PostStatus::Published)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: String,
    pub author_id: Id,
    pub category: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub views: i64,
    pub read_time: i32,
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or replacing a post. Every field is optional on
/// the wire so that missing values surface as validation errors instead of
/// deserialisation failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PostInput {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub tags: Vec<String>,
    pub featured_image: Option<String>,
    pub status: Option<PostStatus>,
    pub is_featured: bool,
}

/// Fully derived post ready to be stored.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: String,
    pub author_id: Id,
    pub category: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub read_time: i32,
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Replacement values for an existing post; author and counters are untouched.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: String,
    pub category: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub read_time: i32,
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Orderings the public listing accepts in `?sort=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ListingSort {
    #[default]
    Latest,
    Oldest,
    Popular,
}

/// Every ordering the store implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Publish time, newest first.
    #[default]
    Latest,
    /// Publish time, oldest first.
    Oldest,
    /// View count, highest first.
    Popular,
    /// Creation time, newest first (management listings).
    Created,
}

impl From<ListingSort> for SortOrder {
    fn from(sort: ListingSort) -> Self {
        match sort {
            ListingSort::Latest => SortOrder::Latest,
            ListingSort::Oldest => SortOrder::Oldest,
            ListingSort::Popular => SortOrder::Popular,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub author_id: Option<Id>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
}

impl PostFilter {
    pub fn published() -> Self {
        Self { status: Some(PostStatus::Published), ..Self::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl AuthorSummary {
    pub fn name_only(u: &User) -> Self {
        Self { id: u.id, name: u.name.clone(), email: None, image: None }
    }

    pub fn with_email(u: &User) -> Self {
        Self { email: Some(u.email.clone()), ..Self::name_only(u) }
    }

    pub fn with_image(u: &User) -> Self {
        Self { image: Some(u.image.clone()), ..Self::name_only(u) }
    }
}

/// A post with its author populated, as returned by the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<AuthorSummary>,
    /// `featuredImage`, or a stock image when that is blank.
    pub cover_image: String,
    pub published_ago: Option<String>,
}

impl PostView {
    pub fn new(post: Post, author: Option<AuthorSummary>) -> Self {
        let cover_image = content::safe_image_url(Some(&post.featured_image), 800, 400);
        let published_ago = post.published_at.map(|at| content::time_ago(at, Utc::now()));
        Self { post, author, cover_image, published_ago }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub blogs: Vec<PostView>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Id,
    pub content: String,
    pub author_id: Id,
    pub post_id: Id,
    pub parent_comment: Option<Id>,
    pub replies: Vec<Id>,
    pub likes: Vec<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CommentInput {
    pub content: String,
    pub parent_comment: Option<Id>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub author_id: Id,
    pub post_id: Id,
    pub parent_comment: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<AuthorSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes: usize,
}

/// Stored account. Carries the password hash, so it is never serialised to
/// API clients directly; see [`UserProfile`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub image: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub image: String,
    pub bio: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub image: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            image: u.image.clone(),
            bio: u.bio.clone(),
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleInput {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Home {
    pub featured: Vec<PostView>,
    pub latest: Vec<PostView>,
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_posts: usize,
    pub published: usize,
    pub drafts: usize,
    pub total_views: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    pub posts: Vec<Post>,
    pub stats: DashboardStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_posts: usize,
    pub published: usize,
    pub drafts: usize,
    pub total_views: i64,
    pub total_users: usize,
    pub total_comments: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminOverview {
    pub stats: AdminStats,
    pub posts: Vec<PostView>,
    pub users: Vec<UserProfile>,
}
