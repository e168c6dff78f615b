//! Read-side queries: listings, search, category counts and the aggregates
//! behind the home page, the author dashboard and the admin overview.

use std::collections::HashMap;

use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::models::{
    AdminOverview, AdminStats, AuthorSummary, CategoryCount, Dashboard, DashboardStats, Home, Id, Post, PostFilter,
    ListingSort, PostPage, PostStatus, PostView, SortOrder, User, UserProfile,
};
use crate::policy::{self, Capability};
use crate::repo::Repo;

pub const MAX_PAGE_SIZE: u32 = 100;
pub const BLOGS_PAGE_SIZE: u32 = 10;
pub const POSTS_PAGE_SIZE: u32 = 12;
pub const CATEGORY_LIMIT: u64 = 10;
pub const HOME_FEATURED: u64 = 3;
pub const HOME_LATEST: u64 = 6;
pub const HOME_CATEGORIES: u64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub limit: u32,
}

impl Paging {
    /// Clamps `page` to at least 1 and `limit` to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn skip(self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn total_pages(self, total: u64) -> u32 {
        u32::try_from(total.div_ceil(u64::from(self.limit))).unwrap_or(u32::MAX)
    }
}

/// Query string of the management listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BlogListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<PostStatus>,
    pub author: Option<Id>,
}

/// Query string of the public search.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub author: Option<Id>,
    pub sort: Option<ListingSort>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryParams {
    pub limit: Option<u64>,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Attaches authors to posts with one batched user lookup.
pub async fn with_authors(
    repo: &dyn Repo,
    posts: Vec<Post>,
    summary: fn(&User) -> AuthorSummary,
) -> Result<Vec<PostView>, ApiError> {
    let mut ids: Vec<Id> = posts.iter().map(|p| p.author_id).collect();
    ids.sort_unstable();
    ids.dedup();
    let authors: HashMap<Id, AuthorSummary> =
        repo.get_users(&ids).await?.iter().map(|u| (u.id, summary(u))).collect();
    Ok(posts
        .into_iter()
        .map(|p| {
            let author = authors.get(&p.author_id).cloned();
            PostView::new(p, author)
        })
        .collect())
}

pub async fn with_author(repo: &dyn Repo, post: Post, summary: fn(&User) -> AuthorSummary) -> Result<PostView, ApiError> {
    let mut views = with_authors(repo, vec![post], summary).await?;
    views.pop().ok_or_else(|| ApiError::Internal("post vanished while populating author".into()))
}

async fn page_of(
    repo: &dyn Repo,
    filter: &PostFilter,
    sort: SortOrder,
    paging: Paging,
    summary: fn(&User) -> AuthorSummary,
) -> Result<PostPage, ApiError> {
    let (posts, total) = repo.query_posts(filter, sort, paging.skip(), u64::from(paging.limit)).await?;
    Ok(PostPage {
        blogs: with_authors(repo, posts, summary).await?,
        total,
        page: paging.page,
        total_pages: paging.total_pages(total),
    })
}

/// Management listing, newest created first. Anonymous callers and plain users
/// only see published posts unless they list their own.
pub async fn list_posts(repo: &dyn Repo, principal: Option<&Principal>, params: BlogListParams) -> Result<PostPage, ApiError> {
    let mut filter = PostFilter { status: params.status, author_id: params.author, ..PostFilter::default() };
    if !policy::can_list(principal, filter.status, filter.author_id) {
        if filter.status.is_some() {
            // explicitly asked for drafts of someone else
            return Err(match principal {
                None => ApiError::Unauthorized,
                Some(_) => ApiError::forbidden("Not allowed to list unpublished posts"),
            });
        }
        filter.status = Some(PostStatus::Published);
    }
    let paging = Paging::new(params.page, params.limit, BLOGS_PAGE_SIZE);
    page_of(repo, &filter, SortOrder::Created, paging, AuthorSummary::with_email).await
}

/// Public search over published posts.
pub async fn search_posts(repo: &dyn Repo, params: SearchParams) -> Result<PostPage, ApiError> {
    let filter = PostFilter {
        search: non_blank(params.search),
        category: non_blank(params.category),
        author_id: params.author,
        ..PostFilter::published()
    };
    let paging = Paging::new(params.page, params.limit, POSTS_PAGE_SIZE);
    page_of(repo, &filter, SortOrder::from(params.sort.unwrap_or_default()), paging, AuthorSummary::with_image).await
}

pub async fn category_counts(repo: &dyn Repo, limit: Option<u64>) -> Result<Vec<CategoryCount>, ApiError> {
    let limit = limit.unwrap_or(CATEGORY_LIMIT).clamp(1, u64::from(MAX_PAGE_SIZE));
    Ok(repo.category_counts(limit).await?)
}

pub async fn home(repo: &dyn Repo) -> Result<Home, ApiError> {
    let featured_filter = PostFilter { featured: Some(true), ..PostFilter::published() };
    let (featured, _) = repo.query_posts(&featured_filter, SortOrder::Latest, 0, HOME_FEATURED).await?;
    let (latest, _) = repo.query_posts(&PostFilter::published(), SortOrder::Latest, 0, HOME_LATEST).await?;
    Ok(Home {
        featured: with_authors(repo, featured, AuthorSummary::with_image).await?,
        latest: with_authors(repo, latest, AuthorSummary::with_image).await?,
        categories: repo.category_counts(HOME_CATEGORIES).await?,
    })
}

fn tally(posts: &[Post]) -> DashboardStats {
    let published = posts.iter().filter(|p| p.status.is_published()).count();
    DashboardStats {
        total_posts: posts.len(),
        published,
        drafts: posts.len() - published,
        total_views: posts.iter().map(|p| p.views).sum(),
    }
}

/// Every post matching `filter`, newest created first.
async fn all_posts(repo: &dyn Repo, filter: &PostFilter) -> Result<Vec<Post>, ApiError> {
    Ok(repo.query_posts(filter, SortOrder::Created, 0, u64::MAX).await?.0)
}

pub async fn dashboard(repo: &dyn Repo, principal: Option<&Principal>) -> Result<Dashboard, ApiError> {
    let me = policy::require(principal, Capability::Authenticated)?;
    let posts = all_posts(repo, &PostFilter { author_id: Some(me.user_id), ..PostFilter::default() }).await?;
    let stats = tally(&posts);
    Ok(Dashboard { posts, stats })
}

pub async fn admin_overview(repo: &dyn Repo, principal: Option<&Principal>) -> Result<AdminOverview, ApiError> {
    policy::require(principal, Capability::Admin)?;
    let posts = all_posts(repo, &PostFilter::default()).await?;
    let users = repo.list_users().await?;
    let t = tally(&posts);
    let stats = AdminStats {
        total_posts: t.total_posts,
        published: t.published,
        drafts: t.drafts,
        total_views: t.total_views,
        total_users: users.len(),
        total_comments: repo.count_comments().await?,
    };
    Ok(AdminOverview {
        stats,
        posts: with_authors(repo, posts, AuthorSummary::with_email).await?,
        users: users.iter().map(UserProfile::from).collect(),
    })
}
