#![cfg(feature = "inmem-store")]

use scribe::auth::{Principal, Role};
use scribe::config::RepublishPolicy;
use scribe::error::ApiError;
use scribe::models::{CommentInput, PostInput, PostStatus};
use scribe::query::{self, BlogListParams, SearchParams};
use scribe::repo::inmem::InMemRepo;
use scribe::repo::{CommentRepo, PostRepo};
use scribe::{discussion, lifecycle};

fn author(id: i64) -> Principal {
    Principal { user_id: id, name: format!("author{id}"), role: Role::User }
}

fn admin() -> Principal {
    Principal { user_id: 100, name: "admin".into(), role: Role::Admin }
}

fn input(title: &str, status: PostStatus) -> PostInput {
    PostInput {
        title: title.into(),
        content: "<p>Hello there reader</p>".into(),
        excerpt: "A short excerpt".into(),
        category: "Tech".into(),
        tags: vec![" rust ".into(), "rust".into(), "".into(), "web".into()],
        featured_image: None,
        status: Some(status),
        is_featured: false,
    }
}

#[tokio::test]
async fn create_derives_slug_read_time_and_publish_time() {
    let repo = InMemRepo::new();
    let mut body = input("Hello, World!! 2024", PostStatus::Published);
    body.content = "word ".repeat(450);
    let post = lifecycle::create_post(&repo, Some(&author(1)), body).await.unwrap();

    assert_eq!(post.slug, "hello-world-2024");
    assert_eq!(post.read_time, 3);
    assert_eq!(post.author_id, 1);
    assert_eq!(post.tags, vec!["rust".to_string(), "web".to_string()]);
    assert!(post.published_at.is_some());
    assert_eq!(post.views, 0);

    let draft = lifecycle::create_post(&repo, Some(&author(1)), input("Draft one", PostStatus::Draft)).await.unwrap();
    assert!(draft.published_at.is_none());
}

#[tokio::test]
async fn create_validates_and_rejects_duplicate_slugs() {
    let repo = InMemRepo::new();
    let me = author(1);

    let err = lifecycle::create_post(&repo, None, input("Anon", PostStatus::Draft)).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    let mut missing = input("No excerpt", PostStatus::Draft);
    missing.excerpt = "   ".into();
    let err = lifecycle::create_post(&repo, Some(&me), missing).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let mut long = input("Long excerpt", PostStatus::Draft);
    long.excerpt = "x".repeat(201);
    assert!(matches!(lifecycle::create_post(&repo, Some(&me), long).await, Err(ApiError::Validation(_))));

    let err = lifecycle::create_post(&repo, Some(&me), input("!!!", PostStatus::Draft)).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    lifecycle::create_post(&repo, Some(&me), input("Same Title", PostStatus::Draft)).await.unwrap();
    let err = lifecycle::create_post(&repo, Some(&author(2)), input("same   title!", PostStatus::Draft)).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(ref m) if m == "A blog with this title already exists"));
}

#[tokio::test]
async fn update_checks_auth_then_existence_then_ownership() {
    let repo = InMemRepo::new();
    let post = lifecycle::create_post(&repo, Some(&author(1)), input("Mine", PostStatus::Draft)).await.unwrap();
    let refresh = RepublishPolicy::Refresh;

    let err = lifecycle::update_post(&repo, None, 9999, input("x", PostStatus::Draft), refresh).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    let err = lifecycle::update_post(&repo, Some(&author(1)), 9999, input("x", PostStatus::Draft), refresh).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    let err = lifecycle::update_post(&repo, Some(&author(2)), post.id, input("x", PostStatus::Draft), refresh).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(ref m) if m == "You are not authorized to edit this post"));
    // admins do not edit other people's posts
    let err = lifecycle::update_post(&repo, Some(&admin()), post.id, input("x", PostStatus::Draft), refresh).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = lifecycle::delete_post(&repo, Some(&author(2)), post.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(ref m) if m == "You are not authorized to delete this post"));
}

#[tokio::test]
async fn retitle_moves_the_slug() {
    let repo = InMemRepo::new();
    let me = author(1);
    let post = lifecycle::create_post(&repo, Some(&me), input("Old Name", PostStatus::Published)).await.unwrap();
    lifecycle::create_post(&repo, Some(&me), input("Taken", PostStatus::Draft)).await.unwrap();

    let err = lifecycle::update_post(&repo, Some(&me), post.id, input("taken", PostStatus::Published), RepublishPolicy::Refresh)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let mut body = input("New Name", PostStatus::Published);
    body.content = "word ".repeat(201);
    let updated = lifecycle::update_post(&repo, Some(&me), post.id, body, RepublishPolicy::Refresh).await.unwrap();
    assert_eq!(updated.slug, "new-name");
    assert_eq!(updated.read_time, 2);

    assert!(matches!(lifecycle::view_post(&repo, "old-name").await, Err(ApiError::NotFound(_))));
    assert_eq!(lifecycle::view_post(&repo, "new-name").await.unwrap().id, post.id);

    // same title keeps the slug even when the content changes
    let mut same = input("New Name", PostStatus::Published);
    same.content = "<p>rewritten</p>".into();
    let again = lifecycle::update_post(&repo, Some(&me), post.id, same, RepublishPolicy::Refresh).await.unwrap();
    assert_eq!(again.slug, "new-name");
}

#[tokio::test]
async fn republish_policy_controls_publish_time() {
    let repo = InMemRepo::new();
    let me = author(1);
    let post = lifecycle::create_post(&repo, Some(&me), input("Timely", PostStatus::Published)).await.unwrap();
    let first = post.published_at.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let kept = lifecycle::update_post(&repo, Some(&me), post.id, input("Timely", PostStatus::Published), RepublishPolicy::KeepFirst)
        .await
        .unwrap();
    assert_eq!(kept.published_at, Some(first));

    let unpublished = lifecycle::update_post(&repo, Some(&me), post.id, input("Timely", PostStatus::Draft), RepublishPolicy::Refresh)
        .await
        .unwrap();
    assert_eq!(unpublished.published_at, Some(first));

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let refreshed = lifecycle::update_post(&repo, Some(&me), post.id, input("Timely", PostStatus::Published), RepublishPolicy::Refresh)
        .await
        .unwrap();
    assert!(refreshed.published_at.unwrap() > first);
}

#[tokio::test]
async fn views_accumulate_and_deleted_posts_disappear() {
    let repo = InMemRepo::new();
    let me = author(1);
    let post = lifecycle::create_post(&repo, Some(&me), input("Counted", PostStatus::Published)).await.unwrap();
    for _ in 0..3 {
        lifecycle::view_post(&repo, "counted").await.unwrap();
    }
    assert_eq!(repo.get_post(post.id).await.unwrap().views, 3);

    let draft = lifecycle::create_post(&repo, Some(&me), input("Secret", PostStatus::Draft)).await.unwrap();
    assert!(matches!(lifecycle::view_post(&repo, "secret").await, Err(ApiError::NotFound(_))));
    assert!(matches!(lifecycle::get_post(&repo, None, draft.id).await, Err(ApiError::NotFound(_))));
    assert!(matches!(lifecycle::get_post(&repo, Some(&author(2)), draft.id).await, Err(ApiError::NotFound(_))));
    assert!(lifecycle::get_post(&repo, Some(&me), draft.id).await.is_ok());
    assert!(lifecycle::get_post(&repo, Some(&admin()), draft.id).await.is_ok());

    lifecycle::delete_post(&repo, Some(&me), post.id).await.unwrap();
    assert!(matches!(lifecycle::view_post(&repo, "counted").await, Err(ApiError::NotFound(_))));
    let page = query::search_posts(&repo, SearchParams::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn listing_hides_other_peoples_drafts() {
    let repo = InMemRepo::new();
    lifecycle::create_post(&repo, Some(&author(1)), input("Public", PostStatus::Published)).await.unwrap();
    lifecycle::create_post(&repo, Some(&author(1)), input("Private", PostStatus::Draft)).await.unwrap();

    let anon = query::list_posts(&repo, None, BlogListParams::default()).await.unwrap();
    assert_eq!(anon.total, 1);

    let own = BlogListParams { author: Some(1), ..BlogListParams::default() };
    assert_eq!(query::list_posts(&repo, Some(&author(1)), own).await.unwrap().total, 2);

    let all = query::list_posts(&repo, Some(&admin()), BlogListParams::default()).await.unwrap();
    assert_eq!(all.total, 2);

    let drafts = BlogListParams { status: Some(PostStatus::Draft), ..BlogListParams::default() };
    assert!(matches!(query::list_posts(&repo, Some(&author(2)), drafts).await, Err(ApiError::Forbidden(_))));
}

#[tokio::test]
async fn dashboard_and_admin_totals() {
    let repo = InMemRepo::new();
    let me = author(1);
    lifecycle::create_post(&repo, Some(&me), input("Alpha", PostStatus::Published)).await.unwrap();
    lifecycle::create_post(&repo, Some(&me), input("Beta", PostStatus::Draft)).await.unwrap();
    lifecycle::create_post(&repo, Some(&author(2)), input("Gamma", PostStatus::Published)).await.unwrap();
    lifecycle::view_post(&repo, "alpha").await.unwrap();
    lifecycle::view_post(&repo, "gamma").await.unwrap();

    let dash = query::dashboard(&repo, Some(&me)).await.unwrap();
    assert_eq!(dash.posts.len(), 2);
    assert_eq!((dash.stats.total_posts, dash.stats.published, dash.stats.drafts), (2, 1, 1));
    assert_eq!(dash.stats.total_views, 1);

    assert!(matches!(query::admin_overview(&repo, Some(&me)).await, Err(ApiError::Forbidden(_))));
    let overview = query::admin_overview(&repo, Some(&admin())).await.unwrap();
    assert_eq!(overview.stats.total_posts, 3);
    assert_eq!(overview.stats.total_views, 2);
    assert_eq!(overview.stats.total_comments, 0);
}

#[tokio::test]
async fn comments_validate_parent_and_toggle_likes() {
    let repo = InMemRepo::new();
    let me = author(1);
    let a = lifecycle::create_post(&repo, Some(&me), input("First", PostStatus::Published)).await.unwrap();
    let b = lifecycle::create_post(&repo, Some(&me), input("Second", PostStatus::Published)).await.unwrap();

    let blank = CommentInput { content: "   ".into(), parent_comment: None };
    assert!(matches!(discussion::add_comment(&repo, Some(&me), a.id, blank).await, Err(ApiError::Validation(_))));
    let hi = || CommentInput { content: " hi ".into(), parent_comment: None };
    assert!(matches!(discussion::add_comment(&repo, None, a.id, hi()).await, Err(ApiError::Unauthorized)));
    assert!(matches!(discussion::add_comment(&repo, Some(&me), 9999, hi()).await, Err(ApiError::NotFound(_))));

    let top = discussion::add_comment(&repo, Some(&me), a.id, hi()).await.unwrap().comment;
    assert_eq!(top.content, "hi");

    let cross = CommentInput { content: "wrong post".into(), parent_comment: Some(top.id) };
    assert!(matches!(discussion::add_comment(&repo, Some(&me), b.id, cross).await, Err(ApiError::Validation(_))));
    let orphan = CommentInput { content: "no parent".into(), parent_comment: Some(9999) };
    assert!(matches!(discussion::add_comment(&repo, Some(&me), a.id, orphan).await, Err(ApiError::NotFound(_))));

    let reply = CommentInput { content: "reply".into(), parent_comment: Some(top.id) };
    let reply = discussion::add_comment(&repo, Some(&author(2)), a.id, reply).await.unwrap().comment;
    assert_eq!(repo.get_comment(top.id).await.unwrap().replies, vec![reply.id]);

    let liked = discussion::toggle_like(&repo, Some(&author(2)), top.id).await.unwrap();
    assert!(liked.liked);
    let unliked = discussion::toggle_like(&repo, Some(&author(2)), top.id).await.unwrap();
    assert!(!unliked.liked);
    assert_eq!(unliked.likes, 0);
    assert!(matches!(discussion::toggle_like(&repo, Some(&me), 9999).await, Err(ApiError::NotFound(ref m)) if m == "Comment not found"));
}
