use async_trait::async_trait;

use crate::auth::Role;
use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("store error: {0}")]
    Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Fails with `Conflict` when the slug is taken.
    async fn insert_post(&self, new: NewPost) -> RepoResult<Post>;
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
    async fn get_post_by_slug(&self, slug: &str, status: Option<PostStatus>) -> RepoResult<Post>;
    async fn slug_exists(&self, slug: &str, exclude: Option<Id>) -> RepoResult<bool>;
    async fn update_post(&self, id: Id, upd: PostUpdate) -> RepoResult<Post>;
    /// Removes the post together with its comments.
    async fn delete_post(&self, id: Id) -> RepoResult<()>;
    /// Atomically bumps the view counter of a published post and returns it.
    async fn record_view(&self, slug: &str) -> RepoResult<Post>;
    /// One page of matching posts plus the total match count.
    async fn query_posts(&self, filter: &PostFilter, sort: SortOrder, skip: u64, limit: u64) -> RepoResult<(Vec<Post>, u64)>;
    async fn related_posts(&self, post: &Post, limit: u64) -> RepoResult<Vec<Post>>;
    async fn category_counts(&self, limit: u64) -> RepoResult<Vec<CategoryCount>>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Stores the comment and, for replies, appends its id to the parent's
    /// reply list as part of the same operation.
    async fn insert_comment(&self, new: NewComment) -> RepoResult<Comment>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    /// Newest first.
    async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>>;
    /// Adds `user_id` to the liker set if absent, removes it if present.
    async fn toggle_like(&self, comment_id: Id, user_id: Id) -> RepoResult<LikeOutcome>;
    async fn count_comments(&self) -> RepoResult<u64>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, new: NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Users for the given ids; unknown ids are skipped.
    async fn get_users(&self, ids: &[Id]) -> RepoResult<Vec<User>>;
    /// Newest first.
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn set_user_role(&self, id: Id, role: Role) -> RepoResult<User>;
}

pub trait Repo: PostRepo + CommentRepo + UserRepo {}

impl<T> Repo for T where T: PostRepo + CommentRepo + UserRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use crate::content::search_document;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock};

    const SNAPSHOT_FILE: &str = "state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        posts: BTreeMap<Id, Post>,
        comments: BTreeMap<Id, Comment>,
        users: BTreeMap<Id, User>,
        next_id: Id,
    }

    impl State {
        fn next_id(&mut self) -> Id {
            self.next_id += 1;
            self.next_id
        }
    }

    /// Process-local store. Every operation runs under one lock, so
    /// multi-record updates (comment + parent, post + its comments) and the
    /// counter/like primitives are atomic.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        /// Ephemeral store that never touches the filesystem.
        pub fn new() -> Self {
            Self::default()
        }

        /// Store backed by `<dir>/state.json`, loaded now and rewritten after
        /// every mutation.
        pub fn open(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join(SNAPSHOT_FILE);
            let state = load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
            }
        }

        fn read<T>(&self, f: impl FnOnce(&State) -> RepoResult<T>) -> RepoResult<T> {
            let s = self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))?;
            f(&s)
        }

        /// Applies `f` and, for file-backed stores, rewrites the snapshot before
        /// the write lock is released so snapshots land in mutation order.
        fn mutate<T>(&self, f: impl FnOnce(&mut State) -> RepoResult<T>) -> RepoResult<T> {
            let mut s = self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))?;
            let out = f(&mut s)?;
            if let Some(path) = self.snapshot_path.as_deref() {
                persist(path, &s);
            }
            Ok(out)
        }
    }

    /// Writes `<path>.tmp` and renames it over `path`, so a crash mid-write
    /// leaves the previous snapshot intact.
    fn persist(path: &Path, state: &State) {
        let bytes = match serde_json::to_vec_pretty(state) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialise snapshot");
                return;
            }
        };
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!(error = %e, dir = %dir.display(), "failed to create snapshot dir");
            }
        }
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path)) {
            tracing::warn!(error = %e, path = %path.display(), "failed to write snapshot");
        }
    }

    fn load_state_from(path: &Path) -> State {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                Ok(s) => {
                    tracing::info!(path = %path.display(), "loaded snapshot");
                    s
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "unreadable snapshot, starting empty");
                    State::default()
                }
            },
            Err(e) => {
                tracing::info!(error = %e, path = %path.display(), "no snapshot, starting empty");
                State::default()
            }
        }
    }

    fn words(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
    }

    /// Any search term equal to a word of the post's search document.
    fn matches_search(post: &Post, terms: &[String]) -> bool {
        let doc = search_document(&post.title, &post.content, &post.tags);
        let found = words(&doc).any(|w| terms.contains(&w));
        found
    }

    fn post_matches(post: &Post, f: &PostFilter, terms: &[String]) -> bool {
        f.status.map_or(true, |s| post.status == s)
            && f.author_id.map_or(true, |a| post.author_id == a)
            && f.category.as_deref().map_or(true, |c| post.category == c)
            && f.featured.map_or(true, |v| post.is_featured == v)
            && (terms.is_empty() || matches_search(post, terms))
    }

    fn sort_posts(posts: &mut [Post], sort: SortOrder) {
        match sort {
            SortOrder::Latest => posts.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id))),
            SortOrder::Oldest => posts.sort_by(|a, b| a.published_at.cmp(&b.published_at).then(a.id.cmp(&b.id))),
            SortOrder::Popular => posts.sort_by(|a, b| b.views.cmp(&a.views)),
            SortOrder::Created => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))),
        }
    }

    fn to_usize(n: u64) -> usize {
        usize::try_from(n).unwrap_or(usize::MAX)
    }

    #[async_trait]
    impl PostRepo for InMemRepo {
        async fn insert_post(&self, new: NewPost) -> RepoResult<Post> {
            self.mutate(|s| {
                if s.posts.values().any(|p| p.slug == new.slug) {
                    return Err(RepoError::Conflict);
                }
                let now = Utc::now();
                let id = s.next_id();
                let post = Post {
                    id,
                    title: new.title,
                    slug: new.slug,
                    content: new.content,
                    excerpt: new.excerpt,
                    featured_image: new.featured_image,
                    author_id: new.author_id,
                    category: new.category,
                    tags: new.tags,
                    status: new.status,
                    views: 0,
                    read_time: new.read_time,
                    is_featured: new.is_featured,
                    published_at: new.published_at,
                    created_at: now,
                    updated_at: now,
                };
                s.posts.insert(id, post.clone());
                Ok(post)
            })
        }

        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            self.read(|s| s.posts.get(&id).cloned().ok_or(RepoError::NotFound))
        }

        async fn get_post_by_slug(&self, slug: &str, status: Option<PostStatus>) -> RepoResult<Post> {
            self.read(|s| {
                s.posts
                    .values()
                    .find(|p| p.slug == slug && status.map_or(true, |st| p.status == st))
                    .cloned()
                    .ok_or(RepoError::NotFound)
            })
        }

        async fn slug_exists(&self, slug: &str, exclude: Option<Id>) -> RepoResult<bool> {
            self.read(|s| Ok(s.posts.values().any(|p| p.slug == slug && Some(p.id) != exclude)))
        }

        async fn update_post(&self, id: Id, upd: PostUpdate) -> RepoResult<Post> {
            self.mutate(|s| {
                // uniqueness check before taking the mutable borrow
                if s.posts.values().any(|p| p.slug == upd.slug && p.id != id) {
                    return Err(RepoError::Conflict);
                }
                let post = s.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
                post.title = upd.title;
                post.slug = upd.slug;
                post.content = upd.content;
                post.excerpt = upd.excerpt;
                post.featured_image = upd.featured_image;
                post.category = upd.category;
                post.tags = upd.tags;
                post.status = upd.status;
                post.read_time = upd.read_time;
                post.is_featured = upd.is_featured;
                post.published_at = upd.published_at;
                post.updated_at = Utc::now();
                Ok(post.clone())
            })
        }

        async fn delete_post(&self, id: Id) -> RepoResult<()> {
            self.mutate(|s| {
                s.posts.remove(&id).ok_or(RepoError::NotFound)?;
                s.comments.retain(|_, c| c.post_id != id);
                Ok(())
            })
        }

        async fn record_view(&self, slug: &str) -> RepoResult<Post> {
            self.mutate(|s| {
                let post = s
                    .posts
                    .values_mut()
                    .find(|p| p.slug == slug && p.status.is_published())
                    .ok_or(RepoError::NotFound)?;
                post.views += 1;
                Ok(post.clone())
            })
        }

        async fn query_posts(&self, filter: &PostFilter, sort: SortOrder, skip: u64, limit: u64) -> RepoResult<(Vec<Post>, u64)> {
            let terms: Vec<String> = filter.search.as_deref().map(|q| words(q).collect()).unwrap_or_default();
            self.read(|s| {
                let mut hits: Vec<Post> = s.posts.values().filter(|p| post_matches(p, filter, &terms)).cloned().collect();
                let total = hits.len() as u64;
                sort_posts(&mut hits, sort);
                let page = hits.into_iter().skip(to_usize(skip)).take(to_usize(limit)).collect();
                Ok((page, total))
            })
        }

        async fn related_posts(&self, post: &Post, limit: u64) -> RepoResult<Vec<Post>> {
            self.read(|s| {
                let mut related: Vec<Post> = s
                    .posts
                    .values()
                    .filter(|p| p.id != post.id && p.status.is_published())
                    .filter(|p| p.category == post.category || p.tags.iter().any(|t| post.tags.contains(t)))
                    .cloned()
                    .collect();
                sort_posts(&mut related, SortOrder::Latest);
                related.truncate(to_usize(limit));
                Ok(related)
            })
        }

        async fn category_counts(&self, limit: u64) -> RepoResult<Vec<CategoryCount>> {
            self.read(|s| {
                let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
                for p in s.posts.values().filter(|p| p.status.is_published()) {
                    *counts.entry(p.category.as_str()).or_default() += 1;
                }
                let mut out: Vec<CategoryCount> = counts
                    .into_iter()
                    .map(|(category, count)| CategoryCount { category: category.to_string(), count })
                    .collect();
                // BTreeMap order makes ties alphabetical under the stable sort
                out.sort_by(|a, b| b.count.cmp(&a.count));
                out.truncate(to_usize(limit));
                Ok(out)
            })
        }
    }

    #[async_trait]
    impl CommentRepo for InMemRepo {
        async fn insert_comment(&self, new: NewComment) -> RepoResult<Comment> {
            self.mutate(|s| {
                if !s.posts.contains_key(&new.post_id) {
                    return Err(RepoError::NotFound);
                }
                if let Some(parent) = new.parent_comment {
                    if !s.comments.contains_key(&parent) {
                        return Err(RepoError::NotFound);
                    }
                }
                let now = Utc::now();
                let id = s.next_id();
                let comment = Comment {
                    id,
                    content: new.content,
                    author_id: new.author_id,
                    post_id: new.post_id,
                    parent_comment: new.parent_comment,
                    replies: Vec::new(),
                    likes: Vec::new(),
                    created_at: now,
                    updated_at: now,
                };
                s.comments.insert(id, comment.clone());
                if let Some(parent) = new.parent_comment.and_then(|p| s.comments.get_mut(&p)) {
                    parent.replies.push(id);
                }
                Ok(comment)
            })
        }

        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            self.read(|s| s.comments.get(&id).cloned().ok_or(RepoError::NotFound))
        }

        async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
            self.read(|s| {
                let mut v: Vec<Comment> = s.comments.values().filter(|c| c.post_id == post_id).cloned().collect();
                v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                Ok(v)
            })
        }

        async fn toggle_like(&self, comment_id: Id, user_id: Id) -> RepoResult<LikeOutcome> {
            self.mutate(|s| {
                let c = s.comments.get_mut(&comment_id).ok_or(RepoError::NotFound)?;
                let liked = if let Some(pos) = c.likes.iter().position(|u| *u == user_id) {
                    c.likes.remove(pos);
                    false
                } else {
                    c.likes.push(user_id);
                    true
                };
                c.updated_at = Utc::now();
                Ok(LikeOutcome { liked, likes: c.likes.len() })
            })
        }

        async fn count_comments(&self) -> RepoResult<u64> {
            self.read(|s| Ok(s.comments.len() as u64))
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn insert_user(&self, new: NewUser) -> RepoResult<User> {
            self.mutate(|s| {
                if s.users.values().any(|u| u.email == new.email) {
                    return Err(RepoError::Conflict);
                }
                let now = Utc::now();
                let id = s.next_id();
                let user = User {
                    id,
                    name: new.name,
                    email: new.email,
                    password_hash: new.password_hash,
                    role: new.role,
                    image: new.image,
                    bio: new.bio,
                    created_at: now,
                    updated_at: now,
                };
                s.users.insert(id, user.clone());
                Ok(user)
            })
        }

        async fn get_user(&self, id: Id) -> RepoResult<User> {
            self.read(|s| s.users.get(&id).cloned().ok_or(RepoError::NotFound))
        }

        async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
            self.read(|s| Ok(s.users.values().find(|u| u.email == email).cloned()))
        }

        async fn get_users(&self, ids: &[Id]) -> RepoResult<Vec<User>> {
            self.read(|s| Ok(ids.iter().filter_map(|id| s.users.get(id).cloned()).collect()))
        }

        async fn list_users(&self) -> RepoResult<Vec<User>> {
            self.read(|s| {
                let mut v: Vec<User> = s.users.values().cloned().collect();
                v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                Ok(v)
            })
        }

        async fn set_user_role(&self, id: Id, role: Role) -> RepoResult<User> {
            self.mutate(|s| {
                let u = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
                u.role = role;
                u.updated_at = Utc::now();
                Ok(u.clone())
            })
        }
    }
}

#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use crate::content::search_document;
    use sqlx::{Pool, Postgres, QueryBuilder};

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }

        pub async fn close(&self) {
            self.pool.close().await;
        }
    }

    fn map_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
            other => RepoError::Internal(other.to_string()),
        }
    }

    fn to_i64(n: u64) -> i64 {
        i64::try_from(n).unwrap_or(i64::MAX)
    }

    /// `to_tsquery` input matching any of the words in `search`.
    fn ts_query(search: &str) -> Option<String> {
        let terms: Vec<String> = search
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        (!terms.is_empty()).then(|| terms.join(" | "))
    }

    fn push_filter(b: &mut QueryBuilder<'_, Postgres>, f: &PostFilter) {
        b.push(" WHERE TRUE");
        if let Some(status) = f.status {
            b.push(" AND status = ").push_bind(status);
        }
        if let Some(author) = f.author_id {
            b.push(" AND author_id = ").push_bind(author);
        }
        if let Some(category) = &f.category {
            b.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(featured) = f.featured {
            b.push(" AND is_featured = ").push_bind(featured);
        }
        if let Some(q) = f.search.as_deref().and_then(ts_query) {
            // same expression as posts_search_idx
            b.push(" AND to_tsvector('simple', search_document) @@ to_tsquery('simple', ")
                .push_bind(q)
                .push(")");
        }
    }

    fn order_by(sort: SortOrder) -> &'static str {
        match sort {
            SortOrder::Latest => " ORDER BY published_at DESC NULLS LAST, id DESC",
            SortOrder::Oldest => " ORDER BY published_at ASC NULLS FIRST, id ASC",
            SortOrder::Popular => " ORDER BY views DESC, id ASC",
            SortOrder::Created => " ORDER BY created_at DESC, id DESC",
        }
    }

    #[async_trait]
    impl PostRepo for PgRepo {
        async fn insert_post(&self, new: NewPost) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(
                r#"INSERT INTO posts (title, slug, content, excerpt, featured_image, author_id, category, tags,
                                      status, read_time, is_featured, published_at, search_document)
                   VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
                   RETURNING *"#,
            )
            .bind(&new.title)
            .bind(&new.slug)
            .bind(&new.content)
            .bind(&new.excerpt)
            .bind(&new.featured_image)
            .bind(new.author_id)
            .bind(&new.category)
            .bind(&new.tags)
            .bind(new.status)
            .bind(new.read_time)
            .bind(new.is_featured)
            .bind(new.published_at)
            .bind(search_document(&new.title, &new.content, &new.tags))
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
        }

        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn get_post_by_slug(&self, slug: &str, status: Option<PostStatus>) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE slug = $1 AND ($2::post_status IS NULL OR status = $2)")
                .bind(slug)
                .bind(status)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn slug_exists(&self, slug: &str, exclude: Option<Id>) -> RepoResult<bool> {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM posts WHERE slug = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
            )
            .bind(slug)
            .bind(exclude)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
        }

        async fn update_post(&self, id: Id, upd: PostUpdate) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(
                r#"UPDATE posts SET title = $2, slug = $3, content = $4, excerpt = $5, featured_image = $6,
                          category = $7, tags = $8, status = $9, read_time = $10, is_featured = $11,
                          published_at = $12, search_document = $13, updated_at = now()
                   WHERE id = $1
                   RETURNING *"#,
            )
            .bind(id)
            .bind(&upd.title)
            .bind(&upd.slug)
            .bind(&upd.content)
            .bind(&upd.excerpt)
            .bind(&upd.featured_image)
            .bind(&upd.category)
            .bind(&upd.tags)
            .bind(upd.status)
            .bind(upd.read_time)
            .bind(upd.is_featured)
            .bind(upd.published_at)
            .bind(search_document(&upd.title, &upd.content, &upd.tags))
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
        }

        async fn delete_post(&self, id: Id) -> RepoResult<()> {
            // comments go with the post via ON DELETE CASCADE
            let res = sqlx::query("DELETE FROM posts WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_err)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn record_view(&self, slug: &str) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(
                "UPDATE posts SET views = views + 1 WHERE slug = $1 AND status = 'published' RETURNING *",
            )
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
        }

        async fn query_posts(&self, filter: &PostFilter, sort: SortOrder, skip: u64, limit: u64) -> RepoResult<(Vec<Post>, u64)> {
            let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts");
            push_filter(&mut count, filter);
            let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await.map_err(map_err)?;

            let mut list = QueryBuilder::<Postgres>::new("SELECT * FROM posts");
            push_filter(&mut list, filter);
            list.push(order_by(sort));
            list.push(" LIMIT ").push_bind(to_i64(limit));
            list.push(" OFFSET ").push_bind(to_i64(skip));
            let posts = list.build_query_as::<Post>().fetch_all(&self.pool).await.map_err(map_err)?;
            Ok((posts, u64::try_from(total).unwrap_or(0)))
        }

        async fn related_posts(&self, post: &Post, limit: u64) -> RepoResult<Vec<Post>> {
            sqlx::query_as::<_, Post>(
                r#"SELECT * FROM posts
                   WHERE status = 'published' AND id <> $1 AND (category = $2 OR tags && $3)
                   ORDER BY published_at DESC NULLS LAST, id DESC
                   LIMIT $4"#,
            )
            .bind(post.id)
            .bind(&post.category)
            .bind(&post.tags)
            .bind(to_i64(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
        }

        async fn category_counts(&self, limit: u64) -> RepoResult<Vec<CategoryCount>> {
            sqlx::query_as::<_, CategoryCount>(
                r#"SELECT category, COUNT(*) AS count FROM posts
                   WHERE status = 'published'
                   GROUP BY category
                   ORDER BY count DESC, category ASC
                   LIMIT $1"#,
            )
            .bind(to_i64(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
        }
    }

    #[async_trait]
    impl CommentRepo for PgRepo {
        async fn insert_comment(&self, new: NewComment) -> RepoResult<Comment> {
            let mut tx = self.pool.begin().await.map_err(map_err)?;
            let comment = sqlx::query_as::<_, Comment>(
                r#"INSERT INTO comments (content, author_id, post_id, parent_comment)
                   VALUES ($1,$2,$3,$4)
                   RETURNING *"#,
            )
            .bind(&new.content)
            .bind(new.author_id)
            .bind(new.post_id)
            .bind(new.parent_comment)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                // missing post or parent row
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepoError::NotFound,
                other => map_err(other),
            })?;
            if let Some(parent) = new.parent_comment {
                sqlx::query("UPDATE comments SET replies = array_append(replies, $1), updated_at = now() WHERE id = $2")
                    .bind(comment.id)
                    .bind(parent)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_err)?;
            }
            tx.commit().await.map_err(map_err)?;
            Ok(comment)
        }

        async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
            sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
            sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE post_id = $1 ORDER BY created_at DESC, id DESC")
                .bind(post_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn toggle_like(&self, comment_id: Id, user_id: Id) -> RepoResult<LikeOutcome> {
            let likes: Vec<Id> = sqlx::query_scalar(
                r#"UPDATE comments
                   SET likes = CASE WHEN $2 = ANY(likes) THEN array_remove(likes, $2) ELSE array_append(likes, $2) END,
                       updated_at = now()
                   WHERE id = $1
                   RETURNING likes"#,
            )
            .bind(comment_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
            Ok(LikeOutcome { liked: likes.contains(&user_id), likes: likes.len() })
        }

        async fn count_comments(&self) -> RepoResult<u64> {
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)?;
            Ok(u64::try_from(n).unwrap_or(0))
        }
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn insert_user(&self, new: NewUser) -> RepoResult<User> {
            sqlx::query_as::<_, User>(
                r#"INSERT INTO users (name, email, password_hash, role, image, bio)
                   VALUES ($1,$2,$3,$4,$5,$6)
                   RETURNING *"#,
            )
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(new.role)
            .bind(&new.image)
            .bind(&new.bio)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
        }

        async fn get_user(&self, id: Id) -> RepoResult<User> {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn get_users(&self, ids: &[Id]) -> RepoResult<Vec<User>> {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn list_users(&self) -> RepoResult<Vec<User>> {
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn set_user_role(&self, id: Id, role: Role) -> RepoResult<User> {
            sqlx::query_as::<_, User>("UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(role)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        }
    }
}
