use std::sync::Arc;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, JwtKeys, Principal};
use crate::config::{AppConfig, RepublishPolicy};
use crate::error::{ApiError, ApiErrorBody};
use crate::models::*;
use crate::query::{BlogListParams, CategoryParams, SearchParams};
use crate::repo::Repo;
use crate::{discussion, identity, lifecycle, query};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .app_data(web::PathConfig::default().error_handler(path_error));
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/blogs")
                    .route(web::get().to(list_blogs))
                    .route(web::post().to(create_blog)),
            )
            .service(
                web::resource("/blogs/{id}")
                    .route(web::get().to(get_blog))
                    .route(web::put().to(update_blog))
                    .route(web::delete().to(delete_blog)),
            )
            .service(
                web::resource("/blogs/{id}/comments")
                    .route(web::get().to(list_comments))
                    .route(web::post().to(add_comment)),
            )
            .service(web::resource("/comments/{id}/like").route(web::post().to(toggle_like)))
            .service(web::resource("/posts").route(web::get().to(search_posts)))
            .service(web::resource("/posts/{slug}").route(web::get().to(view_post)))
            .service(web::resource("/posts/{slug}/related").route(web::get().to(related_posts)))
            .service(web::resource("/categories").route(web::get().to(categories)))
            .service(web::resource("/home").route(web::get().to(home)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/admin/stats").route(web::get().to(admin_stats)))
            .service(web::resource("/admin/users/{id}/role").route(web::put().to(set_role)))
            .service(web::resource("/auth/register").route(web::post().to(register)))
            .service(web::resource("/auth/login").route(web::post().to(login)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub jwt: JwtKeys,
    pub republish: RepublishPolicy,
    /// Lowercased emails that register as admins.
    pub bootstrap_admins: Arc<[String]>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>, cfg: &AppConfig) -> Self {
        Self {
            repo,
            jwt: JwtKeys::new(&cfg.jwt_secret, cfg.jwt_ttl_hours),
            republish: cfg.republish,
            bootstrap_admins: cfg.bootstrap_admin_emails.clone().into(),
        }
    }
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::validation(format!("Invalid request body: {err}")).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::validation(format!("Invalid query string: {err}")).into()
}

// ids that do not parse cannot name an existing record
fn path_error(_err: PathError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::not_found("Not found").into()
}

fn principal(auth: &Option<Auth>) -> Option<&Principal> {
    auth.as_ref().map(|a| &a.0)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LikeResponse {
    pub success: bool,
    pub liked: bool,
    pub likes: usize,
}

#[utoipa::path(
    get,
    path = "/api/blogs",
    params(BlogListParams),
    responses(
        (status = 200, description = "Page of posts, newest created first", body = PostPage),
        (status = 401, description = "Unpublished posts requested anonymously", body = ApiErrorBody),
        (status = 403, description = "Unpublished posts of another author", body = ApiErrorBody)
    ),
    tag = "blogs"
)]
pub async fn list_blogs(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    params: web::Query<BlogListParams>,
) -> Result<HttpResponse, ApiError> {
    let page = query::list_posts(data.repo.as_ref(), principal(&auth), params.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    post,
    path = "/api/blogs",
    request_body = PostInput,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Missing fields or duplicate title", body = ApiErrorBody),
        (status = 401, description = "Not signed in", body = ApiErrorBody)
    ),
    tag = "blogs"
)]
pub async fn create_blog(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    payload: web::Json<PostInput>,
) -> Result<HttpResponse, ApiError> {
    let post = lifecycle::create_post(data.repo.as_ref(), principal(&auth), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(post))
}

#[utoipa::path(
    get,
    path = "/api/blogs/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post with its author", body = PostView),
        (status = 404, description = "Missing, or a draft of someone else", body = ApiErrorBody)
    ),
    tag = "blogs"
)]
pub async fn get_blog(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let repo = data.repo.as_ref();
    let post = lifecycle::get_post(repo, principal(&auth), path.into_inner()).await?;
    let view = query::with_author(repo, post, AuthorSummary::with_email).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    put,
    path = "/api/blogs/{id}",
    params(("id" = Id, Path, description = "Post id")),
    request_body = PostInput,
    responses(
        (status = 200, description = "Post replaced", body = Post),
        (status = 400, description = "Missing fields or duplicate title", body = ApiErrorBody),
        (status = 401, description = "Not signed in", body = ApiErrorBody),
        (status = 403, description = "Not the author", body = ApiErrorBody),
        (status = 404, description = "Post not found", body = ApiErrorBody)
    ),
    tag = "blogs"
)]
pub async fn update_blog(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<PostInput>,
) -> Result<HttpResponse, ApiError> {
    let post = lifecycle::update_post(
        data.repo.as_ref(),
        principal(&auth),
        path.into_inner(),
        payload.into_inner(),
        data.republish,
    )
    .await?;
    Ok(HttpResponse::Ok().json(post))
}

#[utoipa::path(
    delete,
    path = "/api/blogs/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post and its comments deleted", body = MessageResponse),
        (status = 401, description = "Not signed in", body = ApiErrorBody),
        (status = 403, description = "Not the author", body = ApiErrorBody),
        (status = 404, description = "Post not found", body = ApiErrorBody)
    ),
    tag = "blogs"
)]
pub async fn delete_blog(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    lifecycle::delete_post(data.repo.as_ref(), principal(&auth), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse { message: "Blog post deleted successfully".into() }))
}

#[utoipa::path(
    get,
    path = "/api/blogs/{id}/comments",
    params(("id" = Id, Path, description = "Post id")),
    responses((status = 200, description = "Comments, newest first", body = [CommentView])),
    tag = "comments"
)]
pub async fn list_comments(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let comments = discussion::list_comments(data.repo.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comments))
}

#[utoipa::path(
    post,
    path = "/api/blogs/{id}/comments",
    params(("id" = Id, Path, description = "Post id")),
    request_body = CommentInput,
    responses(
        (status = 201, description = "Comment added, with its author", body = CommentView),
        (status = 400, description = "Blank content, or parent on another post", body = ApiErrorBody),
        (status = 401, description = "Not signed in", body = ApiErrorBody),
        (status = 404, description = "Post or parent comment not found", body = ApiErrorBody)
    ),
    tag = "comments"
)]
pub async fn add_comment(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CommentInput>,
) -> Result<HttpResponse, ApiError> {
    let comment =
        discussion::add_comment(data.repo.as_ref(), principal(&auth), path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(comment))
}

#[utoipa::path(
    post,
    path = "/api/comments/{id}/like",
    params(("id" = Id, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Like toggled", body = LikeResponse),
        (status = 401, description = "Not signed in", body = ApiErrorBody),
        (status = 404, description = "Comment not found", body = ApiErrorBody)
    ),
    tag = "comments"
)]
pub async fn toggle_like(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let outcome = discussion::toggle_like(data.repo.as_ref(), principal(&auth), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(LikeResponse { success: true, liked: outcome.liked, likes: outcome.likes }))
}

#[utoipa::path(
    get,
    path = "/api/posts",
    params(SearchParams),
    responses(
        (status = 200, description = "Page of published posts", body = PostPage),
        (status = 400, description = "Malformed query", body = ApiErrorBody)
    ),
    tag = "posts"
)]
pub async fn search_posts(data: web::Data<AppState>, params: web::Query<SearchParams>) -> Result<HttpResponse, ApiError> {
    let page = query::search_posts(data.repo.as_ref(), params.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/posts/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Published post; counts as one view", body = PostView),
        (status = 404, description = "No published post with this slug", body = ApiErrorBody)
    ),
    tag = "posts"
)]
pub async fn view_post(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let repo = data.repo.as_ref();
    let post = lifecycle::view_post(repo, &path.into_inner()).await?;
    let view = query::with_author(repo, post, AuthorSummary::with_image).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    get,
    path = "/api/posts/{slug}/related",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Up to three related published posts", body = [PostView]),
        (status = 404, description = "No published post with this slug", body = ApiErrorBody)
    ),
    tag = "posts"
)]
pub async fn related_posts(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let repo = data.repo.as_ref();
    let post = lifecycle::published_by_slug(repo, &path.into_inner()).await?;
    let related = lifecycle::related_posts(repo, &post).await?;
    Ok(HttpResponse::Ok().json(query::with_authors(repo, related, AuthorSummary::with_image).await?))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    params(CategoryParams),
    responses((status = 200, description = "Published post counts per category", body = [CategoryCount])),
    tag = "posts"
)]
pub async fn categories(data: web::Data<AppState>, params: web::Query<CategoryParams>) -> Result<HttpResponse, ApiError> {
    let counts = query::category_counts(data.repo.as_ref(), params.limit).await?;
    Ok(HttpResponse::Ok().json(counts))
}

#[utoipa::path(
    get,
    path = "/api/home",
    responses((status = 200, description = "Featured and latest posts plus top categories", body = Home)),
    tag = "posts"
)]
pub async fn home(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(query::home(data.repo.as_ref()).await?))
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "The caller's posts and totals", body = Dashboard),
        (status = 401, description = "Not signed in", body = ApiErrorBody)
    ),
    tag = "users"
)]
pub async fn dashboard(auth: Option<Auth>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(query::dashboard(data.repo.as_ref(), principal(&auth)).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Site totals, all posts and all users", body = AdminOverview),
        (status = 401, description = "Not signed in", body = ApiErrorBody),
        (status = 403, description = "Admins only", body = ApiErrorBody)
    ),
    tag = "admin"
)]
pub async fn admin_stats(auth: Option<Auth>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(query::admin_overview(data.repo.as_ref(), principal(&auth)).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Id, Path, description = "User id")),
    request_body = RoleInput,
    responses(
        (status = 200, description = "Role changed", body = UserProfile),
        (status = 403, description = "Admins only", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody)
    ),
    tag = "admin"
)]
pub async fn set_role(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<RoleInput>,
) -> Result<HttpResponse, ApiError> {
    let user = identity::set_role(data.repo.as_ref(), principal(&auth), path.into_inner(), payload.role).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input or email taken", body = ApiErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(data: web::Data<AppState>, payload: web::Json<RegisterInput>) -> Result<HttpResponse, ApiError> {
    let resp = identity::register(data.repo.as_ref(), &data.jwt, &data.bootstrap_admins, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Bad credentials", body = ApiErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(data: web::Data<AppState>, payload: web::Json<LoginInput>) -> Result<HttpResponse, ApiError> {
    let resp = identity::login(data.repo.as_ref(), &data.jwt, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(resp))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The signed-in user", body = UserProfile),
        (status = 401, description = "Not signed in", body = ApiErrorBody)
    ),
    tag = "auth"
)]
pub async fn auth_me(auth: Option<Auth>, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(identity::me(data.repo.as_ref(), principal(&auth)).await?))
}
