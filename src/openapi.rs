use crate::auth::Role;
use crate::error::ApiErrorBody;
use crate::models::{
    AdminOverview, AdminStats, AuthResponse, AuthorSummary, CategoryCount, Comment, CommentInput, CommentView,
    Dashboard, DashboardStats, Home, LoginInput, Post, PostInput, PostPage, PostStatus, PostView, RegisterInput,
    ListingSort, RoleInput, UserProfile,
};
use crate::routes::{LikeResponse, MessageResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_blogs,
        crate::routes::create_blog,
        crate::routes::get_blog,
        crate::routes::update_blog,
        crate::routes::delete_blog,
        crate::routes::list_comments,
        crate::routes::add_comment,
        crate::routes::toggle_like,
        crate::routes::search_posts,
        crate::routes::view_post,
        crate::routes::related_posts,
        crate::routes::categories,
        crate::routes::home,
        crate::routes::dashboard,
        crate::routes::admin_stats,
        crate::routes::set_role,
        crate::routes::register,
        crate::routes::login,
        crate::routes::auth_me,
    ),
    components(schemas(
        Post, PostInput, PostStatus, PostView, PostPage, ListingSort, AuthorSummary, CategoryCount,
        Comment, CommentInput, CommentView, LikeResponse, MessageResponse, ApiErrorBody,
        Home, Dashboard, DashboardStats, AdminOverview, AdminStats,
        UserProfile, Role, RoleInput, RegisterInput, LoginInput, AuthResponse,
    )),
    tags(
        (name = "blogs", description = "Post management"),
        (name = "posts", description = "Public reading and search"),
        (name = "comments", description = "Comments and likes"),
        (name = "users", description = "Author dashboard"),
        (name = "admin", description = "Administration"),
        (name = "auth", description = "Accounts and tokens"),
    )
)]
pub struct ApiDoc;
