#![cfg(feature = "inmem-store")]

use actix_web::{test, web, App};
use scribe::auth::Role;
use scribe::models::NewUser;
use scribe::repo::inmem::InMemRepo;
use scribe::repo::UserRepo;
use scribe::{config, AppConfig, AppState, SecurityHeaders};
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

struct Fixture {
    state: AppState,
    alice: String,
    bob: String,
    admin: String,
}

/// Three accounts stored directly in the repository with tokens issued for them.
async fn fixture() -> Fixture {
    let cfg = AppConfig::from_lookup(|k: &str| (k == "JWT_SECRET").then(|| SECRET.to_string())).unwrap();
    let repo = InMemRepo::new();
    let mut tokens = Vec::new();
    for (name, role) in [("Alice", Role::User), ("Bob", Role::User), ("Root", Role::Admin)] {
        let user = repo
            .insert_user(NewUser {
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: None,
                role,
                image: format!("https://img.example.com/{name}.png"),
                bio: String::new(),
            })
            .await
            .unwrap();
        tokens.push(user);
    }
    let state = AppState::new(Arc::new(repo), &cfg);
    let token = |i: usize| state.jwt.issue(tokens[i].id, &tokens[i].name, tokens[i].role).unwrap();
    Fixture { alice: token(0), bob: token(1), admin: token(2), state }
}

fn auth(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

fn blog(title: &str, status: &str) -> Value {
    json!({
        "title": title,
        "content": "<p>Ownership and borrowing in practice</p>",
        "excerpt": "Notes on the borrow checker",
        "category": "Rust",
        "tags": ["rust", "memory"],
        "status": status,
    })
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(SecurityHeaders::default())
                .app_data(web::Data::new($state.clone()))
                .configure(config),
        )
        .await
    };
}

macro_rules! send {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status().as_u16();
        let body = test::read_body(resp).await;
        let value: Value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
        (status, value)
    }};
}

#[actix_web::test]
async fn post_lifecycle_over_http() {
    let f = fixture().await;
    let app = app!(f.state);

    let (status, body) = send!(app, test::TestRequest::post().uri("/api/blogs").set_json(blog("Hello", "draft")));
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Unauthorized");

    let (status, body) = send!(
        app,
        test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.alice)).set_json(json!({"title": "Only"}))
    );
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Title, content, excerpt, and category are required");

    let (status, created) = send!(
        app,
        test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.alice)).set_json(blog("Borrowing 101", "published"))
    );
    assert_eq!(status, 201);
    assert_eq!(created["slug"], "borrowing-101");
    assert_eq!(created["readTime"], 1);
    assert!(created["publishedAt"].is_string());
    let id = created["id"].as_i64().unwrap();

    let (status, body) = send!(
        app,
        test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.bob)).set_json(blog("borrowing  101!", "draft"))
    );
    assert_eq!(status, 400);
    assert_eq!(body["message"], "A blog with this title already exists");

    let (status, view) = send!(app, test::TestRequest::get().uri(&format!("/api/blogs/{id}")));
    assert_eq!(status, 200);
    assert_eq!(view["author"]["name"], "Alice");
    assert_eq!(view["author"]["email"], "alice@example.com");
    assert!(view["coverImage"].as_str().unwrap().starts_with("https://"));

    let (status, _) = send!(
        app,
        test::TestRequest::put()
            .uri(&format!("/api/blogs/{id}"))
            .insert_header(auth(&f.bob))
            .set_json(blog("Hijacked", "published"))
    );
    assert_eq!(status, 403);

    let (status, updated) = send!(
        app,
        test::TestRequest::put()
            .uri(&format!("/api/blogs/{id}"))
            .insert_header(auth(&f.alice))
            .set_json(blog("Borrowing 102", "published"))
    );
    assert_eq!(status, 200);
    assert_eq!(updated["slug"], "borrowing-102");

    let (status, _) = send!(app, test::TestRequest::get().uri("/api/posts/borrowing-101"));
    assert_eq!(status, 404);
    for expected in 1..=3 {
        let (status, post) = send!(app, test::TestRequest::get().uri("/api/posts/borrowing-102"));
        assert_eq!(status, 200);
        assert_eq!(post["views"], expected);
    }

    let (status, _) = send!(app, test::TestRequest::delete().uri(&format!("/api/blogs/{id}")));
    assert_eq!(status, 401);
    let (status, body) = send!(app, test::TestRequest::delete().uri(&format!("/api/blogs/{id}")).insert_header(auth(&f.alice)));
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Blog post deleted successfully");

    let (status, body) = send!(app, test::TestRequest::get().uri(&format!("/api/blogs/{id}")));
    assert_eq!(status, 404);
    assert_eq!(body["message"], "Blog post not found");
    let (status, _) = send!(app, test::TestRequest::get().uri("/api/posts/borrowing-102"));
    assert_eq!(status, 404);
}

#[actix_web::test]
async fn drafts_are_private() {
    let f = fixture().await;
    let app = app!(f.state);
    let (_, draft) = send!(
        app,
        test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.alice)).set_json(blog("Work in progress", "draft"))
    );
    let id = draft["id"].as_i64().unwrap();
    let author_id = draft["authorId"].as_i64().unwrap();

    let (status, _) = send!(app, test::TestRequest::get().uri(&format!("/api/blogs/{id}")));
    assert_eq!(status, 404);
    let (status, _) = send!(app, test::TestRequest::get().uri(&format!("/api/blogs/{id}")).insert_header(auth(&f.bob)));
    assert_eq!(status, 404);
    let (status, _) = send!(app, test::TestRequest::get().uri(&format!("/api/blogs/{id}")).insert_header(auth(&f.alice)));
    assert_eq!(status, 200);

    let (_, page) = send!(app, test::TestRequest::get().uri("/api/blogs"));
    assert_eq!(page["total"], 0);
    let (_, page) = send!(
        app,
        test::TestRequest::get().uri(&format!("/api/blogs?author={author_id}")).insert_header(auth(&f.alice))
    );
    assert_eq!(page["total"], 1);
    let (_, page) = send!(app, test::TestRequest::get().uri("/api/blogs").insert_header(auth(&f.admin)));
    assert_eq!(page["total"], 1);
    let (status, _) = send!(app, test::TestRequest::get().uri("/api/blogs?status=draft"));
    assert_eq!(status, 401);
}

#[actix_web::test]
async fn comments_and_likes_over_http() {
    let f = fixture().await;
    let app = app!(f.state);
    let (_, a) = send!(
        app,
        test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.alice)).set_json(blog("Post A", "published"))
    );
    let (_, b) = send!(
        app,
        test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.alice)).set_json(blog("Post B", "published"))
    );
    let (a, b) = (a["id"].as_i64().unwrap(), b["id"].as_i64().unwrap());

    let (status, _) = send!(
        app,
        test::TestRequest::post().uri(&format!("/api/blogs/{a}/comments")).set_json(json!({"content": "hi"}))
    );
    assert_eq!(status, 401);
    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/blogs/{a}/comments"))
            .insert_header(auth(&f.bob))
            .set_json(json!({"content": "  "}))
    );
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Comment content is required");

    let (status, top) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/blogs/{a}/comments"))
            .insert_header(auth(&f.bob))
            .set_json(json!({"content": "Great read"}))
    );
    assert_eq!(status, 201);
    assert_eq!(top["author"]["name"], "Bob");
    assert_eq!(top["author"]["image"], "https://img.example.com/Bob.png");
    let top_id = top["id"].as_i64().unwrap();

    let (status, _) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/blogs/{b}/comments"))
            .insert_header(auth(&f.alice))
            .set_json(json!({"content": "misplaced", "parentComment": top_id}))
    );
    assert_eq!(status, 400);

    let (status, reply) = send!(
        app,
        test::TestRequest::post()
            .uri(&format!("/api/blogs/{a}/comments"))
            .insert_header(auth(&f.alice))
            .set_json(json!({"content": "Thanks!", "parentComment": top_id}))
    );
    assert_eq!(status, 201);
    assert_eq!(reply["parentComment"], top_id);

    let (status, list) = send!(app, test::TestRequest::get().uri(&format!("/api/blogs/{a}/comments")));
    assert_eq!(status, 200);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["content"], "Thanks!");
    assert_eq!(list[0]["author"]["name"], "Alice");
    assert_eq!(list[1]["replies"], json!([reply["id"]]));

    let like = || test::TestRequest::post().uri(&format!("/api/comments/{top_id}/like")).insert_header(auth(&f.alice));
    let (status, body) = send!(app, like());
    assert_eq!(status, 200);
    assert_eq!(body, json!({"success": true, "liked": true, "likes": 1}));
    let (_, body) = send!(app, like());
    assert_eq!(body, json!({"success": true, "liked": false, "likes": 0}));

    let (status, body) = send!(app, test::TestRequest::post().uri("/api/comments/9999/like").insert_header(auth(&f.alice)));
    assert_eq!(status, 404);
    assert_eq!(body["message"], "Comment not found");
}

#[actix_web::test]
async fn search_sort_and_landing_pages() {
    let f = fixture().await;
    let app = app!(f.state);
    for (title, category, featured) in
        [("Tokio Internals", "Rust", true), ("Serde Tricks", "Rust", false), ("Sourdough Basics", "Baking", false)]
    {
        let mut body = blog(title, "published");
        body["category"] = json!(category);
        body["isFeatured"] = json!(featured);
        let (status, _) =
            send!(app, test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.alice)).set_json(body));
        assert_eq!(status, 201);
    }
    send!(app, test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.alice)).set_json(blog("Unfinished", "draft")));
    for _ in 0..2 {
        send!(app, test::TestRequest::get().uri("/api/posts/serde-tricks"));
    }

    let (status, page) = send!(app, test::TestRequest::get().uri("/api/posts?sort=popular&limit=2"));
    assert_eq!(status, 200);
    assert_eq!(page["total"], 3);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["blogs"][0]["slug"], "serde-tricks");
    assert_eq!(page["blogs"].as_array().unwrap().len(), 2);

    let (_, page) = send!(app, test::TestRequest::get().uri("/api/posts?search=tokio"));
    assert_eq!(page["total"], 1);
    assert_eq!(page["blogs"][0]["author"]["image"], "https://img.example.com/Alice.png");

    let (_, page) = send!(app, test::TestRequest::get().uri("/api/posts?category=Baking"));
    assert_eq!(page["total"], 1);

    let (status, _) = send!(app, test::TestRequest::get().uri("/api/posts?sort=sideways"));
    assert_eq!(status, 400);
    // creation order is reserved for management listings
    let (status, _) = send!(app, test::TestRequest::get().uri("/api/posts?sort=created"));
    assert_eq!(status, 400);

    let (_, related) = send!(app, test::TestRequest::get().uri("/api/posts/tokio-internals/related"));
    let related = related.as_array().unwrap();
    assert_eq!(related.len(), 2);
    assert!(related.iter().all(|p| p["slug"] != "tokio-internals"));

    let (_, cats) = send!(app, test::TestRequest::get().uri("/api/categories?limit=1"));
    assert_eq!(cats, json!([{"category": "Rust", "count": 2}]));

    let (status, home) = send!(app, test::TestRequest::get().uri("/api/home"));
    assert_eq!(status, 200);
    assert_eq!(home["featured"].as_array().unwrap().len(), 1);
    assert_eq!(home["latest"].as_array().unwrap().len(), 3);
    assert_eq!(home["categories"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn dashboard_and_admin_stats() {
    let f = fixture().await;
    let app = app!(f.state);
    send!(app, test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.alice)).set_json(blog("Mine", "published")));
    send!(app, test::TestRequest::post().uri("/api/blogs").insert_header(auth(&f.alice)).set_json(blog("Later", "draft")));

    let (status, _) = send!(app, test::TestRequest::get().uri("/api/dashboard"));
    assert_eq!(status, 401);
    let (status, dash) = send!(app, test::TestRequest::get().uri("/api/dashboard").insert_header(auth(&f.alice)));
    assert_eq!(status, 200);
    assert_eq!(dash["stats"], json!({"totalPosts": 2, "published": 1, "drafts": 1, "totalViews": 0}));

    let (status, _) = send!(app, test::TestRequest::get().uri("/api/admin/stats").insert_header(auth(&f.bob)));
    assert_eq!(status, 403);
    let (status, stats) = send!(app, test::TestRequest::get().uri("/api/admin/stats").insert_header(auth(&f.admin)));
    assert_eq!(status, 200);
    assert_eq!(stats["stats"]["totalUsers"], 3);
    assert_eq!(stats["stats"]["totalPosts"], 2);
    assert!(stats["users"][0].get("passwordHash").is_none());
}

#[actix_web::test]
async fn role_changes_apply_to_tokens_already_issued() {
    let f = fixture().await;
    let app = app!(f.state);
    let (_, me) = send!(app, test::TestRequest::get().uri("/api/auth/me").insert_header(auth(&f.alice)));
    let alice_id = me["id"].as_i64().unwrap();
    let set_role = |role: &str| {
        test::TestRequest::put()
            .uri(&format!("/api/admin/users/{alice_id}/role"))
            .insert_header(auth(&f.admin))
            .set_json(json!({ "role": role }))
    };
    let stats = || test::TestRequest::get().uri("/api/admin/stats").insert_header(auth(&f.alice));

    let (status, _) = send!(app, stats());
    assert_eq!(status, 403);

    let (status, _) = send!(app, set_role("admin"));
    assert_eq!(status, 200);
    let (status, _) = send!(app, stats());
    assert_eq!(status, 200, "promotion honoured without a new login");

    let (status, _) = send!(app, set_role("user"));
    assert_eq!(status, 200);
    let (status, _) = send!(app, stats());
    assert_eq!(status, 403, "demoted caller keeps no admin access");
}

#[actix_web::test]
async fn malformed_requests_get_json_errors() {
    let f = fixture().await;
    let app = app!(f.state);

    let (status, body) = send!(
        app,
        test::TestRequest::post()
            .uri("/api/blogs")
            .insert_header(auth(&f.alice))
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
    );
    assert_eq!(status, 400);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));

    let (status, body) = send!(app, test::TestRequest::get().uri("/api/blogs/not-a-number"));
    assert_eq!(status, 404);
    assert!(body["message"].is_string());
}
