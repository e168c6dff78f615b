use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use scribe::openapi::ApiDoc;
use scribe::repo::Repo;
use scribe::{config, AppConfig, AppState, SecurityHeaders};

#[cfg(not(any(feature = "inmem-store", feature = "postgres-store")))]
compile_error!("enable at least one of the `inmem-store` or `postgres-store` features");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env().context("invalid configuration")?;
    info!(host = %cfg.host, port = cfg.port, republish = ?cfg.republish, "starting scribe");

    #[cfg(feature = "postgres-store")]
    let pg = {
        use sqlx::postgres::PgPoolOptions;
        let db_url = cfg.database_url.as_deref().context("DATABASE_URL must be set for postgres-store")?;
        let pool = PgPoolOptions::new()
            .max_connections(cfg.db_max_connections)
            .connect_lazy(db_url)
            .context("failed to create Postgres pool")?;
        let repo = scribe::repo::pg::PgRepo::new(pool);
        repo.migrate().await.context("failed to run migrations")?;
        info!("Using Postgres repository backend");
        repo
    };
    #[cfg(feature = "postgres-store")]
    let repo: Arc<dyn Repo> = Arc::new(pg.clone());

    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let repo: Arc<dyn Repo> = match &cfg.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Using in-memory repository with snapshot");
            Arc::new(scribe::repo::inmem::InMemRepo::open(dir))
        }
        None => {
            info!("Using ephemeral in-memory repository");
            Arc::new(scribe::repo::inmem::InMemRepo::new())
        }
    };

    let state = web::Data::new(AppState::new(repo, &cfg));
    let openapi = ApiDoc::openapi();
    let security = SecurityHeaders::from_config(&cfg);
    let frontend_url = cfg.frontend_url.clone();

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            // local dev frontends
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .max_age(3600);
        if let Some(front) = &frontend_url {
            cors = cors.allowed_origin(front);
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(security)
            .wrap(cors)
            .app_data(state.clone())
            .configure(config)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.host.as_str(), cfg.port))
    .with_context(|| format!("failed to bind {}:{}", cfg.host, cfg.port))?;

    info!("Listening on http://{}:{}", cfg.host, cfg.port);
    server.run().await.context("server error")?;

    #[cfg(feature = "postgres-store")]
    pg.close().await;
    info!("shut down");
    Ok(())
}
