use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::sync::Arc;

use doublev_blog::application::{BlogServices, COMMENTS_RESOURCE, POSTS_RESOURCE};
use doublev_blog::data::{MemoryStorage, PostgresStorage, Storage};
use doublev_blog::infrastructure::{
    config::AppConfig,
    database::{create_pool, run_migrations},
    jwt::JwtService,
    logging::init_logging,
    url::UrlBuilder,
};
use doublev_blog::presentation::routes;

#[derive(Parser)]
#[command(name = "doublev-blog", version, about = "DoubleV blog admin and REST server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations and data patches, then serve HTTP
    Serve,
    /// Run migrations and data patches, then exit
    Setup,
    /// Print a signed admin bearer token
    IssueToken {
        #[arg(long)]
        admin: String,
        /// Resource tag to grant; repeatable. Defaults to every blog resource
        #[arg(long = "resource")]
        resources: Vec<String>,
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    init_logging();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::IssueToken {
            admin,
            resources,
            hours,
        } => issue_token(&config, &admin, resources, hours),
        Command::Setup => {
            install(&config).await?;
            tracing::info!("Setup finished ({} storage)", storage_kind(&config));
            Ok(())
        }
        Command::Serve => {
            let services = install(&config).await?;
            run_http_server(config, services).await
        }
    }
}

fn storage_kind(config: &AppConfig) -> &'static str {
    if config.database.is_some() {
        "postgres"
    } else {
        "in-memory"
    }
}

fn issue_token(
    config: &AppConfig,
    admin: &str,
    mut resources: Vec<String>,
    hours: i64,
) -> anyhow::Result<()> {
    if resources.is_empty() {
        resources = vec![POSTS_RESOURCE.to_string(), COMMENTS_RESOURCE.to_string()];
    }

    let jwt_service = JwtService::new(&config.jwt_secret)?;
    let token = jwt_service.generate_token(admin, resources, chrono::Duration::hours(hours))?;
    println!("{}", token);
    Ok(())
}

/// Opens storage, runs schema migrations and pending data patches.
async fn install(config: &AppConfig) -> anyhow::Result<BlogServices> {
    let storage: Arc<dyn Storage> = match &config.database {
        Some(database) => {
            tracing::info!("Connecting to database...");
            let pool = create_pool(database).await?;

            tracing::info!("Running database migrations...");
            run_migrations(&pool).await?;
            Arc::new(PostgresStorage::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using in-memory storage; data is lost on exit");
            Arc::new(MemoryStorage::new())
        }
    };

    let services = BlogServices::new(storage, UrlBuilder::new(&config.admin_url_prefix));

    let applied = services
        .patches()
        .apply_pending()
        .await
        .context("Failed to apply data patches")?;
    tracing::info!("Data patches applied: {}", applied.len());

    Ok(services)
}

/// Configure CORS for the HTTP server with allowed origins from .env
fn configure_cors(allowed_origins: &str) -> actix_cors::Cors {
    use actix_cors::Cors;
    use actix_web::http::header;

    let origins: Vec<&str> = allowed_origins.split(',').map(|s| s.trim()).collect();

    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
        ])
        .expose_headers(vec![header::LOCATION])
        .max_age(3600);

    // Добавляем каждый разрешенный домен
    for origin in origins {
        if !origin.is_empty() {
            cors = cors.allowed_origin(origin);
            tracing::debug!("Added allowed CORS origin: {}", origin);
        }
    }

    cors
}

async fn run_http_server(config: AppConfig, services: BlogServices) -> anyhow::Result<()> {
    use actix_web::{middleware::Logger, App, HttpServer};

    let jwt_service = Arc::new(JwtService::new(&config.jwt_secret)?);
    let addr = config.http_addr();
    let admin_prefix = config.admin_url_prefix.clone();
    let cors_allowed_origins = config.cors_allowed_origins.clone();

    tracing::info!("CORS allowed origins: {}", cors_allowed_origins);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(configure_cors(&cors_allowed_origins))
            .configure(|cfg| {
                routes::configure(cfg, services.clone(), jwt_service.clone(), &admin_prefix)
            })
    })
    .bind(&addr)?
    .run();

    tracing::info!("HTTP server running on {}", addr);

    server.await?;

    tracing::info!("Shutting down...");
    Ok(())
}
