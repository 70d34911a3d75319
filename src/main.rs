//! yabe - yet another blog engine

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yabe::{
    config::Config,
    db::{
        self,
        repositories::{
            CommentRepository, SqlxCommentRepository, SqlxTagRepository, SqlxUserRepository,
        },
    },
    fixtures,
    models::format_cloud,
    services::{PostService, TagService, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yabe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting yabe...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let user_service = UserService::new(SqlxUserRepository::boxed(pool.clone()));
    let post_service = PostService::from_pool(pool.clone());
    let tag_service = TagService::new(SqlxTagRepository::boxed(pool.clone()));

    if config.fixtures.load_on_start {
        if user_service.count().await? > 0 {
            tracing::info!("Database already populated, skipping fixtures");
        } else {
            let summary = fixtures::load_models(&pool, &config.fixtures.path).await?;
            tracing::info!("Seeded {}", summary);
        }
    }

    let comments = SqlxCommentRepository::new(pool.clone());
    let (users, posts, comments) = (
        user_service.count().await?,
        post_service.count().await?,
        comments.count().await?,
    );
    tracing::info!("{} users, {} posts, {} comments", users, posts, comments);

    if let Some(front) = post_service.front_post().await? {
        tracing::info!("Front post: {}", serde_json::to_string(&front)?);
    }
    let cloud = tag_service.get_cloud().await?;
    tracing::info!("Tag cloud: {}", format_cloud(&cloud));

    pool.close().await;
    Ok(())
}
