use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, DatabaseConnection};
use settings::Database;

mod settings;

/// How often overdue active loans are swept to `DEFAULTED`.
const DEFAULT_SWEEP_EVERY: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "chamasmart={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let server = settings.server;
    let db = parse_database(&server.database).await?;

    let engine = engine::Engine::builder().database(db.clone()).build().await?;
    let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tasks.spawn(async move {
        if let Err(err) = server::run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    let sweeper = engine::Engine::builder().database(db).build().await?;
    tasks.spawn(async move {
        let mut interval = tokio::time::interval(DEFAULT_SWEEP_EVERY);
        loop {
            interval.tick().await;
            match sweeper.mark_overdue_defaulted_all(Utc::now()).await {
                Ok(0) => {}
                Ok(affected) => tracing::info!(affected, "overdue loans defaulted"),
                Err(err) => tracing::error!("default sweep failed: {err}"),
            }
        }
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let mut options = match config {
        // One connection, otherwise every pooled connection gets its own
        // empty in-memory database.
        Database::Memory => {
            let mut options = ConnectOptions::new("sqlite::memory:");
            options.max_connections(1);
            options
        }
        Database::Sqlite(path) => ConnectOptions::new(format!("sqlite:{path}?mode=rwc")),
    };
    options.sqlx_logging(false);

    tracing::info!("connecting to {config:?} database");
    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
