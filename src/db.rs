use crate::error::AppError;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

const MIGRATIONS: &[&str] = &[include_str!("../migrations/0001_visibility_schema.sql")];

pub async fn init_pool(database_url: &str) -> Result<Pool, AppError> {
    let pg_config = database_url
        .parse::<tokio_postgres::Config>()
        .map_err(|e| AppError::Config(format!("DATABASE_URL: {e}")))?;

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(manager)
        .max_size(16)
        .build()
        .map_err(|e| AppError::StartServer(format!("build pool: {e}")))?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;
    for migration in MIGRATIONS {
        client
            .batch_execute(migration)
            .await
            .map_err(|e| AppError::StartServer(format!("migration: {e}")))?;
    }
    Ok(())
}
