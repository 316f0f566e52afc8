use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::str::FromStr;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(database_url)?
        .application_name("mealscan-backend")
        .statement_cache_capacity(500);

    PgPoolOptions::new()
        .max_connections(32)
        .min_connections(8)
        .acquire_timeout(std::time::Duration::from_secs(2))
        .idle_timeout(std::time::Duration::from_secs(10))
        .connect_with(options)
        .await
}
