use sqlx::PgPool;
use tracing::info;

/// Master-database tables backing the tenant directory and the credential
/// store. Idempotent; run once at startup before provisioning or login can
/// be served.
const MASTER_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS businesses (
        id BIGSERIAL PRIMARY KEY,
        business_name VARCHAR(100) NOT NULL,
        owner_name VARCHAR(100),
        db_name VARCHAR(120) NOT NULL UNIQUE,
        phone_no VARCHAR(20),
        email VARCHAR(100),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255),
        user_name VARCHAR(255) NOT NULL UNIQUE,
        password VARCHAR(255) NOT NULL,
        role VARCHAR(32) NOT NULL,
        db_name VARCHAR(120),
        token TEXT
    )",
];

pub async fn ensure_master_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in MASTER_SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Master schema is in place");
    Ok(())
}
