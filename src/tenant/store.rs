use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Master-database row mapping a tenant key to the business it identifies.
/// Created exactly once by provisioning and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessIdentity {
    pub id: i64,
    pub business_name: String,
    pub owner_name: Option<String>,
    pub db_name: String,
    pub phone_no: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewBusiness<'a> {
    pub business_name: &'a str,
    pub owner_name: &'a str,
    pub tenant_key: &'a str,
    pub phone_no: &'a str,
    pub email: &'a str,
}

pub async fn exists(pool: &PgPool, tenant_key: &str) -> Result<bool, sqlx::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM businesses WHERE db_name = $1")
        .bind(tenant_key)
        .fetch_one(pool)
        .await?;
    Ok(count.0 > 0)
}

pub async fn register(
    pool: &PgPool,
    new: NewBusiness<'_>,
) -> Result<BusinessIdentity, sqlx::Error> {
    sqlx::query_as::<_, BusinessIdentity>(
        "INSERT INTO businesses (business_name, owner_name, db_name, phone_no, email) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, business_name, owner_name, db_name, phone_no, email, created_at",
    )
    .bind(new.business_name)
    .bind(new.owner_name)
    .bind(new.tenant_key)
    .bind(new.phone_no)
    .bind(new.email)
    .fetch_one(pool)
    .await
}
