use std::fmt;

use serde::Deserialize;
use sqlx::{Connection, PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::credentials::{self, NewCredential, Role};
use crate::database::registry::PoolRegistry;
use crate::tenant::store::{self, NewBusiness};

/// Ordered steps of the onboarding workflow. Steps run strictly one after
/// another; a failure is reported with the step it happened in, because the
/// workflow spans two physical databases and cannot be rolled back as one
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    UniquenessCheck,
    CreateDatabase,
    InitializeSchema,
    SeedBusinessRow,
    RegisterTenant,
    CreateAdminCredential,
}

impl ProvisionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionStep::UniquenessCheck => "uniqueness check",
            ProvisionStep::CreateDatabase => "database creation",
            ProvisionStep::InitializeSchema => "schema initialization",
            ProvisionStep::SeedBusinessRow => "business row seeding",
            ProvisionStep::RegisterTenant => "master registration",
            ProvisionStep::CreateAdminCredential => "admin credential creation",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("A business with tenant key {0} already exists")]
    DuplicateTenant(String),

    #[error("Invalid onboarding input: {0}")]
    InvalidInput(String),

    #[error("Provisioning failed during {step} for tenant {tenant_key}: {source}")]
    Step {
        step: ProvisionStep,
        tenant_key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn at_step<E>(step: ProvisionStep, tenant_key: &str, source: E) -> ProvisionError
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    ProvisionError::Step {
        step,
        tenant_key: tenant_key.to_string(),
        source: source.into(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingRequest {
    pub business_name: String,
    pub owner_name: String,
    pub admin_user_name: String,
    pub admin_password: String,
    pub phone_no: String,
    pub email: String,
}

/// Tables every tenant database starts with. `order_item` cascades on order
/// deletion; everything else stands alone.
const TENANT_SCHEMA: &[&str] = &[
    "CREATE TABLE business (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        gst_number VARCHAR(20) UNIQUE,
        fssai_no VARCHAR(20) UNIQUE,
        address VARCHAR(200),
        gst_type INTEGER,
        licence_no VARCHAR(200) UNIQUE,
        phone_no VARCHAR(20),
        email VARCHAR(100),
        table_count INTEGER,
        logo_url VARCHAR(200)
    )",
    "CREATE TABLE products (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        description VARCHAR(200),
        category VARCHAR(100),
        sub_category VARCHAR(100),
        price INTEGER
    )",
    "CREATE TABLE orders (
        id BIGSERIAL PRIMARY KEY,
        is_completed BOOLEAN,
        table_number BIGINT
    )",
    "CREATE TABLE order_item (
        id SERIAL PRIMARY KEY,
        item_name VARCHAR(255),
        price INTEGER NOT NULL,
        quantity INTEGER NOT NULL,
        order_id BIGINT,
        product_id BIGINT,
        CONSTRAINT fk_order FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE,
        CONSTRAINT fk_product FOREIGN KEY (product_id) REFERENCES products(id)
    )",
    "CREATE TABLE invoice (
        id SERIAL PRIMARY KEY,
        customer_name VARCHAR(255),
        customer_phone_no VARCHAR(20),
        invoice_number BIGINT,
        item_description VARCHAR(2000),
        payment_status VARCHAR(255),
        quantity INTEGER NOT NULL,
        sub_total DOUBLE PRECISION NOT NULL DEFAULT 0,
        sgst DOUBLE PRECISION NOT NULL DEFAULT 0,
        cgst DOUBLE PRECISION NOT NULL DEFAULT 0,
        grand_total DOUBLE PRECISION NOT NULL DEFAULT 0,
        total_amount DOUBLE PRECISION NOT NULL,
        gst_value DOUBLE PRECISION,
        business_id BIGINT,
        invoice_date VARCHAR(64),
        invoice_time VARCHAR(64),
        table_number BIGINT,
        business_gst_type BIGINT,
        order_id BIGINT
    )",
    "CREATE TABLE staff (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255),
        password VARCHAR(255) NOT NULL,
        role VARCHAR(255),
        user_name VARCHAR(255) NOT NULL UNIQUE
    )",
    "CREATE TABLE inventory (
        id SERIAL PRIMARY KEY,
        item_name VARCHAR(255),
        quantity INTEGER,
        unit VARCHAR(255),
        price BIGINT,
        purchase_date VARCHAR(64),
        purchase_time VARCHAR(64)
    )",
];

/// Onboard a new business: allocate its tenant key, create and initialize
/// its physical database, then register it and its admin credential in the
/// master database. Returns the new tenant key.
///
/// Steps 2-6 touch two databases and are not atomic. A failure mid-way
/// leaves partial state behind (an orphaned database, or a registered
/// tenant without a credential); the returned error names the failed step
/// and the attempted key so an operator can clean up, e.g. via
/// [`drop_orphaned_database`].
pub async fn provision_business(req: &OnboardingRequest) -> Result<String, ProvisionError> {
    validate(req)?;

    let registry = PoolRegistry::instance();
    let tenant_key = derive_tenant_key(&req.business_name);

    // 1. Uniqueness against the master registry. The random suffix makes a
    //    collision unlikely, not impossible; it must surface, never
    //    overwrite.
    let master = registry
        .default_pool()
        .await
        .map_err(|e| at_step(ProvisionStep::UniquenessCheck, &tenant_key, e))?;
    if store::exists(&master.pool, &tenant_key)
        .await
        .map_err(|e| at_step(ProvisionStep::UniquenessCheck, &tenant_key, e))?
    {
        return Err(ProvisionError::DuplicateTenant(tenant_key));
    }

    // 2. Physical database, via the administrative connection
    create_database(&master.pool, &tenant_key).await?;

    // 3 + 4. Schema and seed row over a one-off connection to the new
    //        database; the routing registry only sees this tenant once a
    //        request actually arrives for it.
    let mut conn = connect_to_tenant(&tenant_key).await?;
    initialize_schema(&mut conn, &tenant_key).await?;
    seed_business_row(&mut conn, req, &tenant_key).await?;
    let _ = conn.close().await;

    // 5. Master registration
    store::register(
        &master.pool,
        NewBusiness {
            business_name: &req.business_name,
            owner_name: &req.owner_name,
            tenant_key: &tenant_key,
            phone_no: &req.phone_no,
            email: &req.email,
        },
    )
    .await
    .map_err(|e| at_step(ProvisionStep::RegisterTenant, &tenant_key, e))?;

    // 6. Admin credential
    let password_hash = credentials::hash_password(&req.admin_password)
        .map_err(|e| at_step(ProvisionStep::CreateAdminCredential, &tenant_key, e))?;
    credentials::create(
        &master.pool,
        NewCredential {
            name: &req.owner_name,
            user_name: &req.admin_user_name,
            password_hash: &password_hash,
            role: Role::Admin,
            tenant_key: &tenant_key,
        },
    )
    .await
    .map_err(|e| at_step(ProvisionStep::CreateAdminCredential, &tenant_key, e))?;

    info!("Provisioned tenant: {}", tenant_key);
    Ok(tenant_key)
}

/// Tenant key: normalized slug of the business name plus a short random
/// suffix. The key doubles as the physical database name.
pub fn derive_tenant_key(business_name: &str) -> String {
    let slug: String = business_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("business_{}_{}", slug, &suffix[..4])
}

fn validate(req: &OnboardingRequest) -> Result<(), ProvisionError> {
    let name = req.business_name.trim();
    if name.len() < 2 {
        return Err(ProvisionError::InvalidInput(
            "Business name must be at least 2 characters".to_string(),
        ));
    }
    if name.len() > 100 {
        return Err(ProvisionError::InvalidInput(
            "Business name must be less than 100 characters".to_string(),
        ));
    }
    if req.admin_user_name.trim().is_empty() {
        return Err(ProvisionError::InvalidInput(
            "Admin username is required".to_string(),
        ));
    }
    if req.admin_password.is_empty() {
        return Err(ProvisionError::InvalidInput(
            "Admin password is required".to_string(),
        ));
    }
    Ok(())
}

async fn create_database(pool: &PgPool, tenant_key: &str) -> Result<(), ProvisionError> {
    let statement = format!(
        "CREATE DATABASE {}",
        PoolRegistry::quote_identifier(tenant_key)
    );
    sqlx::query(&statement).execute(pool).await.map_err(|e| {
        if is_duplicate_database(&e) {
            // Two provisioning runs derived the same key; first writer wins
            ProvisionError::DuplicateTenant(tenant_key.to_string())
        } else {
            at_step(ProvisionStep::CreateDatabase, tenant_key, e)
        }
    })?;

    info!("Created database: {}", tenant_key);
    Ok(())
}

async fn connect_to_tenant(tenant_key: &str) -> Result<PgConnection, ProvisionError> {
    let url = PoolRegistry::tenant_connection_string(tenant_key)
        .map_err(|e| at_step(ProvisionStep::InitializeSchema, tenant_key, e))?;
    PgConnection::connect(&url)
        .await
        .map_err(|e| at_step(ProvisionStep::InitializeSchema, tenant_key, e))
}

async fn initialize_schema(
    conn: &mut PgConnection,
    tenant_key: &str,
) -> Result<(), ProvisionError> {
    for statement in TENANT_SCHEMA {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(|e| at_step(ProvisionStep::InitializeSchema, tenant_key, e))?;
    }
    info!("Initialized schema in database: {}", tenant_key);
    Ok(())
}

/// The fixed-id profile row; tenant-scoped reads of "the business" always
/// address id 1 instead of looking up by name.
async fn seed_business_row(
    conn: &mut PgConnection,
    req: &OnboardingRequest,
    tenant_key: &str,
) -> Result<(), ProvisionError> {
    sqlx::query(
        "INSERT INTO business \
            (id, name, phone_no, email, gst_number, fssai_no, address, gst_type, licence_no, table_count, logo_url) \
         VALUES (1, $1, $2, $3, '', '', '', 0, '', 0, '') \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(&req.business_name)
    .bind(&req.phone_no)
    .bind(&req.email)
    .execute(&mut *conn)
    .await
    .map_err(|e| at_step(ProvisionStep::SeedBusinessRow, tenant_key, e))?;

    info!("Seeded business row in database: {}", tenant_key);
    Ok(())
}

fn is_duplicate_database(e: &sqlx::Error) -> bool {
    // PostgreSQL duplicate_database
    e.as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code.as_ref() == "42P04")
}

/// Manual compensation for a provisioning run that failed after step 2:
/// drops the physical database left behind. Refuses to touch a database
/// whose key is registered in the master directory.
pub async fn drop_orphaned_database(tenant_key: &str) -> anyhow::Result<()> {
    if !PoolRegistry::is_valid_tenant_key(tenant_key) {
        anyhow::bail!("not a tenant database name: {}", tenant_key);
    }

    let master = PoolRegistry::instance().default_pool().await?;
    if store::exists(&master.pool, tenant_key).await? {
        anyhow::bail!(
            "tenant {} is registered; refusing to drop its database",
            tenant_key
        );
    }

    let statement = format!(
        "DROP DATABASE IF EXISTS {}",
        PoolRegistry::quote_identifier(tenant_key)
    );
    sqlx::query(&statement).execute(&master.pool).await?;

    warn!("Dropped orphaned database: {}", tenant_key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_keys_are_valid_database_names() {
        let key = derive_tenant_key("Cafe Luna");
        assert!(key.starts_with("business_cafe_luna_"));
        assert!(PoolRegistry::is_valid_tenant_key(&key));
    }

    #[test]
    fn derived_keys_normalize_punctuation() {
        let key = derive_tenant_key("  Joe's Diner & Grill  ");
        assert!(key.starts_with("business_joe_s_diner___grill_"));
        assert!(PoolRegistry::is_valid_tenant_key(&key));
    }

    #[test]
    fn same_name_yields_distinct_keys() {
        let a = derive_tenant_key("Cafe Luna");
        let b = derive_tenant_key("Cafe Luna");
        assert_ne!(a, b);
    }

    #[test]
    fn step_names_are_descriptive() {
        let err = at_step(
            ProvisionStep::InitializeSchema,
            "business_cafe_luna_ab12",
            std::io::Error::new(std::io::ErrorKind::Other, "connection reset"),
        );
        let message = err.to_string();
        assert!(message.contains("schema initialization"));
        assert!(message.contains("business_cafe_luna_ab12"));
    }

    #[test]
    fn rejects_unusable_input() {
        let mut req = OnboardingRequest {
            business_name: "Cafe Luna".to_string(),
            owner_name: "Luna".to_string(),
            admin_user_name: "luna".to_string(),
            admin_password: "secret".to_string(),
            phone_no: "5550100".to_string(),
            email: "luna@example.com".to_string(),
        };
        assert!(validate(&req).is_ok());

        req.business_name = "C".to_string();
        assert!(matches!(
            validate(&req),
            Err(ProvisionError::InvalidInput(_))
        ));

        req.business_name = "Cafe Luna".to_string();
        req.admin_password = String::new();
        assert!(matches!(
            validate(&req),
            Err(ProvisionError::InvalidInput(_))
        ));
    }
}
