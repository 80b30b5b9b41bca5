use futures::future::BoxFuture;
use sqlx::PgConnection;
use thiserror::Error;

use crate::database::registry::{PoolHandle, PoolRegistry, RegistryError};
use crate::tenant::context::TenantContext;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Resolve the pool serving the current request: the tenant's pool when a
/// tenant key is in scope, the default pool otherwise.
pub async fn current_pool() -> Result<PoolHandle, RegistryError> {
    let registry = PoolRegistry::instance();
    match TenantContext::current() {
        Some(key) => registry.get_or_create(&key).await,
        None => registry.default_pool().await,
    }
}

/// Run `op` on a connection checked out from the current request's pool.
///
/// The connection is returned to its pool when the checkout guard drops,
/// on success and on error alike. Checkout waits at most the configured
/// acquire timeout when the pool is saturated.
pub async fn with_tenant_connection<T, F>(op: F) -> Result<T, RoutingError>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>,
{
    let handle = current_pool().await?;
    let mut conn = handle.pool.acquire().await?;
    let result = op(&mut *conn).await?;
    Ok(result)
}
