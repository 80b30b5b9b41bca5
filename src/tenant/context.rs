use std::future::Future;

tokio::task_local! {
    static CURRENT_TENANT: Option<String>;
}

/// Request-scoped carrier of the current tenant key.
///
/// The key lives in a task-local slot that exists only for the duration of
/// the future passed to [`TenantContext::scope`]. Leaving the scope (normal
/// return, error, or panic unwind) drops the slot, so a worker picking up an
/// unrelated request can never observe a stale key.
pub struct TenantContext;

impl TenantContext {
    /// Tenant key of the request currently executing, if any. Outside of a
    /// scope, or inside a scope opened with `None`, this returns `None` and
    /// routing falls back to the default pool.
    pub fn current() -> Option<String> {
        CURRENT_TENANT.try_with(|t| t.clone()).unwrap_or(None)
    }

    /// Run `f` with the given tenant key set as the current context.
    pub async fn scope<F>(tenant_key: Option<String>, f: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT.scope(tenant_key, f).await
    }
}
