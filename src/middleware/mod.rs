pub mod auth;

pub use auth::tenant_auth_middleware;
