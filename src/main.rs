use axum::{routing::get, routing::post, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use shopdesk_api::database::bootstrap;
use shopdesk_api::database::registry::PoolRegistry;
use shopdesk_api::handlers;
use shopdesk_api::middleware::tenant_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = shopdesk_api::config::config();
    tracing::info!("Starting Shopdesk API in {:?} mode", config.environment);

    // Master tables must exist before onboarding or login can be served.
    // A missing database only degrades /health; pools are created lazily.
    match PoolRegistry::instance().default_pool().await {
        Ok(handle) => {
            if let Err(e) = bootstrap::ensure_master_schema(&handle.pool).await {
                tracing::warn!("Master schema bootstrap failed: {}", e);
            }
        }
        Err(e) => tracing::warn!("Master database not reachable at startup: {}", e),
    }

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("SHOPDESK_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    println!("Shopdesk API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    use axum::routing::delete;

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/onboard", post(handlers::onboard::onboard_post))
        .route("/auth/login", post(handlers::auth::login_post))
        // Tenant-scoped API
        .route("/api/auth/whoami", get(handlers::auth::whoami_get))
        .route("/api/auth/logout", post(handlers::auth::logout_post))
        .route("/api/auth/password", post(handlers::auth::password_post))
        .route("/api/business", get(handlers::business::business_get))
        .route("/api/staff", post(handlers::staff::staff_post))
        .route("/api/staff/:user_name", delete(handlers::staff::staff_delete))
        // Tenant resolution runs for every route; handlers decide whether
        // anonymous access is acceptable
        .layer(axum::middleware::from_fn(tenant_auth_middleware))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Shopdesk API",
            "version": version,
            "description": "Multi-tenant business backend with per-tenant database isolation",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "onboard": "/onboard (public - business provisioning)",
                "login": "/auth/login (public - token acquisition)",
                "whoami": "/api/auth/whoami (protected)",
                "logout": "/api/auth/logout (protected)",
                "password": "/api/auth/password (protected)",
                "business": "/api/business (protected)",
                "staff": "/api/staff[/:user_name] (protected, admin)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match PoolRegistry::instance().health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
