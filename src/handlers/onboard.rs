use axum::response::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::tenant::provision::{self, OnboardingRequest};

/// POST /onboard - provision a brand-new business: physical database,
/// schema, seed row, master registration, and the first admin login.
/// Responds with the tenant key, or names the failed step.
pub async fn onboard_post(
    Json(req): Json<OnboardingRequest>,
) -> Result<Json<Value>, ApiError> {
    let tenant_key = provision::provision_business(&req).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "tenant_key": tenant_key,
            "admin_user_name": req.admin_user_name,
        }
    })))
}
