use axum::{extract::Extension, response::Json};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::FromRow;

use crate::auth::service::AuthenticatedUser;
use crate::database::router::with_tenant_connection;
use crate::error::ApiError;

/// The seeded profile row of the tenant database. Always row id 1.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BusinessProfile {
    pub id: i32,
    pub name: String,
    pub gst_number: Option<String>,
    pub address: Option<String>,
    pub phone_no: Option<String>,
    pub email: Option<String>,
    pub table_count: Option<i32>,
    pub logo_url: Option<String>,
}

/// GET /api/business - the current tenant's profile, read through the
/// routing layer from whatever pool the request context resolves to.
pub async fn business_get(
    user: Option<Extension<AuthenticatedUser>>,
) -> Result<Json<Value>, ApiError> {
    let Extension(user) = user.ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    if user.tenant_key.is_none() {
        return Err(ApiError::forbidden(
            "No business is associated with this account",
        ));
    }

    let profile = with_tenant_connection(|conn| {
        Box::pin(async move {
            sqlx::query_as::<_, BusinessProfile>(
                "SELECT id, name, gst_number, address, phone_no, email, table_count, logo_url \
                 FROM business WHERE id = 1",
            )
            .fetch_one(&mut *conn)
            .await
        })
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}
