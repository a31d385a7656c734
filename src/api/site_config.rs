use crate::{
    auth::auth::AuthUser,
    model::site_config::SiteConfig,
    store::{MySqlConfigStore, SharedSiteConfig},
};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct UpdateSiteConfigReq {
    #[schema(example = 40.416775)]
    pub latitude: f64,
    #[schema(example = -3.703790)]
    pub longitude: f64,
    #[schema(example = 500)]
    pub radius_m: u32,
}

/// Effective site configuration (stored row or static defaults)
#[utoipa::path(
    get,
    path = "/api/v1/site-config",
    responses(
        (status = 200, description = "Effective site configuration", body = SiteConfig),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "SiteConfig"
)]
pub async fn get_site_config(
    _auth: AuthUser,
    site: web::Data<SharedSiteConfig>,
) -> actix_web::Result<impl Responder> {
    let config = site.get().await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": config
    })))
}

/// Update the approved site (admin only); invalidates the cache so the
/// next fence check uses the new location
#[utoipa::path(
    put,
    path = "/api/v1/site-config",
    request_body = UpdateSiteConfigReq,
    responses(
        (status = 200, description = "Site configuration updated", body = Object, example = json!({
            "success": true,
            "message": "Site configuration updated"
        })),
        (status = 400, description = "Invalid coordinates or radius"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "SiteConfig"
)]
pub async fn update_site_config(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    site: web::Data<SharedSiteConfig>,
    payload: web::Json<UpdateSiteConfigReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let config = SiteConfig::new(payload.latitude, payload.longitude, payload.radius_m);
    if !config.is_valid() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "INVALID_COORDINATES",
            "message": "Latitude/longitude out of range or radius not positive"
        })));
    }

    let store = MySqlConfigStore::new(pool.get_ref().clone());
    if let Err(e) = store.save(&config).await {
        error!(error = %e, user_id = auth.user_id, "Failed to save site config");
        return Ok(HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": "STORE_UNAVAILABLE",
            "message": "Internal Server Error"
        })));
    }

    site.invalidate().await;
    info!(
        user_id = auth.user_id,
        latitude = config.site.latitude,
        longitude = config.site.longitude,
        radius_m = config.radius_m,
        "Site configuration updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Site configuration updated",
        "data": config
    })))
}
