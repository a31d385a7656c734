use crate::{
    auth::auth::AuthUser,
    clock::{self, ClockError, ClockInEvent, ClockOutEvent},
    config::Config,
    model::attendance::{AttendanceRecord, ClockMethod, PeriodStats, TodayStatus},
    store::{AttendanceStore, HistoryFilter, MySqlAttendanceStore, SharedSiteConfig},
    utils::{
        geo::Coordinate,
        gps_validation::{FenceOutcome, GpsErrorKind, ValidationResult, enforce_fence},
    },
};
use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct ClockInReq {
    #[serde(default)]
    pub method: ClockMethod,
    #[schema(example = 40.416775)]
    pub latitude: Option<f64>,
    #[schema(example = -3.703790)]
    pub longitude: Option<f64>,
    pub qr_code: Option<String>,
    #[schema(example = "late bus")]
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ClockOutReq {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct HistoryQuery {
    /// Pagination page number (1-based)
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Earliest date to include (YYYY-MM-DD)
    pub from: Option<NaiveDate>,
    /// Latest date to include (YYYY-MM-DD)
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub success: bool,
    pub data: Vec<AttendanceRecord>,
    pub pagination: Pagination,
    pub statistics: PeriodStats,
}

#[derive(Serialize, ToSchema)]
pub struct Pagination {
    #[schema(example = 42)]
    pub total: i64,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 30)]
    pub per_page: u32,
    #[schema(example = 2)]
    pub total_pages: i64,
}

fn coordinate_from(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinate> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
        _ => None,
    }
}

/// 400 for missing coordinates, 403 for a failed fence check; the payload
/// carries distance, max distance and both coordinates.
fn fence_rejection(validation: Box<ValidationResult>) -> HttpResponse {
    let status = match validation.error {
        Some(GpsErrorKind::GpsRequired) => StatusCode::BAD_REQUEST,
        _ => StatusCode::FORBIDDEN,
    };
    HttpResponse::build(status).json(json!({
        "success": false,
        "error": validation.error,
        "message": validation.message,
        "data": {
            "distance_m": validation.distance_m,
            "max_distance_m": validation.max_distance_m,
            "user_location": validation.user_location,
            "site_location": validation.site_location,
        }
    }))
}

/// Store failures become opaque 500s; detail goes to the log only.
fn clock_rejection(err: ClockError, user_id: u64, action: &str) -> HttpResponse {
    match &err {
        ClockError::Store(store_err) => {
            error!(error = %store_err, user_id, action, "attendance store failure");
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "STORE_UNAVAILABLE",
                "message": "Internal Server Error"
            }))
        }
        _ => HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": err.kind(),
            "message": err.to_string()
        })),
    }
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-in",
    request_body = ClockInReq,
    responses(
        (status = 200, description = "Clock-in recorded", body = Object, example = json!({
            "success": true,
            "message": "Clock-in recorded"
        })),
        (status = 400, description = "Already clocked in today, or GPS coordinates missing"),
        (status = 403, description = "Outside the approved area or invalid coordinates"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    site: web::Data<SharedSiteConfig>,
    payload: web::Json<ClockInReq>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();

    let outcome = match enforce_fence(
        site.get_ref(),
        payload.method,
        payload.latitude,
        payload.longitude,
        config.clock_in_requires_gps,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(validation) => return Ok(fence_rejection(validation)),
    };

    let validation = match outcome {
        FenceOutcome::Validated(v) => Some(v),
        FenceOutcome::Skipped => None,
    };

    // One timestamp per action; date and time-of-day must not be torn
    // across a midnight boundary.
    let now = Local::now().naive_local();
    let event = ClockInEvent {
        user_id: auth.user_id,
        date: now.date(),
        time: now.time(),
        coordinate: coordinate_from(payload.latitude, payload.longitude),
        method: payload.method,
        qr_code: payload.qr_code,
        notes: payload.notes,
        gps_note: validation.as_ref().and_then(|v| v.note()),
    };

    let store = MySqlAttendanceStore::new(pool.get_ref().clone());
    match clock::clock_in(&store, event).await {
        Ok(record) => {
            info!(user = %auth.username, user_id = auth.user_id, "Clock-in recorded");
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Clock-in recorded",
                "data": {
                    "record": record,
                    "user": auth.display_name,
                    "gps_validation": validation,
                }
            })))
        }
        Err(e) => Ok(clock_rejection(e, auth.user_id, "clock-in")),
    }
}

/// Clock-out endpoint; GPS validation is optional on the way out
#[utoipa::path(
    post,
    path = "/api/v1/attendance/clock-out",
    request_body = ClockOutReq,
    responses(
        (status = 200, description = "Clock-out recorded", body = Object, example = json!({
            "success": true,
            "message": "Clock-out recorded"
        })),
        (status = 400, description = "No clock-in today, or already clocked out"),
        (status = 403, description = "Outside the approved area or invalid coordinates"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    site: web::Data<SharedSiteConfig>,
    payload: web::Json<ClockOutReq>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();

    // Coordinates are validated when supplied, but never demanded on exit.
    let method = if payload.latitude.is_some() && payload.longitude.is_some() {
        ClockMethod::Gps
    } else {
        ClockMethod::Manual
    };

    let outcome = match enforce_fence(
        site.get_ref(),
        method,
        payload.latitude,
        payload.longitude,
        false,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(validation) => return Ok(fence_rejection(validation)),
    };

    let validation = match outcome {
        FenceOutcome::Validated(v) => Some(v),
        FenceOutcome::Skipped => None,
    };

    let now = Local::now().naive_local();
    let event = ClockOutEvent {
        user_id: auth.user_id,
        date: now.date(),
        time: now.time(),
        coordinate: coordinate_from(payload.latitude, payload.longitude),
        notes: payload.notes,
        gps_note: validation.as_ref().and_then(|v| v.note()),
    };

    let store = MySqlAttendanceStore::new(pool.get_ref().clone());
    match clock::clock_out(&store, event).await {
        Ok(record) => {
            info!(user = %auth.username, user_id = auth.user_id, "Clock-out recorded");
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Clock-out recorded",
                "data": {
                    "record": record,
                    "user": auth.display_name,
                    "gps_validation": validation,
                }
            })))
        }
        Err(e) => Ok(clock_rejection(e, auth.user_id, "clock-out")),
    }
}

/// Today's attendance state for the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/attendance/today",
    responses(
        (status = 200, description = "Today's status", body = TodayStatus),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let today = Local::now().naive_local().date();
    let store = MySqlAttendanceStore::new(pool.get_ref().clone());

    match clock::today_status(&store, auth.user_id, today).await {
        Ok(status) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": status
        }))),
        Err(e) => Ok(clock_rejection(e, auth.user_id, "today-status")),
    }
}

/// Paginated attendance history with period statistics
#[utoipa::path(
    get,
    path = "/api/v1/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Paginated history with statistics", body = HistoryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(30).clamp(1, 100);

    let filter = HistoryFilter {
        from: query.from,
        to: query.to,
        page,
        per_page,
    };

    let store = MySqlAttendanceStore::new(pool.get_ref().clone());
    let (records, total) = match store.query_records(auth.user_id, filter).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, user_id = auth.user_id, "Failed to fetch attendance history");
            return Ok(HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "STORE_UNAVAILABLE",
                "message": "Internal Server Error"
            })));
        }
    };

    let statistics = PeriodStats::from_records(&records);
    let total_pages = (total + per_page as i64 - 1) / per_page as i64;

    Ok(HttpResponse::Ok().json(HistoryResponse {
        success: true,
        data: records,
        pagination: Pagination {
            total,
            page,
            per_page,
            total_pages,
        },
        statistics,
    }))
}
