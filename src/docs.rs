use crate::api::attendance::{
    ClockInReq, ClockOutReq, HistoryQuery, HistoryResponse, Pagination,
};
use crate::api::site_config::UpdateSiteConfigReq;
use crate::model::attendance::{AttendanceRecord, ClockMethod, PeriodStats, TodayStatus};
use crate::model::site_config::SiteConfig;
use crate::utils::geo::Coordinate;
use crate::utils::gps_validation::{GpsErrorKind, ValidationResult};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timeclock API",
        version = "1.0.0",
        description = r#"
## GPS-fenced time and attendance

Daily clock-in/clock-out recording with optional GPS validation against an
approved work site.

### Key Features
- **Clock-in / Clock-out**
  - One record per user per calendar day, duplicate submissions rejected
- **GPS fence**
  - Haversine distance against the configured site, inclusive radius
- **Today's status**
  - What the user can still do for the current day
- **History**
  - Paginated records with period statistics (total hours, days worked,
    incomplete records, average hours per day)
- **Site configuration**
  - Admin-updatable reference location, cached with a short TTL

### Security
Endpoints are protected using **JWT Bearer authentication**; updating the
site configuration requires the **Admin** role.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::today_status,
        crate::api::attendance::history,

        crate::api::site_config::get_site_config,
        crate::api::site_config::update_site_config
    ),
    components(
        schemas(
            ClockInReq,
            ClockOutReq,
            HistoryQuery,
            HistoryResponse,
            Pagination,
            AttendanceRecord,
            ClockMethod,
            TodayStatus,
            PeriodStats,
            SiteConfig,
            UpdateSiteConfigReq,
            Coordinate,
            ValidationResult,
            GpsErrorKind
        )
    ),
    tags(
        (name = "Attendance", description = "Clock-in/clock-out APIs"),
        (name = "SiteConfig", description = "Approved work site APIs"),
    )
)]
pub struct ApiDoc;
