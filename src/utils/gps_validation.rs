use crate::{
    model::{attendance::ClockMethod, site_config::SiteConfig},
    utils::{
        geo::{Coordinate, distance_m},
        site_config_cache::{ConfigStore, SiteConfigCache},
    },
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GpsErrorKind {
    InvalidCoordinates,
    OutOfRange,
    GpsRequired,
    ValidationError,
}

/// Outcome of one fence check. Produced fresh per call; persisted only as
/// the textual annotation folded into the record notes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GpsErrorKind>,
    pub message: String,
    pub distance_m: Option<u32>,
    pub max_distance_m: u32,
    pub user_location: Option<Coordinate>,
    pub site_location: Coordinate,
}

impl ValidationResult {
    fn gps_required(config: &SiteConfig) -> Self {
        Self {
            is_valid: false,
            error: Some(GpsErrorKind::GpsRequired),
            message: "GPS coordinates are required for this action".into(),
            distance_m: None,
            max_distance_m: config.radius_m,
            user_location: None,
            site_location: config.site,
        }
    }

    /// Summary appended to the record notes after a successful check.
    pub fn note(&self) -> Option<String> {
        match (self.is_valid, self.distance_m) {
            (true, Some(d)) => Some(format!(
                "GPS validated | distance={}m | max={}m",
                d, self.max_distance_m
            )),
            _ => None,
        }
    }
}

/// Classifies a coordinate against the approved site. Pure; the inclusive
/// boundary means a distance exactly equal to the radius is accepted.
pub fn validate_location(user: Coordinate, config: &SiteConfig) -> ValidationResult {
    if !user.is_valid() {
        return ValidationResult {
            is_valid: false,
            error: Some(GpsErrorKind::InvalidCoordinates),
            message: "The supplied GPS coordinates are not valid".into(),
            distance_m: None,
            max_distance_m: config.radius_m,
            user_location: Some(user),
            site_location: config.site,
        };
    }

    if !config.is_valid() {
        // A broken stored reference must surface as a reported result,
        // not a panic in the distance math.
        return ValidationResult {
            is_valid: false,
            error: Some(GpsErrorKind::ValidationError),
            message: "Internal error while validating the GPS location".into(),
            distance_m: None,
            max_distance_m: config.radius_m,
            user_location: Some(user),
            site_location: config.site,
        };
    }

    let distance = distance_m(user, config.site);
    let in_range = distance <= config.radius_m;

    ValidationResult {
        is_valid: in_range,
        error: (!in_range).then_some(GpsErrorKind::OutOfRange),
        message: if in_range {
            "Location is within the allowed area".into()
        } else {
            format!(
                "You are {}m from the approved site; maximum allowed is {}m",
                distance, config.radius_m
            )
        },
        distance_m: Some(distance),
        max_distance_m: config.radius_m,
        user_location: Some(user),
        site_location: config.site,
    }
}

#[derive(Debug)]
pub enum FenceOutcome {
    /// MANUAL (or QR) event with validation not required.
    Skipped,
    Validated(ValidationResult),
}

/// Precondition for the clock handlers. GPS events, and any event when
/// validation is required, must carry coordinates; the rejection payload
/// includes the effective site config so a client can self-diagnose.
pub async fn enforce_fence<S: ConfigStore>(
    cache: &SiteConfigCache<S>,
    method: ClockMethod,
    latitude: Option<f64>,
    longitude: Option<f64>,
    required: bool,
) -> Result<FenceOutcome, Box<ValidationResult>> {
    if method == ClockMethod::Manual && !required {
        return Ok(FenceOutcome::Skipped);
    }

    if method == ClockMethod::Gps || required {
        let config = cache.get().await;

        let user = match (latitude, longitude) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon),
            _ => return Err(Box::new(ValidationResult::gps_required(&config))),
        };

        let validation = validate_location(user, &config);
        if validation.is_valid {
            return Ok(FenceOutcome::Validated(validation));
        }
        return Err(Box::new(validation));
    }

    Ok(FenceOutcome::Skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::time::Duration;

    fn fence_1000m() -> SiteConfig {
        SiteConfig::new(0.0, 0.0, 1000)
    }

    #[test]
    fn point_999m_away_is_in_range() {
        let v = validate_location(Coordinate::new(0.00898, 0.0), &fence_1000m());
        assert!(v.is_valid);
        assert_eq!(v.distance_m, Some(999));
        assert!(v.error.is_none());
    }

    #[test]
    fn point_1001m_away_is_out_of_range() {
        let v = validate_location(Coordinate::new(0.009, 0.0), &fence_1000m());
        assert!(!v.is_valid);
        assert_eq!(v.error, Some(GpsErrorKind::OutOfRange));
        assert_eq!(v.distance_m, Some(1001));
        // actionable feedback carries both numbers
        assert!(v.message.contains("1001m"));
        assert!(v.message.contains("1000m"));
    }

    #[test]
    fn boundary_distance_is_inclusive() {
        let v = validate_location(Coordinate::new(0.00899322, 0.0), &fence_1000m());
        assert_eq!(v.distance_m, Some(1000));
        assert!(v.is_valid);
    }

    #[test]
    fn invalid_latitude_rejected_regardless_of_radius() {
        for radius in [1, 1000, u32::MAX] {
            let config = SiteConfig::new(0.0, 0.0, radius);
            let v = validate_location(Coordinate::new(200.0, 0.0), &config);
            assert_eq!(v.error, Some(GpsErrorKind::InvalidCoordinates));
            assert!(v.distance_m.is_none());
        }
    }

    #[test]
    fn broken_stored_reference_reports_validation_error() {
        let config = SiteConfig::new(f64::NAN, 0.0, 1000);
        let v = validate_location(Coordinate::new(0.0, 0.0), &config);
        assert_eq!(v.error, Some(GpsErrorKind::ValidationError));
        assert!(!v.is_valid);
    }

    #[test]
    fn successful_validation_yields_a_note() {
        let v = validate_location(Coordinate::new(0.00898, 0.0), &fence_1000m());
        assert_eq!(v.note().as_deref(), Some("GPS validated | distance=999m | max=1000m"));
    }

    // ----- gating -----

    struct EmptyStore;

    impl ConfigStore for EmptyStore {
        async fn fetch(&self) -> Result<Option<SiteConfig>, StoreError> {
            Ok(None)
        }
    }

    fn cache() -> SiteConfigCache<EmptyStore> {
        SiteConfigCache::new(EmptyStore, fence_1000m(), Duration::from_secs(60))
    }

    #[actix_web::test]
    async fn manual_event_skips_when_not_required() {
        let outcome = enforce_fence(&cache(), ClockMethod::Manual, None, None, false).await;
        assert!(matches!(outcome, Ok(FenceOutcome::Skipped)));
    }

    #[actix_web::test]
    async fn gps_event_without_coordinates_is_rejected() {
        let err = enforce_fence(&cache(), ClockMethod::Gps, None, None, false)
            .await
            .unwrap_err();
        assert_eq!(err.error, Some(GpsErrorKind::GpsRequired));
        // rejection includes the effective fence so clients can self-diagnose
        assert_eq!(err.max_distance_m, 1000);
        assert_eq!(err.site_location.latitude, 0.0);
    }

    #[actix_web::test]
    async fn required_manual_event_still_needs_coordinates() {
        let err = enforce_fence(&cache(), ClockMethod::Manual, None, None, true)
            .await
            .unwrap_err();
        assert_eq!(err.error, Some(GpsErrorKind::GpsRequired));
    }

    #[actix_web::test]
    async fn gps_event_inside_the_fence_passes() {
        let outcome = enforce_fence(&cache(), ClockMethod::Gps, Some(0.00898), Some(0.0), true)
            .await
            .unwrap();
        match outcome {
            FenceOutcome::Validated(v) => assert_eq!(v.distance_m, Some(999)),
            FenceOutcome::Skipped => panic!("expected validation"),
        }
    }

    #[actix_web::test]
    async fn qr_event_skips_when_not_required() {
        let outcome = enforce_fence(&cache(), ClockMethod::Qr, None, None, false).await;
        assert!(matches!(outcome, Ok(FenceOutcome::Skipped)));
    }
}
