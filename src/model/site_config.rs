use crate::utils::geo::Coordinate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Approved work site: reference coordinate plus allowed radius.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SiteConfig {
    pub site: Coordinate,
    #[schema(example = 500)]
    pub radius_m: u32,
}

impl SiteConfig {
    pub fn new(latitude: f64, longitude: f64, radius_m: u32) -> Self {
        Self {
            site: Coordinate::new(latitude, longitude),
            radius_m,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.site.is_valid() && self.radius_m > 0
    }
}
