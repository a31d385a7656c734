pub mod geo;
pub mod gps_validation;
pub mod site_config_cache;
