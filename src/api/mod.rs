pub mod attendance;
pub mod site_config;
