pub mod attendance;
pub mod role;
pub mod site_config;
