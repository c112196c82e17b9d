pub mod app_config;
pub mod capture_config;
