pub mod capture_log;
pub mod credentials;
pub mod lifecycle;
pub mod source;
