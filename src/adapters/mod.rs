pub mod credentials;
pub mod log;
pub mod sources;
