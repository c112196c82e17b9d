pub mod read;
pub mod run;
pub mod status;
pub mod summary;
