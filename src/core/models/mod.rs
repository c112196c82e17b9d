pub mod capture_record;
pub mod log_entry;
