pub mod capture_loop;
pub mod history_query;
pub mod stop_signal;
