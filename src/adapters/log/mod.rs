pub mod json_lines_log;
